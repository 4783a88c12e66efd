use std::io::{self, BufRead, Write};

use agrirec::{CropProfile, ModelKind, PredictionRequest, PredictionService, ServiceError};
use anyhow::{bail, Result};

use crate::config::{DemoArgs, DemoMode};

pub fn run(args: &DemoArgs) -> Result<()> {
    let service = PredictionService::load(&args.artifacts.paths(), args.artifacts.service_config()?);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut prompter = Prompter::new(stdin.lock(), stdout.lock());
    match args.mode {
        DemoMode::Crop => crop_session(&service, &mut prompter),
        DemoMode::Suitability => suitability_session(&service, &mut prompter),
    }
}

struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{}", line)?;
        Ok(())
    }

    fn ask(&mut self, label: &str) -> Result<String> {
        write!(self.output, "{}: ", label)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("input ended before '{}' was answered", label);
        }
        Ok(line.trim().to_string())
    }

    /// Asks until the answer parses as a finite number.
    fn number(&mut self, label: &str) -> Result<f64> {
        loop {
            let answer = self.ask(label)?;
            match answer.parse::<f64>() {
                Ok(v) if v.is_finite() => return Ok(v),
                _ => self.say(&format!("'{}' is not a number, try again", answer))?,
            }
        }
    }
}

fn crop_session<R: BufRead, W: Write>(
    service: &PredictionService,
    prompter: &mut Prompter<R, W>,
) -> Result<()> {
    prompter.say("\nCROP PREDICTION\n---------------")?;
    let n = prompter.number("Nitrogen (N)")?;
    let p = prompter.number("Phosphorus (P)")?;
    let k = prompter.number("Potassium (K)")?;
    let temperature = prompter.number("Temperature (°C)")?;
    let humidity = prompter.number("Humidity (%)")?;
    let ph = prompter.number("Soil pH")?;
    let rainfall = prompter.number("Rainfall (mm)")?;

    let request = PredictionRequest::new()
        .with("N", n)
        .with("P", p)
        .with("K", k)
        .with("temperature", temperature)
        .with("humidity", humidity)
        .with("ph", ph)
        .with("rainfall", rainfall);
    let recommended = match service.predict_crop(&request) {
        Ok(crop) => {
            prompter.say(&format!("\nRecommended crop: {}", crop))?;
            Some(crop)
        }
        Err(e) => {
            prompter.say(&format!("\nCrop prediction failed: {}", e))?;
            None
        }
    };

    prompter.say("\nFERTILIZER PREDICTION\n---------------------")?;
    let mut crop = prompter.ask("Crop name (blank for the recommended crop)")?;
    if crop.is_empty() {
        crop = recommended.unwrap_or_default();
    }
    let soil = prompter.ask("Soil type (Loamy, Sandy, Clayey, ...)")?;
    let moisture = prompter.number("Soil moisture (%)")?;

    let request = request
        .with("crop", crop)
        .with("soil_type", soil)
        .with("moisture", moisture);
    match service.predict_fertilizer(&request) {
        Ok(fertilizer) => prompter.say(&format!("\nRecommended fertilizer: {}", fertilizer)),
        Err(ServiceError::UnknownCategory { field, value }) => {
            let known = service.meta();
            let options = if field == "crop" { known.fert_crop_classes } else { known.soil_types };
            prompter.say(&format!(
                "\nUnknown {} '{}'; known values: {}",
                field,
                value,
                options.join(", ")
            ))
        }
        Err(e) => prompter.say(&format!("\nFertilizer prediction failed: {}", e)),
    }
}

fn suitability_session<R: BufRead, W: Write>(
    service: &PredictionService,
    prompter: &mut Prompter<R, W>,
) -> Result<()> {
    prompter.say("\nCROP SUITABILITY\n----------------")?;
    let crop = prompter.ask("Crop you want to grow")?;
    let temperature = prompter.number("Temperature (°C)")?;
    let humidity = prompter.number("Humidity (%)")?;
    let rainfall = prompter.number("Rainfall (mm)")?;

    let request = PredictionRequest::new()
        .with("crop", crop)
        .with("temperature", temperature)
        .with("humidity", humidity)
        .with("rainfall", rainfall);
    let report = service.check_suitability(&request)?;
    if let Some(note) = &report.note {
        prompter.say(&format!("\n({})", note))?;
    }

    prompter.say("\nTop crops for these conditions:")?;
    for (rank, ranked) in report.top_crops.iter().enumerate() {
        prompter.say(&format!(
            "{}. {} (confidence: {:.2}%)",
            rank + 1,
            ranked.crop,
            ranked.confidence * 100.0
        ))?;
    }

    if report.is_suitable {
        prompter.say(&format!("\nYES, '{}' is suitable for these conditions.", report.crop))?;
    } else {
        prompter.say(&format!("\nNO, '{}' is not a good fit for these conditions.", report.crop))?;
    }

    // Ideal values of the requested crop when known, else of the best crop.
    let profiles = service
        .pipeline(ModelKind::Suitability)
        .map(|p| &p.artifact().profiles);
    let own = profiles.and_then(|profiles| {
        profiles
            .iter()
            .find(|(name, _)| name.to_lowercase() == report.crop)
            .map(|(name, profile)| (name.clone(), *profile))
    });
    let ideal = own.or_else(|| {
        report.details.as_ref().and_then(|d| {
            Some((
                d.best_crop.clone(),
                CropProfile {
                    temperature: d.temperature?,
                    humidity: d.humidity?,
                    rainfall: d.rainfall?,
                },
            ))
        })
    });
    if let Some((name, profile)) = ideal {
        prompter.say(&format!(
            "Ideal conditions for {}: {:.1} °C, {:.1} % humidity, {:.1} mm rainfall",
            name, profile.temperature, profile.humidity, profile.rainfall
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrirec::ServiceConfig;
    use std::io::Cursor;

    fn session<F>(input: &str, f: F) -> (Result<()>, String)
    where
        F: FnOnce(&PredictionService, &mut Prompter<Cursor<Vec<u8>>, Vec<u8>>) -> Result<()>,
    {
        let service = PredictionService::new(ServiceConfig::default());
        let mut prompter = Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        let result = f(&service, &mut prompter);
        (result, String::from_utf8(prompter.output).unwrap())
    }

    #[test]
    fn test_suitability_without_model_prints_mock() {
        let (result, out) = session("Rice\n25\n80\n200\n", |s, p| suitability_session(s, p));
        result.unwrap();
        assert!(out.contains("(Mock Data)"));
        assert!(out.contains("1. rice (confidence: 85.00%)"));
        assert!(out.contains("YES, 'rice' is suitable"));
    }

    #[test]
    fn test_number_prompt_retries() {
        let (result, out) = session("abc\n42\nrice\n", |_, p| {
            assert_eq!(p.number("N")?, 42.0);
            assert_eq!(p.ask("crop")?, "rice");
            Ok(())
        });
        result.unwrap();
        assert!(out.contains("'abc' is not a number"));
    }

    #[test]
    fn test_crop_session_reports_missing_models() {
        let input = "90\n42\n43\n20.8\n82\n6.5\n202.9\n\nLoamy\n40\n";
        let (result, out) = session(input, |s, p| crop_session(s, p));
        result.unwrap();
        assert!(out.contains("Crop prediction failed: Model not loaded"));
        assert!(out.contains("Fertilizer prediction failed: Model not loaded"));
    }

    #[test]
    fn test_early_eof_is_an_error() {
        let (result, _) = session("90\n", |s, p| crop_session(s, p));
        assert!(result.is_err());
    }
}

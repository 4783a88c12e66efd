use std::path::Path;

use agrirec::training::{self, TrainOptions, TrainingRun};
use agrirec::{ModelKind, Table};
use anyhow::{Context, Result};

use crate::config::TrainArgs;

type Trainer = fn(&Table, &TrainOptions) -> Result<TrainingRun, agrirec::TrainingError>;

/// Trains every dataset whose path was given and saves its artifact into
/// the output directory.
pub fn run(args: &TrainArgs) -> Result<()> {
    let jobs: [(ModelKind, Option<&Path>, Trainer); 3] = [
        (ModelKind::Crop, args.crop_csv.as_deref(), training::train_crop),
        (ModelKind::Fertilizer, args.fertilizer_csv.as_deref(), training::train_fertilizer),
        (ModelKind::Suitability, args.suitability_csv.as_deref(), training::train_suitability),
    ];
    anyhow::ensure!(
        jobs.iter().any(|(_, path, _)| path.is_some()),
        "nothing to train; pass --crop-csv, --fertilizer-csv or --suitability-csv"
    );

    let opts = args.options();
    for (kind, path, trainer) in jobs {
        let Some(path) = path else {
            continue;
        };
        let out = args.out_dir.join(kind.file_name());
        train_one(kind, path, trainer, &opts, &out)?;
    }
    Ok(())
}

fn train_one(
    kind: ModelKind,
    csv: &Path,
    trainer: Trainer,
    opts: &TrainOptions,
    out: &Path,
) -> Result<()> {
    log::info!("training {} model from {}", kind, csv.display());
    let table = Table::from_path(csv).with_context(|| format!("failed to read {}", csv.display()))?;
    let run = trainer(&table, opts).with_context(|| format!("failed to train the {} model", kind))?;
    run.log_summary(kind.name());
    run.artifact
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    log::info!("saved {} artifact to {}", kind, out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrirec::PipelineArtifact;
    use std::fs;
    use std::path::PathBuf;

    fn args(dir: &Path, suitability: Option<PathBuf>) -> TrainArgs {
        TrainArgs {
            crop_csv: None,
            fertilizer_csv: None,
            suitability_csv: suitability,
            out_dir: dir.join("artifacts"),
            seed: 7,
            test_size: 0.25,
            algorithm: Some(agrirec::Algorithm::Knn),
            knn_metric: agrirec::Metric::LInf,
        }
    }

    #[test]
    fn test_trains_only_given_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("suitability.csv");
        fs::write(
            &csv,
            "temperature,humidity,rainfall,label\n\
             20,82,200,rice\n21,81,205,rice\n20.5,83,198,rice\n22,80,210,rice\n\
             24,60,80,maize\n25,61,82,maize\n23,59,79,maize\n24.5,62,85,maize\n",
        )
        .unwrap();

        run(&args(dir.path(), Some(csv))).unwrap();

        let out = dir.path().join("artifacts");
        assert!(!out.join("crop.json").exists());
        let artifact = PipelineArtifact::load(out.join("suitability.json")).unwrap();
        assert_eq!(artifact.model.algorithm(), "knn");
        let agrirec::Model::Knn(knn) = &artifact.model else {
            panic!("expected a k-NN model");
        };
        assert_eq!(knn.distance(), &agrirec::Metric::LInf);
        assert_eq!(artifact.profiles.len(), 2);
    }

    #[test]
    fn test_nothing_to_train() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&args(dir.path(), None)).is_err());
    }
}

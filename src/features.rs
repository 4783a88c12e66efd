//! Mapping request fields onto the positional vectors models expect.
//!
//! Artifacts declare their input columns by the names used in the training
//! CSV (`Nitrogen`, `Temparature`, `ph`, ...). A [`FeatureLayout`] resolves
//! those names once, at load time, to either a reserved categorical slot or
//! one of the request [`Concept`]s; assembling a vector afterwards is a plain
//! walk over the resolved slots.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ServiceError;

/// A request quantity a model column can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concept {
    Nitrogen,
    Phosphorus,
    Potassium,
    Moisture,
    Temperature,
    Humidity,
    Ph,
    Rainfall,
}

impl Concept {
    /// Name of the request field carrying this quantity.
    pub fn field(self) -> &'static str {
        match self {
            Concept::Nitrogen => "N",
            Concept::Phosphorus => "P",
            Concept::Potassium => "K",
            Concept::Moisture => "moisture",
            Concept::Temperature => "temperature",
            Concept::Humidity => "humidity",
            Concept::Ph => "ph",
            Concept::Rainfall => "rainfall",
        }
    }

    /// Matches a training column name, ignoring case and surrounding space.
    pub fn from_column(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        let concept = if name.contains("nitrogen") || name == "n" {
            Concept::Nitrogen
        } else if name.starts_with("phospho") || name == "p" {
            Concept::Phosphorus
        } else if name.starts_with("potass") || name == "k" {
            Concept::Potassium
        } else {
            match name.as_str() {
                "moisture" => Concept::Moisture,
                "temperature" | "temparature" => Concept::Temperature,
                "humidity" => Concept::Humidity,
                "ph" => Concept::Ph,
                "rainfall" => Concept::Rainfall,
                _ => return None,
            }
        };
        Some(concept)
    }
}

/// What to do with a model column no rule recognises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Feed `0.0` for the column.
    #[default]
    Zero,
    /// Refuse to build the layout.
    Reject,
}

impl FromStr for UnmatchedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(UnmatchedPolicy::Zero),
            "reject" => Ok(UnmatchedPolicy::Reject),
            other => Err(format!("expected 'zero' or 'reject', got '{}'", other)),
        }
    }
}

impl Display for UnmatchedPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnmatchedPolicy::Zero => write!(f, "zero"),
            UnmatchedPolicy::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("feature order is empty")]
    Empty,
    #[error("feature column '{0}' matches no request field")]
    Unmatched(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Index into the encoded categorical values passed to `assemble`.
    Categorical(usize),
    Field(Concept),
    Zero,
}

/// Resolved column sources for one artifact's `feature_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayout {
    slots: Vec<Slot>,
}

impl FeatureLayout {
    /// Resolves each column of `feature_order`. Columns named in `reserved`
    /// become categorical slots numbered by their position in `reserved`.
    pub fn resolve<S: AsRef<str>>(
        feature_order: &[S],
        reserved: &[&str],
        policy: UnmatchedPolicy,
    ) -> Result<Self, LayoutError> {
        if feature_order.is_empty() {
            return Err(LayoutError::Empty);
        }
        let mut slots = Vec::with_capacity(feature_order.len());
        for column in feature_order {
            let column = column.as_ref();
            let slot = if let Some(i) = reserved.iter().position(|r| *r == column) {
                Slot::Categorical(i)
            } else if let Some(concept) = Concept::from_column(column) {
                Slot::Field(concept)
            } else {
                match policy {
                    UnmatchedPolicy::Zero => {
                        log::warn!("feature column '{}' matches no request field; feeding 0.0", column);
                        Slot::Zero
                    }
                    UnmatchedPolicy::Reject => {
                        return Err(LayoutError::Unmatched(column.to_string()));
                    }
                }
            };
            slots.push(slot);
        }
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Builds the model input for `request`.
    ///
    /// `encoded` holds the already-encoded categorical values in `reserved`
    /// order. Numeric fields must be present and finite.
    pub fn assemble(
        &self,
        request: &PredictionRequest,
        encoded: &[usize],
    ) -> Result<Array1<f64>, ServiceError> {
        let mut row = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let value = match *slot {
                Slot::Categorical(i) => match encoded.get(i) {
                    Some(&code) => code as f64,
                    None => {
                        return Err(ServiceError::Internal(format!(
                            "no encoded value for categorical slot {}",
                            i
                        )));
                    }
                },
                Slot::Field(concept) => request.number(concept.field())?,
                Slot::Zero => 0.0,
            };
            row.push(value);
        }
        Ok(Array1::from(row))
    }
}

/// A JSON request body: field name to raw value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionRequest(Map<String, Value>);

impl PredictionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Looks a field up by exact name, then ignoring ASCII case.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(field))
                .map(|(_, v)| v)
        })
    }

    /// A finite number, given either as a JSON number or a numeric string.
    pub fn number(&self, field: &str) -> Result<f64, ServiceError> {
        let value = match self.get(field) {
            None | Some(Value::Null) => return Err(ServiceError::missing_field(field)),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        value
            .filter(|v| v.is_finite())
            .ok_or_else(|| ServiceError::not_a_number(field))
    }

    /// A string field, trimmed.
    pub fn text(&self, field: &str) -> Result<&str, ServiceError> {
        match self.get(field) {
            None | Some(Value::Null) => Err(ServiceError::missing_field(field)),
            Some(Value::String(s)) => Ok(s.trim()),
            Some(_) => Err(ServiceError::Validation(format!(
                "Field '{}' must be a string",
                field
            ))),
        }
    }
}

impl From<Map<String, Value>> for PredictionRequest {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fertilizer_order() -> Vec<String> {
        ["soil_enc", "crop_enc", "Moisture", "Nitrogen", "Phosphorous", "Potassium", "Temparature", "Humidity"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn fertilizer_request() -> PredictionRequest {
        PredictionRequest::new()
            .with("N", 37)
            .with("P", "0")
            .with("K", 0)
            .with("moisture", 38.0)
            .with("temperature", 26.0)
            .with("humidity", 52.0)
    }

    #[test]
    fn test_concept_aliases() {
        assert_eq!(Concept::from_column(" Nitrogen "), Some(Concept::Nitrogen));
        assert_eq!(Concept::from_column("N"), Some(Concept::Nitrogen));
        assert_eq!(Concept::from_column("Phosphorous"), Some(Concept::Phosphorus));
        assert_eq!(Concept::from_column("POTASSIUM"), Some(Concept::Potassium));
        assert_eq!(Concept::from_column("Temparature"), Some(Concept::Temperature));
        assert_eq!(Concept::from_column("ph"), Some(Concept::Ph));
        assert_eq!(Concept::from_column("rainfall"), Some(Concept::Rainfall));
        assert_eq!(Concept::from_column("Soil Type"), None);
    }

    #[test]
    fn test_assemble_fertilizer_row() {
        let layout = FeatureLayout::resolve(
            &fertilizer_order(),
            &["soil_enc", "crop_enc"],
            UnmatchedPolicy::Reject,
        )
        .unwrap();
        let row = layout.assemble(&fertilizer_request(), &[4, 3]).unwrap();
        assert_eq!(row.to_vec(), vec![4.0, 3.0, 38.0, 37.0, 0.0, 0.0, 26.0, 52.0]);

        let again = layout.assemble(&fertilizer_request(), &[4, 3]).unwrap();
        assert_eq!(row, again);
    }

    #[test]
    fn test_unmatched_policy() {
        let order = ["temperature", "wind"];
        let layout = FeatureLayout::resolve(&order, &[], UnmatchedPolicy::Zero).unwrap();
        assert_eq!(layout.slots()[1], Slot::Zero);
        let row = layout
            .assemble(&PredictionRequest::new().with("temperature", 20.5), &[])
            .unwrap();
        assert_eq!(row.to_vec(), vec![20.5, 0.0]);

        assert_eq!(
            FeatureLayout::resolve(&order, &[], UnmatchedPolicy::Reject).unwrap_err(),
            LayoutError::Unmatched("wind".to_string())
        );
        assert_eq!("REJECT".parse::<UnmatchedPolicy>(), Ok(UnmatchedPolicy::Reject));
        assert!("maybe".parse::<UnmatchedPolicy>().is_err());
    }

    #[test]
    fn test_numeric_validation_names_the_field() {
        let layout = FeatureLayout::resolve(&["humidity", "rainfall"], &[], UnmatchedPolicy::Zero)
            .unwrap();
        let missing = PredictionRequest::new().with("humidity", 80);
        assert_eq!(
            layout.assemble(&missing, &[]).unwrap_err(),
            ServiceError::missing_field("rainfall")
        );

        let bad = missing.clone().with("rainfall", "lots");
        let err = layout.assemble(&bad, &[]).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("rainfall"));

        let boolean = missing.with("rainfall", true);
        assert!(layout.assemble(&boolean, &[]).is_err());
    }

    #[test]
    fn test_request_lookup() {
        let request: PredictionRequest =
            serde_json::from_value(json!({"Crop": "  Maize ", "ph": " 6.5 "})).unwrap();
        assert_eq!(request.text("crop").unwrap(), "Maize");
        assert_eq!(request.number("ph").unwrap(), 6.5);
        assert!(request.text("soil_type").is_err());
    }
}

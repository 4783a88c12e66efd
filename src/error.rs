use thiserror::Error;

use crate::service::ModelKind;

/// Every failure a prediction can surface to a caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// Missing or malformed request data.
    #[error("{0}")]
    Validation(String),
    /// A categorical value the model was never trained on.
    #[error("Unknown {field}: '{value}'")]
    UnknownCategory { field: String, value: String },
    #[error("Model not loaded")]
    ModelUnavailable(ModelKind),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn missing_field(field: &str) -> Self {
        ServiceError::Validation(format!("Missing required field '{}'", field))
    }

    pub fn not_a_number(field: &str) -> Self {
        ServiceError::Validation(format!("Field '{}' must be a finite number", field))
    }

    /// Stable machine-readable name, used as the `kind` of error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::UnknownCategory { .. } => "unknown_category",
            ServiceError::ModelUnavailable(_) => "model_unavailable",
            ServiceError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = ServiceError::UnknownCategory {
            field: "crop".to_string(),
            value: "Maize".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown crop: 'Maize'");
        assert_eq!(err.kind(), "unknown_category");

        assert!(ServiceError::missing_field("rainfall").to_string().contains("rainfall"));
        assert_eq!(
            ServiceError::ModelUnavailable(ModelKind::Crop).to_string(),
            "Model not loaded"
        );
    }
}

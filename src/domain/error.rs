use thiserror::Error;

/// Request-level rejections raised before a formula reaches any renderer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("formula must not be empty")]
    EmptyFormula,
    #[error("scale {scale} is outside the supported range [{min}, {max}]")]
    ScaleOutOfRange { scale: f64, min: f64, max: f64 },
    #[error("unsupported input type `{value}`")]
    UnknownInputType { value: String },
    #[error("output type must not be empty")]
    EmptyOutputType,
    #[error("invalid filename: {reason}")]
    InvalidFilename { reason: String },
}

impl ValidationError {
    pub fn invalid_filename(reason: impl Into<String>) -> Self {
        Self::InvalidFilename {
            reason: reason.into(),
        }
    }
}

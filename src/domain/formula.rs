//! Validated formula render requests.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::types::InputType;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 100.0;
pub const DEFAULT_SCALE: f64 = 1.0;
pub const DEFAULT_FILENAME: &str = "formula-image";

/// A render request that already passed validation. Fields are private so a
/// constructed request cannot drift out of its validated ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaRequest {
    input_type: InputType,
    output_type: String,
    formula: String,
    scale: f64,
    upload_to_cloud: bool,
    filename: String,
    product: Option<String>,
    token: Option<String>,
}

impl FormulaRequest {
    pub fn builder(output_type: impl Into<String>, formula: impl Into<String>) -> FormulaRequestBuilder {
        FormulaRequestBuilder::new(output_type, formula)
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    /// Lower-cased output type name. Whether a renderer exists for it is decided
    /// by the registry, not here.
    pub fn output_type(&self) -> &str {
        &self.output_type
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn upload_to_cloud(&self) -> bool {
        self.upload_to_cloud
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct FormulaRequestBuilder {
    input_type: InputType,
    output_type: String,
    formula: String,
    scale: f64,
    upload_to_cloud: bool,
    filename: Option<String>,
    product: Option<String>,
    token: Option<String>,
}

impl FormulaRequestBuilder {
    fn new(output_type: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            input_type: InputType::default(),
            output_type: output_type.into(),
            formula: formula.into(),
            scale: DEFAULT_SCALE,
            upload_to_cloud: false,
            filename: None,
            product: None,
            token: None,
        }
    }

    pub fn input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn upload_to_cloud(mut self, upload: bool) -> Self {
        self.upload_to_cloud = upload;
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn caller(mut self, product: Option<String>, token: Option<String>) -> Self {
        self.product = product;
        self.token = token;
        self
    }

    pub fn build(self) -> Result<FormulaRequest, ValidationError> {
        if self.formula.trim().is_empty() {
            return Err(ValidationError::EmptyFormula);
        }

        // NaN fails both comparisons, so it is rejected here as well.
        if !(self.scale >= MIN_SCALE && self.scale <= MAX_SCALE) {
            return Err(ValidationError::ScaleOutOfRange {
                scale: self.scale,
                min: MIN_SCALE,
                max: MAX_SCALE,
            });
        }

        let output_type = self.output_type.trim().to_ascii_lowercase();
        if output_type.is_empty() {
            return Err(ValidationError::EmptyOutputType);
        }

        let filename = normalize_filename(self.filename)?;

        Ok(FormulaRequest {
            input_type: self.input_type,
            output_type,
            formula: self.formula,
            scale: self.scale,
            upload_to_cloud: self.upload_to_cloud,
            filename,
            product: non_empty(self.product),
            token: non_empty(self.token),
        })
    }
}

fn normalize_filename(filename: Option<String>) -> Result<String, ValidationError> {
    let Some(raw) = filename else {
        return Ok(DEFAULT_FILENAME.to_string());
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_FILENAME.to_string());
    }

    if trimmed.contains(['/', '\\']) {
        return Err(ValidationError::invalid_filename(
            "path separators are not allowed",
        ));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::invalid_filename(
            "control characters are not allowed",
        ));
    }

    Ok(trimmed.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Wire shape of a render request, as received from query strings, JSON bodies
/// or the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaQuery {
    #[serde(default)]
    pub input_type: Option<String>,
    pub output_type: String,
    pub formula: String,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub upload_to_cloud: Option<bool>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl TryFrom<FormulaQuery> for FormulaRequest {
    type Error = ValidationError;

    fn try_from(query: FormulaQuery) -> Result<Self, Self::Error> {
        let input_type = match query.input_type.as_deref() {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => InputType::default(),
        };

        let mut builder = FormulaRequest::builder(query.output_type, query.formula)
            .input_type(input_type)
            .scale(query.scale.unwrap_or(DEFAULT_SCALE))
            .upload_to_cloud(query.upload_to_cloud.unwrap_or(false))
            .caller(query.product, query.token);

        if let Some(filename) = query.filename {
            builder = builder.filename(filename);
        }

        builder.build()
    }
}

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::application::render::engine::EngineError;
use crate::application::render::raster::RasterError;
use crate::application::storage::UploadResult;
use crate::domain::formula::FormulaRequest;
use crate::domain::types::OutputType;

/// HTML rendering: raw markup, the stylesheet it needs, and both combined in one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlOutput {
    pub html: String,
    pub css: String,
    pub combined_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MmlOutput {
    pub mml: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SvgOutput {
    pub svg: String,
}

/// Size and format read from raster headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PngOutput {
    /// Encoded raster. Kept in memory for callers that stream bytes; JSON
    /// consumers read `base64` instead.
    #[serde(skip)]
    pub png: Vec<u8>,
    /// `data:image/png;base64,` URI.
    pub base64: String,
    pub dpi: u32,
    pub dimensions: ImageDimensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oss: Option<UploadResult>,
    pub oss_upload_succeeded: bool,
}

/// Result of a render call. Each strategy owns exactly one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderOutput {
    Html(HtmlOutput),
    Mml(MmlOutput),
    Svg(SvgOutput),
    Png(PngOutput),
}

impl RenderOutput {
    pub fn output_type(&self) -> OutputType {
        match self {
            RenderOutput::Html(_) => OutputType::Html,
            RenderOutput::Mml(_) => OutputType::Mml,
            RenderOutput::Svg(_) => OutputType::Svg,
            RenderOutput::Png(_) => OutputType::Png,
        }
    }
}

/// Failures surfaced by the render pipeline. Nothing here is retried: the
/// engine and the rasterizer are deterministic for a given input.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("no renderer for output type `{output_type}`")]
    NoRenderer { output_type: String },
    #[error("render failed: {message}")]
    Render { message: String },
    /// The engine could not run or cannot serve the job; not the caller's fault.
    #[error("typesetting engine failed: {message}")]
    Engine { message: String },
    #[error("failed to generate vector content")]
    EmptyVector,
    #[error("rasterization failed: {0}")]
    Rasterization(#[from] RasterError),
}

impl RenderError {
    pub fn no_renderer(output_type: impl Into<String>) -> Self {
        Self::NoRenderer {
            output_type: output_type.into(),
        }
    }

    /// Client errors stem from the request itself; everything else is a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RenderError::NoRenderer { .. } | RenderError::Render { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::NoRenderer { .. } => "no_renderer",
            RenderError::Render { .. } => "render",
            RenderError::Engine { .. } => "engine",
            RenderError::EmptyVector => "empty_vector",
            RenderError::Rasterization(_) => "rasterization",
        }
    }
}

impl From<EngineError> for RenderError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Rejected { message } => RenderError::Render { message },
            other => RenderError::Engine {
                message: other.to_string(),
            },
        }
    }
}

/// Capability contract shared by every output strategy.
#[async_trait]
pub trait Renderer: Send + Sync {
    fn output_type(&self) -> OutputType;

    fn supports(&self, output_type: &str) -> bool {
        output_type == self.output_type().as_str()
    }

    async fn render(&self, request: &FormulaRequest) -> Result<RenderOutput, RenderError>;
}

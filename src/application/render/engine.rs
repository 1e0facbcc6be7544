//! Seam to the external typesetting engine.
//!
//! The engine turns formula markup into one of three textual forms. It is
//! treated as an opaque collaborator: the render strategies only build an
//! [`EngineJob`] and consume the resulting [`EngineOutput`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::types::InputType;

/// Output processor configuration handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum OutputProcessor {
    /// DOM + CSS emitter.
    Chtml {
        scale: f64,
        mtext_inherit_font: bool,
        merror_inherit_font: bool,
    },
    /// Vector emitter. With `font_cache` off every glyph is inlined as path data.
    Svg { scale: f64, font_cache: bool },
    /// Tree-to-text MathML serializer.
    #[serde(rename = "mathml")]
    MathMl,
}

impl OutputProcessor {
    pub fn name(&self) -> &'static str {
        match self {
            OutputProcessor::Chtml { .. } => "chtml",
            OutputProcessor::Svg { .. } => "svg",
            OutputProcessor::MathMl => "mathml",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineJob {
    pub input_type: InputType,
    pub formula: String,
    pub processor: OutputProcessor,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineOutput {
    pub markup: String,
    #[serde(default)]
    pub stylesheet: Option<String>,
}

impl EngineOutput {
    pub fn markup(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            stylesheet: None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine rejected the formula; the message is the engine's own diagnostic.
    #[error("{message}")]
    Rejected { message: String },
    #[error("{engine} engine does not accept {input_type} input")]
    UnsupportedInput {
        engine: &'static str,
        input_type: InputType,
    },
    #[error("{engine} engine cannot produce {processor} output")]
    UnsupportedOutput {
        engine: &'static str,
        processor: &'static str,
    },
    #[error("{engine} engine unavailable: {message}")]
    Unavailable {
        engine: &'static str,
        message: String,
    },
}

impl EngineError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn unavailable(engine: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            engine,
            message: message.into(),
        }
    }
}

/// Converts formula markup into the representation selected by the job's processor.
/// Each call runs to completion; there is no streamed or partial output.
#[async_trait]
pub trait TypesettingEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn typeset(&self, job: EngineJob) -> Result<EngineOutput, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_with_tagged_processor() {
        let job = EngineJob {
            input_type: InputType::AsciiMath,
            formula: "x^2".to_string(),
            processor: OutputProcessor::Svg {
                scale: 2.0,
                font_cache: false,
            },
        };

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "inputType": "AsciiMath",
                "formula": "x^2",
                "processor": { "kind": "svg", "scale": 2.0, "fontCache": false }
            })
        );
    }

    #[test]
    fn mathml_processor_has_stable_tag() {
        let value = serde_json::to_value(OutputProcessor::MathMl).unwrap();
        assert_eq!(value, serde_json::json!({ "kind": "mathml" }));
    }

    #[test]
    fn output_stylesheet_is_optional() {
        let output: EngineOutput = serde_json::from_str(r#"{"markup":"<math/>"}"#).unwrap();
        assert_eq!(output, EngineOutput::markup("<math/>"));
    }
}

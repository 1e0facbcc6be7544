use async_trait::async_trait;
use katex::{OptsBuilder, OutputType};

use crate::{
    application::render::engine::{
        EngineError, EngineJob, EngineOutput, OutputProcessor, TypesettingEngine,
    },
    domain::types::InputType,
};

const ENGINE_NAME: &str = "katex";

/// In-process KaTeX engine. Accepts TeX only and has no vector emitter, so
/// SVG and PNG requests fail with [`EngineError::UnsupportedOutput`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KatexEngine;

impl KatexEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TypesettingEngine for KatexEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn typeset(&self, job: EngineJob) -> Result<EngineOutput, EngineError> {
        if job.input_type != InputType::Tex {
            return Err(EngineError::UnsupportedInput {
                engine: ENGINE_NAME,
                input_type: job.input_type,
            });
        }

        let (output_type, scale) = match job.processor {
            OutputProcessor::Chtml { scale, .. } => (OutputType::Html, Some(scale)),
            OutputProcessor::MathMl => (OutputType::Mathml, None),
            OutputProcessor::Svg { .. } => {
                return Err(EngineError::UnsupportedOutput {
                    engine: ENGINE_NAME,
                    processor: job.processor.name(),
                });
            }
        };

        let formula = job.formula;
        let markup = tokio::task::spawn_blocking(move || render(&formula, output_type))
            .await
            .map_err(|err| EngineError::unavailable(ENGINE_NAME, err.to_string()))??;

        let markup = match scale {
            Some(scale) if scale != 1.0 => {
                format!(r#"<span style="font-size:{scale}em">{markup}</span>"#)
            }
            _ => markup,
        };

        Ok(EngineOutput::markup(markup))
    }
}

fn render(formula: &str, output_type: OutputType) -> Result<String, EngineError> {
    let mut builder = OptsBuilder::default();
    builder.display_mode(true);
    builder.output_type(output_type);

    let opts = builder.build().map_err(|err| {
        EngineError::unavailable(ENGINE_NAME, format!("failed to build KaTeX options: {err}"))
    })?;

    katex::render_with_opts(formula, opts).map_err(|err| EngineError::rejected(err.to_string()))
}

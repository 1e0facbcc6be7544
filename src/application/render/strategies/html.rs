use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    application::render::{
        engine::{EngineJob, OutputProcessor, TypesettingEngine},
        types::{HtmlOutput, RenderError, RenderOutput, Renderer},
    },
    domain::{formula::FormulaRequest, types::OutputType},
};

/// DOM + stylesheet output.
#[derive(Clone)]
pub struct HtmlRenderer {
    engine: Arc<dyn TypesettingEngine>,
}

impl HtmlRenderer {
    pub fn new(engine: Arc<dyn TypesettingEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Renderer for HtmlRenderer {
    fn output_type(&self) -> OutputType {
        OutputType::Html
    }

    async fn render(&self, request: &FormulaRequest) -> Result<RenderOutput, RenderError> {
        let output = self
            .engine
            .typeset(EngineJob {
                input_type: request.input_type(),
                formula: request.formula().to_string(),
                processor: OutputProcessor::Chtml {
                    scale: request.scale(),
                    mtext_inherit_font: true,
                    merror_inherit_font: true,
                },
            })
            .await?;

        let css = output
            .stylesheet
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let combined_html = combine(&output.markup, &css);

        Ok(RenderOutput::Html(HtmlOutput {
            html: output.markup,
            css,
            combined_html,
        }))
    }
}

/// Self-contained block carrying both the markup and its stylesheet.
pub fn combine(html: &str, css: &str) -> String {
    format!("<div class=\"mathjax-container\">\n  <style>\n{css}\n  </style>\n{html}\n</div>")
}

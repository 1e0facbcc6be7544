use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    application::render::{
        engine::{EngineJob, OutputProcessor, TypesettingEngine},
        types::{MmlOutput, RenderError, RenderOutput, Renderer},
    },
    domain::{formula::FormulaRequest, types::OutputType},
};

#[derive(Clone)]
pub struct MmlRenderer {
    engine: Arc<dyn TypesettingEngine>,
}

impl MmlRenderer {
    pub fn new(engine: Arc<dyn TypesettingEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Renderer for MmlRenderer {
    fn output_type(&self) -> OutputType {
        OutputType::Mml
    }

    async fn render(&self, request: &FormulaRequest) -> Result<RenderOutput, RenderError> {
        let output = self
            .engine
            .typeset(EngineJob {
                input_type: request.input_type(),
                formula: request.formula().to_string(),
                processor: OutputProcessor::MathMl,
            })
            .await?;

        Ok(RenderOutput::Mml(MmlOutput { mml: output.markup }))
    }
}

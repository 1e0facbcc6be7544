//! Concrete typesetting engines.

use std::sync::Arc;

use crate::{
    application::render::engine::TypesettingEngine,
    config::{EngineBackend, EngineSettings},
};

mod katex;
mod mathjax;

pub use self::katex::KatexEngine;
pub use self::mathjax::MathJaxCliEngine;

pub fn build_engine(settings: &EngineSettings) -> Arc<dyn TypesettingEngine> {
    match settings.backend {
        EngineBackend::MathJax => Arc::new(MathJaxCliEngine::new(
            settings.node_path.clone(),
            settings.script_path.clone(),
        )),
        EngineBackend::Katex => Arc::new(KatexEngine::new()),
    }
}

//! Request-level entry point over the renderer registry.

use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::{
    application::render::{RenderError, RenderOutput, Renderer, RendererRegistry},
    domain::formula::FormulaRequest,
};

const METRIC_RENDER_TOTAL: &str = "formula_render_total";
const METRIC_RENDER_FAILURES_TOTAL: &str = "formula_render_failures_total";
const METRIC_RENDER_MS: &str = "formula_render_ms";

#[derive(Clone)]
pub struct FormulaService {
    registry: Arc<RendererRegistry>,
}

impl FormulaService {
    pub fn new(registry: Arc<RendererRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    /// Dispatch to the strategy registered for the request's output type.
    pub async fn render(&self, request: &FormulaRequest) -> Result<RenderOutput, RenderError> {
        let started_at = Instant::now();

        let renderer = match self.registry.select_renderer(request) {
            Ok(renderer) => renderer,
            Err(err) => {
                counter!(METRIC_RENDER_FAILURES_TOTAL, "kind" => err.kind()).increment(1);
                warn!(
                    target = "application::formula",
                    op = "formula::render",
                    result = "no_renderer",
                    output_type = request.output_type(),
                    "No renderer registered for output type"
                );
                return Err(err);
            }
        };

        let output_type = renderer.output_type().as_str();
        counter!(METRIC_RENDER_TOTAL, "output_type" => output_type).increment(1);

        let result = renderer.render(request).await;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_RENDER_MS, "output_type" => output_type).record(elapsed_ms);

        match &result {
            Ok(_) => {
                info!(
                    target = "application::formula",
                    op = "formula::render",
                    result = "ok",
                    elapsed_ms = elapsed_ms as u64,
                    output_type,
                    input_type = %request.input_type(),
                    scale = request.scale(),
                    formula_len = request.formula().len(),
                    "Formula rendered"
                );
            }
            Err(err) => {
                counter!(METRIC_RENDER_FAILURES_TOTAL, "kind" => err.kind()).increment(1);
                warn!(
                    target = "application::formula",
                    op = "formula::render",
                    result = "error",
                    elapsed_ms = elapsed_ms as u64,
                    output_type,
                    input_type = %request.input_type(),
                    error_kind = err.kind(),
                    error = %err,
                    "Formula render failed"
                );
            }
        }

        result
    }
}

//! Output-type dispatch over a fixed set of strategies.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    application::{render::engine::TypesettingEngine, storage::PersistenceGateway},
    domain::{formula::FormulaRequest, types::OutputType},
};

use super::{
    raster::Rasterizer,
    strategies::{HtmlRenderer, MmlRenderer, PngRenderer, SvgRenderer},
    types::{RenderError, RenderOutput, Renderer},
};

/// The closed set of registrable strategies.
#[derive(Clone)]
pub enum RendererStrategy {
    Html(HtmlRenderer),
    Mml(MmlRenderer),
    Svg(SvgRenderer),
    Png(PngRenderer),
}

impl RendererStrategy {
    fn as_renderer(&self) -> &dyn Renderer {
        match self {
            RendererStrategy::Html(renderer) => renderer,
            RendererStrategy::Mml(renderer) => renderer,
            RendererStrategy::Svg(renderer) => renderer,
            RendererStrategy::Png(renderer) => renderer,
        }
    }
}

#[async_trait]
impl Renderer for RendererStrategy {
    fn output_type(&self) -> OutputType {
        self.as_renderer().output_type()
    }

    fn supports(&self, output_type: &str) -> bool {
        self.as_renderer().supports(output_type)
    }

    async fn render(&self, request: &FormulaRequest) -> Result<RenderOutput, RenderError> {
        self.as_renderer().render(request).await
    }
}

/// Immutable after construction; share behind an `Arc`.
#[derive(Clone)]
pub struct RendererRegistry {
    strategies: Vec<RendererStrategy>,
}

impl RendererRegistry {
    pub fn new(strategies: Vec<RendererStrategy>) -> Self {
        Self { strategies }
    }

    /// Default strategy set, registered as html, mml, svg, png.
    pub fn standard(
        engine: Arc<dyn TypesettingEngine>,
        rasterizer: Arc<dyn Rasterizer>,
        gateway: Option<Arc<dyn PersistenceGateway>>,
    ) -> Self {
        let svg = SvgRenderer::new(engine.clone());
        Self::new(vec![
            RendererStrategy::Html(HtmlRenderer::new(engine.clone())),
            RendererStrategy::Mml(MmlRenderer::new(engine)),
            RendererStrategy::Svg(svg.clone()),
            RendererStrategy::Png(PngRenderer::new(svg, rasterizer, gateway)),
        ])
    }

    /// First registered strategy that supports `output_type`.
    pub fn select(&self, output_type: &str) -> Result<&RendererStrategy, RenderError> {
        self.strategies
            .iter()
            .find(|strategy| strategy.supports(output_type))
            .ok_or_else(|| RenderError::no_renderer(output_type))
    }

    pub fn select_renderer(&self, request: &FormulaRequest) -> Result<&RendererStrategy, RenderError> {
        self.select(request.output_type())
    }

    pub fn strategies(&self) -> &[RendererStrategy] {
        &self.strategies
    }

    pub fn output_types(&self) -> impl Iterator<Item = OutputType> + '_ {
        self.strategies.iter().map(|strategy| strategy.output_type())
    }
}

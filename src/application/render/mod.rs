//! Formula rendering pipeline.
//!
//! Each output type is served by one strategy; the registry picks it by the
//! request's output type. PNG output composes the SVG strategy with a
//! rasterizer and an optional persistence gateway.

pub mod engine;
pub mod optimize;
pub mod raster;
mod registry;
pub mod strategies;
mod types;

pub use engine::{EngineError, EngineJob, EngineOutput, OutputProcessor, TypesettingEngine};
pub use optimize::{OptimizeError, optimize_svg};
pub use raster::{RasterError, Rasterizer, ResvgRasterizer, raster_density};
pub use registry::{RendererRegistry, RendererStrategy};
pub use strategies::{HtmlRenderer, MmlRenderer, PngRenderer, SvgRenderer};
pub use types::{
    HtmlOutput, ImageDimensions, MmlOutput, PngOutput, RenderError, RenderOutput, Renderer,
    SvgOutput,
};

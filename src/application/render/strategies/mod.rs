//! One renderer per output type.

mod html;
mod mml;
mod png;
mod svg;

pub use html::{HtmlRenderer, combine};
pub use mml::MmlRenderer;
pub use png::PngRenderer;
pub use svg::{SvgRenderer, extract_svg};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    application::render::{
        engine::{EngineJob, OutputProcessor, TypesettingEngine},
        optimize::optimize_svg,
        types::{RenderError, RenderOutput, Renderer, SvgOutput},
    },
    domain::{formula::FormulaRequest, types::OutputType},
};

/// Vector output with every glyph inlined as path data, then optimized.
#[derive(Clone)]
pub struct SvgRenderer {
    engine: Arc<dyn TypesettingEngine>,
}

impl SvgRenderer {
    pub fn new(engine: Arc<dyn TypesettingEngine>) -> Self {
        Self { engine }
    }

    /// Typeset, extract and optimize. Shared with the PNG strategy. Engine
    /// output without an `<svg>` root is returned unmodified.
    pub async fn render_svg(&self, request: &FormulaRequest) -> Result<String, RenderError> {
        let output = self
            .engine
            .typeset(EngineJob {
                input_type: request.input_type(),
                formula: request.formula().to_string(),
                processor: OutputProcessor::Svg {
                    scale: request.scale(),
                    font_cache: false,
                },
            })
            .await?;

        let Some(svg) = extract_svg(&output.markup) else {
            return Ok(output.markup);
        };

        match optimize_svg(svg) {
            Ok(optimized) => Ok(optimized),
            Err(err) => {
                warn!(
                    target = "application::render::svg",
                    op = "svg::optimize",
                    result = "skipped",
                    svg_bytes = svg.len(),
                    error = %err,
                    "SVG optimization failed; returning unoptimized markup"
                );
                Ok(svg.to_string())
            }
        }
    }
}

#[async_trait]
impl Renderer for SvgRenderer {
    fn output_type(&self) -> OutputType {
        OutputType::Svg
    }

    async fn render(&self, request: &FormulaRequest) -> Result<RenderOutput, RenderError> {
        let svg = self.render_svg(request).await?;
        Ok(RenderOutput::Svg(SvgOutput { svg }))
    }
}

/// Slice out the first outermost `<svg>…</svg>` element, counting nested
/// `<svg>` openings so an inner close tag does not end the match early.
pub fn extract_svg(markup: &str) -> Option<&str> {
    let start = find_open_tag(markup, 0)?;
    let mut depth = 0usize;
    let mut cursor = start;

    loop {
        let next_open = find_open_tag(markup, cursor);
        let next_close = markup[cursor..].find("</svg").map(|idx| idx + cursor);

        match (next_open, next_close) {
            (Some(open), Some(close)) if open < close => {
                let tag_end = markup[open..].find('>')? + open;
                if !markup[..tag_end].ends_with('/') {
                    depth += 1;
                } else if depth == 0 {
                    return Some(&markup[start..=tag_end]);
                }
                cursor = tag_end + 1;
            }
            (_, Some(close)) => {
                let tag_end = markup[close..].find('>')? + close;
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&markup[start..=tag_end]);
                }
                cursor = tag_end + 1;
            }
            (Some(open), None) => {
                let tag_end = markup[open..].find('>')? + open;
                if markup[..tag_end].ends_with('/') && depth == 0 {
                    return Some(&markup[start..=tag_end]);
                }
                return None;
            }
            (None, None) => return None,
        }
    }
}

/// Position of the next `<svg` that starts an element (not `<svgfoo`).
fn find_open_tag(markup: &str, from: usize) -> Option<usize> {
    let mut offset = from;
    while let Some(idx) = markup[offset..].find("<svg") {
        let pos = offset + idx;
        match markup.as_bytes().get(pos + 4) {
            Some(b' ' | b'>' | b'/' | b'\n' | b'\t' | b'\r') => return Some(pos),
            _ => offset = pos + 4,
        }
    }
    None
}

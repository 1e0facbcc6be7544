use std::{collections::BTreeMap, sync::Arc, time::Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use metrics::counter;
use tracing::{info, warn};

use crate::{
    application::{
        render::{
            raster::{Rasterizer, raster_density},
            types::{ImageDimensions, PngOutput, RenderError, RenderOutput, Renderer},
        },
        storage::{PersistenceGateway, UploadOptions, UploadResult},
    },
    domain::{formula::FormulaRequest, types::OutputType},
};

use super::svg::SvgRenderer;

const METRIC_UPLOAD_FAILURES_TOTAL: &str = "formula_upload_failures_total";
const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Composite strategy: vector output rasterized at a density derived from the
/// request scale, with an optional best-effort upload.
#[derive(Clone)]
pub struct PngRenderer {
    svg: SvgRenderer,
    rasterizer: Arc<dyn Rasterizer>,
    gateway: Option<Arc<dyn PersistenceGateway>>,
}

impl PngRenderer {
    pub fn new(
        svg: SvgRenderer,
        rasterizer: Arc<dyn Rasterizer>,
        gateway: Option<Arc<dyn PersistenceGateway>>,
    ) -> Self {
        Self {
            svg,
            rasterizer,
            gateway,
        }
    }

    /// Upload failures never fail the render; they are logged and reported
    /// through `oss_upload_succeeded`.
    async fn try_upload(
        &self,
        request: &FormulaRequest,
        png: &[u8],
        dpi: u32,
        dimensions: &ImageDimensions,
    ) -> Option<UploadResult> {
        let Some(gateway) = self.gateway.as_ref() else {
            counter!(METRIC_UPLOAD_FAILURES_TOTAL, "reason" => "unconfigured").increment(1);
            warn!(
                target = "application::render::png",
                op = "png::upload",
                result = "skipped",
                filename = request.filename(),
                "Cloud upload requested but no object store is configured"
            );
            return None;
        };

        let options = UploadOptions {
            metadata: upload_metadata(request.scale(), dpi, dimensions),
            ..Default::default()
        };

        match gateway
            .upload(Bytes::copy_from_slice(png), request.filename(), options)
            .await
        {
            Ok(result) => Some(result),
            Err(err) => {
                counter!(METRIC_UPLOAD_FAILURES_TOTAL, "reason" => "error").increment(1);
                warn!(
                    target = "application::render::png",
                    op = "png::upload",
                    result = "error",
                    filename = request.filename(),
                    png_bytes = png.len(),
                    error = %err,
                    "PNG upload failed; returning inline image only"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Renderer for PngRenderer {
    fn output_type(&self) -> OutputType {
        OutputType::Png
    }

    async fn render(&self, request: &FormulaRequest) -> Result<RenderOutput, RenderError> {
        let started_at = Instant::now();

        let svg = self.svg.render_svg(request).await?;
        if svg.trim().is_empty() {
            return Err(RenderError::EmptyVector);
        }

        let density = raster_density(request.scale());
        let png = self
            .rasterizer
            .rasterize(svg.into_bytes(), density)
            .await?;
        let dimensions = self.rasterizer.probe(&png)?;
        let dpi = density.round() as u32;
        let base64 = format!("{DATA_URI_PREFIX}{}", STANDARD.encode(&png));

        let oss = if request.upload_to_cloud() {
            self.try_upload(request, &png, dpi, &dimensions).await
        } else {
            None
        };
        let oss_upload_succeeded = oss.is_some();

        info!(
            target = "application::render::png",
            op = "png::render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            dpi,
            width = dimensions.width,
            height = dimensions.height,
            png_bytes = png.len(),
            uploaded = oss_upload_succeeded,
            "Formula rasterized"
        );

        Ok(RenderOutput::Png(PngOutput {
            png,
            base64,
            dpi,
            dimensions,
            oss,
            oss_upload_succeeded,
        }))
    }
}

fn upload_metadata(scale: f64, dpi: u32, dimensions: &ImageDimensions) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("scale".to_string(), scale.to_string()),
        ("dpi".to_string(), dpi.to_string()),
        ("width".to_string(), dimensions.width.to_string()),
        ("height".to_string(), dimensions.height.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_carries_scale_and_geometry() {
        let dims = ImageDimensions {
            width: 40,
            height: 20,
            byte_size: 100,
            format: "png".to_string(),
        };
        let metadata = upload_metadata(2.0, 144, &dims);
        assert_eq!(metadata["scale"], "2");
        assert_eq!(metadata["dpi"], "144");
        assert_eq!(metadata["width"], "40");
        assert_eq!(metadata["height"], "20");
    }
}

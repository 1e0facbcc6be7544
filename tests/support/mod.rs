#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use formula_render::application::{
    render::{
        EngineError, EngineJob, EngineOutput, OutputProcessor, RendererRegistry, ResvgRasterizer,
        TypesettingEngine,
    },
    storage::{
        ObjectStore, ObjectStoreError, PersistenceGateway, PutOptions, StorageError,
        UploadOptions, UploadResult,
    },
};

pub const REJECTED_FORMULA: &str = r"\undefinedmacro";

/// Engine markup for the vector processor: a 20x10 user-unit drawing wrapped
/// in a container element, with a comment and redundant attributes for the
/// optimizer to strip.
pub const ENGINE_SVG: &str = concat!(
    r#"<mjx-container class="MathJax" jax="SVG" display="true">"#,
    r#"<!-- glyph cache disabled -->"#,
    r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" "#,
    r#"width="20" height="10" viewBox="0 -10 20 10" role="img" focusable="false">"#,
    r#"<g stroke="currentColor" fill="currentColor" stroke-width="0" transform="scale(1,-1)">"#,
    r#"<path fill-opacity="1" d="M0.000 0.000L20.000 0.000L20.000 10.000L0.000 10.000Z"/>"#,
    r#"</g></svg></mjx-container>"#
);

/// Deterministic engine standing in for MathJax.
#[derive(Default)]
pub struct FakeEngine {
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypesettingEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn typeset(&self, job: EngineJob) -> Result<EngineOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if job.formula == REJECTED_FORMULA {
            return Err(EngineError::rejected("Undefined control sequence"));
        }

        Ok(match job.processor {
            OutputProcessor::Chtml { scale, .. } => EngineOutput {
                markup: format!(
                    r#"<mjx-container class="MathJax" style="font-size:{scale}em">{}</mjx-container>"#,
                    job.formula
                ),
                stylesheet: Some("\n  mjx-container { display: inline-block; }\n".to_string()),
            },
            OutputProcessor::MathMl => EngineOutput::markup(format!(
                r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="block"><mi>{}</mi></math>"#,
                job.formula
            )),
            OutputProcessor::Svg { .. } => EngineOutput::markup(ENGINE_SVG),
        })
    }
}

/// Engine that yields no vector markup at all.
pub struct BlankEngine;

#[async_trait]
impl TypesettingEngine for BlankEngine {
    fn name(&self) -> &'static str {
        "blank"
    }

    async fn typeset(&self, _job: EngineJob) -> Result<EngineOutput, EngineError> {
        Ok(EngineOutput::markup(""))
    }
}

/// Engine that returns the same markup for every job.
pub struct MarkupEngine(pub &'static str);

#[async_trait]
impl TypesettingEngine for MarkupEngine {
    fn name(&self) -> &'static str {
        "markup"
    }

    async fn typeset(&self, _job: EngineJob) -> Result<EngineOutput, EngineError> {
        Ok(EngineOutput::markup(self.0))
    }
}

/// Engine whose runtime is missing.
pub struct UnavailableEngine;

#[async_trait]
impl TypesettingEngine for UnavailableEngine {
    fn name(&self) -> &'static str {
        "mathjax"
    }

    async fn typeset(&self, _job: EngineJob) -> Result<EngineOutput, EngineError> {
        Err(EngineError::unavailable("mathjax", "`node` not found"))
    }
}

/// Gateway that records calls and can be told to fail.
#[derive(Default)]
pub struct RecordingGateway {
    pub fail: bool,
    calls: AtomicUsize,
}

impl RecordingGateway {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        _options: UploadOptions,
    ) -> Result<UploadResult, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StorageError::Upload {
                cause: "access denied".to_string(),
            });
        }
        Ok(UploadResult {
            url: format!("https://bucket.example/{filename}"),
            filename: filename.to_string(),
            key: format!("formula-images/0-{filename}"),
            size: data.len() as u64,
        })
    }

    async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
        Ok(true)
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Object store whose `put` never completes within a short deadline.
pub struct SlowObjectStore {
    pub delay: Duration,
}

#[async_trait]
impl ObjectStore for SlowObjectStore {
    async fn put(
        &self,
        _key: &str,
        _data: Bytes,
        _options: PutOptions,
    ) -> Result<(), ObjectStoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn signed_url(&self, key: &str, _expires: Duration) -> Result<String, ObjectStoreError> {
        Ok(format!("slow://{key}"))
    }

    async fn head(&self, key: &str) -> Result<(), ObjectStoreError> {
        Err(ObjectStoreError::NotFound {
            key: key.to_string(),
        })
    }

    async fn delete(&self, _key: &str) -> Result<(), ObjectStoreError> {
        Ok(())
    }
}

pub fn registry_with(
    engine: Arc<dyn TypesettingEngine>,
    gateway: Option<Arc<dyn PersistenceGateway>>,
) -> RendererRegistry {
    RendererRegistry::standard(engine, Arc::new(ResvgRasterizer::default()), gateway)
}

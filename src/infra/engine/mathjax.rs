use std::{io::ErrorKind, path::PathBuf, process::Stdio, time::Instant};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, warn};

use crate::application::render::engine::{EngineError, EngineJob, EngineOutput, TypesettingEngine};

const ENGINE_NAME: &str = "mathjax";

/// Runs the bundled MathJax typesetting script under Node.js.
///
/// One child process per job: the job is written to stdin as JSON and the
/// script answers with an [`EngineOutput`] document on stdout. A non-zero
/// exit means the formula was rejected and stderr carries the diagnostic.
#[derive(Debug, Clone)]
pub struct MathJaxCliEngine {
    node_path: PathBuf,
    script_path: PathBuf,
}

impl MathJaxCliEngine {
    pub fn new(node_path: PathBuf, script_path: PathBuf) -> Self {
        Self {
            node_path,
            script_path,
        }
    }
}

#[async_trait]
impl TypesettingEngine for MathJaxCliEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn typeset(&self, job: EngineJob) -> Result<EngineOutput, EngineError> {
        let started_at = Instant::now();
        let processor = job.processor.name();
        let payload = serde_json::to_vec(&job)
            .map_err(|err| EngineError::unavailable(ENGINE_NAME, err.to_string()))?;

        let mut child = Command::new(&self.node_path)
            .arg(&self.script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                warn!(
                    target = "infra::engine::mathjax",
                    op = "mathjax::typeset",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    error = %err,
                    "Failed to spawn MathJax typesetting script"
                );
                if err.kind() == ErrorKind::NotFound {
                    EngineError::unavailable(
                        ENGINE_NAME,
                        format!("`{}` not found", self.node_path.display()),
                    )
                } else {
                    EngineError::unavailable(ENGINE_NAME, err.to_string())
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|err| EngineError::unavailable(ENGINE_NAME, err.to_string()))?;
            // Dropping stdin closes the pipe so the script sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| EngineError::unavailable(ENGINE_NAME, err.to_string()))?;

        if !output.status.success() {
            let exit_code = output.status.code().map(i64::from).unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "infra::engine::mathjax",
                op = "mathjax::typeset",
                result = "rejected",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                processor,
                exit_code,
                stderr = %stderr,
                "MathJax rejected formula"
            );
            let message = if stderr.is_empty() {
                format!("typesetting script exited with code {exit_code}")
            } else {
                stderr
            };
            return Err(EngineError::rejected(message));
        }

        let parsed: EngineOutput = serde_json::from_slice(&output.stdout).map_err(|err| {
            warn!(
                target = "infra::engine::mathjax",
                op = "mathjax::typeset",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = "malformed_output",
                error = %err,
                "MathJax script produced unreadable output"
            );
            EngineError::unavailable(ENGINE_NAME, format!("malformed script output: {err}"))
        })?;

        debug!(
            target = "infra::engine::mathjax",
            op = "mathjax::typeset",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            processor,
            markup_bytes = parsed.markup.len(),
            "Formula typeset via MathJax"
        );

        Ok(parsed)
    }
}

//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{
    CliArgs, Command, EngineOverrides, LoggingOverrides, RenderArgs, ServeArgs, ServeOverrides,
};

use crate::application::{
    render::raster::DEFAULT_MAX_PIXELS,
    storage::{DEFAULT_UPLOAD_PATH, DEFAULT_UPLOAD_TIMEOUT, DEFAULT_URL_EXPIRY},
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "formula-render";
const ENV_PREFIX: &str = "FORMULA";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
pub(crate) const DEFAULT_NODE_PATH: &str = "node";
pub(crate) const DEFAULT_SCRIPT_PATH: &str = "scripts/mathjax-typeset.mjs";
const DEFAULT_MEMORY_BASE_URL: &str = "memory://formula-render";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub engine: EngineSettings,
    pub raster: RasterSettings,
    /// `None` when no object store is configured; upload requests then degrade
    /// to a logged warning.
    pub storage: Option<StorageSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineBackend {
    MathJax,
    Katex,
}

impl FromStr for EngineBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mathjax" => Ok(EngineBackend::MathJax),
            "katex" => Ok(EngineBackend::Katex),
            other => Err(format!("unknown engine backend `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub backend: EngineBackend,
    pub node_path: PathBuf,
    pub script_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RasterSettings {
    pub max_pixels: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub default_path: String,
    pub timeout: Duration,
    pub url_expiry: Duration,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Oss(OssSettings),
    Memory { base_url: String },
}

#[derive(Debug, Clone)]
pub struct OssSettings {
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub secure: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => {
            raw.apply_engine_overrides(&args.engine);
            raw.apply_logging_overrides(&args.logging);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    engine: RawEngineSettings,
    raster: RawRasterSettings,
    storage: RawStorageSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(max_pixels) = overrides.raster_max_pixels {
            self.raster.max_pixels = Some(max_pixels);
        }
        if let Some(backend) = overrides.storage_backend.as_ref() {
            self.storage.backend = Some(backend.clone());
        }
        if let Some(bucket) = overrides.storage_bucket.as_ref() {
            self.storage.bucket = Some(bucket.clone());
        }

        self.apply_engine_overrides(&overrides.engine);
        self.apply_logging_overrides(&overrides.logging);
    }

    fn apply_engine_overrides(&mut self, overrides: &EngineOverrides) {
        if let Some(backend) = overrides.backend.as_ref() {
            self.engine.backend = Some(backend.clone());
        }
        if let Some(path) = overrides.node_path.as_ref() {
            self.engine.node_path = Some(path.clone());
        }
        if let Some(path) = overrides.script_path.as_ref() {
            self.engine.script_path = Some(path.clone());
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            engine,
            raster,
            storage,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let engine = build_engine_settings(engine)?;
        let raster = build_raster_settings(raster)?;
        let storage = build_storage_settings(storage)?;

        Ok(Self {
            server,
            logging,
            engine,
            raster,
            storage,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_engine_settings(engine: RawEngineSettings) -> Result<EngineSettings, LoadError> {
    let backend = match engine.backend {
        Some(value) => EngineBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("engine.backend", reason))?,
        None => EngineBackend::MathJax,
    };

    let node_path = engine
        .node_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_NODE_PATH));
    if node_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "engine.node_path",
            "path must not be empty",
        ));
    }

    let script_path = engine
        .script_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_PATH));
    if script_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "engine.script_path",
            "path must not be empty",
        ));
    }

    Ok(EngineSettings {
        backend,
        node_path,
        script_path,
    })
}

fn build_raster_settings(raster: RawRasterSettings) -> Result<RasterSettings, LoadError> {
    let value = raster.max_pixels.unwrap_or(DEFAULT_MAX_PIXELS);
    let max_pixels = NonZeroU64::new(value)
        .ok_or_else(|| LoadError::invalid("raster.max_pixels", "must be greater than zero"))?;
    Ok(RasterSettings { max_pixels })
}

fn build_storage_settings(
    storage: RawStorageSettings,
) -> Result<Option<StorageSettings>, LoadError> {
    let RawStorageSettings {
        backend,
        endpoint,
        region,
        bucket,
        access_key_id,
        access_key_secret,
        secure,
        default_path,
        timeout_ms,
        url_expiry_seconds,
    } = storage;

    let endpoint = non_blank(endpoint);
    let backend_name = non_blank(backend).map(|value| value.to_ascii_lowercase());
    let backend = match backend_name.as_deref() {
        None | Some("oss") => {
            match build_oss_settings(
                endpoint,
                non_blank(region),
                non_blank(bucket),
                non_blank(access_key_id),
                non_blank(access_key_secret),
                secure.unwrap_or(true),
            )? {
                Some(oss) => StorageBackend::Oss(oss),
                None => return Ok(None),
            }
        }
        Some("memory") => StorageBackend::Memory {
            base_url: endpoint.unwrap_or_else(|| DEFAULT_MEMORY_BASE_URL.to_string()),
        },
        Some(other) => {
            return Err(LoadError::invalid(
                "storage.backend",
                format!("unknown storage backend `{other}`"),
            ));
        }
    };

    let default_path = non_blank(default_path)
        .map(|path| path.trim_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_UPLOAD_PATH.to_string());

    let timeout = match timeout_ms {
        Some(0) => {
            return Err(LoadError::invalid(
                "storage.timeout_ms",
                "must be greater than zero",
            ));
        }
        Some(ms) => Duration::from_millis(ms),
        None => DEFAULT_UPLOAD_TIMEOUT,
    };

    let url_expiry = match url_expiry_seconds {
        Some(0) => {
            return Err(LoadError::invalid(
                "storage.url_expiry_seconds",
                "must be greater than zero",
            ));
        }
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_URL_EXPIRY,
    };

    Ok(Some(StorageSettings {
        backend,
        default_path,
        timeout,
        url_expiry,
    }))
}

/// Returns `Ok(None)` when no OSS field is set at all; a partially filled
/// section is an error.
fn build_oss_settings(
    endpoint: Option<String>,
    region: Option<String>,
    bucket: Option<String>,
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
    secure: bool,
) -> Result<Option<OssSettings>, LoadError> {
    if bucket.is_none() && access_key_id.is_none() && access_key_secret.is_none() {
        return Ok(None);
    }

    let bucket = bucket.ok_or_else(|| LoadError::invalid("storage.bucket", "must be set"))?;
    let access_key_id = access_key_id
        .ok_or_else(|| LoadError::invalid("storage.access_key_id", "must be set"))?;
    let access_key_secret = access_key_secret
        .ok_or_else(|| LoadError::invalid("storage.access_key_secret", "must be set"))?;

    let endpoint = match (endpoint, region) {
        (Some(endpoint), _) => endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string(),
        (None, Some(region)) => format!("{region}.aliyuncs.com"),
        (None, None) => {
            return Err(LoadError::invalid(
                "storage.endpoint",
                "either endpoint or region must be set",
            ));
        }
    };

    Ok(Some(OssSettings {
        endpoint,
        bucket,
        access_key_id,
        access_key_secret,
        secure,
    }))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEngineSettings {
    backend: Option<String>,
    node_path: Option<PathBuf>,
    script_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRasterSettings {
    max_pixels: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    backend: Option<String>,
    endpoint: Option<String>,
    region: Option<String>,
    bucket: Option<String>,
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
    secure: Option<bool>,
    default_path: Option<String>,
    timeout_ms: Option<u64>,
    url_expiry_seconds: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

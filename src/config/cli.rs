use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the formula-render binary.
#[derive(Debug, Parser)]
#[command(
    name = "formula-render",
    version,
    about = "Render TeX, MathML and AsciiMath formulas to HTML, SVG, PNG or MathML"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FORMULA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the formula HTTP service.
    Serve(Box<ServeArgs>),
    /// Render one formula and print the result as JSON.
    Render(Box<RenderArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct EngineOverrides {
    /// Override the typesetting backend (mathjax|katex).
    #[arg(long = "engine-backend", value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Override the Node.js executable used by the MathJax backend.
    #[arg(long = "engine-node-path", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub node_path: Option<PathBuf>,

    /// Override the MathJax typesetting script.
    #[arg(long = "engine-script-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub script_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub engine: EngineOverrides,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the rasterizer pixel budget.
    #[arg(long = "raster-max-pixels", value_name = "COUNT")]
    pub raster_max_pixels: Option<u64>,

    /// Override the storage backend (oss|memory).
    #[arg(long = "storage-backend", value_name = "BACKEND")]
    pub storage_backend: Option<String>,

    /// Override the storage bucket.
    #[arg(long = "storage-bucket", value_name = "BUCKET")]
    pub storage_bucket: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub engine: EngineOverrides,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Target representation (html|svg|png|mml).
    #[arg(long = "output-type", value_name = "TYPE")]
    pub output_type: String,

    /// Formula source text.
    #[arg(long, value_name = "FORMULA")]
    pub formula: String,

    /// Source markup language (TeX|MathML|AsciiMath).
    #[arg(long = "input-type", value_name = "TYPE")]
    pub input_type: Option<String>,

    /// Scale factor between 0.1 and 100.
    #[arg(long, value_name = "SCALE")]
    pub scale: Option<f64>,

    /// Upload PNG output to the configured object store.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub upload: bool,

    /// Object name for uploaded PNGs.
    #[arg(long, value_name = "NAME")]
    pub filename: Option<String>,

    /// Also write PNG bytes to this file.
    #[arg(long = "png-out", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub png_out: Option<PathBuf>,
}

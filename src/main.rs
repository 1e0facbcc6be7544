use std::{process, sync::Arc};

use formula_render::{
    application::{
        error::AppError,
        formula::FormulaService,
        render::{RenderOutput, RendererRegistry, ResvgRasterizer},
    },
    config,
    domain::formula::{FormulaQuery, FormulaRequest},
    infra::{
        engine::build_engine,
        error::InfraError,
        http::{self, HttpState},
        storage::build_gateway,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    let service = build_formula_service(&settings)?;

    match command {
        config::Command::Serve(_) => run_serve(&settings, service).await,
        config::Command::Render(args) => run_render(service, *args).await,
    }
}

fn build_formula_service(settings: &config::Settings) -> Result<FormulaService, AppError> {
    let engine = build_engine(&settings.engine);
    let rasterizer = Arc::new(ResvgRasterizer::new(settings.raster.max_pixels.get()));
    let gateway = build_gateway(settings.storage.as_ref()).map_err(AppError::from)?;

    info!(
        target = "formula_render::bootstrap",
        engine = engine.name(),
        max_pixels = settings.raster.max_pixels.get(),
        uploads_enabled = gateway.is_some(),
        "Renderer registry assembled"
    );

    let registry = RendererRegistry::standard(engine, rasterizer, gateway);
    Ok(FormulaService::new(Arc::new(registry)))
}

async fn run_serve(settings: &config::Settings, service: FormulaService) -> Result<(), AppError> {
    let router = http::build_router(HttpState { service });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "formula_render::bootstrap",
        addr = %settings.server.addr,
        "Formula service listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_render(service: FormulaService, args: config::RenderArgs) -> Result<(), AppError> {
    let request = FormulaRequest::try_from(FormulaQuery {
        input_type: args.input_type,
        output_type: args.output_type,
        formula: args.formula,
        scale: args.scale,
        upload_to_cloud: Some(args.upload),
        filename: args.filename,
        product: None,
        token: None,
    })?;

    let output = service.render(&request).await?;

    if let (Some(path), RenderOutput::Png(png)) = (args.png_out.as_ref(), &output) {
        tokio::fs::write(path, &png.png)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
    }

    let json = serde_json::to_string_pretty(&output)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{json}");
    Ok(())
}

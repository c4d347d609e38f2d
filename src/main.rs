use std::{path::Path, process};

use figrender::{
    application::{
        error::AppError,
        render::{RenderDispatcher, RenderRequest, init_fonts},
    },
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::io::AsyncReadExt;
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

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    init_fonts();

    let dispatcher = RenderDispatcher::new(
        settings.render.script.clone(),
        settings.render.compiled.clone(),
        settings.render.max_concurrent,
    );

    match command {
        config::Command::Serve(_) => run_serve(&settings, dispatcher).await,
        config::Command::Render(args) => run_render(dispatcher, args).await,
    }
}

async fn run_serve(settings: &config::Settings, dispatcher: RenderDispatcher) -> Result<(), AppError> {
    let compiled = dispatcher.compiled_available();
    let router = http::build_router(HttpState::new(dispatcher));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "figrender::serve",
        addr = %settings.server.addr,
        max_concurrent = settings.render.max_concurrent.get(),
        compiled,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_render(dispatcher: RenderDispatcher, args: config::RenderArgs) -> Result<(), AppError> {
    let code = read_source(&args).await?;
    let result = dispatcher
        .dispatch(&RenderRequest::new(args.mode.clone(), code))
        .await;

    if !result.success() {
        eprintln!("error: {}", result.error().unwrap_or("render failed"));
        if let Some(diagnostic) = result.diagnostic() {
            eprintln!("{diagnostic}");
        }
        return Err(AppError::render(
            result.error_code().unwrap_or("unknown").to_string(),
        ));
    }

    let image = result.into_image().unwrap_or_default();
    write_image(&args.output, &image).await?;
    info!(
        target = "figrender::render",
        mode = %args.mode,
        output = %args.output.display(),
        image_bytes = image.len(),
        "Wrote image"
    );
    Ok(())
}

async fn read_source(args: &config::RenderArgs) -> Result<String, AppError> {
    if args.reads_stdin() {
        let mut code = String::new();
        tokio::io::stdin()
            .read_to_string(&mut code)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
        Ok(code)
    } else {
        tokio::fs::read_to_string(&args.input)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))
    }
}

async fn write_image(path: &Path, image: &[u8]) -> Result<(), AppError> {
    tokio::fs::write(path, image)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))
}

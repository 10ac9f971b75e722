mod certificate;
mod config;
mod convert;
mod routes;
mod state;
mod storage;
mod templates;
mod workbook;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use convert::{ConversionPipeline, ExcelAutomation, MinimalRender, SofficeHeadless};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "selladora=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(config::Config::from_env()?);

    storage::ensure_dirs(
        &config.exports_dir,
        &config.uploads_dir,
        &config.templates_dir,
    )?;

    // fixed priority order: most capable converters first, the
    // guaranteed-success field renderer last
    let pipeline = ConversionPipeline::new(vec![
        Box::new(SofficeHeadless::new(
            config.soffice_binary.clone(),
            config.strategy_timeout,
        )),
        Box::new(ExcelAutomation::new(
            config.automation_interpreter.clone(),
            config.automation_script.clone(),
            config.strategy_timeout,
        )),
        Box::new(MinimalRender::new(config.strategy_timeout)),
    ]);
    tracing::info!("{} conversion strategies registered", pipeline.strategy_count());

    let state = Arc::new(state::AppState {
        config: config.clone(),
        pipeline,
        convert_lock: tokio::sync::Mutex::new(()),
    });

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/certificates", post(routes::create_certificate))
        .route("/exports/:filename", get(routes::download_export))
        .route("/uploads/:filename", get(routes::download_upload))
        .route("/healthz", get(routes::health))
        .route("/maintenance/sweep", post(routes::sweep))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Selladora listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

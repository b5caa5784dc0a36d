//! # loanboard-server
//!
//! HTTP API in front of the loan approval training project: dataset upload,
//! pipeline invocation and artifact reporting, plus static serving of the
//! generated reports.

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;

use std::any::Any;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use loanboard_training::{ProcessTrainer, TrainingService};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::logging::RequestLoggerLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: TrainingService,
}

impl AppState {
    #[must_use]
    pub fn new(service: TrainingService) -> Self {
        Self { service }
    }

    /// State backed by the external pipeline described in `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let trainer = ProcessTrainer::new(config.pipeline_command());
        Self::new(TrainingService::new(config.layout(), Arc::new(trainer)))
    }
}

/// Build the application router.
///
/// `/reports` serves the project's reports directory; when `ui_dir` is given,
/// every other unmatched path is served from it.
pub fn router(state: AppState, ui_dir: Option<&Path>) -> Router {
    let reports_dir = state.service.layout().reports_dir();

    let mut app = Router::new()
        .route("/api/upload", post(routes::upload))
        .route("/api/train", post(routes::train))
        .route("/api/results", get(routes::results))
        .nest_service("/reports", ServeDir::new(reports_dir));

    if let Some(ui_dir) = ui_dir {
        app = app.fallback_service(ServeDir::new(ui_dir));
    }

    app.layer(DefaultBodyLimit::disable())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(RequestLoggerLayer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}

/// Start the server and run until Ctrl-C.
pub async fn run(config: &Config) -> Result<()> {
    run_with_shutdown(config, shutdown_on(tokio::signal::ctrl_c())).await
}

/// Resolve when `signal` fires.
///
/// If the signal handler could not be installed the error is logged and the
/// returned future never resolves, so the server keeps running.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for the shutdown signal, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Start the server and run until `shutdown` resolves.
pub async fn run_with_shutdown<F>(config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::from_config(config);
    let layout = state.service.layout().clone();
    layout.ensure_dirs()?;

    let app = router(state, config.project.ui_dir.as_deref());
    let listener = TcpListener::bind(config.server.address).await?;
    let address = listener.local_addr()?;

    info!(
        %address,
        project_root = %layout.root().display(),
        data_dir = %layout.data_dir().display(),
        reports_dir = %layout.reports_dir().display(),
        pipeline = %config.pipeline.program,
        "Server started"
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

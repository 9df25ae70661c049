//! neuroscan Prediction Server
//!
//! HTTP API exposing a trained classifier: upload one scan, get back the
//! predicted label and confidence. Malformed uploads return a client
//! error, never a crash.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use neuroscan::backend::{backend_name, default_device, DefaultBackend};
use neuroscan::Predictor;

use crate::state::AppState;

/// neuroscan prediction server
#[derive(Parser, Debug)]
#[command(name = "neuroscan-server")]
#[command(version)]
#[command(about = "HTTP prediction endpoint for neuroscan trained models")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Path to the trained model directory
    #[arg(short, long, env = "NEUROSCAN_MODEL_DIR")]
    model: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    info!("neuroscan-server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Model:   {:?}", cli.model);
    info!("  Backend: {}", backend_name());

    let device = default_device();
    let predictor = Predictor::<DefaultBackend>::load(&cli.model, device)?;
    info!("  Classes: {:?}", predictor.classes().labels());

    let state = Arc::new(AppState::new(predictor));

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/api/upload", post(routes::upload))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

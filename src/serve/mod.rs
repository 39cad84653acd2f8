use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use axum_server::Handle;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::Error, query::TokenTracker, shutdown::shutdown_signal,
    storage::stats_logger::start_stats_logger,
};

use self::{error::ServeError, types::ServeResponse};

pub mod error;
pub mod routes;
pub mod types;

pub static DEFAULT_SERVE_ADDRESS: &str = "0.0.0.0:8080";

/// Seconds between two storage stats log lines
const DEFAULT_STATS_INTERVAL: u64 = 300;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ServerConfig {
    pub address: Option<String>,
    pub stats_interval_secs: Option<u64>,
}

pub type AppState = Arc<TokenTracker>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/tip", get(tip))
        .route("/rankings", get(routes::tokens::tokens_rankings))
        .nest("/tokens", routes::tokens::router())
        .nest("/addresses", routes::addresses::router())
        .nest("/transactions", routes::transactions::router())
        .with_state(state)
}

pub async fn run(tracker: TokenTracker, config: &ServerConfig) -> Result<(), Error> {
    let address = config.address.as_deref().unwrap_or(DEFAULT_SERVE_ADDRESS);

    let addr = address
        .parse::<SocketAddr>()
        .map_err(|e| Error::Config(format!("invalid server address '{address}': {e}")))?;

    let every = Duration::from_secs(config.stats_interval_secs.unwrap_or(DEFAULT_STATS_INTERVAL));
    tokio::spawn(start_stats_logger(tracker.storage().clone(), every));

    let app = router(Arc::new(tracker));

    let handle = Handle::new();

    tokio::spawn({
        let handle = handle.clone();

        async move {
            shutdown_signal().await;

            info!("shutting down api...");
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    });

    info!("api listening on {}...", addr);

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn root() -> &'static str {
    "Token Tracker API Server"
}

/// Processed Height
///
/// Highest block height fully reflected by the tracker, null before the first block.
async fn tip(State(state): State<AppState>) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;

    Ok(Json(ServeResponse::new(ctx.watermark().height(), &ctx)))
}

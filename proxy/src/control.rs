use crate::error::Result;
use axum::{
    Router,
    extract::{Form, Json, State, rejection::FormRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use common::{Bitrate, SharedLimit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

/// Serves reads and updates of the shared limit over HTTP.
pub struct ControlServer {
    limit: Arc<SharedLimit>,
}

#[derive(Clone)]
struct ControlState {
    limit: Arc<SharedLimit>,
}

/// Body of every reply on `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitResponse {
    pub bitrate: Bitrate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitForm {
    bitrate: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn router(limit: Arc<SharedLimit>) -> Router {
    Router::new()
        .route("/", get(get_limit).post(set_limit))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(ControlState { limit })
}

impl ControlServer {
    pub fn new(limit: Arc<SharedLimit>) -> Self {
        Self { limit }
    }

    #[instrument(skip_all)]
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        info!("Control server listening on {}", listener.local_addr()?);

        axum::serve(listener, router(self.limit))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        info!("Control server stopped");
        Ok(())
    }
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[instrument(skip(state))]
async fn get_limit(State(state): State<ControlState>) -> Json<LimitResponse> {
    Json(LimitResponse {
        bitrate: state.limit.get(),
        error: None,
    })
}

#[instrument(skip(state, form))]
async fn set_limit(
    State(state): State<ControlState>,
    form: std::result::Result<Form<LimitForm>, FormRejection>,
) -> (StatusCode, Json<LimitResponse>) {
    let requested = form
        .map_err(|rejection| rejection.body_text())
        .and_then(|Form(form)| form.bitrate.parse::<Bitrate>().map_err(|e| e.to_string()));

    match requested {
        Ok(bitrate) => {
            let previous = state.limit.replace(bitrate);
            info!("Max bitrate updated from {} to {} bps", previous, bitrate);
            (
                StatusCode::ACCEPTED,
                Json(LimitResponse {
                    bitrate,
                    error: None,
                }),
            )
        }
        Err(reason) => {
            warn!("Rejected max bitrate update: {}", reason);
            (
                StatusCode::NOT_ACCEPTABLE,
                Json(LimitResponse {
                    bitrate: state.limit.get(),
                    error: Some(reason),
                }),
            )
        }
    }
}

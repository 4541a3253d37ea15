use crate::config::Listener as ListenerConfig;
use crate::grid_service::{GridError, GridRequest, GridService, ListHeadersResponse, ListRowsResponse};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum GridApiError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub fn router(service: GridService) -> Router {
    Router::new()
        .route(
            "/api/v1/dashboards/{dashboard}/tabs/{tab}/headers",
            get(list_headers),
        )
        .route("/api/v1/dashboards/{dashboard}/tabs/{tab}/rows", get(list_rows))
        .with_state(service)
}

pub async fn serve(listener: ListenerConfig, service: GridService) -> Result<(), GridApiError> {
    let app = router(service);

    let addr = format!("{}:{}", listener.host, listener.port);
    tracing::info!(addr = %addr, "Grid API listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

#[derive(Deserialize, Debug)]
struct Params {
    #[serde(default)]
    scope: String,
}

// Dropped when the client goes away, which cancels the request.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn grid_request(dashboard: String, tab: String, params: Params) -> GridRequest {
    GridRequest {
        scope: params.scope,
        dashboard,
        tab,
    }
}

async fn list_headers(
    State(service): State<GridService>,
    Path((dashboard, tab)): Path<(String, String)>,
    Query(params): Query<Params>,
) -> Result<Json<ListHeadersResponse>, GridError> {
    let guard = CancelOnDrop(CancellationToken::new());
    let request = grid_request(dashboard, tab, params);
    service.list_headers(&request, &guard.0).await.map(Json)
}

async fn list_rows(
    State(service): State<GridService>,
    Path((dashboard, tab)): Path<(String, String)>,
    Query(params): Query<Params>,
) -> Result<Json<ListRowsResponse>, GridError> {
    let guard = CancelOnDrop(CancellationToken::new());
    let request = grid_request(dashboard, tab, params);
    service.list_rows(&request, &guard.0).await.map(Json)
}

impl IntoResponse for GridError {
    fn into_response(self) -> Response {
        let status = match &self {
            _ if self.is_not_found() => StatusCode::NOT_FOUND,
            GridError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GridError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::warn!(error = %self, "Grid request failed");
        }

        let body = Json(ApiErrorResponse {
            error_message: self.to_string(),
        });

        (status, body).into_response()
    }
}

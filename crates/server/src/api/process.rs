//! The `process_3d` endpoint.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use relay3d_core::metrics::PIPELINE_RUNS;
use relay3d_core::{Committed, ProcessRequest};

use crate::state::AppState;

/// Body of 400 and 500 responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// JSON response carrying the open CORS origin.
fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(body),
    )
        .into_response()
}

fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
        .into_response()
}

/// Handle a `process_3d` request.
///
/// `OPTIONS` answers the CORS preflight; every other method is processed.
/// The response is sent once the preview video is stored; mesh extraction
/// either follows on a background task or is awaited first, depending on
/// `pipeline.detach_mesh_extraction`.
pub async fn process_3d(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return preflight();
    }

    let request = match ProcessRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => {
            PIPELINE_RUNS.with_label_values(&["rejected"]).inc();
            warn!("Rejected process_3d request: {}", e);
            return json_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: e.to_string(),
                    error_type: None,
                },
            );
        }
    };

    match state.orchestrator().run(&request).await {
        Ok(Committed {
            response,
            continuation,
            ..
        }) => {
            if state.detach_mesh_extraction() {
                state.spawn_mesh_extraction(continuation).await;
            } else {
                let outcome = continuation.run().await;
                info!("Mesh extraction finished before responding: {:?}", outcome);
            }
            json_response(StatusCode::OK, response)
        }
        Err(e) => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse {
                error: e.to_string(),
                error_type: Some(e.kind().to_string()),
            },
        ),
    }
}

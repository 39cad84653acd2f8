use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Users request/query was malformed: {0}")]
    MalformedRequest(String),

    #[error("tracker error: {0}")]
    Tracker(#[from] crate::error::Error),
}

impl ServeError {
    pub fn malformed_request(str: impl ToString) -> Self {
        ServeError::MalformedRequest(str.to_string())
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, string) = match self {
            ServeError::MalformedRequest(e) => (
                StatusCode::BAD_REQUEST,
                format!("unable to parse request parameters: {e}"),
            ),
            ServeError::Tracker(_) => {
                error!("internal server error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": string
            })),
        )
            .into_response()
    }
}

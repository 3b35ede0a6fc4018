//! HTTP error mapping

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::EngineError;

#[derive(Debug)]
pub enum ApiError {
    /// No identity header for the route's caller kind.
    Unauthenticated,
    /// Request body that could not be read as the expected JSON.
    Rejected { status: StatusCode, message: String },
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self { Self::Engine(e) }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self { Self::Rejected { status: r.status(), message: r.body_text() } }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Rejected { status, .. } => *status,
            Self::Engine(e) => match e {
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::InvalidArgument(_) | EngineError::InvalidState(_) | EngineError::EmptyCart => StatusCode::BAD_REQUEST,
                EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
                EngineError::Conflict(_) => StatusCode::CONFLICT,
                EngineError::CartNotCleared { .. } | EngineError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Unauthenticated => "Not authorized".to_string(),
            Self::Rejected { message, .. } => message.clone(),
            Self::Engine(e) => e.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }
        let mut body = json!({ "success": false, "message": message });
        if let Self::Engine(EngineError::CartNotCleared { order_id, .. }) = &self {
            body["orderId"] = json!(order_id);
        }
        (status, Json(body)).into_response()
    }
}

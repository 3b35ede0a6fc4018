//! Request body extraction

use axum::{extract::FromRequest, http::StatusCode};
use serde::de::DeserializeOwned;

use crate::api::error::ApiError;

/// `axum::Json` with rejections reported in the API's error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Parses a body that may be left empty. Anything else must be valid JSON.
pub fn optional_json<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some).map_err(|e| ApiError::Rejected {
        status: StatusCode::BAD_REQUEST,
        message: format!("Invalid request body: {e}"),
    })
}

//! Caller identity extractors
//!
//! Authentication happens upstream; the gateway forwards the verified
//! principal in `x-user-id` (buyers) or `x-seller-id` (sellers).

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::api::error::ApiError;
use crate::domain::value_objects::{Caller, SellerId, UserId};

pub const BUYER_HEADER: &str = "x-user-id";
pub const SELLER_HEADER: &str = "x-seller-id";

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub struct Buyer(pub UserId);

pub struct Seller(pub SellerId);

/// Buyer if a buyer header is present, otherwise seller.
pub struct AnyCaller(pub Caller);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Buyer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(parts, BUYER_HEADER).map(|id| Buyer(UserId::new(id))).ok_or(ApiError::Unauthenticated)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Seller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(parts, SELLER_HEADER).map(|id| Seller(SellerId::new(id))).ok_or(ApiError::Unauthenticated)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AnyCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = header(parts, BUYER_HEADER) {
            return Ok(AnyCaller(Caller::Buyer(UserId::new(id))));
        }
        header(parts, SELLER_HEADER)
            .map(|id| AnyCaller(Caller::Seller(SellerId::new(id))))
            .ok_or(ApiError::Unauthenticated)
    }
}

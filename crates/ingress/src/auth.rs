//! Wallet-address checks for admin and owner-only routes.
//!
//! The connected wallet is sent in the `x-wallet-address` header. Admin
//! routes compare it against the configured allow-list.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use suigives_common::normalize_address;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

pub const WALLET_HEADER: &str = "x-wallet-address";

/// Normalized wallet address from the request headers.
pub fn wallet_address(headers: &HeaderMap) -> Option<String> {
    headers
        .get(WALLET_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(normalize_address)
}

/// Middleware that rejects callers outside the admin allow-list with 403.
pub async fn admin_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match wallet_address(req.headers()) {
        Some(addr) if state.is_admin(&addr) => next.run(req).await,
        other => {
            warn!(
                wallet = other.as_deref().unwrap_or("-"),
                path = %req.uri().path(),
                "admin access denied"
            );
            ApiError::Forbidden("admin wallet required").into_response()
        }
    }
}

/// The caller must be the owner of `address`.
pub fn require_owner(headers: &HeaderMap, address: &str) -> Result<String, ApiError> {
    let owner = normalize_address(address)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid address: {}", address)))?;
    match wallet_address(headers) {
        Some(wallet) if wallet == owner => Ok(owner),
        _ => Err(ApiError::Forbidden("wallet does not own this profile")),
    }
}

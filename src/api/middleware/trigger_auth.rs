//! Shared-secret protection for the dispatch trigger and token registration.
//!
//! When a secret is configured the caller must send
//! `Authorization: Bearer <secret>`. Digests are compared in constant time.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::api::error::ApiError;
use crate::api::types::{hash_secret, ApiContext};

pub async fn require_trigger_secret(req: Request, next: Next) -> Response {
    match check(&req) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

fn check(req: &Request) -> Result<(), ApiError> {
    let ctx = req
        .extensions()
        .get::<ApiContext>()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let Some(expected) = ctx.trigger_secret_hash else {
        return Ok(());
    };

    let presented = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if bool::from(hash_secret(presented)[..].ct_eq(&expected[..])) {
        Ok(())
    } else {
        tracing::warn!(path = %req.uri().path(), "Request rejected: wrong secret");
        Err(ApiError::Unauthorized)
    }
}

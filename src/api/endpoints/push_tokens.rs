//! Push token registration.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, RegisterPushTokenRequest, RegisterPushTokenResponse};
use crate::db;

const MAX_TOKEN_LEN: usize = 4096;

/// `POST /api/users/:id/push-tokens`: idempotent; 201 when the token is
/// new, 200 when it was already registered. Behind the shared secret.
pub async fn register(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<String>,
    Json(body): Json<RegisterPushTokenRequest>,
) -> Result<(StatusCode, Json<RegisterPushTokenResponse>), ApiError> {
    let token = body.token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("token must not be empty".into()));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(ApiError::BadRequest("token is too long".into()));
    }

    let registered = ctx
        .core
        .db()
        .with_conn(|conn| db::add_push_token(conn, &user_id, token))?;

    tracing::info!(user_id = %user_id, registered, "Push token registration");
    let status = if registered {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(RegisterPushTokenResponse { registered })))
}

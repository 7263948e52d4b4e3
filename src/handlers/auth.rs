use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};

use crate::auth::AuthUser;
use crate::domain::Account;
use crate::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::Result;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let Json(req) = payload?;
    let session = state.identity.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: session.token,
            user: session.account,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(req) = payload?;
    let session = state.identity.login(req).await?;
    Ok(Json(AuthResponse {
        token: session.token,
        user: session.account,
    }))
}

pub async fn me(user: AuthUser, State(state): State<AppState>) -> Result<Json<Account>> {
    Ok(Json(state.identity.me(user.account_id).await?))
}

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use super::parse_id;
use crate::auth::AuthUser;
use crate::domain::Gift;
use crate::dto::{BalanceChangeResponse, GiftRequest};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub async fn send_gift(
    user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<GiftRequest>, JsonRejection>,
) -> Result<Json<BalanceChangeResponse>> {
    let Json(req) = payload?;
    let amount = req
        .amount
        .ok_or_else(|| AppError::InvalidAmount("amount is required".to_string()))?;
    let video_id = parse_id(&req.video_id, "Video")?;
    let new_balance = state
        .wallet
        .send_gift(user.account_id, video_id, amount)
        .await?;
    Ok(Json(BalanceChangeResponse {
        msg: "Gift sent successfully",
        new_balance,
    }))
}

pub async fn gifts_received(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Gift>>> {
    Ok(Json(state.wallet.gifts_received(user.account_id).await?))
}

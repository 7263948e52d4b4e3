use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::auth::AuthUser;
use crate::domain::WalletTransaction;
use crate::dto::{AddFundsRequest, BalanceChangeResponse, BalanceResponse};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub async fn balance(user: AuthUser, State(state): State<AppState>) -> Result<Json<BalanceResponse>> {
    let balance = state.wallet.balance(user.account_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

pub async fn add_funds(
    user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<AddFundsRequest>, JsonRejection>,
) -> Result<Json<BalanceChangeResponse>> {
    let Json(req) = payload?;
    let amount = req
        .amount
        .ok_or_else(|| AppError::InvalidAmount("amount is required".to_string()))?;
    let new_balance = state.wallet.add_funds(user.account_id, amount).await?;
    Ok(Json(BalanceChangeResponse {
        msg: "Funds added successfully",
        new_balance,
    }))
}

pub async fn history(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<WalletTransaction>>> {
    Ok(Json(state.wallet.history(user.account_id).await?))
}

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use super::parse_id;
use crate::auth::AuthUser;
use crate::domain::CommentWithAuthor;
use crate::dto::CommentRequest;
use crate::error::Result;
use crate::state::AppState;

pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<CommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentWithAuthor>)> {
    let Json(req) = payload?;
    let comment = state
        .social
        .add_comment(user.account_id, req.video_id, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<Vec<CommentWithAuthor>>> {
    let video_id = parse_id(&video_id, "Video")?;
    Ok(Json(state.social.list_comments(video_id).await?))
}

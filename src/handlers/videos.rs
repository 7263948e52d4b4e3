use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use super::parse_id;
use crate::auth::AuthUser;
use crate::domain::{Video, VideoListing};
use crate::dto::{BalanceChangeResponse, FeedQuery, UploadVideoForm};
use crate::error::{AppError, Result};
use crate::media::UploadedFile;
use crate::services::VideoDetails;
use crate::state::AppState;

/// Multipart field carrying the short-form file.
pub const FILE_FIELD: &str = "videoFile";

pub async fn upload(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Video>)> {
    let form = read_upload_form(multipart, state.media.max_bytes()).await?;
    let video = state.catalog.upload_video(user.account_id, form).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

pub async fn feed(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<VideoListing>>> {
    Ok(Json(state.catalog.get_feed(query.page()).await?))
}

pub async fn purchased(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<VideoListing>>> {
    Ok(Json(
        state.catalog.get_purchased_videos(user.account_id).await?,
    ))
}

pub async fn details(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VideoDetails>> {
    let video_id = parse_id(&id, "Video")?;
    Ok(Json(
        state
            .catalog
            .get_video_details(user.account_id, video_id)
            .await?,
    ))
}

pub async fn purchase(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BalanceChangeResponse>> {
    let video_id = parse_id(&id, "Video")?;
    let new_balance = state.wallet.purchase_video(user.account_id, video_id).await?;
    Ok(Json(BalanceChangeResponse {
        msg: "Purchase successful",
        new_balance,
    }))
}

async fn read_upload_form(mut multipart: Multipart, max_bytes: u64) -> Result<UploadVideoForm> {
    let mut form = UploadVideoForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => form.file = Some(read_file(field, max_bytes).await?),
            "title" => form.title = Some(field.text().await.map_err(multipart_error)?),
            "description" => form.description = Some(field.text().await.map_err(multipart_error)?),
            "type" => form.kind = Some(field.text().await.map_err(multipart_error)?),
            "url" => form.url = Some(field.text().await.map_err(multipart_error)?),
            "price" => form.price = Some(field.text().await.map_err(multipart_error)?),
            other => debug!("Ignoring unknown upload field '{}'", other),
        }
    }
    Ok(form)
}

/// Buffers the file, giving up as soon as it passes `max_bytes`.
async fn read_file(mut field: Field<'_>, max_bytes: u64) -> Result<UploadedFile> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let size = (bytes.len() + chunk.len()) as u64;
        if size > max_bytes {
            return Err(AppError::FileTooLarge {
                size_bytes: size,
                limit_bytes: max_bytes,
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(UploadedFile {
        file_name,
        content_type,
        bytes,
    })
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::validation(format!("malformed multipart body: {e}"))
}

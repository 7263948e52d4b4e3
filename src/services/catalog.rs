use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Amount, Video, VideoKind, VideoListing};
use crate::dto::UploadVideoForm;
use crate::error::{AppError, Result};
use crate::media::MediaStore;
use crate::storage::Storage;

static EXTERNAL_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/]+\S*$").expect("external url pattern is valid"));

/// Video metadata plus whether the viewer may play it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video: VideoListing,
    pub has_purchased: bool,
}

pub struct CatalogService {
    storage: Arc<dyn Storage>,
    media: Arc<MediaStore>,
    page_size: usize,
}

impl CatalogService {
    pub fn new(storage: Arc<dyn Storage>, media: Arc<MediaStore>, page_size: usize) -> Self {
        Self {
            storage,
            media,
            page_size,
        }
    }

    /// Creates a short-form video from an uploaded file or a long-form video
    /// from an external URL.
    pub async fn upload_video(&self, creator_id: Uuid, form: UploadVideoForm) -> Result<Video> {
        let title = non_blank(form.title)
            .ok_or_else(|| AppError::validation("title is required"))?;
        let kind: VideoKind = non_blank(form.kind)
            .ok_or_else(|| AppError::validation("type is required"))?
            .parse()?;
        let description = non_blank(form.description);

        let video = match kind {
            VideoKind::Short => {
                let file = form
                    .file
                    .ok_or_else(|| AppError::InvalidFile("Short-form file required".to_string()))?;
                let file_path = self.media.store(&file).await?;
                Video::short(creator_id, title, description, file_path)
            }
            VideoKind::Long => {
                let url = non_blank(form.url)
                    .ok_or_else(|| AppError::validation("Long-form URL required"))?;
                if !EXTERNAL_URL.is_match(&url) {
                    return Err(AppError::validation("url must be an http(s) link"));
                }
                let price = parse_price(form.price.as_deref())?;
                Video::long(creator_id, title, description, url, price)
            }
        };

        self.storage.create_video(&video).await?;
        info!(
            video_id = %video.id,
            creator_id = %creator_id,
            kind = %video.kind,
            price = video.price,
            "Video uploaded"
        );
        Ok(video)
    }

    /// One page of the feed, newest first. Pages start at 1; anything lower
    /// is treated as 1.
    pub async fn get_feed(&self, page: Option<i64>) -> Result<Vec<VideoListing>> {
        let page = page.unwrap_or(1).max(1);
        let offset = usize::try_from(page - 1)
            .ok()
            .and_then(|skipped| skipped.checked_mul(self.page_size))
            .filter(|offset| i64::try_from(*offset).is_ok());
        match offset {
            Some(offset) => self.storage.get_feed(self.page_size, offset).await,
            // No feed is long enough to reach this page.
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_video_details(&self, viewer_id: Uuid, video_id: Uuid) -> Result<VideoDetails> {
        let video = self
            .storage
            .get_video_by_id(video_id)
            .await?
            .ok_or_else(|| AppError::not_found("Video"))?;

        let has_purchased = if video.video.requires_purchase() {
            self.storage.has_entitlement(viewer_id, video_id).await?
        } else {
            true
        };
        Ok(VideoDetails {
            video,
            has_purchased,
        })
    }

    pub async fn get_purchased_videos(&self, viewer_id: Uuid) -> Result<Vec<VideoListing>> {
        self.storage.get_purchased_videos(viewer_id).await
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Missing or blank means free.
fn parse_price(raw: Option<&str>) -> Result<Amount> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(0),
        Some(raw) => raw,
    };
    let price: Amount = raw
        .parse()
        .map_err(|_| AppError::InvalidAmount(format!("price '{raw}' is not a whole number")))?;
    if price < 0 {
        return Err(AppError::InvalidAmount("price must not be negative".to_string()));
    }
    Ok(price)
}

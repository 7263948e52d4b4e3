use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Comment, CommentWithAuthor, CreatorSummary};
use crate::error::{AppError, Result};
use crate::storage::Storage;

pub struct SocialService {
    storage: Arc<dyn Storage>,
}

impl SocialService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn add_comment(
        &self,
        author_id: Uuid,
        video_id: Uuid,
        text: &str,
    ) -> Result<CommentWithAuthor> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::EmptyComment);
        }
        if self.storage.get_video_by_id(video_id).await?.is_none() {
            return Err(AppError::not_found("Video"));
        }
        let author = self
            .storage
            .get_account_by_id(author_id)
            .await?
            .ok_or_else(|| AppError::not_found("Account"))?;

        let comment = Comment::new(video_id, author_id, text.to_string());
        self.storage.create_comment(&comment).await?;
        debug!("Comment {} added to video {}", comment.id, video_id);

        Ok(CommentWithAuthor {
            comment,
            author: CreatorSummary {
                id: author.id,
                username: author.username,
            },
        })
    }

    /// Newest first. An unknown video simply has no comments.
    pub async fn list_comments(&self, video_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        self.storage.get_comments_for_video(video_id).await
    }
}

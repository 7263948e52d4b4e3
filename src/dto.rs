//! Request and response bodies for the HTTP API.
//!
//! Field names follow the JSON the web client already speaks (camelCase,
//! `msg` for human-readable text).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Account, Amount};
use crate::media::UploadedFile;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Account,
}

/// Multipart upload fields. Everything is optional at the wire level; the
/// catalog service decides what is required for each video type.
#[derive(Debug, Default)]
pub struct UploadVideoForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub url: Option<String>,
    pub price: Option<String>,
    pub file: Option<UploadedFile>,
}

/// `page` is kept as text so a malformed value falls back to the first page.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub page: Option<String>,
}

impl FeedQuery {
    pub fn page(&self) -> Option<i64> {
        self.page.as_deref().and_then(|p| p.trim().parse().ok())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftRequest {
    /// Raw text; a malformed id is reported as an unknown video.
    pub video_id: String,
    pub amount: Option<Amount>,
}

#[derive(Debug, Deserialize)]
pub struct AddFundsRequest {
    pub amount: Option<Amount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub video_id: Uuid,
    #[serde(default)]
    pub text: String,
}

/// Reply to every wallet-moving call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChangeResponse {
    pub msg: &'static str,
    pub new_balance: Amount,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Amount,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gift_request_accepts_camel_case() {
        let id = Uuid::new_v4();
        let req: GiftRequest =
            serde_json::from_str(&format!(r#"{{"videoId":"{id}","amount":25}}"#)).unwrap();
        assert_eq!(req.video_id, id.to_string());
        assert_eq!(req.amount, Some(25));

        let missing: GiftRequest = serde_json::from_str(&format!(r#"{{"videoId":"{id}"}}"#)).unwrap();
        assert_eq!(missing.amount, None);
    }

    #[test]
    fn test_comment_request_text_defaults_to_empty() {
        let id = Uuid::new_v4();
        let req: CommentRequest = serde_json::from_str(&format!(r#"{{"videoId":"{id}"}}"#)).unwrap();
        assert_eq!(req.video_id, id);
        assert!(req.text.is_empty());
    }

    #[test]
    fn test_feed_query_page_is_lenient() {
        let page = |raw: Option<&str>| FeedQuery {
            page: raw.map(str::to_string),
        }
        .page();
        assert_eq!(page(Some("3")), Some(3));
        assert_eq!(page(Some("abc")), None);
        assert_eq!(page(None), None);
    }

    #[test]
    fn test_balance_change_shape() {
        let json = serde_json::to_value(BalanceChangeResponse {
            msg: "Purchase successful",
            new_balance: 400,
        })
        .unwrap();
        assert_eq!(json["msg"], "Purchase successful");
        assert_eq!(json["newBalance"], 400);
    }
}

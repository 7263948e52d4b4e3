use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Wallet amounts are integer minor units.
pub type Amount = i64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub wallet: Amount,
    pub created_at: DateTime<Utc>,
}

/// Account fields supplied at registration; the store assigns nothing else.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub wallet: Amount,
    pub created_at: DateTime<Utc>,
}

impl NewAccount {
    pub fn new(username: String, email: String, password_hash: String, wallet: Amount) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            wallet,
            created_at: Utc::now(),
        }
    }

    pub fn into_account(self) -> Account {
        Account {
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            wallet: self.wallet,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoKind {
    Short,
    Long,
}

impl VideoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoKind::Short => "short",
            VideoKind::Long => "long",
        }
    }
}

impl fmt::Display for VideoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(VideoKind::Short),
            "long" => Ok(VideoKind::Long),
            other => Err(AppError::validation(format!(
                "type must be 'short' or 'long', got '{other}'"
            ))),
        }
    }
}

/// A clip (self-hosted file) or linked long-form content.
///
/// Short-form videos carry `file_path` and a zero price; long-form videos carry
/// `url` and an optional price. Immutable once created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: VideoKind,
    pub creator_id: Uuid,
    pub price: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Video {
    pub fn short(
        creator_id: Uuid,
        title: String,
        description: Option<String>,
        file_path: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            kind: VideoKind::Short,
            creator_id,
            price: 0,
            file_path: Some(file_path),
            url: None,
            created_at: Utc::now(),
        }
    }

    pub fn long(
        creator_id: Uuid,
        title: String,
        description: Option<String>,
        url: String,
        price: Amount,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            kind: VideoKind::Long,
            creator_id,
            price,
            file_path: None,
            url: Some(url),
            created_at: Utc::now(),
        }
    }

    /// Whether playback needs an entitlement: only priced long-form content.
    pub fn requires_purchase(&self) -> bool {
        self.kind == VideoKind::Long && self.price > 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSummary {
    pub id: Uuid,
    pub username: String,
}

/// A video with its creator's display name resolved.
#[derive(Debug, Clone, Serialize)]
pub struct VideoListing {
    #[serde(flatten)]
    pub video: Video,
    pub creator: CreatorSummary,
}

/// Proof that an account bought a priced video. One per (account, video).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub id: Uuid,
    pub account_id: Uuid,
    pub video_id: Uuid,
    pub price_paid: Amount,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger entry for a gift from a viewer to a video's creator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: Uuid,
    pub from_account_id: Uuid,
    pub to_creator_id: Uuid,
    pub video_id: Uuid,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl Gift {
    pub fn new(from_account_id: Uuid, to_creator_id: Uuid, video_id: Uuid, amount: Amount) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account_id,
            to_creator_id,
            video_id,
            amount,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub video_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(video_id: Uuid, author_id: Uuid, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id,
            author_id,
            text,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: CreatorSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Add,
    Purchase,
    Gift,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Add => "add",
            TransactionKind::Purchase => "purchase",
            TransactionKind::Gift => "gift",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(TransactionKind::Add),
            "purchase" => Ok(TransactionKind::Purchase),
            "gift" => Ok(TransactionKind::Gift),
            other => Err(AppError::database(format!("unknown transaction kind '{other}'"))),
        }
    }
}

/// One line of an account's wallet history. `amount` is always positive;
/// `kind` says which direction it moved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Amount,
    pub balance_after: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn new(
        account_id: Uuid,
        kind: TransactionKind,
        amount: Amount,
        balance_after: Amount,
        video_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount,
            balance_after,
            video_id,
            created_at: Utc::now(),
        }
    }
}

/// Result of a committed purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub entitlement: Entitlement,
    pub new_balance: Amount,
}

/// Result of a committed gift.
#[derive(Debug, Clone)]
pub struct GiftReceipt {
    pub gift: Gift,
    pub new_balance: Amount,
}

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

use crate::config::Config;
use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Storage trait for persisting accounts, videos, entitlements, gifts,
/// comments and wallet history.
///
/// The three money-moving operations (`purchase`, `send_gift`,
/// `credit_wallet`) are each a single indivisible unit: the balance check,
/// the wallet write and every record they create either all land or none do.
#[async_trait]
pub trait Storage: Send + Sync {
    // Account operations
    /// Fails with `Conflict` when the username or email is already taken.
    async fn create_account(&self, account: NewAccount) -> Result<Account>;
    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>>;
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    // Video operations
    async fn create_video(&self, video: &Video) -> Result<()>;
    async fn get_video_by_id(&self, video_id: Uuid) -> Result<Option<VideoListing>>;
    /// Newest first.
    async fn get_feed(&self, limit: usize, offset: usize) -> Result<Vec<VideoListing>>;

    // Entitlement operations
    async fn has_entitlement(&self, account_id: Uuid, video_id: Uuid) -> Result<bool>;
    /// Videos the account holds an entitlement for, most recently bought first.
    async fn get_purchased_videos(&self, account_id: Uuid) -> Result<Vec<VideoListing>>;

    // Money movement
    /// Debits `price` and records the entitlement. Checks, in order:
    /// `AlreadyPurchased`, `NotFound` (account), `InsufficientBalance`.
    async fn purchase(
        &self,
        account_id: Uuid,
        video_id: Uuid,
        price: Amount,
    ) -> Result<PurchaseReceipt>;
    /// Debits the sender and appends the gift to the ledger. The recipient's
    /// wallet is left untouched.
    async fn send_gift(&self, gift: Gift) -> Result<GiftReceipt>;
    /// Credits the account and returns its new balance.
    async fn credit_wallet(&self, account_id: Uuid, amount: Amount) -> Result<Amount>;
    /// Newest first.
    async fn get_wallet_transactions(&self, account_id: Uuid) -> Result<Vec<WalletTransaction>>;
    /// Newest first.
    async fn get_gifts_received(&self, creator_id: Uuid) -> Result<Vec<Gift>>;

    // Comment operations
    async fn create_comment(&self, comment: &Comment) -> Result<()>;
    /// Newest first.
    async fn get_comments_for_video(&self, video_id: Uuid) -> Result<Vec<CommentWithAuthor>>;
}

/// Opens the store named by `database_url`: `:memory:` or a SQLite file path.
pub fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    if config.uses_in_memory_storage() {
        tracing::warn!("Using in-memory storage; data is lost on restart");
        Ok(Arc::new(InMemoryStorage::new()))
    } else {
        Ok(Arc::new(SqliteStorage::open(&config.database_url)?))
    }
}

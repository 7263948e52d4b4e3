use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Amount, Gift, GiftReceipt, PurchaseReceipt, WalletTransaction};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::storage::Storage;

/// The only component that moves money.
///
/// Each operation validates its input, then hands the balance check and the
/// write to a single atomic storage call.
pub struct WalletService {
    storage: Arc<dyn Storage>,
    min_top_up: Amount,
}

impl WalletService {
    pub fn new(storage: Arc<dyn Storage>, min_top_up: Amount) -> Self {
        Self {
            storage,
            min_top_up,
        }
    }

    /// Buys access to a priced long-form video. Returns the new balance.
    ///
    /// Checks, first failure wins: the video exists, it needs a purchase, the
    /// caller does not already own it, the caller can afford it. The purchase
    /// does not credit the creator.
    pub async fn purchase_video(&self, purchaser_id: Uuid, video_id: Uuid) -> Result<Amount> {
        let receipt = self
            .try_purchase(purchaser_id, video_id)
            .await
            .map_err(|e| rejected("purchase", e))?;
        metrics::record_purchase();
        info!(
            account_id = %purchaser_id,
            video_id = %video_id,
            price = receipt.entitlement.price_paid,
            new_balance = receipt.new_balance,
            "Video purchased"
        );
        Ok(receipt.new_balance)
    }

    /// Sends `amount` from the caller to the video's creator. Returns the
    /// sender's new balance.
    ///
    /// Only the sender is debited; the gift is recorded in the ledger and the
    /// creator's wallet is not credited. Gifting one's own video is allowed.
    pub async fn send_gift(&self, sender_id: Uuid, video_id: Uuid, amount: Amount) -> Result<Amount> {
        let receipt = self
            .try_send_gift(sender_id, video_id, amount)
            .await
            .map_err(|e| rejected("gift", e))?;
        metrics::record_gift(amount);
        info!(
            account_id = %sender_id,
            creator_id = %receipt.gift.to_creator_id,
            video_id = %video_id,
            amount,
            new_balance = receipt.new_balance,
            "Gift sent"
        );
        Ok(receipt.new_balance)
    }

    /// Credits an already-authorized top-up. Returns the new balance.
    pub async fn add_funds(&self, account_id: Uuid, amount: Amount) -> Result<Amount> {
        if amount < self.min_top_up {
            return Err(rejected(
                "top_up",
                AppError::InvalidAmount(format!("top-up must be at least {}", self.min_top_up)),
            ));
        }
        let new_balance = self
            .storage
            .credit_wallet(account_id, amount)
            .await
            .map_err(|e| rejected("top_up", e))?;
        metrics::record_top_up();
        info!(account_id = %account_id, amount, new_balance, "Wallet topped up");
        Ok(new_balance)
    }

    async fn try_purchase(&self, purchaser_id: Uuid, video_id: Uuid) -> Result<PurchaseReceipt> {
        let listing = self
            .storage
            .get_video_by_id(video_id)
            .await?
            .ok_or_else(|| AppError::not_found("Video"))?;
        if !listing.video.requires_purchase() {
            return Err(AppError::NoPurchaseNeeded);
        }
        self.storage
            .purchase(purchaser_id, video_id, listing.video.price)
            .await
    }

    async fn try_send_gift(&self, sender_id: Uuid, video_id: Uuid, amount: Amount) -> Result<GiftReceipt> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(
                "gift amount must be greater than zero".to_string(),
            ));
        }
        let listing = self
            .storage
            .get_video_by_id(video_id)
            .await?
            .ok_or_else(|| AppError::not_found("Video"))?;
        let gift = Gift::new(sender_id, listing.video.creator_id, video_id, amount);
        self.storage.send_gift(gift).await
    }

    pub async fn balance(&self, account_id: Uuid) -> Result<Amount> {
        self.storage
            .get_account_by_id(account_id)
            .await?
            .map(|a| a.wallet)
            .ok_or_else(|| AppError::not_found("Account"))
    }

    pub async fn history(&self, account_id: Uuid) -> Result<Vec<WalletTransaction>> {
        self.storage.get_wallet_transactions(account_id).await
    }

    pub async fn gifts_received(&self, creator_id: Uuid) -> Result<Vec<Gift>> {
        self.storage.get_gifts_received(creator_id).await
    }
}

fn rejected(operation: &'static str, err: AppError) -> AppError {
    if !err.status().is_server_error() {
        debug!(operation, kind = err.kind(), "Wallet operation rejected: {}", err);
        metrics::record_rejection(operation, err.kind());
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewAccount, TransactionKind, Video};
    use crate::storage::InMemoryStorage;

    struct Fixture {
        storage: Arc<dyn Storage>,
        wallet: WalletService,
    }

    impl Fixture {
        fn new() -> Self {
            let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
            Self {
                wallet: WalletService::new(storage.clone(), 1),
                storage,
            }
        }

        async fn account(&self, name: &str, wallet: Amount) -> Uuid {
            self.storage
                .create_account(NewAccount::new(
                    name.into(),
                    format!("{name}@example.com"),
                    "hash".into(),
                    wallet,
                ))
                .await
                .unwrap()
                .id
        }

        async fn long_video(&self, creator: Uuid, price: Amount) -> Uuid {
            let video = Video::long(creator, "talk".into(), None, "https://v.example/t".into(), price);
            self.storage.create_video(&video).await.unwrap();
            video.id
        }
    }

    #[tokio::test]
    async fn test_purchase_free_content_needs_no_purchase() {
        let f = Fixture::new();
        let creator = f.account("cara", 0).await;
        let viewer = f.account("ann", 500).await;
        let free = f.long_video(creator, 0).await;
        let clip = Video::short(creator, "clip".into(), None, "/uploads/x.mp4".into());
        f.storage.create_video(&clip).await.unwrap();

        for id in [free, clip.id] {
            let err = f.wallet.purchase_video(viewer, id).await.unwrap_err();
            assert!(matches!(err, AppError::NoPurchaseNeeded));
        }
        assert_eq!(f.wallet.balance(viewer).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_purchase_unknown_video_is_not_found() {
        let f = Fixture::new();
        let viewer = f.account("ann", 500).await;
        let err = f
            .wallet
            .purchase_video(viewer, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_already_purchased_wins_over_insufficient_balance() {
        let f = Fixture::new();
        let creator = f.account("cara", 0).await;
        let viewer = f.account("ann", 100).await;
        let video = f.long_video(creator, 100).await;

        assert_eq!(f.wallet.purchase_video(viewer, video).await.unwrap(), 0);
        let err = f.wallet.purchase_video(viewer, video).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyPurchased));
    }

    #[tokio::test]
    async fn test_gift_amount_checked_before_video_lookup() {
        let f = Fixture::new();
        let viewer = f.account("ann", 100).await;
        for amount in [0, -5] {
            let err = f
                .wallet
                .send_gift(viewer, Uuid::new_v4(), amount)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidAmount(_)));
        }
        let err = f.wallet.send_gift(viewer, Uuid::new_v4(), 5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_self_gift_is_allowed() {
        let f = Fixture::new();
        let creator = f.account("cara", 100).await;
        let video = f.long_video(creator, 0).await;

        assert_eq!(f.wallet.send_gift(creator, video, 40).await.unwrap(), 60);
        let received = f.wallet.gifts_received(creator).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].from_account_id, creator);
    }

    #[tokio::test]
    async fn test_add_funds_respects_minimum_and_records_history() {
        let f = Fixture::new();
        let viewer = f.account("ann", 10).await;

        let err = f.wallet.add_funds(viewer, 0).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));

        assert_eq!(f.wallet.add_funds(viewer, 25).await.unwrap(), 35);
        let history = f.wallet.history(viewer).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Add);
        assert_eq!(history[0].balance_after, 35);
    }

    #[tokio::test]
    async fn test_add_funds_unknown_account() {
        let f = Fixture::new();
        let err = f.wallet.add_funds(Uuid::new_v4(), 10).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

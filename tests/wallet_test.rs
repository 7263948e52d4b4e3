use std::sync::Arc;

use boom_server::domain::{Amount, NewAccount, TransactionKind, Video};
use boom_server::error::AppError;
use boom_server::media::MediaStore;
use boom_server::services::{CatalogService, WalletService};
use boom_server::storage::{InMemoryStorage, SqliteStorage, Storage};
use tempfile::TempDir;
use uuid::Uuid;

struct Harness {
    storage: Arc<dyn Storage>,
    wallet: Arc<WalletService>,
    catalog: CatalogService,
    _dir: TempDir,
}

impl Harness {
    fn in_memory() -> Self {
        Self::with_storage(Arc::new(InMemoryStorage::new()), TempDir::new().unwrap())
    }

    fn sqlite() -> Self {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::open(dir.path().join("boom.db")).unwrap();
        Self::with_storage(Arc::new(storage), dir)
    }

    fn with_storage(storage: Arc<dyn Storage>, dir: TempDir) -> Self {
        let media = Arc::new(MediaStore::new(
            dir.path().join("uploads"),
            1024,
            vec!["mp4".to_string()],
        ));
        Self {
            wallet: Arc::new(WalletService::new(storage.clone(), 1)),
            catalog: CatalogService::new(storage.clone(), media, 10),
            storage,
            _dir: dir,
        }
    }

    async fn account(&self, name: &str, wallet: Amount) -> Uuid {
        self.storage
            .create_account(NewAccount::new(
                name.to_string(),
                format!("{name}@example.com"),
                "not-a-real-hash".to_string(),
                wallet,
            ))
            .await
            .unwrap()
            .id
    }

    async fn long_video(&self, creator: Uuid, price: Amount) -> Uuid {
        let video = Video::long(
            creator,
            "Deep dive".to_string(),
            Some("two hours of content".to_string()),
            "https://www.youtube.com/watch?v=abc123".to_string(),
            price,
        );
        self.storage.create_video(&video).await.unwrap();
        video.id
    }

    async fn balance(&self, account: Uuid) -> Amount {
        self.wallet.balance(account).await.unwrap()
    }
}

fn backends() -> Vec<(&'static str, Harness)> {
    vec![("memory", Harness::in_memory()), ("sqlite", Harness::sqlite())]
}

#[tokio::test]
async fn test_purchase_then_repurchase() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 500).await;
        let creator = h.account("cara", 500).await;
        let video = h.long_video(creator, 100).await;

        let before = h.catalog.get_video_details(viewer, video).await.unwrap();
        assert!(!before.has_purchased, "{name}");

        assert_eq!(h.wallet.purchase_video(viewer, video).await.unwrap(), 400, "{name}");
        assert_eq!(h.balance(viewer).await, 400, "{name}");
        let after = h.catalog.get_video_details(viewer, video).await.unwrap();
        assert!(after.has_purchased, "{name}");

        let err = h.wallet.purchase_video(viewer, video).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyPurchased), "{name}: {err:?}");
        assert_eq!(h.balance(viewer).await, 400, "{name}");

        // The creator is not paid by a purchase.
        assert_eq!(h.balance(creator).await, 500, "{name}");

        let purchased = h.catalog.get_purchased_videos(viewer).await.unwrap();
        assert_eq!(purchased.len(), 1, "{name}");
        assert_eq!(purchased[0].video.id, video, "{name}");
        assert_eq!(purchased[0].creator.username, "cara", "{name}");
    }
}

#[tokio::test]
async fn test_purchase_insufficient_balance_changes_nothing() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 50).await;
        let creator = h.account("cara", 0).await;
        let video = h.long_video(creator, 100).await;

        let err = h.wallet.purchase_video(viewer, video).await.unwrap_err();
        assert!(
            matches!(
                err,
                AppError::InsufficientBalance {
                    required: 100,
                    available: 50
                }
            ),
            "{name}: {err:?}"
        );
        assert_eq!(h.balance(viewer).await, 50, "{name}");
        assert!(
            !h.storage.has_entitlement(viewer, video).await.unwrap(),
            "{name}"
        );
        assert!(h.wallet.history(viewer).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_gift_debits_sender_only() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 500).await;
        let creator = h.account("cara", 20).await;
        let video = h.long_video(creator, 0).await;

        assert_eq!(h.wallet.send_gift(viewer, video, 75).await.unwrap(), 425, "{name}");
        assert_eq!(h.balance(viewer).await, 425, "{name}");
        assert_eq!(h.balance(creator).await, 20, "{name}");

        let gifts = h.wallet.gifts_received(creator).await.unwrap();
        assert_eq!(gifts.len(), 1, "{name}");
        let gift = &gifts[0];
        assert_eq!(gift.from_account_id, viewer, "{name}");
        assert_eq!(gift.to_creator_id, creator, "{name}");
        assert_eq!(gift.video_id, video, "{name}");
        assert_eq!(gift.amount, 75, "{name}");

        let history = h.wallet.history(viewer).await.unwrap();
        assert_eq!(history.len(), 1, "{name}");
        assert_eq!(history[0].kind, TransactionKind::Gift, "{name}");
        assert_eq!(history[0].balance_after, 425, "{name}");
        assert_eq!(history[0].video_id, Some(video), "{name}");
    }
}

#[tokio::test]
async fn test_gift_insufficient_balance_creates_no_gift() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 50).await;
        let creator = h.account("cara", 0).await;
        let video = h.long_video(creator, 0).await;

        let err = h.wallet.send_gift(viewer, video, 100).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance { .. }), "{name}");
        assert_eq!(h.balance(viewer).await, 50, "{name}");
        assert!(h.wallet.gifts_received(creator).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_non_positive_gift_is_invalid_amount() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 50).await;
        let creator = h.account("cara", 0).await;
        let video = h.long_video(creator, 0).await;

        for amount in [0, -1, -100] {
            let err = h.wallet.send_gift(viewer, video, amount).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidAmount(_)), "{name}: {err:?}");
        }
        assert_eq!(h.balance(viewer).await, 50, "{name}");
        assert!(h.wallet.gifts_received(creator).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_wallet_history_is_newest_first() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 100).await;
        let creator = h.account("cara", 0).await;
        let video = h.long_video(creator, 60).await;

        h.wallet.add_funds(viewer, 40).await.unwrap();
        h.wallet.purchase_video(viewer, video).await.unwrap();
        h.wallet.send_gift(viewer, video, 30).await.unwrap();

        let kinds: Vec<_> = h
            .wallet
            .history(viewer)
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.amount, t.balance_after))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (TransactionKind::Gift, 30, 50),
                (TransactionKind::Purchase, 60, 80),
                (TransactionKind::Add, 40, 140),
            ],
            "{name}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_purchases_debit_once() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 100).await;
        let creator = h.account("cara", 0).await;
        let video = h.long_video(creator, 100).await;

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let wallet = h.wallet.clone();
                tokio::spawn(async move { wallet.purchase_video(viewer, video).await })
            })
            .collect();

        let mut successes = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(balance) => {
                    assert_eq!(balance, 0, "{name}");
                    successes += 1;
                }
                Err(AppError::AlreadyPurchased) | Err(AppError::InsufficientBalance { .. }) => {}
                Err(other) => panic!("{name}: unexpected error {other:?}"),
            }
        }

        assert_eq!(successes, 1, "{name}");
        assert_eq!(h.balance(viewer).await, 0, "{name}");
        assert_eq!(h.catalog.get_purchased_videos(viewer).await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gifts_never_overdraw() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 100).await;
        let creator = h.account("cara", 0).await;
        let video = h.long_video(creator, 0).await;

        let attempts: Vec<_> = (0..10)
            .map(|_| {
                let wallet = h.wallet.clone();
                tokio::spawn(async move { wallet.send_gift(viewer, video, 30).await })
            })
            .collect();

        let mut successes = 0;
        for attempt in attempts {
            if attempt.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 3, "{name}");
        assert_eq!(h.balance(viewer).await, 10, "{name}");
        assert_eq!(h.wallet.gifts_received(creator).await.unwrap().len(), 3, "{name}");
    }
}

#[tokio::test]
async fn test_top_up_past_max_balance_is_invalid_amount() {
    for (name, h) in backends() {
        let viewer = h.account("ann", 10).await;

        let err = h.wallet.add_funds(viewer, Amount::MAX).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)), "{name}: {err:?}");
        assert_eq!(h.balance(viewer).await, 10, "{name}");
        assert!(h.wallet.history(viewer).await.unwrap().is_empty(), "{name}");

        assert_eq!(h.wallet.add_funds(viewer, 5).await.unwrap(), 15, "{name}");
    }
}

#[tokio::test]
async fn test_feed_far_past_the_end_is_empty() {
    for (name, h) in backends() {
        let creator = h.account("cara", 0).await;
        for _ in 0..3 {
            h.long_video(creator, 10).await;
        }

        assert_eq!(h.catalog.get_feed(Some(1)).await.unwrap().len(), 3, "{name}");
        assert!(h.catalog.get_feed(Some(i64::MAX)).await.unwrap().is_empty(), "{name}");
        assert!(h.storage.get_feed(10, usize::MAX).await.unwrap().is_empty(), "{name}");
    }
}

use super::Storage;
use crate::domain::*;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    // Insertion order doubles as creation order for newest-first listings.
    videos: Vec<Video>,
    entitlements: Vec<Entitlement>,
    entitlement_keys: HashSet<(Uuid, Uuid)>,
    gifts: Vec<Gift>,
    comments: Vec<Comment>,
    wallet_transactions: Vec<WalletTransaction>,
}

impl Tables {
    fn creator_summary(&self, account_id: Uuid) -> CreatorSummary {
        let username = self
            .accounts
            .get(&account_id)
            .map(|a| a.username.clone())
            .unwrap_or_default();
        CreatorSummary {
            id: account_id,
            username,
        }
    }

    fn listing(&self, video: &Video) -> VideoListing {
        VideoListing {
            video: video.clone(),
            creator: self.creator_summary(video.creator_id),
        }
    }

    fn video(&self, video_id: Uuid) -> Option<&Video> {
        self.videos.iter().find(|v| v.id == video_id)
    }
}

/// In-memory storage implementation for development/testing.
///
/// Every table sits behind one mutex, so each trait method is a single
/// critical section and the money-moving operations cannot interleave.
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("in-memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_account(&self, account: NewAccount) -> Result<Account> {
        let mut tables = self.tables()?;

        let email = account.email.to_lowercase();
        let taken = tables.accounts.values().any(|a| {
            a.username.to_lowercase() == account.username.to_lowercase()
                || a.email.to_lowercase() == email
        });
        if taken {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let account = account.into_account();
        tables.accounts.insert(account.id, account.clone());

        debug!("Created account: {} with id {}", account.username, account.id);
        Ok(account)
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        let tables = self.tables()?;
        Ok(tables.accounts.get(&account_id).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let tables = self.tables()?;
        let email = email.to_lowercase();
        Ok(tables
            .accounts
            .values()
            .find(|a| a.email.to_lowercase() == email)
            .cloned())
    }

    async fn create_video(&self, video: &Video) -> Result<()> {
        let mut tables = self.tables()?;
        tables.videos.push(video.clone());

        debug!("Created video: {} with id {}", video.title, video.id);
        Ok(())
    }

    async fn get_video_by_id(&self, video_id: Uuid) -> Result<Option<VideoListing>> {
        let tables = self.tables()?;
        Ok(tables.video(video_id).map(|v| tables.listing(v)))
    }

    async fn get_feed(&self, limit: usize, offset: usize) -> Result<Vec<VideoListing>> {
        let tables = self.tables()?;
        Ok(tables
            .videos
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .map(|v| tables.listing(v))
            .collect())
    }

    async fn has_entitlement(&self, account_id: Uuid, video_id: Uuid) -> Result<bool> {
        let tables = self.tables()?;
        Ok(tables.entitlement_keys.contains(&(account_id, video_id)))
    }

    async fn get_purchased_videos(&self, account_id: Uuid) -> Result<Vec<VideoListing>> {
        let tables = self.tables()?;
        Ok(tables
            .entitlements
            .iter()
            .rev()
            .filter(|e| e.account_id == account_id)
            .filter_map(|e| tables.video(e.video_id))
            .map(|v| tables.listing(v))
            .collect())
    }

    async fn purchase(
        &self,
        account_id: Uuid,
        video_id: Uuid,
        price: Amount,
    ) -> Result<PurchaseReceipt> {
        let mut tables = self.tables()?;

        if tables.entitlement_keys.contains(&(account_id, video_id)) {
            return Err(AppError::AlreadyPurchased);
        }

        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::not_found("Account"))?;
        if account.wallet < price {
            return Err(AppError::InsufficientBalance {
                required: price,
                available: account.wallet,
            });
        }
        account.wallet -= price;
        let new_balance = account.wallet;

        let entitlement = Entitlement {
            id: Uuid::new_v4(),
            account_id,
            video_id,
            price_paid: price,
            created_at: chrono::Utc::now(),
        };
        tables.entitlement_keys.insert((account_id, video_id));
        tables.entitlements.push(entitlement.clone());
        tables.wallet_transactions.push(WalletTransaction::new(
            account_id,
            TransactionKind::Purchase,
            price,
            new_balance,
            Some(video_id),
        ));

        debug!("Recorded purchase of video {} by {}", video_id, account_id);
        Ok(PurchaseReceipt {
            entitlement,
            new_balance,
        })
    }

    async fn send_gift(&self, gift: Gift) -> Result<GiftReceipt> {
        let mut tables = self.tables()?;

        let sender = tables
            .accounts
            .get_mut(&gift.from_account_id)
            .ok_or_else(|| AppError::not_found("Account"))?;
        if sender.wallet < gift.amount {
            return Err(AppError::InsufficientBalance {
                required: gift.amount,
                available: sender.wallet,
            });
        }
        sender.wallet -= gift.amount;
        let new_balance = sender.wallet;

        tables.wallet_transactions.push(WalletTransaction::new(
            gift.from_account_id,
            TransactionKind::Gift,
            gift.amount,
            new_balance,
            Some(gift.video_id),
        ));
        tables.gifts.push(gift.clone());

        debug!("Recorded gift {} of {}", gift.id, gift.amount);
        Ok(GiftReceipt { gift, new_balance })
    }

    async fn credit_wallet(&self, account_id: Uuid, amount: Amount) -> Result<Amount> {
        let mut tables = self.tables()?;

        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::not_found("Account"))?;
        let new_balance = account
            .wallet
            .checked_add(amount)
            .ok_or_else(|| AppError::InvalidAmount("balance would overflow".to_string()))?;
        account.wallet = new_balance;

        tables.wallet_transactions.push(WalletTransaction::new(
            account_id,
            TransactionKind::Add,
            amount,
            new_balance,
            None,
        ));
        Ok(new_balance)
    }

    async fn get_wallet_transactions(&self, account_id: Uuid) -> Result<Vec<WalletTransaction>> {
        let tables = self.tables()?;
        Ok(tables
            .wallet_transactions
            .iter()
            .rev()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_gifts_received(&self, creator_id: Uuid) -> Result<Vec<Gift>> {
        let tables = self.tables()?;
        Ok(tables
            .gifts
            .iter()
            .rev()
            .filter(|g| g.to_creator_id == creator_id)
            .cloned()
            .collect())
    }

    async fn create_comment(&self, comment: &Comment) -> Result<()> {
        let mut tables = self.tables()?;
        tables.comments.push(comment.clone());

        debug!("Created comment with id {}", comment.id);
        Ok(())
    }

    async fn get_comments_for_video(&self, video_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        let tables = self.tables()?;
        Ok(tables
            .comments
            .iter()
            .rev()
            .filter(|c| c.video_id == video_id)
            .map(|c| CommentWithAuthor {
                comment: c.clone(),
                author: tables.creator_summary(c.author_id),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn account(storage: &InMemoryStorage, name: &str, wallet: Amount) -> Account {
        storage
            .create_account(NewAccount::new(
                name.to_string(),
                format!("{name}@example.com"),
                "hash".to_string(),
                wallet,
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let storage = InMemoryStorage::new();
        account(&storage, "ann", 0).await;

        let err = storage
            .create_account(NewAccount::new(
                "other".into(),
                "ANN@example.com".into(),
                "hash".into(),
                0,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_feed_is_newest_first_and_paginated() {
        let storage = InMemoryStorage::new();
        let creator = account(&storage, "cara", 0).await;
        for i in 0..5 {
            let video = Video::long(
                creator.id,
                format!("v{i}"),
                None,
                format!("https://v.example/{i}"),
                0,
            );
            storage.create_video(&video).await.unwrap();
        }

        let first = storage.get_feed(2, 0).await.unwrap();
        let titles: Vec<_> = first.iter().map(|l| l.video.title.as_str()).collect();
        assert_eq!(titles, vec!["v4", "v3"]);
        assert_eq!(first[0].creator.username, "cara");

        let last = storage.get_feed(2, 4).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].video.title, "v0");
    }

    #[tokio::test]
    async fn test_failed_purchase_leaves_no_trace() {
        let storage = InMemoryStorage::new();
        let buyer = account(&storage, "ann", 50).await;
        let video_id = Uuid::new_v4();

        let err = storage.purchase(buyer.id, video_id, 100).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance { .. }));
        assert!(!storage.has_entitlement(buyer.id, video_id).await.unwrap());
        assert!(storage
            .get_wallet_transactions(buyer.id)
            .await
            .unwrap()
            .is_empty());
        let after = storage.get_account_by_id(buyer.id).await.unwrap().unwrap();
        assert_eq!(after.wallet, 50);
    }

    #[tokio::test]
    async fn test_gift_does_not_credit_recipient() {
        let storage = InMemoryStorage::new();
        let sender = account(&storage, "ann", 100).await;
        let creator = account(&storage, "cara", 0).await;

        let receipt = storage
            .send_gift(Gift::new(sender.id, creator.id, Uuid::new_v4(), 30))
            .await
            .unwrap();
        assert_eq!(receipt.new_balance, 70);

        let creator_after = storage.get_account_by_id(creator.id).await.unwrap().unwrap();
        assert_eq!(creator_after.wallet, 0);
        assert_eq!(storage.get_gifts_received(creator.id).await.unwrap().len(), 1);
    }
}

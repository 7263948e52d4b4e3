use super::Storage;
use crate::domain::*;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const MIGRATION_SQL: &str = include_str!("../../migrations/001_init.sql");

const LISTING_COLUMNS: &str = "v.id, v.title, v.description, v.kind, v.creator_id, v.price, \
     v.file_path, v.url, v.created_at, a.username";

/// SQLite-backed storage.
///
/// Money-moving operations run inside `BEGIN IMMEDIATE` transactions, so the
/// balance check and the write happen under SQLite's write lock. The wallet
/// debit is additionally a conditional `UPDATE ... WHERE wallet >= ?` and the
/// (account, video) entitlement pair carries a unique index.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;
            "#,
        )?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.run_migrations()?;
        info!("Opened SQLite storage at {}", path.display());
        Ok(storage)
    }

    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(MIGRATION_SQL)?;
        debug!("Database schema is up to date");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database connection lock poisoned".to_string()))
    }

    /// Runs a blocking database closure off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::Internal("database connection lock poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| AppError::Internal(format!("database task failed: {e}")))?
    }
}

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        wallet: row.get(4)?,
        created_at: time_at(row, 5)?,
    })
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<VideoListing> {
    let kind: String = row.get(3)?;
    let creator_id = uuid_at(row, 4)?;
    let video = Video {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        kind: kind.parse().map_err(|e: AppError| conversion_error(3, e))?,
        creator_id,
        price: row.get(5)?,
        file_path: row.get(6)?,
        url: row.get(7)?,
        created_at: time_at(row, 8)?,
    };
    Ok(VideoListing {
        video,
        creator: CreatorSummary {
            id: creator_id,
            username: row.get(9)?,
        },
    })
}

fn row_to_gift(row: &Row<'_>) -> rusqlite::Result<Gift> {
    Ok(Gift {
        id: uuid_at(row, 0)?,
        from_account_id: uuid_at(row, 1)?,
        to_creator_id: uuid_at(row, 2)?,
        video_id: uuid_at(row, 3)?,
        amount: row.get(4)?,
        created_at: time_at(row, 5)?,
    })
}

fn row_to_wallet_transaction(row: &Row<'_>) -> rusqlite::Result<WalletTransaction> {
    let kind: String = row.get(2)?;
    Ok(WalletTransaction {
        id: uuid_at(row, 0)?,
        account_id: uuid_at(row, 1)?,
        kind: kind.parse().map_err(|e: AppError| conversion_error(2, e))?,
        amount: row.get(3)?,
        balance_after: row.get(4)?,
        video_id: opt_uuid_at(row, 5)?,
        created_at: time_at(row, 6)?,
    })
}

// SQLITE_CONSTRAINT_PRIMARYKEY and SQLITE_CONSTRAINT_UNIQUE extended codes.
const CONSTRAINT_PRIMARYKEY: i32 = 1555;
const CONSTRAINT_UNIQUE: i32 = 2067;

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation
                && matches!(err.extended_code, CONSTRAINT_PRIMARYKEY | CONSTRAINT_UNIQUE)
    )
}

fn insert_wallet_transaction(conn: &Connection, tx: &WalletTransaction) -> Result<()> {
    conn.execute(
        "INSERT INTO wallet_transactions (id, account_id, kind, amount, balance_after, video_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.id.to_string(),
            tx.account_id.to_string(),
            tx.kind.as_str(),
            tx.amount,
            tx.balance_after,
            tx.video_id.map(|v| v.to_string()),
            ts(&tx.created_at),
        ],
    )?;
    Ok(())
}

/// Conditional debit. Distinguishes a missing account from a short balance
/// only after the guarded update touched no row.
fn debit(conn: &Connection, account_id: Uuid, amount: Amount) -> Result<Amount> {
    let changed = conn.execute(
        "UPDATE accounts SET wallet = wallet - ?1 WHERE id = ?2 AND wallet >= ?1",
        params![amount, account_id.to_string()],
    )?;
    let balance: Option<Amount> = conn
        .query_row(
            "SELECT wallet FROM accounts WHERE id = ?1",
            params![account_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match (changed, balance) {
        (_, None) => Err(AppError::not_found("Account")),
        (0, Some(available)) => Err(AppError::InsufficientBalance {
            required: amount,
            available,
        }),
        (_, Some(new_balance)) => Ok(new_balance),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_account(&self, account: NewAccount) -> Result<Account> {
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO accounts (id, username, email, password_hash, wallet, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    account.id.to_string(),
                    account.username,
                    account.email,
                    account.password_hash,
                    account.wallet,
                    ts(&account.created_at),
                ],
            );
            match inserted {
                Ok(_) => {
                    debug!("Created account: {} with id {}", account.username, account.id);
                    Ok(account.into_account())
                }
                Err(e) if is_unique_violation(&e) => {
                    Err(AppError::Conflict("User already exists".to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        self.with_conn(move |conn| {
            let account = conn
                .query_row(
                    "SELECT id, username, email, password_hash, wallet, created_at
                     FROM accounts WHERE id = ?1",
                    params![account_id.to_string()],
                    row_to_account,
                )
                .optional()?;
            Ok(account)
        })
        .await
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            let account = conn
                .query_row(
                    "SELECT id, username, email, password_hash, wallet, created_at
                     FROM accounts WHERE email = ?1",
                    params![email],
                    row_to_account,
                )
                .optional()?;
            Ok(account)
        })
        .await
    }

    async fn create_video(&self, video: &Video) -> Result<()> {
        let video = video.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO videos (id, title, description, kind, creator_id, price, file_path, url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    video.id.to_string(),
                    video.title,
                    video.description,
                    video.kind.as_str(),
                    video.creator_id.to_string(),
                    video.price,
                    video.file_path,
                    video.url,
                    ts(&video.created_at),
                ],
            )?;
            debug!("Created video: {} with id {}", video.title, video.id);
            Ok(())
        })
        .await
    }

    async fn get_video_by_id(&self, video_id: Uuid) -> Result<Option<VideoListing>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {LISTING_COLUMNS} FROM videos v
                 JOIN accounts a ON a.id = v.creator_id
                 WHERE v.id = ?1"
            );
            let listing = conn
                .query_row(&sql, params![video_id.to_string()], row_to_listing)
                .optional()?;
            Ok(listing)
        })
        .await
    }

    async fn get_feed(&self, limit: usize, offset: usize) -> Result<Vec<VideoListing>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {LISTING_COLUMNS} FROM videos v
                 JOIN accounts a ON a.id = v.creator_id
                 ORDER BY v.seq DESC
                 LIMIT ?1 OFFSET ?2"
            );
            // A negative OFFSET means 0 to SQLite; saturate instead of wrapping.
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let offset = i64::try_from(offset).unwrap_or(i64::MAX);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit, offset], row_to_listing)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn has_entitlement(&self, account_id: Uuid, video_id: Uuid) -> Result<bool> {
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM purchases WHERE account_id = ?1 AND video_id = ?2",
                    params![account_id.to_string(), video_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn get_purchased_videos(&self, account_id: Uuid) -> Result<Vec<VideoListing>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {LISTING_COLUMNS} FROM purchases p
                 JOIN videos v ON v.id = p.video_id
                 JOIN accounts a ON a.id = v.creator_id
                 WHERE p.account_id = ?1
                 ORDER BY p.seq DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![account_id.to_string()], row_to_listing)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn purchase(
        &self,
        account_id: Uuid,
        video_id: Uuid,
        price: Amount,
    ) -> Result<PurchaseReceipt> {
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM purchases WHERE account_id = ?1 AND video_id = ?2",
                    params![account_id.to_string(), video_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(AppError::AlreadyPurchased);
            }

            let new_balance = debit(&tx, account_id, price)?;

            let entitlement = Entitlement {
                id: Uuid::new_v4(),
                account_id,
                video_id,
                price_paid: price,
                created_at: Utc::now(),
            };
            let inserted = tx.execute(
                "INSERT INTO purchases (id, account_id, video_id, price_paid, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entitlement.id.to_string(),
                    account_id.to_string(),
                    video_id.to_string(),
                    price,
                    ts(&entitlement.created_at),
                ],
            );
            match inserted {
                Ok(_) => {}
                // Dropping the transaction rolls back the debit.
                Err(e) if is_unique_violation(&e) => return Err(AppError::AlreadyPurchased),
                Err(e) => return Err(e.into()),
            }

            insert_wallet_transaction(
                &tx,
                &WalletTransaction::new(
                    account_id,
                    TransactionKind::Purchase,
                    price,
                    new_balance,
                    Some(video_id),
                ),
            )?;
            tx.commit()?;

            debug!("Recorded purchase of video {} by {}", video_id, account_id);
            Ok(PurchaseReceipt {
                entitlement,
                new_balance,
            })
        })
        .await
    }

    async fn send_gift(&self, gift: Gift) -> Result<GiftReceipt> {
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let new_balance = debit(&tx, gift.from_account_id, gift.amount)?;
            tx.execute(
                "INSERT INTO gifts (id, from_account_id, to_creator_id, video_id, amount, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    gift.id.to_string(),
                    gift.from_account_id.to_string(),
                    gift.to_creator_id.to_string(),
                    gift.video_id.to_string(),
                    gift.amount,
                    ts(&gift.created_at),
                ],
            )?;
            insert_wallet_transaction(
                &tx,
                &WalletTransaction::new(
                    gift.from_account_id,
                    TransactionKind::Gift,
                    gift.amount,
                    new_balance,
                    Some(gift.video_id),
                ),
            )?;
            tx.commit()?;

            debug!("Recorded gift {} of {}", gift.id, gift.amount);
            Ok(GiftReceipt { gift, new_balance })
        })
        .await
    }

    async fn credit_wallet(&self, account_id: Uuid, amount: Amount) -> Result<Amount> {
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current: Option<Amount> = tx
                .query_row(
                    "SELECT wallet FROM accounts WHERE id = ?1",
                    params![account_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let current = current.ok_or_else(|| AppError::not_found("Account"))?;
            // SQLite promotes an overflowing sum to REAL, so check it here.
            let new_balance = current
                .checked_add(amount)
                .ok_or_else(|| AppError::InvalidAmount("balance would overflow".to_string()))?;
            tx.execute(
                "UPDATE accounts SET wallet = ?1 WHERE id = ?2",
                params![new_balance, account_id.to_string()],
            )?;

            insert_wallet_transaction(
                &tx,
                &WalletTransaction::new(account_id, TransactionKind::Add, amount, new_balance, None),
            )?;
            tx.commit()?;
            Ok(new_balance)
        })
        .await
    }

    async fn get_wallet_transactions(&self, account_id: Uuid) -> Result<Vec<WalletTransaction>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, account_id, kind, amount, balance_after, video_id, created_at
                 FROM wallet_transactions WHERE account_id = ?1
                 ORDER BY seq DESC",
            )?;
            let rows = stmt.query_map(params![account_id.to_string()], row_to_wallet_transaction)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn get_gifts_received(&self, creator_id: Uuid) -> Result<Vec<Gift>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, from_account_id, to_creator_id, video_id, amount, created_at
                 FROM gifts WHERE to_creator_id = ?1
                 ORDER BY seq DESC",
            )?;
            let rows = stmt.query_map(params![creator_id.to_string()], row_to_gift)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn create_comment(&self, comment: &Comment) -> Result<()> {
        let comment = comment.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO comments (id, video_id, author_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    comment.id.to_string(),
                    comment.video_id.to_string(),
                    comment.author_id.to_string(),
                    comment.text,
                    ts(&comment.created_at),
                ],
            )?;
            debug!("Created comment with id {}", comment.id);
            Ok(())
        })
        .await
    }

    async fn get_comments_for_video(&self, video_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.video_id, c.author_id, c.text, c.created_at, a.username
                 FROM comments c
                 JOIN accounts a ON a.id = c.author_id
                 WHERE c.video_id = ?1
                 ORDER BY c.seq DESC",
            )?;
            let rows = stmt.query_map(params![video_id.to_string()], |row| {
                let author_id = uuid_at(row, 2)?;
                Ok(CommentWithAuthor {
                    comment: Comment {
                        id: uuid_at(row, 0)?,
                        video_id: uuid_at(row, 1)?,
                        author_id,
                        text: row.get(3)?,
                        created_at: time_at(row, 4)?,
                    },
                    author: CreatorSummary {
                        id: author_id,
                        username: row.get(5)?,
                    },
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}

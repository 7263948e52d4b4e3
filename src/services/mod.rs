//! Business operations over [`Storage`](crate::storage::Storage).
//!
//! Handlers never touch storage directly; every read and write goes through
//! one of these services with the caller's id passed in explicitly.

pub mod catalog;
pub mod identity;
pub mod social;
pub mod wallet;

pub use catalog::{CatalogService, VideoDetails};
pub use identity::{AuthSession, IdentityService};
pub use social::SocialService;
pub use wallet::WalletService;

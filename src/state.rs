use axum::extract::FromRef;
use std::sync::Arc;

use crate::auth::TokenKeys;
use crate::config::Config;
use crate::media::MediaStore;
use crate::services::{CatalogService, IdentityService, SocialService, WalletService};
use crate::storage::Storage;

/// Everything a request handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub catalog: Arc<CatalogService>,
    pub wallet: Arc<WalletService>,
    pub social: Arc<SocialService>,
    pub media: Arc<MediaStore>,
    pub tokens: Arc<TokenKeys>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Self {
        let tokens = Arc::new(TokenKeys::new(&config.jwt_secret, config.token_ttl_hours));
        let media = Arc::new(MediaStore::from_config(&config));

        Self {
            identity: Arc::new(IdentityService::new(
                storage.clone(),
                tokens.clone(),
                config.starting_balance,
            )),
            catalog: Arc::new(CatalogService::new(
                storage.clone(),
                media.clone(),
                config.feed_page_size,
            )),
            wallet: Arc::new(WalletService::new(storage.clone(), config.min_top_up)),
            social: Arc::new(SocialService::new(storage)),
            media,
            tokens,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Arc<TokenKeys> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

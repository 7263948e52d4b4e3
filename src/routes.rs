use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::handlers::{auth, comments, gifts, videos, wallet};
use crate::state::AppState;

/// Room for the non-file multipart fields on top of the file limit.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Everything mounted under `/api`.
pub fn api_routes(max_upload_bytes: u64) -> Router<AppState> {
    let upload_limit = (max_upload_bytes as usize).saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Videos
        .route(
            "/videos/upload",
            post(videos::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/videos/feed", get(videos::feed))
        .route("/videos/purchased", get(videos::purchased))
        .route("/videos/:id", get(videos::details))
        .route("/videos/:id/purchase", post(videos::purchase))
        // Comments
        .route("/comments", post(comments::add_comment))
        .route("/comments/:video_id", get(comments::list_comments))
        // Gifts
        .route("/gifts", post(gifts::send_gift))
        .route("/gifts/received", get(gifts::gifts_received))
        // Wallet
        .route("/wallet", get(wallet::balance))
        .route("/wallet/add", post(wallet::add_funds))
        .route("/wallet/history", get(wallet::history))
}

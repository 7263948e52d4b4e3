use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Already purchased")]
    AlreadyPurchased,

    #[error("No purchase needed")]
    NoPurchaseNeeded,

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("File too large: {size_bytes} bytes exceeds limit of {limit_bytes} bytes")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Comment text must not be empty")]
    EmptyComment,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Error body returned by every API endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub msg: String,
}

impl AppError {
    /// Stable machine-readable kind, independent of the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidAmount(_) => "InvalidAmount",
            AppError::InsufficientBalance { .. } => "InsufficientBalance",
            AppError::AlreadyPurchased => "AlreadyPurchased",
            AppError::NoPurchaseNeeded => "NoPurchaseNeeded",
            AppError::InvalidFile(_) | AppError::FileTooLarge { .. } => "InvalidFile",
            AppError::EmptyComment => "EmptyComment",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Conflict(_) => "Conflict",
            AppError::Validation(_) => "Validation",
            AppError::Database { .. }
            | AppError::Io(_)
            | AppError::Config(_)
            | AppError::Internal(_) => "ServerError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) | AppError::AlreadyPurchased => StatusCode::CONFLICT,
            AppError::InvalidFile(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidAmount(_)
            | AppError::InsufficientBalance { .. }
            | AppError::NoPurchaseNeeded
            | AppError::EmptyComment
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database { .. }
            | AppError::Io(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database {
            message: msg.into(),
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database {
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage and internal details stay in the logs.
        let msg = if self.is_server_error() {
            error!(error = %self, "request failed with server error");
            "Server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            kind: self.kind(),
            msg,
        };
        (status, Json(body)).into_response()
    }
}

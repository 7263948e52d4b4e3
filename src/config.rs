use serde::Deserialize;
use std::fs;
use std::path::Path;
use crate::error::{AppError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "boom.toml";
pub const IN_MEMORY_DATABASE: &str = ":memory:";

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub port: u16,
    /// Wallet balance granted to every new account, in minor units.
    pub starting_balance: i64,
    pub feed_page_size: usize,
    pub upload_dir: String,
    pub max_upload_bytes: u64,
    pub allowed_upload_extensions: Vec<String>,
    pub min_top_up: i64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "boom.db".to_string(),
            jwt_secret: String::new(),
            token_ttl_hours: 24 * 7,
            port: 5000,
            starting_balance: 500,
            feed_page_size: 10,
            upload_dir: "uploads".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_upload_extensions: vec!["mp4".to_string()],
            min_top_up: 1,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Loads `.env`, then the optional TOML file, then environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path =
            std::env::var("BOOM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&config_path).exists() {
            let content = fs::read_to_string(&config_path).map_err(|e| {
                AppError::Config(format!("Failed to read config file '{}': {}", config_path, e))
            })?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Invalid config file: {e}")))
    }

    /// Overrides fields from `lookup`, which is `std::env::var` outside of tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = lookup("TOKEN_TTL_HOURS") {
            self.token_ttl_hours = parse_var("TOKEN_TTL_HOURS", &v)?;
        }
        if let Some(v) = lookup("PORT") {
            self.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = lookup("STARTING_BALANCE") {
            self.starting_balance = parse_var("STARTING_BALANCE", &v)?;
        }
        if let Some(v) = lookup("FEED_PAGE_SIZE") {
            self.feed_page_size = parse_var("FEED_PAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("UPLOAD_DIR") {
            self.upload_dir = v;
        }
        if let Some(v) = lookup("MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = lookup("ALLOWED_UPLOAD_EXTENSIONS") {
            self.allowed_upload_extensions = v
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("MIN_TOP_UP") {
            self.min_top_up = parse_var("MIN_TOP_UP", &v)?;
        }
        if let Some(v) = lookup("METRICS_PORT") {
            self.metrics_port = Some(parse_var("METRICS_PORT", &v)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(AppError::Config(format!(
                "JWT_SECRET must be at least {} bytes, got {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt_secret.len()
            )));
        }
        if self.token_ttl_hours <= 0 {
            return Err(AppError::Config("token_ttl_hours must be positive".into()));
        }
        if self.feed_page_size == 0 {
            return Err(AppError::Config("feed_page_size must be positive".into()));
        }
        if self.starting_balance < 0 {
            return Err(AppError::Config("starting_balance must not be negative".into()));
        }
        if self.min_top_up < 1 {
            return Err(AppError::Config("min_top_up must be at least 1".into()));
        }
        if self.allowed_upload_extensions.is_empty() {
            return Err(AppError::Config(
                "at least one upload extension must be allowed".into(),
            ));
        }
        Ok(())
    }

    pub fn uses_in_memory_storage(&self) -> bool {
        self.database_url == IN_MEMORY_DATABASE
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key} has an invalid value: '{value}'")))
}

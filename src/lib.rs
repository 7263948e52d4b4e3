pub mod auth;
pub mod config;
pub mod domain;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod media;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
pub mod storage;

//! Money-flow counters and the optional Prometheus exporter.

use std::net::SocketAddr;
use tracing::{info, warn};

pub const PURCHASES_TOTAL: &str = "boom_purchases_total";
pub const GIFTS_TOTAL: &str = "boom_gifts_total";
pub const GIFT_AMOUNT_TOTAL: &str = "boom_gift_amount_total";
pub const TOP_UPS_TOTAL: &str = "boom_wallet_top_ups_total";
pub const WALLET_REJECTIONS_TOTAL: &str = "boom_wallet_rejections_total";

/// Installs the Prometheus exporter when a port is configured.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else {
        return;
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

pub fn record_purchase() {
    ::metrics::counter!(PURCHASES_TOTAL).increment(1);
}

pub fn record_gift(amount: i64) {
    ::metrics::counter!(GIFTS_TOTAL).increment(1);
    ::metrics::counter!(GIFT_AMOUNT_TOTAL).increment(amount.max(0) as u64);
}

pub fn record_top_up() {
    ::metrics::counter!(TOP_UPS_TOTAL).increment(1);
}

/// Counts a rejected money movement, labelled by error kind.
pub fn record_rejection(operation: &'static str, reason: &'static str) {
    ::metrics::counter!(WALLET_REJECTIONS_TOTAL, "operation" => operation, "reason" => reason)
        .increment(1);
}

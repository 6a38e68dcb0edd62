//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sweeper_sweeps_total` (counter): sweeps by outcome
//! - `sweeper_block_events_total` (counter): key block notifications received
//! - `sweeper_reconnects_total` (counter): event stream reconnect attempts
//! - `sweeper_last_balance_aettos` (gauge): sender balance at the last check
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - The exporter is optional; logs are the primary audit trail

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::chain::Amount;

/// Installs the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_sweep(outcome: &'static str) {
    ::metrics::counter!("sweeper_sweeps_total", "outcome" => outcome).increment(1);
}

pub fn record_block_event() {
    ::metrics::counter!("sweeper_block_events_total").increment(1);
}

pub fn record_reconnect() {
    ::metrics::counter!("sweeper_reconnects_total").increment(1);
}

/// Gauges are f64, so very large balances lose precision here only.
pub fn record_balance(balance: Amount) {
    let value: f64 = balance.to_string().parse().unwrap_or(f64::MAX);
    ::metrics::gauge!("sweeper_last_balance_aettos").set(value);
}

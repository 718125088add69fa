//! Metrics emitted by the engine.
//!
//! # Metrics
//! - `layered_config_reloads_total` (counter): reloads by module, outcome
//! - `layered_config_watch_events_total` (counter): relevant source events
//! - `layered_config_merged_keys` (gauge): keys in the published view
//! - `layered_config_shutdown_stragglers_total` (counter): watchers that
//!   missed the shutdown bound

/// Record a reload attempt. `outcome` is `ok`, `error` or `watch_failed`.
pub fn record_reload(module: &str, outcome: &'static str) {
    metrics::counter!(
        "layered_config_reloads_total",
        "module" => module.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_watch_event(module: &str) {
    metrics::counter!("layered_config_watch_events_total", "module" => module.to_string()).increment(1);
}

pub fn record_merged_keys(count: usize) {
    metrics::gauge!("layered_config_merged_keys").set(count as f64);
}

pub fn record_shutdown_straggler(module: &str) {
    metrics::counter!("layered_config_shutdown_stragglers_total", "module" => module.to_string()).increment(1);
}

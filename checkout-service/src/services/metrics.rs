use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at process start.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics handle already initialized"))?;

    Ok(())
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record a checkout opened with the gateway.
pub fn record_initialized() {
    counter!("checkout_transactions_initialized_total").increment(1);
}

/// Record a reconciliation outcome. `source` is `poll` or `webhook`.
pub fn record_reconciliation(source: &'static str, status: &'static str) {
    counter!("checkout_reconciliations_total", "source" => source, "status" => status)
        .increment(1);
}

/// Record a webhook refused before reaching storage.
pub fn record_webhook_rejected(reason: &'static str) {
    counter!("checkout_webhooks_rejected_total", "reason" => reason).increment(1);
}

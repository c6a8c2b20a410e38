// src/telemetry.rs
use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

/// One-time metrics registration (so series show up in the textfile).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("alerts_checks_total", "Source checks attempted.");
        describe_counter!(
            "alerts_unchanged_total",
            "Source checks short-circuited by identical raw bytes."
        );
        describe_counter!(
            "alerts_reports_total",
            "Source keys whose change was reported (and persisted)."
        );
        describe_counter!(
            "alerts_check_errors_total",
            "Source checks that failed (transport, missing data, ...)."
        );
        describe_counter!("alerts_dispatch_total", "Alert batches dispatched.");
        describe_gauge!("alerts_last_run_ts", "Unix ts when a run last finished.");
    });
}

pub fn check_attempted(source: &str) {
    counter!("alerts_checks_total", "source" => source.to_string()).increment(1);
}

pub fn check_unchanged(source: &str) {
    counter!("alerts_unchanged_total", "source" => source.to_string()).increment(1);
}

pub fn reported(source: &str) {
    counter!("alerts_reports_total", "source" => source.to_string()).increment(1);
}

pub fn check_failed(source: &str, kind: &'static str) {
    counter!(
        "alerts_check_errors_total",
        "source" => source.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn dispatched(channel: &'static str) {
    counter!("alerts_dispatch_total", "channel" => channel).increment(1);
}

pub fn run_finished() {
    gauge!("alerts_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
}

/// Install the Prometheus recorder globally; render it later with
/// [`write_textfile`].
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")
}

/// Write the exposition atomically for a textfile collector.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())
        .with_context(|| format!("writing metrics to {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("renaming metrics to {}", path.display()))?;
    Ok(())
}

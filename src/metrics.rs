//! Phase metrics for a pipeline run.
//!
//! Each phase (load, enrich, clean, output) owns a small metrics struct so metric
//! names stay consistent. A Prometheus recorder is installed without an HTTP
//! listener: the run is short-lived, so the rendered snapshot is pushed to a
//! Pushgateway at exit when `RENTAL_ZONES_PUSHGATEWAY_URL` is set.

use std::sync::{Once, OnceLock};

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

use crate::constants::ENV_PUSHGATEWAY_URL;

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Builds `rental_zones_<phase>_<name>`.
macro_rules! phase_metric {
    ($phase:literal, $name:literal) => {
        concat!("rental_zones_", $phase, "_", $name)
    };
}

/// Install the global recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    });
}

/// Render the current snapshot in the Prometheus text format.
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

/// Push the rendered snapshot to the configured Pushgateway, if any.
pub async fn push_to_gateway(job: &str) -> anyhow::Result<()> {
    let base = match std::env::var(ENV_PUSHGATEWAY_URL) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => return Ok(()),
    };
    let Some(body) = render() else {
        return Ok(());
    };
    let push_url = format!("{}/metrics/job/{}", base.trim_end_matches('/'), job);
    let resp = reqwest::Client::new()
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await
        .with_context(|| format!("failed to reach Pushgateway at {push_url}"))?;
    if !resp.status().is_success() {
        anyhow::bail!("Pushgateway responded with status {}", resp.status().as_u16());
    }
    info!("Pushed metrics to Pushgateway for job={}", job);
    Ok(())
}

pub struct LoadMetrics;

impl LoadMetrics {
    pub fn record_file_loaded(rows: usize) {
        ::metrics::counter!(phase_metric!("load", "files_total")).increment(1);
        ::metrics::counter!(phase_metric!("load", "rows_total")).increment(rows as u64);
    }
}

pub struct EnrichMetrics;

impl EnrichMetrics {
    pub fn record_lookup_success() {
        ::metrics::counter!(phase_metric!("enrich", "lookups_success")).increment(1);
    }

    pub fn record_lookup_failure(retryable: bool) {
        if retryable {
            ::metrics::counter!(phase_metric!("enrich", "lookups_failed_retryable")).increment(1);
        } else {
            ::metrics::counter!(phase_metric!("enrich", "lookups_failed_terminal")).increment(1);
        }
    }

    pub fn record_request_duration(duration_secs: f64) {
        ::metrics::histogram!(phase_metric!("enrich", "request_duration_seconds"))
            .record(duration_secs);
    }
}

pub struct CleanMetrics;

impl CleanMetrics {
    pub fn record_partition(rows_in: usize, rows_out: usize) {
        ::metrics::counter!(phase_metric!("clean", "partitions_total")).increment(1);
        ::metrics::counter!(phase_metric!("clean", "rows_in_total")).increment(rows_in as u64);
        ::metrics::counter!(phase_metric!("clean", "rows_out_total")).increment(rows_out as u64);
    }

    pub fn record_duration(duration_secs: f64) {
        ::metrics::histogram!(phase_metric!("clean", "duration_seconds")).record(duration_secs);
    }
}

pub struct OutputMetrics;

impl OutputMetrics {
    pub fn record_zone_written(rows: usize) {
        ::metrics::counter!(phase_metric!("output", "zones_written")).increment(1);
        ::metrics::counter!(phase_metric!("output", "rows_written")).increment(rows as u64);
    }

    pub fn record_zone_skipped() {
        ::metrics::counter!(phase_metric!("output", "zones_skipped")).increment(1);
    }
}

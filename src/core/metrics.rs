use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn row_rejected(reason: &'static str) {
    metrics::counter!("exam_rows_rejected_total", "reason" => reason).increment(1);
}

pub(crate) fn selection_finished(outcome: &'static str) {
    metrics::counter!("exam_selections_total", "outcome" => outcome).increment(1);
}

pub(crate) fn submission_finished(outcome: &'static str, duration_seconds: f64) {
    metrics::counter!("exam_submissions_total", "outcome" => outcome).increment(1);
    metrics::histogram!("exam_submit_duration_seconds").record(duration_seconds);
}

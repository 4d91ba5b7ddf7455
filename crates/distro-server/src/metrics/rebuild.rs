//! Rebuild metrics recording.

use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Registra las metricas de rebuild.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_rebuild_metrics() {
    metrics::describe_counter!(
        "distro_rebuilds_total",
        "Total number of rebuilds by outcome"
    );
    metrics::describe_histogram!(
        "distro_rebuild_duration_seconds",
        "Time spent mirroring and compiling a snapshot"
    );
    metrics::describe_gauge!(
        "distro_mounted_versions",
        "Number of version folders in the published snapshot"
    );
    metrics::describe_gauge!(
        "distro_published_generation",
        "Generation number of the published snapshot"
    );
}

/// Recorder de metricas de rebuild.
#[derive(Debug, Clone)]
pub struct RebuildMetrics {
    successes: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

impl RebuildMetrics {
    pub fn new() -> Self {
        Self {
            successes: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registra un rebuild publicado
    pub fn record_success(&self, generation: u64, versions: usize, duration: Duration) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        counter!("distro_rebuilds_total", "outcome" => "success").increment(1);
        histogram!("distro_rebuild_duration_seconds", "outcome" => "success")
            .record(duration.as_secs_f64());
        gauge!("distro_mounted_versions").set(versions as f64);
        gauge!("distro_published_generation").set(generation as f64);
    }

    /// Registra un rebuild fallido en la etapa indicada
    pub fn record_failure(&self, stage: &'static str, duration: Duration) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        counter!("distro_rebuilds_total", "outcome" => "failure", "stage" => stage).increment(1);
        histogram!("distro_rebuild_duration_seconds", "outcome" => "failure")
            .record(duration.as_secs_f64());
    }

    /// Retorna el numero de rebuilds publicados
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Retorna el numero de rebuilds fallidos
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for RebuildMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_counters() {
        let metrics = RebuildMetrics::new();

        metrics.record_success(1, 3, Duration::from_millis(20));
        metrics.record_failure("materialize", Duration::from_millis(5));
        metrics.record_failure("compile", Duration::from_millis(5));

        assert_eq!(metrics.successes(), 1);
        assert_eq!(metrics.failures(), 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = RebuildMetrics::new();
        let clone = metrics.clone();

        clone.record_success(7, 1, Duration::ZERO);

        assert_eq!(metrics.successes(), 1);
    }
}

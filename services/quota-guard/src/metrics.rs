//! Prometheus metrics exposition
//!
//! The guard core records these through the `metrics` facade:
//!
//! - `guard_transitions_total` (counter): labels `transition`, `outcome`
//! - `guard_cycles_total` (counter): label `outcome`
//! - `guard_disabled_accounts` (gauge)
//! - `guard_cycle_duration_seconds` (histogram)

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Bucket boundaries for `guard_cycle_duration_seconds`. A cycle is a handful
/// of management calls per credential, bounded by the request timeout.
const CYCLE_DURATION_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("guard_cycle_duration_seconds".to_string()),
        CYCLE_DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Must run before the first cycle, otherwise early samples are dropped.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

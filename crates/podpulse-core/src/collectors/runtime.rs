//! Tokio runtime collectors: worker count, alive tasks, scheduler lag.
//!
//! Rust has no garbage collector, so scheduler lag is the runtime-specific
//! signal. A probe task sleeps for a fixed resolution and records how late
//! it was woken.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::metric::{Metric, MetricKind, Sample};
use crate::registry::Registry;
use crate::value::Histogram;

/// Lag buckets (seconds).
pub const LAG_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Register runtime gauges and the lag histogram, and spawn the lag probe
/// on `handle`.
pub fn register(registry: &Registry, handle: &Handle, resolution: Duration) -> Result<JoinHandle<()>> {
    let h = handle.clone();
    registry.register(Metric::from_fn(
        "tokio_runtime_workers",
        MetricKind::Gauge,
        "Number of worker threads used by the runtime.",
        move || Ok(vec![Sample::new(h.metrics().num_workers() as f64)]),
    )?)?;

    let h = handle.clone();
    registry.register(Metric::from_fn(
        "tokio_runtime_alive_tasks",
        MetricKind::Gauge,
        "Number of tasks currently alive in the runtime.",
        move || Ok(vec![Sample::new(h.metrics().num_alive_tasks() as f64)]),
    )?)?;

    let lag = registry.register_histogram(
        "runtime_scheduler_lag_seconds",
        "Delay between a timer's deadline and the probe task being polled.",
        &LAG_BUCKETS,
    )?;

    tracing::debug!(resolution_ms = resolution.as_millis() as u64, "scheduler lag probe starting");
    Ok(handle.spawn(probe(lag, resolution)))
}

async fn probe(lag: Arc<Histogram>, resolution: Duration) {
    loop {
        let start = Instant::now();
        tokio::time::sleep(resolution).await;
        let late = start.elapsed().saturating_sub(resolution);
        lag.observe(late.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runtime_metrics_render() {
        let r = Registry::new();
        let task = register(&r, &Handle::current(), Duration::from_millis(5)).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let body = r.render().unwrap().body;
        task.abort();

        assert!(body.contains("tokio_runtime_workers 2\n"));
        assert!(body.contains("# TYPE tokio_runtime_alive_tasks gauge\n"));
        assert!(body.contains("# TYPE runtime_scheduler_lag_seconds histogram\n"));
        assert!(body.contains("runtime_scheduler_lag_seconds_bucket{le=\"+Inf\"}"));
        assert!(!body.contains("runtime_scheduler_lag_seconds_count 0\n"));
    }
}

//! Default collector set.
//!
//! `DefaultCollectors::install` registers the process, build and runtime
//! metrics against a registry exactly once. Metric names are process-global
//! by convention, so a second install on the same registry fails with
//! `DuplicateName`.

pub mod process;
pub mod runtime;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::metric::{Metric, MetricKind, Sample};
use crate::registry::Registry;

use process::{HostUnits, ProcFs};

const DEFAULT_PROC_ROOT: &str = "/proc";
const DEFAULT_LAG_RESOLUTION: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct DefaultCollectors {
    proc_root: PathBuf,
    lag_resolution: Duration,
}

impl Default for DefaultCollectors {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            lag_resolution: DEFAULT_LAG_RESOLUTION,
        }
    }
}

/// Background work started by `install`. Dropping it stops the lag probe.
#[derive(Debug, Default)]
pub struct Installed {
    lag_probe: Option<JoinHandle<()>>,
}

impl Installed {
    pub fn has_runtime_collectors(&self) -> bool {
        self.lag_probe.is_some()
    }
}

impl Drop for Installed {
    fn drop(&mut self) {
        if let Some(task) = self.lag_probe.take() {
            task.abort();
        }
    }
}

impl DefaultCollectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    pub fn with_lag_resolution(mut self, resolution: Duration) -> Self {
        self.lag_resolution = resolution;
        self
    }

    /// Register the default metrics.
    ///
    /// Runtime collectors are added only when called from inside a tokio
    /// runtime.
    pub fn install(&self, registry: &Registry) -> Result<Installed> {
        let procfs = Arc::new(ProcFs::new(self.proc_root.clone(), HostUnits::detect()));
        let start_time = procfs.start_time_seconds().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "process start time unavailable, using install time");
            now_seconds()
        });
        process::register(registry, procfs, start_time)?;

        registry.register(Metric::from_fn(
            "podpulse_build_info",
            MetricKind::Gauge,
            "Build information, value is always 1.",
            || Ok(vec![Sample::new(1.0).with_label("version", env!("CARGO_PKG_VERSION"))]),
        )?)?;

        let lag_probe = match Handle::try_current() {
            Ok(handle) => Some(runtime::register(registry, &handle, self.lag_resolution)?),
            Err(_) => {
                tracing::debug!("no tokio runtime, runtime collectors skipped");
                None
            }
        };

        // last, so it counts failures from earlier metrics in the same scrape
        registry.register(Metric::new(
            "scrape_errors_total",
            MetricKind::Counter,
            "Sample sources that failed during scrapes, by metric.",
            Vec::new(),
            registry.scrape_errors(),
        )?)?;

        tracing::info!(metrics = registry.len(), "default collectors installed");
        Ok(Installed { lag_probe })
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::error::RegistryError;

    #[test]
    fn start_time_has_one_sample() {
        let r = Registry::new();
        let installed = DefaultCollectors::new().install(&r).unwrap();
        assert!(!installed.has_runtime_collectors());

        let body = r.render().unwrap().body;
        let mut lines = body.lines().skip_while(|l| !l.starts_with("# TYPE process_start_time_seconds gauge"));
        assert!(lines.next().is_some());
        let samples: Vec<&str> = lines
            .take_while(|l| !l.starts_with('#'))
            .collect();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].starts_with("process_start_time_seconds "));
    }

    #[test]
    fn second_install_fails() {
        let r = Registry::new();
        DefaultCollectors::new().install(&r).unwrap();
        let before = r.len();
        let err = DefaultCollectors::new().install(&r).expect_err("must fail");
        assert!(matches!(err, RegistryError::DuplicateName(_)));
        assert_eq!(r.len(), before);
    }

    #[test]
    fn start_time_falls_back_without_proc() {
        let dir = tempfile::tempdir().unwrap();
        let r = Registry::new();
        let before = now_seconds();
        DefaultCollectors::new().with_proc_root(dir.path()).install(&r).unwrap();

        let body = r.render().unwrap().body;
        let value: f64 = body
            .lines()
            .find_map(|l| l.strip_prefix("process_start_time_seconds "))
            .unwrap()
            .parse()
            .unwrap();
        assert!(value >= before.floor());
        assert!(body.contains("scrape_errors_total{metric=\"process_open_fds\"} 1\n"));
    }

    #[test]
    fn build_info_carries_version() {
        let r = Registry::new();
        DefaultCollectors::new().install(&r).unwrap();
        let body = r.render().unwrap().body;
        let expected = format!("podpulse_build_info{{version=\"{}\"}} 1\n", env!("CARGO_PKG_VERSION"));
        assert!(body.contains(&expected));
    }

    #[tokio::test]
    async fn runtime_collectors_inside_tokio() {
        let r = Registry::new();
        let installed = DefaultCollectors::new().install(&r).unwrap();
        assert!(installed.has_runtime_collectors());
        assert!(r.contains("tokio_runtime_workers"));
        assert!(r.contains("runtime_scheduler_lag_seconds"));
    }
}

//! Metric registry: registration, name uniqueness, ordered rendering.
//!
//! The registry is an explicit value built at process start and shared by
//! `Arc`; there is no global default instance. Registration takes the write
//! lock, scrapes take the read lock only long enough to snapshot the metric
//! list, so concurrent scrapes never wait on each other's sample sources.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::encode::{self, Exposition, CONTENT_TYPE};
use crate::error::{RegistryError, Result, SampleError};
use crate::metric::{Metric, MetricFamily, MetricKind, Sample, SampleSource};
use crate::value::{Counter, Gauge, Histogram};

/// Per-metric tally of failed samples, keyed by metric name.
#[derive(Default)]
pub struct ScrapeErrors {
    map: DashMap<String, AtomicU64>,
}

impl ScrapeErrors {
    pub fn record(&self, metric: &str) {
        if let Some(c) = self.map.get(metric) {
            c.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.map
            .entry(metric.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn remove(&self, metric: &str) {
        self.map.remove(metric);
    }

    pub fn get(&self, metric: &str) -> u64 {
        self.map.get(metric).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.map.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }
}

impl SampleSource for ScrapeErrors {
    /// One sample per failing metric, sorted by name.
    fn sample(&self) -> std::result::Result<Vec<Sample>, SampleError> {
        let mut rows: Vec<(String, u64)> = self.map.iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        Ok(rows.into_iter()
            .map(|(name, n)| Sample::new(n as f64).with_label("metric", name))
            .collect())
    }
}

#[derive(Default)]
pub struct Registry {
    metrics: RwLock<IndexMap<String, Metric>>,
    errors: Arc<ScrapeErrors>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a metric. Fails without modifying the registry when the name
    /// is already taken.
    pub fn register(&self, metric: Metric) -> Result<()> {
        let mut metrics = self.metrics.write();
        if metrics.contains_key(metric.name()) {
            return Err(RegistryError::DuplicateName(metric.name().to_string()));
        }
        tracing::debug!(name = %metric.name(), kind = %metric.kind(), "metric registered");
        metrics.insert(metric.name().to_string(), metric);
        Ok(())
    }

    /// Remove a metric by name. Returns whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.metrics.write().shift_remove(name).is_some();
        if removed {
            self.errors.remove(name);
            tracing::debug!(%name, "metric unregistered");
        }
        removed
    }

    pub fn register_counter(&self, name: &str, help: &str) -> Result<Arc<Counter>> {
        let counter = Arc::new(Counter::new());
        self.register(Metric::new(name, MetricKind::Counter, help, Vec::new(), counter.clone())?)?;
        Ok(counter)
    }

    pub fn register_gauge(&self, name: &str, help: &str) -> Result<Arc<Gauge>> {
        let gauge = Arc::new(Gauge::new());
        self.register(Metric::new(name, MetricKind::Gauge, help, Vec::new(), gauge.clone())?)?;
        Ok(gauge)
    }

    pub fn register_histogram(&self, name: &str, help: &str, buckets: &[f64]) -> Result<Arc<Histogram>> {
        let histogram = Arc::new(Histogram::new(buckets)?);
        self.register(Metric::new(name, MetricKind::Histogram, help, Vec::new(), histogram.clone())?)?;
        Ok(histogram)
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.read().contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    /// Shared scrape-error tally, for exposing as a metric.
    pub fn scrape_errors(&self) -> Arc<ScrapeErrors> {
        Arc::clone(&self.errors)
    }

    /// Sample every metric in registration order.
    ///
    /// A failing source drops only its own metric from the result.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let snapshot: Vec<Metric> = self.metrics.read().values().cloned().collect();

        let mut families = Vec::with_capacity(snapshot.len());
        for m in snapshot {
            let sampled = panic::catch_unwind(AssertUnwindSafe(|| m.sample()))
                .unwrap_or_else(|payload| Err(SampleError::Panicked(panic_message(payload.as_ref()))));
            match sampled {
                Ok(samples) => families.push(MetricFamily {
                    name: m.name().to_string(),
                    kind: m.kind(),
                    help: m.help().to_string(),
                    samples,
                }),
                Err(e) => {
                    self.errors.record(m.name());
                    tracing::warn!(metric = %m.name(), error = %e, "sample failed, metric skipped");
                }
            }
        }
        families
    }

    /// Render the whole registry as exposition text.
    pub fn render(&self) -> Result<Exposition> {
        let families = self.gather();
        let mut body = String::new();
        encode::encode(&families, &mut body)?;
        Ok(Exposition { body, content_type: CONTENT_TYPE })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

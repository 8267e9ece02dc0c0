//! Metric definitions and the typed sample-source seam.
//!
//! A `Metric` pairs static metadata (name, kind, help, constant labels) with
//! a `SampleSource` that is invoked on every scrape. Sources have a fixed
//! signature, so a bad callback is rejected by the type checker instead of
//! being discovered at scrape time.

use std::fmt;
use std::sync::Arc;

use crate::error::{RegistryError, Result, SampleError};

/// Ordered label set. Order is preserved in the rendered output.
pub type Labels = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    /// Name used on the `# TYPE` line.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }

    fn allows_suffix(self, suffix: &str) -> bool {
        match self {
            MetricKind::Counter | MetricKind::Gauge => suffix.is_empty(),
            MetricKind::Histogram => matches!(suffix, "_bucket" | "_sum" | "_count"),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of exposition output, before the metric name is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// `""` for counters and gauges; `_bucket`, `_sum` or `_count` for histograms.
    pub suffix: &'static str,
    pub labels: Labels,
    pub value: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    pub fn new(value: f64) -> Self {
        Self {
            suffix: "",
            labels: Vec::new(),
            value,
            timestamp_ms: None,
        }
    }

    pub fn with_suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

/// Produces the current samples of one metric.
///
/// Implementations read live state on every call; nothing is cached between
/// scrapes.
pub trait SampleSource: Send + Sync {
    fn sample(&self) -> std::result::Result<Vec<Sample>, SampleError>;
}

impl<F> SampleSource for F
where
    F: Fn() -> std::result::Result<Vec<Sample>, SampleError> + Send + Sync,
{
    fn sample(&self) -> std::result::Result<Vec<Sample>, SampleError> {
        self()
    }
}

/// A registered (or registrable) time series family.
#[derive(Clone)]
pub struct Metric {
    name: String,
    kind: MetricKind,
    help: String,
    labels: Labels,
    source: Arc<dyn SampleSource>,
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("help", &self.help)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl Metric {
    /// Build a metric, validating the name and constant label names.
    pub fn new(
        name: impl Into<String>,
        kind: MetricKind,
        help: impl Into<String>,
        labels: Labels,
        source: Arc<dyn SampleSource>,
    ) -> Result<Self> {
        let name = name.into();
        if !is_valid_metric_name(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if let Some((k, _)) = labels.iter().find(|(k, _)| !is_valid_label_name(k)) {
            return Err(RegistryError::InvalidLabel(k.clone()));
        }
        if let Some(k) = first_repeated_key(&labels) {
            return Err(RegistryError::InvalidLabel(k.to_string()));
        }
        Ok(Self {
            name,
            kind,
            help: help.into(),
            labels,
            source,
        })
    }

    /// Shorthand for a metric without constant labels.
    pub fn from_fn<F>(name: impl Into<String>, kind: MetricKind, help: impl Into<String>, f: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<Vec<Sample>, SampleError> + Send + Sync + 'static,
    {
        Self::new(name, kind, help, Vec::new(), Arc::new(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    fn allows_sample_label(&self, key: &str) -> bool {
        is_valid_label_name(key) || (key == "le" && self.kind == MetricKind::Histogram)
    }

    /// Invoke the source and attach constant labels ahead of sample labels.
    pub fn sample(&self) -> std::result::Result<Vec<Sample>, SampleError> {
        let mut samples = self.source.sample()?;
        for s in &mut samples {
            if !self.kind.allows_suffix(s.suffix) {
                return Err(SampleError::Malformed(format!(
                    "suffix {:?} not allowed on {}",
                    s.suffix, self.kind
                )));
            }
            if let Some((k, _)) = s.labels.iter().find(|(k, _)| !self.allows_sample_label(k)) {
                return Err(SampleError::InvalidLabel(k.clone()));
            }
            if let Some(k) = first_repeated_key(&s.labels) {
                return Err(SampleError::InvalidLabel(k.to_string()));
            }
            if let Some((k, _)) = s.labels.iter().find(|(k, _)| self.labels.iter().any(|(c, _)| c == k)) {
                return Err(SampleError::InvalidLabel(k.clone()));
            }
            if !self.labels.is_empty() {
                let mut merged = self.labels.clone();
                merged.append(&mut s.labels);
                s.labels = merged;
            }
        }
        Ok(samples)
    }
}

/// Sampled snapshot of one metric, ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
    pub samples: Vec<Sample>,
}

fn first_repeated_key(labels: &[(String, String)]) -> Option<&str> {
    labels.iter().enumerate().find_map(|(i, (k, _))| {
        labels[..i].iter().any(|(prev, _)| prev == k).then_some(k.as_str())
    })
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the reserved `__` prefix and `le`.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") || name == "le" {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

//! Lock-free value handles for the three metric kinds.
//!
//! Handles are plain atomics shared by `Arc`: application code updates them,
//! and the registry reads them through `SampleSource` on every scrape.
//! Floating point values are stored as raw bits in `AtomicU64`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{RegistryError, Result, SampleError};
use crate::metric::{Sample, SampleSource};

/// Buckets used when none are given (seconds).
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

fn add_f64(cell: &AtomicU64, delta: f64) {
    let mut cur = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(cur) + delta).to_bits();
        match cell.compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => cur = actual,
        }
    }
}

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, v: u64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl SampleSource for Counter {
    fn sample(&self) -> std::result::Result<Vec<Sample>, SampleError> {
        Ok(vec![Sample::new(self.get() as f64)])
    }
}

/// Arbitrary up/down value.
#[derive(Debug)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Default for Gauge {
    fn default() -> Self {
        Self { bits: AtomicU64::new(0f64.to_bits()) }
    }
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, v: f64) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn add(&self, delta: f64) {
        add_f64(&self.bits, delta);
    }

    pub fn inc(&self) { self.add(1.0); }
    pub fn dec(&self) { self.add(-1.0); }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl SampleSource for Gauge {
    fn sample(&self) -> std::result::Result<Vec<Sample>, SampleError> {
        Ok(vec![Sample::new(self.get())])
    }
}

/// Fixed-bucket histogram.
///
/// Buckets are stored non-cumulatively and summed at sample time; the
/// implicit `+Inf` bucket equals the total count.
#[derive(Debug)]
pub struct Histogram {
    upper_bounds: Vec<f64>,
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_bits: AtomicU64,
}

impl Histogram {
    /// Upper bounds must be finite and strictly increasing.
    pub fn new(upper_bounds: &[f64]) -> Result<Self> {
        if upper_bounds.is_empty() {
            return Err(RegistryError::InvalidBuckets("no buckets".into()));
        }
        if upper_bounds.iter().any(|b| !b.is_finite()) {
            return Err(RegistryError::InvalidBuckets("bounds must be finite".into()));
        }
        if upper_bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RegistryError::InvalidBuckets("bounds must be strictly increasing".into()));
        }
        Ok(Self {
            upper_bounds: upper_bounds.to_vec(),
            buckets: upper_bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
        })
    }

    pub fn observe(&self, v: f64) {
        if let Some(i) = self.upper_bounds.iter().position(|&b| v <= b) {
            self.buckets[i].fetch_add(1, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        add_f64(&self.sum_bits, v);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }
}

impl SampleSource for Histogram {
    fn sample(&self) -> std::result::Result<Vec<Sample>, SampleError> {
        // Read count first: concurrent observations may land in buckets after
        // this load, so clamp cumulative values to keep +Inf the maximum.
        let count = self.count();
        let sum = self.sum();
        let mut out = Vec::with_capacity(self.upper_bounds.len() + 3);
        let mut cumulative = 0u64;
        for (bound, bucket) in self.upper_bounds.iter().zip(&self.buckets) {
            cumulative += bucket.load(Ordering::Relaxed);
            out.push(
                Sample::new(cumulative.min(count) as f64)
                    .with_suffix("_bucket")
                    .with_label("le", crate::encode::format_value(*bound)),
            );
        }
        out.push(Sample::new(count as f64).with_suffix("_bucket").with_label("le", "+Inf"));
        out.push(Sample::new(sum).with_suffix("_sum"));
        out.push(Sample::new(count as f64).with_suffix("_count"));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn counter_counts() {
        let c = Counter::new();
        c.inc();
        c.inc_by(4);
        assert_eq!(c.get(), 5);
        assert_eq!(c.sample().unwrap()[0].value, 5.0);
    }

    #[test]
    fn gauge_moves_both_ways() {
        let g = Gauge::new();
        g.set(10.0);
        g.inc();
        g.dec();
        g.add(-2.5);
        assert_eq!(g.get(), 7.5);
    }

    #[test]
    fn histogram_rejects_bad_bounds() {
        assert!(Histogram::new(&[]).is_err());
        assert!(Histogram::new(&[1.0, 1.0]).is_err());
        assert!(Histogram::new(&[2.0, 1.0]).is_err());
        assert!(Histogram::new(&[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let h = Histogram::new(&[0.1, 1.0]).unwrap();
        h.observe(0.0625);
        h.observe(0.5);
        h.observe(0.5);
        h.observe(7.0);

        let s = h.sample().unwrap();
        let values: Vec<(&str, f64)> = s.iter().map(|x| (x.suffix, x.value)).collect();
        assert_eq!(
            values,
            vec![("_bucket", 1.0), ("_bucket", 3.0), ("_bucket", 4.0), ("_sum", 8.0625), ("_count", 4.0)]
        );
        assert_eq!(s[0].labels, vec![("le".to_string(), "0.1".to_string())]);
        assert_eq!(s[2].labels, vec![("le".to_string(), "+Inf".to_string())]);
    }
}

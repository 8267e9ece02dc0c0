//! podpulse core: metric registry, value handles, text exposition, and the
//! default process/runtime collector set.
//!
//! This crate carries no HTTP dependency so the registry can be embedded in
//! any server. The binary in `podpulse-server` wires it to `/metrics`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! A misbehaving sample source surfaces as `SampleError` and is isolated to
//! its own metric; it never fails a whole scrape.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod collectors;
pub mod encode;
pub mod error;
pub mod metric;
pub mod registry;
pub mod value;

pub use collectors::{DefaultCollectors, Installed};
pub use encode::{Exposition, CONTENT_TYPE};
pub use error::{RegistryError, Result, SampleError};
pub use metric::{Labels, Metric, MetricFamily, MetricKind, Sample, SampleSource};
pub use registry::{Registry, ScrapeErrors};
pub use value::{Counter, Gauge, Histogram};

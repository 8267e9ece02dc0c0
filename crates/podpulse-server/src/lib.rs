//! podpulse HTTP surface.
//!
//! Serves the registry from `podpulse-core` on `/metrics` and a liveness
//! payload on `/health`. Consumed by the binary (`main.rs`) and by the
//! integration tests.

pub mod app_state;
pub mod config;
pub mod error;
pub mod ops;
pub mod router;

//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use podpulse_core::Registry;

use crate::config::{self, EnvLookup};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: Arc<Registry>,
    env: EnvLookup,
}

impl AppState {
    /// State backed by the real process environment.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_env(registry, config::process_env())
    }

    pub fn with_env(registry: Arc<Registry>, env: EnvLookup) -> Self {
        Self {
            inner: Arc::new(AppStateInner { registry, env }),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn env(&self) -> &EnvLookup {
        &self.inner.env
    }
}

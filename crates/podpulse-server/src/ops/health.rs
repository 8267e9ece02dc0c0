//! Liveness payload.

use serde::Serialize;

use crate::config::{self, EnvLookup};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthPayload {
    pub status: &'static str,
    pub pod: String,
    pub greeting: String,
}

impl HealthPayload {
    /// Built fresh on every request from the current environment.
    pub fn from_env(env: &EnvLookup) -> Self {
        Self {
            status: "healthy",
            pod: config::env_or(env, config::POD_NAME_VAR, ""),
            greeting: config::env_or(env, config::GREETING_VAR, config::DEFAULT_GREETING),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Arc;

    #[test]
    fn defaults_serialize_in_field_order() {
        let env: EnvLookup = Arc::new(|_: &str| None::<String>);
        let body = serde_json::to_string(&HealthPayload::from_env(&env)).unwrap();
        assert_eq!(body, r#"{"status":"healthy","pod":"","greeting":"Default Greeting"}"#);
    }
}

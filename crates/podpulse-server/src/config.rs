//! Process configuration.
//!
//! There is no config file: the listen address is fixed and the only
//! runtime inputs are environment variables, read through an `EnvLookup` so
//! tests can supply values without touching the process environment.

use std::net::SocketAddr;
use std::sync::Arc;

pub const LISTEN_PORT: u16 = 8080;

pub const POD_NAME_VAR: &str = "POD_NAME";
pub const GREETING_VAR: &str = "GREETING";
pub const DEFAULT_GREETING: &str = "Default Greeting";

/// Key -> value lookup, normally backed by `std::env::var`.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub fn listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], LISTEN_PORT))
}

pub fn process_env() -> EnvLookup {
    Arc::new(|key: &str| std::env::var(key).ok())
}

/// Read `key`; unset and empty both yield `default`.
pub fn env_or(lookup: &EnvLookup, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fixed(pairs: &[(&str, &str)]) -> EnvLookup {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(move |key: &str| map.get(key).cloned())
    }

    #[test]
    fn listens_on_8080() {
        assert_eq!(listen_addr().port(), 8080);
        assert!(listen_addr().ip().is_unspecified());
    }

    #[test]
    fn empty_value_uses_default() {
        let env = fixed(&[(GREETING_VAR, "")]);
        assert_eq!(env_or(&env, GREETING_VAR, DEFAULT_GREETING), "Default Greeting");
    }

    #[test]
    fn set_value_wins() {
        let env = fixed(&[(POD_NAME_VAR, "worker-3")]);
        assert_eq!(env_or(&env, POD_NAME_VAR, ""), "worker-3");
        assert_eq!(env_or(&env, GREETING_VAR, DEFAULT_GREETING), DEFAULT_GREETING);
    }
}

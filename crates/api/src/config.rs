//! Environment-driven application configuration.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use storefront_infra::sync::{RetryPolicy, UpdatePolicy};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES is enabled")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub elasticsearch_url: Option<String>,
    pub elasticsearch_index_prefix: String,
    pub update_policy: UpdatePolicy,
    /// How often the retry worker looks for due index resyncs.
    pub retry_interval: Duration,
    pub retry_policy: RetryPolicy,
    /// `None` disables the periodic reconcile worker.
    pub reconcile_interval: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            use_persistent_stores: false,
            database_url: None,
            elasticsearch_url: None,
            elasticsearch_index_prefix: "storefront".to_string(),
            update_policy: UpdatePolicy::default(),
            retry_interval: Duration::from_millis(500),
            retry_policy: RetryPolicy::default(),
            reconcile_interval: None,
        }
    }
}

fn invalid(var: &'static str, message: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        message: message.to_string(),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(invalid(var, format!("'{other}' is not a boolean"))),
    }
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e| invalid(var, e))
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get("STOREFRONT_BIND_ADDR") {
            config.bind_addr = raw
                .trim()
                .parse()
                .map_err(|e| invalid("STOREFRONT_BIND_ADDR", e))?;
        }

        if let Some(raw) = get("USE_PERSISTENT_STORES") {
            config.use_persistent_stores = parse_bool("USE_PERSISTENT_STORES", &raw)?;
        }
        config.database_url = get("DATABASE_URL");
        if config.use_persistent_stores && config.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        config.elasticsearch_url = get("ELASTICSEARCH_URL");
        if let Some(prefix) = get("ELASTICSEARCH_INDEX_PREFIX") {
            config.elasticsearch_index_prefix = prefix.trim().to_string();
        }

        if let Some(raw) = get("STOREFRONT_UPDATE_POLICY") {
            config.update_policy = raw
                .parse()
                .map_err(|e: String| invalid("STOREFRONT_UPDATE_POLICY", e))?;
        }

        if let Some(raw) = get("STOREFRONT_INDEX_RETRY_INTERVAL_MS") {
            let ms = parse_u64("STOREFRONT_INDEX_RETRY_INTERVAL_MS", &raw)?;
            if ms == 0 {
                return Err(invalid(
                    "STOREFRONT_INDEX_RETRY_INTERVAL_MS",
                    "must be greater than zero",
                ));
            }
            config.retry_interval = Duration::from_millis(ms);
        }

        if let Some(raw) = get("STOREFRONT_INDEX_RETRY_MAX_ATTEMPTS") {
            let attempts = parse_u64("STOREFRONT_INDEX_RETRY_MAX_ATTEMPTS", &raw)?;
            config.retry_policy.max_attempts = u32::try_from(attempts)
                .map_err(|e| invalid("STOREFRONT_INDEX_RETRY_MAX_ATTEMPTS", e))?;
        }

        if let Some(raw) = get("STOREFRONT_RECONCILE_INTERVAL_SECS") {
            let secs = parse_u64("STOREFRONT_RECONCILE_INTERVAL_SECS", &raw)?;
            config.reconcile_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.retry_policy.max_attempts, 5);
        assert!(config.reconcile_interval.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("STOREFRONT_BIND_ADDR", "127.0.0.1:9000"),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/storefront"),
            ("ELASTICSEARCH_URL", "http://localhost:9200"),
            ("ELASTICSEARCH_INDEX_PREFIX", "shop"),
            ("STOREFRONT_UPDATE_POLICY", "upsert"),
            ("STOREFRONT_INDEX_RETRY_INTERVAL_MS", "250"),
            ("STOREFRONT_INDEX_RETRY_MAX_ATTEMPTS", "8"),
            ("STOREFRONT_RECONCILE_INTERVAL_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(config.use_persistent_stores);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/storefront"));
        assert_eq!(config.elasticsearch_url.as_deref(), Some("http://localhost:9200"));
        assert_eq!(config.elasticsearch_index_prefix, "shop");
        assert_eq!(config.update_policy, UpdatePolicy::Upsert);
        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert_eq!(config.retry_policy.max_attempts, 8);
        assert_eq!(config.reconcile_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn persistent_stores_require_a_database_url() {
        assert_eq!(
            load(&[("USE_PERSISTENT_STORES", "1")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
    }

    #[test]
    fn invalid_values_are_reported_with_their_variable() {
        for (var, value) in [
            ("STOREFRONT_BIND_ADDR", "not-an-addr"),
            ("USE_PERSISTENT_STORES", "maybe"),
            ("STOREFRONT_UPDATE_POLICY", "merge"),
            ("STOREFRONT_INDEX_RETRY_INTERVAL_MS", "0"),
            ("STOREFRONT_INDEX_RETRY_MAX_ATTEMPTS", "-1"),
            ("STOREFRONT_RECONCILE_INTERVAL_SECS", "soon"),
        ] {
            match load(&[(var, value)]) {
                Err(ConfigError::Invalid { var: reported, .. }) => assert_eq!(reported, var),
                other => panic!("{var}={value}: expected invalid, got {other:?}"),
            }
        }
    }

    #[test]
    fn zero_reconcile_interval_disables_the_worker() {
        let config = load(&[("STOREFRONT_RECONCILE_INTERVAL_SECS", "0")]).unwrap();
        assert!(config.reconcile_interval.is_none());
    }
}

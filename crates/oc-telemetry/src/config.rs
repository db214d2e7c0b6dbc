//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration for an endpoint process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log record
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error or an EnvFilter directive)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to use ANSI colors in plain output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "oc-endpoint".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OC_SERVICE_NAME`: Service name (default: oc-endpoint)
    /// - `OC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `OC_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `NO_COLOR`: Disable ANSI colors when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("OC_SERVICE_NAME").unwrap_or_else(|| "oc-endpoint".to_string()),

            log_level: lookup("OC_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            json_logs: lookup("OC_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            ansi: lookup("NO_COLOR").is_none(),
        }
    }

    /// Configuration for a named endpoint, e.g. one per chain in a simulation.
    pub fn for_endpoint(name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("oc-{}", name);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "oc-endpoint");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = TelemetryConfig::from_lookup(lookup_from(&[
            ("OC_SERVICE_NAME", "relay"),
            ("OC_LOG_LEVEL", "debug"),
            ("OC_JSON_LOGS", "1"),
            ("NO_COLOR", "1"),
        ]));
        assert_eq!(config.service_name, "relay");
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
        assert!(!config.ansi);
    }

    #[test]
    fn test_rust_log_fallback() {
        let config = TelemetryConfig::from_lookup(lookup_from(&[("RUST_LOG", "warn")]));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_container_defaults_to_json() {
        let config = TelemetryConfig::from_lookup(lookup_from(&[("DOCKER_CONTAINER", "1")]));
        assert!(config.json_logs);
        let config = TelemetryConfig::from_lookup(lookup_from(&[
            ("DOCKER_CONTAINER", "1"),
            ("OC_JSON_LOGS", "false"),
        ]));
        assert!(!config.json_logs);
    }
}

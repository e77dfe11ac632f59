//! Controller configuration, loaded from environment variables

use crate::error::ControllerError;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_WEBHOOK_ADDR: &str = "0.0.0.0:9443";
const DEFAULT_OPS_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CONCURRENCY: u16 = 4;
const DEFAULT_ERROR_REQUEUE_SECS: u64 = 30;

/// PEM files for the webhook's TLS listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Certificate chain
    pub cert: PathBuf,
    /// Private key
    pub key: PathBuf,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Listener for the admission webhook
    pub webhook_addr: SocketAddr,
    /// Serve the webhook over HTTPS when set
    pub webhook_tls: Option<TlsFiles>,
    /// Run the admission webhook at all
    pub enable_webhook: bool,
    /// Listener for `/healthz`, `/readyz` and `/metrics`
    pub ops_addr: SocketAddr,
    /// Maximum concurrent reconciliations (0 means unbounded)
    pub concurrency: u16,
    /// Delay before a failed reconciliation is retried
    pub error_requeue: Duration,
}

impl ControllerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns the value of a
    /// variable if it is set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let webhook_tls = match (var("WEBHOOK_TLS_CERT"), var("WEBHOOK_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(ControllerError::InvalidConfig(
                    "WEBHOOK_TLS_CERT and WEBHOOK_TLS_KEY must be set together".to_string(),
                ));
            }
        };

        Ok(Self {
            namespace: var("WATCH_NAMESPACE"),
            webhook_addr: parse("WEBHOOK_ADDR", var("WEBHOOK_ADDR"), DEFAULT_WEBHOOK_ADDR)?,
            webhook_tls,
            enable_webhook: parse_bool("ENABLE_WEBHOOK", var("ENABLE_WEBHOOK"), true)?,
            ops_addr: parse("OPS_ADDR", var("OPS_ADDR"), DEFAULT_OPS_ADDR)?,
            concurrency: match var("RECONCILE_CONCURRENCY") {
                Some(v) => parse_value("RECONCILE_CONCURRENCY", &v)?,
                None => DEFAULT_CONCURRENCY,
            },
            error_requeue: Duration::from_secs(match var("ERROR_REQUEUE_SECS") {
                Some(v) => parse_value("ERROR_REQUEUE_SECS", &v)?,
                None => DEFAULT_ERROR_REQUEUE_SECS,
            }),
        })
    }
}

fn parse<T: FromStr>(key: &str, value: Option<String>, default: &str) -> Result<T, ControllerError>
where
    T::Err: std::fmt::Display,
{
    parse_value(key, value.as_deref().unwrap_or(default))
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ControllerError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ControllerError::InvalidConfig(format!("{key}={value:?}: {e}")))
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> Result<bool, ControllerError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ControllerError::InvalidConfig(format!(
                "{key}={v:?}: expected true or false"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).expect("defaults are valid");
        assert_eq!(config.namespace, None);
        assert_eq!(config.webhook_addr, "0.0.0.0:9443".parse().expect("addr"));
        assert_eq!(config.ops_addr, "0.0.0.0:8080".parse().expect("addr"));
        assert_eq!(config.webhook_tls, None);
        assert!(config.enable_webhook);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.error_requeue, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("WATCH_NAMESPACE", "apps"),
            ("WEBHOOK_ADDR", "127.0.0.1:8443"),
            ("WEBHOOK_TLS_CERT", "/certs/tls.crt"),
            ("WEBHOOK_TLS_KEY", "/certs/tls.key"),
            ("OPS_ADDR", "127.0.0.1:9090"),
            ("RECONCILE_CONCURRENCY", "0"),
            ("ERROR_REQUEUE_SECS", "5"),
            ("ENABLE_WEBHOOK", "false"),
        ])
        .expect("valid overrides");

        assert_eq!(config.namespace.as_deref(), Some("apps"));
        assert_eq!(config.webhook_addr.port(), 8443);
        assert_eq!(
            config.webhook_tls,
            Some(TlsFiles {
                cert: PathBuf::from("/certs/tls.crt"),
                key: PathBuf::from("/certs/tls.key"),
            })
        );
        assert_eq!(config.ops_addr.port(), 9090);
        assert_eq!(config.concurrency, 0);
        assert_eq!(config.error_requeue, Duration::from_secs(5));
        assert!(!config.enable_webhook);
    }

    #[test]
    fn test_empty_namespace_means_all() {
        let config = config(&[("WATCH_NAMESPACE", "")]).expect("valid");
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_half_configured_tls_rejected() {
        let err = config(&[("WEBHOOK_TLS_CERT", "/certs/tls.crt")]).expect_err("missing key");
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("WEBHOOK_ADDR", "not-an-address"),
            ("RECONCILE_CONCURRENCY", "-1"),
            ("ERROR_REQUEUE_SECS", "soon"),
            ("ENABLE_WEBHOOK", "maybe"),
        ] {
            let err = config(&[(key, value)]).expect_err(key);
            assert!(
                err.to_string().contains(key),
                "error for {key} should name it: {err}"
            );
        }
    }
}

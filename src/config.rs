//! Binary configuration
//!
//! Collects the session, Docker and Ollama settings into one record. The
//! binary builds it from `CODEVISOR_*` environment variables; embedders can
//! construct it directly.
//!
//! | Variable                     | Field                          |
//! |------------------------------|--------------------------------|
//! | `CODEVISOR_OLLAMA_URL`       | `ollama_url`                   |
//! | `CODEVISOR_MODEL`            | `model`                        |
//! | `CODEVISOR_OTLP_ENDPOINT`    | `otlp_endpoint`                |
//! | `CODEVISOR_DOCKER_SOCKET`    | `docker.socket_path`           |
//! | `CODEVISOR_IMAGE`            | `docker.image`                 |
//! | `CODEVISOR_CONTAINER`        | `docker.container_name`        |
//! | `CODEVISOR_AUTO_REMOVE`      | `docker.auto_remove`           |
//! | `CODEVISOR_STOP_CONTAINER`   | `docker.stop_container`        |
//! | `CODEVISOR_OUTPUT_DIR`       | `docker.output_dir`            |
//! | `CODEVISOR_ENV_<NAME>`       | `docker.env[<NAME>]`           |
//! | `CODEVISOR_KERNEL`           | `session.kernel_name`          |
//! | `CODEVISOR_TIMEOUT_SECS`     | `session.execution_timeout`    |
//! | `CODEVISOR_MAX_CYCLES`       | `session.max_cycles`           |
//! | `CODEVISOR_POLICY`           | `session.continuation`         |
//! | `CODEVISOR_STRICT_PARSE`     | `session.parse_policy`         |
//! | `CODEVISOR_RUNTIMES`         | `session.runtimes`             |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::agent::{ContinuationPolicy, SessionConfig};
use crate::environment::config::is_valid_container_name;
use crate::environment::DockerConfig;
use crate::generator::ParsePolicy;

const PREFIX: &str = "CODEVISOR_";
const ENV_PREFIX: &str = "CODEVISOR_ENV_";

/// Read before the rest of the configuration so logging is up first
pub const OTLP_ENDPOINT_VAR: &str = "CODEVISOR_OTLP_ENDPOINT";

/// Error produced while reading configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: String,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid {}: {}", self.key, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Everything needed to build and run one session
#[derive(Debug, Clone)]
pub struct Config {
    pub session: SessionConfig,
    pub docker: DockerConfig,
    /// Base URL of the Ollama server
    pub ollama_url: String,
    /// Model used for code generation
    pub model: String,
    /// OTLP collector endpoint; console logging only when unset
    pub otlp_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            docker: DockerConfig::default(),
            ollama_url: "http://localhost:11434".to_string(),
            model: "qwen3".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl Config {
    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Apply `CODEVISOR_*` overrides from `vars` on top of the defaults
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Config::default();

        for (key, value) in vars {
            if let Some(name) = key.strip_prefix(ENV_PREFIX) {
                if !name.is_empty() {
                    config.docker.env.insert(name.to_string(), value);
                }
                continue;
            }
            let Some(name) = key.strip_prefix(PREFIX) else {
                continue;
            };

            match name {
                "OLLAMA_URL" => config.ollama_url = value,
                "MODEL" => config.model = value,
                "OTLP_ENDPOINT" => config.otlp_endpoint = Some(value),
                "DOCKER_SOCKET" => config.docker.socket_path = PathBuf::from(value),
                "IMAGE" => config.docker.image = value,
                "CONTAINER" => {
                    if !is_valid_container_name(&value) {
                        return Err(ConfigError {
                            key,
                            message: format!("'{}' is not a valid container name", value),
                        });
                    }
                    config.docker.container_name = Some(value)
                }
                "AUTO_REMOVE" => config.docker.auto_remove = parse_bool(&key, &value)?,
                "STOP_CONTAINER" => config.docker.stop_container = parse_bool(&key, &value)?,
                "OUTPUT_DIR" => config.docker.output_dir = PathBuf::from(value),
                "KERNEL" => config.session.kernel_name = value,
                "TIMEOUT_SECS" => {
                    config.session.execution_timeout =
                        Duration::from_secs(parse_number::<u64>(&key, &value)?)
                }
                "MAX_CYCLES" => config.session.max_cycles = parse_number(&key, &value)?,
                "POLICY" => config.session.continuation = parse_policy(&key, &value)?,
                "STRICT_PARSE" => {
                    config.session.parse_policy = if parse_bool(&key, &value)? {
                        ParsePolicy::Strict
                    } else {
                        ParsePolicy::Lenient
                    }
                }
                "RUNTIMES" => config.session.runtimes = Some(parse_list(&value)),
                _ => tracing::debug!(key = %key, "Ignoring unknown configuration variable"),
            }
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", value),
        }),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        key: key.to_string(),
        message: format!("expected a number, got '{}'", value),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn parse_policy(key: &str, value: &str) -> Result<ContinuationPolicy, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "by_order" | "by-order" => Ok(ContinuationPolicy::ByOrder),
        "retry_on_error" | "retry-on-error" => Ok(ContinuationPolicy::RetryOnError),
        _ => Err(ConfigError {
            key: key.to_string(),
            message: format!("expected by_order or retry_on_error, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = Config::from_vars(vars(&[("HOME", "/root")])).unwrap();
        assert_eq!(config.model, "qwen3");
        assert_eq!(config.session.max_cycles, 2);
        assert_eq!(config.session.execution_timeout, Duration::from_secs(60));
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn test_overrides_applied() {
        let config = Config::from_vars(vars(&[
            ("CODEVISOR_MODEL", "codellama"),
            ("CODEVISOR_CONTAINER", "kernel-1"),
            ("CODEVISOR_AUTO_REMOVE", "false"),
            ("CODEVISOR_TIMEOUT_SECS", "15"),
            ("CODEVISOR_MAX_CYCLES", "6"),
            ("CODEVISOR_POLICY", "retry_on_error"),
            ("CODEVISOR_STRICT_PARSE", "yes"),
            ("CODEVISOR_ENV_API_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.model, "codellama");
        assert_eq!(config.docker.container_name.as_deref(), Some("kernel-1"));
        assert!(!config.docker.auto_remove);
        assert_eq!(config.session.execution_timeout, Duration::from_secs(15));
        assert_eq!(config.session.max_cycles, 6);
        assert_eq!(config.session.continuation, ContinuationPolicy::RetryOnError);
        assert_eq!(config.session.parse_policy, ParsePolicy::Strict);
        assert_eq!(config.docker.env.get("API_KEY").map(String::as_str), Some("secret"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_vars(vars(&[("CODEVISOR_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert_eq!(err.key, "CODEVISOR_TIMEOUT_SECS");

        let err = Config::from_vars(vars(&[("CODEVISOR_POLICY", "forever")])).unwrap_err();
        assert!(err.to_string().contains("by_order"));
    }

    #[test]
    fn test_container_name_must_be_url_safe() {
        for name in ["../images", "kernel?all=1", "a b", "x"] {
            let err = Config::from_vars(vars(&[("CODEVISOR_CONTAINER", name)])).unwrap_err();
            assert_eq!(err.key, "CODEVISOR_CONTAINER", "accepted {:?}", name);
        }
    }

    #[test]
    fn test_runtime_list() {
        let config =
            Config::from_vars(vars(&[("CODEVISOR_RUNTIMES", "Python, bash,,")])).unwrap();
        assert_eq!(
            config.session.runtimes,
            Some(vec!["python".to_string(), "bash".to_string()])
        );
        assert!(Config::default().session.runtimes.is_none());
    }

    #[test]
    fn test_otlp_endpoint_variable() {
        let config = Config::from_vars(vars(&[(OTLP_ENDPOINT_VAR, "http://collector:4317")]))
            .unwrap();
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
    }
}

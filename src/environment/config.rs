//! Docker environment configuration and Engine API payloads
//!
//! The payload structs mirror the JSON bodies of the Docker Engine API
//! requests used by `DockerClient`. Field names follow Docker's PascalCase.

use std::collections::HashMap;
use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Path inside the container where the output directory is mounted
pub const CONTAINER_WORKDIR: &str = "/workspace";

/// Default image; ships python, node and npx for every built-in runtime
pub const DEFAULT_IMAGE: &str = "nikolaik/python-nodejs:python3.12-nodejs22-slim";

lazy_static! {
    /// Docker's container name charset
    static ref CONTAINER_NAME: Regex =
        Regex::new(r"^/?[a-zA-Z0-9][a-zA-Z0-9_.-]+$").expect("container name pattern is valid");
}

/// Whether Docker accepts `name` as a container name
pub fn is_valid_container_name(name: &str) -> bool {
    CONTAINER_NAME.is_match(name)
}

/// Split an image reference into the `fromImage` and `tag` pull parameters
///
/// A digest reference (`repo@sha256:...`) is passed through whole with an
/// empty tag. A missing tag means `latest`.
pub fn split_image_reference(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    match image.rsplit_once(':') {
        // A colon inside the last path segment separates the tag; one before
        // a slash belongs to a registry port
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (image, "latest"),
    }
}

/// Configuration for a Docker-hosted execution environment
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Path to the Docker Engine API socket
    pub socket_path: PathBuf,
    /// Image used when a new container is created
    pub image: String,
    /// Name of the container to reuse or create (None = generated per session)
    pub container_name: Option<String>,
    /// Let Docker delete the container once it stops
    pub auto_remove: bool,
    /// Stop the container when the session ends
    pub stop_container: bool,
    /// Host directory mounted as the working directory for output artifacts
    pub output_dir: PathBuf,
    /// Environment variables passed into the container
    pub env: HashMap<String, String>,
    /// Grace period Docker gives the container before killing it on stop
    pub stop_timeout_secs: u32,
    /// Upper bound on pulling a missing image
    pub pull_timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/var/run/docker.sock"),
            image: DEFAULT_IMAGE.to_string(),
            container_name: None,
            auto_remove: true,
            stop_container: true,
            output_dir: PathBuf::from("."),
            env: HashMap::new(),
            stop_timeout_secs: 5,
            pull_timeout_secs: 300,
        }
    }
}

/// Render a map as Docker's `KEY=value` list, sorted for stable requests
pub fn env_list(env: &HashMap<String, String>) -> Vec<String> {
    let mut list: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    list.sort();
    list
}

/// Host-specific container settings
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    pub auto_remove: bool,
    pub binds: Vec<String>,
}

/// Body of `POST /containers/create`
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreate {
    pub image: String,
    pub cmd: Vec<String>,
    pub env: Vec<String>,
    pub working_dir: String,
    pub tty: bool,
    pub host_config: HostConfig,
}

/// Body of `POST /containers/{id}/exec`
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ExecCreate {
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub cmd: Vec<String>,
    pub env: Vec<String>,
    pub working_dir: String,
}

/// Body of `POST /exec/{id}/start`
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ExecStart {
    pub detach: bool,
    pub tty: bool,
}

/// Response carrying a newly created object's id
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct IdResponse {
    pub id: String,
}

/// Subset of `GET /containers/{id}/json`
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    pub id: String,
    pub state: ContainerState,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    pub running: bool,
}

/// Subset of `GET /exec/{id}/json`
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ExecInspect {
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// One line of the `POST /images/create` progress stream
#[derive(Deserialize, Debug, Clone, Default)]
pub struct PullProgress {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Docker's error body
#[derive(Deserialize, Debug, Clone)]
pub struct ApiErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_create_uses_docker_field_names() {
        let body = ContainerCreate {
            image: "python:3.12-slim".into(),
            cmd: vec!["sleep".into(), "infinity".into()],
            env: vec!["A=1".into()],
            working_dir: CONTAINER_WORKDIR.into(),
            tty: false,
            host_config: HostConfig {
                auto_remove: true,
                binds: vec!["/tmp/out:/workspace".into()],
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["Image"], "python:3.12-slim");
        assert_eq!(json["WorkingDir"], "/workspace");
        assert_eq!(json["HostConfig"]["AutoRemove"], true);
        assert_eq!(json["HostConfig"]["Binds"][0], "/tmp/out:/workspace");
    }

    #[test]
    fn test_exec_inspect_parses_null_exit_code() {
        let inspect: ExecInspect =
            serde_json::from_str(r#"{"Running": true, "ExitCode": null, "Pid": 42}"#).unwrap();
        assert!(inspect.running);
        assert_eq!(inspect.exit_code, None);
    }

    #[test]
    fn test_env_list_sorted() {
        let mut env = HashMap::new();
        env.insert("B".to_string(), "2".to_string());
        env.insert("A".to_string(), "1".to_string());
        assert_eq!(env_list(&env), vec!["A=1", "B=2"]);
    }

    #[test]
    fn test_docker_config_defaults() {
        let config = DockerConfig::default();
        assert!(config.auto_remove);
        assert!(config.stop_container);
        assert!(config.container_name.is_none());
        assert_eq!(config.socket_path, PathBuf::from("/var/run/docker.sock"));
        assert_eq!(config.image, DEFAULT_IMAGE);
    }

    #[test]
    fn test_split_image_reference() {
        assert_eq!(split_image_reference("python:3.12-slim"), ("python", "3.12-slim"));
        assert_eq!(split_image_reference("ubuntu"), ("ubuntu", "latest"));
        assert_eq!(
            split_image_reference("registry.local:5000/team/kernel"),
            ("registry.local:5000/team/kernel", "latest")
        );
        assert_eq!(
            split_image_reference("registry.local:5000/team/kernel:v2"),
            ("registry.local:5000/team/kernel", "v2")
        );
        assert_eq!(
            split_image_reference("python@sha256:abcd"),
            ("python@sha256:abcd", "")
        );
    }

    #[test]
    fn test_container_name_charset() {
        assert!(is_valid_container_name("codevisor-0190a1b2"));
        assert!(is_valid_container_name("kernel_1.test"));
        assert!(!is_valid_container_name("-leading-dash"));
        assert!(!is_valid_container_name("a"));
        assert!(!is_valid_container_name("bad name"));
        assert!(!is_valid_container_name("x/../../images"));
        assert!(!is_valid_container_name("q?force=true"));
    }

    #[test]
    fn test_pull_progress_error_line() {
        let line: PullProgress =
            serde_json::from_str(r#"{"errorDetail":{"message":"denied"},"error":"denied"}"#).unwrap();
        assert_eq!(line.error.as_deref(), Some("denied"));

        let line: PullProgress =
            serde_json::from_str(r#"{"status":"Downloading","progressDetail":{}}"#).unwrap();
        assert_eq!(line.status.as_deref(), Some("Downloading"));
        assert!(line.error.is_none());
    }
}

//! Docker-hosted execution environment
//!
//! `DockerClient` speaks the Docker Engine API over its Unix domain socket.
//! `DockerEnvironment` uses it to provision one container per session and run
//! programs inside it through exec instances.
//!
//! # Lifecycle
//!
//! ```text
//! start()  ──► inspect by name ──► reuse (start if stopped)
//!                    │
//!                    └─ missing ──► create (sleep infinity) ──► start
//!                                     │
//!                                     └─ no such image ──► pull ──► create
//! run()    ──► exec create (under `timeout -s KILL`) ──► exec start (attached)
//!                          ──► demux stdout/stderr ──► exec inspect (exit code)
//! stop()   ──► stop container ──► remove if still present and auto_remove
//! drop     ──► best-effort stop when stop() never ran
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, StatusCode};
use hyper_util::client::legacy::Client;
use hyperlocal::UnixConnector;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use urlencoding::encode;
use uuid::Uuid;

use super::config::*;
use super::{EnvironmentError, ExecutionEnvironment, ExecutionResult, RunRequest};

type HyperClient = Client<UnixConnector, Full<Bytes>>;

/// Docker multiplexed stream identifiers
const STREAM_STDOUT: u8 = 1;
const STREAM_STDERR: u8 = 2;
const FRAME_HEADER_LEN: usize = 8;

/// Exit status of a process killed with SIGKILL
const EXIT_KILLED: i64 = 128 + 9;

/// Extra time the attach stream gets after the in-container kill fires
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Client for the Docker Engine API
#[derive(Clone)]
pub struct DockerClient {
    client: HyperClient,
    socket_path: PathBuf,
}

impl DockerClient {
    /// Create a new Docker API client
    ///
    /// # Arguments
    /// * `socket_path` - Path to the Docker Engine Unix socket
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(UnixConnector);

        Self {
            client,
            socket_path: socket_path.into(),
        }
    }

    fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
    ) -> Result<hyper::Request<Full<Bytes>>, EnvironmentError> {
        let uri: hyper::Uri = hyperlocal::Uri::new(&self.socket_path, endpoint).into();
        let body = body.map(Bytes::from).unwrap_or_default();

        hyper::Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Full::new(body))
            .map_err(|e| EnvironmentError::Protocol(e.to_string()))
    }

    /// Send a request and collect the whole response body
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
    ) -> Result<(StatusCode, Bytes), EnvironmentError> {
        let req = self.request(method, endpoint, body)?;
        let res = self.client.request(req).await.map_err(|e| {
            EnvironmentError::Connection(format!("{}: {}", self.socket_path.display(), e))
        })?;
        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| EnvironmentError::Connection(e.to_string()))?
            .to_bytes();
        Ok((status, bytes))
    }

    async fn send_json<T: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        body: &T,
    ) -> Result<(StatusCode, Bytes), EnvironmentError> {
        let json = serde_json::to_string(body)?;
        self.send(method, endpoint, Some(json)).await
    }

    /// Create a container and return its id
    pub async fn create_container(
        &self,
        name: &str,
        body: &ContainerCreate,
    ) -> Result<String, EnvironmentError> {
        let endpoint = format!("/containers/create?name={}", encode(name));
        let (status, bytes) = self.send_json(Method::POST, &endpoint, body).await?;
        let created: IdResponse = parse_success(status, &bytes, &[])?;
        Ok(created.id)
    }

    /// Inspect a container by id or name; `None` when it does not exist
    pub async fn inspect_container(
        &self,
        id: &str,
    ) -> Result<Option<ContainerInspect>, EnvironmentError> {
        let endpoint = format!("/containers/{}/json", encode(id));
        let (status, bytes) = self.send(Method::GET, &endpoint, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_success(status, &bytes, &[]).map(Some)
    }

    /// Start a container (already running is not an error)
    pub async fn start_container(&self, id: &str) -> Result<(), EnvironmentError> {
        let endpoint = format!("/containers/{}/start", encode(id));
        let (status, bytes) = self.send(Method::POST, &endpoint, None).await?;
        check_status(status, &bytes, &[StatusCode::NOT_MODIFIED])
    }

    /// Stop a container (already stopped or gone is not an error)
    pub async fn stop_container(&self, id: &str, timeout_secs: u32) -> Result<(), EnvironmentError> {
        let endpoint = format!("/containers/{}/stop?t={}", encode(id), timeout_secs);
        let (status, bytes) = self.send(Method::POST, &endpoint, None).await?;
        check_status(
            status,
            &bytes,
            &[StatusCode::NOT_MODIFIED, StatusCode::NOT_FOUND],
        )
    }

    /// Force-remove a container (gone or removal in progress is not an error)
    pub async fn remove_container(&self, id: &str) -> Result<(), EnvironmentError> {
        let endpoint = format!("/containers/{}?force=true", encode(id));
        let (status, bytes) = self.send(Method::DELETE, &endpoint, None).await?;
        check_status(status, &bytes, &[StatusCode::NOT_FOUND, StatusCode::CONFLICT])
    }

    /// Create an exec instance inside a container and return its id
    pub async fn create_exec(
        &self,
        container_id: &str,
        body: &ExecCreate,
    ) -> Result<String, EnvironmentError> {
        let endpoint = format!("/containers/{}/exec", encode(container_id));
        let (status, bytes) = self.send_json(Method::POST, &endpoint, body).await?;
        let created: IdResponse = parse_success(status, &bytes, &[])?;
        Ok(created.id)
    }

    /// Start an exec instance attached and append its raw output stream to `raw`
    ///
    /// Output is appended frame by frame, so whatever arrived before the
    /// caller drops this future (e.g. on timeout) stays in `raw`.
    pub async fn stream_exec(&self, exec_id: &str, raw: &mut Vec<u8>) -> Result<(), EnvironmentError> {
        let endpoint = format!("/exec/{}/start", encode(exec_id));
        let body = serde_json::to_string(&ExecStart {
            detach: false,
            tty: false,
        })?;
        let req = self.request(Method::POST, &endpoint, Some(body))?;
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| EnvironmentError::Connection(e.to_string()))?;

        let status = res.status();
        let mut body = res.into_body();

        if !status.is_success() {
            let bytes = body
                .collect()
                .await
                .map_err(|e| EnvironmentError::Connection(e.to_string()))?
                .to_bytes();
            return check_status(status, &bytes, &[]);
        }

        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| EnvironmentError::Connection(e.to_string()))?;
            if let Some(data) = frame.data_ref() {
                raw.extend_from_slice(data);
            }
        }
        Ok(())
    }

    /// Pull an image, draining the progress stream
    ///
    /// Docker reports pull failures inside a 200 stream, so each progress
    /// line is checked for an error.
    pub async fn pull_image(&self, image: &str) -> Result<(), EnvironmentError> {
        let (from_image, tag) = split_image_reference(image);
        let mut endpoint = format!("/images/create?fromImage={}", encode(from_image));
        if !tag.is_empty() {
            endpoint.push_str(&format!("&tag={}", encode(tag)));
        }

        let (status, bytes) = self.send(Method::POST, &endpoint, None).await?;
        check_status(status, &bytes, &[])?;
        pull_stream_error(&bytes).map_or(Ok(()), |error| {
            Err(EnvironmentError::Provisioning(format!("pull {}: {}", image, error)))
        })
    }

    /// Inspect an exec instance
    pub async fn inspect_exec(&self, exec_id: &str) -> Result<ExecInspect, EnvironmentError> {
        let endpoint = format!("/exec/{}/json", encode(exec_id));
        let (status, bytes) = self.send(Method::GET, &endpoint, None).await?;
        parse_success(status, &bytes, &[])
    }
}

fn api_error(status: StatusCode, bytes: &[u8]) -> EnvironmentError {
    let message = serde_json::from_slice::<ApiErrorBody>(bytes)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).trim().to_string());
    EnvironmentError::Api {
        status: status.as_u16(),
        message,
    }
}

fn check_status(
    status: StatusCode,
    bytes: &[u8],
    tolerated: &[StatusCode],
) -> Result<(), EnvironmentError> {
    if status.is_success() || tolerated.contains(&status) {
        Ok(())
    } else {
        Err(api_error(status, bytes))
    }
}

fn parse_success<T: DeserializeOwned>(
    status: StatusCode,
    bytes: &[u8],
    tolerated: &[StatusCode],
) -> Result<T, EnvironmentError> {
    check_status(status, bytes, tolerated)?;
    Ok(serde_json::from_slice(bytes)?)
}

/// Split Docker's multiplexed attach stream into (stdout, stderr)
///
/// Each frame is an 8-byte header `[stream, 0, 0, 0, len(be u32)]` followed by
/// `len` payload bytes. A truncated trailing frame keeps whatever payload
/// arrived.
pub fn demux_stream(raw: &[u8]) -> (String, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut rest = raw;

    while rest.len() >= FRAME_HEADER_LEN {
        let stream = rest[0];
        let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let end = (FRAME_HEADER_LEN + len).min(rest.len());
        let payload = &rest[FRAME_HEADER_LEN..end];

        match stream {
            STREAM_STDOUT => stdout.extend_from_slice(payload),
            STREAM_STDERR => stderr.extend_from_slice(payload),
            _ => {}
        }
        rest = &rest[end..];
    }

    (
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    )
}

/// First error reported in a pull progress stream
fn pull_stream_error(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<PullProgress>(line).ok())
        .inspect(|progress| {
            if let Some(status) = &progress.status {
                debug!(status = %status, "Pull progress");
            }
        })
        .find_map(|progress| progress.error)
}

/// Command line for an exec: the program under an in-container kill timer
///
/// Dropping the attach stream does not stop the process, so the kill must
/// happen inside the container.
pub fn exec_command(request: &RunRequest) -> Vec<String> {
    let secs = request.timeout.as_secs_f64().ceil().max(1.0) as u64;
    let mut cmd = vec![
        "timeout".to_string(),
        "-s".to_string(),
        "KILL".to_string(),
        secs.to_string(),
    ];
    cmd.extend(request.argv());
    cmd
}

/// Map a finished exec to a result
fn exec_result(
    exit_code: Option<i64>,
    output: String,
    elapsed: Duration,
    timeout: Duration,
) -> ExecutionResult {
    let duration_ms = elapsed.as_secs_f64() * 1000.0;
    match exit_code {
        Some(0) => ExecutionResult::success(output, duration_ms),
        Some(EXIT_KILLED) if elapsed >= timeout => ExecutionResult::timed_out(&output, timeout),
        Some(code) => ExecutionResult::error(
            format!("exit code {}\n{}", code, output),
            Some(code),
            duration_ms,
        ),
        None => ExecutionResult::error(
            format!("exec finished without an exit code\n{}", output),
            None,
            duration_ms,
        ),
    }
}

fn combine_output(stdout: &str, stderr: &str) -> String {
    let mut output = stdout.to_string();
    if !stderr.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(stderr);
    }
    output
}

fn absolute(path: &Path) -> Result<PathBuf, EnvironmentError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| EnvironmentError::Provisioning(e.to_string()))?;
    Ok(cwd.join(path))
}

/// One Docker container serving as a session's execution environment
pub struct DockerEnvironment {
    client: DockerClient,
    config: DockerConfig,
    name: String,
    container_id: Option<String>,
    /// Whether this handle created the container (vs. reusing an existing one)
    created: bool,
}

impl DockerEnvironment {
    pub fn new(config: DockerConfig) -> Self {
        let name = config
            .container_name
            .clone()
            .unwrap_or_else(|| format!("codevisor-{}", Uuid::now_v7()));

        Self {
            client: DockerClient::new(config.socket_path.clone()),
            config,
            name,
            container_id: None,
            created: false,
        }
    }

    async fn provision(&mut self) -> Result<(), EnvironmentError> {
        if let Some(existing) = self.client.inspect_container(&self.name).await? {
            info!(container = %self.name, running = existing.state.running, "Reusing existing container");
            if !existing.state.running {
                self.client.start_container(&existing.id).await?;
            }
            self.container_id = Some(existing.id);
            return Ok(());
        }

        let output_dir = absolute(&self.config.output_dir)?;
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            EnvironmentError::Provisioning(format!(
                "cannot create output dir {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        let body = ContainerCreate {
            image: self.config.image.clone(),
            cmd: vec!["sleep".to_string(), "infinity".to_string()],
            env: env_list(&self.config.env),
            working_dir: CONTAINER_WORKDIR.to_string(),
            tty: false,
            host_config: HostConfig {
                auto_remove: self.config.auto_remove,
                binds: vec![format!("{}:{}", output_dir.display(), CONTAINER_WORKDIR)],
            },
        };

        let id = self
            .create_pulling_if_missing(&body)
            .await
            .map_err(|e| EnvironmentError::Provisioning(format!("create {}: {}", self.name, e)))?;

        // Recorded before start so stop() can clean up a half-started container
        self.container_id = Some(id.clone());
        self.created = true;

        self.client
            .start_container(&id)
            .await
            .map_err(|e| EnvironmentError::Provisioning(format!("start {}: {}", self.name, e)))?;

        info!(container = %self.name, image = %self.config.image, "Container started");
        Ok(())
    }
}

impl DockerEnvironment {
    async fn create_pulling_if_missing(
        &self,
        body: &ContainerCreate,
    ) -> Result<String, EnvironmentError> {
        match self.client.create_container(&self.name, body).await {
            Err(EnvironmentError::Api { status: 404, message }) => {
                info!(image = %self.config.image, reason = %message, "Image missing, pulling");
                let pull_timeout = Duration::from_secs(self.config.pull_timeout_secs);
                tokio::time::timeout(pull_timeout, self.client.pull_image(&self.config.image))
                    .await
                    .map_err(|_| {
                        EnvironmentError::Provisioning(format!(
                            "pull {} exceeded {}s",
                            self.config.image, self.config.pull_timeout_secs
                        ))
                    })??;
                info!(image = %self.config.image, "Image pulled");
                self.client.create_container(&self.name, body).await
            }
            other => other,
        }
    }
}

impl Drop for DockerEnvironment {
    fn drop(&mut self) {
        let Some(id) = self.container_id.take() else {
            return;
        };
        if !self.config.stop_container {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(container = %self.name, "Dropped outside a runtime, container left running");
            return;
        };

        warn!(container = %self.name, "Environment dropped while running, stopping container");
        let client = self.client.clone();
        let name = self.name.clone();
        let stop_timeout = self.config.stop_timeout_secs;
        let remove = self.created && self.config.auto_remove;
        runtime.spawn(async move {
            if let Err(e) = client.stop_container(&id, stop_timeout).await {
                warn!(container = %name, error = %e, "Background stop failed");
            }
            if remove {
                if let Err(e) = client.remove_container(&id).await {
                    warn!(container = %name, error = %e, "Background remove failed");
                }
            }
        });
    }
}

#[async_trait]
impl ExecutionEnvironment for DockerEnvironment {
    fn id(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<(), EnvironmentError> {
        if self.container_id.is_some() {
            debug!(container = %self.name, "start() on an already started environment");
            return Ok(());
        }
        self.provision().await
    }

    async fn stop(&mut self) -> Result<(), EnvironmentError> {
        let Some(id) = self.container_id.take() else {
            debug!(container = %self.name, "Nothing to stop");
            return Ok(());
        };

        if !self.config.stop_container {
            info!(container = %self.name, "Leaving container running");
            return Ok(());
        }

        self.client
            .stop_container(&id, self.config.stop_timeout_secs)
            .await?;

        // A container that never started is not auto-removed by Docker
        if self.created && self.config.auto_remove {
            self.client.remove_container(&id).await?;
        }

        info!(container = %self.name, "Container stopped");
        Ok(())
    }

    async fn is_running(&mut self) -> bool {
        let Some(id) = self.container_id.as_deref() else {
            return false;
        };
        match self.client.inspect_container(id).await {
            Ok(Some(inspect)) => inspect.state.running,
            Ok(None) => false,
            Err(e) => {
                warn!(container = %self.name, error = %e, "Failed to inspect container");
                false
            }
        }
    }

    async fn run(&mut self, request: &RunRequest) -> Result<ExecutionResult, EnvironmentError> {
        let container_id = self
            .container_id
            .clone()
            .ok_or(EnvironmentError::NotRunning)?;

        let mut env = self.config.env.clone();
        env.extend(request.env.clone());

        let exec_id = self
            .client
            .create_exec(
                &container_id,
                &ExecCreate {
                    attach_stdout: true,
                    attach_stderr: true,
                    cmd: exec_command(request),
                    env: env_list(&env),
                    working_dir: CONTAINER_WORKDIR.to_string(),
                },
            )
            .await?;

        debug!(container = %self.name, exec_id = %exec_id, language = %request.language, "Exec created");

        let start = Instant::now();
        let mut raw = Vec::new();
        let streamed = tokio::time::timeout(
            request.timeout + KILL_GRACE,
            self.client.stream_exec(&exec_id, &mut raw),
        )
        .await;

        let (stdout, stderr) = demux_stream(&raw);
        let output = combine_output(&stdout, &stderr);

        match streamed {
            Err(_) => {
                warn!(
                    container = %self.name,
                    timeout_secs = request.timeout.as_secs_f64(),
                    "Execution timed out"
                );
                Ok(ExecutionResult::timed_out(&output, request.timeout))
            }
            Ok(stream_result) => {
                stream_result?;
                let elapsed = start.elapsed();
                let inspect = self.client.inspect_exec(&exec_id).await?;
                Ok(exec_result(inspect.exit_code, output, elapsed, request.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::ExecutionStatus;
    use std::collections::HashMap;
    use std::time::Duration;

    fn frame(stream: u8, payload: &str) -> Vec<u8> {
        let mut out = vec![stream, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload.as_bytes());
        out
    }

    #[test]
    fn test_demux_interleaved_frames() {
        let mut raw = frame(STREAM_STDOUT, "hello ");
        raw.extend(frame(STREAM_STDERR, "warn\n"));
        raw.extend(frame(STREAM_STDOUT, "world\n"));

        let (stdout, stderr) = demux_stream(&raw);
        assert_eq!(stdout, "hello world\n");
        assert_eq!(stderr, "warn\n");
    }

    #[test]
    fn test_demux_truncated_frame() {
        let mut raw = frame(STREAM_STDOUT, "complete");
        let mut partial = frame(STREAM_STDOUT, "partial-output");
        partial.truncate(FRAME_HEADER_LEN + 7);
        raw.extend(partial);

        let (stdout, _) = demux_stream(&raw);
        assert_eq!(stdout, "completepartial");
    }

    #[test]
    fn test_demux_empty() {
        assert_eq!(demux_stream(&[]), (String::new(), String::new()));
    }

    #[test]
    fn test_combine_output() {
        assert_eq!(combine_output("out", "err"), "out\nerr");
        assert_eq!(combine_output("out\n", "err"), "out\nerr");
        assert_eq!(combine_output("", "err"), "err");
        assert_eq!(combine_output("out", ""), "out");
    }

    fn python_request(timeout: Duration) -> RunRequest {
        RunRequest {
            language: "python".into(),
            command: vec!["python3".into(), "-c".into()],
            source: "print(1)".into(),
            timeout,
            env: HashMap::new(),
        }
    }

    #[test]
    fn test_exec_command_kills_inside_container() {
        let cmd = exec_command(&python_request(Duration::from_secs(60)));
        assert_eq!(cmd, vec!["timeout", "-s", "KILL", "60", "python3", "-c", "print(1)"]);

        // Sub-second bounds round up, never down to zero
        let cmd = exec_command(&python_request(Duration::from_millis(1500)));
        assert_eq!(&cmd[..4], &["timeout", "-s", "KILL", "2"]);
        let cmd = exec_command(&python_request(Duration::from_millis(10)));
        assert_eq!(cmd[3], "1");
    }

    #[test]
    fn test_exec_result_classification() {
        let timeout = Duration::from_secs(5);

        let ok = exec_result(Some(0), "hi\n".into(), Duration::from_secs(1), timeout);
        assert_eq!(ok.status, ExecutionStatus::Success);

        let killed = exec_result(Some(EXIT_KILLED), "partial".into(), Duration::from_secs(5), timeout);
        assert_eq!(killed.status, ExecutionStatus::Timeout);
        assert!(killed.output.ends_with("partial"));

        // SIGKILL before the bound (e.g. OOM) is an ordinary failure
        let oom = exec_result(Some(EXIT_KILLED), String::new(), Duration::from_secs(1), timeout);
        assert_eq!(oom.status, ExecutionStatus::Error);
        assert_eq!(oom.exit_code, Some(EXIT_KILLED));

        let failed = exec_result(Some(1), "Traceback".into(), Duration::from_secs(1), timeout);
        assert_eq!(failed.status, ExecutionStatus::Error);
        assert!(failed.output.starts_with("Error: exit code 1"));
    }

    #[test]
    fn test_pull_stream_error() {
        let ok = b"{\"status\":\"Pulling from library/python\"}\n{\"status\":\"Download complete\"}\n";
        assert_eq!(pull_stream_error(ok), None);

        let denied = b"{\"status\":\"Pulling\"}\n{\"errorDetail\":{\"message\":\"denied\"},\"error\":\"pull access denied\"}\n";
        assert_eq!(pull_stream_error(denied).as_deref(), Some("pull access denied"));
    }

    #[tokio::test]
    async fn test_drop_without_container_is_noop() {
        let env = DockerEnvironment::new(DockerConfig {
            socket_path: PathBuf::from("/definitely/missing/docker.sock"),
            ..Default::default()
        });
        drop(env);
    }

    #[test]
    fn test_generated_container_name() {
        let env = DockerEnvironment::new(DockerConfig::default());
        assert!(env.id().starts_with("codevisor-"));

        let named = DockerEnvironment::new(DockerConfig {
            container_name: Some("my-kernel".into()),
            ..Default::default()
        });
        assert_eq!(named.id(), "my-kernel");
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let mut env = DockerEnvironment::new(DockerConfig {
            socket_path: PathBuf::from("/definitely/missing/docker.sock"),
            ..Default::default()
        });
        assert!(env.stop().await.is_ok());
        assert!(!env.is_running().await);
    }

    #[tokio::test]
    async fn test_run_before_start_fails() {
        let mut env = DockerEnvironment::new(DockerConfig::default());
        let request = python_request(Duration::from_secs(1));
        assert!(matches!(
            env.run(&request).await,
            Err(EnvironmentError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_start_fails_without_daemon() {
        let mut env = DockerEnvironment::new(DockerConfig {
            socket_path: PathBuf::from("/definitely/missing/docker.sock"),
            ..Default::default()
        });
        let err = env.start().await.unwrap_err();
        assert!(matches!(err, EnvironmentError::Connection(_)));
    }

    #[tokio::test]
    #[ignore = "Requires a running Docker daemon"]
    async fn test_docker_roundtrip() {
        let mut env = DockerEnvironment::new(DockerConfig::default());
        env.start().await.unwrap();
        assert!(env.is_running().await);

        let request = RunRequest {
            language: "python".into(),
            command: vec!["python3".into(), "-c".into()],
            source: "print('hi')".into(),
            timeout: Duration::from_secs(30),
            env: HashMap::new(),
        };
        let result = env.run(&request).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.output, "hi\n");

        env.stop().await.unwrap();
    }
}

//! A long-lived Playwright helper process driven over JSON lines.
//!
//! One helper owns one browser and one context for the whole run, so
//! cookies, storage state and HAR recording span every shot.

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::playwright::{
    ensure_node_available, ensure_playwright_available, map_helper_error, map_node_failure,
    map_spawn_error, HelperError, HELPER_SCRIPT,
};
use crate::config::{HarContent, HttpCredentials, RunOptions};
use crate::{Result, ShotError, Viewport};

/// Node binary used when the config file names none.
pub const DEFAULT_NODE_COMMAND: &str = "node";

/// Playwright's own navigation timeout when none is configured.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack added on top of the navigation timeout before the helper is
/// considered hung.
pub const PROCESS_MARGIN: Duration = Duration::from_secs(30);

/// Launching a browser can be slow on a cold cache.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

/// How long `close` may take to flush HAR files and exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct Request<'a, P: Serialize> {
    id: u64,
    op: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct Response {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<HelperError>,
}

#[derive(Deserialize)]
struct ConsoleEvent {
    level: String,
    text: String,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchParams<'a> {
    browser: &'a str,
    browser_args: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_scale_factor: Option<f64>,
    reduced_motion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_credentials: Option<&'a HttpCredentials>,
    bypass_csp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_har: Option<RecordHar>,
    log_console: bool,
}

#[derive(Serialize)]
struct RecordHar {
    path: String,
    content: HarContent,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenParams<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    viewport: Option<Viewport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
}

#[derive(Deserialize)]
struct OpenResult {
    status: Option<u16>,
}

/// Page preparation applied after navigation, in order: wait, script, poll.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl PrepareRequest {
    fn is_empty(&self) -> bool {
        self.wait.is_none() && self.javascript.is_none() && self.wait_for.is_none()
    }
}

/// Elements whose union bounding box becomes the screenshot clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub selectors: Vec<String>,
    pub selectors_all: Vec<String>,
    pub js_selectors: Vec<String>,
    pub js_selectors_all: Vec<String>,
    pub padding: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRequest {
    /// Written by the browser when set; returned as bytes otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub full_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    pub omit_background: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub media_screen: bool,
    pub landscape: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    pub scale: f64,
    pub print_background: bool,
}

/// Either a path the browser wrote to, or the bytes it produced.
#[derive(Deserialize)]
struct Encoded {
    #[serde(default)]
    data: Option<String>,
}

impl Encoded {
    fn into_bytes(self) -> Result<Option<Vec<u8>>> {
        match self.data {
            Some(data) => Ok(Some(
                base64::engine::general_purpose::STANDARD.decode(data)?,
            )),
            None => Ok(None),
        }
    }
}

#[derive(Deserialize)]
struct HtmlResult {
    html: String,
}

#[derive(Deserialize)]
struct EvaluateResult {
    value: Value,
}

#[derive(Deserialize)]
struct AccessibilityResult {
    tree: Value,
}

/// A running helper with one browser context.
pub struct BrowserSession {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
    next_id: u64,
    navigation_timeout: Duration,
    current_url: Option<String>,
    har_path: Option<PathBuf>,
}

impl BrowserSession {
    /// Checks for Node and Playwright, starts the helper and launches the
    /// browser described by `options`.
    pub async fn launch(options: &RunOptions) -> Result<Self> {
        let node_command = options
            .node_command
            .as_deref()
            .unwrap_or(DEFAULT_NODE_COMMAND);
        ensure_node_available(node_command).await?;
        ensure_playwright_available(node_command).await?;

        let settings = &options.browser;
        let storage_state = match &settings.auth_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ShotError::config(format!(
                        "Auth file {} does not exist",
                        path.display()
                    )));
                }
                Some(path.to_string_lossy().into_owned())
            }
            None => None,
        };
        let record_har = settings.har.as_ref().map(|har| RecordHar {
            path: har.path.to_string_lossy().into_owned(),
            content: har.content,
        });

        let mut cmd = Command::new(node_command);
        cmd.arg("-e")
            .arg(HELPER_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(browser = settings.browser.as_str(), "starting Playwright helper");
        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, node_command))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShotError::Browser("Playwright helper has no stdout".to_string()))?;
        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr_pipe {
                let _ = err.read_to_end(&mut buf).await;
            }
            buf
        });

        let mut session = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            stderr_task: Some(stderr_task),
            next_id: 0,
            navigation_timeout: options
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_NAVIGATION_TIMEOUT),
            current_url: None,
            har_path: settings.har.as_ref().map(|har| har.path.clone()),
        };

        let params = LaunchParams {
            browser: settings.browser.as_str(),
            browser_args: &settings.browser_args,
            storage_state,
            device_scale_factor: settings.scale_factor,
            reduced_motion: settings.reduced_motion,
            user_agent: settings.user_agent.as_deref(),
            http_credentials: settings.credentials.as_ref(),
            bypass_csp: settings.bypass_csp,
            record_har,
            log_console: settings.log_console,
        };
        session
            .request::<_, Empty>("launch", params, LAUNCH_TIMEOUT)
            .await?;
        Ok(session)
    }

    fn rpc_timeout(&self, extra_ms: Option<u64>) -> Duration {
        self.navigation_timeout + PROCESS_MARGIN + Duration::from_millis(extra_ms.unwrap_or(0))
    }

    async fn request<P, T>(&mut self, op: &str, params: P, limit: Duration) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        self.next_id += 1;
        let id = self.next_id;
        let mut line = serde_json::to_string(&Request { id, op, params })?;
        line.push('\n');
        debug!(id, op, "helper request");

        let written = match self.stdin.as_mut() {
            Some(stdin) => write_line(stdin, &line).await,
            None => {
                return Err(ShotError::Browser(
                    "Playwright helper is closed".to_string(),
                ))
            }
        };
        if let Err(err) = written {
            debug!(error = %err, "helper stdin closed");
            return Err(self.helper_exited().await);
        }

        match timeout(limit, self.read_response(id)).await {
            Ok(response) => {
                let value = response?;
                Ok(serde_json::from_value(value)?)
            }
            Err(_) => {
                let _ = self.child.kill().await;
                self.stdin = None;
                let message = format!("Timed out after {:?} waiting for the browser", limit);
                Err(match &self.current_url {
                    Some(url) => ShotError::navigation(url.clone(), message),
                    None => ShotError::Browser(message),
                })
            }
        }
    }

    async fn read_response(&mut self, id: u64) -> Result<Value> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Err(self.helper_exited().await);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).map_err(|_| {
                ShotError::Browser(format!("Unexpected Playwright helper output: {}", line))
            })?;
            if value.get("event").is_some() {
                log_event(value);
                continue;
            }
            let response: Response = serde_json::from_value(value)?;
            if response.id != Some(id) && response.id.is_some() {
                debug!(expected = id, got = ?response.id, "ignoring stale helper response");
                continue;
            }
            if response.ok {
                return Ok(response
                    .result
                    .unwrap_or_else(|| Value::Object(Default::default())));
            }
            let error = response.error.unwrap_or(HelperError {
                kind: "engine".to_string(),
                message: "Playwright helper reported an unknown error".to_string(),
            });
            return Err(map_helper_error(error, self.current_url.as_deref()));
        }
    }

    /// False once the helper has exited or was killed after a timeout.
    pub fn helper_running(&self) -> bool {
        self.stdin.is_some()
    }

    /// Builds the error for a helper that went away mid-request.
    async fn helper_exited(&mut self) -> ShotError {
        self.stdin = None;
        let status = match timeout(SHUTDOWN_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => status.to_string(),
            _ => "unknown".to_string(),
        };
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        map_node_failure(status, &String::from_utf8_lossy(&stderr))
    }

    /// Opens a fresh page and navigates; returns the HTTP status if the
    /// navigation produced a response.
    pub async fn open(
        &mut self,
        url: &str,
        viewport: Option<Viewport>,
        timeout_ms: Option<u64>,
    ) -> Result<Option<u16>> {
        self.current_url = Some(url.to_string());
        let params = OpenParams {
            url,
            viewport,
            timeout: timeout_ms,
        };
        let limit = self.rpc_timeout(timeout_ms);
        let result: OpenResult = self.request("open", params, limit).await?;
        debug!(url, status = ?result.status, "navigated");
        Ok(result.status)
    }

    pub async fn prepare(&mut self, request: PrepareRequest) -> Result<()> {
        if request.is_empty() {
            return Ok(());
        }
        let limit = self.rpc_timeout(Some(
            request.wait.unwrap_or(0) + request.timeout.unwrap_or(0),
        ));
        self.request::<_, Empty>("prepare", request, limit).await?;
        Ok(())
    }

    /// Takes a screenshot; bytes are returned only when no path was given.
    pub async fn screenshot(&mut self, request: ScreenshotRequest) -> Result<Option<Vec<u8>>> {
        let limit = self.rpc_timeout(None);
        let encoded: Encoded = self.request("screenshot", request, limit).await?;
        encoded.into_bytes()
    }

    pub async fn pdf(&mut self, request: PdfRequest) -> Result<Option<Vec<u8>>> {
        let limit = self.rpc_timeout(None);
        let encoded: Encoded = self.request("pdf", request, limit).await?;
        encoded.into_bytes()
    }

    /// Outer HTML of the first match for `selector`, or the whole document.
    pub async fn html(&mut self, selector: Option<&str>) -> Result<String> {
        #[derive(Serialize)]
        struct Params<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            selector: Option<&'a str>,
        }
        let limit = self.rpc_timeout(None);
        let result: HtmlResult = self.request("html", Params { selector }, limit).await?;
        Ok(result.html)
    }

    pub async fn evaluate(&mut self, expression: &str) -> Result<Value> {
        #[derive(Serialize)]
        struct Params<'a> {
            expression: &'a str,
        }
        let limit = self.rpc_timeout(None);
        let result: EvaluateResult = self
            .request("evaluate", Params { expression }, limit)
            .await?;
        Ok(result.value)
    }

    pub async fn accessibility(&mut self) -> Result<Value> {
        let limit = self.rpc_timeout(None);
        let result: AccessibilityResult = self
            .request("accessibility", serde_json::json!({}), limit)
            .await?;
        Ok(result.tree)
    }

    pub async fn close_page(&mut self) -> Result<()> {
        let limit = self.rpc_timeout(None);
        self.request::<_, Empty>("closePage", serde_json::json!({}), limit)
            .await?;
        self.current_url = None;
        Ok(())
    }

    /// Closes the context (flushing any HAR recording) and the helper.
    pub async fn close(mut self) -> Result<()> {
        self.current_url = None;
        let closed = self
            .request::<_, Empty>("close", serde_json::json!({}), SHUTDOWN_TIMEOUT)
            .await;
        self.stdin = None;
        match timeout(SHUTDOWN_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                warn!(%status, "Playwright helper exited uncleanly");
            }
            Ok(Err(err)) => return Err(ShotError::Io(err)),
            Err(_) => {
                let _ = self.child.kill().await;
            }
            Ok(Ok(_)) => {}
        }
        closed?;
        if let Some(path) = &self.har_path {
            info!("Wrote to HAR file: {}", path.display());
        }
        Ok(())
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

fn log_event(value: Value) {
    match serde_json::from_value::<ConsoleEvent>(value) {
        Ok(event) => match event.level.as_str() {
            "error" => warn!(target: "console", "{}", event.text),
            _ => info!(target: "console", "{}", event.text),
        },
        Err(err) => debug!(error = %err, "unrecognised helper event"),
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, ShotError};

/// Device scale factor implied by `--retina`.
pub const RETINA_SCALE_FACTOR: f64 = 2.0;

/// Defaults read from a TOML file; CLI flags override them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub browser: Option<BrowserKind>,
    pub browser_args: Vec<String>,
    pub user_agent: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub reduced_motion: bool,
    pub bypass_csp: bool,
    pub scale_factor: Option<f64>,
    pub node_command: Option<String>,
}

impl Config {
    /// `$XDG_CONFIG_HOME/shot-scraper/config.toml`, if it exists.
    pub fn central_config_path() -> Option<PathBuf> {
        xdg::BaseDirectories::with_prefix("shot-scraper")
            .ok()?
            .find_config_file("config.toml")
    }

    /// Loads an explicit path, else the central config, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::central_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        let raw = fs::read_to_string(&path)?;
        toml::from_str(&raw).map_err(|e| {
            ShotError::config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(scale) = self.scale_factor {
            if scale <= 0.0 || !scale.is_finite() {
                return Err("scale_factor must be positive".to_string());
            }
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err("timeout must be greater than zero".to_string());
        }
        if self.node_command.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err("node_command must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
    Chrome,
    ChromeBeta,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
            BrowserKind::Chrome => "chrome",
            BrowserKind::ChromeBeta => "chrome-beta",
        }
    }
}

/// What to do when navigation answers with an HTTP error status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpErrorPolicy {
    /// Capture the error page like any other page.
    #[default]
    Capture,
    /// Log the status and move on without capturing.
    Skip,
    /// Treat the status as a failure.
    Fail,
}

impl HttpErrorPolicy {
    pub fn from_flags(skip: bool, fail: bool) -> Result<Self> {
        match (skip, fail) {
            (true, true) => Err(ShotError::config("--skip and --fail cannot be used together")),
            (true, false) => Ok(Self::Skip),
            (false, true) => Ok(Self::Fail),
            (false, false) => Ok(Self::Capture),
        }
    }
}

/// Resolves `--retina` / `--scale-factor` into a device scale factor.
pub fn device_scale_factor(retina: bool, scale_factor: Option<f64>) -> Result<Option<f64>> {
    match (retina, scale_factor) {
        (true, Some(_)) => Err(ShotError::config(
            "--retina and --scale-factor cannot be used together",
        )),
        (_, Some(scale)) if scale <= 0.0 || !scale.is_finite() => {
            Err(ShotError::config("--scale-factor must be positive"))
        }
        (_, Some(scale)) => Ok(Some(scale)),
        (true, None) => Ok(Some(RETINA_SCALE_FACTOR)),
        (false, None) => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpCredentials {
    pub username: String,
    pub password: String,
}

impl HttpCredentials {
    pub fn from_flags(username: Option<String>, password: Option<String>) -> Result<Option<Self>> {
        match (username, password) {
            (Some(username), Some(password)) => Ok(Some(Self { username, password })),
            (None, None) => Ok(None),
            _ => Err(ShotError::config(
                "--auth-username and --auth-password must be used together",
            )),
        }
    }
}

/// How HAR bodies are stored: inline in the JSON, or as files in a zip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HarContent {
    Embed,
    Attach,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarRecording {
    pub path: PathBuf,
    pub content: HarContent,
}

impl HarRecording {
    /// `.zip` paths are written as archives with bodies as separate files.
    pub fn new(path: PathBuf) -> Self {
        let zipped = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        Self {
            path,
            content: if zipped {
                HarContent::Attach
            } else {
                HarContent::Embed
            },
        }
    }

    pub fn is_zip(&self) -> bool {
        self.content == HarContent::Attach
    }
}

/// Browser and context settings shared by every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowserSettings {
    pub browser: BrowserKind,
    pub browser_args: Vec<String>,
    pub user_agent: Option<String>,
    pub scale_factor: Option<f64>,
    pub reduced_motion: bool,
    pub bypass_csp: bool,
    pub auth_file: Option<PathBuf>,
    pub credentials: Option<HttpCredentials>,
    pub log_console: bool,
    pub har: Option<HarRecording>,
}

/// Settings that only apply to `multi`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiOptions {
    pub no_clobber: bool,
    /// When non-empty, only shots with one of these outputs run.
    pub outputs: Vec<String>,
    pub fail_on_error: bool,
    pub leave_server: bool,
    /// Recording a HAR: shots without an output are navigated, not captured.
    pub har_only: bool,
}

/// Everything one invocation needs, resolved and validated once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub browser: BrowserSettings,
    pub http_errors: HttpErrorPolicy,
    /// Navigation timeout in milliseconds.
    pub timeout: Option<u64>,
    pub silent: bool,
    pub node_command: Option<String>,
}

//! Shot records as written by users, and as handed to the browser.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::HttpErrorPolicy;
use crate::viewport::Viewport;
use crate::{Result, ShotError};

/// One shot as it appears in a YAML file or on the command line.
///
/// Absent keys stay `None`; nothing is inferred until normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawShot {
    pub url: Option<String>,
    pub output: Option<String>,
    pub selector: Option<String>,
    pub selectors: Vec<String>,
    pub selector_all: Option<String>,
    pub selectors_all: Vec<String>,
    pub js_selector: Option<String>,
    pub js_selectors: Vec<String>,
    pub js_selector_all: Option<String>,
    pub js_selectors_all: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u32>,
    pub wait: Option<u64>,
    pub wait_for: Option<String>,
    pub timeout: Option<u64>,
    pub padding: Option<u32>,
    pub javascript: Option<String>,
    pub omit_background: Option<bool>,
}

impl RawShot {
    /// The output the user wrote down, if any.
    pub fn declared_output(&self) -> Option<&str> {
        self.output
            .as_deref()
            .map(str::trim)
            .filter(|output| !output.is_empty())
    }

    pub fn has_url(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}

/// Where a capture ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShotOutput {
    File(PathBuf),
    Stdout,
}

/// A fully-populated shot, ready for the browser.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotSpec {
    pub url: String,
    pub output: ShotOutput,
    pub selectors: Vec<String>,
    pub selectors_all: Vec<String>,
    pub js_selectors: Vec<String>,
    pub js_selectors_all: Vec<String>,
    pub viewport: Option<Viewport>,
    pub full_page: bool,
    pub quality: Option<u8>,
    pub wait: Option<u64>,
    pub wait_for: Option<String>,
    pub timeout: Option<u64>,
    pub padding: u32,
    pub javascript: Option<String>,
    pub omit_background: bool,
    pub http_errors: HttpErrorPolicy,
    /// Navigate only; used when a run exists to record network traffic.
    pub skip_shot: bool,
}

impl ShotSpec {
    pub fn output_path(&self) -> Option<&Path> {
        match &self.output {
            ShotOutput::File(path) => Some(path),
            ShotOutput::Stdout => None,
        }
    }

    pub fn has_selectors(&self) -> bool {
        !(self.selectors.is_empty()
            && self.selectors_all.is_empty()
            && self.js_selectors.is_empty()
            && self.js_selectors_all.is_empty())
    }
}

/// A command in a multi-shot file: a shell string or an argument list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Shell(String),
    Argv(Vec<serde_yaml::Value>),
}

impl CommandSpec {
    /// Argument list with scalars rendered as strings (`9023` → `"9023"`).
    pub fn argv(&self) -> Result<Vec<String>> {
        match self {
            CommandSpec::Shell(line) => Ok(vec![line.clone()]),
            CommandSpec::Argv(values) => {
                let argv = values
                    .iter()
                    .map(|value| match value {
                        serde_yaml::Value::String(s) => Ok(s.clone()),
                        serde_yaml::Value::Number(n) => Ok(n.to_string()),
                        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
                        other => Err(ShotError::config(format!(
                            "Command arguments must be strings or numbers, got {other:?}"
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                if argv.is_empty() {
                    return Err(ShotError::config("Command argument list is empty"));
                }
                Ok(argv)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CommandSpec::Shell(line) => line.clone(),
            CommandSpec::Argv(_) => self.argv().map(|a| a.join(" ")).unwrap_or_default(),
        }
    }
}

/// One item of a multi-shot YAML list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub sh: Option<CommandSpec>,
    #[serde(default)]
    pub python: Option<String>,
    #[serde(default)]
    pub server: Option<CommandSpec>,
    #[serde(flatten)]
    pub shot: RawShot,
}

impl Entry {
    pub fn has_directives(&self) -> bool {
        self.sh.is_some() || self.python.is_some() || self.server.is_some()
    }

    /// Checks what can be checked without touching the browser or disk.
    pub fn validate(&self, index: usize) -> Result<()> {
        for command in [&self.sh, &self.server].into_iter().flatten() {
            command.argv()?;
        }
        let shot = &self.shot;
        if !shot.has_url() {
            if self.has_shot_fields() {
                return Err(ShotError::config(format!(
                    "Shot {} is missing a 'url'",
                    index + 1
                )));
            }
            return Ok(());
        }
        validate_quality(shot.quality)?;
        validate_dimensions(shot.width, shot.height)?;
        Ok(())
    }

    /// True when any shot key was written, even without a url.
    pub fn has_shot_fields(&self) -> bool {
        self.shot != RawShot::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_directives() && !self.has_shot_fields()
    }
}

pub(crate) fn validate_quality(quality: Option<u32>) -> Result<Option<u8>> {
    match quality {
        None => Ok(None),
        Some(q @ 1..=100) => Ok(Some(q as u8)),
        Some(q) => Err(ShotError::config(format!(
            "quality must be between 1 and 100, got {q}"
        ))),
    }
}

/// Viewport sides must be positive when given.
pub(crate) fn validate_dimensions(width: Option<u32>, height: Option<u32>) -> Result<()> {
    for (name, value) in [("width", width), ("height", height)] {
        if value == Some(0) {
            return Err(ShotError::config(format!(
                "{name} must be a positive integer, got 0"
            )));
        }
    }
    Ok(())
}

/// Parses a multi-shot YAML document; the top level must be a list.
pub fn parse_entries(yaml: &str) -> Result<Vec<Entry>> {
    let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    match document {
        serde_yaml::Value::Sequence(items) => items
            .into_iter()
            .map(|item| serde_yaml::from_value::<Entry>(item).map_err(ShotError::from))
            .collect(),
        _ => Err(ShotError::config("YAML file must contain a list")),
    }
}

//! shot-scraper library
//!
//! Screenshots, PDFs, HTML snapshots, accessibility trees and HAR archives of
//! web pages, driven through Playwright in a Node.js helper process.
//!
//! # Module Overview
//!
//! - [`browser`] - The Node.js/Playwright helper and its page operations
//! - [`capture`] - Turning a normalized shot into a screenshot
//! - [`shot`] / [`normalize`] - Shot descriptions as written, and resolved
//! - [`sequencer`] - Running a multi-shot YAML file, including its directives
//! - [`filename`] / [`extension`] - Output names derived from URLs
//! - [`har`] - Extracting response bodies from a recorded HAR
//! - [`config`] - Configuration file support and run settings
//!
//! # Example
//!
//! ```no_run
//! use shot_scraper_lib::{normalize_shot, BrowserSession, Capture, NormalizeContext, RawShot, RunOptions};
//!
//! # async fn example() -> shot_scraper_lib::Result<()> {
//! let run = RunOptions::default();
//! let raw = RawShot {
//!     url: Some("https://example.com/".into()),
//!     ..RawShot::default()
//! };
//! let shot = normalize_shot(raw, &NormalizeContext::on_disk(run.http_errors, run.timeout))?;
//!
//! let mut session = BrowserSession::launch(&run).await?;
//! session.capture(&shot).await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod extension;
pub mod filename;
pub mod har;
pub mod logging;
pub mod normalize;
pub mod resource;
pub mod sequencer;
pub mod shot;
pub mod viewport;

pub use browser::{
    BrowserSession, PdfRequest, PrepareRequest, ScreenshotRequest, Selection,
    DEFAULT_NAVIGATION_TIMEOUT, DEFAULT_NODE_COMMAND,
};
pub use capture::{Capture, CaptureOutcome};
pub use config::{
    BrowserKind, BrowserSettings, Config, HarContent, HarRecording, HttpCredentials,
    HttpErrorPolicy, MultiOptions, RunOptions,
};
pub use error::{ErrorCategory, ErrorPayload, Result, ShotError};
pub use extension::{expected_content_type, extension_for_content_type, filename_for_har_entry};
pub use filename::{file_exists_never, file_exists_on_disk, filename_for_url, DEFAULT_EXTENSION};
pub use har::extract_har;
pub use logging::init_logging;
pub use normalize::{normalize_shot, NormalizeContext, STDOUT_OUTPUT};
pub use resource::{local_file_lookup, url_or_file_path};
pub use sequencer::{RunSummary, Sequencer, ServerGuard};
pub use shot::{parse_entries, CommandSpec, Entry, RawShot, ShotOutput, ShotSpec};
pub use viewport::Viewport;

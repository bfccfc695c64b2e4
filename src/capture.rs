//! Realizing one [`ShotSpec`] against a browser.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::browser::{BrowserSession, PrepareRequest, ScreenshotRequest, Selection};
use crate::config::HttpErrorPolicy;
use crate::shot::{ShotOutput, ShotSpec};
use crate::{Result, ShotError};

/// What happened to a shot that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Written(PathBuf),
    Bytes(Vec<u8>),
    /// The page answered with an HTTP error and the run skips those.
    Skipped { status: u16 },
    /// Navigated for its side effects (HAR traffic) without a screenshot.
    NavigatedOnly,
}

/// Anything that can turn a normalized shot into an image.
#[allow(async_fn_in_trait)]
pub trait Capture {
    async fn capture(&mut self, shot: &ShotSpec) -> Result<CaptureOutcome>;

    /// False once the capturer can no longer take shots.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Applies the HTTP error policy to a navigation status.
///
/// Returns the status when the shot should be skipped.
pub fn check_status(url: &str, status: Option<u16>, policy: HttpErrorPolicy) -> Result<Option<u16>> {
    let Some(status) = status.filter(|status| *status >= 400) else {
        return Ok(None);
    };
    match policy {
        HttpErrorPolicy::Capture => Ok(None),
        HttpErrorPolicy::Skip => {
            warn!("{} error for {}, skipping", status, url);
            Ok(Some(status))
        }
        HttpErrorPolicy::Fail => Err(ShotError::http_status(url, status)),
    }
}

pub fn prepare_request(shot: &ShotSpec) -> PrepareRequest {
    PrepareRequest {
        wait: shot.wait,
        javascript: shot.javascript.clone(),
        wait_for: shot.wait_for.clone(),
        timeout: shot.timeout,
    }
}

pub fn screenshot_request(shot: &ShotSpec) -> ScreenshotRequest {
    if shot.quality.is_some() && shot.omit_background {
        warn!("omit_background has no effect on JPEG screenshots ({})", shot.url);
    }
    let selection = shot.has_selectors().then(|| Selection {
        selectors: shot.selectors.clone(),
        selectors_all: shot.selectors_all.clone(),
        js_selectors: shot.js_selectors.clone(),
        js_selectors_all: shot.js_selectors_all.clone(),
        padding: shot.padding,
    });
    ScreenshotRequest {
        path: shot.output_path().map(PathBuf::from),
        full_page: shot.full_page,
        quality: shot.quality,
        omit_background: shot.omit_background,
        selection,
    }
}

async fn capture_open_page(
    session: &mut BrowserSession,
    shot: &ShotSpec,
    status: Option<u16>,
) -> Result<CaptureOutcome> {
    if let Some(status) = check_status(&shot.url, status, shot.http_errors)? {
        return Ok(CaptureOutcome::Skipped { status });
    }
    session.prepare(prepare_request(shot)).await?;
    if shot.skip_shot {
        return Ok(CaptureOutcome::NavigatedOnly);
    }

    let bytes = session.screenshot(screenshot_request(shot)).await?;
    match (&shot.output, bytes) {
        (ShotOutput::File(path), _) => {
            info!(
                "Screenshot of '{}' written to '{}'",
                shot.url,
                path.display()
            );
            Ok(CaptureOutcome::Written(path.clone()))
        }
        (ShotOutput::Stdout, Some(bytes)) => Ok(CaptureOutcome::Bytes(bytes)),
        (ShotOutput::Stdout, None) => Err(ShotError::Browser(
            "Playwright helper returned no screenshot data".to_string(),
        )),
    }
}

impl Capture for BrowserSession {
    async fn capture(&mut self, shot: &ShotSpec) -> Result<CaptureOutcome> {
        // The page exists once `open` was sent, even if navigation failed.
        let outcome = match self.open(&shot.url, shot.viewport, shot.timeout).await {
            Ok(status) => capture_open_page(self, shot, status).await,
            Err(err) => Err(err),
        };
        if !self.helper_running() {
            return outcome;
        }
        let closed = self.close_page().await;
        let outcome = outcome?;
        closed?;
        Ok(outcome)
    }

    fn is_alive(&self) -> bool {
        self.helper_running()
    }
}

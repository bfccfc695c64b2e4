//! Browser automation through Playwright.
//!
//! A single Node.js helper process is started per run and driven over
//! newline-delimited JSON on its stdin/stdout.
//!
//! # Module Structure
//!
//! - `session` - the helper process and its page operations
//! - `playwright` - the helper script, availability checks and error mapping
//!
//! # Example
//!
//! ```no_run
//! use shot_scraper_lib::{BrowserSession, RunOptions, ScreenshotRequest};
//!
//! # async fn example() -> shot_scraper_lib::Result<()> {
//! let mut session = BrowserSession::launch(&RunOptions::default()).await?;
//! session.open("https://example.com/", None, None).await?;
//! let png = session.screenshot(ScreenshotRequest::default()).await?;
//! session.close().await?;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```

#[cfg(all(test, unix))]
pub(crate) mod fake_node;
mod playwright;
mod session;

pub use session::{
    BrowserSession, PdfRequest, PrepareRequest, ScreenshotRequest, Selection,
    DEFAULT_NAVIGATION_TIMEOUT, DEFAULT_NODE_COMMAND, PROCESS_MARGIN,
};

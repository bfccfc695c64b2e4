//! One module per subcommand.

mod accessibility;
mod har;
mod html;
mod install;
mod javascript;
mod multi;
mod pdf;
mod shot;

pub use accessibility::run_accessibility;
pub use har::{run_har, HarArgs};
pub use html::run_html;
pub use install::run_install;
pub use javascript::run_javascript;
pub use multi::{run_multi, MultiArgs};
pub use pdf::{run_pdf, PdfArgs};
pub use shot::run_shot;

use std::path::PathBuf;
use tracing::debug;

use shot_scraper_lib::capture::check_status;
use shot_scraper_lib::resource::{local_file_lookup, url_or_file_path};
use shot_scraper_lib::{BrowserSession, Config, PrepareRequest, Result, RunOptions};

use crate::cli::BrowserArgs;
use crate::settings::{format_effective_config, load_config, resolve_run_options};

/// Config and global flags every command starts from.
pub struct CommandContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = load_config(config_path.as_deref())?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn run_options(&self, browser: &BrowserArgs, timeout_ms: Option<u64>) -> Result<RunOptions> {
        let run = resolve_run_options(browser, timeout_ms, &self.config)?;
        debug!("{}", format_effective_config(&run, self.config_path.as_deref()));
        Ok(run)
    }
}

/// Turns a URL or local path into something the browser can open.
pub(crate) fn resolve_url(url: &str) -> Result<String> {
    url_or_file_path(url, local_file_lookup)
}

/// Opens `url` and runs the page steps.
///
/// Returns `false` when the page answered with an HTTP error that the
/// run skips.
pub(crate) async fn open_page(
    session: &mut BrowserSession,
    run: &RunOptions,
    url: &str,
    prepare: PrepareRequest,
) -> Result<bool> {
    let status = session.open(url, None, prepare.timeout.or(run.timeout)).await?;
    if check_status(url, status, run.http_errors)?.is_some() {
        return Ok(false);
    }
    session.prepare(prepare).await?;
    Ok(true)
}

/// Closes the session whatever `result` was, preferring the first error.
pub(crate) async fn finish<T>(session: BrowserSession, result: Result<T>) -> Result<T> {
    let closed = session.close().await;
    let value = result?;
    closed?;
    Ok(value)
}

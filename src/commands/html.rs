use std::path::PathBuf;
use tracing::info;

use shot_scraper_lib::{
    file_exists_on_disk, filename_for_url, BrowserSession, PrepareRequest, Result, RunOptions,
    STDOUT_OUTPUT,
};

use super::{finish, open_page, resolve_url, CommandContext};
use crate::cli::BrowserArgs;
use crate::formatting::write_text_output;

/// Run the html command.
pub async fn run_html(
    ctx: &CommandContext,
    url: String,
    output: Option<String>,
    javascript: Option<String>,
    wait: Option<u64>,
    selector: Option<String>,
    browser: BrowserArgs,
) -> Result<()> {
    let run = ctx.run_options(&browser, None)?;
    let url = resolve_url(&url)?;
    let output = match output.as_deref().map(str::trim) {
        Some(STDOUT_OUTPUT) => None,
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => Some(PathBuf::from(filename_for_url(
            &url,
            Some("html"),
            file_exists_on_disk,
        ))),
    };

    let prepare = PrepareRequest {
        wait,
        javascript,
        ..PrepareRequest::default()
    };
    let mut session = BrowserSession::launch(&run).await?;
    let result = snapshot(&mut session, &run, &url, prepare, selector.as_deref()).await;
    let Some(html) = finish(session, result).await? else {
        return Ok(());
    };

    write_text_output(&html, output.as_deref())?;
    if let Some(path) = &output {
        info!("HTML snapshot of '{}' written to '{}'", url, path.display());
    }
    Ok(())
}

async fn snapshot(
    session: &mut BrowserSession,
    run: &RunOptions,
    url: &str,
    prepare: PrepareRequest,
    selector: Option<&str>,
) -> Result<Option<String>> {
    if !open_page(session, run, url, prepare).await? {
        return Ok(None);
    }
    Ok(Some(session.html(selector).await?))
}

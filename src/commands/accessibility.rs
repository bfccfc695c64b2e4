use std::path::PathBuf;

use shot_scraper_lib::{BrowserSession, PrepareRequest, Result, RunOptions};

use super::{finish, open_page, resolve_url, CommandContext};
use crate::cli::BrowserArgs;
use crate::formatting::{format_json, write_text_output};

/// Run the accessibility command.
pub async fn run_accessibility(
    ctx: &CommandContext,
    url: String,
    output: Option<PathBuf>,
    javascript: Option<String>,
    timeout: Option<u64>,
    browser: BrowserArgs,
) -> Result<()> {
    let run = ctx.run_options(&browser, timeout)?;
    let url = resolve_url(&url)?;
    let prepare = PrepareRequest {
        javascript,
        timeout,
        ..PrepareRequest::default()
    };

    let mut session = BrowserSession::launch(&run).await?;
    let result = snapshot(&mut session, &run, &url, prepare).await;
    let Some(tree) = finish(session, result).await? else {
        return Ok(());
    };
    write_text_output(&format_json(&tree, false)?, output.as_deref())?;
    Ok(())
}

async fn snapshot(
    session: &mut BrowserSession,
    run: &RunOptions,
    url: &str,
    prepare: PrepareRequest,
) -> Result<Option<serde_json::Value>> {
    if !open_page(session, run, url, prepare).await? {
        return Ok(None);
    }
    Ok(Some(session.accessibility().await?))
}

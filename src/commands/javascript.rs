use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use shot_scraper_lib::{BrowserSession, PrepareRequest, Result, RunOptions, ShotError};

use super::{finish, open_page, resolve_url, CommandContext};
use crate::cli::BrowserArgs;
use crate::formatting::{format_json, write_text_output};

async fn read_script(input: &str) -> Result<String> {
    if input == "-" {
        let mut script = String::new();
        tokio::io::stdin().read_to_string(&mut script).await?;
        Ok(script)
    } else {
        Ok(tokio::fs::read_to_string(input).await?)
    }
}

/// Run the javascript command.
pub async fn run_javascript(
    ctx: &CommandContext,
    url: String,
    javascript: Option<String>,
    input: String,
    output: Option<PathBuf>,
    raw: bool,
    browser: BrowserArgs,
) -> Result<()> {
    let run = ctx.run_options(&browser, None)?;
    let url = resolve_url(&url)?;
    let script = match javascript {
        Some(script) => script,
        None => read_script(&input).await?,
    };
    if script.trim().is_empty() {
        return Err(ShotError::config(
            "No JavaScript provided; pass it as an argument or with --input",
        ));
    }

    let mut session = BrowserSession::launch(&run).await?;
    let result = evaluate(&mut session, &run, &url, &script).await;
    let Some(value) = finish(session, result).await? else {
        return Ok(());
    };
    write_text_output(&format_json(&value, raw)?, output.as_deref())?;
    Ok(())
}

async fn evaluate(
    session: &mut BrowserSession,
    run: &RunOptions,
    url: &str,
    script: &str,
) -> Result<Option<serde_json::Value>> {
    if !open_page(session, run, url, PrepareRequest::default()).await? {
        return Ok(None);
    }
    Ok(Some(session.evaluate(script).await?))
}

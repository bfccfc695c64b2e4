use shot_scraper_lib::{
    normalize_shot, BrowserSession, Capture, CaptureOutcome, NormalizeContext, Result,
};
use tracing::warn;

use super::{finish, CommandContext};
use crate::cli::{BrowserArgs, ShotArgs};
use crate::formatting::write_stdout_bytes;

/// Run the shot command.
pub async fn run_shot(
    ctx: &CommandContext,
    url: String,
    shot: ShotArgs,
    browser: BrowserArgs,
) -> Result<()> {
    let run = ctx.run_options(&browser, shot.timeout)?;
    let raw = shot.into_raw(url);
    let resolved = normalize_shot(raw, &NormalizeContext::on_disk(run.http_errors, run.timeout))?;

    let mut session = BrowserSession::launch(&run).await?;
    let outcome = session.capture(&resolved).await;
    match finish(session, outcome).await? {
        CaptureOutcome::Bytes(bytes) => write_stdout_bytes(&bytes)?,
        CaptureOutcome::Skipped { status } => {
            warn!("No screenshot taken: {} returned {}", resolved.url, status)
        }
        CaptureOutcome::Written(_) | CaptureOutcome::NavigatedOnly => {}
    }
    Ok(())
}

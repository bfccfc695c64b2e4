use std::path::PathBuf;

use shot_scraper_lib::{
    extract_har, file_exists_on_disk, filename_for_url, BrowserSession, HarContent, HarRecording,
    PrepareRequest, Result,
};

use super::{finish, open_page, resolve_url, CommandContext};
use crate::cli::BrowserArgs;

/// Options of the har command, as parsed.
pub struct HarArgs {
    pub zip: bool,
    pub output: Option<PathBuf>,
    pub javascript: Option<String>,
    pub wait: Option<u64>,
    pub timeout: Option<u64>,
    pub extract: Option<PathBuf>,
}

fn har_recording(url: &str, zip: bool, output: Option<PathBuf>) -> HarRecording {
    let path = output.unwrap_or_else(|| {
        let ext = if zip { "har.zip" } else { "har" };
        PathBuf::from(filename_for_url(url, Some(ext), file_exists_on_disk))
    });
    let mut recording = HarRecording::new(path);
    if zip {
        recording.content = HarContent::Attach;
    }
    recording
}

/// Run the har command.
pub async fn run_har(
    ctx: &CommandContext,
    url: String,
    args: HarArgs,
    browser: BrowserArgs,
) -> Result<()> {
    let mut run = ctx.run_options(&browser, args.timeout)?;
    let url = resolve_url(&url)?;
    let recording = har_recording(&url, args.zip, args.output);
    let har_path = recording.path.clone();
    run.browser.har = Some(recording);

    let prepare = PrepareRequest {
        wait: args.wait,
        javascript: args.javascript,
        timeout: args.timeout,
        ..PrepareRequest::default()
    };
    let mut session = BrowserSession::launch(&run).await?;
    let result = open_page(&mut session, &run, &url, prepare).await;
    finish(session, result).await?;

    if let Some(dir) = &args.extract {
        extract_har(&har_path, dir)?;
    }
    Ok(())
}

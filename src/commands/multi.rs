use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::info;

use shot_scraper_lib::{
    file_exists_on_disk, filename_for_url, parse_entries, BrowserSession, HarContent,
    HarRecording, MultiOptions, Result, Sequencer,
};

use super::{finish, CommandContext};
use crate::cli::BrowserArgs;

/// Options of the multi command, as parsed.
pub struct MultiArgs {
    pub file: String,
    pub no_clobber: bool,
    pub outputs: Vec<String>,
    pub fail_on_error: bool,
    pub leave_server: bool,
    pub har: bool,
    pub har_zip: bool,
    pub har_file: Option<PathBuf>,
}

async fn read_shots(file: &str) -> Result<String> {
    if file == "-" {
        let mut yaml = String::new();
        tokio::io::stdin().read_to_string(&mut yaml).await?;
        Ok(yaml)
    } else {
        Ok(tokio::fs::read_to_string(file).await?)
    }
}

/// Where the HAR goes when recording was requested.
fn har_recording(args: &MultiArgs) -> Option<HarRecording> {
    if !(args.har || args.har_zip || args.har_file.is_some()) {
        return None;
    }
    let path = args.har_file.clone().unwrap_or_else(|| {
        let ext = if args.har_zip { "har.zip" } else { "har" };
        PathBuf::from(filename_for_url("trace", Some(ext), file_exists_on_disk))
    });
    let mut recording = HarRecording::new(path);
    if args.har_zip {
        recording.content = HarContent::Attach;
    }
    Some(recording)
}

/// Run the multi command.
pub async fn run_multi(ctx: &CommandContext, args: MultiArgs, browser: BrowserArgs) -> Result<()> {
    let mut run = ctx.run_options(&browser, None)?;
    let entries = parse_entries(&read_shots(&args.file).await?)?;
    Sequencer::validate(&entries)?;

    run.browser.har = har_recording(&args);
    let multi = MultiOptions {
        no_clobber: args.no_clobber,
        outputs: args.outputs,
        fail_on_error: args.fail_on_error,
        leave_server: args.leave_server,
        har_only: run.browser.har.is_some(),
    };

    let mut session = BrowserSession::launch(&run).await?;
    let summary = Sequencer::new(&run, &multi).run(entries, &mut session).await;
    let summary = finish(session, summary).await?;
    info!(
        done = summary.done,
        skipped = summary.skipped,
        failed = summary.failed,
        "multi run finished"
    );
    Ok(())
}

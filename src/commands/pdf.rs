use std::path::PathBuf;
use tracing::info;

use shot_scraper_lib::{
    file_exists_on_disk, filename_for_url, BrowserSession, PdfRequest, PrepareRequest, Result,
    RunOptions, ShotError, STDOUT_OUTPUT,
};

use super::{finish, open_page, resolve_url, CommandContext};
use crate::cli::{BrowserArgs, PdfFormat};
use crate::formatting::write_stdout_bytes;

const MIN_SCALE: f64 = 0.1;
const MAX_SCALE: f64 = 2.0;

/// Options of the pdf command, as parsed.
pub struct PdfArgs {
    pub output: Option<String>,
    pub javascript: Option<String>,
    pub wait: Option<u64>,
    pub media_screen: bool,
    pub landscape: bool,
    pub format: Option<PdfFormat>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub scale: f64,
    pub print_background: bool,
}

fn validate_scale(scale: f64) -> Result<f64> {
    if (MIN_SCALE..=MAX_SCALE).contains(&scale) {
        Ok(scale)
    } else {
        Err(ShotError::config(format!(
            "--scale must be between {MIN_SCALE} and {MAX_SCALE}"
        )))
    }
}

/// Run the pdf command.
pub async fn run_pdf(
    ctx: &CommandContext,
    url: String,
    args: PdfArgs,
    browser: BrowserArgs,
) -> Result<()> {
    let scale = validate_scale(args.scale)?;
    let run = ctx.run_options(&browser, None)?;
    let url = resolve_url(&url)?;
    let path = match args.output.as_deref().map(str::trim) {
        Some(STDOUT_OUTPUT) => None,
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => Some(PathBuf::from(filename_for_url(
            &url,
            Some("pdf"),
            file_exists_on_disk,
        ))),
    };

    let prepare = PrepareRequest {
        wait: args.wait,
        javascript: args.javascript,
        ..PrepareRequest::default()
    };
    let request = PdfRequest {
        path: path.clone(),
        media_screen: args.media_screen,
        landscape: args.landscape,
        format: args.format.map(|f| f.as_str().to_string()),
        width: args.width,
        height: args.height,
        scale,
        print_background: args.print_background,
    };

    let mut session = BrowserSession::launch(&run).await?;
    let result = render(&mut session, &run, &url, prepare, request).await;
    let Some(bytes) = finish(session, result).await? else {
        return Ok(());
    };
    match (&path, bytes) {
        (Some(path), _) => info!("PDF of '{}' written to '{}'", url, path.display()),
        (None, Some(bytes)) => write_stdout_bytes(&bytes)?,
        (None, None) => {
            return Err(ShotError::Browser(
                "Playwright helper returned no PDF data".to_string(),
            ))
        }
    }
    Ok(())
}

/// `None` when the page was skipped; otherwise the bytes, if not written to disk.
async fn render(
    session: &mut BrowserSession,
    run: &RunOptions,
    url: &str,
    prepare: PrepareRequest,
    request: PdfRequest,
) -> Result<Option<Option<Vec<u8>>>> {
    if !open_page(session, run, url, prepare).await? {
        return Ok(None);
    }
    Ok(Some(session.pdf(request).await?))
}

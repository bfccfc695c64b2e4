use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use shot_scraper_lib::{BrowserKind, Result, ShotError};

const NPX_COMMAND: &str = "npx";

fn install_args(browser: Option<BrowserKind>) -> Vec<&'static str> {
    let mut args = vec!["playwright", "install"];
    if let Some(browser) = browser {
        args.push(browser.as_str());
    }
    args
}

/// Run the install command: `npx playwright install [browser]`.
pub async fn run_install(browser: Option<BrowserKind>) -> Result<()> {
    let args = install_args(browser);
    info!("Running {} {}", NPX_COMMAND, args.join(" "));
    let status = Command::new(NPX_COMMAND)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|err| match err.kind() {
            ErrorKind::NotFound => ShotError::config(
                "npx was not found on PATH; install Node.js from https://nodejs.org/",
            ),
            _ => ShotError::Io(err),
        })?;
    if !status.success() {
        return Err(ShotError::Browser(format!(
            "playwright install failed ({status})"
        )));
    }
    Ok(())
}

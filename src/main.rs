mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{
    run_accessibility, run_har, run_html, run_install, run_javascript, run_multi, run_pdf,
    run_shot, CommandContext, HarArgs, MultiArgs, PdfArgs,
};
use shot_scraper_lib::{init_logging, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    let silent = args.command.browser_args().is_some_and(|b| b.silent);
    init_logging(args.verbose, silent);

    match run(args.command, args.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => formatting::render_error(err, args.verbose),
    }
}

async fn run(command: Commands, config: Option<std::path::PathBuf>) -> Result<()> {
    if let Commands::Install { browser } = command {
        return run_install(browser.map(Into::into)).await;
    }
    let ctx = CommandContext::load(config)?;

    match command {
        Commands::Shot { url, shot, browser } => run_shot(&ctx, url, shot, browser).await,
        Commands::Multi {
            file,
            no_clobber,
            outputs,
            fail_on_error,
            leave_server,
            har,
            har_zip,
            har_file,
            browser,
        } => {
            let args = MultiArgs {
                file,
                no_clobber,
                outputs,
                fail_on_error,
                leave_server,
                har,
                har_zip,
                har_file,
            };
            run_multi(&ctx, args, browser).await
        }
        Commands::Javascript {
            url,
            javascript,
            input,
            output,
            raw,
            browser,
        } => run_javascript(&ctx, url, javascript, input, output, raw, browser).await,
        Commands::Html {
            url,
            output,
            javascript,
            wait,
            selector,
            browser,
        } => run_html(&ctx, url, output, javascript, wait, selector, browser).await,
        Commands::Pdf {
            url,
            output,
            javascript,
            wait,
            media_screen,
            landscape,
            format,
            width,
            height,
            scale,
            print_background,
            browser,
        } => {
            let args = PdfArgs {
                output,
                javascript,
                wait,
                media_screen,
                landscape,
                format,
                width,
                height,
                scale,
                print_background,
            };
            run_pdf(&ctx, url, args, browser).await
        }
        Commands::Accessibility {
            url,
            output,
            javascript,
            timeout,
            browser,
        } => run_accessibility(&ctx, url, output, javascript, timeout, browser).await,
        Commands::Har {
            url,
            zip,
            output,
            javascript,
            wait,
            timeout,
            extract,
            browser,
        } => {
            let args = HarArgs {
                zip,
                output,
                javascript,
                wait,
                timeout,
                extract,
            };
            run_har(&ctx, url, args, browser).await
        }
        Commands::Install { .. } => Ok(()),
    }
}

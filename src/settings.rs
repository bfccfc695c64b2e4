use std::path::Path;

use shot_scraper_lib::config::{device_scale_factor, BrowserSettings, HttpCredentials};
use shot_scraper_lib::{Config, HttpErrorPolicy, RunOptions, ShotError};

use crate::cli::BrowserArgs;

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/shot-scraper/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, ShotError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        match e {
            ShotError::Config(msg) => ShotError::Config(msg),
            other => ShotError::config(format!("Failed to read config {}: {}", loc, other)),
        }
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        ShotError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Merge browser flags with the config file, preferring CLI values.
///
/// Every cross-flag check happens here, before a browser is started.
pub fn resolve_run_options(
    args: &BrowserArgs,
    timeout_ms: Option<u64>,
    config: &Config,
) -> Result<RunOptions, ShotError> {
    let http_errors = HttpErrorPolicy::from_flags(args.skip, args.fail)?;
    let scale_factor =
        device_scale_factor(args.retina, args.scale_factor)?.or(config.scale_factor);
    let credentials =
        HttpCredentials::from_flags(args.auth_username.clone(), args.auth_password.clone())?;

    let mut browser_args = config.browser_args.clone();
    browser_args.extend(args.browser_args.iter().cloned());

    let browser = BrowserSettings {
        browser: args
            .browser
            .map(Into::into)
            .or(config.browser)
            .unwrap_or_default(),
        browser_args,
        user_agent: args.user_agent.clone().or_else(|| config.user_agent.clone()),
        scale_factor,
        reduced_motion: args.reduced_motion || config.reduced_motion,
        bypass_csp: args.bypass_csp || config.bypass_csp,
        auth_file: args.auth.clone(),
        credentials,
        log_console: args.log_console,
        har: None,
    };

    Ok(RunOptions {
        browser,
        http_errors,
        timeout: timeout_ms.or_else(|| config.timeout.map(|t| t.as_millis() as u64)),
        silent: args.silent,
        node_command: config.node_command.clone(),
    })
}

/// Format effective config as a single-line string.
pub fn format_effective_config(run: &RunOptions, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let browser = &run.browser;
    format!(
        "Effective config [{source}]: browser={}, args={:?}, scale_factor={}, timeout={}, http_errors={:?}, reduced_motion={}, bypass_csp={}, user_agent={}, auth={}, har={}",
        browser.browser.as_str(),
        browser.browser_args,
        browser
            .scale_factor
            .map(|s| s.to_string())
            .unwrap_or_else(|| "default".to_string()),
        run.timeout
            .map(|t| format!("{t}ms"))
            .unwrap_or_else(|| "default".to_string()),
        run.http_errors,
        browser.reduced_motion,
        browser.bypass_csp,
        browser.user_agent.as_deref().unwrap_or("default"),
        browser
            .auth_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
        browser
            .har
            .as_ref()
            .map(|h| h.path.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
    )
}

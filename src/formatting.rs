use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;

use serde_json::Value;
use shot_scraper_lib::ShotError;

/// Render an error and return the appropriate exit code.
pub fn render_error(err: ShotError, verbose: u8) -> ExitCode {
    let payload = err.to_payload();
    let colorize = io::stderr().is_terminal();
    eprintln!("{} {}", color("Error:", "31", colorize), payload.message);
    if verbose > 0 {
        if let Some(hint) = payload.remediation {
            eprintln!("{} {}", color("Hint:", "33", colorize), hint);
        }
    }
    ExitCode::from(1)
}

/// Write raw bytes to stdout (images, PDFs).
pub fn write_stdout_bytes(bytes: &[u8]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()
}

/// Write text to a file, or stdout when no path is given.
pub fn write_text_output(content: &str, output: Option<&Path>) -> io::Result<()> {
    match output {
        Some(path) => std::fs::write(path, content),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()
        }
    }
}

/// Pretty JSON, or the bare string when `raw` is set and the value is one.
pub fn format_json(value: &Value, raw: bool) -> Result<String, serde_json::Error> {
    match value {
        Value::String(s) if raw => Ok(s.clone()),
        other => serde_json::to_string_pretty(other),
    }
}

fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

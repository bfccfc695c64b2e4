use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::{Result, ShotError};

const URL_PREFIXES: &[&str] = &["http://", "https://", "file:"];

/// Resolves `candidate` to an absolute path when it names an existing file.
pub fn local_file_lookup(candidate: &str) -> Option<PathBuf> {
    let path = Path::new(candidate);
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    fs::canonicalize(path).ok()
}

/// Turns user input into something the browser can navigate to.
///
/// Existing local files (as reported by `local_file`) become `file:` URLs
/// holding the absolute path as written; anything without a known scheme
/// is assumed to be a web address. Web addresses must parse as URLs.
pub fn url_or_file_path<F>(url: &str, local_file: F) -> Result<String>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    if let Some(path) = local_file(url) {
        if !path.is_absolute() {
            return Err(ShotError::config(format!(
                "Cannot build a file URL for {}; use an absolute path",
                path.display()
            )));
        }
        return Ok(format!("file:{}", path.display()));
    }

    let url = if URL_PREFIXES.iter().any(|prefix| url.starts_with(prefix)) {
        url.to_string()
    } else {
        format!("http://{url}")
    };
    Url::parse(&url)?;
    Ok(url)
}

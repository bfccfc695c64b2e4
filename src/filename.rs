//! Filesystem-safe, collision-free filenames derived from URLs.
//!
//! Everything here is a pure string transform. Whether a candidate name is
//! already taken is decided by a caller-supplied predicate, so the same
//! rules can be exercised against the real filesystem or an in-memory set.

use std::path::Path;

/// Extension used when the caller does not ask for one.
pub const DEFAULT_EXTENSION: &str = "png";

/// Base name used when nothing usable survives sanitizing.
const FALLBACK_BASE: &str = "index";

/// Predicate that never reports a collision.
pub fn file_exists_never(_filename: &str) -> bool {
    false
}

/// Predicate backed by the filesystem, relative to the working directory.
pub fn file_exists_on_disk(filename: &str) -> bool {
    Path::new(filename).exists()
}

/// The network location and path of a URL-ish string.
///
/// Follows the usual `scheme://netloc/path?query#fragment` split without
/// normalizing anything, so relative references and bare paths are
/// accepted as-is (they simply have an empty `netloc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UrlParts<'a> {
    pub netloc: &'a str,
    pub path: &'a str,
}

pub(crate) fn split_url(url: &str) -> UrlParts<'_> {
    let mut rest = url;

    if let Some(colon) = rest.find(':') {
        let scheme = &rest[..colon];
        let valid_scheme = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if valid_scheme {
            rest = &rest[colon + 1..];
        }
    }

    let mut netloc = "";
    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find(['/', '?', '#']).unwrap_or(after.len());
        netloc = &after[..end];
        rest = &after[end..];
    }

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    UrlParts {
        netloc,
        path: &rest[..end],
    }
}

/// Turns `netloc + path` into a base name made only of `[a-zA-Z0-9_-]`.
pub(crate) fn base_filename(raw: &str) -> String {
    let dashed = raw.replace(['.', '/'], "-");
    let cleaned: String = dashed
        .trim_end_matches('-')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let base = cleaned.trim_start_matches('-');
    if base.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        base.to_string()
    }
}

/// `base.ext`, or `base.N.ext` for the first N >= 1 that is not taken.
pub(crate) fn unique_filename<F>(base: &str, ext: &str, file_exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut filename = format!("{base}.{ext}");
    let mut suffix: u32 = 0;
    while file_exists(&filename) {
        suffix += 1;
        filename = format!("{base}.{suffix}.{ext}");
    }
    filename
}

/// Derives an output filename for `url`.
///
/// ```
/// use shot_scraper_lib::filename::{filename_for_url, file_exists_never};
///
/// assert_eq!(
///     filename_for_url("https://datasette.io/-/versions.json", Some("jpg"), file_exists_never),
///     "datasette-io---versions-json.jpg"
/// );
/// ```
pub fn filename_for_url<F>(url: &str, ext: Option<&str>, file_exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    let parts = split_url(url);
    let base = base_filename(&format!("{}{}", parts.netloc, parts.path));
    unique_filename(&base, ext.unwrap_or(DEFAULT_EXTENSION), file_exists)
}

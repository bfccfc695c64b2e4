//! Content-type ↔ file extension mapping and HAR entry filenames.

use crate::filename::{base_filename, split_url, unique_filename};

/// Extension used when neither the URL nor the content-type gives one.
pub const FALLBACK_EXTENSION: &str = "bin";

const CONTENT_TYPE_EXTENSIONS: &[(&str, &str)] = &[
    ("text/html", "html"),
    ("text/css", "css"),
    ("application/javascript", "js"),
    ("text/javascript", "js"),
    ("application/json", "json"),
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
    ("application/pdf", "pdf"),
    ("text/plain", "txt"),
    ("application/xml", "xml"),
    ("text/xml", "xml"),
    ("font/woff2", "woff2"),
    ("font/woff", "woff"),
    ("application/font-woff", "woff"),
];

const EXTENSION_CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
    ("woff2", "font/woff2"),
    ("woff", "font/woff"),
];

const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Drops parameters such as `; charset=utf-8` and lowercases the rest.
fn normalize_content_type(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    (!essence.is_empty()).then_some(essence)
}

pub fn extension_for_content_type(content_type: Option<&str>) -> Option<&'static str> {
    let essence = normalize_content_type(content_type?)?;
    CONTENT_TYPE_EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == essence)
        .map(|(_, ext)| *ext)
}

/// The content-type a file with this extension is expected to carry.
pub fn expected_content_type(extension: &str) -> Option<&'static str> {
    let extension = extension.to_ascii_lowercase();
    EXTENSION_CONTENT_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, ct)| *ct)
}

/// Extension of the last path segment, lowercased, if it has a usable one.
fn url_extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = segment.rsplit_once('.')?;
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (!ext.is_empty()).then_some(ext)
}

fn is_jpeg(ext: &str) -> bool {
    JPEG_EXTENSIONS.contains(&ext)
}

/// Derives a filename for a response body captured in a HAR file.
///
/// When the URL's own extension agrees with the response content-type it is
/// kept as the extension and removed from the base name. Otherwise the
/// URL's extension stays part of the base name and the content-type decides
/// the extension, falling back to the URL's extension and then `bin`.
pub fn filename_for_har_entry<F>(url: &str, content_type: Option<&str>, file_exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    let parts = split_url(url);
    let url_ext = url_extension(parts.path);
    let ct_ext = extension_for_content_type(content_type);
    let essence = content_type.and_then(normalize_content_type);

    let matching = url_ext.as_deref().filter(|ext| {
        let declared = expected_content_type(ext)
            .is_some_and(|expected| Some(expected) == essence.as_deref());
        declared || (is_jpeg(ext) && ct_ext.is_some_and(is_jpeg))
    });

    let path = match matching {
        Some(_) => {
            let stem_len = parts.path.rfind('.').unwrap_or(parts.path.len());
            &parts.path[..stem_len]
        }
        None => parts.path,
    };

    let extension = matching
        .or(ct_ext)
        .or(url_ext.as_deref())
        .unwrap_or(FALLBACK_EXTENSION);

    let base = base_filename(&format!("{}{}", parts.netloc, path));
    unique_filename(&base, extension, file_exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::file_exists_never;

    #[test]
    fn content_type_lookup_ignores_parameters_and_case() {
        assert_eq!(
            extension_for_content_type(Some("Text/HTML; charset=utf-8")),
            Some("html")
        );
        assert_eq!(extension_for_content_type(Some("image/jpeg")), Some("jpg"));
        assert_eq!(
            extension_for_content_type(Some("application/font-woff")),
            Some("woff")
        );
    }

    #[test]
    fn content_type_lookup_is_total() {
        assert_eq!(extension_for_content_type(None), None);
        assert_eq!(extension_for_content_type(Some("")), None);
        assert_eq!(extension_for_content_type(Some(";")), None);
        assert_eq!(extension_for_content_type(Some("application/x-unknown")), None);
    }

    #[test]
    fn matching_extension_is_not_doubled() {
        assert_eq!(
            filename_for_har_entry("https://example.com/style.css", Some("text/css"), file_exists_never),
            "example-com-style.css"
        );
        assert_eq!(
            filename_for_har_entry(
                "https://example.com/index.html?v=2",
                Some("text/html; charset=utf-8"),
                file_exists_never
            ),
            "example-com-index.html"
        );
    }

    #[test]
    fn mismatched_extension_stays_in_base() {
        assert_eq!(
            filename_for_har_entry("https://example.com/image.php", Some("image/png"), file_exists_never),
            "example-com-image-php.png"
        );
    }

    #[test]
    fn jpeg_spellings_are_equivalent() {
        assert_eq!(
            filename_for_har_entry("https://example.com/photo.jpeg", Some("image/jpeg"), file_exists_never),
            "example-com-photo.jpeg"
        );
        assert_eq!(
            filename_for_har_entry("https://example.com/photo.JPG", Some("image/jpeg"), file_exists_never),
            "example-com-photo.jpg"
        );
    }

    #[test]
    fn unknown_content_type_keeps_url_extension() {
        assert_eq!(
            filename_for_har_entry("https://example.com/data.csv", Some("text/csv"), file_exists_never),
            "example-com-data-csv.csv"
        );
    }

    #[test]
    fn nothing_known_falls_back_to_bin() {
        let name = filename_for_har_entry("https://example.com/api/items", None, file_exists_never);
        assert_eq!(name, "example-com-api-items.bin");
    }

    #[test]
    fn content_type_only() {
        assert_eq!(
            filename_for_har_entry("https://example.com/", Some("text/html"), file_exists_never),
            "example-com.html"
        );
    }

    #[test]
    fn har_entries_get_collision_suffixes() {
        let existing = ["example-com-app.js"];
        assert_eq!(
            filename_for_har_entry(
                "https://example.com/app.js",
                Some("application/javascript"),
                |name| existing.contains(&name)
            ),
            "example-com-app.1.js"
        );
    }

    #[test]
    fn reverse_table_lookup() {
        assert_eq!(expected_content_type("HTM"), Some("text/html"));
        assert_eq!(expected_content_type("php"), None);
    }
}

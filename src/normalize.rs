//! Raw shot record → [`ShotSpec`].

use std::path::PathBuf;

use crate::config::HttpErrorPolicy;
use crate::filename::{file_exists_on_disk, filename_for_url, DEFAULT_EXTENSION};
use crate::resource::{local_file_lookup, url_or_file_path};
use crate::shot::{validate_dimensions, validate_quality, RawShot, ShotOutput, ShotSpec};
use crate::viewport::Viewport;
use crate::{Result, ShotError};

/// Output value meaning "write the bytes to stdout".
pub const STDOUT_OUTPUT: &str = "-";

/// Extension derived outputs get when `quality` asks for JPEG.
const JPEG_EXTENSION: &str = "jpg";

/// Everything the normalizer needs from the outside world.
pub struct NormalizeContext<'a> {
    /// Returns the absolute path when the url names an existing local file.
    pub local_file: &'a dyn Fn(&str) -> Option<PathBuf>,
    /// Used to keep derived output names unique.
    pub output_exists: &'a dyn Fn(&str) -> bool,
    pub return_bytes: bool,
    pub default_extension: &'a str,
    pub http_errors: HttpErrorPolicy,
    /// Fallback when the shot itself has no timeout.
    pub timeout: Option<u64>,
}

impl NormalizeContext<'static> {
    /// A context backed by the real filesystem.
    pub fn on_disk(http_errors: HttpErrorPolicy, timeout: Option<u64>) -> Self {
        Self {
            local_file: &local_file_lookup,
            output_exists: &file_exists_on_disk,
            return_bytes: false,
            default_extension: DEFAULT_EXTENSION,
            http_errors,
            timeout,
        }
    }
}

impl<'a> NormalizeContext<'a> {
    pub fn with_extension(self, default_extension: &'a str) -> Self {
        Self {
            default_extension,
            ..self
        }
    }

    pub fn returning_bytes(self, return_bytes: bool) -> Self {
        Self {
            return_bytes,
            ..self
        }
    }
}

/// Appends the singular field after the plural list.
fn fold(mut plural: Vec<String>, singular: Option<String>) -> Vec<String> {
    plural.extend(singular.filter(|s| !s.trim().is_empty()));
    plural
}

pub fn normalize_shot(raw: RawShot, ctx: &NormalizeContext<'_>) -> Result<ShotSpec> {
    let url = raw
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ShotError::config("'url' is required for every shot"))?;
    let url = url_or_file_path(url, ctx.local_file)?;

    let quality = validate_quality(raw.quality)?;
    validate_dimensions(raw.width, raw.height)?;

    let output = match raw.declared_output() {
        Some(STDOUT_OUTPUT) => ShotOutput::Stdout,
        Some(path) => ShotOutput::File(PathBuf::from(path)),
        None if ctx.return_bytes => ShotOutput::Stdout,
        None => {
            let ext = if quality.is_some() {
                JPEG_EXTENSION
            } else {
                ctx.default_extension
            };
            ShotOutput::File(PathBuf::from(filename_for_url(
                &url,
                Some(ext),
                ctx.output_exists,
            )))
        }
    };

    let viewport = Viewport::from_dimensions(raw.width, raw.height);

    Ok(ShotSpec {
        url,
        output,
        selectors: fold(raw.selectors, raw.selector),
        selectors_all: fold(raw.selectors_all, raw.selector_all),
        js_selectors: fold(raw.js_selectors, raw.js_selector),
        js_selectors_all: fold(raw.js_selectors_all, raw.js_selector_all),
        viewport,
        full_page: raw.height.is_none(),
        quality,
        wait: raw.wait,
        wait_for: raw.wait_for.filter(|w| !w.trim().is_empty()),
        timeout: raw.timeout.or(ctx.timeout),
        padding: raw.padding.unwrap_or(0),
        javascript: raw.javascript.filter(|js| !js.trim().is_empty()),
        omit_background: raw.omit_background.unwrap_or(false),
        http_errors: ctx.http_errors,
        skip_shot: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::file_exists_never;

    fn no_local_files(_: &str) -> Option<PathBuf> {
        None
    }

    fn ctx() -> NormalizeContext<'static> {
        NormalizeContext {
            local_file: &no_local_files,
            output_exists: &file_exists_never,
            return_bytes: false,
            default_extension: DEFAULT_EXTENSION,
            http_errors: HttpErrorPolicy::Capture,
            timeout: None,
        }
    }

    fn raw(url: &str) -> RawShot {
        RawShot {
            url: Some(url.to_string()),
            ..RawShot::default()
        }
    }

    #[test]
    fn missing_url_is_a_config_error() {
        let err = normalize_shot(RawShot::default(), &ctx()).unwrap_err();
        assert!(err.is_config());
        let err = normalize_shot(raw("   "), &ctx()).unwrap_err();
        assert!(err.is_config());
    }

    #[cfg(unix)]
    #[test]
    fn existing_local_file_becomes_file_url() {
        let lookup = |candidate: &str| {
            (candidate == "page.html").then(|| PathBuf::from("/work/page.html"))
        };
        let ctx = NormalizeContext {
            local_file: &lookup,
            ..ctx()
        };
        let resolved = normalize_shot(raw("page.html"), &ctx).unwrap();
        assert_eq!(resolved.url, "file:/work/page.html");
        assert_eq!(
            resolved.output,
            ShotOutput::File(PathBuf::from("work-page-html.png"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn spaces_in_local_paths_stay_readable() {
        let lookup = |_: &str| Some(PathBuf::from("/work/my page.html"));
        let ctx = NormalizeContext {
            local_file: &lookup,
            ..ctx()
        };
        let resolved = normalize_shot(raw("my page.html"), &ctx).unwrap();
        assert_eq!(resolved.url, "file:/work/my page.html");
        assert_eq!(
            resolved.output,
            ShotOutput::File(PathBuf::from("work-mypage-html.png"))
        );
    }

    #[test]
    fn zero_viewport_is_rejected() {
        let shot = RawShot {
            width: Some(0),
            height: Some(0),
            ..raw("https://example.com/")
        };
        let err = normalize_shot(shot, &ctx()).unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.to_payload().message, "width must be a positive integer, got 0");
    }

    #[test]
    fn bare_host_defaults_to_http() {
        let resolved = normalize_shot(raw("example.com"), &ctx()).unwrap();
        assert_eq!(resolved.url, "http://example.com");
        assert_eq!(resolved.output, ShotOutput::File(PathBuf::from("example-com.png")));
    }

    #[test]
    fn quality_switches_derived_extension_to_jpg() {
        let shot = RawShot {
            quality: Some(60),
            ..raw("https://example.com/")
        };
        let resolved = normalize_shot(shot, &ctx()).unwrap();
        assert_eq!(resolved.quality, Some(60));
        assert_eq!(resolved.output, ShotOutput::File(PathBuf::from("example-com.jpg")));
    }

    #[test]
    fn command_extension_is_used_for_derived_output() {
        let resolved =
            normalize_shot(raw("https://example.com/doc"), &ctx().with_extension("pdf")).unwrap();
        assert_eq!(
            resolved.output,
            ShotOutput::File(PathBuf::from("example-com-doc.pdf"))
        );
    }

    #[test]
    fn derived_output_avoids_existing_files() {
        let exists = |name: &str| name == "example-com.png";
        let ctx = NormalizeContext {
            output_exists: &exists,
            ..ctx()
        };
        let resolved = normalize_shot(raw("https://example.com/"), &ctx).unwrap();
        assert_eq!(resolved.output, ShotOutput::File(PathBuf::from("example-com.1.png")));
    }

    #[test]
    fn explicit_and_stdout_outputs() {
        let shot = RawShot {
            output: Some(" out.png ".into()),
            ..raw("https://example.com/")
        };
        assert_eq!(
            normalize_shot(shot, &ctx()).unwrap().output,
            ShotOutput::File(PathBuf::from("out.png"))
        );

        let shot = RawShot {
            output: Some("-".into()),
            ..raw("https://example.com/")
        };
        assert_eq!(normalize_shot(shot, &ctx()).unwrap().output, ShotOutput::Stdout);

        let resolved = normalize_shot(raw("https://example.com/"), &ctx().returning_bytes(true))
            .unwrap();
        assert_eq!(resolved.output, ShotOutput::Stdout);
    }

    #[test]
    fn singular_selectors_are_appended() {
        let shot = RawShot {
            selectors: vec!["#a".into(), "#b".into()],
            selector: Some("#c".into()),
            selector_all: Some(".item".into()),
            js_selector: Some("el.id == 'x'".into()),
            js_selectors_all: vec!["el.tagName == 'P'".into()],
            js_selector_all: Some("el.tagName == 'H1'".into()),
            ..raw("https://example.com/")
        };
        let resolved = normalize_shot(shot, &ctx()).unwrap();
        assert_eq!(resolved.selectors, vec!["#a", "#b", "#c"]);
        assert_eq!(resolved.selectors_all, vec![".item"]);
        assert_eq!(resolved.js_selectors, vec!["el.id == 'x'"]);
        assert_eq!(
            resolved.js_selectors_all,
            vec!["el.tagName == 'P'", "el.tagName == 'H1'"]
        );
        assert!(resolved.has_selectors());
    }

    #[test]
    fn viewport_and_full_page_rules() {
        let resolved = normalize_shot(raw("https://example.com/"), &ctx()).unwrap();
        assert_eq!(resolved.viewport, None);
        assert!(resolved.full_page);

        let shot = RawShot {
            width: Some(400),
            ..raw("https://example.com/")
        };
        let resolved = normalize_shot(shot, &ctx()).unwrap();
        assert_eq!(
            resolved.viewport,
            Some(Viewport {
                width: 400,
                height: 720
            })
        );
        assert!(resolved.full_page);

        let shot = RawShot {
            height: Some(300),
            ..raw("https://example.com/")
        };
        let resolved = normalize_shot(shot, &ctx()).unwrap();
        assert_eq!(
            resolved.viewport,
            Some(Viewport {
                width: 1280,
                height: 300
            })
        );
        assert!(!resolved.full_page);
    }

    #[test]
    fn timeout_and_policy_come_from_context() {
        let ctx = NormalizeContext {
            http_errors: HttpErrorPolicy::Fail,
            timeout: Some(5_000),
            ..ctx()
        };
        let resolved = normalize_shot(raw("https://example.com/"), &ctx).unwrap();
        assert_eq!(resolved.timeout, Some(5_000));
        assert_eq!(resolved.http_errors, HttpErrorPolicy::Fail);

        let shot = RawShot {
            timeout: Some(100),
            ..raw("https://example.com/")
        };
        assert_eq!(normalize_shot(shot, &ctx).unwrap().timeout, Some(100));
    }

    #[test]
    fn invalid_quality_is_rejected() {
        let shot = RawShot {
            quality: Some(101),
            ..raw("https://example.com/")
        };
        assert!(normalize_shot(shot, &ctx()).unwrap_err().is_config());
    }
}

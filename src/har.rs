//! Writing the response bodies recorded in a HAR file to disk.

use base64::Engine as _;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::extension::filename_for_har_entry;
use crate::{Result, ShotError};

/// Name of the HAR document inside a `.har.zip` written by Playwright.
const ZIPPED_HAR_NAME: &str = "har.har";

#[derive(Debug, Deserialize)]
pub struct Har {
    pub log: HarLog,
}

#[derive(Debug, Deserialize)]
pub struct HarLog {
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
pub struct HarEntry {
    pub request: HarRequest,
    pub response: HarResponse,
}

#[derive(Debug, Deserialize)]
pub struct HarRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct HarResponse {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub content: HarBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarBody {
    pub mime_type: Option<String>,
    pub text: Option<String>,
    pub encoding: Option<String>,
    /// Set instead of `text` when bodies are stored beside the HAR.
    #[serde(rename = "_file")]
    pub file: Option<String>,
}

/// Where attached (`_file`) bodies live.
enum Bodies<R> {
    Archive(ZipArchive<R>),
    Directory(PathBuf),
}

impl<R: Read + Seek> Bodies<R> {
    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Bodies::Archive(archive) => {
                let mut file = match archive.by_name(name) {
                    Ok(file) => file,
                    Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                    Err(err) => return Err(err.into()),
                };
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            Bodies::Directory(dir) => {
                let path = dir.join(name);
                if !path.is_file() {
                    return Ok(None);
                }
                Ok(Some(fs::read(path)?))
            }
        }
    }
}

fn body_of<R: Read + Seek>(body: &HarBody, bodies: &mut Bodies<R>) -> Result<Option<Vec<u8>>> {
    if let Some(name) = &body.file {
        return bodies.read(name);
    }
    match (&body.text, body.encoding.as_deref()) {
        (Some(text), Some("base64")) => Ok(Some(
            base64::engine::general_purpose::STANDARD.decode(text.trim())?,
        )),
        (Some(text), _) => Ok(Some(text.clone().into_bytes())),
        (None, _) => Ok(None),
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Reads a `.har` or `.har.zip` file.
fn open_har(path: &Path) -> Result<(Har, Bodies<File>)> {
    if is_zip(path) {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let name = archive
            .file_names()
            .find(|name| *name == ZIPPED_HAR_NAME)
            .or_else(|| archive.file_names().find(|name| name.ends_with(".har")))
            .map(str::to_string)
            .ok_or_else(|| {
                ShotError::config(format!("{} contains no .har file", path.display()))
            })?;
        let mut raw = String::new();
        archive.by_name(&name)?.read_to_string(&mut raw)?;
        let har = serde_json::from_str(&raw)?;
        Ok((har, Bodies::Archive(archive)))
    } else {
        let raw = fs::read_to_string(path)?;
        let har = serde_json::from_str(&raw)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok((har, Bodies::Directory(dir)))
    }
}

/// Writes every response body in `har_path` into `dest`.
///
/// Files are named from the request URL and content type; existing files
/// are never overwritten. Returns the paths written, in HAR order.
pub fn extract_har(har_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let (har, mut bodies) = open_har(har_path)?;
    fs::create_dir_all(dest)?;

    let mut written = Vec::new();
    let mut taken: HashSet<String> = HashSet::new();
    for entry in &har.log.entries {
        let content = &entry.response.content;
        let Some(body) = body_of(content, &mut bodies)? else {
            debug!(url = %entry.request.url, "no body recorded");
            continue;
        };
        if body.is_empty() {
            continue;
        }
        let name = filename_for_har_entry(
            &entry.request.url,
            content.mime_type.as_deref(),
            |candidate: &str| taken.contains(candidate) || dest.join(candidate).exists(),
        );
        let path = dest.join(&name);
        fs::write(&path, &body)?;
        debug!(url = %entry.request.url, status = entry.response.status, file = %name, "extracted");
        taken.insert(name);
        written.push(path);
    }
    info!(
        "Extracted {} files from {} to {}",
        written.len(),
        har_path.display(),
        dest.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const HAR: &str = r#"{
  "log": {
    "version": "1.2",
    "entries": [
      {
        "request": {"method": "GET", "url": "https://example.com/"},
        "response": {"status": 200, "content": {"size": 15, "mimeType": "text/html; charset=utf-8", "text": "<h1>hello</h1>"}}
      },
      {
        "request": {"method": "GET", "url": "https://example.com/style.css?v=2"},
        "response": {"status": 200, "content": {"mimeType": "text/css", "text": "Ym9keSB7fQ==", "encoding": "base64"}}
      },
      {
        "request": {"method": "GET", "url": "https://example.com/pixel.php"},
        "response": {"status": 200, "content": {"mimeType": "image/png", "text": "iVBORw==", "encoding": "base64"}}
      },
      {
        "request": {"method": "GET", "url": "https://example.com/redirect"},
        "response": {"status": 302, "content": {"size": 0, "mimeType": "x-unknown"}}
      }
    ]
  }
}"#;

    #[test]
    fn extracts_embedded_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let har = dir.path().join("trace.har");
        fs::write(&har, HAR).unwrap();
        let out = dir.path().join("extracted");

        let written = extract_har(&har, &out).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["example-com.html", "example-com-style.css", "example-com-pixel-php.png"]
        );
        assert_eq!(fs::read_to_string(out.join("example-com.html")).unwrap(), "<h1>hello</h1>");
        assert_eq!(fs::read_to_string(out.join("example-com-style.css")).unwrap(), "body {}");
        assert_eq!(
            fs::read(out.join("example-com-pixel-php.png")).unwrap(),
            vec![0x89, b'P', b'N', b'G']
        );
    }

    #[test]
    fn does_not_overwrite_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let har = dir.path().join("trace.har");
        fs::write(&har, HAR).unwrap();
        fs::write(dir.path().join("example-com.html"), "old").unwrap();

        let written = extract_har(&har, dir.path()).unwrap();
        assert!(written.contains(&dir.path().join("example-com.1.html")));
        assert_eq!(
            fs::read_to_string(dir.path().join("example-com.html")).unwrap(),
            "old"
        );
    }

    #[test]
    fn extracts_attached_bodies_from_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.har.zip");
        let har = r#"{"log": {"entries": [
          {"request": {"url": "https://example.com/app.js"},
           "response": {"status": 200, "content": {"mimeType": "application/javascript", "_file": "0a1b2c.js"}}},
          {"request": {"url": "https://example.com/gone.js"},
           "response": {"status": 200, "content": {"mimeType": "application/javascript", "_file": "missing.js"}}}
        ]}}"#;
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("har.har", SimpleFileOptions::default()).unwrap();
        zip.write_all(har.as_bytes()).unwrap();
        zip.start_file("0a1b2c.js", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"console.log(1)").unwrap();
        zip.finish().unwrap();

        let out = dir.path().join("out");
        let written = extract_har(&path, &out).unwrap();
        assert_eq!(written, vec![out.join("example-com-app.js")]);
        assert_eq!(
            fs::read_to_string(out.join("example-com-app.js")).unwrap(),
            "console.log(1)"
        );
    }

    #[test]
    fn zip_without_har_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.har.zip");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"nothing").unwrap();
        zip.finish().unwrap();
        assert!(extract_har(&path, dir.path()).unwrap_err().is_config());
    }

    #[test]
    fn invalid_base64_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let har = dir.path().join("bad.har");
        fs::write(
            &har,
            r#"{"log": {"entries": [{"request": {"url": "https://example.com/x.png"},
               "response": {"content": {"mimeType": "image/png", "text": "!!!", "encoding": "base64"}}}]}}"#,
        )
        .unwrap();
        assert!(matches!(
            extract_har(&har, dir.path()).unwrap_err(),
            ShotError::Decode(_)
        ));
    }
}

//! Playwright integration for headless browser automation.
//!
//! This module contains the inline Node.js helper, error mapping,
//! and availability checks for Node.js and Playwright.

use crate::{Result, ShotError};
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Long-running helper: one JSON request per stdin line, one JSON
/// response per stdout line. Requests are handled strictly in order.
pub(crate) const HELPER_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

let browser = null;
let context = null;
let page = null;
let logConsole = false;

function send(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

function browserType(name) {
  if (name === 'firefox') return playwright.firefox;
  if (name === 'webkit') return playwright.webkit;
  return playwright.chromium;
}

function requirePage() {
  if (!page) throw new Error('No page is open');
  return page;
}

// Runs inside the page. Script selectors arrive as compiled predicates so
// nothing is evaluated from strings under the page's CSP.
function selectionBox({ selectors, selectorsAll, jsSelectors, jsSelectorsAll, padding }, tests, allTests) {
  const elements = [];
  const everything = () => Array.from(document.getElementsByTagName('*'));
  for (const selector of selectors) {
    const el = document.querySelector(selector);
    if (!el) throw new Error(`Selector "${selector}" matched no elements`);
    elements.push(el);
  }
  for (const selector of selectorsAll) {
    elements.push(...document.querySelectorAll(selector));
  }
  tests.forEach((test, i) => {
    const el = everything().find((candidate) => test(candidate));
    if (!el) throw new Error(`JavaScript selector "${jsSelectors[i]}" matched no elements`);
    elements.push(el);
  });
  for (const test of allTests) {
    elements.push(...everything().filter((candidate) => test(candidate)));
  }
  if (!elements.length) throw new Error('Selectors matched no elements');
  let top = Infinity, left = Infinity, bottom = -Infinity, right = -Infinity;
  for (const el of elements) {
    const rect = el.getBoundingClientRect();
    top = Math.min(top, rect.top + window.scrollY);
    left = Math.min(left, rect.left + window.scrollX);
    bottom = Math.max(bottom, rect.bottom + window.scrollY);
    right = Math.max(right, rect.right + window.scrollX);
  }
  const x = Math.max(0, left - padding);
  const y = Math.max(0, top - padding);
  return { x, y, width: right + padding - x, height: bottom + padding - y };
}

function selectionSource(selection) {
  const predicates = (list) => `[${list.map((js) => `(el) => (${js})`).join(', ')}]`;
  return `(${selectionBox.toString()})(${JSON.stringify(selection)}, ` +
    `${predicates(selection.jsSelectors)}, ${predicates(selection.jsSelectorsAll)})`;
}

function encoded(buffer, path) {
  return path ? { path } : { data: buffer.toString('base64') };
}

const handlers = {
  async launch(p) {
    const launchOptions = { headless: true, args: p.browserArgs || [] };
    if (p.browser === 'chrome' || p.browser === 'chrome-beta') {
      launchOptions.channel = p.browser;
    }
    browser = await browserType(p.browser).launch(launchOptions);
    const contextOptions = {};
    if (p.storageState) contextOptions.storageState = p.storageState;
    if (p.deviceScaleFactor) contextOptions.deviceScaleFactor = p.deviceScaleFactor;
    if (p.reducedMotion) contextOptions.reducedMotion = 'reduce';
    if (p.userAgent) contextOptions.userAgent = p.userAgent;
    if (p.httpCredentials) contextOptions.httpCredentials = p.httpCredentials;
    if (p.bypassCsp) contextOptions.bypassCSP = true;
    if (p.recordHar) contextOptions.recordHar = p.recordHar;
    logConsole = !!p.logConsole;
    context = await browser.newContext(contextOptions);
    return {};
  },

  async open(p) {
    page = await context.newPage();
    if (logConsole) {
      page.on('console', (msg) => send({ event: 'console', level: msg.type(), text: msg.text() }));
    }
    try {
      if (p.viewport) await page.setViewportSize(p.viewport);
      const response = await page.goto(p.url, p.timeout ? { timeout: p.timeout } : {});
      return { status: response ? response.status() : null };
    } catch (err) {
      await page.close().catch(() => {});
      page = null;
      throw err;
    }
  },

  async prepare(p) {
    const current = requirePage();
    if (p.wait) await current.waitForTimeout(p.wait);
    if (p.javascript) await current.evaluate(p.javascript);
    if (p.waitFor) {
      await current.waitForFunction(p.waitFor, null, p.timeout ? { timeout: p.timeout } : {});
    }
    return {};
  },

  async screenshot(p) {
    const current = requirePage();
    const options = { fullPage: !!p.fullPage, omitBackground: !!p.omitBackground };
    if (p.quality) {
      options.type = 'jpeg';
      options.quality = p.quality;
    }
    if (p.path) options.path = p.path;
    if (p.selection) {
      options.clip = await current.evaluate(selectionSource(p.selection));
      options.fullPage = true;
    }
    return encoded(await current.screenshot(options), p.path);
  },

  async pdf(p) {
    const current = requirePage();
    if (p.mediaScreen) await current.emulateMedia({ media: 'screen' });
    const options = {
      landscape: !!p.landscape,
      printBackground: !!p.printBackground,
      scale: p.scale || 1,
    };
    if (p.format) options.format = p.format;
    if (p.width) options.width = p.width;
    if (p.height) options.height = p.height;
    if (p.path) options.path = p.path;
    return encoded(await current.pdf(options), p.path);
  },

  async html(p) {
    const current = requirePage();
    if (p.selector) {
      return { html: await current.locator(p.selector).first().evaluate((el) => el.outerHTML) };
    }
    return { html: await current.content() };
  },

  async evaluate(p) {
    const value = await requirePage().evaluate(p.expression);
    return { value: value === undefined ? null : value };
  },

  async accessibility() {
    return { tree: await requirePage().accessibility.snapshot() };
  },

  async closePage() {
    if (page) {
      await page.close();
      page = null;
    }
    return {};
  },

  async close() {
    if (context) await context.close();
    if (browser) await browser.close();
    context = null;
    browser = null;
    return {};
  },
};

const rl = readline.createInterface({ input: process.stdin });
let queue = Promise.resolve();

rl.on('line', (line) => {
  queue = queue.then(async () => {
    let request;
    try {
      request = JSON.parse(line);
    } catch (err) {
      send({ id: null, ok: false, error: { kind: 'protocol', message: `Invalid request: ${err.message}` } });
      return;
    }
    const handler = handlers[request.op];
    if (!handler) {
      send({ id: request.id, ok: false, error: { kind: 'protocol', message: `Unknown operation ${request.op}` } });
      return;
    }
    try {
      const result = await handler(request.params || {});
      send({ id: request.id, ok: true, result });
    } catch (err) {
      const kind = err && err.name === 'TimeoutError' ? 'timeout' : 'engine';
      const message = err && err.message ? err.message : String(err);
      send({ id: request.id, ok: false, error: { kind, message } });
    }
  });
});

rl.on('close', () => {
  queue.then(async () => {
    if (browser) await browser.close().catch(() => {});
  });
});
"#;

/// Timeout for checking node/playwright availability.
pub(crate) const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Script to check if Playwright is installed.
const PLAYWRIGHT_CHECK_SCRIPT: &str = "require('playwright'); process.stdout.write('ok');";

const MISSING_PLAYWRIGHT: &str =
    "Playwright npm package is missing; install with `npm install playwright`.";

/// Error reported by the helper for a failed request.
#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct HelperError {
    pub kind: String,
    pub message: String,
}

/// Maps a spawn error to an appropriate ShotError.
pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> ShotError {
    if err.kind() == io::ErrorKind::NotFound {
        ShotError::config(format!(
            "Unable to spawn Playwright helper; '{}' was not found on PATH",
            command
        ))
    } else {
        ShotError::Io(err)
    }
}

fn is_missing_module(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .contains("cannot find module 'playwright'")
}

/// Maps stderr of a failed Node invocation to an appropriate ShotError.
pub(crate) fn map_node_failure(status_text: impl Into<String>, stderr: &str) -> ShotError {
    if is_missing_module(stderr) {
        return ShotError::config(MISSING_PLAYWRIGHT);
    }
    ShotError::Browser(format!(
        "Playwright helper exited with status {}: {}",
        status_text.into(),
        stderr.trim()
    ))
}

/// Maps a helper error to a ShotError.
///
/// `url` is the page being worked on, if any; timeouts and network
/// failures against it are navigation errors.
pub(crate) fn map_helper_error(error: HelperError, url: Option<&str>) -> ShotError {
    if is_missing_module(&error.message) {
        return ShotError::config(MISSING_PLAYWRIGHT);
    }
    let lower = error.message.to_ascii_lowercase();
    let navigation_failure =
        error.kind == "timeout" || lower.contains("net::err_") || lower.contains("ns_error_");
    match url {
        Some(url) if navigation_failure => ShotError::navigation(url, error.message),
        _ => ShotError::Browser(error.message),
    }
}

/// Ensures Node.js is available on the system.
pub(crate) async fn ensure_node_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let status = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.status())
        .await
        .map_err(|_| {
            ShotError::config(format!(
                "Timed out checking node availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !status.success() {
        return Err(ShotError::config(format!(
            "Node command {:?} is not available (exit {})",
            node_command, status
        )));
    }

    Ok(())
}

/// Ensures Playwright npm package is installed.
pub(crate) async fn ensure_playwright_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("-e")
        .arg(PLAYWRIGHT_CHECK_SCRIPT)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            ShotError::config(format!(
                "Timed out checking Playwright availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(map_node_failure(format!("{:?}", output.status), &stderr));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper_error(kind: &str, message: &str) -> HelperError {
        HelperError {
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn node_failure_detects_missing_module() {
        let err = map_node_failure(
            "exit status: 1",
            "Error: Cannot find module 'playwright'\n    at Module._resolveFilename",
        );
        match err {
            ShotError::Config(msg) => assert!(
                msg.contains("npm install playwright"),
                "expected npm install hint, got: {msg}"
            ),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn node_failure_preserves_other_messages() {
        let err = map_node_failure("exit status: 1", "SyntaxError: Unexpected token\n");
        let msg = format!("{}", err);
        assert!(msg.contains("exited with status exit status: 1"));
        assert!(msg.contains("SyntaxError"));
    }

    #[test]
    fn helper_timeout_on_page_is_navigation_error() {
        let err = map_helper_error(
            helper_error("timeout", "page.goto: Timeout 30000ms exceeded."),
            Some("https://example.com/"),
        );
        match err {
            ShotError::Navigation { url, status, .. } => {
                assert_eq!(url, "https://example.com/");
                assert_eq!(status, None);
            }
            other => panic!("expected navigation error, got {other:?}"),
        }
    }

    #[test]
    fn helper_network_failure_is_navigation_error() {
        let err = map_helper_error(
            helper_error("engine", "page.goto: net::ERR_NAME_NOT_RESOLVED at http://nope/"),
            Some("http://nope/"),
        );
        assert!(matches!(err, ShotError::Navigation { .. }));
    }

    #[test]
    fn helper_engine_errors_without_page_are_browser_errors() {
        let err = map_helper_error(helper_error("timeout", "launch timed out"), None);
        assert!(matches!(err, ShotError::Browser(_)));
        let err = map_helper_error(
            helper_error("engine", "Selector \"#nope\" matched no elements"),
            Some("https://example.com/"),
        );
        assert!(matches!(err, ShotError::Browser(_)));
    }

    #[test]
    fn helper_missing_module_is_config_error() {
        let err = map_helper_error(
            helper_error("engine", "Cannot find module 'playwright'"),
            None,
        );
        assert!(err.is_config());
    }

    #[test]
    fn js_selectors_are_compiled_into_the_evaluated_source() {
        assert!(!HELPER_SCRIPT.contains("new Function"));
        assert!(HELPER_SCRIPT.contains("evaluate(selectionSource(p.selection))"));
        assert!(HELPER_SCRIPT.contains("`(el) => (${js})`"));
    }

    #[test]
    fn failed_navigation_closes_the_page_in_the_helper() {
        let open = &HELPER_SCRIPT[HELPER_SCRIPT.find("async open(p)").unwrap()..];
        let open = &open[..open.find("async prepare(p)").unwrap()];
        assert!(open.contains("catch (err)"));
        assert!(open.contains("page.close()"));
    }

    #[tokio::test]
    async fn ensure_node_available_fails_for_missing_binary() {
        let result = ensure_node_available("definitely-not-a-binary").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ensure_playwright_available_fails_for_missing_binary() {
        let result = ensure_playwright_available("definitely-not-a-binary").await;
        assert!(result.unwrap_err().is_config());
    }
}

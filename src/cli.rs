use clap::{Args, Parser, Subcommand, ValueEnum};
use shot_scraper_lib::{BrowserKind, RawShot};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shot-scraper")]
#[command(
    version,
    about = "Take automated screenshots of web pages",
    long_about = "shot-scraper\n\nDrives a headless browser (Playwright, via Node.js) to capture screenshots, PDFs, HTML, accessibility trees and HAR archives.\n\nA bare URL is shorthand for `shot-scraper shot URL`."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase log detail (-v, -vv)"
    )]
    pub verbose: u8,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) with browser defaults; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Take a single screenshot of a page or portion of a page
    Shot {
        #[arg(help = "URL or path to a local HTML file")]
        url: String,

        #[command(flatten)]
        shot: ShotArgs,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Take multiple screenshots, defined by a YAML file
    Multi {
        #[arg(value_name = "CONFIG", help = "YAML file with a list of shots ('-' for stdin)")]
        file: String,

        #[arg(short = 'n', long, help = "Skip shots whose output file already exists")]
        no_clobber: bool,

        #[arg(
            short,
            long = "output",
            value_name = "FILE",
            help = "Only run shots with this output (repeatable)"
        )]
        outputs: Vec<String>,

        #[arg(long, help = "Stop at the first failing shot")]
        fail_on_error: bool,

        #[arg(long, help = "Leave servers started by 'server' entries running")]
        leave_server: bool,

        #[arg(long, help = "Record a HAR file of every page visited")]
        har: bool,

        #[arg(long, help = "Record the HAR as a .har.zip with separate body files")]
        har_zip: bool,

        #[arg(long, value_name = "PATH", help = "Path for the recorded HAR file")]
        har_file: Option<PathBuf>,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Execute JavaScript against a page and print the JSON result
    Javascript {
        url: String,

        #[arg(help = "JavaScript expression (read from --input when omitted)")]
        javascript: Option<String>,

        #[arg(short, long, value_name = "FILE", default_value = "-", help = "Read JavaScript from this file ('-' for stdin)")]
        input: String,

        #[arg(short, long, help = "Write the result to this file")]
        output: Option<PathBuf>,

        #[arg(short, long, help = "Print string results without JSON quoting")]
        raw: bool,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Output the final HTML of a page
    Html {
        url: String,

        #[arg(short, long, help = "Output file ('-' for stdout)")]
        output: Option<String>,

        #[arg(short, long, help = "JavaScript to run before snapshotting")]
        javascript: Option<String>,

        #[arg(long, value_name = "MS", help = "Wait this many milliseconds first")]
        wait: Option<u64>,

        #[arg(short, long, help = "Only output the outer HTML of this element")]
        selector: Option<String>,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Create a PDF of a page
    Pdf {
        url: String,

        #[arg(short, long, help = "Output file ('-' for stdout)")]
        output: Option<String>,

        #[arg(short, long, help = "JavaScript to run before rendering")]
        javascript: Option<String>,

        #[arg(long, value_name = "MS", help = "Wait this many milliseconds first")]
        wait: Option<u64>,

        #[arg(long, help = "Use screen rather than print styles")]
        media_screen: bool,

        #[arg(long, help = "Landscape orientation")]
        landscape: bool,

        #[arg(long, value_enum, help = "Paper format")]
        format: Option<PdfFormat>,

        #[arg(long, help = "Page width with units, e.g. 8.5in")]
        width: Option<String>,

        #[arg(long, help = "Page height with units, e.g. 11in")]
        height: Option<String>,

        #[arg(long, default_value = "1.0", help = "Rendering scale between 0.1 and 2.0")]
        scale: f64,

        #[arg(long, help = "Include background graphics")]
        print_background: bool,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Dump the accessibility tree of a page as JSON
    Accessibility {
        url: String,

        #[arg(short, long, help = "Write the tree to this file")]
        output: Option<PathBuf>,

        #[arg(short, long, help = "JavaScript to run first")]
        javascript: Option<String>,

        #[arg(long, value_name = "MS", help = "Navigation timeout in milliseconds")]
        timeout: Option<u64>,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Record a HAR file of a page load
    Har {
        url: String,

        #[arg(short, long, help = "Write a .har.zip with bodies as separate files")]
        zip: bool,

        #[arg(short, long, help = "HAR file to write")]
        output: Option<PathBuf>,

        #[arg(short, long, help = "JavaScript to run after loading")]
        javascript: Option<String>,

        #[arg(long, value_name = "MS", help = "Wait this many milliseconds before closing")]
        wait: Option<u64>,

        #[arg(long, value_name = "MS", help = "Navigation timeout in milliseconds")]
        timeout: Option<u64>,

        #[arg(short = 'x', long, value_name = "DIR", help = "Also extract response bodies into this directory")]
        extract: Option<PathBuf>,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Install the Playwright browser binaries
    Install {
        #[arg(short, long, value_enum, help = "Browser to install")]
        browser: Option<CliBrowser>,
    },
}

impl Commands {
    pub fn browser_args(&self) -> Option<&BrowserArgs> {
        match self {
            Commands::Shot { browser, .. }
            | Commands::Multi { browser, .. }
            | Commands::Javascript { browser, .. }
            | Commands::Html { browser, .. }
            | Commands::Pdf { browser, .. }
            | Commands::Accessibility { browser, .. }
            | Commands::Har { browser, .. } => Some(browser),
            Commands::Install { .. } => None,
        }
    }
}

/// Options describing a single screenshot.
#[derive(Args, Debug, Clone, Default)]
pub struct ShotArgs {
    #[arg(short, long, help = "Output file ('-' for stdout)")]
    pub output: Option<String>,

    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..), help = "Viewport width")]
    pub width: Option<u32>,

    #[arg(
        long,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Viewport height (disables full-page capture)"
    )]
    pub height: Option<u32>,

    #[arg(short, long = "selector", help = "Screenshot the element matching this CSS selector (repeatable)")]
    pub selectors: Vec<String>,

    #[arg(long = "selector-all", help = "Screenshot every element matching this selector (repeatable)")]
    pub selectors_all: Vec<String>,

    #[arg(long = "js-selector", help = "Screenshot the first element for which this JS is true (repeatable)")]
    pub js_selectors: Vec<String>,

    #[arg(long = "js-selector-all", help = "Screenshot every element for which this JS is true (repeatable)")]
    pub js_selectors_all: Vec<String>,

    #[arg(short, long, help = "Pixels of padding around selected elements")]
    pub padding: Option<u32>,

    #[arg(short, long, help = "JavaScript to run before taking the shot")]
    pub javascript: Option<String>,

    #[arg(long, help = "Save as JPEG with this quality (1-100)")]
    pub quality: Option<u32>,

    #[arg(long, value_name = "MS", help = "Wait this many milliseconds before the shot")]
    pub wait: Option<u64>,

    #[arg(long, value_name = "JS", help = "Wait until this JavaScript expression is true")]
    pub wait_for: Option<String>,

    #[arg(long, value_name = "MS", help = "Navigation timeout in milliseconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Transparent background (PNG only)")]
    pub omit_background: bool,
}

impl ShotArgs {
    pub fn into_raw(self, url: String) -> RawShot {
        RawShot {
            url: Some(url),
            output: self.output,
            selectors: self.selectors,
            selectors_all: self.selectors_all,
            js_selectors: self.js_selectors,
            js_selectors_all: self.js_selectors_all,
            width: self.width,
            height: self.height,
            quality: self.quality,
            wait: self.wait,
            wait_for: self.wait_for,
            timeout: self.timeout,
            padding: self.padding,
            javascript: self.javascript,
            omit_background: self.omit_background.then_some(true),
            ..RawShot::default()
        }
    }
}

/// Browser and context flags shared by every page command.
#[derive(Args, Debug, Clone, Default)]
pub struct BrowserArgs {
    #[arg(short, long, value_enum, help = "Browser engine to use")]
    pub browser: Option<CliBrowser>,

    #[arg(
        long = "browser-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        help = "Extra argument passed to the browser (repeatable)"
    )]
    pub browser_args: Vec<String>,

    #[arg(long, help = "User-Agent header to send")]
    pub user_agent: Option<String>,

    #[arg(long, help = "Emulate prefers-reduced-motion")]
    pub reduced_motion: bool,

    #[arg(long, help = "Bypass Content-Security-Policy")]
    pub bypass_csp: bool,

    #[arg(short, long, value_name = "FILE", help = "Playwright storage state (cookies, localStorage) to load")]
    pub auth: Option<PathBuf>,

    #[arg(long, help = "HTTP basic auth username")]
    pub auth_username: Option<String>,

    #[arg(long, help = "HTTP basic auth password")]
    pub auth_password: Option<String>,

    #[arg(long, help = "Use a device scale factor of 2")]
    pub retina: bool,

    #[arg(long, allow_negative_numbers = true, help = "Device scale factor")]
    pub scale_factor: Option<f64>,

    #[arg(long, help = "Skip pages that return HTTP errors")]
    pub skip: bool,

    #[arg(long, help = "Fail on pages that return HTTP errors")]
    pub fail: bool,

    #[arg(long, help = "Only log warnings and errors")]
    pub silent: bool,

    #[arg(long, help = "Log console messages from the page")]
    pub log_console: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CliBrowser {
    Chromium,
    Firefox,
    Webkit,
    Chrome,
    ChromeBeta,
}

impl From<CliBrowser> for BrowserKind {
    fn from(browser: CliBrowser) -> Self {
        match browser {
            CliBrowser::Chromium => BrowserKind::Chromium,
            CliBrowser::Firefox => BrowserKind::Firefox,
            CliBrowser::Webkit => BrowserKind::Webkit,
            CliBrowser::Chrome => BrowserKind::Chrome,
            CliBrowser::ChromeBeta => BrowserKind::ChromeBeta,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PdfFormat {
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
}

impl PdfFormat {
    /// Name as Playwright spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfFormat::Letter => "Letter",
            PdfFormat::Legal => "Legal",
            PdfFormat::Tabloid => "Tabloid",
            PdfFormat::Ledger => "Ledger",
            PdfFormat::A0 => "A0",
            PdfFormat::A1 => "A1",
            PdfFormat::A2 => "A2",
            PdfFormat::A3 => "A3",
            PdfFormat::A4 => "A4",
            PdfFormat::A5 => "A5",
            PdfFormat::A6 => "A6",
        }
    }
}

const SUBCOMMANDS: &[&str] = &[
    "shot",
    "multi",
    "javascript",
    "html",
    "pdf",
    "accessibility",
    "har",
    "install",
    "help",
];

/// Inserts `shot` before the first positional argument when it is not a
/// subcommand, so `shot-scraper example.com` works.
pub fn with_default_command(args: Vec<OsString>) -> Vec<OsString> {
    let mut index = 1;
    while index < args.len() {
        let Some(arg) = args[index].to_str() else {
            break;
        };
        if arg == "--config" {
            index += 2;
            continue;
        }
        if arg.starts_with('-') {
            index += 1;
            continue;
        }
        if SUBCOMMANDS.contains(&arg) {
            return args;
        }
        break;
    }
    if index >= args.len() {
        return args;
    }
    let mut args = args;
    args.insert(index, OsString::from("shot"));
    args
}

pub fn parse() -> Cli {
    Cli::parse_from(with_default_command(std::env::args_os().collect()))
}

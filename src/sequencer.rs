//! Runs a multi-shot file: directives, skip rules, captures, servers.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::capture::{Capture, CaptureOutcome};
use crate::config::{MultiOptions, RunOptions};
use crate::filename::file_exists_on_disk;
use crate::normalize::{normalize_shot, NormalizeContext, STDOUT_OUTPUT};
use crate::resource::local_file_lookup;
use crate::shot::{CommandSpec, Entry, ShotOutput};
use crate::{Result, ShotError};

/// Pause after starting a server so it can bind its port.
pub const SERVER_STARTUP_DELAY: Duration = Duration::from_secs(1);

/// How long a server gets to exit after SIGTERM before it is killed.
pub const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const PYTHON_COMMAND: &str = "python3";

/// Counts of entries by how their shot ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Background servers started by `server` entries.
///
/// Dropping the guard kills whatever is still running unless the servers
/// were asked to outlive the run; [`ServerGuard::shutdown`] does the
/// graceful version.
pub struct ServerGuard {
    servers: Vec<(String, Child)>,
    leave_running: bool,
}

impl ServerGuard {
    pub fn new(leave_running: bool) -> Self {
        Self {
            servers: Vec::new(),
            leave_running,
        }
    }

    pub fn start(&mut self, command: &CommandSpec, dir: Option<&Path>) -> Result<u32> {
        let description = command.describe();
        let mut cmd = build_command(command, true, dir)?;
        cmd.stdin(Stdio::null());
        let child = cmd.spawn().map_err(|err| spawn_error(err, &description))?;
        let pid = child.id().unwrap_or_default();
        info!("Started server: {} (pid {})", description, pid);
        self.servers.push((description, child));
        Ok(pid)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Stops every server (or leaves them running when asked to).
    pub async fn shutdown(mut self) {
        let servers = std::mem::take(&mut self.servers);
        for (description, mut child) in servers {
            if self.leave_running {
                info!(
                    "Leaving server running: {} (pid {})",
                    description,
                    child.id().unwrap_or_default()
                );
                continue;
            }
            terminate(&mut child).await;
            debug!(server = %description, "server stopped");
        }
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        if self.leave_running {
            return;
        }
        for (_, child) in &mut self.servers {
            let _ = child.start_kill();
        }
    }
}

#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    match child.id() {
        Some(pid) => unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 },
        None => false,
    }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}

async fn terminate(child: &mut Child) {
    if request_exit(child) {
        if let Ok(Ok(_)) = timeout(SERVER_SHUTDOWN_TIMEOUT, child.wait()).await {
            return;
        }
        warn!(
            "Server did not exit within {:?}; killing it",
            SERVER_SHUTDOWN_TIMEOUT
        );
    }
    let _ = child.kill().await;
}

fn spawn_error(err: std::io::Error, description: &str) -> ShotError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ShotError::config(format!("Command not found: {}", description))
    } else {
        ShotError::Io(err)
    }
}

/// Shell strings go through `sh -c`; lists are run directly.
///
/// `replace_shell` makes the shell `exec` the command so signals reach it.
fn build_command(command: &CommandSpec, replace_shell: bool, dir: Option<&Path>) -> Result<Command> {
    let mut cmd = match command {
        CommandSpec::Shell(line) => {
            let mut cmd = Command::new("sh");
            let line = if replace_shell {
                format!("exec {line}")
            } else {
                line.clone()
            };
            cmd.arg("-c").arg(line);
            cmd
        }
        CommandSpec::Argv(_) => {
            let argv = command.argv()?;
            let mut cmd = Command::new(&argv[0]);
            cmd.args(&argv[1..]);
            cmd
        }
    };
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    Ok(cmd)
}

async fn run_to_completion(mut cmd: Command, description: &str) -> Result<()> {
    let status = cmd
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|err| spawn_error(err, description))?;
    if !status.success() {
        warn!("Command exited with {}: {}", status, description);
    }
    Ok(())
}

/// Executes multi-shot entries in order against one [`Capture`].
pub struct Sequencer<'a> {
    run: &'a RunOptions,
    multi: &'a MultiOptions,
    dir: Option<PathBuf>,
    server_delay: Duration,
}

impl<'a> Sequencer<'a> {
    pub fn new(run: &'a RunOptions, multi: &'a MultiOptions) -> Self {
        Self {
            run,
            multi,
            dir: None,
            server_delay: SERVER_STARTUP_DELAY,
        }
    }

    /// Runs directives in `dir` and resolves relative outputs against it.
    pub fn in_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..self
        }
    }

    pub fn with_server_delay(self, server_delay: Duration) -> Self {
        Self {
            server_delay,
            ..self
        }
    }

    /// Checks every entry before anything is launched.
    pub fn validate(entries: &[Entry]) -> Result<()> {
        entries
            .iter()
            .enumerate()
            .try_for_each(|(index, entry)| entry.validate(index))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.join(path),
            None => PathBuf::from(path),
        }
    }

    fn exists(&self, path: &str) -> bool {
        match &self.dir {
            Some(_) => self.resolve(path).exists(),
            None => file_exists_on_disk(path),
        }
    }

    pub async fn run<C: Capture>(&self, entries: Vec<Entry>, capture: &mut C) -> Result<RunSummary> {
        let mut servers = ServerGuard::new(self.multi.leave_server);
        let result = self.run_entries(entries, capture, &mut servers).await;
        servers.shutdown().await;
        result
    }

    async fn run_entries<C: Capture>(
        &self,
        entries: Vec<Entry>,
        capture: &mut C,
        servers: &mut ServerGuard,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let total = entries.len();
        for (index, entry) in entries.into_iter().enumerate() {
            if entry.is_empty() {
                warn!("Entry {} has no url or command; ignoring it", index + 1);
                continue;
            }
            self.run_directives(&entry, servers).await?;
            if !entry.shot.has_url() {
                continue;
            }
            if let Some(reason) = self.skip_reason(&entry) {
                info!("Skipping {}: {}", entry.shot.url.as_deref().unwrap_or_default(), reason);
                summary.skipped += 1;
                continue;
            }
            match self.shoot(entry, capture).await {
                Ok(CaptureOutcome::Skipped { .. }) => summary.skipped += 1,
                Ok(_) => summary.done += 1,
                Err(err) if self.multi.fail_on_error => return Err(err),
                Err(err) => {
                    error!("{}", err);
                    summary.failed += 1;
                    if !capture.is_alive() {
                        return Err(ShotError::Browser(format!(
                            "Playwright helper is no longer running; {} remaining entries were not run",
                            total - index - 1
                        )));
                    }
                }
            }
        }
        Ok(summary)
    }

    async fn run_directives(&self, entry: &Entry, servers: &mut ServerGuard) -> Result<()> {
        let dir = self.dir.as_deref();
        if let Some(sh) = &entry.sh {
            let description = sh.describe();
            debug!(command = %description, "running sh directive");
            run_to_completion(build_command(sh, false, dir)?, &description).await?;
        }
        if let Some(python) = &entry.python {
            debug!("running python directive");
            let mut cmd = Command::new(PYTHON_COMMAND);
            cmd.arg("-c").arg(python);
            if let Some(dir) = dir {
                cmd.current_dir(dir);
            }
            run_to_completion(cmd, PYTHON_COMMAND).await?;
        }
        if let Some(server) = &entry.server {
            servers.start(server, dir)?;
            tokio::time::sleep(self.server_delay).await;
        }
        Ok(())
    }

    /// Skip rules look at the output as written in the file.
    fn skip_reason(&self, entry: &Entry) -> Option<String> {
        let output = entry.shot.declared_output();
        if !self.multi.outputs.is_empty() {
            let listed = output.is_some_and(|o| self.multi.outputs.iter().any(|f| f == o));
            if !listed {
                return Some("output not selected".to_string());
            }
        }
        match output {
            Some(output) if self.multi.no_clobber && output != STDOUT_OUTPUT && self.exists(output) => {
                Some(format!("{} already exists", output))
            }
            _ => None,
        }
    }

    async fn shoot<C: Capture>(&self, entry: Entry, capture: &mut C) -> Result<CaptureOutcome> {
        let navigate_only = self.multi.har_only && entry.shot.declared_output().is_none();
        let local_file = |candidate: &str| local_file_lookup(&self.resolve(candidate).to_string_lossy());
        let output_exists = |name: &str| self.exists(name);
        let ctx = NormalizeContext {
            local_file: &local_file,
            output_exists: &output_exists,
            ..NormalizeContext::on_disk(self.run.http_errors, self.run.timeout)
        };
        let mut shot = normalize_shot(entry.shot, &ctx)?;
        shot.skip_shot = navigate_only;
        if let ShotOutput::File(path) = &shot.output {
            if let Some(dir) = &self.dir {
                shot.output = ShotOutput::File(dir.join(path));
            }
        }

        let outcome = capture.capture(&shot).await?;
        match &outcome {
            CaptureOutcome::Bytes(bytes) => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(bytes).await?;
                stdout.flush().await?;
            }
            CaptureOutcome::NavigatedOnly => info!("Navigated to {}", shot.url),
            CaptureOutcome::Written(_) | CaptureOutcome::Skipped { .. } => {}
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shot::{parse_entries, ShotSpec};
    use std::fs;

    /// Records shots and "writes" them by touching the output file.
    #[derive(Default)]
    struct RecordingCapture {
        shots: Vec<ShotSpec>,
        /// A failing shot takes the browser down with it.
        crash_on_failure: bool,
        crashed: bool,
    }

    impl Capture for RecordingCapture {
        async fn capture(&mut self, shot: &ShotSpec) -> Result<CaptureOutcome> {
            self.shots.push(shot.clone());
            if shot.url.contains("broken") {
                self.crashed = self.crash_on_failure;
                return Err(ShotError::navigation(&shot.url, "net::ERR_CONNECTION_REFUSED"));
            }
            if shot.skip_shot {
                return Ok(CaptureOutcome::NavigatedOnly);
            }
            match &shot.output {
                ShotOutput::File(path) => {
                    fs::write(path, b"png")?;
                    Ok(CaptureOutcome::Written(path.clone()))
                }
                ShotOutput::Stdout => Ok(CaptureOutcome::Bytes(Vec::new())),
            }
        }

        fn is_alive(&self) -> bool {
            !self.crashed
        }
    }

    fn urls(capture: &RecordingCapture) -> Vec<&str> {
        capture.shots.iter().map(|s| s.url.as_str()).collect()
    }

    #[tokio::test]
    async fn captures_every_entry_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let entries = parse_entries(
            "- url: https://example.com/one\n- url: https://example.com/two\n  output: two.png\n",
        )
        .unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions::default();
        let mut capture = RecordingCapture::default();
        let summary = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(entries, &mut capture)
            .await
            .unwrap();
        assert_eq!(summary.done, 2);
        assert_eq!(
            urls(&capture),
            vec!["https://example.com/one", "https://example.com/two"]
        );
        assert_eq!(
            capture.shots[0].output,
            ShotOutput::File(dir.path().join("example-com-one.png"))
        );
        assert!(dir.path().join("two.png").exists());
    }

    #[tokio::test]
    async fn no_clobber_skips_existing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("exists.png"), b"old").unwrap();
        let entries = parse_entries(
            "- url: https://example.com/\n  output: exists.png\n- url: https://example.com/\n  output: new.png\n",
        )
        .unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions {
            no_clobber: true,
            ..MultiOptions::default()
        };
        let mut capture = RecordingCapture::default();
        let summary = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(entries, &mut capture)
            .await
            .unwrap();
        assert_eq!(summary, RunSummary { done: 1, skipped: 1, failed: 0 });
        assert_eq!(fs::read(dir.path().join("exists.png")).unwrap(), b"old");
        assert_eq!(
            capture.shots[0].output,
            ShotOutput::File(dir.path().join("new.png"))
        );
    }

    #[tokio::test]
    async fn output_filter_runs_only_listed_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let entries = parse_entries(
            "- url: https://a.example/\n  output: a.png\n- url: https://b.example/\n  output: b.png\n- url: https://c.example/\n",
        )
        .unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions {
            outputs: vec!["b.png".into()],
            ..MultiOptions::default()
        };
        let mut capture = RecordingCapture::default();
        let summary = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(entries, &mut capture)
            .await
            .unwrap();
        assert_eq!(urls(&capture), vec!["https://b.example/"]);
        assert_eq!(summary.skipped, 2);
    }

    #[tokio::test]
    async fn failures_continue_unless_fail_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = "- url: http://broken.localhost/\n- url: https://example.com/\n";
        let run = RunOptions::default();

        let multi = MultiOptions::default();
        let mut capture = RecordingCapture::default();
        let summary = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(parse_entries(yaml).unwrap(), &mut capture)
            .await
            .unwrap();
        assert_eq!(summary, RunSummary { done: 1, skipped: 0, failed: 1 });

        let multi = MultiOptions {
            fail_on_error: true,
            ..MultiOptions::default()
        };
        let mut capture = RecordingCapture::default();
        let err = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(parse_entries(yaml).unwrap(), &mut capture)
            .await
            .unwrap_err();
        assert!(matches!(err, ShotError::Navigation { .. }));
        assert_eq!(capture.shots.len(), 1);
    }

    #[tokio::test]
    async fn run_stops_once_the_browser_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let entries = parse_entries(
            "- url: http://broken.localhost/\n- url: https://example.com/a\n- url: https://example.com/b\n",
        )
        .unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions::default();
        let mut capture = RecordingCapture {
            crash_on_failure: true,
            ..RecordingCapture::default()
        };
        let err = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(entries, &mut capture)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_payload().message,
            "Playwright helper is no longer running; 2 remaining entries were not run"
        );
        assert_eq!(capture.shots.len(), 1);
    }

    #[tokio::test]
    async fn har_only_runs_navigate_entries_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let entries = parse_entries(
            "- url: https://example.com/\n- url: https://example.com/shot\n  output: shot.png\n",
        )
        .unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions {
            har_only: true,
            ..MultiOptions::default()
        };
        let mut capture = RecordingCapture::default();
        let summary = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(entries, &mut capture)
            .await
            .unwrap();
        assert_eq!(summary.done, 2);
        assert!(capture.shots[0].skip_shot);
        assert!(!capture.shots[1].skip_shot);
    }

    #[test]
    fn validate_reports_the_bad_entry() {
        let entries = parse_entries("- url: https://example.com/\n- output: x.png\n").unwrap();
        let err = Sequencer::validate(&entries).unwrap_err();
        assert_eq!(err.to_payload().message, "Shot 2 is missing a 'url'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sh_directives_run_in_order_and_are_never_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let entries = parse_entries(
            r#"
- sh: echo one >> log.txt
- sh:
  - sh
  - -c
  - echo two >> log.txt
  url: https://example.com/
  output: skipped.png
- sh: "exit 3"
- sh: echo three >> log.txt
"#,
        )
        .unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions {
            outputs: vec!["other.png".into()],
            ..MultiOptions::default()
        };
        let mut capture = RecordingCapture::default();
        let summary = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(entries, &mut capture)
            .await
            .unwrap();
        let log = fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert_eq!(log, "one\ntwo\nthree\n");
        assert_eq!(summary.skipped, 1);
        assert!(capture.shots.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn python_directive_output_is_visible_to_later_entries() {
        let dir = tempfile::tempdir().unwrap();
        let entries = parse_entries(
            r#"
- python: |
    with open('note.txt', 'w') as f:
        f.write('from python')
- sh: cat note.txt > copy.txt
"#,
        )
        .unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions::default();
        let mut capture = RecordingCapture::default();
        Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .run(entries, &mut capture)
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("copy.txt")).unwrap(),
            "from python"
        );
        assert!(capture.shots.is_empty());
    }

    #[tokio::test]
    async fn missing_directive_command_is_fatal() {
        let entries = parse_entries("- sh:\n  - definitely-not-a-real-command-xyz\n").unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions::default();
        let mut capture = RecordingCapture::default();
        let err = Sequencer::new(&run, &multi)
            .run(entries, &mut capture)
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn server_guard_terminates_servers() {
        let mut guard = ServerGuard::new(false);
        let pid = guard
            .start(&CommandSpec::Shell("sleep 30".into()), None)
            .unwrap();
        assert_eq!(guard.len(), 1);
        guard.shutdown().await;
        let alive = unsafe { libc::kill(pid as libc::pid_t, 0) } == 0;
        assert!(!alive, "server {pid} still running");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn leave_running_keeps_servers_alive() {
        let mut guard = ServerGuard::new(true);
        let pid = guard
            .start(&CommandSpec::Shell("sleep 30".into()), None)
            .unwrap();
        guard.shutdown().await;
        let alive = unsafe { libc::kill(pid as libc::pid_t, 0) } == 0;
        unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
        assert!(alive, "server {pid} was stopped");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn servers_are_stopped_after_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let entries = parse_entries(
            "- server: sleep 30\n- url: https://example.com/\n  output: page.png\n",
        )
        .unwrap();
        let run = RunOptions::default();
        let multi = MultiOptions::default();
        let mut capture = RecordingCapture::default();
        let started = std::time::Instant::now();
        let summary = Sequencer::new(&run, &multi)
            .in_dir(dir.path())
            .with_server_delay(Duration::ZERO)
            .run(entries, &mut capture)
            .await
            .unwrap();
        assert_eq!(summary.done, 1);
        assert!(started.elapsed() < SERVER_SHUTDOWN_TIMEOUT);
    }
}

//! Subject process invocation
//!
//! Runs the subject binary once with a single mode argument, stdin taken
//! from a file, and a wall-clock limit. Stdout and stderr are read
//! concurrently so a chatty stderr can never block the child, and both are
//! appended in arrival order to one combined transcript for diagnostics.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Everything needed for one subject invocation
#[derive(Debug)]
pub struct InvocationSpec<'a> {
    /// Path to the subject binary
    pub binary: &'a Path,
    /// Mode token, the only argument
    pub mode: &'a str,
    /// Open input file, becomes the child's stdin
    pub input: File,
    /// Input file name, for diagnostics only
    pub input_name: PathBuf,
    /// Wall-clock limit
    pub timeout: Duration,
}

/// Stdout of a successful run, or why the run failed
pub type InvocationResult = std::result::Result<String, InvocationFailure>;

/// How an invocation went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The binary could not be started at all
    Spawn(String),
    /// Exited with a nonzero status; `None` when killed by a signal
    Exited(Option<i32>),
    /// Still running when the limit expired; the process was killed
    TimedOut(Duration),
    /// Reading the child's output failed
    Capture(String),
}

/// Structured failure of one subject invocation
#[derive(Debug, Clone)]
pub struct InvocationFailure {
    /// The exact command, binary first
    pub command: Vec<String>,
    /// File that was fed as stdin
    pub input: PathBuf,
    pub kind: FailureKind,
    /// Combined stdout + stderr captured before the failure
    pub output: String,
}

impl InvocationFailure {
    /// Exit code when the process ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self.kind {
            FailureKind::Exited(code) => code,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, FailureKind::TimedOut(_))
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Spawn(e) => write!(f, "failed to start: {}", e),
            FailureKind::Exited(Some(code)) => write!(f, "error code: {}", code),
            FailureKind::Exited(None) => write!(f, "terminated by signal"),
            FailureKind::TimedOut(limit) => {
                write!(f, "timed out after {:.2} seconds", limit.as_secs_f64())
            }
            FailureKind::Capture(e) => write!(f, "failed to capture output: {}", e),
        }
    }
}

impl fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command {:?} input file \"{}\": {}.\nstdoutput + stderr: \"{}\"",
            self.command,
            self.input.display(),
            self.kind,
            self.output
        )
    }
}

/// Output gathered from a running child
#[derive(Debug, Default)]
struct Capture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    combined: Vec<u8>,
}

impl Capture {
    fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    fn combined_text(&self) -> String {
        String::from_utf8_lossy(&self.combined).into_owned()
    }
}

/// Run the subject once and capture its output
pub async fn invoke(spec: InvocationSpec<'_>) -> InvocationResult {
    let command = vec![
        spec.binary.display().to_string(),
        spec.mode.to_string(),
    ];
    let failure = |kind: FailureKind, output: String| InvocationFailure {
        command: command.clone(),
        input: spec.input_name.clone(),
        kind,
        output,
    };

    let mut std_cmd = std::process::Command::new(spec.binary);
    std_cmd
        .arg(spec.mode)
        .stdin(Stdio::from(spec.input))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group, so a timeout can take down grandchildren too
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_cmd.process_group(0);
    }

    let mut cmd = Command::from(std_cmd);
    cmd.kill_on_drop(true);

    tracing::debug!(binary = %spec.binary.display(), mode = spec.mode, input = %spec.input_name.display(), "spawning subject");
    let started = Instant::now();

    let mut child = cmd
        .spawn()
        .map_err(|e| failure(FailureKind::Spawn(e.to_string()), String::new()))?;

    // The command holds the parent's copy of the stdin file
    drop(cmd);

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            terminate(&mut child).await;
            return Err(failure(
                FailureKind::Capture("child pipes unavailable".to_string()),
                String::new(),
            ));
        }
    };

    let mut capture = Capture::default();
    let waited = timeout(spec.timeout, async {
        drain(stdout, stderr, &mut capture).await?;
        child.wait().await
    })
    .await;

    let elapsed = started.elapsed();
    match waited {
        Err(_) => {
            terminate(&mut child).await;
            tracing::warn!(mode = spec.mode, ?elapsed, "subject timed out and was killed");
            Err(failure(
                FailureKind::TimedOut(spec.timeout),
                capture.combined_text(),
            ))
        }
        Ok(Err(e)) => {
            terminate(&mut child).await;
            Err(failure(
                FailureKind::Capture(e.to_string()),
                capture.combined_text(),
            ))
        }
        Ok(Ok(status)) => finish(status, capture, elapsed, spec.mode)
            .map_err(|(kind, output)| failure(kind, output)),
    }
}

/// Turn a completed run into the invocation result
fn finish(
    status: ExitStatus,
    capture: Capture,
    elapsed: Duration,
    mode: &str,
) -> std::result::Result<String, (FailureKind, String)> {
    tracing::debug!(mode, ?elapsed, code = ?status.code(), "subject exited");

    if !status.success() {
        return Err((FailureKind::Exited(status.code()), capture.combined_text()));
    }

    if !capture.stderr.is_empty() {
        tracing::info!(mode, stderr = %capture.stderr_text().trim_end(), "subject wrote to stderr");
    }

    Ok(capture.stdout_text())
}

/// Read both pipes to EOF, recording arrival order in the combined buffer
async fn drain<O, E>(mut stdout: O, mut stderr: E, capture: &mut Capture) -> std::io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = [0u8; 8192];
    let mut err_buf = [0u8; 8192];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => {
                let n = read?;
                if n == 0 {
                    out_open = false;
                } else {
                    capture.stdout.extend_from_slice(&out_buf[..n]);
                    capture.combined.extend_from_slice(&out_buf[..n]);
                }
            }
            read = stderr.read(&mut err_buf), if err_open => {
                let n = read?;
                if n == 0 {
                    err_open = false;
                } else {
                    capture.stderr.extend_from_slice(&err_buf[..n]);
                    capture.combined.extend_from_slice(&err_buf[..n]);
                }
            }
        }
    }

    Ok(())
}

/// Kill the child (and its process group on Unix) and reap it
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // Signal the whole group created by process_group(0)
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
    }

    let _ = child.kill().await;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;

    fn input_file(content: &str) -> (tempfile::NamedTempFile, File) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let handle = File::open(file.path()).unwrap();
        (file, handle)
    }

    fn spec<'a>(binary: &'a Path, mode: &'a str, input: File, secs: f64) -> InvocationSpec<'a> {
        InvocationSpec {
            binary,
            mode,
            input,
            input_name: PathBuf::from("input.json"),
            timeout: Duration::from_secs_f64(secs),
        }
    }

    #[tokio::test]
    async fn test_success_returns_stdout_from_stdin() {
        let (_keep, handle) = input_file("{\"responses\":[]}\n");
        // `cat -` echoes stdin
        let out = invoke(spec(Path::new("cat"), "-", handle, 5.0)).await.unwrap();
        assert_eq!(out, "{\"responses\":[]}\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_with_code() {
        let (_keep, handle) = input_file("");
        let err = invoke(spec(Path::new("false"), "make_base", handle, 5.0))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.command, vec!["false".to_string(), "make_base".to_string()]);
        assert!(err.to_string().contains("error code: 1"));
    }

    #[tokio::test]
    async fn test_failure_output_includes_stderr() {
        let (_keep, handle) = input_file("");
        let err = invoke(spec(
            Path::new("ls"),
            "/definitely/not/a/real/path",
            handle,
            5.0,
        ))
        .await
        .unwrap_err();

        assert!(err.exit_code().is_some());
        assert!(err.output.contains("/definitely/not/a/real/path"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let (_keep, handle) = input_file("");
        let started = Instant::now();
        let err = invoke(spec(Path::new("sleep"), "10", handle, 0.2))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.exit_code(), None);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let (_keep, handle) = input_file("");
        let err = invoke(spec(
            Path::new("/nonexistent/subject-binary"),
            "make_base",
            handle,
            1.0,
        ))
        .await
        .unwrap_err();

        assert!(matches!(err.kind, FailureKind::Spawn(_)));
        assert!(err.output.is_empty());
    }
}

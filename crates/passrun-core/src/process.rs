//! Process management utilities
//!
//! Every external collaborator passrun talks to (the decryption command,
//! clipboard tools, keystroke typers, notification senders) is a short-lived
//! child process. Payloads always travel over stdin so they never show up in
//! the process table.

use std::io;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::debug;
use zeroize::Zeroizing;

/// Read size for sensitive output, and the initial capacity of its buffer
const SENSITIVE_CHUNK: usize = 4096;

/// Errors from running an external command
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} timed out after {}s", .timeout.as_secs_f64())]
    TimedOut { program: String, timeout: Duration },
}

impl ProcessError {
    /// Whether the command could not be started at all (usually not installed)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Check if a command exists on PATH
pub fn command_exists(cmd: &str) -> bool {
    std::process::Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run a command to completion, feeding `input` on stdin and capturing output.
///
/// The child is killed if it outlives `timeout`.
pub async fn run_with_input(
    program: &str,
    args: &[String],
    input: Option<&[u8]>,
    timeout: Duration,
) -> Result<Output, ProcessError> {
    debug!("Running {} {:?}", program, args);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = spawn(&mut cmd, program)?;
    let stdin = child.stdin.take();

    let feed = async move {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            write_input(&mut stdin, input).await?;
        }
        Ok::<_, io::Error>(())
    };

    match tokio::time::timeout(timeout, async { tokio::join!(feed, child.wait_with_output()) }).await {
        Ok((fed, output)) => {
            fed.map_err(|source| io_error(program, source))?;
            output.map_err(|source| io_error(program, source))
        }
        Err(_) => Err(ProcessError::TimedOut {
            program: program.to_string(),
            timeout,
        }),
    }
}

/// Output of a command whose stdout carries a secret
pub struct SensitiveOutput {
    pub status: ExitStatus,
    /// Wiped on drop, including every buffer it outgrew
    pub stdout: Zeroizing<Vec<u8>>,
    pub stderr: Vec<u8>,
}

impl std::fmt::Debug for SensitiveOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SensitiveOutput(<redacted>)")
    }
}

/// Run a command whose stdout is sensitive (a decryption command).
///
/// Like [`run_with_input`] with no stdin, except stdout is read straight into
/// zeroizing memory instead of a plain `Vec` that may leave copies behind
/// when it reallocates.
pub async fn run_sensitive(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<SensitiveOutput, ProcessError> {
    debug!("Running {} {:?}", program, args);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = spawn(&mut cmd, program)?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async move {
        let read_out = async move {
            match stdout {
                Some(stdout) => read_zeroizing(stdout).await,
                None => Ok(Zeroizing::new(Vec::new())),
            }
        };
        let read_err = async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                stderr.read_to_end(&mut buf).await?;
            }
            Ok::<_, io::Error>(buf)
        };
        let (stdout, stderr) = tokio::try_join!(read_out, read_err)?;
        let status = child.wait().await?;
        Ok::<_, io::Error>(SensitiveOutput {
            status,
            stdout,
            stderr,
        })
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(output) => output.map_err(|source| io_error(program, source)),
        Err(_) => Err(ProcessError::TimedOut {
            program: program.to_string(),
            timeout,
        }),
    }
}

/// Read to EOF into zeroizing memory. Growth goes through a fresh zeroizing
/// buffer so the outgrown one is wiped, not just freed.
async fn read_zeroizing<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(Vec::with_capacity(SENSITIVE_CHUNK));
    let mut chunk = Zeroizing::new([0u8; SENSITIVE_CHUNK]);

    loop {
        let n = reader.read(&mut chunk[..]).await?;
        if n == 0 {
            return Ok(buf);
        }
        let needed = buf.len() + n;
        if needed > buf.capacity() {
            let mut grown = Zeroizing::new(Vec::with_capacity(needed.max(buf.capacity() * 2)));
            grown.extend_from_slice(&buf);
            buf = grown;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Run a command that may fork a long-lived holder process (clipboard
/// owners like `wl-copy` and `xclip` do this).
///
/// stdout and stderr are discarded so the forked holder cannot keep our pipes
/// open; only the exit status of the direct child is reported.
pub async fn run_detached_with_input(
    program: &str,
    args: &[String],
    input: &[u8],
    timeout: Duration,
) -> Result<ExitStatus, ProcessError> {
    debug!("Running detached {} {:?}", program, args);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = spawn(&mut cmd, program)?;
    let stdin = child.stdin.take();

    let run = async move {
        if let Some(mut stdin) = stdin {
            write_input(&mut stdin, input).await?;
        }
        child.wait().await
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(status) => status.map_err(|source| io_error(program, source)),
        Err(_) => Err(ProcessError::TimedOut {
            program: program.to_string(),
            timeout,
        }),
    }
}

fn spawn(cmd: &mut Command, program: &str) -> Result<Child, ProcessError> {
    cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.to_string(),
        source,
    })
}

/// Write the payload and close stdin. A child that exits without reading
/// (broken pipe) is not an error here; its exit status tells the story.
async fn write_input(stdin: &mut tokio::process::ChildStdin, input: &[u8]) -> io::Result<()> {
    match stdin.write_all(input).await {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        other => other?,
    }
    match stdin.shutdown().await {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn io_error(program: &str, source: io::Error) -> ProcessError {
    ProcessError::Io {
        program: program.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_input_round_trips_through_stdin() {
        let output = run_with_input("sh", &sh("cat"), Some(b"hunter2"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hunter2");
    }

    #[tokio::test]
    async fn test_no_input_means_null_stdin() {
        let output = run_with_input("sh", &sh("cat; echo done"), None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "done\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let err = run_with_input("sh", &sh("sleep 5"), None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_sensitive_output_is_captured_whole() {
        let script = sh("printf 'hunter2\\nuser: alice\\n'; echo warn >&2");
        let output = run_sensitive("sh", &script, Duration::from_secs(5)).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.as_slice(), b"hunter2\nuser: alice\n");
        assert_eq!(output.stderr, b"warn\n");
    }

    #[tokio::test]
    async fn test_sensitive_output_grows_past_one_chunk() {
        let data: Vec<u8> = (0..3 * SENSITIVE_CHUNK + 17).map(|i| b'a' + (i % 26) as u8).collect();
        let buf = read_zeroizing(data.as_slice()).await.unwrap();
        assert_eq!(buf.as_slice(), data.as_slice());
        assert!(buf.capacity() >= data.len());

        let output = run_sensitive("sh", &sh("head -c 20000 /dev/zero"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.stdout.len(), 20000);
    }

    #[tokio::test]
    async fn test_sensitive_timeout_kills_child() {
        let err = run_sensitive("sh", &sh("sleep 5"), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));

        let err = run_sensitive("passrun-no-such-tool", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = run_with_input("passrun-no-such-tool", &[], None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_child_ignoring_stdin_is_not_an_error() {
        let status = run_detached_with_input("sh", &sh("exit 0"), b"payload", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_detached_reports_exit_status() {
        let status = run_detached_with_input("sh", &sh("cat >/dev/null; exit 3"), b"x", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn test_command_exists() {
        assert!(command_exists("sh"));
        assert!(!command_exists("passrun-no-such-tool"));
    }
}

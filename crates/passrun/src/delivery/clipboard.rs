//! Clipboard delivery
//!
//! Copies through the session's clipboard tool (`wl-copy` on Wayland, `xclip`
//! otherwise). When a clear interval is configured, a timer clears the
//! clipboard later, but only if it still holds what we put there. The timer
//! keeps a SHA-256 digest of the value, never the value itself.

use passrun_core::config::ClipboardConfig;
use passrun_core::process::{self, ProcessError};
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Argv;
use crate::error::DeliveryError;
use crate::secret::Secret;
use crate::session::DisplayServer;

const MECHANISM: &str = "clipboard";

/// Bound on one clipboard tool invocation
const TOOL_TIMEOUT: Duration = Duration::from_secs(5);

fn argv(parts: &[&str]) -> Argv {
    parts.iter().map(|p| p.to_string()).collect()
}

pub struct ClipboardWriter {
    copy: Argv,
    paste: Option<Argv>,
    clear: Option<Argv>,
    clear_after: Option<Duration>,
    pending_clear: Mutex<Option<JoinHandle<()>>>,
}

impl ClipboardWriter {
    /// Pick the clipboard tools for `display`, with config overrides applied
    pub fn for_session(display: DisplayServer, config: &ClipboardConfig) -> Self {
        let (copy, paste, clear) = match display {
            DisplayServer::Wayland => (
                argv(&["wl-copy"]),
                argv(&["wl-paste", "--no-newline"]),
                Some(argv(&["wl-copy", "--clear"])),
            ),
            DisplayServer::X11 | DisplayServer::Unknown => (
                argv(&["xclip", "-selection", "clipboard"]),
                argv(&["xclip", "-selection", "clipboard", "-o"]),
                None,
            ),
        };

        Self::from_commands(
            config.copy_command.clone().unwrap_or(copy),
            Some(config.paste_command.clone().unwrap_or(paste)),
            config.clear_command.clone().or(clear),
            config.clear_after(),
        )
    }

    /// Build from explicit command lines.
    ///
    /// `copy` reads the value on stdin. `paste` prints the current clipboard;
    /// without it the clear timer clears unconditionally. `clear` empties the
    /// clipboard; without it an empty value is copied instead.
    pub fn from_commands(
        copy: Argv,
        paste: Option<Argv>,
        clear: Option<Argv>,
        clear_after: Option<Duration>,
    ) -> Self {
        Self {
            copy,
            paste,
            clear,
            clear_after,
            pending_clear: Mutex::new(None),
        }
    }

    /// Name of the copy tool
    pub fn tool(&self) -> &str {
        self.copy.first().map(String::as_str).unwrap_or(MECHANISM)
    }

    pub fn clear_after(&self) -> Option<Duration> {
        self.clear_after
    }

    /// Place the secret on the clipboard
    pub async fn copy(&self, secret: &Secret) -> Result<(), DeliveryError> {
        run_copy(&self.copy, secret.as_bytes()).await?;
        debug!("Copied {} bytes with {}", secret.as_bytes().len(), self.tool());

        if let Some(after) = self.clear_after {
            self.schedule_clear(secret, after);
        }
        Ok(())
    }

    /// Wait for a scheduled clear to finish, if there is one
    pub async fn wait_for_clear(&self) {
        let handle = self
            .pending_clear
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn schedule_clear(&self, secret: &Secret, after: Duration) {
        let digest = Sha256::digest(secret.as_bytes());
        let copy = self.copy.clone();
        let paste = self.paste.clone();
        let clear = self.clear.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;

            if let Some(paste) = &paste {
                match still_holds(paste, &digest).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!("Clipboard changed since copy, leaving it alone");
                        return;
                    }
                    Err(e) => {
                        warn!("Could not read clipboard back, not clearing: {}", e);
                        return;
                    }
                }
            }

            let cleared = match &clear {
                Some(clear) => run_copy(clear, b"").await,
                None => run_copy(&copy, b"").await,
            };
            match cleared {
                Ok(()) => info!("Cleared clipboard after {}s", after.as_secs()),
                Err(e) => warn!("Failed to clear clipboard: {}", e),
            }
        });

        // A newer copy supersedes the previous timer
        let previous = self
            .pending_clear
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

async fn run_copy(command: &[String], input: &[u8]) -> Result<(), DeliveryError> {
    let Some((program, args)) = command.split_first() else {
        return Err(failed("empty clipboard command"));
    };

    let status = process::run_detached_with_input(program, args, input, TOOL_TIMEOUT)
        .await
        .map_err(|e| tool_error(program, e))?;
    if !status.success() {
        return Err(failed(format!("{} exited with {}", program, status)));
    }
    Ok(())
}

async fn still_holds(paste: &[String], digest: &[u8]) -> Result<bool, DeliveryError> {
    let Some((program, args)) = paste.split_first() else {
        return Err(failed("empty paste command"));
    };

    let current = process::run_sensitive(program, args, TOOL_TIMEOUT)
        .await
        .map_err(|e| tool_error(program, e))?;
    Ok(Sha256::digest(current.stdout.as_slice()).as_slice() == digest)
}

fn tool_error(program: &str, err: ProcessError) -> DeliveryError {
    if err.is_not_found() {
        failed(format!("{} is not installed", program))
    } else {
        failed(err.to_string())
    }
}

fn failed(detail: impl Into<String>) -> DeliveryError {
    DeliveryError::Failed {
        mechanism: MECHANISM,
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FileClipboard;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_writes_exact_bytes() {
        let temp = TempDir::new().unwrap();
        let clipboard = FileClipboard::new(temp.path());
        let writer = clipboard.writer(None);

        writer.copy(&Secret::new(" s3cr3t with spaces ".to_string())).await.unwrap();
        assert_eq!(clipboard.contents().unwrap(), b" s3cr3t with spaces ");
    }

    #[tokio::test]
    async fn test_clear_after_interval() {
        let temp = TempDir::new().unwrap();
        let clipboard = FileClipboard::new(temp.path());
        let writer = clipboard.writer(Some(Duration::from_millis(50)));

        writer.copy(&Secret::new("hunter2".to_string())).await.unwrap();
        writer.wait_for_clear().await;
        assert_eq!(clipboard.contents().unwrap(), b"");
    }

    #[tokio::test]
    async fn test_clear_skipped_when_clipboard_changed() {
        let temp = TempDir::new().unwrap();
        let clipboard = FileClipboard::new(temp.path());
        let writer = clipboard.writer(Some(Duration::from_millis(200)));

        writer.copy(&Secret::new("hunter2".to_string())).await.unwrap();
        std::fs::write(&clipboard.path, b"something the user copied").unwrap();
        writer.wait_for_clear().await;
        assert_eq!(clipboard.contents().unwrap(), b"something the user copied");
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let writer = ClipboardWriter::from_commands(argv(&["passrun-no-such-copy"]), None, None, None);
        let err = writer.copy(&Secret::new("x".to_string())).await.unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Failed {
                mechanism: MECHANISM,
                detail: "passrun-no-such-copy is not installed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failing_tool() {
        let writer = ClipboardWriter::from_commands(
            argv(&["sh", "-c", "cat >/dev/null; exit 1"]),
            None,
            None,
            None,
        );
        let err = writer.copy(&Secret::new("x".to_string())).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Failed { .. }));
    }

    #[test]
    fn test_session_defaults_and_overrides() {
        let wayland = ClipboardWriter::for_session(DisplayServer::Wayland, &ClipboardConfig::default());
        assert_eq!(wayland.tool(), "wl-copy");
        assert_eq!(wayland.clear.as_deref(), Some(&argv(&["wl-copy", "--clear"])[..]));

        let x11 = ClipboardWriter::for_session(DisplayServer::X11, &ClipboardConfig::default());
        assert_eq!(x11.copy, argv(&["xclip", "-selection", "clipboard"]));
        assert!(x11.clear.is_none());

        let config = ClipboardConfig {
            copy_command: Some(argv(&["xsel", "-ib"])),
            clear_after_secs: Some(45),
            ..ClipboardConfig::default()
        };
        let custom = ClipboardWriter::for_session(DisplayServer::X11, &config);
        assert_eq!(custom.tool(), "xsel");
        assert_eq!(custom.clear_after(), Some(Duration::from_secs(45)));
    }
}

//! Delivery backends - how a decrypted secret reaches the user
//!
//! Copy always goes through the clipboard. Auto-type depends on the session:
//! xdotool on X11, wtype on Wayland, nothing otherwise. Which typer is usable
//! is decided once at startup by probing; an unusable typer is kept as
//! `Unavailable` with the reason, so the service can refuse a Type action
//! before ever decrypting.

mod clipboard;
mod wayland;
mod x11;

pub use clipboard::ClipboardWriter;
pub use wayland::WaylandTyper;
pub use x11::X11Typer;

use passrun_core::config::{Config, TypingConfig};
use passrun_core::process;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::DeliveryError;
use crate::secret::Secret;
use crate::session::{DisplayServer, SessionContext};

/// A command line: program followed by its arguments
pub type Argv = Vec<String>;

/// One way of handing a secret over
pub enum DeliveryBackend {
    Clipboard(ClipboardWriter),
    X11(X11Typer),
    Wayland(WaylandTyper),
    /// No usable mechanism; the string says why
    Unavailable(String),
}

impl DeliveryBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clipboard(_) => "clipboard",
            Self::X11(_) => "xdotool",
            Self::Wayland(_) => "wtype",
            Self::Unavailable(_) => "unavailable",
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }

    /// Why this backend cannot be used, if it cannot
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Unavailable(reason) => Some(reason),
            _ => None,
        }
    }

    /// Hand the secret over. Bytes are delivered exactly, no trimming.
    pub async fn deliver(&self, secret: &Secret) -> Result<(), DeliveryError> {
        match self {
            Self::Clipboard(writer) => writer.copy(secret).await,
            Self::X11(typer) => typer.type_secret(secret).await,
            Self::Wayland(typer) => typer.type_secret(secret).await,
            Self::Unavailable(reason) => Err(DeliveryError::Unavailable(reason.clone())),
        }
    }

    /// Wait for any background work (clipboard clearing) to finish
    pub async fn settle(&self) {
        if let Self::Clipboard(writer) = self {
            writer.wait_for_clear().await;
        }
    }
}

/// The backends a service delivers through, one per action
pub struct Backends {
    pub copy: DeliveryBackend,
    pub typing: DeliveryBackend,
}

impl Backends {
    /// Pick and probe backends for the session
    pub async fn select(session: &SessionContext, config: &Config) -> Self {
        let display_server = session.display_server();
        let copy =
            DeliveryBackend::Clipboard(ClipboardWriter::for_session(display_server, &config.clipboard));

        let typing = match display_server {
            DisplayServer::X11 => X11Typer::probe(&config.typing)
                .await
                .map(DeliveryBackend::X11),
            DisplayServer::Wayland => WaylandTyper::probe(&config.typing)
                .await
                .map(DeliveryBackend::Wayland),
            DisplayServer::Unknown => Err("no graphical session detected".to_string()),
        }
        .unwrap_or_else(|reason| {
            warn!("Auto-type unavailable: {}", reason);
            DeliveryBackend::Unavailable(reason)
        });

        info!(
            "Session {}: copy via {}, type via {}",
            display_server,
            copy.name(),
            typing.name()
        );
        Self { copy, typing }
    }
}

/// Runs a keystroke tool: waits for focus to settle, then pipes the secret in
struct Keystrokes {
    mechanism: &'static str,
    command: Argv,
    focus_delay: Duration,
    timeout: Duration,
}

impl Keystrokes {
    fn new(mechanism: &'static str, command: Argv, typing: &TypingConfig) -> Self {
        Self {
            mechanism,
            command,
            focus_delay: typing.focus_delay(),
            timeout: typing.timeout(),
        }
    }

    async fn send(&self, extra_args: &[String], secret: &Secret) -> Result<(), DeliveryError> {
        let Some((program, rest)) = self.command.split_first() else {
            return Err(self.failed(format!("{} command is empty", self.mechanism)));
        };
        let mut args = rest.to_vec();
        args.extend_from_slice(extra_args);

        if !self.focus_delay.is_zero() {
            tokio::time::sleep(self.focus_delay).await;
        }

        let output = process::run_with_input(program, &args, Some(secret.as_bytes()), self.timeout)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    self.failed(format!("{} is not installed", program))
                } else {
                    self.failed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("exited with {}", output.status));
            return Err(self.failed(detail));
        }

        debug!("Typed {} characters with {}", secret.expose().chars().count(), self.mechanism);
        Ok(())
    }

    fn failed(&self, detail: String) -> DeliveryError {
        DeliveryError::Failed {
            mechanism: self.mechanism,
            detail,
        }
    }
}

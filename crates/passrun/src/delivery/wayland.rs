//! Auto-type on Wayland through wtype
//!
//! wtype needs the compositor to expose the virtual keyboard protocol. KWin
//! only does so when enabled, so the probe checks for that specifically and
//! tells the user how to turn it on.

use passrun_core::config::TypingConfig;
use passrun_core::process::{self, ProcessError};
use std::time::Duration;
use tracing::debug;

use super::{Argv, Keystrokes};
use crate::error::DeliveryError;
use crate::secret::Secret;

const MECHANISM: &str = "wtype";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shown when the compositor lacks the virtual keyboard protocol
const VIRTUAL_KEYBOARD_HINT: &str = "Wayland virtual keyboard protocol not supported. \
To enable it in KDE Plasma, add VirtualKeyboardEnabled=true under [Wayland] \
in ~/.config/kwinrc and restart the session";

pub struct WaylandTyper {
    keystrokes: Keystrokes,
    keystroke_delay_ms: u64,
}

impl WaylandTyper {
    pub fn new(typing: &TypingConfig) -> Self {
        Self::with_command(vec![MECHANISM.to_string()], typing)
    }

    /// Use a different command line in place of `wtype`
    pub fn with_command(command: Argv, typing: &TypingConfig) -> Self {
        Self {
            keystrokes: Keystrokes::new(MECHANISM, command, typing),
            keystroke_delay_ms: typing.keystroke_delay_ms,
        }
    }

    /// Check that wtype is installed and the compositor accepts it
    pub async fn probe(typing: &TypingConfig) -> Result<Self, String> {
        Self::probe_command(&[MECHANISM.to_string()], typing).await
    }

    async fn probe_command(command: &[String], typing: &TypingConfig) -> Result<Self, String> {
        let Some((program, rest)) = command.split_first() else {
            return Err("wtype command is empty".to_string());
        };
        let mut args = rest.to_vec();
        args.push("-".to_string());

        // Empty stdin: nothing gets typed, but protocol errors still show up
        let output = match process::run_with_input(program, &args, Some(b""), PROBE_TIMEOUT).await {
            Ok(output) => output,
            Err(e) if e.is_not_found() => return Err("wtype is not installed".to_string()),
            Err(ProcessError::TimedOut { .. }) => return Err("wtype command timed out".to_string()),
            Err(e) => return Err(format!("wtype check failed: {}", e)),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if stderr.contains("virtual keyboard protocol") {
            return Err(VIRTUAL_KEYBOARD_HINT.to_string());
        }

        debug!("wtype is available ({})", output.status);
        Ok(Self::with_command(command.to_vec(), typing))
    }

    /// Type the secret into the focused window. The value goes in on stdin.
    pub async fn type_secret(&self, secret: &Secret) -> Result<(), DeliveryError> {
        let args = vec![
            "-d".to_string(),
            self.keystroke_delay_ms.to_string(),
            "-".to_string(),
        ];
        self.keystrokes.send(&args, secret).await
    }
}

//! Auto-type on X11 through xdotool

use passrun_core::config::TypingConfig;
use passrun_core::process;
use std::time::Duration;
use tracing::debug;

use super::{Argv, Keystrokes};
use crate::error::DeliveryError;
use crate::secret::Secret;

const MECHANISM: &str = "xdotool";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct X11Typer {
    keystrokes: Keystrokes,
    keystroke_delay_ms: u64,
    /// Log the focused window's name before typing
    log_target: bool,
}

impl X11Typer {
    pub fn new(typing: &TypingConfig) -> Self {
        Self {
            log_target: true,
            ..Self::with_command(vec![MECHANISM.to_string()], typing)
        }
    }

    /// Use a different command line in place of `xdotool`
    pub fn with_command(command: Argv, typing: &TypingConfig) -> Self {
        Self {
            keystrokes: Keystrokes::new(MECHANISM, command, typing),
            keystroke_delay_ms: typing.keystroke_delay_ms,
            log_target: false,
        }
    }

    /// Check that xdotool is installed and answers
    pub async fn probe(typing: &TypingConfig) -> Result<Self, String> {
        let args = vec!["--version".to_string()];
        match process::run_with_input(MECHANISM, &args, None, PROBE_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                debug!(
                    "xdotool version: {}",
                    String::from_utf8_lossy(&output.stdout).trim()
                );
                Ok(Self::new(typing))
            }
            Ok(output) => Err(format!("xdotool is not working ({})", output.status)),
            Err(e) if e.is_not_found() => Err("xdotool is not installed".to_string()),
            Err(e) => Err(format!("xdotool check failed: {}", e)),
        }
    }

    /// Type the secret into the focused window. The value goes in on stdin.
    pub async fn type_secret(&self, secret: &Secret) -> Result<(), DeliveryError> {
        if self.log_target {
            log_active_window().await;
        }

        let args = vec![
            "type".to_string(),
            "--clearmodifiers".to_string(),
            "--delay".to_string(),
            self.keystroke_delay_ms.to_string(),
            "--file".to_string(),
            "-".to_string(),
        ];
        self.keystrokes.send(&args, secret).await
    }
}

async fn log_active_window() {
    let args = vec!["getactivewindow".to_string(), "getwindowname".to_string()];
    match process::run_with_input(MECHANISM, &args, None, PROBE_TIMEOUT).await {
        Ok(output) if output.status.success() => debug!(
            "Typing into window: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        ),
        Ok(output) => debug!("Could not get active window ({})", output.status),
        Err(e) => debug!("Could not get active window: {}", e),
    }
}

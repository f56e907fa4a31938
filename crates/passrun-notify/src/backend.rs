//! Notification backends

use anyhow::{bail, Result};
use passrun_core::process::{self, command_exists};
use std::time::Duration;
use tracing::info;

/// Bound on one notification tool invocation. A hung notification daemon
/// makes notify-send block on D-Bus.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Notification urgency levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// A notification to display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    /// Notification title
    pub title: String,
    /// Notification message/body
    pub message: String,
    /// Icon name (freedesktop icon theme name or path)
    pub icon: Option<String>,
    /// Urgency level
    pub urgency: Urgency,
    /// Auto-dismiss timeout in milliseconds
    pub expire_ms: Option<u32>,
}

impl Notification {
    /// Create a new notification with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: crate::DEFAULT_TITLE.to_string(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the icon
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Set the urgency
    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Set the auto-dismiss timeout
    pub fn with_expire_ms(mut self, ms: u32) -> Self {
        self.expire_ms = Some(ms);
        self
    }
}

/// Available notification backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// libnotify notify-send
    NotifySend,
    /// KDE kdialog
    Kdialog,
    /// No notification daemon; write a log line instead
    Log,
}

impl Backend {
    /// Detect the best available backend
    pub fn detect() -> Self {
        if command_exists("notify-send") {
            return Self::NotifySend;
        }
        if command_exists("kdialog") {
            return Self::Kdialog;
        }
        Self::Log
    }

    /// Get the name of this backend
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotifySend => "notify-send",
            Self::Kdialog => "kdialog",
            Self::Log => "log",
        }
    }

    /// Send a notification using this backend
    pub async fn send(&self, notification: &Notification) -> Result<()> {
        match self {
            Self::NotifySend => {
                run_sender("notify-send", &Self::notify_send_args(notification), SEND_TIMEOUT).await
            }
            Self::Kdialog => {
                run_sender("kdialog", &Self::kdialog_args(notification), SEND_TIMEOUT).await
            }
            Self::Log => {
                self.send_log(notification);
                Ok(())
            }
        }
    }

    fn notify_send_args(notification: &Notification) -> Vec<String> {
        let mut args = vec![notification.title.clone(), notification.message.clone()];

        if let Some(icon) = &notification.icon {
            args.push(format!("--icon={}", icon));
        }

        if notification.urgency != Urgency::Normal {
            args.push(format!("--urgency={}", notification.urgency.as_str()));
        }

        if let Some(expire) = notification.expire_ms {
            args.push(format!("--expire-time={}", expire));
        }

        args
    }

    fn kdialog_args(notification: &Notification) -> Vec<String> {
        // kdialog takes whole seconds
        let timeout = notification.expire_ms.map(|ms| ms.div_ceil(1000)).unwrap_or(5);

        let mut args = vec![
            "--passivepopup".to_string(),
            notification.message.clone(),
            timeout.to_string(),
            "--title".to_string(),
            notification.title.clone(),
        ];
        if let Some(icon) = &notification.icon {
            args.push("--icon".to_string());
            args.push(icon.clone());
        }
        args
    }

    fn send_log(&self, notification: &Notification) {
        info!(
            urgency = notification.urgency.as_str(),
            "[{}] {}", notification.title, notification.message
        );
    }
}

/// Run a notification tool, giving up after `timeout`
async fn run_sender(program: &str, args: &[String], timeout: Duration) -> Result<()> {
    let output = process::run_with_input(program, args, None, timeout).await?;
    if !output.status.success() {
        bail!("{} failed with status: {}", program, output.status);
    }
    Ok(())
}

//! passrun-notify - Desktop notifications for passrun
//!
//! Reports the outcome of a copy or auto-type to the user. Uses notify-send
//! (libnotify) when present, kdialog on bare KDE installs, and falls back to
//! a log line otherwise. Tool invocations are bounded by [`SEND_TIMEOUT`].

mod backend;

pub use backend::{Backend, Notification, Urgency, SEND_TIMEOUT};

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

/// Default notification title
pub const DEFAULT_TITLE: &str = "Pass Runner";

/// Future returned by [`Notifier::notify`]
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Something that can show a notification to the user
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, notification: &'a Notification) -> NotifyFuture<'a>;
}

impl Notifier for Backend {
    fn notify<'a>(&'a self, notification: &'a Notification) -> NotifyFuture<'a> {
        Box::pin(self.send(notification))
    }
}

//! Error taxonomy
//!
//! None of these are fatal to a running service: store errors degrade to an
//! empty match list, the rest become a failed `Run` plus a notification.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The password store root is missing or unreadable
#[derive(Error, Debug)]
pub enum StoreAccessError {
    #[error("password store not found at {}", .0.display())]
    Missing(PathBuf),

    #[error("password store at {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot read password store at {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a decryption failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptReason {
    #[error("cancelled by user")]
    Cancelled,

    #[error("no usable secret key")]
    WrongKey,

    #[error("not in the password store")]
    NotFound,

    #[error("timed out{}", after_suffix(.after))]
    TimedOut { after: Option<Duration> },

    #[error("{0}")]
    CommandUnavailable(String),

    #[error("decryption command failed: {0}")]
    Failed(String),

    #[error("decrypted value is not valid UTF-8")]
    InvalidOutput,

    #[error("entry is empty")]
    Empty,
}

fn after_suffix(after: &Option<Duration>) -> String {
    match after {
        Some(d) => format!(" after {}s", d.as_secs_f64()),
        None => String::new(),
    }
}

impl DecryptReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::WrongKey => "wrong_key",
            Self::NotFound => "not_found",
            Self::TimedOut { .. } => "timed_out",
            Self::CommandUnavailable(_) => "command_unavailable",
            Self::Failed(_) => "failed",
            Self::InvalidOutput => "invalid_output",
            Self::Empty => "empty",
        }
    }
}

/// An entry could not be turned into its secret
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not decrypt '{entry}': {reason}")]
pub struct DecryptionError {
    pub entry: String,
    pub reason: DecryptReason,
}

impl DecryptionError {
    pub fn new(entry: impl Into<String>, reason: DecryptReason) -> Self {
        Self {
            entry: entry.into(),
            reason,
        }
    }
}

/// A delivery backend could not hand the secret over
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No usable mechanism for this session
    #[error("{0}")]
    Unavailable(String),

    /// The mechanism exists but failed at the OS level
    #[error("{mechanism} failed: {detail}")]
    Failed {
        mechanism: &'static str,
        detail: String,
    },
}

/// Typed failure of one `Run`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("unknown match: {0}")]
    UnknownMatch(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error("auto-type unavailable: {0}")]
    BackendUnavailable(String),

    #[error(transparent)]
    Delivery(DeliveryError),
}

impl From<DeliveryError> for RunError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Unavailable(reason) => Self::BackendUnavailable(reason),
            other => Self::Delivery(other),
        }
    }
}

impl RunError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownMatch(_) => "unknown_match",
            Self::UnknownAction(_) => "unknown_action",
            Self::Decryption(_) => "decryption",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Delivery(_) => "delivery",
        }
    }
}

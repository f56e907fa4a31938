//! passrun - password-store lookups for desktop launchers
//!
//! Indexes a `pass` store, fuzzy-ranks entries against what the user typed,
//! and delivers the chosen secret by clipboard or simulated keystrokes.

pub mod delivery;
pub mod error;
pub mod matcher;
pub mod resolver;
pub mod secret;
pub mod service;
pub mod session;
pub mod store;

#[cfg(test)]
mod testutil;

pub use delivery::{Backends, DeliveryBackend};
pub use error::{DecryptReason, DecryptionError, DeliveryError, RunError, StoreAccessError};
pub use resolver::SecretResolver;
pub use secret::Secret;
pub use service::{Action, ActionInfo, MatchItem, MatchService, ServiceState};
pub use session::{DisplayServer, SessionContext};
pub use store::{Entry, StoreIndex};

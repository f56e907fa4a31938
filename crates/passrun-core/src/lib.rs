//! passrun core - shared functionality for the passrun tools
//!
//! Password-store lookups for desktop launchers: the tools built on this
//! crate index a `pass` store, rank entries and hand secrets to the
//! clipboard or a keystroke typer.

pub mod config;
pub mod paths;
pub mod process;

pub use config::Config;
pub use paths::Paths;

//! passrun-rpc - launcher bridge for passrun
//!
//! Speaks JSON-RPC 2.0 over stdio and translates `Match`, `Actions`, `Run`
//! and `Refresh` calls onto a [`passrun::MatchService`]. A launcher plugin
//! (or a D-Bus shim) spawns this process and keeps it running.

pub mod protocol;
pub mod server;

pub use server::{search_term, RpcServer};

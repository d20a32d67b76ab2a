//! # fkv-server
//!
//! The network-facing half of the project: request tokenizing, command
//! evaluation, RESP encoding, connection handling, and the listener that
//! ties them to a bound socket.

pub mod connection;
pub mod eval;
pub mod listener;
pub mod metrics;
pub mod resp;

pub use connection::{handle_connection, tokenize, Shared};
pub use metrics::{Metrics, MetricsSnapshot};

//! TCP line-echo server with broadcast support.
//!
//! The server echoes every newline-terminated line back to its sender and
//! can broadcast a message to all connected clients. Each module focuses on
//! a concrete responsibility:
//!
//! - [`cli`] parses the command-line interface.
//! - [`session`] owns one accepted connection: the read loop that echoes
//!   lines and the FIFO transmit queue that keeps outbound writes ordered,
//!   whether they come from the echo path or from a broadcaster.
//! - [`registry`] tracks live sessions through non-owning handles, so
//!   broadcasts reach exactly the connections that still exist without
//!   keeping closed ones alive.
//! - [`server`] accepts connections, registers and starts sessions, and
//!   exposes `broadcast` and `stop`.
//!
//! Integration tests use this crate directly to exercise the transmit queue
//! and the wire protocol.

pub mod cli;
pub mod registry;
pub mod server;
pub mod session;

//! symscan-core
//!
//! Core library for recovering symbols from a static image of fixed-width
//! machine code.
//!
//! This crate defines the symbol model, the function boundary scanner, the
//! in-memory symbol database, the signature library, and the text/binary file
//! formats used to persist them. A [`session::Session`] ties these together for
//! frontends (CLI, debugger UIs) that issue one command at a time.
//!
//! The engine never logs: every failure is returned as a typed [`Error`].

pub mod analysis;
pub mod backends;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod services;
pub mod session;

pub use error::{Error, Result};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

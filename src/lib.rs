//! Per-session ConPTY terminal-multiplexer daemon core: pseudo-terminal
//! wrapper, virtual screen, scrollback ring, wire codec, control file, and
//! the daemon/dispatcher tying them together. The CLI front-end in
//! `main.rs` is a thin consumer of this library.

pub mod client;
pub mod codec;
pub mod config;
pub mod daemon;
pub mod error;
pub mod keys;
pub mod pty;
pub mod screen;
pub mod scrollback;
pub mod tee;

pub use config::SessionConfig;
pub use error::{DaemonError, Result};

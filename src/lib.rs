//! # Skiff
//!
//! **Skiff** is a small, single-threaded HTTP file server built directly on
//! Linux readiness and completion primitives.
//!
//! Unlike general-purpose web frameworks, Skiff implements exactly one thing:
//! it accepts TCP connections, reads a minimal HTTP request, classifies the
//! requested path into a resource kind, and streams the matching file back,
//! overlapping disk reads with socket writes so that one slow client never
//! blocks the others.
//!
//! Skiff is built from the ground up on three kernel facilities:
//!
//! - A **level-triggered `epoll` multiplexer** driving every socket
//! - **`sendfile(2)`** for bounded, zero-copy static transfers
//! - **Linux kernel AIO** (`io_submit` and friends) for dynamic transfers,
//!   bridged into the same event loop through an `eventfd` descriptor
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use skiff::{Server, ServerConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let server = Server::bind(ServerConfig::default())?;
//!     server.run()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Server configuration
//! - [`http`] — Request-line extraction and response headers
//! - [`server`] — Event loop, connection state machine, transfers

mod poll;
mod sys;
mod utils;

pub mod config;
pub mod http;
pub mod server;

pub use config::ServerConfig;
pub use server::Server;

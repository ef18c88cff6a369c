//! Sixshooter - single-action revolver mechanism and its simulation host
//!
//! The [`revolver`] module holds the mechanism itself: a synchronous,
//! I/O-free state machine over a hammer, a six-chamber cylinder and an
//! ejector rod. Everything else drives it:
//! - [`session`] runs one mechanism per client on a fixed tick
//! - [`ws`] and [`http`] expose sessions over WebSocket and HTTP
//! - [`config`] reads environment configuration

pub mod app;
pub mod config;
pub mod http;
pub mod revolver;
pub mod session;
pub mod util;
pub mod ws;

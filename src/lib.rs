//! Receiving desk for a regional emergency care network.
//!
//! The [`core`] module holds the referral model, status workflow, analytics
//! and the [`core::ReceivingDesk`] service that the dashboard, the CLI and
//! the HTTP API share.

pub mod cli;
pub mod core;
pub mod utils;

#[cfg(feature = "tui")]
pub mod app;
#[cfg(feature = "tui")]
pub mod screens;

pub mod server;

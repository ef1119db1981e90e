//! Core domain + application logic for the ban-lookup bot.
//!
//! This crate is transport-agnostic: it knows about configuration, the
//! per-community membership stores, and report rendering. Telegram lives in
//! the adapter crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod lookup;
pub mod store;

pub use errors::{Error, Result};

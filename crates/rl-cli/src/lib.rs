//! rider-link: Command-line delivery dispatch client
//!
//! Provides the `rider-link` CLI: sign in, start a delivery search and
//! follow it to its outcome, track deliveries, inspect the connection.

pub mod client;
pub mod commands;
pub mod output;

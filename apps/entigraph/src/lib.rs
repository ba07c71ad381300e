//! # entigraph
//!
//! Library half of the Entigraph binary: configuration, the bundled demo
//! domain, snapshot loading and the CLI. `main.rs` only wires logging and
//! dispatches.

pub mod cli;
pub mod config;
pub mod domain;
pub mod snapshot;

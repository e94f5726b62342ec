//! # affordance
//!
//! Command-line front end for the Affordance resource engine.
//!
//! The binary in `main.rs` only installs logging and calls `cli::execute`.
//! Everything else lives here so it can be tested without spawning a process.

pub mod cli;

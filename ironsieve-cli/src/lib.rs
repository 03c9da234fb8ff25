//! Ironsieve CLI library
//!
//! Argument parsing, command handlers, and output rendering for the
//! `ironsieve` binary. Exposed as a library so handlers can be tested
//! without spawning a process.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

//! Command-line interface for tagbridge.
//!
//! Every subcommand prints one JSON document on stdout carrying the
//! operation's status code; logs go to stderr.

mod commands;

pub use commands::{Cli, Commands, FieldGroup, run_command};

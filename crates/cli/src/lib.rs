//! `annocurate` command-line front end.

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands};
pub use commands::run;
pub use config::CliConfig;

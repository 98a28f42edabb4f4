//! healersctl library - exposes the shell and commands for integration tests

pub mod cli;
pub mod commands;
pub mod errors;
pub mod logging;
pub mod output;
pub mod shell;
pub mod spinner;

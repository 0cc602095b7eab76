//! Subcommand handlers

pub mod config;
pub mod export;
pub mod import;
pub mod init;
pub mod pipeline;
pub mod status;

pub mod archive;
pub mod build;
pub mod commands;
pub mod config;
pub mod configure_log;
pub mod download;
pub mod error;
pub mod http;
pub mod package;
pub mod probe;
pub mod runtime;

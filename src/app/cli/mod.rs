//! Command-line parsing and configuration file loading

pub mod api;
pub mod args;
pub mod config;

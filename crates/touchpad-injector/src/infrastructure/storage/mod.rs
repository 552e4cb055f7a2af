//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML settings file from the XDG config
//! directory, writes it back when settings change, and supplies defaults on
//! first run so the service starts without any file at all.

pub mod config;

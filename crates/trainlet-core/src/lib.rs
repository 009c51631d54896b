//! trainlet-core: Core types for the trainlet job launcher
//!
//! This crate provides the types shared by every trainlet crate:
//! - The immutable job spec and its validation
//! - Job file (TOML) parsing
//! - Time limits, job handles, and exit statuses
//! - Shell quoting for generated scripts
//! - Error handling

pub mod config;
pub mod error;
pub mod job;
pub mod shell;
pub mod time;

pub use config::*;
pub use error::*;
pub use job::*;
pub use shell::shell_quote;
pub use time::*;

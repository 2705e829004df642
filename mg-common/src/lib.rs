//! # MediaGuard Common Library
//!
//! Shared code for the MediaGuard services:
//! - Error types
//! - Configuration loading (TOML file, environment overrides, compiled defaults)

pub mod config;
pub mod error;

pub use error::{Error, Result};

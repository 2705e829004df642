//! Errors raised while bootstrapping a MediaGuard service
//!
//! Request-time failures have their own types in the service crates; this
//! enum only covers configuration loading and the file I/O behind it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing a config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file does not parse, or names an unknown setting value
    #[error("Configuration error: {0}")]
    Config(String),
}

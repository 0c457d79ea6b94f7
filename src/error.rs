//! Error taxonomy. Emulation stepping itself is total — errors originate
//! only at resource loading, the request boundary, and debug-data parsing.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unreadable boot data, incompatible ROM size, overlapping RAM-disk
    /// mappings at construction.
    #[error("config: {0}")]
    Config(String),

    /// Failure to read or write an FDD image or a debug-data file.
    #[error("io: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Malformed request payload or a request issued in an incompatible
    /// status.
    #[error("request: {0}")]
    Request(String),

    /// Breakpoint/watchpoint bookkeeping problems. Reported, not fatal.
    #[error("debugger: {0}")]
    Debugger(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn request(msg: impl Into<String>) -> Self {
        Error::Request(msg.into())
    }
}

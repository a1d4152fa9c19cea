pub mod aof;
pub mod cmd;
pub mod config;
pub mod connection;
pub mod context;
pub mod db;
pub mod frame;
pub mod parse;
pub mod server;
mod shutdown;
pub mod utils;

pub use connection::Connection;
pub use frame::Frame;

use thiserror::Error;

/// Default port the server listens on, used if no port is specified.
pub const DEFAULT_PORT: &str = "6380";

/// Error returned by most functions, composed from each subsystem's own
/// typed error enum.
#[derive(Error, Debug)]
pub enum FerrokvError {
    #[error(transparent)]
    Frame(#[from] frame::FrameError),
    #[error(transparent)]
    Store(#[from] db::StoreError),
    #[error(transparent)]
    Aof(#[from] aof::AofError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl From<&str> for FerrokvError {
    fn from(value: &str) -> Self {
        FerrokvError::Other(value.to_string())
    }
}

impl From<parse::ParseError> for FerrokvError {
    fn from(value: parse::ParseError) -> Self {
        FerrokvError::Other(value.to_string())
    }
}

/// A specialized `Result` type for ferrokv operations.
pub type Result<T> = std::result::Result<T, FerrokvError>;

//! Error types for xcb-binding.

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Main error type for all binding operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not reach the server.
    #[error("Failed to connect to X server: {0}")]
    Connection(String),

    /// Operation attempted on a connection that has been disconnected.
    #[error("Invalid connection")]
    InvalidConnection,

    /// I/O error on the server connection.
    #[error("I/O error on X server connection: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the server, decoded through the error dispatch table.
    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    /// Buffer bounds violation while decoding.
    #[error("Protocol object buffer too short: need {offset}+{length} bytes, have {available}")]
    Range {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// No extension was registered under this key.
    #[error("No extension found for key: {0}")]
    UnknownExtension(String),

    /// The server does not provide the extension.
    #[error("Extension not present on server: {0}")]
    ExtensionNotPresent(String),

    /// The core protocol module was never registered.
    #[error("No core protocol registered")]
    NoCoreRegistered,

    /// Extension registration rejected.
    #[error("Invalid extension: {0}")]
    InvalidExtension(String),

    /// `check()` called on a request that is not void and checked.
    #[error("Request is not void and checked")]
    NotCheckable,

    /// `reply()` called on a void request.
    #[error("Request has no reply")]
    NoReply,

    /// Unknown scalar format character.
    #[error("Invalid format character: {0:?}")]
    InvalidFormat(char),

    /// Typed cast to a type other than the one the object was decoded as.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Display string could not be parsed.
    #[error("Invalid display: {0:?}")]
    InvalidDisplay(String),
}

impl Error {
    /// Build a range error for a window that does not fit.
    pub(crate) fn range(offset: usize, length: usize, available: usize) -> Self {
        Error::Range {
            offset,
            length,
            available,
        }
    }

    /// The server error carried by this error, if any.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

/// Result type alias using Error.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for filecast.

use std::io;
use thiserror::Error;

/// Main error type for filecast operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the socket or the local filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Peer sent something the framing does not allow.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// File name would resolve outside its root directory.
    #[error("invalid file name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// String does not fit the u16 length prefix.
    #[error("string of {len} bytes exceeds the {max} byte limit")]
    StringTooLong { len: usize, max: usize },

    /// Input line is not a command the protocol knows.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// Invalid configuration value.
    #[error("config error: {message}")]
    Config { message: String },
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    /// Returns true if the session cannot continue after this error.
    ///
    /// I/O and protocol errors leave the byte stream in an unknown state;
    /// there is no resynchronization marker, so the session must close.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Protocol { .. })
    }

    /// Returns true if the peer closed the connection.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Result alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Io(io::Error::other("boom")).is_fatal());
        assert!(Error::protocol("bad status").is_fatal());
        assert!(!Error::InvalidName {
            name: "..".into(),
            reason: "parent directory",
        }
        .is_fatal());
        assert!(!Error::StringTooLong { len: 70000, max: 65535 }.is_fatal());
        assert!(!Error::UnknownCommand("dance".into()).is_fatal());
    }

    #[test]
    fn test_disconnect() {
        let eof = Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(eof.is_disconnect());
        assert!(!Error::Io(io::Error::from(io::ErrorKind::PermissionDenied)).is_disconnect());
        assert!(!Error::protocol("x").is_disconnect());
    }
}

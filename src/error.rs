//! Error types for the analytics logger.

use std::fmt;

use thiserror::Error;

/// Step of the connection sequence an attempt failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Connect,
    Handshake,
    Write,
    Read,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Resolve   => "resolve",
            Stage::Connect   => "connect",
            Stage::Handshake => "handshake",
            Stage::Write     => "write",
            Stage::Read      => "read",
        })
    }
}

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS: {0}")]
    Tls(#[from] rustls::Error),

    #[error("TLS DNS name: {0}")]
    TlsDns(#[from] rustls::pki_types::InvalidDnsNameError),

    #[error("Config: {0}")]
    Config(String),

    #[error("TLS verifier: {0}")]
    Verifier(String),

    #[error("flush already in progress")]
    FlushInProgress,

    #[error("resolve {host}: {source}")]
    Resolve {
        host:   String,
        source: std::io::Error,
    },

    #[error("connect: {0}")]
    Connect(std::io::Error),

    #[error("TLS handshake: {0}")]
    Handshake(std::io::Error),

    #[error("write: {0}")]
    Write(std::io::Error),

    #[error("read: {0}")]
    Read(std::io::Error),

    #[error("{0} timed out")]
    Timeout(Stage),

    #[error("collector answered with status {0}")]
    Status(u16),

    #[error("malformed collector response")]
    MalformedResponse,
}

impl LoggerError {
    /// Connection step this error belongs to, if it came from a send attempt.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            LoggerError::Resolve { .. } => Some(Stage::Resolve),
            LoggerError::Connect(_)     => Some(Stage::Connect),
            LoggerError::Handshake(_)   => Some(Stage::Handshake),
            LoggerError::Write(_)       => Some(Stage::Write),
            LoggerError::Read(_)
            | LoggerError::Status(_)
            | LoggerError::MalformedResponse => Some(Stage::Read),
            LoggerError::Timeout(stage) => Some(*stage),
            _ => None,
        }
    }
}

impl From<rustls::client::VerifierBuilderError> for LoggerError {
    fn from(e: rustls::client::VerifierBuilderError) -> Self {
        Self::Verifier(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_errors_report_their_stage() {
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(LoggerError::Connect(refused).stage(), Some(Stage::Connect));
        assert_eq!(LoggerError::Timeout(Stage::Write).stage(), Some(Stage::Write));
        assert_eq!(LoggerError::Status(500).stage(), Some(Stage::Read));
        assert_eq!(LoggerError::FlushInProgress.stage(), None);
    }

    #[test]
    fn timeout_message_names_the_step() {
        assert_eq!(LoggerError::Timeout(Stage::Handshake).to_string(), "handshake timed out");
    }
}

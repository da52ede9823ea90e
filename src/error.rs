use std::fmt;
use thiserror::Error;

/// Failure kinds for I/O after a secure session is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    WriteFailed,
    ReadFailed,
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => f.write_str("write failed"),
            Self::ReadFailed => f.write_str("read failed"),
        }
    }
}

/// Failure kinds for local key and CSR generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    KeyGenFailed,
    CsrGenFailed,
    KeyEncodeFailed,
}

impl fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyGenFailed => f.write_str("key generation failed"),
            Self::CsrGenFailed => f.write_str("CSR generation failed"),
            Self::KeyEncodeFailed => f.write_str("key encoding failed"),
        }
    }
}

/// Flat classification of [`EstError`], handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Handshake,
    Protocol(ProtocolErrorKind),
    Response,
    Crypto(CryptoErrorKind),
    Config,
    InvalidRequest,
}

/// Client-wide error type
#[derive(Error, Debug)]
pub enum EstError {
    #[error("Transport error connecting to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secure session handshake failed: {0}")]
    Handshake(String),

    #[error("Protocol error ({kind}): {detail}")]
    Protocol {
        kind: ProtocolErrorKind,
        detail: String,
    },

    #[error("Invalid response: {0}")]
    Response(String),

    #[error("Crypto error ({kind}): {detail}")]
    Crypto {
        kind: CryptoErrorKind,
        detail: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl EstError {
    pub fn transport<S: Into<String>>(endpoint: S, source: std::io::Error) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn handshake<S: Into<String>>(msg: S) -> Self {
        Self::Handshake(msg.into())
    }

    pub fn write_failed<S: Into<String>>(detail: S) -> Self {
        Self::Protocol {
            kind: ProtocolErrorKind::WriteFailed,
            detail: detail.into(),
        }
    }

    pub fn read_failed<S: Into<String>>(detail: S) -> Self {
        Self::Protocol {
            kind: ProtocolErrorKind::ReadFailed,
            detail: detail.into(),
        }
    }

    pub fn response<S: Into<String>>(msg: S) -> Self {
        Self::Response(msg.into())
    }

    pub fn crypto<S: Into<String>>(kind: CryptoErrorKind, detail: S) -> Self {
        Self::Crypto {
            kind,
            detail: detail.into(),
        }
    }

    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Handshake(_) => ErrorKind::Handshake,
            Self::Protocol { kind, .. } => ErrorKind::Protocol(*kind),
            Self::Response(_) => ErrorKind::Response,
            Self::Crypto { kind, .. } => ErrorKind::Crypto(*kind),
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// Result type alias using EstError
pub type EstResult<T> = Result<T, EstError>;

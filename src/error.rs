//! Error types for imapdb

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The key has no stored message, or its message carries no value.
    #[error("not found")]
    NotFound,

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Failed to create mailbox {mailbox}: {reason}")]
    CreateMailbox { mailbox: String, reason: String },

    #[error("Message parsing error: {0}")]
    Parse(String),

    #[error("Message encoding error: {0}")]
    Encode(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),
}

impl Error {
    /// Whether this error means the key is absent rather than a failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

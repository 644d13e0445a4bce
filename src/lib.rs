//! Key-value store backed by an IMAP mailbox
//!
//! Each entry is one MIME message in a dedicated mailbox: the key is
//! the subject, the value is a single `data.bin` attachment. Writing a
//! key flags and expunges its previous message before appending the
//! new one.
//!
//! ```no_run
//! # async fn demo() -> imapdb::Result<()> {
//! use imapdb::{ImapConfig, ImapDb};
//!
//! let config = ImapConfig::new("imap.example.com:993", "me", "secret")?;
//! let mut db = ImapDb::connect(&config).await?;
//! db.set("greeting", b"hello").await?;
//! assert_eq!(db.get("greeting").await?, b"hello");
//! db.close().await
//! # }
//! ```
//!
//! Install a rustls crypto provider (e.g.
//! `rustls::crypto::ring::default_provider().install_default()`)
//! before connecting.

pub mod codec;
mod config;
mod connection;
mod db;
mod error;
mod session;

pub use config::{DEFAULT_MAILBOX, ImapConfig, Security};
pub use db::ImapDb;
pub use error::{Error, Result};
pub use session::MailboxSession;

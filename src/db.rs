//! Key-value operations over a [`MailboxSession`]

use crate::codec;
use crate::config::ImapConfig;
use crate::error::{Error, Result};
use crate::session::MailboxSession;
use tracing::{debug, info, warn};

/// Key-value store keeping one message per key in an IMAP mailbox.
///
/// Keys are matched exactly: the server's text search narrows the
/// candidates and each candidate's [`codec::label`] must equal the key.
///
/// There is no locking across clients. Two concurrent `set` calls for
/// the same key can both survive; `get` then returns the one with the
/// highest UID, i.e. the last appended.
pub struct ImapDb {
    session: MailboxSession,
}

impl ImapDb {
    /// Connect to the server and select (or create) the mailbox.
    ///
    /// # Errors
    ///
    /// See [`MailboxSession::connect`].
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        let session = MailboxSession::connect(config).await?;
        Ok(Self { session })
    }

    /// Access to the underlying session.
    pub const fn session(&mut self) -> &mut MailboxSession {
        &mut self.session
    }

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no message is stored under `key`
    /// or its attachment is missing or empty, and any session error.
    pub async fn get(&mut self, key: &str) -> Result<Vec<u8>> {
        codec::validate_key(key)?;

        let Some((uid, raw)) = self.entries(key).await?.pop() else {
            return Err(Error::NotFound);
        };

        match codec::decode(&raw)? {
            Some(value) if !value.is_empty() => {
                debug!("GET {:?} -> UID {} ({} bytes)", key, uid, value.len());
                Ok(value)
            }
            _ => {
                debug!("GET {:?} -> UID {} carries no value", key, uid);
                Err(Error::NotFound)
            }
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Previous messages for the key are flagged and expunged before the
    /// new one is appended; a failure at any step is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] or [`Error::Encode`] before touching
    /// the mailbox, otherwise any session error.
    pub async fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let message = codec::encode(key, value)?;

        let previous = self.uids(key).await?;
        if !previous.is_empty() {
            self.session.mark_deleted_and_expunge(&previous).await?;
        }

        self.session.append(&message).await?;
        info!("SET {:?} ({} bytes, replaced {})", key, value.len(), previous.len());
        Ok(())
    }

    /// Remove `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] or any session error.
    pub async fn delete(&mut self, key: &str) -> Result<()> {
        codec::validate_key(key)?;

        let uids = self.uids(key).await?;
        if uids.is_empty() {
            debug!("DELETE {:?}: nothing stored", key);
            return Ok(());
        }

        self.session.mark_deleted_and_expunge(&uids).await?;
        info!("DELETE {:?} ({} message(s))", key, uids.len());
        Ok(())
    }

    /// Log out and release the connection.
    ///
    /// # Errors
    ///
    /// See [`MailboxSession::close`].
    pub async fn close(self) -> Result<()> {
        self.session.close().await
    }

    async fn uids(&mut self, key: &str) -> Result<Vec<u32>> {
        Ok(self
            .entries(key)
            .await?
            .into_iter()
            .map(|(uid, _)| uid)
            .collect())
    }

    /// Messages stored under exactly `key`, ascending by UID.
    async fn entries(&mut self, key: &str) -> Result<Vec<(u32, Vec<u8>)>> {
        self.session.select().await?;

        let candidates = self.session.search_by_key(key).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut exact = Vec::new();
        for (uid, raw) in self.session.fetch_bodies(&candidates).await? {
            match codec::label(&raw) {
                Ok(Some(label)) if label == key => exact.push((uid, raw)),
                Ok(label) => debug!("UID {} holds {:?}, not {:?}", uid, label, key),
                Err(e) => warn!("Skipping UID {}: {}", uid, e),
            }
        }
        Ok(exact)
    }
}

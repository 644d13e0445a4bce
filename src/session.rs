//! An authenticated connection bound to one mailbox
//!
//! Wraps the IMAP primitives the key-value store is built from: UID
//! SEARCH, UID FETCH, APPEND and UID STORE + EXPUNGE. Commands are
//! issued one at a time and each waits for the server's tagged
//! response before returning.

use crate::config::ImapConfig;
use crate::connection::{self, ImapSession};
use crate::error::{Error, Result};
use futures::TryStreamExt;
use tracing::{debug, warn};

/// IMAP session with the key-value mailbox selected.
pub struct MailboxSession {
    session: ImapSession,
    mailbox: String,
    /// Server accepts non-synchronizing literals (RFC 7888 `LITERAL+`).
    literal_plus: bool,
}

impl MailboxSession {
    /// Connect, log in and select `config.mailbox`, creating it when
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, TLS handshake or login
    /// fails, or [`Error::CreateMailbox`] if the mailbox can neither be
    /// selected nor created. The connection is logged out in that case.
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        let mut session = connection::connect(config).await?;

        if let Err(e) = connection::select_or_create(&mut session, &config.mailbox).await {
            session.logout().await.ok();
            return Err(e);
        }

        let literal_plus = match session.capabilities().await {
            Ok(caps) => caps.has_str("LITERAL+"),
            Err(e) => {
                warn!("CAPABILITY failed ({}), assuming no LITERAL+", e);
                false
            }
        };

        Ok(Self {
            session,
            mailbox: config.mailbox.clone(),
            literal_plus,
        })
    }

    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Re-select the mailbox to pick up changes made by other clients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Imap`] if SELECT fails.
    pub async fn select(&mut self) -> Result<()> {
        connection::select(&mut self.session, &self.mailbox).await
    }

    /// UIDs of messages whose text contains `key`, ascending.
    ///
    /// This is the server's substring search: `foo` also matches a
    /// message stored under `foobar`.
    ///
    /// Non-ASCII keys are sent as a `LITERAL+` literal when the server
    /// advertises it. Otherwise they go out as a UTF-8 quoted string,
    /// which IMAP4rev2 and `UTF8=ACCEPT` servers (Dovecot, Gmail) accept
    /// and strict IMAP4rev1 servers may reject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Imap`] if UID SEARCH fails.
    pub async fn search_by_key(&mut self, key: &str) -> Result<Vec<u32>> {
        let query = text_query(key, self.literal_plus);
        let uids = self.session.uid_search(&query).await.map_err(|e| {
            Error::Imap(format!("Failed to search messages in {}: {e}", self.mailbox))
        })?;

        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        debug!("SEARCH {:?} -> {:?}", query, uids);
        Ok(uids)
    }

    /// Raw RFC 5322 bytes of the message with `uid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the server returns no message or
    /// no body for `uid`, or [`Error::Imap`] if UID FETCH fails.
    pub async fn fetch_body(&mut self, uid: u32) -> Result<Vec<u8>> {
        self.fetch_bodies(&[uid])
            .await?
            .into_iter()
            .next()
            .map(|(_, body)| body)
            .ok_or(Error::NotFound)
    }

    /// Raw bytes of every message in `uids` that the server returned,
    /// as `(uid, body)` pairs in ascending UID order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Imap`] if UID FETCH fails.
    pub async fn fetch_bodies(&mut self, uids: &[u32]) -> Result<Vec<(u32, Vec<u8>)>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let messages: Vec<_> = self
            .session
            .uid_fetch(uid_set(uids), "(BODY.PEEK[])")
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;

        let mut bodies = Vec::with_capacity(messages.len());
        for msg in &messages {
            match (msg.uid, msg.body()) {
                (Some(uid), Some(body)) => bodies.push((uid, body.to_vec())),
                (uid, _) => warn!("FETCH response without UID or body ({:?})", uid),
            }
        }
        bodies.sort_unstable_by_key(|(uid, _)| *uid);
        Ok(bodies)
    }

    /// Append a message to the mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Imap`] if the server rejects the APPEND.
    pub async fn append(&mut self, message: &[u8]) -> Result<()> {
        self.session
            .append(&self.mailbox, None, None, message)
            .await
            .map_err(|e| Error::Imap(format!("APPEND to {} failed: {e}", self.mailbox)))?;
        debug!("Appended {} bytes to {}", message.len(), self.mailbox);
        Ok(())
    }

    /// Flag `uids` as `\Deleted` and expunge the mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Imap`] if either UID STORE or EXPUNGE fails.
    pub async fn mark_deleted_and_expunge(&mut self, uids: &[u32]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }

        let _updates: Vec<_> = self
            .session
            .uid_store(uid_set(uids), "+FLAGS.SILENT (\\Deleted)")
            .await
            .map_err(|e| Error::Imap(format!("Failed to flag {uids:?} as deleted: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Store error: {e}")))?;

        let expunged: Vec<_> = self
            .session
            .expunge()
            .await
            .map_err(|e| Error::Imap(format!("Failed to expunge {}: {e}", self.mailbox)))?
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Expunge error: {e}")))?;

        debug!("Expunged {} message(s) from {}", expunged.len(), self.mailbox);
        Ok(())
    }

    /// Log out and drop the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Imap`] if LOGOUT fails.
    pub async fn close(mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| Error::Imap(format!("Logout failed: {e}")))
    }
}

/// Comma-separated UID set, e.g. `3,7,9`.
fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// `TEXT` search criterion for `key`.
///
/// ASCII keys are quoted. Non-ASCII keys declare `CHARSET UTF-8` and
/// travel as a non-synchronizing literal (`{n+}`) when `literal_plus`
/// is set; the query is written in one go, with no `+` continuation.
fn text_query(key: &str, literal_plus: bool) -> String {
    if key.is_ascii() {
        return format!("TEXT {}", quote(key));
    }
    if literal_plus {
        format!("CHARSET UTF-8 TEXT {{{}+}}\r\n{key}", key.len())
    } else {
        format!("CHARSET UTF-8 TEXT {}", quote(key))
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

//! Test data model for the fake IMAP server
//!
//! Provides a builder-style API for constructing server state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("imapdb")
//!         .email(1, false, raw_rfc5322_bytes)
//!     .credentials("testuser", "testpass")
//!     .build();
//! ```
//!
//! The `Mailbox` is shared with the fake IMAP server behind
//! `Arc<Mutex<_>>`: SELECT, SEARCH and FETCH read a snapshot, while
//! CREATE, APPEND, STORE and EXPUNGE mutate it in place, so tests can
//! inspect what the client left behind.

use mail_parser::{MessageParser, PartType};

/// The whole server: a collection of named folders plus the
/// account settings the handlers consult.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
    /// Required `(user, password)`; any login succeeds when `None`.
    pub credentials: Option<(String, String)>,
    /// Whether CREATE is refused.
    pub deny_create: bool,
    /// Whether UID STORE is refused.
    pub deny_store: bool,
    /// Whether EXPUNGE is refused.
    pub deny_expunge: bool,
    /// Whether APPEND is refused.
    pub deny_append: bool,
}

impl Mailbox {
    /// Look up a folder by name (case-sensitive, matching real IMAP).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn get_folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| f.name == name)
    }
}

/// A single IMAP folder.
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub emails: Vec<TestEmail>,
    /// UID the next appended message receives. Never reused, even
    /// after the highest message is expunged.
    pub next_uid: u32,
}

impl Folder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            emails: Vec::new(),
            next_uid: 1,
        }
    }

    /// Store `raw` as a new message and return its UID.
    pub fn append(&mut self, raw: &[u8]) -> u32 {
        let uid = self.next_uid;
        self.next_uid += 1;
        self.emails.push(TestEmail {
            uid,
            seen: false,
            deleted: false,
            raw: raw.to_vec(),
        });
        uid
    }

    /// Messages whose `Subject:` header is exactly `subject`.
    pub fn with_subject(&self, subject: &str) -> Vec<&TestEmail> {
        self.emails
            .iter()
            .filter(|e| e.subject().as_deref() == Some(subject))
            .collect()
    }
}

/// A test email stored in a folder.
///
/// - `uid`: IMAP UID, unique within the folder.
/// - `seen` / `deleted`: the `\Seen` and `\Deleted` flags.
/// - `raw`: the complete RFC 5322 message returned by FETCH BODY[].
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub uid: u32,
    pub seen: bool,
    pub deleted: bool,
    pub raw: Vec<u8>,
}

impl TestEmail {
    /// Decoded `Subject:` header (unfolded, RFC 2047 words expanded).
    pub fn subject(&self) -> Option<String> {
        MessageParser::default()
            .parse(self.raw.as_slice())?
            .subject()
            .map(str::to_string)
    }

    /// Decoded text of every `text/*` body part, as a server indexes
    /// it for `TEXT` searches.
    pub fn body_text(&self) -> Vec<String> {
        let Some(message) = MessageParser::default().parse(self.raw.as_slice()) else {
            return Vec::new();
        };
        message
            .parts
            .iter()
            .filter_map(|part| match &part.body {
                PartType::Text(text) => Some(text.to_string()),
                _ => None,
            })
            .collect()
    }
}

/// Builder for constructing a `Mailbox` step by step.
///
/// Call `.folder(name)` to start a new folder, then chain
/// `.email(uid, seen, raw)` calls to add messages to it.
/// Finish with `.build()` to get the final `Mailbox`.
pub struct MailboxBuilder {
    mailbox: Mailbox,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            mailbox: Mailbox::default(),
        }
    }

    /// Add a new folder. Subsequent `.email()` calls add to this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.mailbox.folders.push(Folder::new(name));
        self
    }

    /// Add an email with a fixed UID to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email(mut self, uid: u32, seen: bool, raw: &[u8]) -> Self {
        let folder = self
            .mailbox
            .folders
            .last_mut()
            .expect("call .folder() before .email()");
        folder.emails.push(TestEmail {
            uid,
            seen,
            deleted: false,
            raw: raw.to_vec(),
        });
        folder.next_uid = folder.next_uid.max(uid + 1);
        self
    }

    /// Only accept LOGIN with these credentials.
    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        self.mailbox.credentials = Some((user.to_string(), password.to_string()));
        self
    }

    /// Refuse every CREATE command.
    pub fn deny_create(mut self) -> Self {
        self.mailbox.deny_create = true;
        self
    }

    /// Refuse every UID STORE command.
    pub fn deny_store(mut self) -> Self {
        self.mailbox.deny_store = true;
        self
    }

    /// Refuse every EXPUNGE command.
    pub fn deny_expunge(mut self) -> Self {
        self.mailbox.deny_expunge = true;
        self
    }

    /// Refuse every APPEND command.
    pub fn deny_append(mut self) -> Self {
        self.mailbox.deny_append = true;
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        self.mailbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_uids() {
        let mut folder = Folder::new("imapdb");
        assert_eq!(folder.append(b"Subject: a\r\n\r\nx"), 1);
        assert_eq!(folder.append(b"Subject: b\r\n\r\nx"), 2);
    }

    #[test]
    fn builder_emails_advance_next_uid() {
        let mailbox = MailboxBuilder::new()
            .folder("imapdb")
            .email(7, false, b"Subject: a\r\n\r\nx")
            .build();
        let mut folder = mailbox.get_folder("imapdb").unwrap().clone();
        assert_eq!(folder.append(b"Subject: b\r\n\r\nx"), 8);
    }

    #[test]
    fn uids_are_not_reused_after_removal() {
        let mut folder = Folder::new("imapdb");
        folder.append(b"Subject: a\r\n\r\nx");
        folder.emails.clear();
        assert_eq!(folder.append(b"Subject: b\r\n\r\nx"), 2);
    }

    #[test]
    fn subject_is_unfolded() {
        let email = TestEmail {
            uid: 1,
            seen: false,
            deleted: false,
            raw: b"From: a@b.com\r\nSubject: long\r\n key\r\n\r\nBody".to_vec(),
        };
        assert_eq!(email.subject().as_deref(), Some("long key"));
    }

    #[test]
    fn subject_and_body_are_decoded() {
        let email = TestEmail {
            uid: 1,
            seen: false,
            deleted: false,
            raw: b"Subject: =?utf-8?q?cl=C3=A9?=\r\n\
                   Content-Type: text/plain; charset=utf-8\r\n\
                   Content-Transfer-Encoding: quoted-printable\r\n\
                   \r\n\
                   cl=C3=A9"
                .to_vec(),
        };
        assert_eq!(email.subject().as_deref(), Some("clé"));
        assert_eq!(email.body_text(), vec!["clé".to_string()]);
    }

    #[test]
    fn with_subject_matches_exactly() {
        let mut folder = Folder::new("imapdb");
        folder.append(b"Subject: foo\r\n\r\nfoo");
        folder.append(b"Subject: foobar\r\n\r\nfoobar");
        assert_eq!(folder.with_subject("foo").len(), 1);
        assert_eq!(folder.with_subject("foobar").len(), 1);
        assert!(folder.with_subject("fo").is_empty());
    }
}

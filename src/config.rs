//! IMAP connection configuration

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Mailbox used when none is configured.
pub const DEFAULT_MAILBOX: &str = "imapdb";

/// How the connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// TLS from the first byte (IMAPS, port 993).
    #[default]
    Tls,
    /// Plain TCP upgraded with STARTTLS (port 143).
    StartTls,
}

impl Security {
    /// Port used when the server address does not name one.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 993,
            Self::StartTls => 143,
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" | "imaps" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            other => Err(Error::Config(format!(
                "Invalid IMAP_SECURITY '{other}' (expected tls or starttls)"
            ))),
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tls => "tls",
            Self::StartTls => "starttls",
        })
    }
}

/// IMAP connection configuration for a key-value mailbox
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Mailbox holding one message per key.
    pub mailbox: String,
    pub security: Security,
    /// Skip certificate verification (self-signed servers).
    pub accept_invalid_certs: bool,
}

impl ImapConfig {
    /// Build a configuration for `server` (`host:port` or bare `host`)
    /// with the default mailbox and implicit TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address cannot be parsed.
    pub fn new(
        server: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let security = Security::default();
        let (host, port) = parse_server(server, security.default_port())?;
        Ok(Self {
            host,
            port,
            username: username.into(),
            password: password.into(),
            mailbox: DEFAULT_MAILBOX.to_string(),
            security,
            accept_invalid_certs: false,
        })
    }

    /// Use `name` instead of the default `imapdb` mailbox.
    #[must_use]
    pub fn with_mailbox(mut self, name: impl Into<String>) -> Self {
        self.mailbox = name.into();
        self
    }

    /// Switch transport security. A port still at the previous mode's
    /// default follows the new mode's default.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        if self.port == self.security.default_port() {
            self.port = security.default_port();
        }
        self.security = security;
        self
    }

    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// `host:port` as dialed.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_SERVER` (`host:port`)
    /// - `IMAP_USER`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_MAILBOX` (default: `imapdb`)
    /// - `IMAP_SECURITY` (`tls` or `starttls`, default: `tls`)
    /// - `IMAP_INSECURE` (`1` or `true` to accept any certificate)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let security = match env::var("IMAP_SECURITY") {
            Ok(s) => s.parse()?,
            Err(_) => Security::default(),
        };
        let server =
            env::var("IMAP_SERVER").map_err(|_| Error::Config("IMAP_SERVER not set".into()))?;
        let (host, port) = parse_server(&server, security.default_port())?;

        Ok(Self {
            host,
            port,
            username: env::var("IMAP_USER")
                .map_err(|_| Error::Config("IMAP_USER not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
            mailbox: env::var("IMAP_MAILBOX").unwrap_or_else(|_| DEFAULT_MAILBOX.to_string()),
            security,
            accept_invalid_certs: env::var("IMAP_INSECURE").is_ok_and(|v| parse_flag(&v)),
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Split `host:port`, `[v6]:port` or a bare host.
fn parse_server(server: &str, default_port: u16) -> Result<(String, u16)> {
    let server = server.trim();
    if server.is_empty() {
        return Err(Error::Config("IMAP server address is empty".into()));
    }

    let parse_port = |p: &str| {
        p.parse::<u16>()
            .map_err(|e| Error::Config(format!("Invalid port in '{server}': {e}")))
    };

    if let Some(rest) = server.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("Unterminated IPv6 address '{server}'")))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => parse_port(p)?,
            None if tail.is_empty() => default_port,
            None => return Err(Error::Config(format!("Invalid address '{server}'"))),
        };
        return Ok((host.to_string(), port));
    }

    match server.rsplit_once(':') {
        // A bare IPv6 literal without brackets has several colons.
        Some((host, _)) if host.contains(':') => Ok((server.to_string(), default_port)),
        Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
        None => Ok((server.to_string(), default_port)),
    }
}

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for reading and writing keys in an IMAP-backed store

use clap::{Parser, Subcommand};
use imapdb::{ImapConfig, ImapDb};
use std::io::Write;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imapdb")]
#[command(
    about = "Key-value store kept in an IMAP mailbox",
    long_about = "Key-value store kept in an IMAP mailbox.\n\n\
                  Connection settings come from IMAP_SERVER (host:port), \
                  IMAP_USER and IMAP_PASSWORD, optionally IMAP_MAILBOX, \
                  IMAP_SECURITY (tls|starttls) and IMAP_INSECURE."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Get a value by key
    Get {
        /// Key to read
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// Key to write
        key: String,

        /// Value to store
        value: String,
    },

    /// Delete a key-value pair by key
    Delete {
        /// Key to remove
        key: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: &Command) -> anyhow::Result<()> {
    let config = ImapConfig::from_env()?;
    let mut db = ImapDb::connect(&config).await?;

    let result = match command {
        Command::Get { key } => cmd_get(&mut db, key).await,
        Command::Set { key, value } => db.set(key, value.as_bytes()).await.map_err(Into::into),
        Command::Delete { key } => db.delete(key).await.map_err(Into::into),
    };

    let closed = db.close().await;
    result?;
    closed?;
    Ok(())
}

async fn cmd_get(db: &mut ImapDb, key: &str) -> anyhow::Result<()> {
    let value = db.get(key).await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&value)?;
    stdout.flush()?;
    Ok(())
}

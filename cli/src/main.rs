//! Fetches unseen messages from an IMAP mailbox, logs their inline text and
//! saves their attachments. Configuration comes from the environment (and
//! `.env`), see [`config::Config`].

mod config;
mod error;
mod fetcher;
mod processor;
mod storage;

use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::fetcher::RunSummary;

async fn fetch_unseen() -> error::Result<RunSummary> {
    let config = Config::from_env()?;
    tracing::info!(server = %config.server, mailbox = %config.mailbox, "Starting");
    fetcher::run(&config).await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match fetch_unseen().await.context("failed to fetch unseen mail") {
        Ok(summary) => {
            tracing::info!(
                unseen = summary.unseen,
                processed = summary.processed,
                texts = summary.texts,
                attachments = summary.attachments,
                bytes_saved = summary.bytes_saved,
                marked_seen = summary.marked_seen,
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

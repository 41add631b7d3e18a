use std::collections::BTreeSet;

use imap::types::{FetchItem, Flag, MailboxStatus, SearchKey, SequenceSet, StoreOperation};
use imap::{Builder, Client, Session};
use secrecy::ExposeSecret;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::processor::{MessageProcessor, PartOutcome};
use crate::storage::AttachmentStore;

/// Totals of one run, logged at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub unseen: usize,
    pub processed: usize,
    pub texts: usize,
    pub attachments: usize,
    pub bytes_saved: usize,
    pub marked_seen: usize,
}

impl RunSummary {
    fn record(&mut self, outcomes: &[PartOutcome]) {
        self.processed += 1;
        for outcome in outcomes {
            match outcome {
                PartOutcome::Text { .. } => self.texts += 1,
                PartOutcome::Attachment { size, .. } => {
                    self.attachments += 1;
                    self.bytes_saved += size;
                }
            }
        }
    }
}

/// Connects to the configured server and handles every unseen message.
pub async fn run(config: &Config) -> Result<RunSummary> {
    let mut builder = Builder::new(&config.server);
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.connect().await?;
    run_with_client(client, config).await
}

/// Logs in on an already greeted connection, processes the mailbox and
/// logs out. Logout is attempted even when processing failed; the
/// processing error is the one returned.
pub async fn run_with_client(client: Client, config: &Config) -> Result<RunSummary> {
    let session = client
        .login(&config.username, config.password.expose_secret())
        .await?;

    let result = process_unseen(&session, config).await;

    match (result, session.logout().await) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(logout)) => {
            tracing::warn!(error = %logout, "Logout after failed run also failed");
            Err(e)
        }
    }
}

async fn process_unseen(session: &Session, config: &Config) -> Result<RunSummary> {
    let status = open_mailbox(session, config).await?;
    tracing::info!(
        mailbox = %config.mailbox,
        exists = status.exists,
        unseen = ?status.unseen,
        "Mailbox opened"
    );

    let uids = session.uid_search(&SearchKey::Unseen).await?;
    tracing::info!("Found {} unseen messages", uids.len());

    let mut summary = RunSummary {
        unseen: uids.len(),
        ..RunSummary::default()
    };
    if uids.is_empty() {
        return Ok(summary);
    }

    let processor = MessageProcessor::new(
        AttachmentStore::new(&config.output_dir, config.on_conflict),
        config.parts,
    );
    let set = SequenceSet::from_uids(&uids);
    let items = [
        FetchItem::Uid,
        FetchItem::Flags,
        FetchItem::Envelope,
        FetchItem::InternalDate,
        FetchItem::BodyPeek(String::new()),
    ];

    let mut pending: BTreeSet<u32> = uids.iter().copied().collect();
    let mut processed = Vec::with_capacity(uids.len());
    let mut messages = session.uid_fetch(&set, &items).await?;

    while let Some(message) = messages.try_next().await? {
        let uid = message.uid();
        if !pending.remove(&uid) {
            tracing::warn!(uid, "Server returned a message that was not requested, skipping");
            continue;
        }
        tracing::info!(uid, date = ?message.internal_date(), "Processing message");

        let outcomes = processor.process(&message).await?;
        summary.record(&outcomes);
        processed.push(uid);
    }

    if let Some(&uid) = pending.first() {
        return Err(Error::MissingMessage(uid));
    }

    if config.mark_seen {
        let set = SequenceSet::from_uids(&processed);
        session
            .uid_store(&set, StoreOperation::Add, &[Flag::Seen])
            .await?;
        summary.marked_seen = processed.len();
        tracing::info!("Marked {} messages as seen", processed.len());
    }

    Ok(summary)
}

/// Checks the mailbox against the server's listing before opening it.
/// Flags can only be stored in a read-write (SELECTed) mailbox.
#[tracing::instrument(skip_all, fields(mailbox = %config.mailbox))]
async fn open_mailbox(session: &Session, config: &Config) -> Result<MailboxStatus> {
    let mailboxes = session.list("", "*").await?;
    for mailbox in &mailboxes {
        tracing::debug!(name = %mailbox.name, attributes = ?mailbox.attributes, "Listed mailbox");
    }

    let found = mailboxes
        .iter()
        .any(|mailbox| mailbox.matches(&config.mailbox) && mailbox.is_selectable());
    if !found {
        return Err(Error::MailboxNotFound(config.mailbox.clone()));
    }

    let status = if config.mark_seen {
        session.select(&config.mailbox).await?
    } else {
        session.examine(&config.mailbox).await?
    };
    Ok(status)
}

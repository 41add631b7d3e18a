use std::path::PathBuf;

use mail_parser::{Addr, Address, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::config::PartSelection;
use crate::error::{Error, Result};
use crate::storage::AttachmentStore;

/// What happened to one handled MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartOutcome {
    Text { text: String },
    Attachment { path: PathBuf, size: usize },
}

/// Turns fetched messages into logged text and saved attachments.
pub struct MessageProcessor {
    store: AttachmentStore,
    parts: PartSelection,
}

impl MessageProcessor {
    pub fn new(store: AttachmentStore, parts: PartSelection) -> Self {
        Self { store, parts }
    }

    #[tracing::instrument(skip_all, fields(uid = message.uid()))]
    pub async fn process(&self, message: &imap::Message) -> Result<Vec<PartOutcome>> {
        let uid = message.uid();
        let raw = message.body().ok_or(Error::MissingBody(uid))?;
        self.process_raw(uid, raw).await
    }

    /// Handles an RFC 822 message. Only the first leaf part is handled
    /// unless the processor was built with [`PartSelection::All`].
    pub async fn process_raw(&self, uid: u32, raw: &[u8]) -> Result<Vec<PartOutcome>> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or(Error::Parse(uid))?;

        log_headers(&parsed);

        let leaves = leaf_parts(&parsed);
        if leaves.is_empty() {
            tracing::info!(uid, "Message has no content parts, skipping");
            return Ok(Vec::new());
        }

        let selected = match self.parts {
            PartSelection::First => &leaves[..1],
            PartSelection::All => &leaves[..],
        };

        let mut outcomes = Vec::with_capacity(selected.len());
        for part in selected {
            let outcome = if is_inline(part) {
                let text = part_text(part);
                tracing::info!("Got text: {}", text);
                PartOutcome::Text { text }
            } else {
                self.save_attachment(uid, part).await?
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn save_attachment(&self, uid: u32, part: &MessagePart<'_>) -> Result<PartOutcome> {
        let filename = match part.attachment_name().filter(|name| !name.trim().is_empty()) {
            Some(name) => name.to_string(),
            None => format!("{}-attachment.{}", uid, mime_to_extension(&mime_type(part))),
        };
        tracing::info!("Got attachment: {}", filename);

        let contents = part.contents();
        let path = self.store.save(&filename, contents).await?;
        tracing::info!("Saved {} bytes into {}", contents.len(), path.display());

        Ok(PartOutcome::Attachment {
            path,
            size: contents.len(),
        })
    }
}

fn log_headers(message: &mail_parser::Message<'_>) {
    if let Some(date) = message.date() {
        tracing::info!("Date: {}", date.to_rfc3339());
    }
    if let Some(from) = message.from() {
        tracing::info!("From: {}", format_addresses(from));
    }
    if let Some(to) = message.to() {
        tracing::info!("To: {}", format_addresses(to));
    }
    if let Some(subject) = message.subject() {
        tracing::info!("Subject: {}", subject);
    }
}

fn format_addresses(address: &Address<'_>) -> String {
    address
        .iter()
        .map(format_address)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_address(addr: &Addr<'_>) -> String {
    match (addr.name(), addr.address()) {
        (Some(name), Some(email)) => format!("{} <{}>", name, email),
        (Some(name), None) => name.to_string(),
        (None, Some(email)) => email.to_string(),
        (None, None) => String::new(),
    }
}

/// Non-multipart parts in depth-first order. Attached messages are leaves.
fn leaf_parts<'a, 'x>(message: &'a mail_parser::Message<'x>) -> Vec<&'a MessagePart<'x>> {
    let mut leaves = Vec::new();
    let mut stack = vec![0usize];

    while let Some(id) = stack.pop() {
        let Some(part) = message.parts.get(id) else {
            continue;
        };
        match &part.body {
            PartType::Multipart(children) => {
                stack.extend(children.iter().rev().map(|child| *child as usize))
            }
            _ => leaves.push(part),
        }
    }

    leaves
}

/// Explicit disposition wins; otherwise text (or untyped) content is inline.
fn is_inline(part: &MessagePart<'_>) -> bool {
    if let Some(disposition) = part.content_disposition() {
        if disposition.ctype().eq_ignore_ascii_case("attachment") {
            return false;
        }
        if disposition.ctype().eq_ignore_ascii_case("inline") {
            return true;
        }
    }
    part.content_type()
        .is_none_or(|ct| ct.ctype().eq_ignore_ascii_case("text"))
}

fn part_text(part: &MessagePart<'_>) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        _ => String::from_utf8_lossy(part.contents()).into_owned(),
    }
}

fn mime_type(part: &MessagePart<'_>) -> String {
    match part.content_type() {
        Some(ct) => match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
            None => ct.ctype().to_string(),
        },
        None => "text/plain".to_string(),
    }
}

fn mime_to_extension(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/gzip" | "application/x-gzip" => "gz",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        "text/calendar" => "ics",
        "message/rfc822" => "eml",
        _ => "bin",
    }
}

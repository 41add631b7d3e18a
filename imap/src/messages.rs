use bytes::Bytes;

use crate::ImapError;
use crate::async_impl::Responses;
use crate::types::{Envelope, FetchData, Flag, UntaggedResponse};

/// One message from a FETCH response.
#[derive(Debug, Clone, Default)]
pub struct Message {
    seq: u32,
    uid: u32,
    flags: Vec<Flag>,
    envelope: Option<Envelope>,
    internal_date: Option<String>,
    size: Option<u32>,
    sections: Vec<(String, Option<Bytes>)>,
}

impl Message {
    /// Builds a message from its FETCH attributes. Returns `None` when the
    /// server left out the UID.
    pub(crate) fn from_fetch(seq: u32, data: Vec<FetchData>) -> Option<Self> {
        let mut uid = None;
        let mut message = Message {
            seq,
            ..Message::default()
        };

        for item in data {
            match item {
                FetchData::Uid(n) => uid = Some(n),
                FetchData::Flags(flags) => message.flags = flags,
                FetchData::Envelope(env) => message.envelope = Some(*env),
                FetchData::InternalDate(date) => message.internal_date = Some(date),
                FetchData::Rfc822Size(n) => message.size = Some(n),
                FetchData::BodySection { section, data, .. } => {
                    message.sections.push((section, data))
                }
                FetchData::Other(_) => {}
            }
        }

        message.uid = uid?;
        Some(message)
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    pub fn is_seen(&self) -> bool {
        self.flags.contains(&Flag::Seen)
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.envelope.as_ref()?.subject.as_deref()
    }

    pub fn internal_date(&self) -> Option<&str> {
        self.internal_date.as_deref()
    }

    pub fn size(&self) -> Option<u32> {
        self.size
    }

    /// Full RFC 822 content (`BODY[]`), if it was fetched and not NIL.
    pub fn body(&self) -> Option<&Bytes> {
        self.body_section("")
    }

    pub fn body_section(&self, section: &str) -> Option<&Bytes> {
        self.sections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(section))
            .and_then(|(_, data)| data.as_ref())
    }
}

/// Messages of a running FETCH, yielded as the server sends them.
pub struct Messages {
    responses: Option<Responses>,
}

impl Messages {
    pub(crate) fn new(responses: Responses) -> Self {
        Self {
            responses: Some(responses),
        }
    }

    pub(crate) fn empty() -> Self {
        Self { responses: None }
    }

    /// Next message, or `None` once the FETCH completed with OK.
    pub async fn try_next(&mut self) -> Result<Option<Message>, ImapError> {
        let Some(responses) = self.responses.as_mut() else {
            return Ok(None);
        };

        while let Some(response) = responses.next().await? {
            match response {
                UntaggedResponse::Fetch { seq, data } => match Message::from_fetch(seq, data) {
                    Some(message) => return Ok(Some(message)),
                    None => tracing::warn!(seq, "FETCH response without UID, skipping"),
                },
                other => tracing::debug!(response = ?other, "Ignoring response during FETCH"),
            }
        }

        Ok(None)
    }
}

use super::common::{Flag, Status};
use super::mailbox::MailboxInfo;
use bytes::Bytes;
use std::fmt::{self, Display};

#[derive(Debug, Clone)]
pub enum Response {
    Tagged {
        tag: String,
        status: Status,
        code: Option<ResponseCode>,
        text: String,
    },
    Untagged(UntaggedResponse),
    Continuation(Option<String>),
}

#[derive(Debug, Clone)]
pub enum UntaggedResponse {
    Status {
        status: Status,
        code: Option<ResponseCode>,
        text: String,
    },
    Capability(Vec<String>),
    List(MailboxInfo),
    Flags(Vec<Flag>),
    Search(Vec<u32>),
    Exists(u32),
    Recent(u32),
    Expunge(u32),
    Fetch { seq: u32, data: Vec<FetchData> },
    /// Anything this client does not interpret, kept verbatim
    Other(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseCode {
    Alert,
    Capability(Vec<String>),
    PermanentFlags(Vec<Flag>),
    ReadOnly,
    ReadWrite,
    TryCreate,
    UidNext(u32),
    UidValidity(u32),
    Unseen(u32),
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub name: Option<String>,
    pub adl: Option<String>,
    pub mailbox: Option<String>,
    pub host: Option<String>,
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mailbox = self.mailbox.as_deref().unwrap_or_default();
        let addr = match &self.host {
            Some(host) => format!("{}@{}", mailbox, host),
            None => mailbox.to_string(),
        };
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, addr),
            None => f.write_str(&addr),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub date: Option<String>,
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchData {
    Envelope(Box<Envelope>),
    Flags(Vec<Flag>),
    InternalDate(String),
    Rfc822Size(u32),
    Uid(u32),
    BodySection {
        section: String,
        origin: Option<u32>,
        /// `None` when the server answered NIL
        data: Option<Bytes>,
    },
    /// An attribute that was skipped, e.g. BODYSTRUCTURE or MODSEQ
    Other(String),
}

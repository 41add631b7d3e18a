use imap::ImapError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Imap(#[from] ImapError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Mailbox {0} not found on the server")]
    MailboxNotFound(String),
    #[error("Server did not return message UID {0}")]
    MissingMessage(u32),
    #[error("Message UID {0} has no body section")]
    MissingBody(u32),
    #[error("Failed to parse message UID {0}")]
    Parse(u32),
}

pub type Result<T> = std::result::Result<T, Error>;

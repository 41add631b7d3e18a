//! Async IMAP4rev1 client over TLS.
//!
//! ```no_run
//! # async fn run() -> Result<(), imap::ImapError> {
//! use imap::types::{FetchItem, SearchKey, SequenceSet};
//!
//! let client = imap::Builder::new("imap.example.com:993").connect().await?;
//! let session = client.login("user", "password").await?;
//! session.examine("INBOX").await?;
//!
//! let uids = session.uid_search(&SearchKey::Unseen).await?;
//! let set = SequenceSet::from_uids(&uids);
//! let mut messages = session.uid_fetch(&set, &[FetchItem::Uid, FetchItem::Envelope]).await?;
//! while let Some(msg) = messages.try_next().await? {
//!     println!("{}: {:?}", msg.uid(), msg.subject());
//! }
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```

mod async_impl;
mod codec;
mod commands;
mod error;
mod format;
mod messages;
mod parser;
mod tls;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use async_impl::{Builder, Client, Connector, Session};
pub use commands::{Command, CommandBuilder};
pub use error::ImapError;
pub use messages::{Message, Messages};
pub use parser::{ParserError, parse_response};

mod command;
mod common;
mod mailbox;
mod response;

pub use command::{FetchItem, SearchKey, SequenceRange, SequenceSet, StoreOperation};
pub(crate) use command::{format_flags, format_list};
pub use common::{Flag, Status};
pub use mailbox::{MailboxInfo, MailboxStatus};
pub use response::{Address, Envelope, FetchData, Response, ResponseCode, UntaggedResponse};

mod builder;
mod connection;
mod session;

pub use builder::{Builder, Connector};
pub(crate) use connection::Responses;
pub use session::{Client, Session};

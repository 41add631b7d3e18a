use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;

use super::connection::{Completion, Connection};
use crate::ImapError;
use crate::codec::ImapCodec;
use crate::commands::CommandBuilder;
use crate::messages::Messages;
use crate::types::{
    FetchItem, Flag, MailboxInfo, MailboxStatus, Response, ResponseCode, SearchKey, SequenceSet,
    Status, StoreOperation, UntaggedResponse,
};

/// A connection that has received the server greeting but is not yet
/// authenticated.
pub struct Client {
    conn: Connection,
    greeting: String,
    pre_authenticated: bool,
}

/// An authenticated connection. Clones share the underlying connection;
/// commands from all clones are sent one at a time in call order.
#[derive(Clone)]
pub struct Session {
    conn: Connection,
    capabilities: Vec<String>,
}

impl Client {
    /// Reads the greeting from an already established stream.
    pub async fn new<S>(stream: S) -> Result<Self, ImapError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_timeout(stream, None).await
    }

    pub async fn with_timeout<S>(stream: S, timeout: Option<Duration>) -> Result<Self, ImapError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let mut framed = FramedRead::new(reader, ImapCodec::new());

        let greeting = match timeout {
            Some(limit) => tokio::time::timeout(limit, framed.next())
                .await
                .map_err(|_| ImapError::Timeout(limit))?,
            None => framed.next().await,
        };
        let greeting = greeting.ok_or(ImapError::ConnectionClosed)??;

        let (text, pre_authenticated) = match greeting {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Ok,
                text,
                ..
            }) => (text, false),
            Response::Untagged(UntaggedResponse::Status {
                status: Status::PreAuth,
                text,
                ..
            }) => (text, true),
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(ImapError::Bye(text)),
            other => return Err(ImapError::Greeting(format!("{:?}", other))),
        };
        tracing::info!(greeting = %text, "Received greeting from server");

        Ok(Self {
            conn: Connection::spawn(framed, writer, timeout),
            greeting: text,
            pre_authenticated,
        })
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Authenticates with LOGIN. A NO or BAD reply is reported as
    /// [`ImapError::Authentication`]; no `Session` exists without success.
    #[tracing::instrument(skip(self, pass))]
    pub async fn login(self, user: &str, pass: &str) -> Result<Session, ImapError> {
        if self.pre_authenticated {
            tracing::info!("Server pre-authenticated the connection, skipping LOGIN");
            return Ok(Session {
                conn: self.conn,
                capabilities: Vec::new(),
            });
        }

        tracing::info!("Attempting IMAP login");

        let command = CommandBuilder::new(&self.conn.next_tag())
            .login()
            .username(user)
            .password(pass)
            .build()?;

        let completion = self
            .conn
            .send(command)
            .await?
            .collect()
            .await
            .map_err(|e| match e {
                ImapError::No { text, .. } | ImapError::Bad { text, .. } => {
                    ImapError::Authentication(text)
                }
                other => other,
            })?;

        tracing::info!("IMAP login successful");

        Ok(Session {
            conn: self.conn,
            capabilities: capabilities_of(&completion),
        })
    }
}

fn capabilities_of(completion: &Completion) -> Vec<String> {
    if let Some(ResponseCode::Capability(caps)) = &completion.code {
        return caps.clone();
    }
    completion
        .untagged
        .iter()
        .find_map(|response| match response {
            UntaggedResponse::Capability(caps) => Some(caps.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

impl Session {
    /// Capabilities announced with the LOGIN reply, if any.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .iter()
            .any(|cap| cap.eq_ignore_ascii_case(name))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, reference: &str, pattern: &str) -> Result<Vec<MailboxInfo>, ImapError> {
        let command = CommandBuilder::new(&self.conn.next_tag()).list(reference, pattern)?;
        let completion = self.conn.send(command).await?.collect().await?;

        let mailboxes: Vec<MailboxInfo> = completion
            .untagged
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::List(info) => Some(info),
                _ => None,
            })
            .collect();

        tracing::debug!(count = mailboxes.len(), "Listed mailboxes");
        Ok(mailboxes)
    }

    /// Opens `mailbox` read-only; message flags are left untouched.
    pub async fn examine(&self, mailbox: &str) -> Result<MailboxStatus, ImapError> {
        self.open(mailbox, true).await
    }

    pub async fn select(&self, mailbox: &str) -> Result<MailboxStatus, ImapError> {
        self.open(mailbox, false).await
    }

    #[tracing::instrument(skip(self))]
    async fn open(&self, mailbox: &str, read_only: bool) -> Result<MailboxStatus, ImapError> {
        let builder = CommandBuilder::new(&self.conn.next_tag());
        let command = if read_only {
            builder.examine(mailbox)?
        } else {
            builder.select(mailbox)?
        };
        let completion = self.conn.send(command).await?.collect().await?;
        let status = MailboxStatus::from_responses(&completion.untagged, completion.code.as_ref());

        tracing::info!(
            exists = status.exists,
            recent = status.recent,
            read_only = status.read_only,
            "{}",
            completion.text
        );
        Ok(status)
    }

    /// Returns the UIDs matching `key`, in server order.
    #[tracing::instrument(skip(self, key), fields(key = %key))]
    pub async fn uid_search(&self, key: &SearchKey) -> Result<Vec<u32>, ImapError> {
        let command = CommandBuilder::new(&self.conn.next_tag()).uid_search(key)?;
        let completion = self.conn.send(command).await?.collect().await?;

        let uids: Vec<u32> = completion
            .untagged
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::Search(uids) => Some(uids),
                _ => None,
            })
            .flatten()
            .collect();

        tracing::debug!(count = uids.len(), "Search completed");
        Ok(uids)
    }

    /// Starts a UID FETCH and returns the messages as they arrive. An empty
    /// set sends nothing and yields no messages.
    #[tracing::instrument(skip(self, uids, items), fields(uids = %uids))]
    pub async fn uid_fetch(
        &self,
        uids: &SequenceSet,
        items: &[FetchItem],
    ) -> Result<Messages, ImapError> {
        if uids.is_empty() {
            tracing::debug!("Empty UID set, nothing to fetch");
            return Ok(Messages::empty());
        }
        let command = CommandBuilder::new(&self.conn.next_tag()).uid_fetch(uids, items)?;
        let responses = self.conn.send(command).await?;
        Ok(Messages::new(responses))
    }

    #[tracing::instrument(skip(self, uids, flags), fields(uids = %uids))]
    pub async fn uid_store(
        &self,
        uids: &SequenceSet,
        operation: StoreOperation,
        flags: &[Flag],
    ) -> Result<(), ImapError> {
        if uids.is_empty() {
            return Ok(());
        }
        let command = CommandBuilder::new(&self.conn.next_tag()).uid_store(uids, operation, flags)?;
        self.conn.send(command).await?.collect().await?;
        Ok(())
    }

    pub async fn noop(&self) -> Result<(), ImapError> {
        let command = CommandBuilder::new(&self.conn.next_tag()).noop();
        self.conn.send(command).await?.collect().await?;
        Ok(())
    }

    /// Sends LOGOUT. The server closing the connection right after its BYE
    /// counts as success.
    #[tracing::instrument(skip(self))]
    pub async fn logout(self) -> Result<(), ImapError> {
        let command = CommandBuilder::new(&self.conn.next_tag()).logout();
        let result = match self.conn.send(command).await {
            Ok(responses) => responses.collect().await.map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) | Err(ImapError::Bye(_)) | Err(ImapError::ConnectionClosed) => {
                tracing::info!("Logged out");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

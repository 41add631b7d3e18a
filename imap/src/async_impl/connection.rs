use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;

use crate::ImapError;
use crate::codec::{ImapCodec, ReadProgress};
use crate::commands::Command;
use crate::types::{Response, ResponseCode, Status, UntaggedResponse};

const REQUEST_BUFFER: usize = 32;
const RESPONSE_BUFFER: usize = 32;

type ResponseResult = Result<Response, ImapError>;

/// Handle to the task that owns the socket. Cloning it shares the
/// connection; the task exits once every handle is gone and no command
/// is left in flight.
#[derive(Clone)]
pub(crate) struct Connection {
    requests: mpsc::Sender<Request>,
    tags: Arc<AtomicU32>,
    timeout: Option<Duration>,
    progress: ReadProgress,
}

struct Request {
    command: Command,
    responses: mpsc::Sender<ResponseResult>,
}

impl Connection {
    pub(crate) fn spawn<S>(
        reader: FramedRead<ReadHalf<S>, ImapCodec>,
        writer: WriteHalf<S>,
        timeout: Option<Duration>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (requests, rx) = mpsc::channel(REQUEST_BUFFER);
        let progress = reader.decoder().progress();
        let driver = Driver {
            reader,
            writer,
            requests: rx,
            queue: VecDeque::new(),
            in_flight: None,
        };
        tokio::spawn(driver.run());

        Self {
            requests,
            tags: Arc::new(AtomicU32::new(0)),
            timeout,
            progress,
        }
    }

    pub(crate) fn next_tag(&self) -> String {
        let n = self.tags.fetch_add(1, Ordering::Relaxed) + 1;
        format!("a{:04}", n)
    }

    /// Queues `command`; its responses arrive through the returned stream
    /// once every earlier command has completed.
    pub(crate) async fn send(&self, command: Command) -> Result<Responses, ImapError> {
        let name = command.name();
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        self.requests
            .send(Request {
                command,
                responses: tx,
            })
            .await
            .map_err(|_| ImapError::ConnectionClosed)?;

        Ok(Responses {
            rx,
            timeout: self.timeout,
            progress: self.progress.clone(),
            command: name,
            bye: None,
            done: false,
            code: None,
            text: String::new(),
        })
    }
}

/// Responses belonging to one command.
pub(crate) struct Responses {
    rx: mpsc::Receiver<ResponseResult>,
    timeout: Option<Duration>,
    progress: ReadProgress,
    command: &'static str,
    bye: Option<String>,
    done: bool,
    code: Option<ResponseCode>,
    text: String,
}

/// Everything a command produced once it completed with OK.
#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) untagged: Vec<UntaggedResponse>,
    pub(crate) code: Option<ResponseCode>,
    pub(crate) text: String,
}

impl Responses {
    /// Next untagged response, or `None` after a tagged OK.
    ///
    /// A tagged NO or BAD becomes an error.
    pub(crate) async fn next(&mut self) -> Result<Option<UntaggedResponse>, ImapError> {
        if self.done {
            return Ok(None);
        }

        loop {
            let received = match self.timeout {
                Some(limit) => self.recv_until_idle(limit).await?,
                None => self.rx.recv().await,
            };

            match received {
                Some(Ok(Response::Untagged(response))) => {
                    if let UntaggedResponse::Status {
                        status: Status::Bye,
                        text,
                        ..
                    } = &response
                    {
                        self.bye = Some(text.clone());
                    }
                    return Ok(Some(response));
                }
                Some(Ok(Response::Tagged {
                    status, code, text, ..
                })) => {
                    self.done = true;
                    return match status {
                        Status::Ok => {
                            self.code = code;
                            self.text = text;
                            Ok(None)
                        }
                        Status::No => Err(ImapError::No {
                            command: self.command.to_string(),
                            text,
                        }),
                        _ => Err(ImapError::Bad {
                            command: self.command.to_string(),
                            text,
                        }),
                    };
                }
                Some(Ok(Response::Continuation(text))) => {
                    tracing::warn!(command = self.command, ?text, "Ignoring continuation request");
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Err(match (e, self.bye.take()) {
                        (ImapError::ConnectionClosed, Some(text)) => ImapError::Bye(text),
                        (e, _) => e,
                    });
                }
                None => {
                    self.done = true;
                    return Err(match self.bye.take() {
                        Some(text) => ImapError::Bye(text),
                        None => ImapError::ConnectionClosed,
                    });
                }
            }
        }
    }

    /// Waits for the next response, failing only after `limit` passes with
    /// no bytes at all arriving from the server. A large literal trickling in
    /// keeps the wait alive.
    async fn recv_until_idle(
        &mut self,
        limit: Duration,
    ) -> Result<Option<ResponseResult>, ImapError> {
        loop {
            let seen = self.progress.bytes();
            match tokio::time::timeout(limit, self.rx.recv()).await {
                Ok(received) => return Ok(received),
                Err(_) if self.progress.bytes() != seen => {
                    tracing::debug!(command = self.command, "Response still arriving");
                }
                Err(_) => return Err(ImapError::Timeout(limit)),
            }
        }
    }

    pub(crate) async fn collect(mut self) -> Result<Completion, ImapError> {
        let mut untagged = Vec::new();
        while let Some(response) = self.next().await? {
            untagged.push(response);
        }
        Ok(Completion {
            untagged,
            code: self.code.take(),
            text: mem::take(&mut self.text),
        })
    }
}

struct InFlight {
    tag: String,
    name: &'static str,
    responses: mpsc::Sender<ResponseResult>,
}

struct Driver<S> {
    reader: FramedRead<ReadHalf<S>, ImapCodec>,
    writer: WriteHalf<S>,
    requests: mpsc::Receiver<Request>,
    queue: VecDeque<Request>,
    in_flight: Option<InFlight>,
}

impl<S> Driver<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn run(mut self) {
        let mut accepting = true;

        loop {
            if self.in_flight.is_none() {
                if let Some(request) = self.queue.pop_front() {
                    if let Err(e) = self.dispatch(request).await {
                        self.fail(e).await;
                        return;
                    }
                    continue;
                }
                if !accepting {
                    tracing::debug!("All handles dropped, stopping connection driver");
                    return;
                }
            }

            tokio::select! {
                request = self.requests.recv(), if accepting => match request {
                    Some(request) => self.queue.push_back(request),
                    None => accepting = false,
                },
                frame = self.reader.next() => match frame {
                    Some(Ok(response)) => self.route(response).await,
                    Some(Err(e)) => {
                        self.fail(e).await;
                        return;
                    }
                    None => {
                        if self.in_flight.is_some() {
                            self.fail(ImapError::ConnectionClosed).await;
                        } else {
                            tracing::debug!("Server closed the connection");
                        }
                        return;
                    }
                },
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<(), ImapError> {
        let Request { command, responses } = request;
        tracing::debug!(tag = command.tag(), command = command.name(), "Sending command");

        // Set before writing so a fast reply is routed correctly
        self.in_flight = Some(InFlight {
            tag: command.tag().to_string(),
            name: command.name(),
            responses,
        });

        self.writer.write_all(&command.to_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn route(&mut self, response: Response) {
        match response {
            Response::Tagged { ref tag, .. } => {
                let tag = tag.clone();
                match self.in_flight.take() {
                    Some(in_flight) if in_flight.tag == tag => {
                        tracing::debug!(tag = %tag, command = in_flight.name, "Command completed");
                        let _ = in_flight.responses.send(Ok(response)).await;
                    }
                    other => {
                        self.in_flight = other;
                        tracing::warn!(tag = %tag, "Tagged response for unknown command");
                    }
                }
            }
            response => match &self.in_flight {
                Some(in_flight) => {
                    // The receiver may be gone; keep reading until the tagged reply
                    let _ = in_flight.responses.send(Ok(response)).await;
                }
                None => match response {
                    Response::Untagged(UntaggedResponse::Status {
                        status: Status::Bye,
                        text,
                        ..
                    }) => tracing::warn!(%text, "Server announced disconnect"),
                    other => tracing::debug!(response = ?other, "Unsolicited response"),
                },
            },
        }
    }

    async fn fail(&mut self, error: ImapError) {
        match self.in_flight.take() {
            Some(in_flight) => {
                tracing::error!(command = in_flight.name, error = %error, "Connection failed");
                let _ = in_flight.responses.send(Err(error)).await;
            }
            None => tracing::error!(error = %error, "Connection failed"),
        }
    }
}

//! A scripted in-memory IMAP server for tests.
//!
//! Each expected command is matched by prefix (tag stripped). Matching
//! commands get their scripted untagged lines followed by the tagged
//! completion; anything else gets a tagged BAD.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

const BUFFER_SIZE: usize = 64 * 1024;

pub struct MockServer {
    greeting: String,
    script: Vec<Exchange>,
}

struct Exchange {
    expect: String,
    untagged: Vec<String>,
    completion: String,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            greeting: "* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] Mock IMAP ready".to_string(),
            script: Vec::new(),
        }
    }

    /// Replaces the greeting line (without CRLF).
    pub fn greeting(mut self, line: &str) -> Self {
        self.greeting = line.to_string();
        self
    }

    /// Scripts the reply to the next command. `untagged` lines are sent
    /// as given plus CRLF, so they may embed literals. `completion` is the
    /// tagged reply without the tag, e.g. `NO Invalid credentials`.
    pub fn expect(mut self, command_prefix: &str, untagged: &[&str], completion: &str) -> Self {
        self.script.push(Exchange {
            expect: command_prefix.to_string(),
            untagged: untagged.iter().map(|line| line.to_string()).collect(),
            completion: completion.to_string(),
        });
        self
    }

    pub fn expect_ok(self, command_prefix: &str, untagged: &[&str]) -> Self {
        let completion = format!("OK {} completed", command_prefix);
        self.expect(command_prefix, untagged, &completion)
    }

    /// Starts serving. The handle resolves to every command received,
    /// without tags, once the client disconnects or logs out.
    pub fn start(self) -> (DuplexStream, JoinHandle<Vec<String>>) {
        let (client, server) = tokio::io::duplex(BUFFER_SIZE);
        let handle = tokio::spawn(self.serve(server));
        (client, handle)
    }

    async fn serve(self, stream: DuplexStream) -> Vec<String> {
        let (read, mut write) = tokio::io::split(stream);
        let mut reader = BufReader::new(read);
        let mut received = Vec::new();

        let greeting = format!("{}\r\n", self.greeting);
        if write.write_all(greeting.as_bytes()).await.is_err() {
            return received;
        }

        let mut script = self.script.into_iter();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }

            let trimmed = line.trim_end_matches(['\r', '\n']);
            let (tag, command) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
            received.push(command.to_string());

            let reply = match script.next() {
                Some(exchange) if command.starts_with(&exchange.expect) => {
                    let mut reply = String::new();
                    for untagged in &exchange.untagged {
                        reply.push_str(untagged);
                        reply.push_str("\r\n");
                    }
                    reply.push_str(&format!("{} {}\r\n", tag, exchange.completion));
                    reply
                }
                Some(exchange) => format!("{} BAD expected {}\r\n", tag, exchange.expect),
                None => format!("{} BAD unexpected command\r\n", tag),
            };

            if write.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
            if command.eq_ignore_ascii_case("LOGOUT") {
                break;
            }
        }

        received
    }
}

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::session::Client;
use crate::ImapError;
use crate::tls::{create_tls_config, parse_server_name};

pub struct Builder {
    addr: String,
    timeout: Option<Duration>,
}

pub struct Connector {
    addr: String,
    timeout: Option<Duration>,
}

impl Builder {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            timeout: None,
        }
    }

    /// Bounds connecting, the greeting and every later server reply.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Connector {
        Connector {
            addr: self.addr,
            timeout: self.timeout,
        }
    }

    pub async fn connect(self) -> Result<Client, ImapError> {
        self.build().connect().await
    }
}

impl Connector {
    #[tracing::instrument(skip(self), fields(addr = %self.addr))]
    pub async fn connect(self) -> Result<Client, ImapError> {
        tracing::info!("Connecting to IMAP server");

        let server_name = parse_server_name(&self.addr)?;
        let connector = TlsConnector::from(create_tls_config());

        let connect = async {
            let sock = TcpStream::connect(&self.addr)
                .await
                .map_err(|e| ImapError::ConnectionFailed(format!("{}: {}", self.addr, e)))?;

            // The greeting read drives the handshake to completion
            let stream = connector
                .connect(server_name, sock)
                .await
                .map_err(tls_error)?;

            Client::with_timeout(stream, self.timeout).await
        };

        let client = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| ImapError::Timeout(limit))??,
            None => connect.await?,
        };

        tracing::info!("TLS connection established");

        Ok(client)
    }
}

/// tokio-rustls reports handshake failures as io errors wrapping the
/// rustls error.
fn tls_error(e: io::Error) -> ImapError {
    match e.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()) {
        Some(tls) => ImapError::Tls(tls.clone()),
        None => ImapError::Io(e),
    }
}

use std::time::Duration;

use rustls::pki_types::InvalidDnsNameError;
use thiserror::Error;

use crate::parser::ParserError;

#[derive(Error, Debug)]
pub enum ImapError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Invalid address format, expected host:port: {0}")]
    InvalidAddressFormat(String),
    #[error("DNS name error: {0}")]
    DnsName(#[from] InvalidDnsNameError),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected greeting from server: {0}")]
    Greeting(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("{command} rejected by server: {text}")]
    No { command: String, text: String },
    #[error("{command} reported as invalid by server: {text}")]
    Bad { command: String, text: String },
    #[error("Server closed the connection: {0}")]
    Bye(String),
    #[error(transparent)]
    Parse(#[from] ParserError),
    #[error("Response line exceeded maximum length of {0} bytes")]
    LineTooLong(usize),
    #[error("Literal of {0} bytes exceeds the allowed size")]
    LiteralTooLarge(usize),
    #[error("Invalid argument: {0}")]
    Validate(String),
    #[error("No response from server within {0:?}")]
    Timeout(Duration),
}

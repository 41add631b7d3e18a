use crate::ImapError;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;

pub fn create_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.into(),
    };

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    // Honours SSLKEYLOGFILE so debug builds can be inspected with Wireshark
    if cfg!(debug_assertions) {
        config.key_log = Arc::new(rustls::KeyLogFile::new());
    }

    Arc::new(config)
}

/// Extracts the TLS server name from a `host:port` address.
pub fn parse_server_name(addr: &str) -> Result<ServerName<'static>, ImapError> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ImapError::InvalidAddressFormat(addr.into()))?;

    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(ImapError::InvalidAddressFormat(addr.into()));
    }

    // Bracketed IPv6 literals, e.g. [::1]:993
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let server_name = ServerName::try_from(host.to_string())?;

    Ok(server_name)
}

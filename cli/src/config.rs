use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::storage::CollisionPolicy;

const DEFAULT_MAILBOX: &str = "INBOX";

// Each required setting is also read under the name older `.env` files use.
const SERVER_VARS: &[&str] = &["IMAP_SERVER", "DAIL_OUTLOOK"];
const USERNAME_VARS: &[&str] = &["IMAP_EMAIL", "USERNAME_MAIL"];
const PASSWORD_VARS: &[&str] = &["IMAP_PASSWORD", "PASSWORD_MAIL"];
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Environment variable {0} is set but empty")]
    Empty(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Which leaf parts of a message are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartSelection {
    #[default]
    First,
    All,
}

impl FromStr for PartSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(PartSelection::First),
            "all" => Ok(PartSelection::All),
            other => Err(format!("expected `first` or `all`, got `{}`", other)),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    /// `host:port` of the IMAPS endpoint
    pub server: String,
    pub username: String,
    pub password: SecretString,
    pub mailbox: String,
    /// `None` disables the connect and response timeout
    pub timeout: Option<Duration>,
    pub output_dir: PathBuf,
    pub parts: PartSelection,
    pub on_conflict: CollisionPolicy,
    pub mark_seen: bool,
}

impl Config {
    /// Reads the process environment after loading `.env` from the working
    /// directory, if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = required_any(&lookup, SERVER_VARS)?;
        validate_server(&server)?;

        let timeout_secs: u64 = parse_or(&lookup, "IMAP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            server,
            username: required_any(&lookup, USERNAME_VARS)?,
            password: SecretString::from(required_any(&lookup, PASSWORD_VARS)?),
            mailbox: optional(&lookup, "IMAP_MAILBOX")?
                .unwrap_or_else(|| DEFAULT_MAILBOX.to_string()),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            output_dir: optional(&lookup, "MAILFETCH_OUTPUT_DIR")?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            parts: parse_or(&lookup, "MAILFETCH_PARTS", PartSelection::default())?,
            on_conflict: parse_or(&lookup, "MAILFETCH_ON_CONFLICT", CollisionPolicy::default())?,
            mark_seen: match optional(&lookup, "MAILFETCH_MARK_SEEN")? {
                Some(value) => parse_bool("MAILFETCH_MARK_SEEN", &value)?,
                None => false,
            },
        })
    }
}

/// Value of the first of `names` that is set. Missing reports the first name.
fn required_any<F>(lookup: &F, names: &'static [&'static str]) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for &name in names {
        if let Some(value) = optional(lookup, name)? {
            return Ok(value);
        }
    }
    Err(ConfigError::Missing(names[0]))
}

/// An unset variable is `None`; a set but blank one is an error.
fn optional<F>(lookup: &F, name: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(name)),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, name)? {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got `{}`", other),
        }),
    }
}

fn validate_server(server: &str) -> Result<(), ConfigError> {
    let valid = server
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name: "IMAP_SERVER",
            reason: format!("expected host:port, got `{}`", server),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("IMAP_SERVER", "imap.example.com:993"),
        ("IMAP_EMAIL", "me@example.com"),
        ("IMAP_PASSWORD", "hunter2"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.server, "imap.example.com:993");
        assert_eq!(config.username, "me@example.com");
        assert_eq!(config.password.expose_secret(), "hunter2");
        assert_eq!(config.mailbox, "INBOX");
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.parts, PartSelection::First);
        assert_eq!(config.on_conflict, CollisionPolicy::Rename);
        assert!(!config.mark_seen);
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("IMAP_MAILBOX", "Receipts"),
            ("IMAP_TIMEOUT_SECS", "0"),
            ("MAILFETCH_OUTPUT_DIR", "/tmp/mail"),
            ("MAILFETCH_PARTS", "ALL"),
            ("MAILFETCH_ON_CONFLICT", "overwrite"),
            ("MAILFETCH_MARK_SEEN", "yes"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.mailbox, "Receipts");
        assert_eq!(config.timeout, None);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/mail"));
        assert_eq!(config.parts, PartSelection::All);
        assert_eq!(config.on_conflict, CollisionPolicy::Overwrite);
        assert!(config.mark_seen);
    }

    #[test]
    fn test_missing_and_empty() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("IMAP_PASSWORD")));

        let mut vars = REQUIRED.to_vec();
        vars[1] = ("IMAP_EMAIL", "  ");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Empty("IMAP_EMAIL")));
    }

    #[test]
    fn test_legacy_variable_names() {
        let vars = [
            ("DAIL_OUTLOOK", "outlook.office365.com:993"),
            ("USERNAME_MAIL", "me@example.com"),
            ("PASSWORD_MAIL", "hunter2"),
        ];
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.server, "outlook.office365.com:993");
        assert_eq!(config.username, "me@example.com");
        assert_eq!(config.password.expose_secret(), "hunter2");

        let mut both = REQUIRED.to_vec();
        both.extend(vars);
        let config = Config::from_lookup(lookup(&both)).unwrap();
        assert_eq!(config.server, "imap.example.com:993");
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars[0] = ("IMAP_SERVER", "imap.example.com");
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid { name: "IMAP_SERVER", .. })
        ));

        for (name, value) in [
            ("IMAP_TIMEOUT_SECS", "soon"),
            ("MAILFETCH_PARTS", "some"),
            ("MAILFETCH_ON_CONFLICT", "merge"),
            ("MAILFETCH_MARK_SEEN", "maybe"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((name, value));
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { name: n, .. } if n == name),
                "{} = {} should be rejected",
                name,
                value
            );
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}

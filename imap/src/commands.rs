use std::fmt;

use crate::ImapError;
use crate::format::{quote_astring, validate_str};
use crate::types::{
    FetchItem, Flag, SearchKey, SequenceSet, StoreOperation, format_flags, format_list,
};

/// A fully formatted, tagged command line.
#[derive(Clone)]
pub struct Command {
    tag: String,
    name: &'static str,
    line: String,
}

impl Command {
    fn new(tag: String, name: &'static str, args: Option<String>) -> Self {
        let line = match args {
            Some(args) => format!("{} {} {}", tag, name, args),
            None => format!("{} {}", tag, name),
        };
        Self { tag, name, line }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Command name without arguments, e.g. `UID FETCH`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn as_string(&self) -> &str {
        &self.line
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.line.len() + 2);
        bytes.extend_from_slice(self.line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        bytes
    }
}

// Arguments may carry credentials, so only the tag and name are shown
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub struct CommandBuilder {
    tag: String,
}

impl CommandBuilder {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
        }
    }

    pub fn login(self) -> LoginCommandBuilder<NoUsername, NoPassword> {
        LoginCommandBuilder::new(&self.tag)
    }

    /// `LIST reference pattern`
    pub fn list(self, reference: &str, pattern: &str) -> Result<Command, ImapError> {
        let args = format!(
            "{} {}",
            quote_astring(validate_str(reference)?),
            quote_astring(validate_str(pattern)?)
        );
        Ok(Command::new(self.tag, "LIST", Some(args)))
    }

    pub fn select(self, mailbox: &str) -> Result<Command, ImapError> {
        let args = quote_astring(validate_str(mailbox)?);
        Ok(Command::new(self.tag, "SELECT", Some(args)))
    }

    pub fn examine(self, mailbox: &str) -> Result<Command, ImapError> {
        let args = quote_astring(validate_str(mailbox)?);
        Ok(Command::new(self.tag, "EXAMINE", Some(args)))
    }

    pub fn uid_search(self, key: &SearchKey) -> Result<Command, ImapError> {
        let criteria = key.to_string();
        validate_str(&criteria)?;
        Ok(Command::new(self.tag, "UID SEARCH", Some(criteria)))
    }

    pub fn uid_fetch(self, uids: &SequenceSet, items: &[FetchItem]) -> Result<Command, ImapError> {
        if uids.is_empty() {
            return Err(ImapError::Validate("empty UID set".to_string()));
        }
        if items.is_empty() {
            return Err(ImapError::Validate("no fetch items".to_string()));
        }
        let args = format!("{} {}", uids, format_list(items));
        Ok(Command::new(self.tag, "UID FETCH", Some(args)))
    }

    /// `UID STORE set +FLAGS.SILENT (...)`; the server answers with no
    /// per-message FETCH responses.
    pub fn uid_store(
        self,
        uids: &SequenceSet,
        operation: StoreOperation,
        flags: &[Flag],
    ) -> Result<Command, ImapError> {
        if uids.is_empty() {
            return Err(ImapError::Validate("empty UID set".to_string()));
        }
        let args = format!(
            "{} {} {}",
            uids,
            operation.as_silent_item(),
            format_flags(flags)
        );
        Ok(Command::new(self.tag, "UID STORE", Some(args)))
    }

    pub fn noop(self) -> Command {
        Command::new(self.tag, "NOOP", None)
    }

    pub fn logout(self) -> Command {
        Command::new(self.tag, "LOGOUT", None)
    }
}

pub struct NoUsername;
pub struct HasUsername(String);
pub struct NoPassword;
pub struct HasPassword(String);

pub struct LoginCommandBuilder<U = NoUsername, P = NoPassword> {
    tag: String,
    username: U,
    password: P,
}

impl LoginCommandBuilder<NoUsername, NoPassword> {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            username: NoUsername,
            password: NoPassword,
        }
    }
}

impl<P> LoginCommandBuilder<NoUsername, P> {
    pub fn username(self, username: &str) -> LoginCommandBuilder<HasUsername, P> {
        LoginCommandBuilder {
            tag: self.tag,
            username: HasUsername(username.to_string()),
            password: self.password,
        }
    }
}

impl<U> LoginCommandBuilder<U, NoPassword> {
    pub fn password(self, password: &str) -> LoginCommandBuilder<U, HasPassword> {
        LoginCommandBuilder {
            tag: self.tag,
            username: self.username,
            password: HasPassword(password.to_string()),
        }
    }
}

impl LoginCommandBuilder<HasUsername, HasPassword> {
    pub fn build(self) -> Result<Command, ImapError> {
        let args = format!(
            "{} {}",
            quote_astring(validate_str(&self.username.0)?),
            quote_astring(validate_str(&self.password.0)?)
        );
        Ok(Command::new(self.tag, "LOGIN", Some(args)))
    }
}

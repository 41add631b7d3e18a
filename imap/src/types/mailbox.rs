use super::common::Flag;
use super::response::{ResponseCode, UntaggedResponse};

/// One entry of a LIST response.
#[derive(Debug, Clone, PartialEq)]
pub struct MailboxInfo {
    pub attributes: Vec<String>,
    pub delimiter: Option<String>,
    pub name: String,
}

impl MailboxInfo {
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case("\\Noselect") || a.eq_ignore_ascii_case("\\NonExistent"))
    }

    /// Compares mailbox names; INBOX is case-insensitive per RFC 3501 § 5.1.
    pub fn matches(&self, name: &str) -> bool {
        if name.eq_ignore_ascii_case("INBOX") {
            self.name.eq_ignore_ascii_case("INBOX")
        } else {
            self.name == name
        }
    }
}

/// Mailbox status information returned by SELECT/EXAMINE
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailboxStatus {
    pub exists: u32,
    pub recent: u32,
    pub unseen: Option<u32>,
    pub uid_next: Option<u32>,
    pub uid_validity: Option<u32>,
    pub flags: Vec<Flag>,
    pub permanent_flags: Vec<Flag>,
    pub read_only: bool,
}

impl MailboxStatus {
    pub(crate) fn from_responses(
        untagged: &[UntaggedResponse],
        completion: Option<&ResponseCode>,
    ) -> Self {
        let mut status = MailboxStatus::default();

        for response in untagged {
            match response {
                UntaggedResponse::Exists(n) => status.exists = *n,
                UntaggedResponse::Recent(n) => status.recent = *n,
                UntaggedResponse::Flags(flags) => status.flags = flags.clone(),
                UntaggedResponse::Status { code: Some(code), .. } => status.apply(code),
                _ => {}
            }
        }

        if let Some(code) = completion {
            status.apply(code);
        }

        status
    }

    fn apply(&mut self, code: &ResponseCode) {
        match code {
            ResponseCode::Unseen(n) => self.unseen = Some(*n),
            ResponseCode::UidNext(n) => self.uid_next = Some(*n),
            ResponseCode::UidValidity(n) => self.uid_validity = Some(*n),
            ResponseCode::PermanentFlags(flags) => self.permanent_flags = flags.clone(),
            ResponseCode::ReadOnly => self.read_only = true,
            ResponseCode::ReadWrite => self.read_only = false,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;

    #[test]
    fn test_mailbox_status_from_responses() {
        let untagged = vec![
            UntaggedResponse::Flags(vec![
                Flag::Keyword("$Test1".to_string()),
                Flag::Keyword("$Test2".to_string()),
                Flag::Recent,
            ]),
            UntaggedResponse::Exists(2),
            UntaggedResponse::Recent(2),
            UntaggedResponse::Status {
                status: Status::Ok,
                code: Some(ResponseCode::UidValidity(1234567890)),
                text: "UIDs valid".to_string(),
            },
            UntaggedResponse::Status {
                status: Status::Ok,
                code: Some(ResponseCode::UidNext(3)),
                text: "Predicted next UID".to_string(),
            },
            UntaggedResponse::Status {
                status: Status::Ok,
                code: Some(ResponseCode::Unseen(2)),
                text: "First unseen".to_string(),
            },
            UntaggedResponse::Status {
                status: Status::Ok,
                code: Some(ResponseCode::PermanentFlags(vec![
                    Flag::Keyword("$Test1".to_string()),
                    Flag::Keyword("$Test2".to_string()),
                ])),
                text: "Limited".to_string(),
            },
        ];

        let status = MailboxStatus::from_responses(&untagged, Some(&ResponseCode::ReadOnly));

        assert_eq!(status.exists, 2);
        assert_eq!(status.recent, 2);
        assert_eq!(status.uid_next, Some(3));
        assert_eq!(status.uid_validity, Some(1234567890));
        assert_eq!(status.unseen, Some(2));
        assert_eq!(status.flags.len(), 3);
        assert_eq!(status.permanent_flags.len(), 2);
        assert!(status.read_only);
    }

    #[test]
    fn test_mailbox_info_matches() {
        let inbox = MailboxInfo {
            attributes: vec!["\\HasNoChildren".into()],
            delimiter: Some("/".into()),
            name: "INBOX".into(),
        };
        assert!(inbox.matches("inbox"));
        assert!(inbox.is_selectable());

        let archive = MailboxInfo {
            attributes: vec!["\\Noselect".into()],
            delimiter: Some("/".into()),
            name: "Archive".into(),
        };
        assert!(archive.matches("Archive"));
        assert!(!archive.matches("archive"));
        assert!(!archive.is_selectable());
    }
}

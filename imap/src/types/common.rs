use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    /// `\*` in PERMANENTFLAGS: the client may create new keywords
    MayCreate,
    Keyword(String),
}

impl Flag {
    pub fn from_bytes(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        if !text.starts_with('\\') {
            return Flag::Keyword(text.into_owned());
        }
        match text.to_ascii_lowercase().as_str() {
            "\\seen" => Flag::Seen,
            "\\answered" => Flag::Answered,
            "\\flagged" => Flag::Flagged,
            "\\deleted" => Flag::Deleted,
            "\\draft" => Flag::Draft,
            "\\recent" => Flag::Recent,
            "\\*" => Flag::MayCreate,
            _ => Flag::Keyword(text.into_owned()),
        }
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flag::Seen => f.write_str("\\Seen"),
            Flag::Answered => f.write_str("\\Answered"),
            Flag::Flagged => f.write_str("\\Flagged"),
            Flag::Deleted => f.write_str("\\Deleted"),
            Flag::Draft => f.write_str("\\Draft"),
            Flag::Recent => f.write_str("\\Recent"),
            Flag::MayCreate => f.write_str("\\*"),
            Flag::Keyword(k) => f.write_str(k),
        }
    }
}

// RFC 3501 § 7.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    // Can be tagged or untagged
    Ok,
    No,
    Bad,
    // Always untagged
    PreAuth,
    Bye,
}

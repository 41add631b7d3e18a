use crate::types::Flag;
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceRange {
    Single(u32),
    Range(u32, u32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSet {
    pub(crate) parts: Vec<SequenceRange>,
}

impl SequenceSet {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Builds the shortest set covering `uids`, collapsing runs into ranges.
    pub fn from_uids(uids: &[u32]) -> Self {
        let mut sorted = uids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut set = Self::new();
        let mut iter = sorted.into_iter();
        let Some(first) = iter.next() else {
            return set;
        };

        let (mut start, mut end) = (first, first);
        for uid in iter {
            if end.checked_add(1) == Some(uid) {
                end = uid;
                continue;
            }
            set = set.add_run(start, end);
            start = uid;
            end = uid;
        }
        set.add_run(start, end)
    }

    fn add_run(mut self, start: u32, end: u32) -> Self {
        self.parts.push(if start == end {
            SequenceRange::Single(start)
        } else {
            SequenceRange::Range(start, end)
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceRange::Single(n) => write!(f, "{}", n),
            SequenceRange::Range(start, end) => write!(f, "{}:{}", start, end),
        }
    }
}

impl Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.parts {
            if !first {
                f.write_str(",")?;
            } else {
                first = false;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// Criteria for UID SEARCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey {
    /// Messages without `\Seen`
    Unseen,
}

impl Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchKey::Unseen => f.write_str("UNSEEN"),
        }
    }
}

/// Message data items requested by FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    Uid,
    Flags,
    Envelope,
    InternalDate,
    Rfc822Size,
    /// `BODY.PEEK[section]`: does not set `\Seen`
    BodyPeek(String),
    /// `BODY[section]`: sets `\Seen` on read-write mailboxes
    Body(String),
}

impl Display for FetchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchItem::Uid => f.write_str("UID"),
            FetchItem::Flags => f.write_str("FLAGS"),
            FetchItem::Envelope => f.write_str("ENVELOPE"),
            FetchItem::InternalDate => f.write_str("INTERNALDATE"),
            FetchItem::Rfc822Size => f.write_str("RFC822.SIZE"),
            FetchItem::BodyPeek(section) => write!(f, "BODY.PEEK[{}]", section),
            FetchItem::Body(section) => write!(f, "BODY[{}]", section),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Add,
    Remove,
    Replace,
}

impl StoreOperation {
    pub(crate) fn as_silent_item(self) -> &'static str {
        match self {
            StoreOperation::Add => "+FLAGS.SILENT",
            StoreOperation::Remove => "-FLAGS.SILENT",
            StoreOperation::Replace => "FLAGS.SILENT",
        }
    }
}

pub(crate) fn format_list<T: Display>(items: &[T]) -> String {
    let inner: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("({})", inner.join(" "))
}

pub(crate) fn format_flags(flags: &[Flag]) -> String {
    format_list(flags)
}

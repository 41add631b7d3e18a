use nom::{
    Parser,
    bytes::complete::tag,
    combinator::{map, opt, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded},
    branch::alt,
};

use super::core::{Res, astring, atom, close, lossy, nil, number, open, quoted, sp};
use crate::types::{Flag, MailboxInfo};

/// Parse IMAP flags like `(\Seen \Flagged $Custom)`
pub(crate) fn flag_list(i: &[u8]) -> Res<'_, Vec<Flag>> {
    delimited(open, separated_list0(sp, flag), close).parse(i)
}

fn flag(i: &[u8]) -> Res<'_, Flag> {
    map(
        recognize(preceded(opt(tag("\\")), alt((tag("*"), atom)))),
        Flag::from_bytes,
    )
    .parse(i)
}

/// Body of a LIST/LSUB response: `(attrs) delimiter name`
pub(crate) fn mailbox_list(i: &[u8]) -> Res<'_, MailboxInfo> {
    map(
        (
            delimited(open, separated_list0(sp, attribute), close),
            sp,
            delimiter,
            sp,
            astring,
        ),
        |(attributes, _, delimiter, _, name)| MailboxInfo {
            attributes,
            delimiter,
            name: lossy(&name),
        },
    )
    .parse(i)
}

fn attribute(i: &[u8]) -> Res<'_, String> {
    map(recognize(preceded(opt(tag("\\")), atom)), lossy).parse(i)
}

fn delimiter(i: &[u8]) -> Res<'_, Option<String>> {
    alt((map(nil, |_| None), map(quoted, |d| Some(lossy(&d))))).parse(i)
}

/// Numbers following `SEARCH`; the list may be empty.
pub(crate) fn search_results(i: &[u8]) -> Res<'_, Vec<u32>> {
    let (i, uids) = many0(preceded(sp, number)).parse(i)?;
    // Some servers leave a trailing space after the last number
    let (i, _) = opt(sp).parse(i)?;
    Ok((i, uids))
}

pub(crate) fn capabilities(i: &[u8]) -> Res<'_, Vec<String>> {
    many0(preceded(sp, map(atom, lossy))).parse(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        assert_eq!(flag_list(b"()").unwrap().1, Vec::<Flag>::new());
        assert_eq!(flag_list(b"(\\Seen)").unwrap().1, vec![Flag::Seen]);
        assert_eq!(
            flag_list(b"(\\Seen \\Flagged $Custom)").unwrap().1,
            vec![
                Flag::Seen,
                Flag::Flagged,
                Flag::Keyword("$Custom".to_string())
            ]
        );
        assert_eq!(
            flag_list(b"($Test1 $Test2 \\*)").unwrap().1,
            vec![
                Flag::Keyword("$Test1".to_string()),
                Flag::Keyword("$Test2".to_string()),
                Flag::MayCreate
            ]
        );
    }

    #[test]
    fn test_parse_flags_rejects_unclosed() {
        assert!(flag_list(b"(\\Seen").is_err());
    }

    #[test]
    fn test_parse_mailbox_list() {
        let (_, info) = mailbox_list(b"(\\HasNoChildren) \"/\" INBOX").unwrap();
        assert_eq!(info.name, "INBOX");
        assert_eq!(info.delimiter.as_deref(), Some("/"));
        assert_eq!(info.attributes, vec!["\\HasNoChildren".to_string()]);

        let (_, info) = mailbox_list(b"(\\Noselect \\HasChildren) NIL \"Sent Items\"").unwrap();
        assert_eq!(info.name, "Sent Items");
        assert_eq!(info.delimiter, None);
        assert!(!info.is_selectable());
    }

    #[test]
    fn test_parse_mailbox_list_literal_name() {
        let (_, info) = mailbox_list(b"() \".\" {8}\r\nWeird\"Na").unwrap();
        assert_eq!(info.name, "Weird\"Na");
    }

    #[test]
    fn test_search_results() {
        assert_eq!(search_results(b" 2 84 882").unwrap().1, vec![2, 84, 882]);
        assert_eq!(search_results(b"").unwrap().1, Vec::<u32>::new());
        assert_eq!(search_results(b" 5 ").unwrap().1, vec![5]);
    }
}

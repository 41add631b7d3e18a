use bytes::Bytes;
use nom::{
    Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    combinator::{map, opt},
    multi::{many1, separated_list1},
    sequence::{delimited, preceded},
};

use super::core::{
    Res, close, lossy, nil, nstring, nstring_text, number, open, quoted, skip_value, sp,
};
use super::mailbox::flag_list;
use crate::types::{Address, Envelope, FetchData};

/// Parenthesized `msg-att` list following `n FETCH`.
pub(crate) fn msg_att(i: &[u8]) -> Res<'_, Vec<FetchData>> {
    delimited(open, separated_list1(sp, msg_att_item), close).parse(i)
}

fn msg_att_item(i: &[u8]) -> Res<'_, FetchData> {
    alt((
        map(preceded(tag_no_case("UID "), number), FetchData::Uid),
        map(preceded(tag_no_case("FLAGS "), flag_list), FetchData::Flags),
        map(preceded(tag_no_case("INTERNALDATE "), quoted), |date| {
            FetchData::InternalDate(lossy(&date))
        }),
        map(
            preceded(tag_no_case("RFC822.SIZE "), number),
            FetchData::Rfc822Size,
        ),
        map(preceded(tag_no_case("ENVELOPE "), envelope), |env| {
            FetchData::Envelope(Box::new(env))
        }),
        body_section,
        skipped_item,
    ))
    .parse(i)
}

/// `BODY[section]<origin> nstring`
fn body_section(i: &[u8]) -> Res<'_, FetchData> {
    map(
        (
            preceded(tag_no_case("BODY["), take_while(|c: u8| c != b']')),
            tag("]"),
            opt(delimited(tag("<"), number, tag(">"))),
            sp,
            nstring,
        ),
        |(section, _, origin, _, data)| FetchData::BodySection {
            section: lossy(section),
            origin,
            data: data.map(Bytes::from),
        },
    )
    .parse(i)
}

fn skipped_item(i: &[u8]) -> Res<'_, FetchData> {
    map(
        (
            take_while1(|c: u8| c.is_ascii_alphanumeric() || c == b'.' || c == b'-'),
            sp,
            skip_value,
        ),
        |(name, _, _)| FetchData::Other(lossy(name)),
    )
    .parse(i)
}

fn envelope(i: &[u8]) -> Res<'_, Envelope> {
    let (i, _) = open(i)?;
    let (i, date) = nstring_text(i)?;
    let (i, _) = sp(i)?;
    let (i, subject) = nstring_text(i)?;
    let (i, _) = sp(i)?;
    let (i, from) = address_list(i)?;
    let (i, _) = sp(i)?;
    let (i, sender) = address_list(i)?;
    let (i, _) = sp(i)?;
    let (i, reply_to) = address_list(i)?;
    let (i, _) = sp(i)?;
    let (i, to) = address_list(i)?;
    let (i, _) = sp(i)?;
    let (i, cc) = address_list(i)?;
    let (i, _) = sp(i)?;
    let (i, bcc) = address_list(i)?;
    let (i, _) = sp(i)?;
    let (i, in_reply_to) = nstring_text(i)?;
    let (i, _) = sp(i)?;
    let (i, message_id) = nstring_text(i)?;
    let (i, _) = close(i)?;

    Ok((
        i,
        Envelope {
            date,
            subject,
            from,
            sender,
            reply_to,
            to,
            cc,
            bcc,
            in_reply_to,
            message_id,
        },
    ))
}

fn address_list(i: &[u8]) -> Res<'_, Vec<Address>> {
    alt((
        map(nil, |_| Vec::new()),
        delimited(open, many1(preceded(opt(sp), address)), close),
    ))
    .parse(i)
}

fn address(i: &[u8]) -> Res<'_, Address> {
    map(
        (
            open,
            nstring_text,
            sp,
            nstring_text,
            sp,
            nstring_text,
            sp,
            nstring_text,
            close,
        ),
        |(_, name, _, adl, _, mailbox, _, host, _)| Address {
            name,
            adl,
            mailbox,
            host,
        },
    )
    .parse(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Flag;

    #[test]
    fn test_fetch_uid_flags_size() {
        let (rest, items) = msg_att(b"(UID 42 FLAGS (\\Seen) RFC822.SIZE 1024)").unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            items,
            vec![
                FetchData::Uid(42),
                FetchData::Flags(vec![Flag::Seen]),
                FetchData::Rfc822Size(1024),
            ]
        );
    }

    #[test]
    fn test_fetch_body_literal() {
        let input = b"(UID 7 BODY[] {11}\r\nHello)World)";
        let (rest, items) = msg_att(input).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            items[1],
            FetchData::BodySection {
                section: String::new(),
                origin: None,
                data: Some(Bytes::from_static(b"Hello)World")),
            }
        );
    }

    #[test]
    fn test_fetch_body_nil_and_origin() {
        let (_, items) = msg_att(b"(BODY[TEXT]<0> NIL UID 3)").unwrap();
        assert_eq!(
            items[0],
            FetchData::BodySection {
                section: "TEXT".to_string(),
                origin: Some(0),
                data: None,
            }
        );
        assert_eq!(items[1], FetchData::Uid(3));
    }

    #[test]
    fn test_fetch_envelope() {
        let input = br#"(ENVELOPE ("Tue, 8 May 2018 20:48:21 +0000" "test" (("Test" NIL "test" "test")) (("Test" NIL "test" "test")) NIL ((NIL NIL "foo" "foo")(NIL NIL "bar" "bar")) NIL NIL NIL "<42@example.org>"))"#;
        let (_, items) = msg_att(input).unwrap();
        let FetchData::Envelope(env) = &items[0] else {
            panic!("Expected Envelope variant");
        };
        assert_eq!(env.date.as_deref(), Some("Tue, 8 May 2018 20:48:21 +0000"));
        assert_eq!(env.subject.as_deref(), Some("test"));
        assert_eq!(env.from[0].to_string(), "Test <test@test>");
        assert!(env.reply_to.is_empty());
        assert_eq!(env.to.len(), 2);
        assert_eq!(env.to[1].to_string(), "bar@bar");
        assert_eq!(env.message_id.as_deref(), Some("<42@example.org>"));
    }

    #[test]
    fn test_fetch_skips_unknown_attributes() {
        let input = b"(UID 9 MODSEQ (12345) BODYSTRUCTURE (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1))";
        let (_, items) = msg_att(input).unwrap();
        assert_eq!(items[0], FetchData::Uid(9));
        assert_eq!(items[1], FetchData::Other("MODSEQ".to_string()));
        assert_eq!(items[2], FetchData::Other("BODYSTRUCTURE".to_string()));
    }

    #[test]
    fn test_fetch_rejects_truncated() {
        assert!(msg_att(b"(UID 9 BODY[] {20}\r\nshort)").is_err());
    }
}

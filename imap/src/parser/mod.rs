use bytes::Bytes;
use nom::{
    Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    combinator::{all_consuming, cut, map, opt, rest},
    sequence::{delimited, preceded, terminated},
};
use thiserror::Error;

use crate::types::{Response, ResponseCode, Status, UntaggedResponse};
use self::core::{Res, crlf, lossy, number, sp, text};

mod core;
mod fetch;
mod mailbox;

const PREVIEW_LEN: usize = 80;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Invalid IMAP response: {0:?}")]
    InvalidResponse(String),
}

/// Parses one complete response frame, including its trailing CRLF and any
/// literals it embeds.
pub fn parse_response(frame: &[u8]) -> Result<Response, ParserError> {
    match all_consuming(response).parse(frame) {
        Ok((_, resp)) => Ok(resp),
        Err(_) => Err(ParserError::InvalidResponse(preview(frame))),
    }
}

fn preview(frame: &[u8]) -> String {
    let end = frame.len().min(PREVIEW_LEN);
    lossy(&frame[..end]).trim_end().to_string()
}

fn response(i: &[u8]) -> Res<'_, Response> {
    alt((continuation, untagged, tagged)).parse(i)
}

fn continuation(i: &[u8]) -> Res<'_, Response> {
    map(
        delimited(tag("+"), opt(preceded(sp, text)), crlf),
        |text| {
            Response::Continuation(text.filter(|t| !t.is_empty()).map(lossy))
        },
    )
    .parse(i)
}

fn tagged(i: &[u8]) -> Res<'_, Response> {
    map(
        (tag_token, sp, status, opt(preceded(sp, resp_text)), crlf),
        |(tag, _, status, resp_text, _)| {
            let (code, text) = resp_text.unwrap_or_default();
            Response::Tagged {
                tag: lossy(tag),
                status,
                code,
                text,
            }
        },
    )
    .parse(i)
}

fn tag_token(i: &[u8]) -> Res<'_, &[u8]> {
    take_while1(|c: u8| c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'.')(i)
}

fn untagged(i: &[u8]) -> Res<'_, Response> {
    map(
        preceded(
            tag("* "),
            alt((
                untagged_status,
                untagged_data,
                message_data,
                map(rest, |r: &[u8]| {
                    let r = r.strip_suffix(b"\r\n").unwrap_or(r);
                    UntaggedResponse::Other(Bytes::copy_from_slice(r))
                }),
            )),
        ),
        Response::Untagged,
    )
    .parse(i)
}

fn untagged_status(i: &[u8]) -> Res<'_, UntaggedResponse> {
    map(
        terminated((status, opt(preceded(sp, resp_text))), crlf),
        |(status, resp_text)| {
            let (code, text) = resp_text.unwrap_or_default();
            UntaggedResponse::Status { status, code, text }
        },
    )
    .parse(i)
}

fn untagged_data(i: &[u8]) -> Res<'_, UntaggedResponse> {
    terminated(
        alt((
            map(
                preceded(tag_no_case("CAPABILITY"), mailbox::capabilities),
                UntaggedResponse::Capability,
            ),
            map(
                preceded(
                    alt((tag_no_case("LIST "), tag_no_case("LSUB "))),
                    mailbox::mailbox_list,
                ),
                UntaggedResponse::List,
            ),
            map(
                preceded(tag_no_case("FLAGS "), mailbox::flag_list),
                UntaggedResponse::Flags,
            ),
            map(
                preceded(tag_no_case("SEARCH"), mailbox::search_results),
                UntaggedResponse::Search,
            ),
        )),
        crlf,
    )
    .parse(i)
}

/// `n EXISTS`, `n RECENT`, `n EXPUNGE` and `n FETCH (...)`
fn message_data(i: &[u8]) -> Res<'_, UntaggedResponse> {
    let (i, n) = number(i)?;
    let (i, _) = sp(i)?;
    alt((
        map(terminated(tag_no_case("EXISTS"), crlf), move |_| {
            UntaggedResponse::Exists(n)
        }),
        map(terminated(tag_no_case("RECENT"), crlf), move |_| {
            UntaggedResponse::Recent(n)
        }),
        map(terminated(tag_no_case("EXPUNGE"), crlf), move |_| {
            UntaggedResponse::Expunge(n)
        }),
        map(
            preceded(tag_no_case("FETCH "), cut(terminated(fetch::msg_att, crlf))),
            move |data| UntaggedResponse::Fetch { seq: n, data },
        ),
    ))
    .parse(i)
}

fn status(i: &[u8]) -> Res<'_, Status> {
    alt((
        map(tag_no_case("OK"), |_| Status::Ok),
        map(tag_no_case("NO"), |_| Status::No),
        map(tag_no_case("BAD"), |_| Status::Bad),
        map(tag_no_case("PREAUTH"), |_| Status::PreAuth),
        map(tag_no_case("BYE"), |_| Status::Bye),
    ))
    .parse(i)
}

/// `["[" resp-text-code "]" SP] text`
fn resp_text(i: &[u8]) -> Res<'_, (Option<ResponseCode>, String)> {
    map(
        (
            opt(terminated(
                delimited(tag("["), resp_text_code, tag("]")),
                opt(sp),
            )),
            text,
        ),
        |(code, text)| (code, lossy(text)),
    )
    .parse(i)
}

fn resp_text_code(i: &[u8]) -> Res<'_, ResponseCode> {
    alt((
        map(tag_no_case("ALERT"), |_| ResponseCode::Alert),
        map(
            preceded(tag_no_case("PERMANENTFLAGS "), mailbox::flag_list),
            ResponseCode::PermanentFlags,
        ),
        map(
            preceded(tag_no_case("CAPABILITY"), mailbox::capabilities),
            ResponseCode::Capability,
        ),
        map(tag_no_case("READ-ONLY"), |_| ResponseCode::ReadOnly),
        map(tag_no_case("READ-WRITE"), |_| ResponseCode::ReadWrite),
        map(tag_no_case("TRYCREATE"), |_| ResponseCode::TryCreate),
        map(
            preceded(tag_no_case("UIDNEXT "), number),
            ResponseCode::UidNext,
        ),
        map(
            preceded(tag_no_case("UIDVALIDITY "), number),
            ResponseCode::UidValidity,
        ),
        map(
            preceded(tag_no_case("UNSEEN "), number),
            ResponseCode::Unseen,
        ),
        map(
            take_while1(|c: u8| c != b']' && c != b'\r' && c != b'\n'),
            |raw: &[u8]| ResponseCode::Other(lossy(raw)),
        ),
    ))
    .parse(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FetchData, Flag};

    fn untagged(frame: &[u8]) -> UntaggedResponse {
        match parse_response(frame).unwrap() {
            Response::Untagged(u) => u,
            other => panic!("Expected untagged response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_greeting() {
        let frame = b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] Dovecot ready.\r\n";
        let UntaggedResponse::Status { status, code, text } = untagged(frame) else {
            panic!("Expected status response");
        };
        assert_eq!(status, Status::Ok);
        assert_eq!(
            code,
            Some(ResponseCode::Capability(vec![
                "IMAP4rev1".to_string(),
                "AUTH=PLAIN".to_string()
            ]))
        );
        assert_eq!(text, "Dovecot ready.");
    }

    #[test]
    fn test_parse_tagged() {
        let Response::Tagged {
            tag,
            status,
            code,
            text,
        } = parse_response(b"a0003 OK [READ-ONLY] EXAMINE completed\r\n").unwrap()
        else {
            panic!("Expected tagged response");
        };
        assert_eq!(tag, "a0003");
        assert_eq!(status, Status::Ok);
        assert_eq!(code, Some(ResponseCode::ReadOnly));
        assert_eq!(text, "EXAMINE completed");
    }

    #[test]
    fn test_parse_tagged_without_text() {
        let Response::Tagged { status, text, .. } = parse_response(b"a1 NO\r\n").unwrap() else {
            panic!("Expected tagged response");
        };
        assert_eq!(status, Status::No);
        assert!(text.is_empty());
    }

    #[test]
    fn test_parse_continuation() {
        assert!(matches!(
            parse_response(b"+ Ready for literal\r\n").unwrap(),
            Response::Continuation(Some(t)) if t == "Ready for literal"
        ));
        assert!(matches!(
            parse_response(b"+\r\n").unwrap(),
            Response::Continuation(None)
        ));
    }

    #[test]
    fn test_parse_untagged_codes() {
        let UntaggedResponse::Status { code, .. } =
            untagged(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
        else {
            panic!("Expected status response");
        };
        assert_eq!(code, Some(ResponseCode::UidValidity(3857529045)));

        let UntaggedResponse::Status { code, .. } =
            untagged(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n")
        else {
            panic!("Expected status response");
        };
        assert_eq!(
            code,
            Some(ResponseCode::PermanentFlags(vec![
                Flag::Deleted,
                Flag::Seen,
                Flag::MayCreate
            ]))
        );

        let UntaggedResponse::Status { code, .. } =
            untagged(b"* OK [HIGHESTMODSEQ 715194045007] Highest\r\n")
        else {
            panic!("Expected status response");
        };
        assert_eq!(
            code,
            Some(ResponseCode::Other("HIGHESTMODSEQ 715194045007".to_string()))
        );
    }

    #[test]
    fn test_parse_message_data() {
        assert!(matches!(untagged(b"* 172 EXISTS\r\n"), UntaggedResponse::Exists(172)));
        assert!(matches!(untagged(b"* 1 RECENT\r\n"), UntaggedResponse::Recent(1)));
        assert!(matches!(untagged(b"* 44 EXPUNGE\r\n"), UntaggedResponse::Expunge(44)));
    }

    #[test]
    fn test_parse_search() {
        assert!(matches!(
            untagged(b"* SEARCH 2 84 882\r\n"),
            UntaggedResponse::Search(uids) if uids == vec![2, 84, 882]
        ));
        assert!(matches!(
            untagged(b"* SEARCH\r\n"),
            UntaggedResponse::Search(uids) if uids.is_empty()
        ));
    }

    #[test]
    fn test_parse_list() {
        let UntaggedResponse::List(info) = untagged(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n")
        else {
            panic!("Expected LIST response");
        };
        assert_eq!(info.name, "INBOX");
    }

    #[test]
    fn test_parse_fetch_with_literal() {
        let frame = b"* 1 FETCH (UID 12 BODY[] {5}\r\nHello)\r\n";
        let UntaggedResponse::Fetch { seq, data } = untagged(frame) else {
            panic!("Expected FETCH response");
        };
        assert_eq!(seq, 1);
        assert_eq!(data[0], FetchData::Uid(12));
        assert!(matches!(
            &data[1],
            FetchData::BodySection { data: Some(body), .. } if body.as_ref() == b"Hello"
        ));
    }

    #[test]
    fn test_parse_fetch_with_multipart_bodystructure() {
        let frame = b"* 1 FETCH (UID 9 BODYSTRUCTURE ((\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1)(\"TEXT\" \"HTML\" NIL NIL NIL \"7BIT\" 5 1) \"ALTERNATIVE\"))\r\n";
        let UntaggedResponse::Fetch { data, .. } = untagged(frame) else {
            panic!("Expected FETCH response");
        };
        assert_eq!(
            data,
            vec![
                FetchData::Uid(9),
                FetchData::Other("BODYSTRUCTURE".to_string())
            ]
        );
    }

    #[test]
    fn test_malformed_fetch_is_an_error() {
        let err = parse_response(b"* 1 FETCH (UID 12\r\n").unwrap_err();
        assert!(matches!(err, ParserError::InvalidResponse(p) if p.starts_with("* 1 FETCH")));
    }

    #[test]
    fn test_unknown_untagged_is_kept() {
        assert!(matches!(
            untagged(b"* ENABLED CONDSTORE\r\n"),
            UntaggedResponse::Other(raw) if raw.as_ref() == b"ENABLED CONDSTORE"
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_response(b"\r\n").is_err());
        assert!(parse_response(b"a1 MAYBE done\r\n").is_err());
    }
}

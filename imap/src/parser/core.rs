//! Lexical building blocks of RFC 3501 § 9 (atoms, strings, literals).

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    combinator::{map, opt},
    multi::{length_data, many0},
    sequence::{delimited, preceded},
};

pub(crate) type Res<'a, T> = IResult<&'a [u8], T>;

pub(crate) fn sp(i: &[u8]) -> Res<'_, &[u8]> {
    tag(" ")(i)
}

pub(crate) fn crlf(i: &[u8]) -> Res<'_, &[u8]> {
    nom::character::complete::crlf(i)
}

pub(crate) fn open(i: &[u8]) -> Res<'_, &[u8]> {
    tag("(")(i)
}

pub(crate) fn close(i: &[u8]) -> Res<'_, &[u8]> {
    tag(")")(i)
}

pub(crate) fn number(i: &[u8]) -> Res<'_, u32> {
    nom::character::complete::u32(i)
}

pub(crate) fn nil(i: &[u8]) -> Res<'_, &[u8]> {
    tag_no_case("NIL")(i)
}

fn is_atom_char(c: u8) -> bool {
    c > 0x1f && c < 0x7f && !b"(){ %*\"\\]".contains(&c)
}

fn is_astring_char(c: u8) -> bool {
    is_atom_char(c) || c == b']'
}

pub(crate) fn atom(i: &[u8]) -> Res<'_, &[u8]> {
    take_while1(is_atom_char)(i)
}

/// Human-readable text up to the end of the line.
pub(crate) fn text(i: &[u8]) -> Res<'_, &[u8]> {
    take_while(|c: u8| c != b'\r' && c != b'\n')(i)
}

fn dquote(i: &[u8]) -> Res<'_, &[u8]> {
    tag("\"")(i)
}

pub(crate) fn quoted(i: &[u8]) -> Res<'_, Vec<u8>> {
    let (mut rest, _) = dquote(i)?;
    let mut out = Vec::new();
    loop {
        match rest.split_first() {
            Some((b'"', tail)) => return Ok((tail, out)),
            Some((b'\\', tail)) => match tail.split_first() {
                Some((&escaped, tail)) => {
                    out.push(escaped);
                    rest = tail;
                }
                None => return Err(error_at(rest, nom::error::ErrorKind::Escaped)),
            },
            Some((&c, tail)) if c != b'\r' && c != b'\n' => {
                out.push(c);
                rest = tail;
            }
            _ => return Err(error_at(rest, nom::error::ErrorKind::Char)),
        }
    }
}

fn error_at(i: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(i, kind))
}

/// `{n}\r\n` followed by n raw bytes; the `~` prefix marks a binary literal.
pub(crate) fn literal(i: &[u8]) -> Res<'_, &[u8]> {
    preceded(
        opt(tag("~")),
        length_data(delimited(
            tag("{"),
            nom::character::complete::u32,
            tag("}\r\n"),
        )),
    )
    .parse(i)
}

pub(crate) fn string(i: &[u8]) -> Res<'_, Vec<u8>> {
    alt((quoted, map(literal, |b: &[u8]| b.to_vec()))).parse(i)
}

pub(crate) fn nstring(i: &[u8]) -> Res<'_, Option<Vec<u8>>> {
    alt((map(nil, |_| None), map(string, Some))).parse(i)
}

pub(crate) fn nstring_text(i: &[u8]) -> Res<'_, Option<String>> {
    map(nstring, |value| value.map(|b| lossy(&b))).parse(i)
}

pub(crate) fn astring(i: &[u8]) -> Res<'_, Vec<u8>> {
    alt((
        string,
        map(take_while1(is_astring_char), |b: &[u8]| b.to_vec()),
    ))
    .parse(i)
}

/// Consumes one value of any shape (nested lists included) without
/// interpreting it. List members may abut without a space, as the bodies
/// of a multipart BODYSTRUCTURE do.
pub(crate) fn skip_value(i: &[u8]) -> Res<'_, ()> {
    alt((
        map(
            delimited(open, many0(preceded(opt(sp), skip_value)), close),
            |_| (),
        ),
        map(string, |_| ()),
        map(
            take_while1(|c: u8| !b" ()\r\n".contains(&c)),
            |_| (),
        ),
    ))
    .parse(i)
}

pub(crate) fn lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

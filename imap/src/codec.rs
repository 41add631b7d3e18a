use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use memchr::{memmem, memrchr};
use tokio_util::codec::Decoder;

use crate::ImapError;
use crate::parser::parse_response;
use crate::types::Response;

/// Longest single line (excluding literals) accepted from the server.
pub(crate) const LINE_CAP: usize = 1024 * 1024;
/// Largest literal accepted; a full message body arrives as one literal.
pub(crate) const LITERAL_CAP: usize = 256 * 1024 * 1024;

/// Splits the byte stream into complete response frames.
///
/// A frame is a CRLF-terminated line, except that a line ending in `{n}`
/// announces n raw bytes after its CRLF, and the frame continues with
/// the next line after them.
#[derive(Debug, Default)]
pub(crate) struct ImapCodec {
    /// Start of the line segment that has not been fully scanned yet
    scanned: usize,
    /// Buffer length when `decode` last returned
    buffered: usize,
    progress: ReadProgress,
}

/// Total bytes the codec has been handed, shared with response waiters so
/// a large literal still arriving is not mistaken for a silent server.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReadProgress(Arc<AtomicU64>);

impl ReadProgress {
    pub(crate) fn bytes(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: usize) {
        self.0.fetch_add(n as u64, Ordering::Relaxed);
    }
}

impl ImapCodec {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn progress(&self) -> ReadProgress {
        self.progress.clone()
    }

    fn next_frame(&mut self, src: &mut BytesMut) -> Result<Option<Response>, ImapError> {
        loop {
            let segment = &src[self.scanned..];
            let Some(pos) = memmem::find(segment, b"\r\n") else {
                if segment.len() > LINE_CAP {
                    return Err(ImapError::LineTooLong(LINE_CAP));
                }
                return Ok(None);
            };
            if pos > LINE_CAP {
                return Err(ImapError::LineTooLong(LINE_CAP));
            }

            let line_end = self.scanned + pos + 2;
            if let Some(n) = literal_len(&segment[..pos]) {
                if n > LITERAL_CAP {
                    return Err(ImapError::LiteralTooLarge(n));
                }
                let literal_end = line_end + n;
                if src.len() < literal_end {
                    src.reserve(literal_end - src.len());
                    return Ok(None);
                }
                self.scanned = literal_end;
                continue;
            }

            self.scanned = 0;
            let frame = src.split_to(line_end);
            return Ok(Some(parse_response(&frame)?));
        }
    }
}

impl Decoder for ImapCodec {
    type Item = Response;
    type Error = ImapError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() > self.buffered {
            self.progress.add(src.len() - self.buffered);
        }
        let frame = self.next_frame(src);
        self.buffered = src.len();
        frame
    }
}

/// Returns n if the line ends with a `{n}` literal announcement.
fn literal_len(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"}")?;
    let open = memrchr(b'{', body)?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

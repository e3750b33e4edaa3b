//! Decoder for `transfer-encoding: chunked` request bodies (RFC 9112 section 7.1).
//!
//! Chunk extensions and trailer fields are accepted and discarded.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// hex digits of the chunk size
    Size,
    /// chunk extensions or whitespace up to the CR of the size line
    SizeTail,
    /// LF ending the size line
    SizeLf,
    /// chunk data, `remaining` bytes left
    Data,
    /// CRLF after chunk data
    DataCr,
    DataLf,
    /// trailer section after the last chunk, `line_empty` tracks a blank line
    Trailer,
    TrailerLf,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    remaining: u64,
    line_empty: bool,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size, remaining: 0, line_empty: true }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(reason: &str) -> ParseError {
    ParseError::invalid_body(format!("invalid chunked body: {reason}"))
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == State::End {
                trace!("finished reading chunked body");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            if self.state == State::Data {
                let len = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(src.len());
                let bytes = src.split_to(len).freeze();
                self.remaining -= len as u64;
                if self.remaining == 0 {
                    self.state = State::DataCr;
                }
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }

            let byte = src.get_u8();
            self.state = match (self.state, byte) {
                (State::Size, b @ (b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F')) => {
                    let digit = u64::from((b as char).to_digit(16).unwrap_or_default());
                    self.remaining =
                        self.remaining.checked_mul(16).and_then(|n| n.checked_add(digit)).ok_or_else(|| invalid("chunk size overflow"))?;
                    State::Size
                }
                (State::Size | State::SizeTail, b'\r') => State::SizeLf,
                (State::Size | State::SizeTail, b'\n') => return Err(invalid("bare LF in size line")),
                (State::Size, b' ' | b'\t' | b';') | (State::SizeTail, _) => State::SizeTail,
                (State::Size, _) => return Err(invalid("bad chunk size")),
                (State::SizeLf, b'\n') if self.remaining == 0 => {
                    self.line_empty = true;
                    State::Trailer
                }
                (State::SizeLf, b'\n') => State::Data,
                (State::DataCr, b'\r') => State::DataLf,
                (State::DataLf, b'\n') => State::Size,
                (State::Trailer, b'\r') => State::TrailerLf,
                (State::Trailer, _) => {
                    self.line_empty = false;
                    State::Trailer
                }
                (State::TrailerLf, b'\n') if self.line_empty => State::End,
                (State::TrailerLf, b'\n') => {
                    self.line_empty = true;
                    State::Trailer
                }
                _ => return Err(invalid("missing CRLF")),
            };
        }
    }
}

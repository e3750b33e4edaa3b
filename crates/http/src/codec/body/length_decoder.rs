//! Decoder for `content-length` framed request bodies.

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Yields whatever part of the remaining `length` bytes is buffered, then [`PayloadItem::Eof`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = usize::try_from(self.length).unwrap_or(usize::MAX).min(src.len());
        let bytes = src.split_to(len).freeze();

        self.length -= len as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_basic() {
        let mut buffer = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);
        let mut length_decoder = LengthDecoder::new(10);

        let payload = length_decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(payload, PayloadItem::Chunk(Bytes::from_static(b"1012345678")));
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");

        assert_eq!(length_decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }

    #[test]
    fn test_split_arrival() {
        let mut buffer = BytesMut::from(&b"abc"[..]);
        let mut length_decoder = LengthDecoder::new(5);

        assert_eq!(length_decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Chunk(Bytes::from_static(b"abc"))));
        assert_eq!(length_decoder.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"de");
        assert_eq!(length_decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Chunk(Bytes::from_static(b"de"))));
        assert_eq!(length_decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }
}

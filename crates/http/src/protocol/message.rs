use bytes::{Buf, Bytes};

/// A decoded or to-be-encoded HTTP message part.
///
/// `T` is the head type (request header on the read side, response head on
/// the write side) and `Data` the payload buffer type.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    /// The message head
    Header(T),
    /// A chunk of payload data or the end-of-payload marker
    Payload(PayloadItem<Data>),
}

/// One item of a payload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Eof,
}

/// How the payload of a message is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// `content-length` framing with the exact number of bytes
    Length(u64),
    /// `transfer-encoding: chunked` framing
    Chunked,
    /// no payload at all
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn new_length(length: u64) -> Self {
        if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) }
    }

    #[inline]
    pub fn new_chunked() -> Self {
        PayloadSize::Chunked
    }

    #[inline]
    pub fn new_empty() -> Self {
        PayloadSize::Empty
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<T, D: Buf> Message<T, D> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    /// Consumes the item and returns the chunk data, `None` for [`PayloadItem::Eof`]
    pub fn into_data(self) -> Option<D> {
        match self {
            PayloadItem::Chunk(data) => Some(data),
            PayloadItem::Eof => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_is_empty() {
        assert!(PayloadSize::new_length(0).is_empty());
        assert_eq!(PayloadSize::new_length(12), PayloadSize::Length(12));
    }

    #[test]
    fn payload_item_data() {
        let item = PayloadItem::Chunk(Bytes::from_static(b"abc"));
        assert!(item.is_chunk());
        assert_eq!(item.into_data(), Some(Bytes::from_static(b"abc")));

        let eof = PayloadItem::<Bytes>::Eof;
        assert!(eof.is_eof());
        assert_eq!(eof.into_data(), None);
    }
}

use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let PayloadItem::Chunk(mut bytes) = item else {
            return Ok(());
        };

        let remaining = bytes.remaining() as u64;
        if remaining > self.length {
            warn!(remaining, expected = self.length, "response body longer than content-length");
            return Err(SendError::invalid_body("response body exceeds content-length"));
        }

        self.length -= remaining;
        while bytes.has_remaining() {
            let chunk = bytes.chunk();
            let len = chunk.len();
            dst.extend_from_slice(chunk);
            bytes.advance(len);
        }
        Ok(())
    }
}

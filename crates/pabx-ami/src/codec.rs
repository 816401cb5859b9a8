//! Framing codec for the manager protocol
//!
//! Inbound bytes accumulate in the read buffer; every complete block
//! (terminated by `\r\n\r\n`) is decoded into an [`AmiMessage`] and the
//! unconsumed remainder stays buffered for the next read.

use crate::action::AmiAction;
use crate::constants::{BLOCK_DELIMITER, MAX_BUFFER_SIZE};
use crate::error::AmiError;
use crate::message::AmiMessage;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone)]
pub struct AmiCodec {
    max_buffer_size: usize,
}

impl AmiCodec {
    pub fn new() -> Self {
        Self {
            max_buffer_size: MAX_BUFFER_SIZE,
        }
    }

    pub fn with_max_buffer_size(max_buffer_size: usize) -> Self {
        Self { max_buffer_size }
    }
}

impl Default for AmiCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(BLOCK_DELIMITER.len())
        .position(|window| window == BLOCK_DELIMITER)
}

impl Decoder for AmiCodec {
    type Item = AmiMessage;
    type Error = AmiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AmiMessage>, AmiError> {
        loop {
            let Some(pos) = find_delimiter(src) else {
                if src.len() > self.max_buffer_size {
                    return Err(AmiError::Protocol(format!(
                        "unterminated block exceeds {} bytes",
                        self.max_buffer_size
                    )));
                }
                return Ok(None);
            };

            let block = src.split_to(pos + BLOCK_DELIMITER.len());
            let text = String::from_utf8_lossy(&block[..pos]);
            let message = AmiMessage::parse(&text);

            // Blocks holding only the banner or stray blank lines carry nothing
            if !message.is_empty() {
                return Ok(Some(message));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<AmiMessage>, AmiError> {
        match self.decode(buf)? {
            Some(message) => Ok(Some(message)),
            None => {
                buf.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<AmiAction> for AmiCodec {
    type Error = AmiError;

    fn encode(&mut self, action: AmiAction, dst: &mut BytesMut) -> Result<(), AmiError> {
        let wire = action.to_wire();
        dst.reserve(wire.len());
        dst.put_slice(wire.as_bytes());
        Ok(())
    }
}

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use super::FramingError;

/// Non-transparent framing: one message per LF terminated line.
///
/// The LF and a single CR before it are stripped, empty lines are skipped.
#[derive(Clone, Debug)]
pub struct LineDecoder {
    max_frame_length: usize,
    // bytes of `src` already known to contain no LF
    next_index: usize,
}

impl LineDecoder {
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            next_index: 0,
        }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Decoder for LineDecoder {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        loop {
            let Some(pos) = memchr::memchr(b'\n', &src[self.next_index..]) else {
                self.next_index = src.len();
                // leave room for the CR of a CRLF still in flight
                if src.len() > self.max_frame_length.saturating_add(1) {
                    return Err(FramingError::FrameTooLarge {
                        length: src.len(),
                        max: self.max_frame_length,
                    });
                }
                return Ok(None);
            };

            let newline = self.next_index + pos;
            self.next_index = 0;

            let mut line = src.split_to(newline + 1);
            line.truncate(newline);
            if line.last() == Some(&b'\r') {
                line.truncate(newline - 1);
            }

            if line.len() > self.max_frame_length {
                return Err(FramingError::FrameTooLarge {
                    length: line.len(),
                    max: self.max_frame_length,
                });
            }

            if !line.is_empty() {
                return Ok(Some(line.freeze()));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        if !src.is_empty() {
            tracing::debug!(
                length = src.len(),
                "discarding unterminated line at end of stream"
            );
            src.advance(src.len());
            self.next_index = 0;
        }

        Ok(None)
    }
}

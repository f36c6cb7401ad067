use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use super::FramingError;

/// Where the decoder is inside the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Reading the decimal length prefix. Digits are consumed from the buffer
    /// as they arrive.
    Length { len: usize, digits: usize },
    /// Prefix done, waiting until `remaining` body bytes are buffered.
    Body { remaining: usize },
}

impl Default for State {
    fn default() -> Self {
        State::Length { len: 0, digits: 0 }
    }
}

/// RFC 5425 `MSG-LEN SP SYSLOG-MSG` decoder.
///
/// Resumable at any byte boundary: the prefix and the body may arrive in any
/// number of reads of any size.
#[derive(Clone, Debug)]
pub struct OctetCountingDecoder {
    max_frame_length: usize,
    state: State,
}

impl OctetCountingDecoder {
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            state: State::default(),
        }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn decode_length(&mut self, src: &mut BytesMut) -> Result<Option<usize>, FramingError> {
        let State::Length {
            mut len,
            mut digits,
        } = self.state
        else {
            return Ok(None);
        };

        let mut consumed = 0;
        let mut result = Ok(None);
        for &ch in src.iter() {
            consumed += 1;

            match ch {
                b'0'..=b'9' => {
                    let length = len
                        .checked_mul(10)
                        .and_then(|n| n.checked_add((ch - b'0') as usize))
                        .unwrap_or(usize::MAX);
                    // reject before anything of that size is reserved
                    if length > self.max_frame_length || length == usize::MAX {
                        result = Err(FramingError::FrameTooLarge {
                            length,
                            max: self.max_frame_length,
                        });
                        break;
                    }
                    len = length;
                    digits += 1;
                }
                b' ' if digits == 0 => {
                    result = Err(FramingError::EmptyLengthPrefix);
                    break;
                }
                b' ' => {
                    result = Ok(Some(len));
                    break;
                }
                other => {
                    result = Err(FramingError::InvalidLengthPrefix(other));
                    break;
                }
            }
        }

        src.advance(consumed);
        self.state = match result {
            Ok(Some(length)) => State::Body { remaining: length },
            _ => State::Length { len, digits },
        };

        result
    }
}

impl Decoder for OctetCountingDecoder {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        if let State::Length { .. } = self.state {
            if self.decode_length(src)?.is_none() {
                return Ok(None);
            }
        }

        let State::Body { remaining } = self.state else {
            return Ok(None);
        };

        if src.len() < remaining {
            src.reserve(remaining - src.len());
            return Ok(None);
        }

        self.state = State::default();
        Ok(Some(src.split_to(remaining).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        let buffered = match self.state {
            State::Length { digits: 0, .. } if src.is_empty() => return Ok(None),
            State::Length { digits, .. } => digits + src.len(),
            State::Body { .. } => src.len(),
        };

        self.state = State::default();
        src.clear();
        Err(FramingError::Truncated { buffered })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut OctetCountingDecoder, buf: &mut BytesMut) -> Vec<Bytes> {
        let mut frames = vec![];
        while let Some(frame) = decoder.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn single_read() {
        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::from(&b"5 hello11 hello world"[..]);

        let frames = decode_all(&mut decoder, &mut buf);
        assert_eq!(frames, vec!["hello", "hello world"]);
        assert!(buf.is_empty());
        assert_eq!(decoder.state(), State::default());
    }

    #[test]
    fn byte_at_a_time() {
        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::new();
        let mut frames = vec![];

        for &b in b"12 <14>1 - - - 3 abc".iter() {
            buf.extend_from_slice(&[b]);
            frames.extend(decode_all(&mut decoder, &mut buf));
        }

        assert_eq!(frames, vec!["<14>1 - - - ", "abc"]);
    }

    #[test]
    fn state_transitions() {
        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::from(&b"1"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(decoder.state(), State::Length { len: 1, digits: 1 });

        buf.extend_from_slice(b"0 abc");
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(decoder.state(), State::Body { remaining: 10 });
        assert_eq!(&buf[..], b"abc");
    }

    #[test]
    fn zero_length_frame() {
        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::from(&b"0 3 abc"[..]);
        assert_eq!(decode_all(&mut decoder, &mut buf), vec!["", "abc"]);
    }

    #[test]
    fn invalid_prefix() {
        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::from(&b"12x hello"[..]);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(FramingError::InvalidLengthPrefix(b'x'))
        ));

        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::from(&b" hello"[..]);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(FramingError::EmptyLengthPrefix)
        ));
    }

    #[test]
    fn oversize_detected_on_digits() {
        let mut decoder = OctetCountingDecoder::new(100);
        // no space yet, the prefix alone already exceeds the limit
        let mut buf = BytesMut::from(&b"1000"[..]);
        match decoder.decode(&mut buf) {
            Err(FramingError::FrameTooLarge { length, max }) => {
                assert_eq!(length, 1000);
                assert_eq!(max, 100);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(buf.capacity() < 1000);
    }

    #[test]
    fn huge_prefix_does_not_overflow() {
        let mut decoder = OctetCountingDecoder::new(usize::MAX);
        let mut buf = BytesMut::from(&b"99999999999999999999999999 "[..]);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(FramingError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn eof() {
        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::new();
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from(&b"10 abc"[..]);
        assert!(matches!(
            decoder.decode_eof(&mut buf),
            Err(FramingError::Truncated { buffered: 3 })
        ));
        assert!(buf.is_empty());

        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::from(&b"12"[..]);
        assert!(matches!(
            decoder.decode_eof(&mut buf),
            Err(FramingError::Truncated { buffered: 2 })
        ));

        let mut decoder = OctetCountingDecoder::new(1024);
        let mut buf = BytesMut::from(&b"3 abc"[..]);
        assert_eq!(&decoder.decode_eof(&mut buf).unwrap().unwrap()[..], b"abc");
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }
}

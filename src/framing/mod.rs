//! Splitting a continuous byte stream into syslog messages.
//!
//! Two disciplines exist (RFC 6587 / RFC 5425):
//!
//! - non-transparent framing, every message ends with LF (`Line`)
//! - octet counting, `MSG-LEN SP SYSLOG-MSG` (`OctetCounting`)
//!
//! The decoders are `tokio_util` codecs, so they work with `FramedRead` as
//! well as with a plain `BytesMut` fed from a blocking reader.

mod newline;
mod octet_counting;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub use newline::LineDecoder;
pub use octet_counting::{OctetCountingDecoder, State};

/// Frames larger than this are rejected unless configured otherwise.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Errors that end a framed stream. None of them is recoverable, the
/// connection should be dropped.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("invalid byte {0:#04x} in length prefix")]
    InvalidLengthPrefix(u8),
    #[error("length prefix has no digits")]
    EmptyLengthPrefix,
    #[error("frame length {length} exceeds maximum {max}")]
    FrameTooLarge { length: usize, max: usize },
    #[error("stream ended inside a frame, {buffered} bytes discarded")]
    Truncated { buffered: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FramingMode {
    /// LF terminated messages, a trailing CR is dropped.
    Line,
    /// RFC 5425 octet counting.
    #[default]
    OctetCounting,
}

impl FramingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FramingMode::Line => "line",
            FramingMode::OctetCounting => "octet-counting",
        }
    }
}

impl std::fmt::Display for FramingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramerConfig {
    pub mode: FramingMode,

    /// Upper bound of a single frame body, in bytes.
    pub max_frame_length: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            mode: FramingMode::default(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl FramerConfig {
    pub fn with_mode(mode: FramingMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max;
        self
    }

    pub fn build(&self) -> Framer {
        Framer::new(self)
    }
}

/// Either decoder, selected once per connection.
#[derive(Clone, Debug)]
pub enum Framer {
    Line(LineDecoder),
    OctetCounting(OctetCountingDecoder),
}

impl Framer {
    pub fn new(config: &FramerConfig) -> Self {
        match config.mode {
            FramingMode::Line => Framer::Line(LineDecoder::new(config.max_frame_length)),
            FramingMode::OctetCounting => {
                Framer::OctetCounting(OctetCountingDecoder::new(config.max_frame_length))
            }
        }
    }

    pub fn mode(&self) -> FramingMode {
        match self {
            Framer::Line(_) => FramingMode::Line,
            Framer::OctetCounting(_) => FramingMode::OctetCounting,
        }
    }
}

impl Decoder for Framer {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        match self {
            Framer::Line(decoder) => decoder.decode(src),
            Framer::OctetCounting(decoder) => decoder.decode(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        match self {
            Framer::Line(decoder) => decoder.decode_eof(src),
            Framer::OctetCounting(decoder) => decoder.decode_eof(src),
        }
    }
}

impl Encoder<Bytes> for Framer {
    type Error = FramingError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), FramingError> {
        encode_into(&payload, self.mode(), dst);
        Ok(())
    }
}

fn encode_into(payload: &[u8], mode: FramingMode, dst: &mut BytesMut) {
    match mode {
        FramingMode::Line => {
            dst.reserve(payload.len() + 1);
            dst.put_slice(payload);
            dst.put_u8(b'\n');
        }
        FramingMode::OctetCounting => {
            let prefix = format!("{} ", payload.len());
            dst.reserve(prefix.len() + payload.len());
            dst.put_slice(prefix.as_bytes());
            dst.put_slice(payload);
        }
    }
}

/// Wrap one serialized message for transmission.
pub fn frame(payload: &[u8], mode: FramingMode) -> Bytes {
    let mut dst = BytesMut::new();
    encode_into(payload, mode, &mut dst);
    dst.freeze()
}

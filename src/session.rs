//! One framed connection: bytes in, entries out.

use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

use crate::error::ParseError;
use crate::framing::{Framer, FramerConfig, FramingError};
use crate::rfc5424::{parse_message_with, ParserOptions};
use crate::Entry;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Receives what a [`Session`] decodes.
pub trait Handler {
    fn handle_entry(&mut self, entry: Entry);

    /// Called with the raw frame when it is not a valid message. The session
    /// keeps going afterwards.
    fn handle_error(&mut self, _raw: &[u8], _err: &ParseError) {}
}

impl<F> Handler for F
where
    F: FnMut(Entry),
{
    fn handle_entry(&mut self, entry: Entry) {
        self(entry)
    }
}

/// Counters of a single session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames cut from the stream.
    pub frames: u64,
    /// Frames that parsed into an entry.
    pub entries: u64,
    /// Frames that failed to parse.
    pub errors: u64,
}

pub struct Session<H> {
    framer: Framer,
    options: ParserOptions,
    handler: H,
    stats: SessionStats,
}

impl<H: Handler> Session<H> {
    pub fn new(framing: &FramerConfig, options: ParserOptions, handler: H) -> Self {
        Self {
            framer: Framer::new(framing),
            options,
            handler,
            stats: SessionStats::default(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Parse one frame and hand the outcome to the handler.
    pub fn dispatch(&mut self, frame: &[u8]) {
        self.stats.frames += 1;

        match parse_message_with(frame, &self.options) {
            Ok(entry) => {
                self.stats.entries += 1;
                self.handler.handle_entry(entry);
            }
            Err(err) => {
                self.stats.errors += 1;
                tracing::debug!(
                    error = %err,
                    length = frame.len(),
                    "dropping unparsable syslog frame"
                );
                self.handler.handle_error(frame, &err);
            }
        }
    }

    fn framing_failed(&self, err: FramingError) -> FramingError {
        tracing::warn!(
            error = %err,
            mode = %self.framer.mode(),
            frames = self.stats.frames,
            "syslog framing error, closing session"
        );
        err
    }

    /// Drive the session from a blocking reader until end of stream.
    pub fn run_blocking<R: Read>(&mut self, mut reader: R) -> Result<SessionStats, FramingError> {
        let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
        let mut chunk = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.framing_failed(err.into())),
            };

            if n == 0 {
                loop {
                    match self.framer.decode_eof(&mut buf) {
                        Ok(Some(frame)) => self.dispatch(&frame),
                        Ok(None) => return Ok(self.stats),
                        Err(err) => return Err(self.framing_failed(err)),
                    }
                }
            }

            buf.extend_from_slice(&chunk[..n]);
            loop {
                match self.framer.decode(&mut buf) {
                    Ok(Some(frame)) => self.dispatch(&frame),
                    Ok(None) => break,
                    Err(err) => return Err(self.framing_failed(err)),
                }
            }
        }
    }

    /// Drive the session from an async reader until end of stream.
    pub async fn run<R>(&mut self, reader: R) -> Result<SessionStats, FramingError>
    where
        R: AsyncRead + Unpin,
    {
        let mut frames = FramedRead::with_capacity(reader, self.framer.clone(), READ_BUFFER_SIZE);

        while let Some(frame) = frames.next().await {
            match frame {
                Ok(frame) => self.dispatch(&frame),
                Err(err) => return Err(self.framing_failed(err)),
            }
        }

        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::FramingMode;

    #[derive(Default)]
    struct Collect {
        entries: Vec<Entry>,
        errors: Vec<Vec<u8>>,
    }

    impl Handler for Collect {
        fn handle_entry(&mut self, entry: Entry) {
            self.entries.push(entry);
        }

        fn handle_error(&mut self, raw: &[u8], _err: &ParseError) {
            self.errors.push(raw.to_vec());
        }
    }

    // yields at most `size` bytes per read
    struct Chunked<'a> {
        data: &'a [u8],
        size: usize,
    }

    impl Read for Chunked<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.size.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    const STREAM: &[u8] = b"17 <14>1 - - - - - -20 <13>1 - - - - - - hi9 not valid";

    #[test]
    fn blocking_octet_counting() {
        for size in [1, 2, 7, 64, 4096] {
            let mut session = Session::new(
                &FramerConfig::with_mode(FramingMode::OctetCounting),
                ParserOptions::strict(),
                Collect::default(),
            );

            let stats = session
                .run_blocking(Chunked { data: STREAM, size })
                .unwrap();
            assert_eq!(
                stats,
                SessionStats {
                    frames: 3,
                    entries: 2,
                    errors: 1
                },
                "chunk size {size}"
            );

            let handler = session.into_handler();
            assert_eq!(handler.entries[1].prival(), 13);
            assert_eq!(handler.errors, vec![b"not valid".to_vec()]);
        }
    }

    #[test]
    fn framing_error_ends_session() {
        let mut session = Session::new(
            &FramerConfig::default(),
            ParserOptions::strict(),
            Collect::default(),
        );

        let err = session
            .run_blocking(&b"17 <14>1 - - - - - -x5 hello"[..])
            .unwrap_err();
        assert!(matches!(err, FramingError::InvalidLengthPrefix(b'x')));
        assert_eq!(session.stats().entries, 1);
    }

    #[test]
    fn truncated_stream() {
        let mut session = Session::new(
            &FramerConfig::default(),
            ParserOptions::strict(),
            |_: Entry| {},
        );
        let err = session.run_blocking(&b"30 <14>1 - -"[..]).unwrap_err();
        assert!(matches!(err, FramingError::Truncated { .. }));
        assert_eq!(session.stats().frames, 0);
    }

    #[test]
    fn closure_handler() {
        let mut seen = vec![];
        let mut session = Session::new(
            &FramerConfig::with_mode(FramingMode::Line),
            ParserOptions::lenient(),
            |entry: Entry| seen.push(entry.hostname().map(str::to_owned)),
        );
        session
            .run_blocking(&b"<14>1 - host  - - - -\r\n<14>1 - - - - - -\npartial"[..])
            .unwrap();
        drop(session);

        assert_eq!(seen, vec![Some("host".to_owned()), None]);
    }

    #[tokio::test]
    async fn async_reader() {
        let mut session = Session::new(
            &FramerConfig::with_mode(FramingMode::OctetCounting),
            ParserOptions::strict(),
            Collect::default(),
        );

        let stats = session.run(STREAM).await.unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.entries, 2);
        assert_eq!(session.handler().entries.len(), 2);
    }
}

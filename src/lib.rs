//! Codec for [RFC 5424](https://tools.ietf.org/html/rfc5424) Syslog messages and the
//! [RFC 5425](https://tools.ietf.org/html/rfc5425) octet-counting stream framing (plus the
//! legacy newline framing most TCP senders still use).
//!
//! Structured Data is fully supported, including repeated parameter names.
//!
//! Usually, you'll just call the (re-exported) `parse_message` function on a byte slice, or
//! hand a whole connection to a [`session::Session`].
//!
//! # Example
//!
//! A simple syslog server
//!
//! ```no_run
//! use std::net::UdpSocket;
//!
//! let s = UdpSocket::bind("127.0.0.1:10514").unwrap();
//! let mut buf = [0u8; 2048];
//! loop {
//!     let (data_read, _) = s.recv_from(&mut buf).unwrap();
//!     let entry = syslog::rfc5424::parse_message(&buf[..data_read]).unwrap();
//!     println!("{} {:?} {:?}", entry.priority(), entry.hostname(), entry.msg());
//! }
//! ```
//!
//! # Message bodies
//!
//! The MSG part is only known to be text when it starts with the UTF-8 BOM; anything else is
//! kept as opaque bytes in [`Body::Bytes`], with lossy text access when needed.

pub mod emitter;
mod error;
pub mod escape;
mod facility;
pub mod framing;
pub mod logger;
mod message;
mod priority;
pub mod rfc5424;
pub mod server;
pub mod session;
mod severity;
mod structured_data;
pub mod timestamp;

pub use error::{Error, FieldError, ParseError, ParseErrorKind, TimestampError};
pub use facility::Facility;
pub use framing::{Framer, FramerConfig, FramingError, FramingMode};
pub use message::{
    Body, Entry, EntryBuilder, BOM, MAX_APPNAME_LEN, MAX_HOSTNAME_LEN, MAX_MSGID_LEN,
    MAX_PROCID_LEN,
};
pub use priority::{Priority, MAX_PRIVAL};
pub use rfc5424::{parse_message, parse_message_with, ParserOptions};
pub use severity::Severity;
pub use structured_data::{Params, StructuredData, StructuredElement, MAX_SD_NAME_LEN};

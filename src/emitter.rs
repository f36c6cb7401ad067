//! Transport clients sending entries to a collector.
//!
//! Every emitter reconnects once when a send fails and retries the same
//! payload; a second failure is returned to the caller.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
#[cfg(unix)]
use std::os::unix::net::{UnixDatagram, UnixStream};
#[cfg(unix)]
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::framing::{frame, FramingMode};
use crate::{Entry, Error};

/// Default syslog port for UDP and plain TCP.
pub const DEFAULT_PORT: u16 = 514;

/// Local syslog daemon socket.
#[cfg(unix)]
pub const DEFAULT_UNIX_PATH: &str = "/dev/log";

pub trait Emitter {
    fn emit(&mut self, entry: &Entry) -> Result<(), Error>;

    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl<E: Emitter + ?Sized> Emitter for Box<E> {
    fn emit(&mut self, entry: &Entry) -> Result<(), Error> {
        (**self).emit(entry)
    }

    fn close(&mut self) -> Result<(), Error> {
        (**self).close()
    }
}

fn resolve<A: ToSocketAddrs>(addr: A) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    })
}

fn retry<S, C, F>(slot: &mut Option<S>, mut connect: C, mut send: F) -> Result<(), Error>
where
    C: FnMut() -> io::Result<S>,
    F: FnMut(&mut S) -> io::Result<()>,
{
    let first = match slot.as_mut() {
        Some(socket) => send(socket),
        None => Err(io::Error::new(io::ErrorKind::NotConnected, "not connected")),
    };

    let Err(err) = first else {
        return Ok(());
    };

    tracing::warn!(error = %err, "syslog send failed, reconnecting");
    *slot = None;
    let mut socket = connect()?;
    send(&mut socket)?;
    *slot = Some(socket);

    Ok(())
}

/// One entry per datagram, no framing.
#[derive(Debug)]
pub struct UdpEmitter {
    address: SocketAddr,
    socket: Option<UdpSocket>,
}

impl UdpEmitter {
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, Error> {
        let address = resolve(address)?;
        let socket = Self::open(address)?;

        Ok(Self {
            address,
            socket: Some(socket),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    fn open(address: SocketAddr) -> io::Result<UdpSocket> {
        let local: SocketAddr = if address.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(address)?;
        Ok(socket)
    }
}

impl Emitter for UdpEmitter {
    fn emit(&mut self, entry: &Entry) -> Result<(), Error> {
        let payload = entry.to_bytes();
        let address = self.address;

        retry(
            &mut self.socket,
            || Self::open(address),
            |socket| socket.send(&payload).map(|_| ()),
        )
    }

    fn close(&mut self) -> Result<(), Error> {
        self.socket = None;
        Ok(())
    }
}

#[cfg(unix)]
#[derive(Debug)]
enum UnixSocket {
    Datagram(UnixDatagram),
    Stream(UnixStream),
}

/// Local daemon over a Unix socket. Datagram sockets are preferred, stream
/// sockets get a NUL after every message.
#[cfg(unix)]
#[derive(Debug)]
pub struct UnixEmitter {
    path: PathBuf,
    socket: Option<UnixSocket>,
}

#[cfg(unix)]
impl UnixEmitter {
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let socket = Self::open(&path)?;

        Ok(Self {
            path,
            socket: Some(socket),
        })
    }

    /// Whether the daemon socket turned out to be a stream socket.
    pub fn is_stream(&self) -> bool {
        matches!(self.socket, Some(UnixSocket::Stream(_)))
    }

    fn open(path: &Path) -> io::Result<UnixSocket> {
        let datagram = UnixDatagram::unbound()?;
        match datagram.connect(path) {
            Ok(()) => Ok(UnixSocket::Datagram(datagram)),
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %err,
                    "datagram connect failed, falling back to stream"
                );
                UnixStream::connect(path).map(UnixSocket::Stream)
            }
        }
    }
}

#[cfg(unix)]
impl Emitter for UnixEmitter {
    fn emit(&mut self, entry: &Entry) -> Result<(), Error> {
        let payload = entry.to_bytes();
        let path = &self.path;

        retry(
            &mut self.socket,
            || Self::open(path),
            |socket| match socket {
                UnixSocket::Datagram(socket) => socket.send(&payload).map(|_| ()),
                UnixSocket::Stream(stream) => {
                    stream.write_all(&payload)?;
                    stream.write_all(b"\0")
                }
            },
        )
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(UnixSocket::Stream(stream)) = self.socket.take() {
            // the peer may be gone already
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Ok(())
    }
}

/// Opens the byte stream a [`StreamEmitter`] writes to. Implement this for
/// TLS or any other transport.
pub trait Connect {
    type Stream: Write;

    fn connect(&mut self) -> io::Result<Self::Stream>;
}

/// Plain TCP.
#[derive(Clone, Debug)]
pub struct TcpConnect {
    address: SocketAddr,
}

impl TcpConnect {
    pub fn new<A: ToSocketAddrs>(address: A) -> io::Result<Self> {
        Ok(Self {
            address: resolve(address)?,
        })
    }
}

impl Connect for TcpConnect {
    type Stream = TcpStream;

    fn connect(&mut self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.address)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Framed entries over a reliable byte stream.
pub struct StreamEmitter<C: Connect> {
    connector: C,
    stream: Option<C::Stream>,
    mode: FramingMode,
}

pub type TcpEmitter = StreamEmitter<TcpConnect>;

impl TcpEmitter {
    /// Octet counting is the safe choice for multi-line messages.
    pub fn tcp<A: ToSocketAddrs>(address: A, mode: FramingMode) -> Result<Self, Error> {
        StreamEmitter::connect(TcpConnect::new(address)?, mode)
    }
}

impl<C: Connect> StreamEmitter<C> {
    pub fn connect(mut connector: C, mode: FramingMode) -> Result<Self, Error> {
        let stream = connector.connect()?;

        Ok(Self {
            connector,
            stream: Some(stream),
            mode,
        })
    }

    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// Send one already framed payload.
    fn send(&mut self, payload: &Bytes) -> Result<(), Error> {
        let connector = &mut self.connector;
        retry(
            &mut self.stream,
            || connector.connect(),
            |stream| {
                stream.write_all(payload)?;
                stream.flush()
            },
        )
    }
}

impl<C: Connect> Emitter for StreamEmitter<C> {
    fn emit(&mut self, entry: &Entry) -> Result<(), Error> {
        let payload = frame(&entry.to_bytes(), self.mode);
        self.send(&payload)
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(mut stream) = self.stream.take() {
            stream.flush()?;
        }
        Ok(())
    }
}

impl<C: Connect> std::fmt::Debug for StreamEmitter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEmitter")
            .field("connected", &self.stream.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

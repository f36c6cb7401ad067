//! Minimal TCP collector: one [`Session`] per accepted connection.
//!
//! ```ignore
//! let config = ServerConfig::with_port(6514);
//! let server = Server::new(config, |_peer: SocketAddr| |entry: Entry| println!("{entry}"));
//! server.run(cancel).await?;
//! ```

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::framing::FramerConfig;
use crate::rfc5424::ParserOptions;
use crate::session::{Handler, Session};
use crate::Error;

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default port, syslog over TCP (privileged)
pub const DEFAULT_PORT: u16 = 514;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub address: String,

    /// Listen port
    pub port: u16,

    /// Framing used by every connection
    pub framing: FramerConfig,

    pub parser: ParserOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.into(),
            port: DEFAULT_PORT,
            framing: FramerConfig::default(),
            parser: ParserOptions::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Accepts connections and feeds each one through its own framer and parser.
///
/// `make_handler` is called once per connection with the peer address.
pub struct Server<F> {
    config: ServerConfig,
    make_handler: F,
}

impl<F, H> Server<F>
where
    F: Fn(SocketAddr) -> H,
    H: Handler + Send + 'static,
{
    pub fn new(config: ServerConfig, make_handler: F) -> Self {
        Self {
            config,
            make_handler,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn bind(&self) -> Result<TcpListener, Error> {
        let address = self.config.bind_address();
        TcpListener::bind(&address)
            .await
            .map_err(|source| Error::Bind { address, source })
    }

    /// Bind and serve until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), Error> {
        let listener = self.bind().await?;
        self.serve(listener, cancel).await
    }

    /// Serve on an already bound listener until `cancel` fires.
    pub async fn serve(
        &self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        tracing::info!(
            address = %listener.local_addr()?,
            framing = %self.config.framing.mode,
            max_frame_length = self.config.framing.max_frame_length,
            "syslog server listening"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer, cancel.child_token()),
                    Err(err) => tracing::warn!(error = %err, "syslog accept error"),
                }
            }
        }

        tracing::info!("syslog server stopped");

        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr, cancel: CancellationToken) {
        let mut session = Session::new(
            &self.config.framing,
            self.config.parser,
            (self.make_handler)(peer),
        );

        tracing::debug!(peer = %peer, "syslog connection accepted");

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(peer = %peer, "syslog connection cancelled");
                }
                result = session.run(stream) => {
                    // framing errors are logged by the session
                    if let Ok(stats) = result {
                        tracing::debug!(
                            peer = %peer,
                            frames = stats.frames,
                            entries = stats.entries,
                            errors = stats.errors,
                            "syslog connection closed"
                        );
                    }
                }
            }
        });
    }
}

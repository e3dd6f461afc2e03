//! TCP transport for display communication.
//!
//! AG Neovo displays with a LAN port accept the binary control protocol on
//! a plain TCP socket (port 5000 by default). [`TcpTransport`] wraps the
//! stream; [`TcpConnector`] remembers the endpoint so a client can open a
//! fresh stream every time it (re)connects.
//!
//! # Example
//!
//! ```no_run
//! use neovolib_transport::TcpConnector;
//! use neovolib_core::Connector;
//! use std::time::Duration;
//!
//! # async fn example() -> neovolib_core::Result<()> {
//! let connector = TcpConnector::new("192.168.1.50:5000")
//!     .with_timeout(Duration::from_secs(2));
//! let transport = connector.connect().await?;
//! assert!(transport.is_connected());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use neovolib_core::error::{Error, Result};
use neovolib_core::transport::{Connector, Transport};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, trace, warn};

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a single frame write may stall before the link is given up.
///
/// A display that stops draining its socket (mid power cycle, usually)
/// would otherwise block the IO task indefinitely.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// TCP transport to a single display.
///
/// The connection is established eagerly via [`connect`](TcpTransport::connect)
/// or [`connect_with_timeout`](TcpTransport::connect_with_timeout).
#[derive(Debug)]
pub struct TcpTransport {
    /// Open socket halves; `None` once closed.
    link: Option<Link>,
    /// Endpoint label for logs.
    addr: String,
}

/// Both halves of an open control socket plus traffic totals.
#[derive(Debug)]
struct Link {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    tx_bytes: u64,
    rx_bytes: u64,
}

impl Link {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Link {
            reader,
            writer,
            tx_bytes: 0,
            rx_bytes: 0,
        }
    }

    /// Write one whole frame. Frames are never split across calls.
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(frame).await?;
            writer.flush().await
        };
        match tokio::time::timeout(WRITE_TIMEOUT, write).await {
            Ok(Ok(())) => {
                self.tx_bytes += frame.len() as u64;
                Ok(())
            }
            Ok(Err(e)) => Err(classify_io_error(e)),
            Err(_) => Err(Error::Transport(format!(
                "write stalled for {} ms",
                WRITE_TIMEOUT.as_millis()
            ))),
        }
    }

    /// Read whatever the display has sent, waiting up to `timeout`.
    async fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let n = tokio::time::timeout(timeout, self.reader.read(buf))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(classify_io_error)?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        self.rx_bytes += n as u64;
        Ok(n)
    }
}

impl TcpTransport {
    /// Connect to a `host:port` endpoint using the default timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a `host:port` endpoint, giving up after `timeout`.
    ///
    /// Returns [`Error::Timeout`] if the handshake does not finish in time
    /// and [`Error::Transport`] if the display refuses the connection.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        debug!(addr, timeout_ms = timeout.as_millis(), "connecting to display");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(addr, error = %e, "display connection failed");
                return Err(map_connect_error(e, addr));
            }
            Err(_) => {
                warn!(addr, "display did not answer the connection in time");
                return Err(Error::Timeout);
            }
        };

        // Control frames are a handful of bytes; don't let Nagle hold them.
        if let Err(e) = stream.set_nodelay(true) {
            warn!(addr, error = %e, "TCP_NODELAY not set");
        }

        info!(addr, "display connected");
        Ok(Self::from_stream(stream, addr.to_string()))
    }

    /// Wrap an already-connected `TcpStream`.
    ///
    /// `addr` is only used as a label in logs.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        Self {
            link: Some(Link::new(stream)),
            addr,
        }
    }

    /// Get the address string this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Bytes written and read over the current link, `(0, 0)` once closed.
    pub fn traffic(&self) -> (u64, u64) {
        self.link
            .as_ref()
            .map_or((0, 0), |link| (link.tx_bytes, link.rx_bytes))
    }

    fn link(&mut self) -> Result<&mut Link> {
        self.link.as_mut().ok_or(Error::NotConnected)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        trace!(addr = %self.addr, frame = ?data, "tx");
        let result = self.link()?.write_frame(data).await;
        if let Err(e) = &result {
            warn!(addr = %self.addr, error = %e, "write to display failed");
        }
        result
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let result = self.link()?.read_some(buf, timeout).await;
        match &result {
            Ok(n) => trace!(addr = %self.addr, bytes = ?&buf[..*n], "rx"),
            Err(Error::Timeout) => {}
            Err(Error::ConnectionClosed) => info!(addr = %self.addr, "display hung up"),
            Err(e) => warn!(addr = %self.addr, error = %e, "read from display failed"),
        }
        result
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut link) = self.link.take() else {
            return Ok(());
        };
        // A display that already dropped us makes shutdown fail; the socket
        // is released either way.
        if let Err(e) = link.writer.shutdown().await {
            debug!(addr = %self.addr, error = %e, "shutdown after peer close");
        }
        info!(
            addr = %self.addr,
            tx_bytes = link.tx_bytes,
            rx_bytes = link.rx_bytes,
            "display connection closed"
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

/// Opens a [`TcpTransport`] to a fixed endpoint on every call.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    timeout: Duration,
}

impl TcpConnector {
    /// Create a connector for a `host:port` endpoint with the default
    /// connection timeout.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint this connector dials.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let transport = TcpTransport::connect_with_timeout(&self.addr, self.timeout).await?;
        Ok(Box::new(transport))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

/// Map a connection-time I/O error to the appropriate [`Error`] variant.
fn map_connect_error(e: io::Error, addr: &str) -> Error {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {}", addr))
        }
        _ => Error::Io(e),
    }
}

/// A reset or broken pipe means the display went away; anything else is
/// a local socket fault.
fn classify_io_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::ConnectionAborted => Error::ConnectionClosed,
        _ => Error::Io(e),
    }
}

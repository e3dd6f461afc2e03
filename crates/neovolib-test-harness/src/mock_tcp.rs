//! Mock display server for end-to-end testing over real sockets.
//!
//! [`MockTcpServer`] listens on a random localhost port, accepts a single
//! connection, and plays a request/response script against it. Responses
//! may be split into several writes to exercise partial-frame handling on
//! the client side.
//!
//! # Example
//!
//! ```
//! use neovolib_test_harness::MockTcpServer;
//!
//! # async fn example() -> neovolib_core::Result<()> {
//! let mut server = MockTcpServer::new().await?;
//!
//! // Power query for monitor 1, answered with "power on".
//! server.expect(
//!     &[0xA6, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x19, 0xBC],
//!     &[0x21, 0x01, 0x00, 0x00, 0x04, 0x01, 0x19, 0x02, 0x3E],
//! );
//! server.start();
//!
//! let addr = server.addr().to_string();
//! // ... connect a client to `addr` and issue the query ...
//! # Ok(())
//! # }
//! ```

use neovolib_core::error::{Error, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A scripted exchange: read `request`, then write each chunk of
/// `response` in turn.
#[derive(Debug, Clone)]
struct TcpExpectation {
    request: Vec<u8>,
    response: Vec<Vec<u8>>,
}

/// A mock display reachable over TCP.
///
/// After the script finishes the server either hangs up (see
/// [`hang_up_after_script`](MockTcpServer::hang_up_after_script)) or keeps
/// the socket open until the client closes it.
pub struct MockTcpServer {
    addr: String,
    listener: Option<TcpListener>,
    expectations: Vec<TcpExpectation>,
    hang_up: bool,
    chunk_delay: Duration,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockTcpServer {
    /// Bind a new mock server on a random localhost port.
    ///
    /// Connections are not accepted until [`start`](MockTcpServer::start)
    /// is called, allowing expectations to be loaded first. Clients that
    /// connect earlier wait in the listen backlog.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock TCP server: {}", e)))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();

        Ok(Self {
            addr,
            listener: Some(listener),
            expectations: Vec::new(),
            hang_up: false,
            chunk_delay: Duration::from_millis(5),
            server_handle: None,
        })
    }

    /// Reply to `request` with `response` in a single write.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expect_chunked(request, &[response]);
    }

    /// Reply to `request` with several writes, pausing briefly between
    /// them so the client observes separate reads.
    pub fn expect_chunked(&mut self, request: &[u8], chunks: &[&[u8]]) {
        self.expectations.push(TcpExpectation {
            request: request.to_vec(),
            response: chunks.iter().map(|c| c.to_vec()).collect(),
        });
    }

    /// Close the connection as soon as the script is done.
    pub fn hang_up_after_script(&mut self) {
        self.hang_up = true;
    }

    /// The `host:port` the server is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Start accepting a single client and play the script.
    ///
    /// Call [`wait`](MockTcpServer::wait) afterwards to collect the result.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let expectations = std::mem::take(&mut self.expectations);
        let hang_up = self.hang_up;
        let chunk_delay = self.chunk_delay;

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;

            for (i, expectation) in expectations.iter().enumerate() {
                let mut buf = vec![0u8; expectation.request.len()];
                stream
                    .read_exact(&mut buf)
                    .await
                    .map_err(|e| format!("expectation {}: read error: {}", i, e))?;

                if buf != expectation.request {
                    return Err(format!(
                        "expectation {}: request mismatch: expected {:02X?}, got {:02X?}",
                        i, expectation.request, buf
                    ));
                }

                for (n, chunk) in expectation.response.iter().enumerate() {
                    if n > 0 {
                        tokio::time::sleep(chunk_delay).await;
                    }
                    stream
                        .write_all(chunk)
                        .await
                        .map_err(|e| format!("expectation {}: write error: {}", i, e))?;
                    stream
                        .flush()
                        .await
                        .map_err(|e| format!("expectation {}: flush error: {}", i, e))?;
                }
            }

            if hang_up {
                return Ok(());
            }

            // Hold the socket until the client goes away.
            let mut sink = [0u8; 256];
            loop {
                match stream.read(&mut sink).await {
                    Ok(0) | Err(_) => return Ok(()),
                    Ok(n) => {
                        return Err(format!(
                            "unexpected data after script: {:02X?}",
                            &sink[..n]
                        ));
                    }
                }
            }
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the server task to finish and return any script error.
    pub async fn wait(self) -> std::result::Result<(), String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?,
            None => Ok(()),
        }
    }
}

//! NeovoBuilder -- fluent builder for constructing [`NeovoClient`] instances.
//!
//! Separates configuration from construction so that callers can set the
//! endpoint, monitor ID and retry policy before the client exists. Building
//! never opens a socket; call [`NeovoClient::connect`] afterwards.
//!
//! # Example
//!
//! ```no_run
//! use neovolib_sicp::builder::NeovoBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> neovolib_core::Result<()> {
//! let client = NeovoBuilder::new()
//!     .host("192.168.1.50")
//!     .monitor_id(1)
//!     .command_timeout(Duration::from_millis(300))
//!     .build()?;
//! client.connect().await?;
//! let power = client.get_power().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use neovolib_core::error::{Error, Result};
use neovolib_core::transport::Connector;
use neovolib_transport::TcpConnector;

use crate::client::{ClientConfig, NeovoClient};

/// Default TCP port of the LAN control service.
pub const DEFAULT_PORT: u16 = 5000;

/// Default time allowed for the TCP handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fluent builder for [`NeovoClient`].
///
/// Defaults: port 5000, monitor ID 1, 500 ms command timeout, 2 retries.
#[derive(Debug, Clone)]
pub struct NeovoBuilder {
    host: Option<String>,
    port: u16,
    config: ClientConfig,
    connect_timeout: Duration,
}

impl Default for NeovoBuilder {
    fn default() -> Self {
        NeovoBuilder {
            host: None,
            port: DEFAULT_PORT,
            config: ClientConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl NeovoBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display's host name or IP address.
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Set the TCP port (default: 5000).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set host and port from a `host:port` string.
    ///
    /// A string without a port sets the host only.
    pub fn address(mut self, address: &str) -> Result<Self> {
        match address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.ends_with(':') => {
                let port = port.parse().map_err(|_| {
                    Error::InvalidParameter(format!("invalid port in address: {address}"))
                })?;
                self.host = Some(host.trim_matches(['[', ']']).to_string());
                self.port = port;
            }
            _ => self.host = Some(address.to_string()),
        }
        Ok(self)
    }

    /// Set the monitor ID addressed in every frame (default: 1).
    pub fn monitor_id(mut self, id: u8) -> Self {
        self.config.monitor_id = id;
        self
    }

    /// Set the time to wait for each reply before retransmitting
    /// (default: 500 ms).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set the number of retransmissions after the first attempt
    /// (default: 2).
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Set the time allowed for the TCP handshake (default: 5 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build a [`NeovoClient`] with a caller-provided connector.
    ///
    /// This is the entry point for testing (pass a `MockConnector` from
    /// `neovolib-test-harness`) and for custom transports. Host and port
    /// settings are ignored.
    pub fn build_with_connector(self, connector: Box<dyn Connector>) -> NeovoClient {
        NeovoClient::new(connector, self.config)
    }

    /// Build a [`NeovoClient`] that connects over TCP.
    ///
    /// Requires that [`host()`](Self::host) or [`address()`](Self::address)
    /// has been called.
    pub fn build(self) -> Result<NeovoClient> {
        let host = self
            .host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| Error::InvalidParameter("host is required for build()".into()))?;
        let addr = if host.contains(':') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        };

        let connector = TcpConnector::new(addr).with_timeout(self.connect_timeout);
        Ok(self.build_with_connector(Box::new(connector)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neovolib_core::ConnectionState;
    use neovolib_test_harness::MockConnector;
    use std::sync::atomic::Ordering;

    #[test]
    fn builder_defaults() {
        let client = NeovoBuilder::new().host("10.0.0.5").build().unwrap();
        assert_eq!(client.endpoint(), "tcp://10.0.0.5:5000");
        assert_eq!(client.config(), &ClientConfig::default());
        assert_eq!(client.config().monitor_id, 1);
        assert_eq!(client.config().command_timeout, Duration::from_millis(500));
        assert_eq!(client.config().retries, 2);
    }

    #[test]
    fn builder_fluent_chain() {
        let client = NeovoBuilder::new()
            .host("display.local")
            .port(5001)
            .monitor_id(7)
            .command_timeout(Duration::from_millis(250))
            .retries(4)
            .connect_timeout(Duration::from_secs(1))
            .build()
            .unwrap();

        assert_eq!(client.endpoint(), "tcp://display.local:5001");
        assert_eq!(
            client.config(),
            &ClientConfig {
                monitor_id: 7,
                command_timeout: Duration::from_millis(250),
                retries: 4,
            }
        );
    }

    #[test]
    fn builder_host_required() {
        assert!(matches!(
            NeovoBuilder::new().build(),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            NeovoBuilder::new().host("  ").build(),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn builder_address_parsing() {
        let client = NeovoBuilder::new()
            .address("192.168.1.50:5002")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), "tcp://192.168.1.50:5002");

        let client = NeovoBuilder::new()
            .address("192.168.1.50")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), "tcp://192.168.1.50:5000");

        let client = NeovoBuilder::new()
            .address("[fe80::1]:5003")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), "tcp://[fe80::1]:5003");

        assert!(NeovoBuilder::new().address("host:notaport").is_err());
    }

    #[tokio::test]
    async fn building_does_not_connect() {
        let connector = MockConnector::new();
        let attempts = connector.attempts();
        let client = NeovoBuilder::new().build_with_connector(Box::new(connector));

        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert_eq!(client.endpoint(), "mock://display");
    }
}

//! NeovoClient -- connection manager and command API for one display.
//!
//! A client owns a [`Connector`] and, while connected, the IO task that
//! holds the transport. Commands may be issued concurrently from any
//! number of tasks; they are serialized onto the wire in call order.
//!
//! Connection changes are published twice: as [`DisplayEvent`]s on a
//! broadcast channel (together with reports and diagnostics), and as the
//! current [`ConnectionState`] on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};

use neovolib_core::error::{Error, Result};
use neovolib_core::events::DisplayEvent;
use neovolib_core::transport::Connector;
use neovolib_core::types::{ConnectionState, DeviceInfoItem, PowerState, Volume};

use crate::commands::{self, Command};
use crate::io::{DisplayIo, IoConfig, spawn_io_task};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Per-client protocol settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Monitor ID placed in every outbound frame.
    pub monitor_id: u8,
    /// Time to wait for a reply before retransmitting.
    pub command_timeout: Duration,
    /// Retransmissions after the first attempt.
    pub retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            monitor_id: 1,
            command_timeout: Duration::from_millis(500),
            retries: 2,
        }
    }
}

/// A client for one AG Neovo display.
///
/// Constructed via [`NeovoBuilder`](crate::builder::NeovoBuilder). Building
/// does not connect; call [`connect()`](NeovoClient::connect) first. Every
/// command fails with [`Error::NotConnected`] while disconnected, without
/// touching the network.
pub struct NeovoClient {
    connector: Box<dyn Connector>,
    config: ClientConfig,
    io: Mutex<Option<DisplayIo>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    event_tx: broadcast::Sender<DisplayEvent>,
}

impl Drop for NeovoClient {
    fn drop(&mut self) {
        if let Some(io) = self.io.get_mut().take() {
            io.cancel.cancel();
            // The task may be parked in a read that ignores cancellation.
            io.task.abort();
        }
    }
}

impl NeovoClient {
    /// Create a disconnected client.
    ///
    /// Callers should normally use the builder instead.
    pub fn new(connector: Box<dyn Connector>, config: ClientConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        NeovoClient {
            connector,
            config,
            io: Mutex::new(None),
            state_tx: Arc::new(state_tx),
            event_tx,
        }
    }

    /// Protocol settings this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Human-readable description of the endpoint.
    pub fn endpoint(&self) -> String {
        self.connector.describe()
    }

    /// Open the connection.
    ///
    /// Does nothing if already connected. On failure the client stays
    /// disconnected, emits [`DisplayEvent::Disconnected`] with the cause,
    /// and returns the error.
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.io.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        // Reap the task of a connection that dropped on its own.
        if let Some(stale) = slot.take() {
            stale.shutdown().await;
        }

        let endpoint = self.connector.describe();
        info!(%endpoint, "connecting");
        self.state_tx.send_replace(ConnectionState::Connecting);

        match self.connector.connect().await {
            Ok(transport) => {
                self.state_tx.send_replace(ConnectionState::Connected);
                let _ = self.event_tx.send(DisplayEvent::Connected);
                *slot = Some(spawn_io_task(
                    transport,
                    IoConfig {
                        command_timeout: self.config.command_timeout,
                        retries: self.config.retries,
                    },
                    self.event_tx.clone(),
                    Arc::clone(&self.state_tx),
                ));
                info!(%endpoint, "connected");
                Ok(())
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "connection failed");
                self.state_tx.send_replace(ConnectionState::Disconnected);
                let _ = self.event_tx.send(DisplayEvent::Disconnected {
                    cause: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    /// Close the connection, failing any outstanding commands with
    /// [`Error::ConnectionClosed`].
    ///
    /// Emits [`DisplayEvent::Disconnected`] if the client was connected.
    pub async fn disconnect(&self) {
        let mut slot = self.io.lock().await;
        if let Some(io) = slot.take() {
            debug!("disconnect requested");
            io.shutdown().await;
        }
    }

    /// Returns `true` while the connection is open.
    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to connection, report and diagnostic events.
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.event_tx.subscribe()
    }

    /// Watch the connection state.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Send an arbitrary command and await its outcome.
    ///
    /// Returns the response payload (without the echoed command code) for
    /// queries, or `None` for commands answered by an acknowledgement.
    pub async fn execute(&self, command: &Command) -> Result<Option<Vec<u8>>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let packet = command.encode(self.config.monitor_id)?;

        let handle = {
            let slot = self.io.lock().await;
            slot.as_ref()
                .map(|io| io.handle.clone())
                .ok_or(Error::NotConnected)?
        };
        handle
            .command(command.code, packet, command.expected_response)
            .await
    }

    async fn query(&self, command: &Command) -> Result<Vec<u8>> {
        self.execute(command).await?.ok_or_else(|| {
            Error::Protocol(format!(
                "command 0x{:02X} completed without a payload",
                command.code
            ))
        })
    }

    // ---------------------------------------------------------------
    // Typed operations
    // ---------------------------------------------------------------

    /// Switch the display on or into standby.
    pub async fn set_power(&self, state: PowerState) -> Result<()> {
        self.execute(&commands::power_set(state)).await.map(|_| ())
    }

    /// Read the power state.
    pub async fn get_power(&self) -> Result<PowerState> {
        let data = self.query(&commands::power_get()).await?;
        commands::parse_power_response(&data)
    }

    /// Select an input source by raw code.
    pub async fn set_input(&self, source: u8) -> Result<()> {
        self.execute(&commands::input_set(source)).await.map(|_| ())
    }

    /// Read the raw code of the current input source.
    pub async fn get_input(&self) -> Result<u8> {
        let data = self.query(&commands::input_get()).await?;
        commands::parse_input_response(&data)
    }

    /// Set speaker and line-out volume, each clamped to `0..=100`.
    pub async fn set_volume(&self, volume: Volume) -> Result<()> {
        self.execute(&commands::volume_set(volume)).await.map(|_| ())
    }

    /// Read speaker and line-out volume.
    pub async fn get_volume(&self) -> Result<Volume> {
        let data = self.query(&commands::volume_get()).await?;
        commands::parse_volume_response(&data)
    }

    /// Read a platform/version string.
    pub async fn get_device_info(&self, item: DeviceInfoItem) -> Result<String> {
        let data = self.query(&commands::device_info(item)).await?;
        commands::parse_text_response(&data)
    }

    /// Read the operating-hours counter.
    pub async fn get_operating_hours(&self) -> Result<u16> {
        let data = self.query(&commands::operating_hours()).await?;
        commands::parse_hours_response(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_reply;
    use neovolib_core::AckStatus;
    use neovolib_test_harness::{MockConnector, MockTcpServer, MockTransport};
    use neovolib_transport::TcpConnector;
    use std::sync::atomic::Ordering;

    const MONITOR: u8 = 0x01;

    fn fast_config() -> ClientConfig {
        ClientConfig {
            monitor_id: MONITOR,
            command_timeout: Duration::from_millis(100),
            retries: 0,
        }
    }

    fn packet(cmd: Command) -> Vec<u8> {
        cmd.encode(MONITOR).unwrap()
    }

    fn client_with(mock: MockTransport) -> NeovoClient {
        NeovoClient::new(Box::new(MockConnector::with_transport(mock)), fast_config())
    }

    async fn next_event(rx: &mut broadcast::Receiver<DisplayEvent>) -> DisplayEvent {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = rx.recv().await.unwrap();
                if !event.is_diagnostic() {
                    return event;
                }
            }
        })
        .await
        .expect("no event within 2s")
    }

    #[tokio::test]
    async fn commands_fail_fast_when_disconnected() {
        let connector = MockConnector::new();
        let attempts = connector.attempts();
        let client = NeovoClient::new(Box::new(connector), fast_config());

        assert!(matches!(client.get_power().await, Err(Error::NotConnected)));
        assert!(matches!(
            client.set_volume(Volume::uniform(10)).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            client.execute(&commands::input_get()).await,
            Err(Error::NotConnected)
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_publishes_state_and_event() {
        let client = client_with(MockTransport::new());
        let mut events = client.subscribe();
        let state = client.subscribe_state();

        client.connect().await.unwrap();
        assert!(client.is_connected());
        assert_eq!(*state.borrow(), ConnectionState::Connected);
        assert_eq!(next_event(&mut events).await, DisplayEvent::Connected);
    }

    #[tokio::test]
    async fn connect_is_a_no_op_when_connected() {
        let connector = MockConnector::with_transport(MockTransport::new());
        let attempts = connector.attempts();
        let client = NeovoClient::new(Box::new(connector), fast_config());

        client.connect().await.unwrap();
        client.connect().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_failure_reports_cause() {
        let connector = MockConnector::new();
        connector.push_refusal();
        let client = NeovoClient::new(Box::new(connector), fast_config());
        let mut events = client.subscribe();

        let result = client.connect().await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        match next_event(&mut events).await {
            DisplayEvent::Disconnected { cause: Some(cause) } => {
                assert!(cause.contains("refused"));
            }
            other => panic!("expected Disconnected with cause, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn typed_operations() {
        let mut mock = MockTransport::new();
        mock.expect(
            &packet(commands::power_get()),
            &encode_reply(MONITOR, &[0x19, 0x02]).unwrap(),
        );
        mock.expect(
            &packet(commands::input_get()),
            &encode_reply(MONITOR, &[0xAD, 0x0D, 0x00, 0x00, 0x00]).unwrap(),
        );
        mock.expect(
            &packet(commands::volume_get()),
            &encode_reply(MONITOR, &[0x45, 0x1E, 0x28]).unwrap(),
        );
        mock.expect(
            &packet(commands::device_info(DeviceInfoItem::ModelNumber)),
            &encode_reply(MONITOR, b"\xA1QM-55\0\0\0").unwrap(),
        );
        mock.expect(
            &packet(commands::device_info(DeviceInfoItem::FirmwareVersion)),
            &encode_reply(MONITOR, b"\xA1 V1.0.3 \0").unwrap(),
        );
        mock.expect(
            &packet(commands::operating_hours()),
            &encode_reply(MONITOR, &[0x0F, 0x02, 0x01, 0x2C]).unwrap(),
        );
        let handle = mock.handle();
        let client = client_with(mock);
        client.connect().await.unwrap();

        assert_eq!(client.get_power().await.unwrap(), PowerState::On);
        assert_eq!(client.get_input().await.unwrap(), 0x0D);
        assert_eq!(client.get_volume().await.unwrap(), Volume::new(30, 40));
        assert_eq!(
            client
                .get_device_info(DeviceInfoItem::ModelNumber)
                .await
                .unwrap(),
            "QM-55"
        );
        assert_eq!(
            client
                .get_device_info(DeviceInfoItem::FirmwareVersion)
                .await
                .unwrap(),
            "V1.0.3"
        );
        assert_eq!(client.get_operating_hours().await.unwrap(), 300);
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn set_operations_complete_on_ack() {
        let ack = encode_reply(MONITOR, &[0x00, 0x00]).unwrap();
        let mut mock = MockTransport::new();
        mock.expect(&packet(commands::power_set(PowerState::On)), &ack);
        mock.expect(&packet(commands::input_set(0x0D)), &ack);
        mock.expect(
            &[0xA6, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x44, 100, 20, 0x97],
            &ack,
        );
        let handle = mock.handle();
        let client = client_with(mock);
        client.connect().await.unwrap();

        client.set_power(PowerState::On).await.unwrap();
        client.set_input(0x0D).await.unwrap();
        client
            .set_volume(Volume {
                speaker: 150,
                line_out: 20,
            })
            .await
            .unwrap();
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn rejection_surfaces_status() {
        let mut mock = MockTransport::new();
        mock.expect(
            &packet(commands::input_get()),
            &encode_reply(MONITOR, &[0x00, 0x03]).unwrap(),
        );
        let client = client_with(mock);
        client.connect().await.unwrap();

        let err = client.get_input().await.unwrap_err();
        assert!(matches!(err, Error::DeviceRejected(AckStatus::Canceled)));
        assert!(err.is_benign_rejection());
        assert_eq!(
            err.to_string(),
            "command rejected by display: Command canceled or NACK"
        );
        // The connection survives a rejection.
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn execute_returns_raw_payload() {
        let mut mock = MockTransport::new();
        let custom = Command::query(0x33, vec![0x01]);
        mock.expect(&packet(custom.clone()), &encode_reply(MONITOR, &[0x33, 0xAB]).unwrap());
        let client = client_with(mock);
        client.connect().await.unwrap();

        assert_eq!(client.execute(&custom).await.unwrap(), Some(vec![0xAB]));
    }

    #[tokio::test]
    async fn disconnect_emits_single_event() {
        let client = client_with(MockTransport::new());
        let mut events = client.subscribe();
        client.connect().await.unwrap();
        assert_eq!(next_event(&mut events).await, DisplayEvent::Connected);

        client.disconnect().await;
        assert!(!client.is_connected());
        assert_eq!(
            next_event(&mut events).await,
            DisplayEvent::Disconnected { cause: None }
        );

        // Already disconnected: nothing more is emitted.
        client.disconnect().await;
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn disconnect_fails_pending_commands() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let client = Arc::new(NeovoClient::new(
            Box::new(MockConnector::with_transport(mock)),
            ClientConfig {
                command_timeout: Duration::from_secs(5),
                ..fast_config()
            },
        ));
        client.connect().await.unwrap();

        let pending: Vec<_> = (0..3)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.get_volume().await })
            })
            .collect();
        tokio::time::timeout(Duration::from_secs(1), handle.wait_for_sends(1))
            .await
            .unwrap();

        client.disconnect().await;
        for task in pending {
            assert!(matches!(
                task.await.unwrap(),
                Err(Error::ConnectionClosed)
            ));
        }
    }

    #[tokio::test]
    async fn reconnects_after_remote_close() {
        let first = MockTransport::new();
        let first_handle = first.handle();
        let mut second = MockTransport::new();
        second.expect(
            &packet(commands::power_get()),
            &encode_reply(MONITOR, &[0x19, 0x01]).unwrap(),
        );

        let connector = MockConnector::with_transport(first);
        connector.push_transport(second);
        let client = NeovoClient::new(Box::new(connector), fast_config());
        let mut events = client.subscribe();

        client.connect().await.unwrap();
        assert_eq!(next_event(&mut events).await, DisplayEvent::Connected);

        first_handle.close_remote();
        assert_eq!(
            next_event(&mut events).await,
            DisplayEvent::Disconnected { cause: None }
        );
        assert!(!client.is_connected());
        assert!(matches!(client.get_power().await, Err(Error::NotConnected)));

        client.connect().await.unwrap();
        assert_eq!(client.get_power().await.unwrap(), PowerState::Off);
    }

    #[tokio::test]
    async fn end_to_end_over_tcp() {
        let mut server = MockTcpServer::new().await.unwrap();
        let reply = [0x21, 0x01, 0x00, 0x00, 0x04, 0x01, 0x19, 0x02, 0x3E];
        server.expect_chunked(
            &[0xA6, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x19, 0xBC],
            &[&reply[..3], &reply[3..]],
        );
        server.expect(
            &packet(commands::operating_hours()),
            &encode_reply(MONITOR, &[0x0F, 0x02, 0x01, 0x2C]).unwrap(),
        );
        server.start();

        let connector = TcpConnector::new(server.addr());
        let client = NeovoClient::new(Box::new(connector), ClientConfig::default());
        client.connect().await.unwrap();

        assert_eq!(client.get_power().await.unwrap(), PowerState::On);
        assert_eq!(client.get_operating_hours().await.unwrap(), 300);

        client.disconnect().await;
        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn tcp_connect_refused() {
        // Bind and drop a listener to find a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = NeovoClient::new(Box::new(TcpConnector::new(&addr)), fast_config());
        assert!(client.connect().await.is_err());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }
}

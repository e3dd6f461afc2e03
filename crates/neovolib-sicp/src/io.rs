//! IO task and request dispatcher for a SICP connection.
//!
//! Every command issued on a [`NeovoClient`](crate::client::NeovoClient) is
//! handed to a single IO task that owns the transport. The task keeps a
//! FIFO queue with at most one request on the wire, retransmits a request
//! whose reply does not arrive in time, decodes inbound frames, and routes
//! them either to the in-flight request or out as unsolicited reports.
//!
//! When the link closes (either side) the task settles every outstanding
//! request with [`Error::ConnectionClosed`], publishes
//! [`ConnectionState::Disconnected`] and emits exactly one
//! [`DisplayEvent::Disconnected`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use neovolib_core::error::{Error, Result};
use neovolib_core::events::DisplayEvent;
use neovolib_core::transport::Transport;
use neovolib_core::types::{AckStatus, ConnectionState, Frame};

use crate::frame::{self, ACK, DecodeResult};

/// Payload delivered to a settled request: `None` for acknowledgements.
pub(crate) type Reply = Result<Option<Vec<u8>>>;

/// Configuration for the IO task.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IoConfig {
    /// How long to wait for a reply before retransmitting.
    pub command_timeout: Duration,
    /// Retransmissions after the first attempt.
    pub retries: u32,
}

/// A command handed from the client to the IO task.
pub(crate) struct Request {
    /// Command code, for events and logs.
    pub command: u8,
    /// Encoded frame, sent unchanged on every attempt.
    pub packet: Vec<u8>,
    /// Leading data byte of the answering frame; `None` for set commands.
    pub expected_response: Option<u8>,
    pub reply: oneshot::Sender<Reply>,
}

struct PendingRequest {
    id: u64,
    command: u8,
    packet: Vec<u8>,
    expected_response: Option<u8>,
    attempts_remaining: u32,
    reply: oneshot::Sender<Reply>,
}

/// Single-flight FIFO request queue.
///
/// Pure state machine: methods that put a request on the wire return the
/// bytes to write and leave the write itself to the caller.
pub(crate) struct Dispatcher {
    config: IoConfig,
    queue: VecDeque<PendingRequest>,
    current: Option<PendingRequest>,
    deadline: Option<Instant>,
    next_id: u64,
    event_tx: broadcast::Sender<DisplayEvent>,
}

impl Dispatcher {
    pub fn new(config: IoConfig, event_tx: broadcast::Sender<DisplayEvent>) -> Self {
        Dispatcher {
            config,
            queue: VecDeque::new(),
            current: None,
            deadline: None,
            next_id: 1,
            event_tx,
        }
    }

    /// Append a request to the queue.
    pub fn enqueue(&mut self, request: Request) {
        let id = self.next_id;
        self.next_id += 1;
        debug!(
            request_id = id,
            command = request.command,
            queued = self.queue.len(),
            "request queued"
        );
        self.queue.push_back(PendingRequest {
            id,
            command: request.command,
            packet: request.packet,
            expected_response: request.expected_response,
            attempts_remaining: self.config.retries + 1,
            reply: request.reply,
        });
    }

    /// Move the queue head onto the wire if nothing is in flight.
    pub fn advance(&mut self, now: Instant) -> Option<Vec<u8>> {
        if self.current.is_some() {
            return None;
        }
        self.current = self.queue.pop_front();
        self.transmit(now)
    }

    /// Deadline of the in-flight request, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` while a request is on the wire.
    pub fn in_flight(&self) -> bool {
        self.current.is_some()
    }

    /// Number of requests waiting behind the in-flight one.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Handle expiry of the in-flight deadline.
    ///
    /// Retransmits while attempts remain; otherwise fails the request with
    /// [`Error::Timeout`] and advances.
    pub fn on_timeout(&mut self, now: Instant) -> Option<Vec<u8>> {
        let current = self.current.as_ref()?;
        if self.deadline.is_some_and(|d| d > now) {
            return None;
        }

        if current.attempts_remaining > 0 {
            debug!(
                request_id = current.id,
                command = current.command,
                attempts_remaining = current.attempts_remaining,
                "no reply, retransmitting"
            );
            let _ = self.event_tx.send(DisplayEvent::Retry {
                request_id: current.id,
                command: current.command,
                attempts_remaining: current.attempts_remaining,
            });
            return self.transmit(now);
        }

        let (id, command) = (current.id, current.command);
        warn!(request_id = id, command, "command timed out");
        let _ = self.event_tx.send(DisplayEvent::Timeout {
            request_id: id,
            command,
        });
        self.settle(Err(Error::Timeout));
        self.advance(now)
    }

    /// Route a decoded frame.
    ///
    /// Frames that do not settle the in-flight request are emitted as
    /// [`DisplayEvent::Report`].
    pub fn on_frame(&mut self, frame: Frame, now: Instant) -> Option<Vec<u8>> {
        let Some(current) = self.current.as_ref() else {
            self.report(frame);
            return None;
        };

        match frame.code() {
            Some(ACK) => {
                let status = AckStatus::from_byte(frame.data.get(1).copied().unwrap_or(0xFF));
                if !status.is_success() {
                    debug!(
                        request_id = current.id,
                        command = current.command,
                        %status,
                        "command rejected"
                    );
                    self.settle(Err(Error::DeviceRejected(status)));
                    return self.advance(now);
                }
                if current.expected_response.is_none() {
                    self.settle(Ok(None));
                    return self.advance(now);
                }
                // A query also gets a plain ack on some firmware; keep
                // waiting for the data frame.
                debug!(
                    request_id = current.id,
                    command = current.command,
                    "ack while awaiting query reply, ignored"
                );
                None
            }
            Some(code) if current.expected_response == Some(code) => {
                self.settle(Ok(Some(frame.payload().to_vec())));
                self.advance(now)
            }
            _ => {
                self.report(frame);
                None
            }
        }
    }

    /// Fail the in-flight request and every queued one, in order, with
    /// [`Error::ConnectionClosed`]. Returns how many were settled.
    pub fn flush(&mut self) -> usize {
        let mut settled = 0;
        if self.current.is_some() {
            self.settle(Err(Error::ConnectionClosed));
            settled += 1;
        }
        while let Some(pending) = self.queue.pop_front() {
            let _ = pending.reply.send(Err(Error::ConnectionClosed));
            settled += 1;
        }
        settled
    }

    fn transmit(&mut self, now: Instant) -> Option<Vec<u8>> {
        let total_attempts = self.config.retries + 1;
        let current = self.current.as_mut()?;
        current.attempts_remaining = current.attempts_remaining.saturating_sub(1);
        self.deadline = Some(now + self.config.command_timeout);

        let attempt = total_attempts - current.attempts_remaining;
        debug!(
            request_id = current.id,
            command = current.command,
            attempt,
            attempts_remaining = current.attempts_remaining,
            "transmit"
        );
        let _ = self.event_tx.send(DisplayEvent::Transmit {
            request_id: current.id,
            command: current.command,
            attempt,
            attempts_remaining: current.attempts_remaining,
            packet: current.packet.clone(),
        });
        Some(current.packet.clone())
    }

    fn settle(&mut self, result: Reply) {
        self.deadline = None;
        let Some(pending) = self.current.take() else {
            return;
        };

        match &result {
            Ok(response) => {
                let _ = self.event_tx.send(DisplayEvent::CommandSucceeded {
                    request_id: pending.id,
                    command: pending.command,
                    response: response.clone(),
                });
            }
            Err(Error::DeviceRejected(status)) => {
                let _ = self.event_tx.send(DisplayEvent::CommandFailed {
                    request_id: pending.id,
                    command: pending.command,
                    status: *status,
                });
            }
            Err(_) => {}
        }

        // The caller may have given up on the reply; nothing to do then.
        let _ = pending.reply.send(result);
    }

    fn report(&self, frame: Frame) {
        debug!(
            monitor_id = frame.monitor_id,
            code = ?frame.code(),
            "unsolicited frame"
        );
        let _ = self.event_tx.send(DisplayEvent::Report(frame));
    }
}

/// Cloneable sender side of the IO task's request channel.
#[derive(Clone)]
pub(crate) struct IoHandle {
    request_tx: mpsc::UnboundedSender<Request>,
}

impl IoHandle {
    /// Queue an encoded command and await its settlement.
    pub async fn command(
        &self,
        command: u8,
        packet: Vec<u8>,
        expected_response: Option<u8>,
    ) -> Reply {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .send(Request {
                command,
                packet,
                expected_response,
                reply: reply_tx,
            })
            .map_err(|_| Error::NotConnected)?;

        reply_rx.await.unwrap_or(Err(Error::ConnectionClosed))
    }
}

/// Handle to the IO task. Stored inside `NeovoClient` while connected.
pub(crate) struct DisplayIo {
    pub handle: IoHandle,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl DisplayIo {
    /// Cancel the IO task and wait for its teardown to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawn the IO task for a freshly opened transport.
pub(crate) fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    event_tx: broadcast::Sender<DisplayEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
) -> DisplayIo {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let dispatcher = Dispatcher::new(config, event_tx.clone());

    let task = tokio::spawn(io_loop(
        transport,
        dispatcher,
        request_rx,
        cancel.clone(),
        event_tx,
        state_tx,
    ));

    DisplayIo {
        handle: IoHandle { request_tx },
        cancel,
        task,
    }
}

/// How long a single idle read waits before the loop re-arms it.
const READ_POLL: Duration = Duration::from_secs(1);

/// Why the loop stopped.
enum Exit {
    Cancelled,
    RemoteClosed,
    Failed(Error),
}

/// The IO loop. Runs as a spawned Tokio task until cancelled or the link
/// drops.
///
/// `select!` is biased so that cancellation wins over everything, and
/// inbound data is processed before a deadline that expired while it was
/// arriving.
async fn io_loop(
    mut transport: Box<dyn Transport>,
    mut dispatcher: Dispatcher,
    mut request_rx: mpsc::UnboundedReceiver<Request>,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<DisplayEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
) {
    let mut rx_buf: Vec<u8> = Vec::new();
    let mut read_buf = [0u8; 512];

    let exit = loop {
        let deadline = dispatcher.deadline();

        let outgoing: Vec<Vec<u8>> = tokio::select! {
            biased;

            _ = cancel.cancelled() => break Exit::Cancelled,

            result = transport.receive(&mut read_buf, READ_POLL) => match result {
                Ok(n) => {
                    trace!(bytes = ?&read_buf[..n], "received");
                    let _ = event_tx.send(DisplayEvent::RawReceived {
                        bytes: read_buf[..n].to_vec(),
                    });
                    rx_buf.extend_from_slice(&read_buf[..n]);
                    drain_frames(&mut rx_buf, &mut dispatcher, &event_tx)
                }
                Err(Error::Timeout) => Vec::new(),
                Err(Error::ConnectionClosed) => break Exit::RemoteClosed,
                Err(e) => break Exit::Failed(e),
            },

            _ = sleep_until(deadline) => {
                dispatcher.on_timeout(Instant::now()).into_iter().collect()
            }

            request = request_rx.recv() => match request {
                Some(request) => {
                    dispatcher.enqueue(request);
                    dispatcher.advance(Instant::now()).into_iter().collect()
                }
                // The client handle is gone.
                None => break Exit::Cancelled,
            },
        };

        if let Err(e) = send_all(&mut *transport, outgoing).await {
            break Exit::Failed(e);
        }
    };

    let cause = match exit {
        Exit::Cancelled => {
            debug!("IO task cancelled");
            None
        }
        Exit::RemoteClosed => {
            info!("display closed the connection");
            None
        }
        Exit::Failed(e) => {
            warn!(error = %e, "connection lost");
            Some(e.to_string())
        }
    };

    state_tx.send_replace(ConnectionState::Disconnected);

    debug!(
        in_flight = dispatcher.in_flight(),
        queued = dispatcher.queued(),
        "tearing down"
    );
    let mut flushed = dispatcher.flush();
    request_rx.close();
    while let Ok(request) = request_rx.try_recv() {
        let _ = request.reply.send(Err(Error::ConnectionClosed));
        flushed += 1;
    }
    if flushed > 0 {
        debug!(flushed, "outstanding requests failed on disconnect");
    }

    if let Err(e) = transport.close().await {
        debug!(error = %e, "error closing transport");
    }

    info!("disconnected");
    let _ = event_tx.send(DisplayEvent::Disconnected { cause });
}

/// Decode every complete frame in `rx_buf` and route it. Returns the
/// packets the dispatcher wants written as a result.
///
/// Noise is consumed as it is found, so on return `rx_buf` holds at most
/// one marker-led partial frame (under 261 bytes).
fn drain_frames(
    rx_buf: &mut Vec<u8>,
    dispatcher: &mut Dispatcher,
    event_tx: &broadcast::Sender<DisplayEvent>,
) -> Vec<Vec<u8>> {
    let mut outgoing = Vec::new();
    loop {
        match frame::decode_frame(rx_buf) {
            DecodeResult::Frame(frame, consumed) => {
                rx_buf.drain(..consumed);
                trace!(monitor_id = frame.monitor_id, data = ?frame.data, "frame");
                let _ = event_tx.send(DisplayEvent::FrameReceived(frame.clone()));
                outgoing.extend(dispatcher.on_frame(frame, Instant::now()));
            }
            DecodeResult::Malformed(fault, consumed) => {
                rx_buf.drain(..consumed);
                let error = Error::from(fault);
                warn!(%error, "discarding frame");
            }
            DecodeResult::Garbage(consumed) => {
                trace!(bytes = ?&rx_buf[..consumed], "skipping noise");
                rx_buf.drain(..consumed);
            }
            DecodeResult::Incomplete => break,
        }
    }

    outgoing
}

async fn send_all(transport: &mut dyn Transport, packets: Vec<Vec<u8>>) -> Result<()> {
    for packet in packets {
        trace!(bytes = ?packet, "sending");
        transport.send(&packet).await?;
    }
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

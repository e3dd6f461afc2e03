//! Background state poller.
//!
//! [`Poller`] keeps a [`DisplayState`] current by querying the display
//! right after every connect and then on a fixed interval. The state is
//! published through a [`tokio::sync::watch`] channel so any number of
//! readers can follow it without issuing commands of their own.
//!
//! A display in standby answers little beyond its power state, so a poll
//! cycle stops after the power query unless the display is on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use neovolib_core::{ConnectionState, DeviceInfoItem, DisplayEvent, Reading, Result};
use neovolib_sicp::NeovoClient;

use crate::state::DisplayState;

/// Run one poll cycle against `client`, updating `state` in place.
///
/// Queries power first. If the display is on, input, volume, model,
/// firmware version and operating hours follow. A failed query leaves its
/// field unchanged; rejections the display reports as canceled or
/// unparsable are expected on some models and only logged at debug level.
pub async fn refresh_state(client: &NeovoClient, state: &mut DisplayState) {
    state.connection = client.connection_state();
    if state.connection != ConnectionState::Connected {
        return;
    }
    debug!("starting poll cycle");

    if let Some(power) = settle("power", client.get_power().await) {
        state.power = Reading::Known(power);
    }
    if !state.is_on() {
        debug!(power = %state.power, "display not on, skipping remaining queries");
        return;
    }

    if let Some(input) = settle("input", client.get_input().await) {
        state.input = Reading::Known(input);
    }
    if let Some(volume) = settle("volume", client.get_volume().await) {
        state.volume = Reading::Known(volume);
    }
    let model = client.get_device_info(DeviceInfoItem::ModelNumber).await;
    if let Some(model) = settle("model", model) {
        state.model = Reading::Known(model);
    }
    let firmware = client.get_device_info(DeviceInfoItem::FirmwareVersion).await;
    if let Some(firmware) = settle("firmware version", firmware) {
        state.firmware_version = Reading::Known(firmware);
    }
    if let Some(hours) = settle("operating hours", client.get_operating_hours().await) {
        state.operating_hours = Reading::Known(hours);
    }

    debug!("completed poll cycle");
}

fn settle<T>(query: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_benign_rejection() => {
            debug!(query, error = %e, "poll query rejected");
            None
        }
        Err(e) => {
            warn!(query, error = %e, "poll query failed");
            None
        }
    }
}

/// Handle to a background task that polls one display.
///
/// Dropping the handle stops the task.
pub struct Poller {
    state_rx: watch::Receiver<DisplayState>,
    refresh: Arc<Notify>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling `client` every `interval`.
    ///
    /// The poller refreshes immediately if the client is already
    /// connected, again after every [`DisplayEvent::Connected`], and clears
    /// the state on [`DisplayEvent::Disconnected`]. A zero `interval`
    /// disables periodic refresh; connect-time and
    /// [`refresh_now`](Self::refresh_now) refreshes still happen.
    pub fn spawn(client: Arc<NeovoClient>, interval: Duration) -> Self {
        let initial = DisplayState {
            connection: client.connection_state(),
            ..DisplayState::default()
        };
        let (state_tx, state_rx) = watch::channel(initial);
        // Subscribe before spawning so a connect racing the task start is seen.
        let events = client.subscribe();
        let refresh = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(poll_loop(
            client,
            events,
            interval,
            state_tx,
            Arc::clone(&refresh),
            cancel.clone(),
        ));

        Poller {
            state_rx,
            refresh,
            cancel,
            task: Some(task),
        }
    }

    /// The most recently published state.
    pub fn state(&self) -> DisplayState {
        self.state_rx.borrow().clone()
    }

    /// Watch the published state.
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.state_rx.clone()
    }

    /// Request a poll cycle outside the regular interval.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Stop the task and wait for it to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

async fn poll_loop(
    client: Arc<NeovoClient>,
    mut events: broadcast::Receiver<DisplayEvent>,
    period: Duration,
    state_tx: watch::Sender<DisplayState>,
    refresh: Arc<Notify>,
    cancel: CancellationToken,
) {
    let mut state = state_tx.borrow().clone();
    let mut ticker = periodic(period);

    if client.is_connected() {
        refresh_state(&client, &mut state).await;
        state_tx.send_replace(state.clone());
    }

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            event = events.recv() => match event {
                Ok(DisplayEvent::Connected) => {
                    state.connection = ConnectionState::Connected;
                    refresh_state(&client, &mut state).await;
                    if let Some(ticker) = ticker.as_mut() {
                        ticker.reset();
                    }
                }
                Ok(DisplayEvent::Disconnected { cause }) => {
                    debug!(cause = cause.as_deref().unwrap_or("closed"), "clearing display state");
                    state.connection = ConnectionState::Disconnected;
                    state.reset();
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "poller lagged behind display events");
                    let now = client.connection_state();
                    if now == state.connection {
                        continue;
                    }
                    state.connection = now;
                    if now == ConnectionState::Connected {
                        refresh_state(&client, &mut state).await;
                    } else {
                        state.reset();
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            _ = refresh.notified() => refresh_state(&client, &mut state).await,

            _ = next_tick(&mut ticker) => refresh_state(&client, &mut state).await,
        }

        state_tx.send_replace(state.clone());
    }

    debug!("poller stopped");
}

fn periodic(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

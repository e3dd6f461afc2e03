//! Last-known display state assembled from polled queries.

use neovolib_core::{ConnectionState, PowerState, Reading, Volume};
use neovolib_sicp::InputLabels;

/// Snapshot of what the controller last learned about a display.
///
/// Every polled field starts as [`Reading::Unknown`] and only becomes
/// known after a successful query, so a display reporting volume 0 is
/// distinguishable from one that was never asked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayState {
    /// Connection state at the time of the snapshot.
    pub connection: ConnectionState,
    pub power: Reading<PowerState>,
    /// Raw input source code.
    pub input: Reading<u8>,
    pub volume: Reading<Volume>,
    pub model: Reading<String>,
    pub firmware_version: Reading<String>,
    pub operating_hours: Reading<u16>,
}

impl DisplayState {
    /// Forget every polled value. The connection state is left alone.
    pub fn reset(&mut self) {
        *self = DisplayState {
            connection: self.connection,
            ..DisplayState::default()
        };
    }

    /// Returns `true` if the display last reported itself as on.
    pub fn is_on(&self) -> bool {
        self.power == Reading::Known(PowerState::On)
    }

    /// Human-readable name of the current input.
    pub fn input_label(&self, labels: &InputLabels) -> String {
        match self.input {
            Reading::Known(code) => labels.label(code),
            Reading::Unknown => "Unknown".to_string(),
        }
    }
}

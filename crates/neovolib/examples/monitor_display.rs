//! Watch a display's state and events.
//!
//! Connects to a display, starts a [`Poller`] and prints every state
//! change and unsolicited report for 60 seconds. Switch inputs or change
//! the volume with the remote to see the state follow.
//!
//! # Requirements
//!
//! - An AG Neovo display with LAN control enabled
//! - The display's address adjusted for your network
//!
//! # Usage
//!
//! ```sh
//! cargo run -p neovolib --example monitor_display
//! ```

use std::sync::Arc;
use std::time::Duration;

use neovolib::{DisplayEvent, InputLabels, NeovoBuilder, Poller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let host = "192.168.1.50";

    println!("Connecting to display at {}...", host);

    let display = Arc::new(NeovoBuilder::new().host(host).monitor_id(1).build()?);
    let poller = Poller::spawn(Arc::clone(&display), Duration::from_secs(5));
    display.connect().await?;

    let labels = InputLabels::default();
    let mut state = poller.subscribe();
    let mut events = display.subscribe();

    println!("Monitoring for 60 seconds...\n");
    let deadline = tokio::time::sleep(Duration::from_secs(60));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                println!(
                    "[state] {} power={} input={} volume={} model={} fw={} hours={}",
                    snapshot.connection,
                    snapshot.power,
                    snapshot.input_label(&labels),
                    snapshot.volume,
                    snapshot.model,
                    snapshot.firmware_version,
                    snapshot.operating_hours,
                );
            }
            event = events.recv() => match event {
                Ok(DisplayEvent::Report(frame)) => {
                    println!("[report] monitor {} data {:02X?}", frame.monitor_id, frame.data);
                }
                Ok(DisplayEvent::Disconnected { cause }) => {
                    println!("[event] disconnected: {}", cause.as_deref().unwrap_or("closed"));
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    println!("(missed {} events due to lag)", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    poller.stop().await;
    display.disconnect().await;
    println!("\nMonitoring complete.");
    Ok(())
}

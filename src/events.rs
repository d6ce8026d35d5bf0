//! Event types and the main event loop driver for the IP tracker.
//!
//! This module defines the [`Event`] enum (keyboard input, ticks, and the
//! results of background lookups) and the [`EventHandler`], which runs a
//! background task that polls crossterm for key events and emits periodic
//! [`Event::Tick`]s. The main loop in `main.rs` receives events via
//! [`EventHandler::next`]; lookup tasks spawned by the coordinator send their
//! results through a clone of [`EventHandler::tx`].

use crate::error::LookupError;
use crate::models::LocationRecord;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
#[derive(Debug)]
pub enum Event {
    /// Periodic tick used for UI refresh.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// A geolocation lookup finished.
    GeoResolved {
        /// Request number the lookup was issued under.
        generation: u64,
        result: Result<LocationRecord, LookupError>,
    },
    /// A timezone lookup finished.
    TimezoneResolved {
        /// Coordinate generation the lookup was issued for.
        generation: u64,
        result: Result<String, LookupError>,
    },
}

/// Multiplexes terminal input and ticks into a single event stream.
///
/// Holds an unbounded channel: the sender ([`tx`](EventHandler::tx)) can be
/// cloned and given to lookup tasks, while the receiver is consumed by
/// [`next`](EventHandler::next) in the main loop.
pub struct EventHandler {
    /// Sender for posting events (e.g. from lookup tasks).
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// The spawned task polls crossterm with a timeout of `tick_rate_ms`;
    /// when a key is pressed it sends [`Event::Input`], and when the tick
    /// interval elapses it sends [`Event::Tick`]. If the terminal stops
    /// answering the task logs the error and exits, after which only lookup
    /// results arrive.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        // Windows reports releases too.
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            event_tx.send(Event::Input(key)).ok();
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        break;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Receives the next event from the channel.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

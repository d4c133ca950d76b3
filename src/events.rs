// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use log::Level;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

use crate::analysis::{AnalysisResult, CaptionTracks};
use crate::download::BatchSummary;

/// Whether the caller may start new operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    Enabled,
    Disabled,
}

/// Messages sent from background work to the single consumer loop
#[derive(Debug, Clone)]
pub enum Event {
    /// Human-readable log line
    Log { level: Level, message: String },

    /// Short status line describing the current activity
    Status(String),

    /// Title of the analyzed item or collection
    Title(String),

    /// Overall batch progress, 0-100
    OverallProgress(f64),

    /// Progress of the item currently being retrieved, 0-100
    ItemProgress(f64),

    /// Enable or disable the start actions
    UiState(UiState),

    /// Presentation-ready result of an analysis
    AnalysisResult(AnalysisResult),

    /// Caption tracks offered for the current selection
    CaptionOptions(CaptionTracks),

    /// A user-visible failure
    Error(String),

    /// A user-visible completion message
    Success(String),

    /// Final counts of a download batch
    BatchSummary(BatchSummary),
}

impl Event {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Log {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::Log {
            level: Level::Warn,
            message: message.into(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(message.into())
    }
}

/// Sink for events produced by background work.
///
/// Reporting never blocks and never fails; a consumer that went away simply
/// stops receiving.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);
}

/// A shared reference to a reporter
pub type SharedReporter = Arc<dyn Reporter>;

/// A reporter that silently drops all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _event: Event) {}
}

impl NoopReporter {
    pub fn shared() -> SharedReporter {
        Arc::new(Self)
    }
}

/// Producer half of the event channel. Cheap to clone, one per worker.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: UnboundedSender<Event>,
}

impl Reporter for ChannelReporter {
    fn report(&self, event: Event) {
        if let Event::Log { level, message } = &event {
            log::log!(*level, "{}", message);
        }
        // A closed channel means the consumer is gone; nothing left to tell.
        let _ = self.tx.send(event);
    }
}

impl ChannelReporter {
    pub fn shared(&self) -> SharedReporter {
        Arc::new(self.clone())
    }
}

/// Consumer half of the event channel
#[derive(Debug)]
pub struct EventReceiver {
    rx: UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Take the next pending event without waiting
    pub fn try_next(&mut self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Take every event that is pending right now, in arrival order
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event; `None` once every producer is dropped
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// Create an unbounded, ordered event channel.
///
/// Events from a single producer arrive in the order they were reported.
pub fn event_channel() -> (ChannelReporter, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelReporter { tx }, EventReceiver { rx })
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde_json::Value;

use crate::backend::{BackendEvent, ProgressStage, ProgressUpdate};
use crate::events::{Event, SharedReporter};

/// Interpret a loosely typed byte count
fn as_bytes(value: Option<&Value>) -> Option<f64> {
    let bytes = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    bytes.filter(|v| v.is_finite())
}

/// Turns backend progress callbacks into item progress events
pub struct ItemProgress {
    reporter: SharedReporter,
    percent: f64,
}

impl ItemProgress {
    /// Start tracking a new item at 0%
    pub fn start(reporter: SharedReporter) -> Self {
        reporter.report(Event::ItemProgress(0.0));
        Self {
            reporter,
            percent: 0.0,
        }
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Handle one backend event.
    ///
    /// Callbacks with missing or unusable sizes are ignored.
    pub fn handle(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Progress(update) => self.on_progress(&update),
            BackendEvent::Message { level, text } => {
                self.reporter.report(Event::Log {
                    level,
                    message: format!("[yt-dlp] {}", text),
                });
            }
        }
    }

    fn on_progress(&mut self, update: &ProgressUpdate) {
        match update.status.as_str() {
            "downloading" if update.stage == ProgressStage::Download => {
                let total = as_bytes(update.total_bytes.as_ref())
                    .or_else(|| as_bytes(update.total_bytes_estimate.as_ref()))
                    .filter(|total| *total > 0.0);
                let downloaded = as_bytes(update.downloaded_bytes.as_ref());

                if let (Some(total), Some(downloaded)) = (total, downloaded) {
                    self.percent = (downloaded / total * 100.0).clamp(0.0, 100.0);
                    self.reporter.report(Event::ItemProgress(self.percent));
                }
            }
            "finished" => {
                self.percent = 100.0;
                self.reporter.report(Event::ItemProgress(100.0));

                let merged = update.stage == ProgressStage::PostProcess
                    && update
                        .postprocessor
                        .as_deref()
                        .is_some_and(|name| name.contains("Merger"));
                if merged {
                    self.reporter
                        .report(Event::info("Merging video and audio streams finished."));
                }
            }
            _ => {}
        }
    }
}

/// Overall progress of a batch, advanced only when a job completes
#[derive(Debug, Clone)]
pub struct BatchProgress {
    total: usize,
    completed: usize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    /// Count one finished job (success or failure) and return the new percent
    pub fn complete_job(&mut self) -> f64 {
        self.completed = (self.completed + 1).min(self.total);
        self.percent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::progress;
    use crate::events::event_channel;
    use serde_json::json;

    fn item_events(rx: &mut crate::events::EventReceiver) -> Vec<f64> {
        rx.drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::ItemProgress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_resets_to_zero() {
        let (reporter, mut rx) = event_channel();
        let item = ItemProgress::start(reporter.shared());

        assert_eq!(item.percent(), 0.0);
        assert_eq!(item_events(&mut rx), vec![0.0]);
    }

    #[test]
    fn downloading_reports_percentage() {
        let (reporter, mut rx) = event_channel();
        let mut item = ItemProgress::start(reporter.shared());

        item.handle(BackendEvent::Progress(progress("downloading", Some(250), Some(1000))));
        item.handle(BackendEvent::Progress(progress("downloading", Some(1000), Some(1000))));

        assert_eq!(item_events(&mut rx), vec![0.0, 25.0, 100.0]);
    }

    #[test]
    fn estimate_is_used_when_total_missing() {
        let (reporter, mut rx) = event_channel();
        let mut item = ItemProgress::start(reporter.shared());

        let mut update = progress("downloading", Some(50), None);
        update.total_bytes_estimate = Some(json!(200.0));
        item.handle(BackendEvent::Progress(update));

        assert_eq!(item_events(&mut rx), vec![0.0, 25.0]);
    }

    #[test]
    fn unusable_sizes_are_swallowed() {
        let (reporter, mut rx) = event_channel();
        let mut item = ItemProgress::start(reporter.shared());

        item.handle(BackendEvent::Progress(progress("downloading", Some(10), None)));
        item.handle(BackendEvent::Progress(progress("downloading", Some(10), Some(0))));
        item.handle(BackendEvent::Progress(progress("downloading", None, Some(100))));
        let mut garbage = progress("downloading", None, None);
        garbage.downloaded_bytes = Some(json!("lots"));
        garbage.total_bytes = Some(json!({"bytes": 5}));
        item.handle(BackendEvent::Progress(garbage));

        assert_eq!(item_events(&mut rx), vec![0.0]);
        assert_eq!(item.percent(), 0.0);
    }

    #[test]
    fn finished_forces_full_and_logs_merge() {
        let (reporter, mut rx) = event_channel();
        let mut item = ItemProgress::start(reporter.shared());

        item.handle(BackendEvent::Progress(progress("finished", None, None)));
        let mut merge = progress("finished", None, None);
        merge.stage = ProgressStage::PostProcess;
        merge.postprocessor = Some("Merger".to_string());
        item.handle(BackendEvent::Progress(merge));

        let events = rx.drain();
        let percents: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                Event::ItemProgress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0.0, 100.0, 100.0]);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::Log { message, .. } if message.contains("Merging")))
                .count(),
            1
        );
    }

    #[test]
    fn backend_messages_become_log_lines() {
        let (reporter, mut rx) = event_channel();
        let mut item = ItemProgress::start(reporter.shared());

        item.handle(BackendEvent::Message {
            level: log::Level::Warn,
            text: "slow connection".to_string(),
        });

        assert!(rx.drain().iter().any(|e| matches!(
            e,
            Event::Log { level: log::Level::Warn, message } if message == "[yt-dlp] slow connection"
        )));
    }

    #[test]
    fn batch_progress_advances_per_job() {
        let mut batch = BatchProgress::new(4);
        let observed: Vec<f64> = (0..4).map(|_| batch.complete_job()).collect();

        assert_eq!(observed, vec![25.0, 50.0, 75.0, 100.0]);
        assert_eq!(batch.completed(), 4);
        assert_eq!(batch.complete_job(), 100.0);
    }
}

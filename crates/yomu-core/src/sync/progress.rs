//! Phase-scoped progress events

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Stage of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    Collecting,
    Uploading,
    Downloading,
    Transferring,
    Applying,
}

impl SyncPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collecting => "collecting",
            Self::Uploading => "uploading",
            Self::Downloading => "downloading",
            Self::Transferring => "transferring",
            Self::Applying => "applying",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub message: String,
    /// Completion of the current phase, 0-100, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f32>,
}

/// Observer for progress events.
///
/// Events arrive in order on the task running the sync.
pub trait ProgressSink {
    fn report(&self, progress: SyncProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(SyncProgress),
{
    fn report(&self, progress: SyncProgress) {
        self(progress);
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: SyncProgress) {}
}

/// Forwards events into an unbounded channel. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub UnboundedSender<SyncProgress>);

impl ProgressSink for ChannelProgress {
    fn report(&self, progress: SyncProgress) {
        self.0.send(progress).ok();
    }
}

/// Counts records through a phase and reports after each one.
pub(crate) struct PhaseReporter<'a> {
    sink: &'a dyn ProgressSink,
    phase: SyncPhase,
    total: usize,
    done: usize,
}

impl<'a> PhaseReporter<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, phase: SyncPhase, total: usize) -> Self {
        Self {
            sink,
            phase,
            total,
            done: 0,
        }
    }

    /// Event without a completion fraction.
    pub(crate) fn message(&self, message: impl Into<String>) {
        self.sink.report(SyncProgress {
            phase: self.phase,
            message: message.into(),
            percent: None,
        });
    }

    /// Mark one record done.
    pub(crate) fn step(&mut self, message: impl Into<String>) {
        self.done = (self.done + 1).min(self.total);
        self.sink.report(SyncProgress {
            phase: self.phase,
            message: message.into(),
            percent: Some(self.percent()),
        });
    }

    #[allow(clippy::cast_precision_loss)]
    fn percent(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f32 / self.total as f32 * 100.0
        }
    }
}

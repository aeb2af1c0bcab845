//! Observability channel between the batch core and whatever presents it.
//!
//! The core emits [`BatchEvent`]s into an [`EventSink`]; every event is also
//! logged through `tracing`. A closed or absent receiver never affects the run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::orchestrator::{Counters, RunEnd};
use crate::state_machine::{ProcessingResult, Stage, TicketKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BatchEvent {
    RunStarted {
        run_id: Uuid,
        event: String,
        kind: TicketKind,
        total: usize,
    },
    RecordStarted {
        row: u32,
        position: usize,
        total: usize,
        name: String,
    },
    StageEntered {
        row: u32,
        stage: Stage,
    },
    StageRetry {
        row: u32,
        stage: Stage,
        attempt: u32,
        max: u32,
        reason: String,
    },
    RecordFinished {
        row: u32,
        result: ProcessingResult,
        elapsed_ms: u64,
    },
    RunFinished {
        run_id: Uuid,
        counters: Counters,
        end: RunEnd,
    },
}

impl fmt::Display for BatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchEvent::RunStarted {
                run_id,
                event,
                kind,
                total,
            } => write!(f, "run {run_id}: {total} {kind} records for '{event}'"),
            BatchEvent::RecordStarted {
                row,
                position,
                total,
                name,
            } => write!(f, "[{position}/{total}] row {row}: {name}"),
            BatchEvent::StageEntered { row, stage } => write!(f, "row {row}: {stage}"),
            BatchEvent::StageRetry {
                row,
                stage,
                attempt,
                max,
                reason,
            } => write!(f, "row {row}: retry {attempt}/{max} of {stage}: {reason}"),
            BatchEvent::RecordFinished {
                row,
                result,
                elapsed_ms,
            } => {
                write!(f, "row {row}: {result} in {:.1}s", *elapsed_ms as f64 / 1000.0)?;
                if let Some(path) = result.screenshot() {
                    write!(f, " (screenshot {})", path.display())?;
                }
                Ok(())
            }
            BatchEvent::RunFinished {
                run_id,
                counters,
                end,
            } => write!(f, "run {run_id} {end}: {counters}"),
        }
    }
}

/// A [`BatchEvent`] stamped with the moment it was emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub event: BatchEvent,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.at.format("%H:%M:%S"), self.event)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<Event>>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that only logs.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: BatchEvent) {
        match &event {
            BatchEvent::StageEntered { .. } => debug!("{event}"),
            BatchEvent::StageRetry { .. } => warn!("{event}"),
            BatchEvent::RecordFinished {
                result: ProcessingResult::Error { .. },
                ..
            } => warn!("{event}"),
            _ => info!("{event}"),
        }

        if let Some(tx) = &self.tx {
            let _ = tx.send(Event {
                at: Utc::now(),
                event,
            });
        }
    }
}

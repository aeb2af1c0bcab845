use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::driver::Browser;
use crate::events::{BatchEvent, EventSink};
use crate::pipeline::Pipeline;
use crate::session::Session;
use crate::state_machine::{AttendeeRecord, ProcessingResult};
use crate::store::{RecordStore, StoreError};

/// Shared stop request, checked between records.
pub type StopFlag = Arc<AtomicBool>;

/// Running totals of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub issued: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total: usize,
}

impl Counters {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: &ProcessingResult) {
        match result {
            ProcessingResult::Issued { .. } => self.issued += 1,
            ProcessingResult::Skipped(_) => self.skipped += 1,
            ProcessingResult::Error { .. } => self.errors += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.issued + self.skipped + self.errors
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} processed, {} issued, {} skipped, {} errors",
            self.processed(),
            self.total,
            self.issued,
            self.skipped,
            self.errors
        )
    }
}

/// Why a batch stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunEnd {
    Completed,
    Cancelled,
    SessionLost(String),
}

impl fmt::Display for RunEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEnd::Completed => write!(f, "completed"),
            RunEnd::Cancelled => write!(f, "cancelled"),
            RunEnd::SessionLost(reason) => write!(f, "aborted (session lost: {reason})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    /// One entry per attempted record, in input order.
    pub results: Vec<(u32, ProcessingResult)>,
    pub counters: Counters,
    pub end: RunEnd,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("could not record the result of row {row}: {source}")]
    Store {
        row: u32,
        #[source]
        source: StoreError,
    },
}

/// Drives records one at a time through the issuance pipeline.
pub struct BatchOrchestrator {
    pipeline: Pipeline,
    screenshot_dir: PathBuf,
    events: EventSink,
    stop: StopFlag,
}

impl BatchOrchestrator {
    pub fn new(pipeline: Pipeline, screenshot_dir: impl Into<PathBuf>, events: EventSink) -> Self {
        Self {
            pipeline,
            screenshot_dir: screenshot_dir.into(),
            events,
            stop: StopFlag::default(),
        }
    }

    /// Flag that ends the run before the next record once set.
    pub fn stop_flag(&self) -> StopFlag {
        Arc::clone(&self.stop)
    }

    /// Process `records` in order, writing each result back as soon as it is known.
    ///
    /// Record failures never stop the run. A lost session stops it after the
    /// in-flight record's result is written; a failed write-back aborts it.
    pub async fn run_batch<B: Browser, S: RecordStore>(
        &self,
        session: &mut Session<B>,
        store: &mut S,
        records: &[AttendeeRecord],
    ) -> Result<BatchReport, BatchError> {
        let run_id = Uuid::new_v4();
        let total = records.len();
        let mut counters = Counters::new(total);
        let mut results = Vec::with_capacity(total);
        let mut end = RunEnd::Completed;

        self.events.emit(BatchEvent::RunStarted {
            run_id,
            event: session.event().map(|e| e.name.clone()).unwrap_or_default(),
            kind: self.pipeline.kind(),
            total,
        });

        for (idx, record) in records.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                info!(remaining = total - idx, "stop requested");
                end = RunEnd::Cancelled;
                break;
            }

            self.events.emit(BatchEvent::RecordStarted {
                row: record.row,
                position: idx + 1,
                total,
                name: record.full_name(),
            });
            let started = Instant::now();

            let mut lost = None;
            let mut touched_ui = false;
            let result = match record.precheck(self.pipeline.kind()) {
                Some(result) => result,
                None => {
                    touched_ui = true;
                    match self
                        .pipeline
                        .issue(session.browser(), record, &self.events)
                        .await
                    {
                        Ok(issuance) => {
                            if let Some(failure) = &issuance.failure {
                                warn!(row = record.row, kind = ?failure.kind(), "{failure}");
                            }
                            debug!(
                                row = record.row,
                                retries = issuance.progress.total_retries,
                                stages = issuance.progress.stage_history.len(),
                                "record finished"
                            );
                            issuance.result
                        }
                        Err(e) => {
                            let result = ProcessingResult::error(e.to_string());
                            lost = Some(e);
                            result
                        }
                    }
                }
            };
            let result = if touched_ui && lost.is_none() {
                self.attach_screenshot(session.browser(), record.row, result)
                    .await
            } else {
                result
            };

            store
                .write_status(record.row, &result)
                .await
                .map_err(|source| BatchError::Store {
                    row: record.row,
                    source,
                })?;
            counters.record(&result);
            self.events.emit(BatchEvent::RecordFinished {
                row: record.row,
                result: result.clone(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            let issued = matches!(result, ProcessingResult::Issued { .. });
            results.push((record.row, result));

            if let Some(lost) = lost {
                end = RunEnd::SessionLost(lost.reason);
                break;
            }
            if touched_ui
                && !issued
                && let Err(lost) = session.reset().await
            {
                end = RunEnd::SessionLost(lost.reason);
                break;
            }
        }

        self.events.emit(BatchEvent::RunFinished {
            run_id,
            counters,
            end: end.clone(),
        });
        Ok(BatchReport {
            run_id,
            results,
            counters,
            end,
        })
    }

    /// Save a screenshot for an `Error` result and reference it from the result.
    async fn attach_screenshot<B: Browser>(
        &self,
        browser: &mut B,
        row: u32,
        result: ProcessingResult,
    ) -> ProcessingResult {
        match result {
            ProcessingResult::Error {
                reason,
                screenshot: None,
            } => {
                let screenshot = match browser.screenshot().await {
                    Ok(png) => save_screenshot(&self.screenshot_dir, row, &png).await,
                    Err(e) => {
                        warn!(row, error = %e, "screenshot failed");
                        None
                    }
                };
                ProcessingResult::Error { reason, screenshot }
            }
            other => other,
        }
    }
}

async fn save_screenshot(dir: &Path, row: u32, png: &[u8]) -> Option<PathBuf> {
    let name = format!("row-{row}-{}.png", Utc::now().format("%Y%m%dT%H%M%S%3f"));
    let path = dir.join(name);
    let written = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, png).await
    };
    match written.await {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(row, path = %path.display(), error = %e, "could not save screenshot");
            None
        }
    }
}

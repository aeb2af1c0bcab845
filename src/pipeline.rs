//! Ticket issuance for one record.
//!
//! Every [`Stage`] expands into a short plan of steps over the semantic
//! targets. The plan runs on the [`StepExecutor`]; its outcome feeds the
//! [`StageMachine`], which decides between advancing, retrying and halting.
//! A retried stage resumes at the step that failed, so controls that were
//! already set are not touched twice.

use std::time::Duration;

use regex_lite::Regex;
use tracing::debug;

use crate::classifier::{Classification, Classifier};
use crate::driver::{Browser, DriverError};
use crate::error::{RecordError, SessionLost};
use crate::events::{BatchEvent, EventSink};
use crate::executor::{Action, StepExecutor, StepOutcome};
use crate::locator::LocatorStrategy;
use crate::state_machine::{
    AttendeeRecord, Halt, IssuanceProgress, ProcessingResult, SkipReason, Stage, StageMachine,
    StageOutcome, TicketKind, Transition,
};
use crate::targets;
use crate::vocabulary::Vocabulary;

const EXCERPT_CHARS: usize = 400;

#[derive(Debug, Clone)]
enum Step {
    Act {
        target: LocatorStrategy,
        action: Action,
        /// Skipped when the target never shows up.
        optional: bool,
    },
    /// Type each choice into `input` until one of its options can be clicked.
    Pick {
        name: &'static str,
        input: LocatorStrategy,
        choices: Vec<(String, LocatorStrategy)>,
    },
    /// Classify what the last submission produced.
    AwaitVerdict { expected: LocatorStrategy },
    CaptureTicket,
}

fn click(target: LocatorStrategy) -> Step {
    Step::Act {
        target,
        action: Action::Click,
        optional: false,
    }
}

fn click_if_present(target: LocatorStrategy) -> Step {
    Step::Act {
        target,
        action: Action::Click,
        optional: true,
    }
}

fn type_into(target: LocatorStrategy, text: &str) -> Step {
    Step::Act {
        target,
        action: Action::TypeText(text.to_string()),
        optional: false,
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

enum StepVerdict {
    Done(Option<String>),
    Stop(StageOutcome),
}

/// What one record's issuance produced.
#[derive(Debug, Clone)]
pub struct Issuance {
    pub result: ProcessingResult,
    /// The record error behind an `Error` or duplicate `Skipped` result.
    pub failure: Option<RecordError>,
    pub progress: IssuanceProgress,
}

pub struct Pipeline {
    executor: StepExecutor,
    classifier: Classifier,
    vocabulary: Vocabulary,
    kind: TicketKind,
    confirmation: Duration,
    stage_retries: u32,
}

impl Pipeline {
    pub fn new(
        executor: StepExecutor,
        classifier: Classifier,
        vocabulary: Vocabulary,
        kind: TicketKind,
    ) -> Self {
        Self {
            executor,
            classifier,
            vocabulary,
            kind,
            confirmation: Duration::from_secs(10),
            stage_retries: 2,
        }
    }

    /// Bound for the ticket identifier to render after paying.
    pub fn with_confirmation(mut self, confirmation: Duration) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_stage_retries(mut self, retries: u32) -> Self {
        self.stage_retries = retries;
        self
    }

    pub fn kind(&self) -> TicketKind {
        self.kind
    }

    /// Drive one record from the sale screen to a terminal result.
    ///
    /// Record-scoped failures come back as `Ok` with an `Error` or `Skipped`
    /// result. Only a lost session is an `Err`.
    pub async fn issue<B: Browser>(
        &self,
        browser: &mut B,
        record: &AttendeeRecord,
        events: &EventSink,
    ) -> Result<Issuance, SessionLost> {
        let mut progress = IssuanceProgress::new(self.stage_retries);
        let mut plan = self.plan(progress.stage, record);
        let mut cursor = 0;
        let mut ticket = None;

        events.emit(BatchEvent::StageEntered {
            row: record.row,
            stage: progress.stage,
        });

        while !progress.is_done() {
            let outcome = self
                .run_stage(browser, &plan, &mut cursor, &mut ticket)
                .await?;

            match StageMachine::next(&mut progress, outcome) {
                Transition::Next(stage) => {
                    plan = self.plan(stage, record);
                    cursor = 0;
                    if stage != Stage::Done {
                        events.emit(BatchEvent::StageEntered {
                            row: record.row,
                            stage,
                        });
                    }
                }
                Transition::Retry {
                    stage,
                    attempt,
                    reason,
                } => {
                    events.emit(BatchEvent::StageRetry {
                        row: record.row,
                        stage,
                        attempt,
                        max: progress.max_retries,
                        reason: reason.to_string(),
                    });
                }
                Transition::Halt(Halt::Duplicate) => {
                    return Ok(Issuance {
                        result: ProcessingResult::Skipped(SkipReason::Duplicate),
                        failure: Some(RecordError::Duplicate),
                        progress,
                    });
                }
                Transition::Halt(Halt::Failed(reason)) => {
                    return Ok(Issuance {
                        result: ProcessingResult::error(reason.to_string()),
                        failure: Some(reason),
                        progress,
                    });
                }
                Transition::Complete => break,
            }
        }

        let result = match ticket {
            Some(ticket) => ProcessingResult::Issued { ticket },
            None => ProcessingResult::error("no ticket number captured"),
        };
        Ok(Issuance {
            result,
            failure: None,
            progress,
        })
    }

    fn plan(&self, stage: Stage, record: &AttendeeRecord) -> Vec<Step> {
        let vocab = &self.vocabulary;
        match stage {
            Stage::SelectFunction => {
                let option = match non_blank(&record.function) {
                    Some(function) => {
                        targets::listbox_option("function option", function, &vocab.aliases_for(function))
                    }
                    None => targets::first_listbox_option(),
                };
                vec![click(targets::function_selector()), click(option)]
            }
            Stage::SelectSector => match non_blank(&record.sector) {
                Some(sector) => vec![
                    click(targets::sector_selector()),
                    click(targets::listbox_option(
                        "sector option",
                        sector,
                        &vocab.aliases_for(sector),
                    )),
                ],
                None => Vec::new(),
            },
            Stage::SelectTariff => {
                let choices = vocab
                    .tariff_candidates(record.tariff.as_deref(), record.price)
                    .into_iter()
                    .map(|label| {
                        let option = targets::tariff_option(&label, &vocab.aliases_for(&label));
                        (label, option)
                    })
                    .collect();
                vec![Step::Pick {
                    name: "tariff option",
                    input: targets::tariff_input(),
                    choices,
                }]
            }
            Stage::EnterQuantity => {
                let mut steps = Vec::new();
                if self.kind == TicketKind::Innominate {
                    let quantity = record.quantity.unwrap_or(1).to_string();
                    steps.push(type_into(targets::quantity_input(), &quantity));
                }
                steps.push(click(targets::continue_button()));
                steps
            }
            Stage::EnterAttendeeDetails => match self.kind {
                TicketKind::Nominated => vec![
                    click(targets::load_attendees_button()),
                    type_into(targets::holder_input("firstName"), &record.first_name),
                    type_into(targets::holder_input("lastName"), &record.last_name),
                    type_into(
                        targets::holder_input("documentNumber"),
                        &record.document_number,
                    ),
                ],
                TicketKind::Innominate => vec![click(targets::skip_prompt())],
            },
            Stage::SelectDocumentType => match self.kind {
                TicketKind::Nominated => {
                    let document_type =
                        vocab.normalize_document_type(record.document_type.as_deref());
                    vec![
                        click(targets::document_type_selector()),
                        click(targets::listbox_option(
                            "document type option",
                            &document_type,
                            &[],
                        )),
                        click(targets::save_attendees_button()),
                    ]
                }
                TicketKind::Innominate => Vec::new(),
            },
            Stage::ConfirmCourtesyOrPayment => {
                let mut steps = vec![
                    click_if_present(targets::skip_prompt()),
                    click(targets::delivery_channel()),
                    click(targets::email_delivery()),
                ];
                if let Some(email) = non_blank(&record.email) {
                    steps.push(type_into(targets::email_input(), email));
                    steps.push(click(targets::continue_button()));
                    steps.push(click_if_present(targets::skip_small()));
                }
                steps.push(click(targets::reserve_button()));
                steps.push(Step::AwaitVerdict {
                    expected: targets::payment_options(),
                });
                if record.is_courtesy() {
                    steps.push(click(targets::courtesy_toggle()));
                }
                steps.push(click(targets::pay_button()));
                steps
            }
            Stage::CaptureTicketNumber => vec![
                Step::CaptureTicket,
                click_if_present(targets::another_sale_button()),
            ],
            Stage::Done => Vec::new(),
        }
    }

    async fn run_stage<B: Browser>(
        &self,
        browser: &mut B,
        steps: &[Step],
        cursor: &mut usize,
        ticket: &mut Option<String>,
    ) -> Result<StageOutcome, DriverError> {
        while let Some(step) = steps.get(*cursor) {
            match self.run_step(browser, step).await? {
                StepVerdict::Done(captured) => {
                    if captured.is_some() {
                        *ticket = captured;
                    }
                    *cursor += 1;
                }
                StepVerdict::Stop(outcome) => return Ok(outcome),
            }
        }
        Ok(StageOutcome::Success)
    }

    async fn run_step<B: Browser>(
        &self,
        browser: &mut B,
        step: &Step,
    ) -> Result<StepVerdict, DriverError> {
        match step {
            Step::Act {
                target,
                action,
                optional,
            } => {
                let outcome = self.executor.perform(browser, target, action).await?;
                match outcome {
                    StepOutcome::Succeeded { .. } => Ok(StepVerdict::Done(None)),
                    StepOutcome::Transient { target, .. } | StepOutcome::Terminal { target, .. }
                        if *optional =>
                    {
                        debug!(step = %target, "optional step skipped");
                        Ok(StepVerdict::Done(None))
                    }
                    other => Ok(StepVerdict::Stop(self.stop(browser, other).await?)),
                }
            }
            Step::Pick {
                name,
                input,
                choices,
            } => self.pick(browser, name, input, choices).await,
            Step::AwaitVerdict { expected } => {
                let verdict = self.classifier.classify(browser, expected).await?;
                Ok(match verdict {
                    Classification::Success => StepVerdict::Done(None),
                    Classification::Duplicate => StepVerdict::Stop(StageOutcome::Duplicate),
                    Classification::UnknownError(banner) => {
                        StepVerdict::Stop(StageOutcome::Failed(RecordError::Rejected { banner }))
                    }
                    Classification::Transient => {
                        StepVerdict::Stop(StageOutcome::Transient(RecordError::TransientUi {
                            target: expected.name().to_string(),
                            detail: format!(
                                "no verdict within {}ms",
                                self.classifier.budget().as_millis()
                            ),
                        }))
                    }
                })
            }
            Step::CaptureTicket => self.capture_ticket(browser).await,
        }
    }

    async fn pick<B: Browser>(
        &self,
        browser: &mut B,
        name: &str,
        input: &LocatorStrategy,
        choices: &[(String, LocatorStrategy)],
    ) -> Result<StepVerdict, DriverError> {
        let mut attempted = Vec::new();
        for (text, option) in choices {
            let typed = self
                .executor
                .perform(browser, input, &Action::TypeText(text.clone()))
                .await?;
            if !matches!(typed, StepOutcome::Succeeded { .. }) {
                return Ok(StepVerdict::Stop(self.stop(browser, typed).await?));
            }

            match self.executor.perform(browser, option, &Action::Click).await? {
                StepOutcome::Succeeded { .. } => {
                    debug!(choice = %text, "picked");
                    return Ok(StepVerdict::Done(None));
                }
                StepOutcome::Transient { attempted: tried, .. } => attempted.extend(tried),
                terminal => return Ok(StepVerdict::Stop(self.stop(browser, terminal).await?)),
            }
        }

        Ok(StepVerdict::Stop(StageOutcome::Transient(
            RecordError::LocatorExhausted {
                target: name.to_string(),
                attempted,
                excerpt: self.excerpt(browser).await?,
            },
        )))
    }

    async fn capture_ticket<B: Browser>(&self, browser: &mut B) -> Result<StepVerdict, DriverError> {
        let outcome = self
            .executor
            .perform_within(
                browser,
                &targets::ticket_number(),
                &Action::ReadText,
                self.confirmation,
            )
            .await?;

        match outcome {
            StepOutcome::Succeeded { text, .. } => {
                let text = text.unwrap_or_default();
                match extract_ticket(&text) {
                    Some(ticket) => Ok(StepVerdict::Done(Some(ticket))),
                    None => Ok(StepVerdict::Stop(StageOutcome::Transient(
                        RecordError::TransientUi {
                            target: "ticket number".to_string(),
                            detail: format!("no ticket number in {text:?}"),
                        },
                    ))),
                }
            }
            other => Ok(StepVerdict::Stop(self.stop(browser, other).await?)),
        }
    }

    /// Turn an unsuccessful step outcome into the stage outcome it implies.
    async fn stop<B: Browser>(
        &self,
        browser: &mut B,
        outcome: StepOutcome,
    ) -> Result<StageOutcome, DriverError> {
        Ok(match outcome {
            StepOutcome::Succeeded { .. } => StageOutcome::Success,
            StepOutcome::Terminal { target, detail } => {
                StageOutcome::Failed(RecordError::Interaction { target, detail })
            }
            StepOutcome::Transient {
                target,
                attempted,
                detail,
            } if attempted.is_empty() => StageOutcome::Transient(RecordError::TransientUi {
                target,
                detail: detail.unwrap_or_else(|| "no response within budget".to_string()),
            }),
            StepOutcome::Transient {
                target, attempted, ..
            } => StageOutcome::Transient(RecordError::LocatorExhausted {
                target,
                attempted,
                excerpt: self.excerpt(browser).await?,
            }),
        })
    }

    async fn excerpt<B: Browser>(&self, browser: &mut B) -> Result<String, DriverError> {
        match browser.page_excerpt(EXCERPT_CHARS).await {
            Ok(text) => Ok(text),
            Err(e) if e.is_fatal() => Err(e),
            Err(_) => Ok(String::new()),
        }
    }
}

/// The `#1234` ticket identifier inside a confirmation text.
pub fn extract_ticket(text: &str) -> Option<String> {
    let re = Regex::new(r"#\d+").ok()?;
    re.find(text).map(|m| m.as_str().to_string())
}

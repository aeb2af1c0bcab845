use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Stages of one ticket issuance, in order.
///
/// Each record flows through: SELECT_FUNCTION → SELECT_SECTOR → SELECT_TARIFF →
/// ENTER_QUANTITY → ENTER_ATTENDEE_DETAILS → SELECT_DOCUMENT_TYPE →
/// CONFIRM_COURTESY_OR_PAYMENT → CAPTURE_TICKET_NUMBER → DONE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    SelectFunction,
    SelectSector,
    SelectTariff,
    EnterQuantity,
    EnterAttendeeDetails,
    SelectDocumentType,
    ConfirmCourtesyOrPayment,
    CaptureTicketNumber,
    Done,
}

impl Stage {
    pub const FIRST: Stage = Stage::SelectFunction;

    /// The stage that follows this one. `Done` is terminal.
    pub fn next(self) -> Stage {
        match self {
            Stage::SelectFunction => Stage::SelectSector,
            Stage::SelectSector => Stage::SelectTariff,
            Stage::SelectTariff => Stage::EnterQuantity,
            Stage::EnterQuantity => Stage::EnterAttendeeDetails,
            Stage::EnterAttendeeDetails => Stage::SelectDocumentType,
            Stage::SelectDocumentType => Stage::ConfirmCourtesyOrPayment,
            Stage::ConfirmCourtesyOrPayment => Stage::CaptureTicketNumber,
            Stage::CaptureTicketNumber | Stage::Done => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::SelectFunction => write!(f, "SELECT_FUNCTION"),
            Stage::SelectSector => write!(f, "SELECT_SECTOR"),
            Stage::SelectTariff => write!(f, "SELECT_TARIFF"),
            Stage::EnterQuantity => write!(f, "ENTER_QUANTITY"),
            Stage::EnterAttendeeDetails => write!(f, "ENTER_ATTENDEE_DETAILS"),
            Stage::SelectDocumentType => write!(f, "SELECT_DOCUMENT_TYPE"),
            Stage::ConfirmCourtesyOrPayment => write!(f, "CONFIRM_COURTESY_OR_PAYMENT"),
            Stage::CaptureTicketNumber => write!(f, "CAPTURE_TICKET_NUMBER"),
            Stage::Done => write!(f, "DONE"),
        }
    }
}

/// The result of running one stage once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    /// Worth another attempt; the error is what gets reported if attempts run out.
    Transient(RecordError),
    /// The remote system reported the document as already ticketed.
    Duplicate,
    /// Not worth retrying.
    Failed(RecordError),
}

/// Why a record stopped before `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    Duplicate,
    Failed(RecordError),
}

/// The result of evaluating a stage transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Advance to the next stage.
    Next(Stage),
    /// Run the current stage again.
    Retry {
        stage: Stage,
        attempt: u32,
        reason: RecordError,
    },
    /// Terminal failure for this record.
    Halt(Halt),
    /// Already at `Done`.
    Complete,
}

/// Per-record progress through the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceProgress {
    pub stage: Stage,
    pub stage_history: Vec<Stage>,
    /// Retries spent on the current stage; reset when a stage completes.
    pub retry_count: u32,
    pub total_retries: u32,
    pub max_retries: u32,
}

impl IssuanceProgress {
    pub fn new(max_retries: u32) -> Self {
        Self {
            stage: Stage::FIRST,
            stage_history: Vec::new(),
            retry_count: 0,
            total_retries: 0,
            max_retries,
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }
}

/// Drives an [`IssuanceProgress`] through the stages.
pub struct StageMachine;

impl StageMachine {
    /// Compute and apply the transition for the current stage's outcome.
    ///
    /// - Success advances to the next stage and resets the stage's retry budget.
    /// - A transient outcome retries the same stage while the budget lasts, then
    ///   halts with the transient reason.
    /// - Duplicate and failed outcomes halt immediately.
    /// - `Done` is terminal and always returns `Complete`.
    pub fn next(progress: &mut IssuanceProgress, outcome: StageOutcome) -> Transition {
        if progress.stage == Stage::Done {
            return Transition::Complete;
        }

        let transition = match outcome {
            StageOutcome::Success => Transition::Next(progress.stage.next()),
            StageOutcome::Transient(reason) => Self::handle_transient(progress, reason),
            StageOutcome::Duplicate => Transition::Halt(Halt::Duplicate),
            StageOutcome::Failed(reason) => Transition::Halt(Halt::Failed(reason)),
        };

        match &transition {
            Transition::Next(next_stage) => {
                progress.stage_history.push(progress.stage);
                progress.stage = *next_stage;
                progress.retry_count = 0;
            }
            Transition::Retry { stage, .. } => {
                progress.stage_history.push(*stage);
            }
            Transition::Halt(_) => {
                progress.stage_history.push(progress.stage);
            }
            Transition::Complete => {}
        }

        transition
    }

    fn handle_transient(progress: &mut IssuanceProgress, reason: RecordError) -> Transition {
        if progress.retry_count < progress.max_retries {
            progress.retry_count += 1;
            progress.total_retries += 1;
            Transition::Retry {
                stage: progress.stage,
                attempt: progress.retry_count,
                reason,
            }
        } else {
            Transition::Halt(Halt::Failed(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> StageOutcome {
        StageOutcome::Transient(RecordError::TransientUi {
            target: "sector selector".into(),
            detail: "not yet rendered".into(),
        })
    }

    fn advance_to(progress: &mut IssuanceProgress, stage: Stage) {
        while progress.stage != stage {
            StageMachine::next(progress, StageOutcome::Success);
        }
    }

    #[test]
    fn happy_path_walks_all_stages() {
        let mut progress = IssuanceProgress::new(2);
        let mut seen = vec![progress.stage];
        while !progress.is_done() {
            let t = StageMachine::next(&mut progress, StageOutcome::Success);
            let Transition::Next(stage) = t else {
                panic!("unexpected transition {t:?}");
            };
            seen.push(stage);
        }
        assert_eq!(seen.len(), 9);
        assert_eq!(seen[0], Stage::SelectFunction);
        assert_eq!(seen[5], Stage::SelectDocumentType);
        assert_eq!(seen[8], Stage::Done);

        assert_eq!(
            StageMachine::next(&mut progress, StageOutcome::Success),
            Transition::Complete
        );
    }

    #[test]
    fn transient_retries_then_halts() {
        let mut progress = IssuanceProgress::new(2);
        advance_to(&mut progress, Stage::SelectSector);

        let t = StageMachine::next(&mut progress, transient());
        assert!(matches!(t, Transition::Retry { attempt: 1, stage: Stage::SelectSector, .. }));
        let t = StageMachine::next(&mut progress, transient());
        assert!(matches!(t, Transition::Retry { attempt: 2, .. }));

        let t = StageMachine::next(&mut progress, transient());
        assert!(matches!(
            t,
            Transition::Halt(Halt::Failed(RecordError::TransientUi { .. }))
        ));
        assert_eq!(progress.stage, Stage::SelectSector);
    }

    #[test]
    fn retry_budget_is_per_stage() {
        let mut progress = IssuanceProgress::new(1);
        StageMachine::next(&mut progress, transient());
        assert_eq!(progress.retry_count, 1);

        let t = StageMachine::next(&mut progress, StageOutcome::Success);
        assert_eq!(t, Transition::Next(Stage::SelectSector));
        assert_eq!(progress.retry_count, 0);

        let t = StageMachine::next(&mut progress, transient());
        assert!(matches!(t, Transition::Retry { .. }));
        assert_eq!(progress.total_retries, 2);
    }

    #[test]
    fn zero_retries_halts_immediately() {
        let mut progress = IssuanceProgress::new(0);
        let t = StageMachine::next(&mut progress, transient());
        assert!(matches!(t, Transition::Halt(Halt::Failed(_))));
    }

    #[test]
    fn duplicate_halts_without_retry() {
        let mut progress = IssuanceProgress::new(3);
        advance_to(&mut progress, Stage::ConfirmCourtesyOrPayment);
        let t = StageMachine::next(&mut progress, StageOutcome::Duplicate);
        assert_eq!(t, Transition::Halt(Halt::Duplicate));
        assert_eq!(progress.retry_count, 0);
    }

    #[test]
    fn failed_halts_with_reason() {
        let mut progress = IssuanceProgress::new(3);
        let reason = RecordError::Rejected {
            banner: "Stock agotado".into(),
        };
        let t = StageMachine::next(&mut progress, StageOutcome::Failed(reason.clone()));
        assert_eq!(t, Transition::Halt(Halt::Failed(reason)));
    }

    #[test]
    fn stage_history_is_recorded() {
        let mut progress = IssuanceProgress::new(3);
        StageMachine::next(&mut progress, StageOutcome::Success);
        StageMachine::next(&mut progress, transient());
        StageMachine::next(&mut progress, StageOutcome::Success);
        assert_eq!(
            progress.stage_history,
            vec![Stage::SelectFunction, Stage::SelectSector, Stage::SelectSector]
        );
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::SelectFunction.to_string(), "SELECT_FUNCTION");
        assert_eq!(
            Stage::ConfirmCourtesyOrPayment.to_string(),
            "CONFIRM_COURTESY_OR_PAYMENT"
        );
        assert_eq!(Stage::Done.to_string(), "DONE");
    }
}

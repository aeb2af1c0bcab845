mod record;
mod stage;

pub use record::{
    AttendeeRecord, ProcessingResult, SkipReason, TicketKind, clean_document_number, parse_price,
    parse_quantity,
};
pub use stage::{Halt, IssuanceProgress, Stage, StageMachine, StageOutcome, Transition};

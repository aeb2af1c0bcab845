use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Whether each row names a specific attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    /// One named attendee per row, delivered by email.
    Nominated,
    /// Anonymous tickets; the row carries a quantity instead of personal data.
    Innominate,
}

impl TicketKind {
    /// Worksheet this kind is read from when none is configured.
    pub fn default_worksheet(self) -> &'static str {
        match self {
            TicketKind::Nominated => "Nominadas",
            TicketKind::Innominate => "Innominadas",
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketKind::Nominated => write!(f, "nominated"),
            TicketKind::Innominate => write!(f, "innominate"),
        }
    }
}

/// One row of the external record source.
///
/// Immutable once read. `row` is the sheet row number the result is written back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendeeRecord {
    pub row: u32,
    pub first_name: String,
    pub last_name: String,
    pub document_type: Option<String>,
    /// ASCII letters and digits only.
    pub document_number: String,
    pub email: Option<String>,
    pub function: Option<String>,
    pub sector: Option<String>,
    pub tariff: Option<String>,
    /// Zero means a courtesy ticket.
    pub price: f64,
    /// `None` when the cell is blank or not a number.
    pub quantity: Option<i64>,
    /// Ticket code already written to the row by an earlier run.
    pub existing_code: Option<String>,
}

impl AttendeeRecord {
    /// Blank record for `row`.
    #[cfg(test)]
    pub fn new(row: u32) -> Self {
        Self {
            row,
            first_name: String::new(),
            last_name: String::new(),
            document_type: None,
            document_number: String::new(),
            email: None,
            function: None,
            sector: None,
            tariff: None,
            price: 0.0,
            quantity: None,
            existing_code: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_courtesy(&self) -> bool {
        self.price <= 0.0
    }

    /// Checks that need no browser. `Some` is the record's final result.
    pub fn precheck(&self, kind: TicketKind) -> Option<ProcessingResult> {
        if let Some(code) = &self.existing_code
            && code.trim_start().starts_with('#')
        {
            return Some(ProcessingResult::Skipped(SkipReason::AlreadyIssued(
                code.trim().to_string(),
            )));
        }
        match kind {
            TicketKind::Nominated if self.document_number.is_empty() => {
                Some(invalid("missing document number"))
            }
            TicketKind::Innominate if self.quantity.unwrap_or(0) <= 0 => {
                Some(invalid("invalid quantity"))
            }
            _ => None,
        }
    }
}

fn invalid(reason: &str) -> ProcessingResult {
    ProcessingResult::error(RecordError::InvalidRecord(reason.to_string()).to_string())
}

/// Keep ASCII letters and digits: "12.345.678-k" becomes "12345678k".
pub fn clean_document_number(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Parse a local currency cell: `$12.500,50` is 12500.5. Blank or garbage is zero.
pub fn parse_price(raw: &str) -> f64 {
    let normalized: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '.') && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    normalized.parse::<f64>().unwrap_or(0.0).max(0.0)
}

/// Parse a quantity cell. Accepts "2" and "2,0"; anything else is `None`.
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.replace(',', ".").parse::<f64>().ok().map(|q| q as i64))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The document already holds a ticket in the remote system.
    Duplicate,
    /// The row already carries a ticket code from an earlier run.
    AlreadyIssued(String),
}

/// Terminal verdict for one record. Written back exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingResult {
    Issued { ticket: String },
    Skipped(SkipReason),
    Error {
        reason: String,
        screenshot: Option<PathBuf>,
    },
}

impl ProcessingResult {
    pub fn error(reason: impl Into<String>) -> Self {
        ProcessingResult::Error {
            reason: reason.into(),
            screenshot: None,
        }
    }

    /// Text for the sheet's result column.
    pub fn status_label(&self) -> String {
        match self {
            ProcessingResult::Issued { .. } => "Procesado".to_string(),
            ProcessingResult::Skipped(SkipReason::AlreadyIssued(_)) => "Procesado".to_string(),
            ProcessingResult::Skipped(SkipReason::Duplicate) => "Error - DNI duplicado".to_string(),
            ProcessingResult::Error { reason, .. } => format!("Error - {reason}"),
        }
    }

    /// Ticket code for the sheet's code column, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ProcessingResult::Issued { ticket } => Some(ticket),
            ProcessingResult::Skipped(SkipReason::AlreadyIssued(code)) => Some(code),
            _ => None,
        }
    }

    pub fn screenshot(&self) -> Option<&PathBuf> {
        match self {
            ProcessingResult::Error { screenshot, .. } => screenshot.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingResult::Issued { ticket } => write!(f, "issued {ticket}"),
            ProcessingResult::Skipped(SkipReason::Duplicate) => write!(f, "skipped (duplicate)"),
            ProcessingResult::Skipped(SkipReason::AlreadyIssued(code)) => {
                write!(f, "skipped (already issued {code})")
            }
            ProcessingResult::Error { reason, .. } => write!(f, "error: {reason}"),
        }
    }
}

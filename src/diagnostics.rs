// src/diagnostics.rs
//! Structured run diagnostics.
//!
//! Every stage appends what it skipped, substituted or could not place to a
//! [`Diagnostics`] list that travels with the results. Nothing here prints;
//! the binary decides verbosity through [`Diagnostics::emit`].

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

pub mod code {
    // Configuration fallbacks
    pub const INTERVAL_FALLBACK: &str = "INTERVAL_FALLBACK";
    pub const RATIO_FALLBACK: &str = "RATIO_FALLBACK";

    // Shift data quality
    pub const SHIFT_INVALID_CLOCK_IN: &str = "SHIFT_INVALID_CLOCK_IN";
    pub const SHIFT_UNRESOLVED_CLOCK_OUT: &str = "SHIFT_UNRESOLVED_CLOCK_OUT";
    pub const SHIFT_SYNTHESIZED_CLOCK_OUT: &str = "SHIFT_SYNTHESIZED_CLOCK_OUT";
    pub const SHIFT_MERGED: &str = "SHIFT_MERGED";

    // Transaction data quality
    pub const TX_INVALID_AMOUNT: &str = "TX_INVALID_AMOUNT";
    pub const TX_INVALID_TIMESTAMP: &str = "TX_INVALID_TIMESTAMP";
    pub const TX_NONEXISTENT_LOCAL_TIME: &str = "TX_NONEXISTENT_LOCAL_TIME";

    // Allocation
    pub const SLOT_NO_COVERAGE: &str = "SLOT_NO_COVERAGE";
    pub const STRANDED_UNALLOCATED: &str = "STRANDED_UNALLOCATED";
    pub const RANGE_MISMATCH: &str = "RANGE_MISMATCH";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub work_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
        work_date: Option<NaiveDate>,
    ) {
        self.entries.push(Diagnostic {
            severity,
            code,
            message: message.into(),
            work_date,
        });
    }

    pub fn info(&mut self, code: &'static str, message: impl Into<String>) {
        self.push(Severity::Info, code, message, None);
    }

    pub fn warning(&mut self, code: &'static str, message: impl Into<String>) {
        self.push(Severity::Warning, code, message, None);
    }

    pub fn warning_on(&mut self, date: NaiveDate, code: &'static str, message: impl Into<String>) {
        self.push(Severity::Warning, code, message, Some(date));
    }

    pub fn error_on(&mut self, date: NaiveDate, code: &'static str, message: impl Into<String>) {
        self.push(Severity::Error, code, message, Some(date));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of diagnostics carrying `code`.
    pub fn count(&self, code: &str) -> usize {
        self.entries.iter().filter(|d| d.code == code).count()
    }

    /// Forwards every entry to `tracing` at its severity.
    pub fn emit(&self) {
        for d in &self.entries {
            let date = d
                .work_date
                .map(|date| date.to_string())
                .unwrap_or_else(|| "-".to_string());
            match d.severity {
                Severity::Info => info!("[{}] {} ({})", d.code, d.message, date),
                Severity::Warning => warn!("[{}] {} ({})", d.code, d.message, date),
                Severity::Error => error!("[{}] {} ({})", d.code, d.message, date),
            }
        }
    }
}

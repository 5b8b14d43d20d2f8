// src/error.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TipPoolError {
    #[error("Unparseable timestamp: '{0}'")]
    InvalidTimestamp(String),

    #[error("Invalid tip amount: '{0}'")]
    InvalidAmount(String),

    #[error("Unknown timezone: '{0}'")]
    UnknownTimezone(String),

    #[error("Local time {timestamp} does not exist in {zone} (DST gap)")]
    NonexistentLocalTime { timestamp: String, zone: String },

    #[error(
        "Shift data ({shifts_from}..={shifts_to}) and transaction data ({transactions_from}..={transactions_to}) do not overlap"
    )]
    MismatchedInputRanges {
        shifts_from: NaiveDate,
        shifts_to: NaiveDate,
        transactions_from: NaiveDate,
        transactions_to: NaiveDate,
    },

    #[error("Unallocated tips of {amount} on {date} have no employee on duty to receive them")]
    StrandedFunds { date: NaiveDate, amount: Decimal },

    #[error("Payout total {allocated} does not match transaction tips {expected} (delta {delta})")]
    ConservationViolation {
        allocated: Decimal,
        expected: Decimal,
        delta: Decimal,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T, E = TipPoolError> = std::result::Result<T, E>;

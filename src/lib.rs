// src/lib.rs
//! Tip-pool allocation: joins time-clock shifts with POS tip transactions on
//! a shared interval grid and pays every approved tip out to the staff on duty.

pub mod allocation;
pub mod config;
pub mod csv_io;
pub mod diagnostics;
pub mod error;
pub mod interval_calendar;
pub mod pipeline;
pub mod presence;
pub mod redistribution;
pub mod role_classifier;
pub mod settlement;
pub mod shift_normalizer;
pub mod timezone;
pub mod transaction_aggregator;

mod pipeline_tests;

pub use config::{RawConfig, TipPoolConfig};
pub use error::{Result, TipPoolError};
pub use pipeline::{TipPoolEngine, TipPoolReport};
pub use role_classifier::{DepartmentRoleClassifier, Role, RoleClassifier};

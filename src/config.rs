// src/config.rs
use serde::Deserialize;

use crate::allocation::{AllocationPolicy, BohRatio};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, TipPoolError};
use crate::interval_calendar::{IntervalMinutes, IntervalMode};
use crate::timezone::TimezoneConversion;

pub const ENV_PREFIX: &str = "TIPPOOL_";

/// Settings for one allocation run.
#[derive(Debug, Clone)]
pub struct TipPoolConfig {
    pub interval_minutes: IntervalMinutes,
    pub boh_ratio: BohRatio,
    pub interval_mode: IntervalMode,
    pub allocation_policy: AllocationPolicy,
    pub timezone: Option<TimezoneConversion>,
    /// Non-overlapping shift/transaction date spans abort the run.
    pub strict_ranges: bool,
    pub merge_presence: bool,
    pub executive_names: Vec<String>,
}

impl Default for TipPoolConfig {
    fn default() -> Self {
        Self {
            interval_minutes: IntervalMinutes::default(),
            boh_ratio: BohRatio::default(),
            interval_mode: IntervalMode::default(),
            allocation_policy: AllocationPolicy::default(),
            timezone: None,
            strict_ranges: true,
            merge_presence: true,
            executive_names: Vec::new(),
        }
    }
}

/// Unvalidated settings as they arrive from the environment or the command
/// line. Numeric values stay strings so bad input can fall back instead of
/// failing to parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub interval_minutes: Option<String>,
    pub boh_ratio: Option<String>,
    pub interval_mode: Option<String>,
    pub allocation_policy: Option<String>,
    pub convert_timezone: Option<bool>,
    pub source_tz: Option<String>,
    pub target_tz: Option<String>,
    pub strict_ranges: Option<bool>,
    pub merge_presence: Option<bool>,
    pub executives: Option<Vec<String>>,
}

impl RawConfig {
    /// Reads `TIPPOOL_*` variables, loading `.env` first if present.
    pub fn from_env() -> std::result::Result<Self, envy::Error> {
        dotenv::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env::<RawConfig>()
    }

    /// Fields set in `over` win.
    pub fn overlay(self, over: RawConfig) -> RawConfig {
        RawConfig {
            interval_minutes: over.interval_minutes.or(self.interval_minutes),
            boh_ratio: over.boh_ratio.or(self.boh_ratio),
            interval_mode: over.interval_mode.or(self.interval_mode),
            allocation_policy: over.allocation_policy.or(self.allocation_policy),
            convert_timezone: over.convert_timezone.or(self.convert_timezone),
            source_tz: over.source_tz.or(self.source_tz),
            target_tz: over.target_tz.or(self.target_tz),
            strict_ranges: over.strict_ranges.or(self.strict_ranges),
            merge_presence: over.merge_presence.or(self.merge_presence),
            executives: over.executives.or(self.executives),
        }
    }

    /// Validates into a [`TipPoolConfig`].
    ///
    /// Bad interval or ratio values become warnings and defaults. Unknown
    /// mode/policy names and unusable timezone settings are errors.
    pub fn resolve(self, diagnostics: &mut Diagnostics) -> Result<TipPoolConfig> {
        let defaults = TipPoolConfig::default();

        let interval_minutes = match &self.interval_minutes {
            Some(raw) => IntervalMinutes::parse_or_default(raw, diagnostics),
            None => defaults.interval_minutes,
        };
        let boh_ratio = match &self.boh_ratio {
            Some(raw) => BohRatio::parse_or_default(raw, diagnostics),
            None => defaults.boh_ratio,
        };
        let interval_mode = match &self.interval_mode {
            Some(raw) => raw.parse()?,
            None => defaults.interval_mode,
        };
        let allocation_policy = match &self.allocation_policy {
            Some(raw) => raw.parse()?,
            None => defaults.allocation_policy,
        };

        let timezone = if self.convert_timezone.unwrap_or(false) {
            match (&self.source_tz, &self.target_tz) {
                (Some(source), Some(target)) => Some(TimezoneConversion::parse(source, target)?),
                _ => {
                    return Err(TipPoolError::Config(
                        "timezone conversion requires both a source and a target zone".to_string(),
                    ))
                }
            }
        } else {
            None
        };

        Ok(TipPoolConfig {
            interval_minutes,
            boh_ratio,
            interval_mode,
            allocation_policy,
            timezone,
            strict_ranges: self.strict_ranges.unwrap_or(defaults.strict_ranges),
            merge_presence: self.merge_presence.unwrap_or(defaults.merge_presence),
            executive_names: self.executives.unwrap_or_default(),
        })
    }
}

//! Calendar rule resolution and slot generation.
//!
//! [`resolve`] merges the global [`SchedulingConfig`] with any per-date
//! [`DayRule`] into an [`EffectiveDayRule`]; [`generate_slots`] expands that
//! rule into the ordered slot starts for the day. Both are pure and never
//! fail: missing configuration is the caller's concern and is covered by
//! `SchedulingConfig::default()`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::scheduling_config::{DayRule, SchedulingConfig};
use crate::types::SlotTime;

/// Why a day has no bookable slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureReason {
    /// The weekday is in the weekly off-days set.
    WeeklyOff,
    /// The date is listed as a one-time off date.
    OneTimeOff,
    /// A day rule marks the date as off.
    DayOverride,
    /// The day resolves to an empty working-hours list.
    NoWorkingHours,
}

impl ClosureReason {
    pub fn describe(&self) -> &'static str {
        match self {
            ClosureReason::WeeklyOff => "weekly day off",
            ClosureReason::OneTimeOff => "scheduled day off",
            ClosureReason::DayOverride => "closed by special schedule",
            ClosureReason::NoWorkingHours => "no working hours configured",
        }
    }
}

/// The rule in force for one date after applying overrides. Derived on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveDayRule {
    pub date: NaiveDate,
    /// `Some` when the day is closed.
    pub closure: Option<ClosureReason>,
    pub working_hours: Vec<SlotTime>,
    pub capacity: u32,
    pub service_duration_minutes: u32,
}

impl EffectiveDayRule {
    pub fn is_closed(&self) -> bool {
        self.closure.is_some()
    }
}

/// An alternate (date, time) offered when a requested slot is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuggestedSlot {
    pub date: NaiveDate,
    pub time: SlotTime,
}

/// Weekday index for `date` with 0 = Sunday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Closure implied by the weekly and one-time off settings alone.
fn default_closure(config: &SchedulingConfig, date: NaiveDate) -> Option<ClosureReason> {
    if config.weekly_off_days.contains(&weekday_index(date)) {
        Some(ClosureReason::WeeklyOff)
    } else if config.one_time_off_dates.contains(&date) {
        Some(ClosureReason::OneTimeOff)
    } else {
        None
    }
}

/// Closure once a day rule is taken into account. An explicit `is_off`
/// decides; otherwise a rule that brings its own working hours opens the day.
fn override_closure(
    rule: &DayRule,
    fallback: Option<ClosureReason>,
) -> Option<ClosureReason> {
    match rule.is_off {
        Some(true) => Some(ClosureReason::DayOverride),
        Some(false) => None,
        None if rule.working_hours.is_some() => None,
        None => fallback,
    }
}

/// Resolve the effective rule for `date`.
pub fn resolve(config: &SchedulingConfig, date: NaiveDate) -> EffectiveDayRule {
    let fallback = default_closure(config, date);
    let rule = config.day_rule(date);

    let closure = match rule {
        Some(rule) => override_closure(rule, fallback),
        None => fallback,
    };

    let working_hours = rule
        .and_then(|r| r.working_hours.clone())
        .unwrap_or_else(|| config.working_hours.clone());
    let capacity = rule
        .and_then(|r| r.number_of_staff)
        .unwrap_or(config.number_of_staff);
    let service_duration_minutes = rule
        .and_then(|r| r.service_duration_minutes)
        .unwrap_or(config.service_duration_minutes);

    let closure = match closure {
        None if working_hours.is_empty() => Some(ClosureReason::NoWorkingHours),
        other => other,
    };

    EffectiveDayRule {
        date,
        closure,
        working_hours,
        capacity,
        service_duration_minutes,
    }
}

/// Expand a rule into its ordered slot starts. Closed days yield nothing.
///
/// Slot granularity is authored in the working-hours list; this never
/// subdivides ranges.
pub fn generate_slots(rule: &EffectiveDayRule) -> Vec<SlotTime> {
    if rule.is_closed() {
        return Vec::new();
    }
    let mut slots = rule.working_hours.clone();
    slots.sort();
    slots.dedup();
    slots
}

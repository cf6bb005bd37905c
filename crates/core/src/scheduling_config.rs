//! Scheduling configuration: working hours, capacity, off-days and per-date
//! overrides.
//!
//! The configuration is an explicitly versioned value. Callers load it once
//! per decision and pass it into the calendar resolver; nothing in this crate
//! reads it from ambient state.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::SlotTime;

// ---------------------------------------------------------------------------
// Defaults and limits
// ---------------------------------------------------------------------------

/// Default bookable slot starts when no configuration has been saved.
pub const DEFAULT_WORKING_HOURS: &[(u32, u32)] = &[
    (9, 0),
    (10, 0),
    (11, 0),
    (13, 0),
    (14, 0),
    (15, 0),
    (16, 0),
    (17, 0),
];

/// Default number of staff, i.e. appointments a single slot can hold.
pub const DEFAULT_NUMBER_OF_STAFF: u32 = 1;

/// Default service duration in minutes.
pub const DEFAULT_SERVICE_DURATION_MINS: u32 = 60;

/// Shortest service duration an admin may configure.
pub const MIN_SERVICE_DURATION_MINS: u32 = 5;

/// Longest service duration an admin may configure (one working day).
pub const MAX_SERVICE_DURATION_MINS: u32 = 24 * 60;

/// Weekday indices run 0 (Sunday) through 6 (Saturday).
pub const MAX_WEEKDAY_INDEX: u8 = 6;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Override for one exact calendar date. Unset fields fall through to the
/// weekly/global defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRule {
    pub date: NaiveDate,
    #[serde(default)]
    pub is_off: Option<bool>,
    #[serde(default)]
    pub working_hours: Option<Vec<SlotTime>>,
    #[serde(default)]
    pub number_of_staff: Option<u32>,
    #[serde(default)]
    pub service_duration_minutes: Option<u32>,
}

impl DayRule {
    /// An empty override for `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            is_off: None,
            working_hours: None,
            number_of_staff: None,
            service_duration_minutes: None,
        }
    }
}

/// Process-wide scheduling configuration, mutable by admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Bumped on every successful save; used for compare-and-set updates.
    #[serde(default)]
    pub version: i64,
    pub working_hours: Vec<SlotTime>,
    pub number_of_staff: u32,
    pub service_duration_minutes: u32,
    #[serde(default)]
    pub weekly_off_days: BTreeSet<u8>,
    #[serde(default)]
    pub one_time_off_dates: BTreeSet<NaiveDate>,
    /// Kept sorted by date with at most one rule per date.
    #[serde(default)]
    pub day_rules: Vec<DayRule>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            version: 0,
            working_hours: DEFAULT_WORKING_HOURS
                .iter()
                .filter_map(|&(h, m)| SlotTime::from_hm(h, m))
                .collect(),
            number_of_staff: DEFAULT_NUMBER_OF_STAFF,
            service_duration_minutes: DEFAULT_SERVICE_DURATION_MINS,
            weekly_off_days: BTreeSet::new(),
            one_time_off_dates: BTreeSet::new(),
            day_rules: Vec::new(),
        }
    }
}

impl SchedulingConfig {
    /// Find the override for an exact date, if any.
    pub fn day_rule(&self, date: NaiveDate) -> Option<&DayRule> {
        self.day_rules.iter().find(|r| r.date == date)
    }

    /// Sort and de-duplicate working hours (global and per-rule) and order
    /// the day rules by date. Applied before every save.
    pub fn normalize(&mut self) {
        self.working_hours.sort();
        self.working_hours.dedup();
        for rule in &mut self.day_rules {
            if let Some(hours) = rule.working_hours.as_mut() {
                hours.sort();
                hours.dedup();
            }
        }
        self.day_rules.sort_by_key(|r| r.date);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_duration(minutes: u32, context: &str) -> Result<(), CoreError> {
    if !(MIN_SERVICE_DURATION_MINS..=MAX_SERVICE_DURATION_MINS).contains(&minutes) {
        return Err(CoreError::Validation(format!(
            "{context}service duration must be between {MIN_SERVICE_DURATION_MINS} and \
             {MAX_SERVICE_DURATION_MINS} minutes, got {minutes}"
        )));
    }
    Ok(())
}

/// Validate an admin-submitted configuration before it is persisted.
pub fn validate_config(config: &SchedulingConfig) -> Result<(), CoreError> {
    validate_duration(config.service_duration_minutes, "")?;

    if let Some(day) = config
        .weekly_off_days
        .iter()
        .find(|d| **d > MAX_WEEKDAY_INDEX)
    {
        return Err(CoreError::Validation(format!(
            "Weekly off day must be between 0 (Sunday) and {MAX_WEEKDAY_INDEX} (Saturday), got {day}"
        )));
    }

    let mut seen = BTreeSet::new();
    for rule in &config.day_rules {
        if !seen.insert(rule.date) {
            return Err(CoreError::Validation(format!(
                "Duplicate day rule for {}",
                rule.date
            )));
        }
        if let Some(minutes) = rule.service_duration_minutes {
            validate_duration(minutes, &format!("Day rule {}: ", rule.date))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn default_config_matches_builtin_hours() {
        let config = SchedulingConfig::default();
        let hours: Vec<String> = config.working_hours.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            hours,
            ["09:00", "10:00", "11:00", "13:00", "14:00", "15:00", "16:00", "17:00"]
        );
        assert_eq!(config.number_of_staff, 1);
        assert_eq!(config.service_duration_minutes, 60);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let mut config = SchedulingConfig {
            working_hours: vec![
                "10:00".parse().unwrap(),
                "09:00".parse().unwrap(),
                "10:00".parse().unwrap(),
            ],
            day_rules: vec![
                DayRule::for_date(date("2024-08-02")),
                DayRule::for_date(date("2024-08-01")),
            ],
            ..SchedulingConfig::default()
        };
        config.normalize();
        assert_eq!(config.working_hours.len(), 2);
        assert_eq!(config.working_hours[0].to_string(), "09:00");
        assert_eq!(config.day_rules[0].date, date("2024-08-01"));
    }

    #[test]
    fn rejects_short_duration() {
        let config = SchedulingConfig {
            service_duration_minutes: 4,
            ..SchedulingConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn rejects_bad_weekday_index() {
        let config = SchedulingConfig {
            weekly_off_days: [7].into_iter().collect(),
            ..SchedulingConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Weekly off day"));
    }

    #[test]
    fn rejects_duplicate_day_rules() {
        let config = SchedulingConfig {
            day_rules: vec![
                DayRule::for_date(date("2024-08-01")),
                DayRule::for_date(date("2024-08-01")),
            ],
            ..SchedulingConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate day rule"));
    }

    #[test]
    fn zero_staff_is_allowed() {
        let config = SchedulingConfig {
            number_of_staff: 0,
            ..SchedulingConfig::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn deserializes_with_missing_optional_sections() {
        let json = r#"{
            "working_hours": ["09:00"],
            "number_of_staff": 2,
            "service_duration_minutes": 30
        }"#;
        let config: SchedulingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.version, 0);
        assert!(config.weekly_off_days.is_empty());
        assert!(config.day_rules.is_empty());
    }
}

//! Point-in-time availability snapshots and alternate-slot search.
//!
//! Reads here are deliberately unsynchronized with bookings: a snapshot may
//! be stale by the time the caller acts on it. The capacity invariant is
//! enforced by the coordinator's guarded write, not by this module.

use std::sync::Arc;

use aether_core::appointment::DayKey;
use aether_core::calendar::{self, ClosureReason, SuggestedSlot};
use aether_core::scheduling_config::SchedulingConfig;
use aether_core::types::{DbId, SlotTime};
use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::error::StoreError;
use crate::store::{AppointmentLedger, SettingsStore};

/// Bookable slots for one date and branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub date: NaiveDate,
    pub branch_id: Option<DbId>,
    /// Slots with spare capacity, ascending.
    pub slots: Vec<SlotTime>,
    /// Every generated slot is at capacity.
    pub fully_booked: bool,
    pub closed: bool,
    pub closure: Option<ClosureReason>,
    pub capacity: u32,
}

#[derive(Clone)]
pub struct AvailabilityEngine {
    ledger: Arc<dyn AppointmentLedger>,
    settings: Arc<dyn SettingsStore>,
}

impl AvailabilityEngine {
    pub fn new(ledger: Arc<dyn AppointmentLedger>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { ledger, settings }
    }

    /// The saved configuration, or the built-in defaults when none exists.
    pub async fn current_config(&self) -> Result<SchedulingConfig, StoreError> {
        match self.settings.load().await? {
            Some(config) => Ok(config),
            None => {
                tracing::debug!("No scheduling configuration saved, using defaults");
                Ok(SchedulingConfig::default())
            }
        }
    }

    pub async fn available(
        &self,
        date: NaiveDate,
        branch_id: Option<DbId>,
    ) -> Result<Availability, StoreError> {
        let config = self.current_config().await?;
        self.available_with(&config, date, branch_id).await
    }

    /// Availability under an already-loaded configuration.
    pub async fn available_with(
        &self,
        config: &SchedulingConfig,
        date: NaiveDate,
        branch_id: Option<DbId>,
    ) -> Result<Availability, StoreError> {
        let rule = calendar::resolve(config, date);
        if let Some(reason) = rule.closure {
            return Ok(Availability {
                date,
                branch_id,
                slots: Vec::new(),
                fully_booked: false,
                closed: true,
                closure: Some(reason),
                capacity: rule.capacity,
            });
        }

        let generated = calendar::generate_slots(&rule);
        let counts = self
            .ledger
            .active_counts_for_day(DayKey { date, branch_id })
            .await?;
        let slots: Vec<SlotTime> = generated
            .iter()
            .copied()
            .filter(|slot| counts.get(slot).copied().unwrap_or(0) < rule.capacity)
            .collect();

        Ok(Availability {
            date,
            branch_id,
            fully_booked: !generated.is_empty() && slots.is_empty(),
            slots,
            closed: false,
            closure: None,
            capacity: rule.capacity,
        })
    }

    /// Distinct times holding at least one active appointment, ascending.
    pub async fn booked_slots(
        &self,
        date: NaiveDate,
        branch_id: Option<DbId>,
    ) -> Result<Vec<SlotTime>, StoreError> {
        let counts = self
            .ledger
            .active_counts_for_day(DayKey { date, branch_id })
            .await?;
        Ok(counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(time, _)| time)
            .collect())
    }

    /// Up to `limit` open slots near a requested one: the rest of the same
    /// day first, then each following day up to `lookahead_days`, in order.
    pub async fn alternatives(
        &self,
        config: &SchedulingConfig,
        date: NaiveDate,
        time: SlotTime,
        branch_id: Option<DbId>,
        limit: usize,
        lookahead_days: u32,
    ) -> Result<Vec<SuggestedSlot>, StoreError> {
        let mut found = Vec::new();
        for offset in 0..=u64::from(lookahead_days) {
            if found.len() >= limit {
                break;
            }
            let Some(day) = date.checked_add_days(Days::new(offset)) else {
                break;
            };
            let availability = self.available_with(config, day, branch_id).await?;
            let remaining = limit - found.len();
            found.extend(
                availability
                    .slots
                    .into_iter()
                    .filter(|slot| offset > 0 || *slot != time)
                    .map(|slot| SuggestedSlot { date: day, time: slot })
                    .take(remaining),
            );
        }
        Ok(found)
    }
}

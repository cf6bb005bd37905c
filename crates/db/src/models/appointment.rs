//! Appointment ledger models.

use aether_core::appointment::{Appointment, AppointmentStatus, NewAppointment};
use aether_core::error::CoreError;
use aether_core::types::{DbId, Timestamp};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `appointments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppointmentRow {
    pub id: DbId,
    pub customer_id: DbId,
    pub staff_id: Option<DbId>,
    pub product_id: DbId,
    pub branch_id: Option<DbId>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
    pub notes: Option<String>,
    pub rescheduled_from: Option<DbId>,
    pub rescheduled_to: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = CoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.id,
            customer_id: row.customer_id,
            staff_id: row.staff_id,
            product_id: row.product_id,
            branch_id: row.branch_id,
            date: row.date,
            time: row.time.into(),
            status: row.status.parse()?,
            notes: row.notes,
            rescheduled_from: row.rescheduled_from,
            rescheduled_to: row.rescheduled_to,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// DTO for inserting a new appointment.
#[derive(Debug, Clone)]
pub struct CreateAppointment {
    pub customer_id: DbId,
    pub staff_id: Option<DbId>,
    pub product_id: DbId,
    pub branch_id: Option<DbId>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
    pub notes: Option<String>,
    pub rescheduled_from: Option<DbId>,
}

impl From<&NewAppointment> for CreateAppointment {
    fn from(input: &NewAppointment) -> Self {
        Self {
            customer_id: input.customer_id,
            staff_id: input.staff_id,
            product_id: input.product_id,
            branch_id: input.branch_id,
            date: input.date,
            time: input.time.as_naive(),
            status: input.status.as_str().to_string(),
            notes: input.notes.clone(),
            rescheduled_from: input.rescheduled_from,
        }
    }
}

/// Active appointment count for one slot start, used by availability.
#[derive(Debug, Clone, FromRow)]
pub struct SlotCount {
    pub time: NaiveTime,
    pub active: i64,
}

/// Result of the transactional reschedule.
#[derive(Debug)]
pub enum RescheduleRows {
    Done {
        prior: AppointmentRow,
        replacement: AppointmentRow,
    },
    AtCapacity,
    /// The prior record no longer had the expected status.
    Stale(AppointmentRow),
    NotFound,
}

/// Status strings that occupy capacity, in bind order.
pub fn active_status_strings() -> Vec<String> {
    AppointmentStatus::ACTIVE
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

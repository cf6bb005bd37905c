//! Repository for the `appointments` table.
//!
//! Capacity-guarded writes run inside a transaction that first takes a
//! transaction-scoped advisory lock on the (date, branch) key, so concurrent
//! writers for the same day and branch serialize inside PostgreSQL even when
//! several API instances share the database. The wait for that lock is
//! bounded by `lock_timeout`; running out of it fails with SQLSTATE `55P03`
//! (see [`crate::is_lock_timeout`]).

use std::time::Duration;

use aether_core::types::DbId;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{PgConnection, PgPool};

use crate::models::appointment::{
    active_status_strings, AppointmentRow, CreateAppointment, RescheduleRows, SlotCount,
};

/// Column list for appointments queries.
const COLUMNS: &str = "id, customer_id, staff_id, product_id, branch_id, date, time, status, \
    notes, rescheduled_from, rescheduled_to, created_at, updated_at";

/// Provides ledger operations for appointments.
pub struct AppointmentRepo;

impl AppointmentRepo {
    /// Find an appointment by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AppointmentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM appointments WHERE id = $1");
        sqlx::query_as::<_, AppointmentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count active appointments at one (date, time, branch) slot.
    pub async fn count_active(
        pool: &PgPool,
        date: NaiveDate,
        time: NaiveTime,
        branch_id: Option<DbId>,
    ) -> Result<i64, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        count_active_on(&mut conn, date, time, branch_id).await
    }

    /// Active counts per slot start for one date and branch, ascending by time.
    pub async fn active_counts_for_day(
        pool: &PgPool,
        date: NaiveDate,
        branch_id: Option<DbId>,
    ) -> Result<Vec<SlotCount>, sqlx::Error> {
        sqlx::query_as::<_, SlotCount>(
            "SELECT time, COUNT(*) AS active FROM appointments
             WHERE date = $1
               AND branch_id IS NOT DISTINCT FROM $2
               AND status = ANY($3)
             GROUP BY time
             ORDER BY time ASC",
        )
        .bind(date)
        .bind(branch_id)
        .bind(active_status_strings())
        .fetch_all(pool)
        .await
    }

    /// List a customer's active appointments on or after `from`, ordered by
    /// (date, time) ascending.
    pub async fn list_upcoming(
        pool: &PgPool,
        customer_id: DbId,
        from: NaiveDate,
    ) -> Result<Vec<AppointmentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM appointments
             WHERE customer_id = $1
               AND date >= $2
               AND status = ANY($3)
             ORDER BY date ASC, time ASC, id ASC"
        );
        sqlx::query_as::<_, AppointmentRow>(&query)
            .bind(customer_id)
            .bind(from)
            .bind(active_status_strings())
            .fetch_all(pool)
            .await
    }

    /// Insert `input` only if the slot's active count is below `capacity`.
    ///
    /// Returns `None` when the slot is full. Waits at most `lock_wait` for
    /// the day lock.
    pub async fn insert_within_capacity(
        pool: &PgPool,
        input: &CreateAppointment,
        capacity: i64,
        lock_wait: Duration,
    ) -> Result<Option<AppointmentRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        lock_day(&mut tx, input.date, input.branch_id, lock_wait).await?;

        let active = count_active_on(&mut tx, input.date, input.time, input.branch_id).await?;
        if active >= capacity {
            tracing::debug!(
                date = %input.date,
                time = %input.time,
                active,
                capacity,
                "Slot at capacity, insert skipped"
            );
            tx.rollback().await?;
            return Ok(None);
        }

        let row = insert_on(&mut tx, input).await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    /// Compare-and-set status transition. Returns `None` when the record does
    /// not exist or its status is no longer `expected`.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        expected: &str,
        next: &str,
    ) -> Result<Option<AppointmentRow>, sqlx::Error> {
        let query = format!(
            "UPDATE appointments SET status = $3, updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AppointmentRow>(&query)
            .bind(id)
            .bind(expected)
            .bind(next)
            .fetch_optional(pool)
            .await
    }

    /// Insert `replacement` within capacity and mark `prior_id` as
    /// `rescheduled`, linking both records, in one transaction.
    pub async fn reschedule(
        pool: &PgPool,
        prior_id: DbId,
        expected: &str,
        replacement: &CreateAppointment,
        capacity: i64,
        lock_wait: Duration,
    ) -> Result<RescheduleRows, sqlx::Error> {
        let mut tx = pool.begin().await?;
        lock_day(&mut tx, replacement.date, replacement.branch_id, lock_wait).await?;

        let query = format!("SELECT {COLUMNS} FROM appointments WHERE id = $1 FOR UPDATE");
        let Some(prior) = sqlx::query_as::<_, AppointmentRow>(&query)
            .bind(prior_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(RescheduleRows::NotFound);
        };

        if prior.status != expected {
            tx.rollback().await?;
            return Ok(RescheduleRows::Stale(prior));
        }

        let active = count_active_on(
            &mut tx,
            replacement.date,
            replacement.time,
            replacement.branch_id,
        )
        .await?;
        if active >= capacity {
            tx.rollback().await?;
            return Ok(RescheduleRows::AtCapacity);
        }

        let replacement = insert_on(&mut tx, replacement).await?;

        let query = format!(
            "UPDATE appointments
             SET status = 'rescheduled', rescheduled_to = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let prior = sqlx::query_as::<_, AppointmentRow>(&query)
            .bind(prior_id)
            .bind(replacement.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RescheduleRows::Done { prior, replacement })
    }
}

/// Advisory lock key for one (date, branch).
pub fn day_lock_key(date: NaiveDate, branch_id: Option<DbId>) -> String {
    match branch_id {
        Some(branch) => format!("appointments:{date}:{branch}"),
        None => format!("appointments:{date}:-"),
    }
}

/// Serialize writers for one (date, branch) until the transaction ends.
///
/// `lock_timeout` stays in force for the rest of the transaction.
async fn lock_day(
    conn: &mut PgConnection,
    date: NaiveDate,
    branch_id: Option<DbId>,
    wait: Duration,
) -> Result<(), sqlx::Error> {
    // Zero would disable the timeout.
    let timeout = format!("{}ms", wait.as_millis().max(1));
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(timeout)
        .execute(&mut *conn)
        .await?;

    let key = day_lock_key(date, branch_id);
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn count_active_on(
    conn: &mut PgConnection,
    date: NaiveDate,
    time: NaiveTime,
    branch_id: Option<DbId>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM appointments
         WHERE date = $1
           AND time = $2
           AND branch_id IS NOT DISTINCT FROM $3
           AND status = ANY($4)",
    )
    .bind(date)
    .bind(time)
    .bind(branch_id)
    .bind(active_status_strings())
    .fetch_one(&mut *conn)
    .await
}

async fn insert_on(
    conn: &mut PgConnection,
    input: &CreateAppointment,
) -> Result<AppointmentRow, sqlx::Error> {
    let query = format!(
        "INSERT INTO appointments
            (customer_id, staff_id, product_id, branch_id, date, time, status, notes,
             rescheduled_from)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, AppointmentRow>(&query)
        .bind(input.customer_id)
        .bind(input.staff_id)
        .bind(input.product_id)
        .bind(input.branch_id)
        .bind(input.date)
        .bind(input.time)
        .bind(&input.status)
        .bind(&input.notes)
        .bind(input.rescheduled_from)
        .fetch_one(&mut *conn)
        .await
}

//! Repository tests against a live PostgreSQL. Run with
//! `DATABASE_URL=... cargo test -p aether-db -- --ignored`.

use aether_db::models::appointment::{CreateAppointment, RescheduleRows};
use std::time::Duration;

use aether_db::repositories::{day_lock_key, AppointmentRepo, SchedulingSettingsRepo};
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;

const WAIT: Duration = Duration::from_secs(2);

async fn seed_product(pool: &PgPool) -> i64 {
    sqlx::query_scalar("INSERT INTO products (name) VALUES ('Haircut') RETURNING id")
        .fetch_one(pool)
        .await
        .unwrap()
}

fn create(product_id: i64, customer_id: i64, time: &str) -> CreateAppointment {
    CreateAppointment {
        customer_id,
        staff_id: None,
        product_id,
        branch_id: Some(1),
        date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
        time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
        status: "booked".to_string(),
        notes: None,
        rescheduled_from: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn insert_stops_at_capacity(pool: PgPool) {
    let product = seed_product(&pool).await;

    let first = AppointmentRepo::insert_within_capacity(&pool, &create(product, 1, "09:00"), 1, WAIT)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = AppointmentRepo::insert_within_capacity(&pool, &create(product, 2, "09:00"), 1, WAIT)
        .await
        .unwrap();
    assert!(second.is_none());

    let date = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
    let counts = AppointmentRepo::active_counts_for_day(&pool, date, Some(1))
        .await
        .unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].active, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_inserts_never_overbook(pool: PgPool) {
    let product = seed_product(&pool).await;

    let handles: Vec<_> = (1..=8)
        .map(|customer| {
            let pool = pool.clone();
            let input = create(product, customer, "10:00");
            tokio::spawn(async move {
                AppointmentRepo::insert_within_capacity(&pool, &input, 2, WAIT)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn held_day_lock_times_out(pool: PgPool) {
    let product = seed_product(&pool).await;
    let input = create(product, 1, "09:00");

    // Another instance holding the same day open.
    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(day_lock_key(input.date, input.branch_id))
        .execute(&mut *holder)
        .await
        .unwrap();

    let err = AppointmentRepo::insert_within_capacity(&pool, &input, 1, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(aether_db::is_lock_timeout(&err), "unexpected error: {err:?}");

    holder.rollback().await.unwrap();
    let row = AppointmentRepo::insert_within_capacity(&pool, &input, 1, WAIT)
        .await
        .unwrap();
    assert!(row.is_some());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn transition_is_compare_and_set(pool: PgPool) {
    let product = seed_product(&pool).await;
    let row = AppointmentRepo::insert_within_capacity(&pool, &create(product, 1, "09:00"), 1, WAIT)
        .await
        .unwrap()
        .unwrap();

    let cancelled = AppointmentRepo::transition(&pool, row.id, "booked", "cancelled")
        .await
        .unwrap();
    assert_eq!(cancelled.map(|r| r.status).as_deref(), Some("cancelled"));

    let again = AppointmentRepo::transition(&pool, row.id, "booked", "cancelled")
        .await
        .unwrap();
    assert!(again.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn reschedule_links_records(pool: PgPool) {
    let product = seed_product(&pool).await;
    let prior = AppointmentRepo::insert_within_capacity(&pool, &create(product, 1, "09:00"), 1, WAIT)
        .await
        .unwrap()
        .unwrap();

    let mut replacement = create(product, 1, "10:00");
    replacement.rescheduled_from = Some(prior.id);
    let rows = AppointmentRepo::reschedule(&pool, prior.id, "booked", &replacement, 1, WAIT)
        .await
        .unwrap();

    let RescheduleRows::Done { prior, replacement } = rows else {
        panic!("reschedule should succeed, got {rows:?}");
    };
    assert_eq!(prior.status, "rescheduled");
    assert_eq!(prior.rescheduled_to, Some(replacement.id));

    let upcoming = AppointmentRepo::list_upcoming(&pool, 1, prior.date)
        .await
        .unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, replacement.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn settings_save_checks_version(pool: PgPool) {
    assert!(SchedulingSettingsRepo::load(&pool).await.unwrap().is_none());

    let doc = serde_json::json!({ "working_hours": ["09:00"] });
    let saved = SchedulingSettingsRepo::save(&pool, &doc, 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.version, 1);

    assert!(SchedulingSettingsRepo::save(&pool, &doc, 0)
        .await
        .unwrap()
        .is_none());
    let bumped = SchedulingSettingsRepo::save(&pool, &doc, 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bumped.version, 2);
}

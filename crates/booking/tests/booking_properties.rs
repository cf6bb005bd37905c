//! End-to-end booking behaviour on the in-memory stores.

use std::sync::Arc;

use aether_booking::store::{AppointmentLedger, ConversationStore, SettingsStore};
use aether_booking::{
    BookingCoordinator, BookingError, BookingPolicy, FixedClock, MemoryStore, Stores,
};
use aether_core::appointment::{AppointmentStatus, BookingRequest, Requester, SlotKey};
use aether_core::calendar::SuggestedSlot;
use aether_core::realtime::RoomEvent;
use aether_core::scheduling_config::SchedulingConfig;
use aether_core::types::{DbId, SlotTime};
use aether_events::RoomHub;
use assert_matches::assert_matches;
use chrono::NaiveDate;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn t(s: &str) -> SlotTime {
    s.parse().unwrap()
}

struct Fixture {
    coordinator: Arc<BookingCoordinator>,
    store: Arc<MemoryStore>,
    rooms: Arc<RoomHub>,
}

async fn fixture(config: SchedulingConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.add_product("Haircut", false).await;
    store.save(config, 0).await.unwrap();
    let rooms = Arc::new(RoomHub::default());
    let coordinator = BookingCoordinator::new(
        Stores::from_memory(store.clone()),
        rooms.clone(),
        BookingPolicy::default(),
    )
    .with_clock(Arc::new(FixedClock(date("2024-07-10"))));
    Fixture {
        coordinator: Arc::new(coordinator),
        store,
        rooms,
    }
}

fn two_slot_config() -> SchedulingConfig {
    SchedulingConfig {
        working_hours: vec![t("09:00"), t("10:00")],
        ..SchedulingConfig::default()
    }
}

fn request(customer_id: DbId, time: &str, branch_id: Option<DbId>) -> BookingRequest {
    BookingRequest {
        customer_id,
        product_id: 1,
        date: date("2024-07-15"),
        time: t(time),
        branch_id,
        staff_id: None,
        notes: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_bookings_for_one_slot_admit_exactly_capacity() {
    const ATTEMPTS: i64 = 16;
    let f = fixture(SchedulingConfig::default()).await;

    let handles: Vec<_> = (1..=ATTEMPTS)
        .map(|customer| {
            let coordinator = f.coordinator.clone();
            tokio::spawn(async move { coordinator.book(request(customer, "09:00", Some(1))).await })
        })
        .collect();

    let mut booked = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(BookingError::SlotConflict {
                suggested_slots, ..
            }) => {
                assert!(!suggested_slots.is_empty());
                conflicts += 1;
            }
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(booked, 1);
    assert_eq!(conflicts, ATTEMPTS - 1);
    let slot = SlotKey {
        date: date("2024-07-15"),
        time: t("09:00"),
        branch_id: Some(1),
    };
    assert_eq!(f.store.count_active(slot).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_bookings_respect_larger_capacity() {
    let config = SchedulingConfig {
        number_of_staff: 3,
        ..two_slot_config()
    };
    let f = fixture(config).await;

    let handles: Vec<_> = (1..=10)
        .map(|customer| {
            let coordinator = f.coordinator.clone();
            tokio::spawn(async move { coordinator.book(request(customer, "10:00", None)).await })
        })
        .collect();

    let mut booked = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            booked += 1;
        }
    }
    assert_eq!(booked, 3);
}

#[tokio::test]
async fn full_slot_suggests_next_slot_same_day() {
    let f = fixture(two_slot_config()).await;
    f.coordinator
        .book(request(1, "09:00", Some(2)))
        .await
        .unwrap();

    let availability = f
        .coordinator
        .availability(date("2024-07-15"), Some(2))
        .await
        .unwrap();
    assert_eq!(availability.slots, vec![t("10:00")]);
    assert!(!availability.fully_booked);

    let err = f
        .coordinator
        .book(request(2, "09:00", Some(2)))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        BookingError::SlotConflict { ref suggested_slots, .. }
            if suggested_slots[0] == SuggestedSlot { date: date("2024-07-15"), time: t("10:00") }
    );
}

#[tokio::test]
async fn cancelling_twice_fails_without_mutating() {
    let f = fixture(two_slot_config()).await;
    let appointment = f.coordinator.book(request(1, "09:00", None)).await.unwrap();
    let owner = Requester::customer(1);

    let cancelled = f.coordinator.cancel(appointment.id, owner).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    for _ in 0..3 {
        assert_matches!(
            f.coordinator.cancel(appointment.id, owner).await,
            Err(BookingError::NotFound(_))
        );
    }
    let stored = f.store.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Cancelled);
    assert_eq!(stored.updated_at, cancelled.updated_at);
}

#[tokio::test]
async fn completed_appointment_cannot_be_cancelled() {
    let f = fixture(two_slot_config()).await;
    let appointment = f.coordinator.book(request(1, "09:00", None)).await.unwrap();
    f.coordinator
        .complete(appointment.id, Requester::staff(99))
        .await
        .unwrap();

    assert_matches!(
        f.coordinator
            .cancel(appointment.id, Requester::customer(1))
            .await,
        Err(BookingError::NotFound(_))
    );
}

#[tokio::test]
async fn reschedule_leaves_exactly_one_active_record() {
    let f = fixture(two_slot_config()).await;
    let original = f.coordinator.book(request(1, "09:00", None)).await.unwrap();

    let moved = f
        .coordinator
        .reschedule(
            original.id,
            Requester::customer(1),
            date("2024-07-16"),
            t("10:00"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(moved.prior.status, AppointmentStatus::Rescheduled);
    assert_eq!(moved.prior.rescheduled_to, Some(moved.replacement.id));
    assert_eq!(moved.replacement.rescheduled_from, Some(original.id));
    assert_eq!(moved.replacement.status, AppointmentStatus::Booked);

    let upcoming = f.coordinator.list_upcoming(1).await.unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, moved.replacement.id);

    // The original slot is free again.
    let availability = f
        .coordinator
        .availability(date("2024-07-15"), None)
        .await
        .unwrap();
    assert_eq!(availability.slots, vec![t("09:00"), t("10:00")]);

    // The prior record is terminal.
    assert_matches!(
        f.coordinator
            .reschedule(original.id, Requester::customer(1), date("2024-07-17"), t("09:00"), None)
            .await,
        Err(BookingError::NotFound(_))
    );
}

#[tokio::test]
async fn upcoming_is_ordered_by_date_then_time() {
    let f = fixture(two_slot_config()).await;
    let mut later = request(1, "09:00", None);
    later.date = date("2024-07-16");
    f.coordinator.book(later).await.unwrap();
    f.coordinator.book(request(1, "10:00", None)).await.unwrap();
    f.coordinator.book(request(1, "09:00", None)).await.unwrap();

    let upcoming = f.coordinator.list_upcoming(1).await.unwrap();
    let order: Vec<_> = upcoming
        .iter()
        .map(|a| (a.date.to_string(), a.time.to_string()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("2024-07-15".to_string(), "09:00".to_string()),
            ("2024-07-15".to_string(), "10:00".to_string()),
            ("2024-07-16".to_string(), "09:00".to_string()),
        ]
    );
}

#[tokio::test]
async fn weekly_off_day_rejects_bookings() {
    let config = SchedulingConfig {
        weekly_off_days: [1].into_iter().collect(),
        ..two_slot_config()
    };
    let f = fixture(config).await;

    let availability = f
        .coordinator
        .availability(date("2024-07-15"), Some(5))
        .await
        .unwrap();
    assert!(availability.closed);
    assert!(availability.slots.is_empty());

    assert_matches!(
        f.coordinator.book(request(1, "09:00", Some(5))).await,
        Err(BookingError::Validation(_))
    );
}

#[tokio::test]
async fn booking_announces_to_the_customer_room() {
    let f = fixture(two_slot_config()).await;
    let conversation = f.store.conversation_for_customer(1).await.unwrap();
    let mut rx = f.rooms.connect("session-1").await;
    f.rooms.join("session-1", conversation.id).await;

    let appointment = f.coordinator.book(request(1, "09:00", None)).await.unwrap();
    f.coordinator
        .cancel(appointment.id, Requester::customer(1))
        .await
        .unwrap();

    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let RoomEvent::AppointmentStatusChanged { appointment, .. } = event {
            statuses.push(appointment.status);
        }
    }
    assert_eq!(
        statuses,
        vec![AppointmentStatus::Booked, AppointmentStatus::Cancelled]
    );
}

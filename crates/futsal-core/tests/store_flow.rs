use std::fs;

use futsal_core::availability::SelectionError;
use futsal_core::config::Config;
use futsal_core::datastore::DataStore;
use futsal_core::{
    BookingStatus, CalendarDay, NewBooking, Session, SlotLabel, SlotStatus, decode_feed,
    has_booking_on_day,
};
use tempfile::tempdir;

fn future_day() -> CalendarDay {
    CalendarDay::from_ymd(2099, 3, 10).expect("valid day")
}

fn request(name: &str, hour: u32) -> NewBooking {
    NewBooking {
        customer_name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone_number: "081234567".to_string(),
        day: future_day(),
        slot: SlotLabel::new(hour).expect("slot"),
        notes: None,
        is_walk_in: false,
        status: BookingStatus::Pending,
    }
}

fn status_at(session: &Session<DataStore>, hour: u32) -> SlotStatus {
    session
        .snapshot()
        .expect("snapshot")
        .schedule(future_day())
        .into_iter()
        .find(|entry| entry.slot.hour() == hour)
        .map(|entry| entry.status)
        .expect("slot in schedule")
}

#[test]
fn corrupt_feed_lines_are_skipped() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    fs::write(
        &store.bookings_path,
        concat!(
            r#"{"id":"a","customerName":"Andi","bookingDate":"2099-03-10","timeSlot":"08:00","status":"approved"}"#,
            "\n",
            "{not json\n",
            "\n",
            r#"{"_id":42,"name":"Budi","bookingDate":"2099-03-10","timeSlot":"9:00 AM - 10:00 AM","status":"pending"}"#,
            "\n",
        ),
    )
    .expect("write feed");

    let records = store.load_bookings().expect("load bookings");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].id, "42");
    assert_eq!(records[1].slot_hour(), Some(9));
}

#[test]
fn backend_records_with_null_fields_still_block_their_slots() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    fs::write(
        &store.bookings_path,
        concat!(
            r#"{"id":"w1","customerName":"Walk-in","email":null,"phoneNumber":null,"bookingDate":"2099-03-10","timeSlot":"14:00","status":"approved","isWalkIn":true}"#,
            "\n",
            r#"{"id":"w2","customerName":"Joko","bookingDate":"2099-03-10","timeSlot":"15:00","status":"approved","createdAt":"2024-06-10 09:12:00"}"#,
            "\n",
            r#"{"id":"w3","customerName":"Lina","bookingDate":"2099-03-11","timeSlot":"15:00","status":"cancelled"}"#,
            "\n",
        ),
    )
    .expect("write feed");

    let session = Session::new(Config::default(), store);
    let snapshot = session.snapshot().expect("snapshot");
    assert_eq!(snapshot.records.len(), 2);
    assert_eq!(snapshot.index.excluded(), 0);
    assert_eq!(status_at(&session, 14), SlotStatus::Booked);
    assert_eq!(status_at(&session, 15), SlotStatus::Booked);

    let err = session
        .book(request("Mira", 14))
        .expect_err("walk-in holds the slot");
    assert!(matches!(
        err.downcast_ref::<SelectionError>(),
        Some(SelectionError::SlotUnavailable {
            status: SlotStatus::Booked,
            ..
        })
    ));

    // Records with an unknown status are dropped, so their day gets no marker.
    let next_day = CalendarDay::from_ymd(2099, 3, 11).expect("valid day");
    assert!(!has_booking_on_day(next_day, &snapshot.records));
}

#[test]
fn booking_lifecycle_refetches_after_each_change() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let session = Session::new(Config::default(), store);

    assert_eq!(status_at(&session, 18), SlotStatus::Available);

    let (record, snapshot) = session.book(request("Citra", 18)).expect("book");
    assert_eq!(record.time_slot.as_deref(), Some("18:00"));
    assert_eq!(record.booking_date.as_deref(), Some("2099-03-10"));
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(status_at(&session, 18), SlotStatus::Pending);

    let err = session
        .book(request("Dewi", 18))
        .expect_err("slot is held");
    assert!(matches!(
        err.downcast_ref::<SelectionError>(),
        Some(SelectionError::SlotUnavailable { .. })
    ));

    session.approve(&record.id).expect("approve");
    assert_eq!(status_at(&session, 18), SlotStatus::Booked);
    assert!(session.approve(&record.id).is_err());

    let snapshot = session.reject(&record.id).expect("reject");
    assert_eq!(
        snapshot.find(&record.id).map(|r| r.status),
        Some(BookingStatus::Rejected)
    );
    assert_eq!(status_at(&session, 18), SlotStatus::Available);

    let snapshot = session.delete(&record.id).expect("delete");
    assert!(snapshot.records.is_empty());
    assert!(session.delete(&record.id).is_err());
}

#[test]
fn online_bookings_need_contact_details() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let session = Session::new(Config::default(), store);

    let mut online = request("Eka", 10);
    online.email.clear();
    assert!(session.book(online).is_err());

    let mut walk_in = request("Fajar", 10);
    walk_in.email.clear();
    walk_in.phone_number.clear();
    walk_in.is_walk_in = true;
    walk_in.status = BookingStatus::Approved;
    let (record, _) = session.book(walk_in).expect("walk-in booking");
    assert!(record.is_walk_in);
    assert_eq!(status_at(&session, 10), SlotStatus::Booked);
}

#[test]
fn import_merges_api_feed_by_id() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let first = decode_feed(
        r#"{"bookings": [
            {"_id": "x1", "customerName": "Gita", "bookingDate": "2099-03-10", "timeSlot": "07:00", "status": "pending"},
            {"_id": "x2", "customerName": "Hadi", "bookingDate": "2099-03-10", "timeSlot": "08:00", "status": "pending"},
            "not a booking"
        ]}"#,
    )
    .expect("decode");
    assert_eq!(first.skipped, 1);
    let outcome = store.import_feed(first).expect("import");
    assert_eq!((outcome.added, outcome.replaced), (2, 0));

    let second = decode_feed(
        r#"[{"_id": "x1", "customerName": "Gita", "bookingDate": "2099-03-10", "timeSlot": "07:00", "status": "approved"}]"#,
    )
    .expect("decode");
    let outcome = store.import_feed(second).expect("import");
    assert_eq!((outcome.added, outcome.replaced), (0, 1));

    let session = Session::new(Config::default(), store);
    assert_eq!(status_at(&session, 7), SlotStatus::Booked);
    assert_eq!(status_at(&session, 8), SlotStatus::Pending);
}

#[test]
fn saved_hours_reshape_the_schedule() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let session = Session::new(Config::default(), store);

    let mut settings = session.snapshot().expect("snapshot").settings;
    settings.set_hours("08:00", "12:00").expect("hours");
    settings.add_rule("No studs").expect("rule");
    let snapshot = session.save_settings(&settings).expect("save settings");

    assert_eq!(snapshot.schedule(future_day()).len(), 4);
    assert_eq!(snapshot.settings.court_rules, vec!["No studs"]);
    assert!(session.store().settings_path.exists());

    let err = session
        .book(request("Indra", 18))
        .expect_err("outside hours");
    assert!(matches!(
        err.downcast_ref::<SelectionError>(),
        Some(SelectionError::OutsideHours { .. })
    ));
}

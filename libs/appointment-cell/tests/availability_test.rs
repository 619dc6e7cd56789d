// libs/appointment-cell/tests/availability_test.rs
mod common;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate};

use appointment_cell::AppointmentError;
use shared_models::time::DayOfWeek;

use common::{monday, range, Clinic};

#[tokio::test]
async fn test_hour_schedule_yields_two_half_hour_slots() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("09:00", "10:00", 30).await;

    let slots = clinic.availability.get_available_slots(clinic.doctor, monday()).await.unwrap();

    let ranges: Vec<_> = slots.iter().map(|s| s.time_range).collect();
    assert_eq!(ranges, vec![range("09:00", "09:30"), range("09:30", "10:00")]);
    assert!(slots.iter().all(|s| s.is_available && s.room_id == clinic.room));
}

#[tokio::test]
async fn test_partial_remainder_is_dropped() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("09:00", "09:45", 30).await;

    let slots = clinic.availability.get_available_slots(clinic.doctor, monday()).await.unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].time_range, range("09:00", "09:30"));
}

#[tokio::test]
async fn test_booked_slot_is_unavailable() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("09:00", "11:00", 30).await;
    clinic.booking.book_appointment(clinic.request("09:00", "09:30")).await.unwrap();

    let slots = clinic.availability.get_available_slots(clinic.doctor, monday()).await.unwrap();

    assert_eq!(slots.len(), 4);
    assert!(!slots[0].is_available);
    assert!(slots[1..].iter().all(|s| s.is_available));
}

#[tokio::test]
async fn test_cancelled_booking_frees_slot() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("09:00", "10:00", 30).await;
    let appointment = clinic.booking.book_appointment(clinic.request("09:00", "09:30")).await.unwrap();
    clinic.booking.cancel(appointment.id).await.unwrap();

    let slots = clinic.availability.get_available_slots(clinic.doctor, monday()).await.unwrap();
    assert!(slots.iter().all(|s| s.is_available));
}

#[tokio::test]
async fn test_off_grid_booking_blocks_every_touched_slot() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("09:00", "10:30", 30).await;
    clinic.booking.book_appointment(clinic.request("09:15", "09:45")).await.unwrap();

    let slots = clinic.availability.get_available_slots(clinic.doctor, monday()).await.unwrap();
    let flags: Vec<bool> = slots.iter().map(|s| s.is_available).collect();
    assert_eq!(flags, vec![false, false, true]);
}

#[tokio::test]
async fn test_no_schedule_means_no_slots() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("09:00", "10:00", 30).await;

    // Tuesday has no schedule.
    let slots = clinic.availability
        .get_available_slots(clinic.doctor, monday() + Duration::days(1))
        .await
        .unwrap();
    assert!(slots.is_empty());

    let slots = clinic.availability
        .get_available_slots(clinic.other_doctor, monday())
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_multiple_schedules_concatenate_in_start_order() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("14:00", "15:00", 30).await;
    clinic.add_schedule("09:00", "10:00", 60).await;

    let slots = clinic.availability.get_available_slots(clinic.doctor, monday()).await.unwrap();
    let ranges: Vec<_> = slots.iter().map(|s| s.time_range).collect();
    assert_eq!(
        ranges,
        vec![range("09:00", "10:00"), range("14:00", "14:30"), range("14:30", "15:00")]
    );
}

#[tokio::test]
async fn test_slots_for_next_weekday_resolve_date() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("09:00", "10:00", 30).await;

    // From the Wednesday after, the next Monday is five days later.
    let wednesday = monday() + Duration::days(2);
    let dated = clinic.availability
        .get_slots_for_next(clinic.doctor, DayOfWeek::Monday, wednesday)
        .await
        .unwrap();

    assert_eq!(dated.date, monday() + Duration::days(7));
    assert_eq!(dated.slots.len(), 2);

    let same_day = clinic.availability
        .get_slots_for_next(clinic.doctor, DayOfWeek::Monday, monday())
        .await
        .unwrap();
    assert_eq!(same_day.date, monday());
}

#[tokio::test]
async fn test_slots_for_next_past_calendar_end_is_rejected() {
    let clinic = Clinic::new().await;
    clinic.add_schedule("09:00", "10:00", 30).await;

    let last = NaiveDate::MAX;
    let unreachable = DayOfWeek::ALL
        .into_iter()
        .find(|day| *day != DayOfWeek::from_date(last))
        .unwrap();

    assert_matches!(
        clinic.availability.get_slots_for_next(clinic.doctor, unreachable, last).await,
        Err(AppointmentError::Validation(_))
    );
}

//! Reminder scheduling across pauses, polls and cancellation.

use chrono::{DateTime, Duration, TimeZone, Utc};
use checkin_core::notify::{NotificationScheduler, ReminderKind};
use checkin_core::timer::TimerState;

const TARGET: u64 = 36;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

fn scheduled(id: &str) -> NotificationScheduler {
    let mut scheduler = NotificationScheduler::default();
    scheduler.schedule(&TimerState::started(id, t0()), TARGET);
    scheduler
}

#[test]
fn short_target_fires_on_five_minute_boundaries() {
    let mut scheduler = scheduled("s");
    let mut fired = Vec::new();

    // Poll every second for half an hour.
    for secs in 0..=1_800 {
        for reminder in scheduler.poll(at(secs)) {
            fired.push((secs, reminder.kind));
        }
    }

    assert_eq!(
        fired,
        vec![
            (36, ReminderKind::Threshold),
            (336, ReminderKind::Recurring { boundary_secs: 336 }),
            (636, ReminderKind::Recurring { boundary_secs: 636 }),
            (936, ReminderKind::Recurring { boundary_secs: 936 }),
            (1236, ReminderKind::Recurring { boundary_secs: 1236 }),
            (1536, ReminderKind::Recurring { boundary_secs: 1536 }),
        ]
    );
    assert!(!fired.iter().any(|(secs, _)| *secs == 36 + 150));
}

#[test]
fn one_shot_and_poll_observing_same_boundary_fire_once() {
    let mut scheduler = scheduled("s");
    scheduler.poll(at(36));

    // The one-shot wake-up lands exactly on the boundary and the coarse
    // poll comes a few seconds later.
    let due = scheduler.next_due_at().unwrap();
    assert_eq!(due, at(336));
    let from_timer = scheduler.evaluate("s", due);
    let from_poll = scheduler.poll(at(340));

    assert!(from_timer.is_some());
    assert!(from_poll.is_empty());
}

#[test]
fn persisted_copy_prevents_second_driver_from_refiring() {
    let mut first = scheduled("s");
    let mut second = first.clone();

    assert_eq!(first.poll(at(36)).len(), 1);
    let persisted: NotificationScheduler =
        serde_json::from_str(&serde_json::to_string(&first).unwrap()).unwrap();

    second.merge_progress(&persisted);
    assert!(second.poll(at(40)).is_empty());
}

#[test]
fn cancel_between_decision_and_next_poll_stops_reminders() {
    let mut scheduler = scheduled("s");
    assert_eq!(scheduler.poll(at(36)).len(), 1);

    assert!(scheduler.cancel("s"));
    for secs in [336, 636, 10_000] {
        assert!(scheduler.evaluate("s", at(secs)).is_none());
        assert!(scheduler.poll(at(secs)).is_empty());
    }
}

#[test]
fn cancelling_one_session_leaves_others() {
    let mut scheduler = scheduled("a");
    scheduler.schedule(&TimerState::started("b", t0()), TARGET);
    scheduler.cancel("a");

    let fired = scheduler.poll(at(36));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].check_in_id, "b");
}

#[test]
fn pauses_shift_boundaries_by_paused_time() {
    let mut timer = TimerState::started("s", t0());
    let mut scheduler = NotificationScheduler::default();
    scheduler.schedule(&timer, TARGET);

    timer.pause(at(10));
    scheduler.update_timer(&timer);
    timer.resume(at(110));
    scheduler.update_timer(&timer);

    assert!(scheduler.poll(at(135)).is_empty());
    assert_eq!(scheduler.poll(at(136))[0].kind, ReminderKind::Threshold);
    assert_eq!(scheduler.next_due_at(), Some(at(436)));
}

#[test]
fn schedule_survives_json_round_trip() {
    let mut scheduler = scheduled("s");
    scheduler.poll(at(400));

    let json = serde_json::to_string(&scheduler).unwrap();
    let restored: NotificationScheduler = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, scheduler);
}

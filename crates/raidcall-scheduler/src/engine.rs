//! Reminder engine: decides, per event and per tick, what time has changed.
//!
//! Evaluation runs on a snapshot first. Only when something would change is
//! the same step re-applied inside [`EventStore::update`], so a signup landing
//! between the snapshot and the write is never overwritten.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use raidcall_core::{Event, EventStatus, Result};
use raidcall_store::EventStore;

use crate::intents::TickOutcome;

/// Tolerance either side of a recurring event's reminder instant.
const REMINDER_WINDOW_MINUTES: i64 = 1;

/// What one step did to an event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Step {
    remind: bool,
    changed: bool,
    /// A posted occurrence was left behind by a schedule advance.
    retired: bool,
}

impl Step {
    fn any(self) -> bool {
        self.remind || self.changed || self.retired
    }
}

pub struct ReminderEngine {
    store: Arc<EventStore>,
    default_reminder_minutes: u32,
}

impl ReminderEngine {
    pub fn new(store: Arc<EventStore>, default_reminder_minutes: u32) -> Self {
        Self {
            store,
            default_reminder_minutes,
        }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// One scheduling pass at `now`.
    ///
    /// A persistence failure skips that event for this pass only; the same
    /// condition is re-evaluated on the next one.
    pub fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for snapshot in self.store.list_all() {
            if snapshot.status == EventStatus::Cancelled {
                continue;
            }

            let (event, step) = if snapshot.is_active() {
                let id = snapshot.id.clone();
                match self.apply(snapshot, now) {
                    Ok(applied) => applied,
                    Err(e) => {
                        tracing::warn!("⚠️ Skipping event {id} this tick: {e}");
                        continue;
                    }
                }
            } else {
                (snapshot, Step::default())
            };

            if step.retired || teardown_due(&event, now) {
                outcome.teardown.push(event.clone());
            }
            if step.remind {
                outcome.remind.push(event.clone());
            }
            if step.changed {
                outcome.update.push(event);
            }
        }

        if !outcome.is_empty() {
            tracing::info!(
                "⏰ Tick: {} remind, {} update, {} teardown",
                outcome.remind.len(),
                outcome.update.len(),
                outcome.teardown.len()
            );
        }
        outcome
    }

    /// Active events whose deferred announcement is due and not yet posted.
    /// Events whose auto-delete deadline already passed are never published late.
    pub fn due_publications(&self, now: DateTime<Utc>) -> Vec<Event> {
        self.store
            .list_active()
            .into_iter()
            .filter(|e| !e.is_posted())
            .filter(|e| e.announcement_time.is_some_and(|at| now >= at))
            .filter(|e| e.auto_delete_at().is_none_or(|deadline| now < deadline))
            .collect()
    }

    /// Fetch an event for an out-of-band reminder. The reminder flag is left alone.
    pub fn remind_now(&self, id: &str) -> Result<Event> {
        let event = self.store.get(id)?;
        tracing::info!("🔔 Manual reminder for {} [{}]", event.name, event.id);
        Ok(event)
    }

    fn apply(&self, snapshot: Event, now: DateTime<Utc>) -> Result<(Event, Step)> {
        let mut scratch = snapshot.clone();
        let preview = step(&mut scratch, now, self.default_reminder_minutes)?;
        if !preview.any() {
            return Ok((snapshot, preview));
        }

        let default = self.default_reminder_minutes;
        self.store.update(&snapshot.id, |event| {
            if !event.is_active() {
                return Ok(Step::default());
            }
            step(event, now, default)
        })
    }
}

/// Advance `event` to `now`. Pure apart from mutating `event`.
///
/// Fails without touching the caller's record when any instant it would
/// need falls outside the representable range.
fn step(event: &mut Event, now: DateTime<Utc>, default_minutes: u32) -> Result<Step> {
    event.check_schedule(default_minutes)?;
    let mut out = Step::default();

    if event.is_recurring() {
        while event.occurrence_end().is_some_and(|end| now >= end) {
            if event.is_posted() && event.delete_after_hours > 0 {
                out.retired = true;
            }
            event.advance_occurrence()?;
            event.check_schedule(default_minutes)?;
            out.changed = true;
        }

        if !event.reminder_sent
            && let Some(at) = event.reminder_time(default_minutes)
        {
            let window = Duration::minutes(REMINDER_WINDOW_MINUTES);
            let opens = at.checked_sub_signed(window).unwrap_or(at);
            let closes = at.checked_add_signed(window).unwrap_or(at);
            if now >= opens && now <= closes {
                event.reminder_sent = true;
                out.remind = true;
                out.changed = true;
            }
        }
    } else {
        if !event.reminder_sent
            && event.reminder_time(default_minutes).is_some_and(|at| now >= at)
        {
            event.reminder_sent = true;
            out.remind = true;
        }
        if event.occurrence_end().is_some_and(|end| now >= end)
            && event.status != EventStatus::Completed
        {
            event.status = EventStatus::Completed;
            out.changed = true;
        }
    }

    Ok(out)
}

fn teardown_due(event: &Event, now: DateTime<Utc>) -> bool {
    event.is_posted() && event.auto_delete_at().is_some_and(|deadline| now >= deadline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use raidcall_core::PostedMessage;
    use std::collections::BTreeMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 10, 21, 0, 0).unwrap()
    }

    fn event(id: &str, start: DateTime<Utc>, repeat: u32) -> Event {
        Event {
            id: id.into(),
            name: format!("Event {id}"),
            kind: "raid".into(),
            description: String::new(),
            start_time: start,
            channel: "chan".into(),
            message_id: None,
            thread_id: None,
            external_event_id: None,
            create_external_event: false,
            template_name: None,
            roles: vec![],
            signups: BTreeMap::new(),
            status: EventStatus::Active,
            created_at: start - Duration::days(3),
            created_by: "admin".into(),
            allow_multi_signup: false,
            max_participants: None,
            repeat_every_days: repeat,
            reminder_sent: false,
            reminder_minutes: 15,
            announcement_time: None,
            announcement_offset_hours: 0,
            delete_after_hours: 0,
        }
    }

    fn engine_with(events: Vec<Event>) -> (tempfile::TempDir, ReminderEngine) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(EventStore::open(dir.path()).unwrap());
        for e in events {
            store.save(e).unwrap();
        }
        (dir, ReminderEngine::new(store, 15))
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_recurring_advances_instead_of_completing() {
        let (_dir, engine) = engine_with(vec![event("weekly", t0(), 7)]);
        let out = engine.tick(t0() + Duration::hours(3));

        assert_eq!(ids(&out.update), ["weekly"]);
        let stored = engine.store().get("weekly").unwrap();
        assert_eq!(stored.status, EventStatus::Active);
        assert_eq!(stored.start_time, t0() + Duration::days(7));
        assert!(!stored.reminder_sent);
    }

    #[test]
    fn test_recurring_fast_forwards_missed_occurrences() {
        let mut weekly = event("weekly", t0(), 7);
        weekly.announcement_offset_hours = 24;
        weekly.announcement_time = Some(t0() - Duration::hours(24));
        let (_dir, engine) = engine_with(vec![weekly]);

        engine.tick(t0() + Duration::days(22));
        let stored = engine.store().get("weekly").unwrap();
        assert_eq!(stored.start_time, t0() + Duration::days(28));
        assert_eq!(
            stored.announcement_time,
            Some(t0() + Duration::days(28) - Duration::hours(24))
        );
    }

    #[test]
    fn test_recurring_reminder_window() {
        let (_dir, engine) = engine_with(vec![event("weekly", t0(), 7)]);

        // Well before the window.
        assert!(engine.tick(t0() - Duration::minutes(30)).remind.is_empty());

        let out = engine.tick(t0() - Duration::minutes(16));
        assert_eq!(ids(&out.remind), ["weekly"]);
        assert_eq!(ids(&out.update), ["weekly"]);

        // Same occurrence never fires twice.
        assert!(engine.tick(t0() - Duration::minutes(15)).remind.is_empty());
        assert!(engine.store().get("weekly").unwrap().reminder_sent);
    }

    #[test]
    fn test_recurring_window_missed_is_not_fired_late() {
        let (_dir, engine) = engine_with(vec![event("weekly", t0(), 7)]);
        let out = engine.tick(t0() - Duration::minutes(5));
        assert!(out.remind.is_empty());
        assert!(out.update.is_empty());
    }

    #[test]
    fn test_recurring_advance_and_remind_same_tick() {
        let mut daily = event("daily", t0(), 1);
        daily.reminder_sent = true;
        let (_dir, engine) = engine_with(vec![daily]);

        let next = t0() + Duration::days(1);
        let out = engine.tick(next - Duration::minutes(15));
        assert_eq!(ids(&out.remind), ["daily"]);
        let stored = engine.store().get("daily").unwrap();
        assert_eq!(stored.start_time, next);
        assert!(stored.reminder_sent);
    }

    #[test]
    fn test_one_shot_reminds_exactly_once_then_completes() {
        let (_dir, engine) = engine_with(vec![event("once", t0(), 0)]);

        let mut fired = 0;
        let mut at = t0() - Duration::minutes(20);
        while at < t0() + Duration::minutes(30) {
            fired += engine.tick(at).remind.len();
            at += Duration::minutes(1);
        }
        assert_eq!(fired, 1);
        assert!(engine.store().get("once").unwrap().is_active());

        let out = engine.tick(t0() + Duration::hours(2));
        assert_eq!(ids(&out.update), ["once"]);
        assert_eq!(
            engine.store().get("once").unwrap().status,
            EventStatus::Completed
        );
        assert!(engine.tick(t0() + Duration::hours(3)).is_empty());
    }

    #[test]
    fn test_lead_falls_back_to_process_default() {
        let mut e = event("once", t0(), 0);
        e.reminder_minutes = 0;
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(EventStore::open(dir.path()).unwrap());
        store.save(e).unwrap();
        let engine = ReminderEngine::new(store, 60);

        assert!(engine.tick(t0() - Duration::minutes(61)).remind.is_empty());
        assert_eq!(engine.tick(t0() - Duration::minutes(60)).remind.len(), 1);
    }

    #[test]
    fn test_teardown_after_completion() {
        let mut e = event("once", t0(), 0);
        e.reminder_sent = true;
        e.delete_after_hours = 4;
        e.message_id = Some("m1".into());
        let (_dir, engine) = engine_with(vec![e]);

        assert!(engine.tick(t0() + Duration::hours(3)).teardown.is_empty());
        let out = engine.tick(t0() + Duration::hours(4));
        assert_eq!(ids(&out.teardown), ["once"]);

        engine.store().clear_message("once").unwrap();
        assert!(engine.tick(t0() + Duration::hours(5)).teardown.is_empty());
    }

    #[test]
    fn test_recurring_teardown_when_occurrence_retires() {
        let mut e = event("weekly", t0(), 7);
        e.reminder_sent = true;
        e.delete_after_hours = 6;
        e.message_id = Some("m1".into());
        let (_dir, engine) = engine_with(vec![e]);

        let out = engine.tick(t0() + Duration::hours(2));
        assert_eq!(ids(&out.teardown), ["weekly"]);
        assert_eq!(ids(&out.update), ["weekly"]);
    }

    #[test]
    fn test_recurring_teardown_inside_the_occurrence() {
        let mut e = event("weekly", t0(), 7);
        e.reminder_sent = true;
        e.delete_after_hours = 1;
        e.message_id = Some("m1".into());
        let (_dir, engine) = engine_with(vec![e]);

        assert!(engine.tick(t0() + Duration::minutes(59)).teardown.is_empty());

        // Deadline reached while the occurrence is still running.
        let out = engine.tick(t0() + Duration::hours(1));
        assert_eq!(ids(&out.teardown), ["weekly"]);
        assert!(out.update.is_empty());
        assert_eq!(engine.store().get("weekly").unwrap().start_time, t0());

        // The dispatcher clears the refs; the later advance has nothing to retire.
        engine.store().clear_message("weekly").unwrap();
        let out = engine.tick(t0() + Duration::hours(2));
        assert!(out.teardown.is_empty());
        assert_eq!(ids(&out.update), ["weekly"]);
    }

    #[test]
    fn test_out_of_range_record_is_skipped_without_stopping_the_pass() {
        let mut doomed = event("doomed", t0(), 0);
        doomed.delete_after_hours = 3_000_000_000;
        doomed.message_id = Some("m1".into());
        let mut runaway = event("runaway", t0(), 200_000_000);
        runaway.reminder_sent = true;
        let healthy = event("healthy", t0(), 0);
        let dir = tempfile::TempDir::new().unwrap();
        for e in [&doomed, &runaway, &healthy] {
            std::fs::write(
                dir.path().join(format!("{}.json", e.id)),
                serde_json::to_string(e).unwrap(),
            )
            .unwrap();
        }
        let engine = ReminderEngine::new(Arc::new(EventStore::open(dir.path()).unwrap()), 15);

        let out = engine.tick(t0() + Duration::hours(3));
        assert_eq!(ids(&out.update), ["healthy"]);
        assert!(out.teardown.is_empty());

        // Still skipped on later passes; nothing panics.
        for hours in [4, 5] {
            assert!(engine.tick(t0() + Duration::hours(hours)).is_empty());
        }
        assert_eq!(engine.store().get("runaway").unwrap().start_time, t0());
        assert!(engine.store().get("doomed").unwrap().is_active());
    }

    #[test]
    fn test_cancelled_events_are_ignored() {
        let mut e = event("gone", t0(), 0);
        e.status = EventStatus::Cancelled;
        e.message_id = Some("m1".into());
        e.delete_after_hours = 1;
        let (_dir, engine) = engine_with(vec![e]);
        assert!(engine.tick(t0() + Duration::hours(5)).is_empty());
    }

    #[test]
    fn test_due_publications() {
        let mut due = event("due", t0(), 0);
        due.announcement_time = Some(t0() - Duration::hours(24));
        let mut early = event("early", t0() + Duration::days(3), 0);
        early.announcement_time = Some(t0() + Duration::days(2));
        let mut stale = event("stale", t0() - Duration::hours(6), 0);
        stale.announcement_time = Some(t0() - Duration::hours(30));
        stale.delete_after_hours = 3;
        let mut posted = event("posted", t0(), 0);
        posted.announcement_time = Some(t0() - Duration::hours(24));
        let immediate = event("immediate", t0(), 0);
        let (_dir, engine) = engine_with(vec![due, early, stale, posted, immediate]);
        engine
            .store()
            .attach_message(
                "posted",
                &PostedMessage {
                    message_id: "m".into(),
                    thread_id: None,
                },
            )
            .unwrap();

        let ready = engine.due_publications(t0() - Duration::hours(1));
        assert_eq!(ids(&ready), ["due"]);
    }

    #[test]
    fn test_persistence_failure_skips_event_for_one_tick() {
        let (dir, engine) = engine_with(vec![event("weekly", t0(), 7)]);
        std::fs::remove_dir_all(dir.path()).unwrap();

        let out = engine.tick(t0() + Duration::hours(3));
        assert!(out.is_empty());
        assert_eq!(engine.store().get("weekly").unwrap().start_time, t0());

        std::fs::create_dir_all(dir.path()).unwrap();
        let out = engine.tick(t0() + Duration::hours(3));
        assert_eq!(ids(&out.update), ["weekly"]);
    }

    #[test]
    fn test_tick_applies_to_latest_record() {
        let (_dir, engine) = engine_with(vec![event("once", t0(), 0)]);
        engine
            .store()
            .update("once", |e| {
                e.description = "edited".into();
                Ok(())
            })
            .unwrap();
        engine.tick(t0() + Duration::hours(2));
        let stored = engine.store().get("once").unwrap();
        assert_eq!(stored.description, "edited");
        assert_eq!(stored.status, EventStatus::Completed);
    }

    #[test]
    fn test_remind_now_leaves_flag() {
        let (_dir, engine) = engine_with(vec![event("once", t0(), 0)]);
        let e = engine.remind_now("once").unwrap();
        assert!(!e.reminder_sent);
        assert!(!engine.store().get("once").unwrap().reminder_sent);
        assert!(engine.remind_now("missing").unwrap_err().is_not_found());
    }
}

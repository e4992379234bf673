//! Event creation and administrative actions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use raidcall_core::{Clock, Event, EventStatus, RaidcallError, Result, RoleSlot};
use raidcall_store::{EventStore, TemplateCatalog};

/// Everything an adapter collects to create an event.
///
/// Lead times are signed so adapters can pass raw user input; negative
/// values are treated as 0 and values over a year are rejected.
#[derive(Debug, Clone, Default)]
pub struct CreateEventInput {
    pub name: String,
    pub kind: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub channel: String,
    pub template_name: Option<String>,
    pub repeat_every_days: i64,
    /// Publish this many hours before start instead of immediately.
    pub announce_hours: i64,
    pub reminder_minutes: i64,
    pub delete_after_hours: i64,
    pub create_external_event: bool,
    pub created_by: String,
}

// Upper bounds on caller-supplied schedule offsets: one year each.
const MAX_REPEAT_DAYS: i64 = 366;
const MAX_LEAD_HOURS: i64 = 24 * 366;
const MAX_REMINDER_MINUTES: i64 = 60 * 24 * 366;

/// Negative leads mean "none"; anything above `max` is refused.
fn clamp_lead(field: &str, value: i64, max: i64) -> Result<u32> {
    if value > max {
        return Err(RaidcallError::Validation(format!(
            "{field} must be at most {max} (got {value})"
        )));
    }
    u32::try_from(value.max(0))
        .map_err(|_| RaidcallError::Validation(format!("{field} is out of range")))
}

/// Builds events from requests and applies admin lifecycle actions.
pub struct EventService {
    store: Arc<EventStore>,
    catalog: Arc<TemplateCatalog>,
    default_roles: Vec<RoleSlot>,
    clock: Arc<dyn Clock>,
    enable_external_events: bool,
}

impl EventService {
    pub fn new(
        store: Arc<EventStore>,
        catalog: Arc<TemplateCatalog>,
        default_roles: Vec<RoleSlot>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            default_roles,
            clock,
            enable_external_events: false,
        }
    }

    /// Allow events to request an external calendar entry.
    pub fn with_external_events(mut self, enabled: bool) -> Self {
        self.enable_external_events = enabled;
        self
    }

    /// Validate the input, build the event, persist it and return it.
    pub fn create(&self, input: CreateEventInput) -> Result<Event> {
        for (field, value) in [
            ("name", &input.name),
            ("type", &input.kind),
            ("channel", &input.channel),
        ] {
            if value.trim().is_empty() {
                return Err(RaidcallError::Validation(format!("event {field} is required")));
            }
        }

        let announce_hours = clamp_lead("announce_hours", input.announce_hours, MAX_LEAD_HOURS)?;
        let repeat_every_days =
            clamp_lead("repeat_every_days", input.repeat_every_days, MAX_REPEAT_DAYS)?;
        let reminder_minutes =
            clamp_lead("reminder_minutes", input.reminder_minutes, MAX_REMINDER_MINUTES)?;
        let delete_after_hours =
            clamp_lead("delete_after_hours", input.delete_after_hours, MAX_LEAD_HOURS)?;
        let mut event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            kind: input.kind,
            description: input.description,
            start_time: input.start_time,
            channel: input.channel,
            message_id: None,
            thread_id: None,
            external_event_id: None,
            create_external_event: input.create_external_event && self.enable_external_events,
            template_name: None,
            roles: Vec::new(),
            signups: BTreeMap::new(),
            status: EventStatus::Active,
            created_at: self.clock.now(),
            created_by: input.created_by,
            allow_multi_signup: false,
            max_participants: None,
            repeat_every_days,
            reminder_sent: false,
            reminder_minutes,
            announcement_time: None,
            announcement_offset_hours: 0,
            delete_after_hours,
        };

        if announce_hours > 0 {
            event.announcement_time = event
                .start_time
                .checked_sub_signed(Duration::hours(i64::from(announce_hours)));
            event.announcement_offset_hours = announce_hours;
        }
        event.check_schedule(0)?;

        if input.create_external_event && !self.enable_external_events {
            tracing::debug!("External calendar entries are disabled; ignoring request");
        }

        match input.template_name.filter(|t| !t.trim().is_empty()) {
            Some(name) => {
                let template = self.catalog.get(&name)?;
                event.roles = template.to_role_slots();
                event.max_participants = template.max_participants.filter(|m| *m > 0);
                event.allow_multi_signup = template.allow_multi_signup;
                event.template_name = Some(template.name);
            }
            None => event.roles = self.default_roles.clone(),
        }

        let event = self.store.save(event)?;
        tracing::info!(
            "📅 Event created: {} ({}) at {} [{}]",
            event.name,
            event.kind,
            event.start_time,
            event.id
        );
        Ok(event)
    }

    /// Whether the adapter should publish this event right away rather than
    /// waiting for its announcement time. An announcement time already in the
    /// past counts as due now.
    pub fn needs_immediate_publication(event: &Event, now: DateTime<Utc>) -> bool {
        event.is_active()
            && !event.is_posted()
            && event.announcement_time.is_none_or(|at| at <= now)
    }

    /// Move an active event to `cancelled`. The returned event still carries
    /// its message references so the adapter can tear them down.
    pub fn cancel_event(&self, id: &str) -> Result<Event> {
        let (event, ()) = self.store.update(id, |event| {
            if !event.status.can_transition_to(EventStatus::Cancelled) {
                return Err(RaidcallError::Validation(format!(
                    "event {id} is already {}",
                    event.status
                )));
            }
            event.status = EventStatus::Cancelled;
            Ok(())
        })?;
        tracing::info!("🚫 Event cancelled: {} [{}]", event.name, event.id);
        Ok(event)
    }

    /// Remove an event permanently, returning its last state.
    pub fn delete_event(&self, id: &str) -> Result<Event> {
        let event = self.store.get(id)?;
        self.store.delete(id)?;
        Ok(event)
    }

    /// Record the external calendar entry created for this event.
    pub fn set_external_ref(&self, id: &str, external_id: &str) -> Result<Event> {
        self.store.set_external_ref(id, external_id)
    }
}

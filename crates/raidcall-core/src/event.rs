//! Event definitions: the core data model for scheduled group activities.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RaidcallError, Result};

/// Every occurrence is treated as lasting this long, regardless of what it actually is.
pub const OCCURRENCE_LENGTH_HOURS: i64 = 2;

/// Reminder lead used when neither the event nor the process configures one.
pub const FALLBACK_REMINDER_MINUTES: u32 = 15;

/// A scheduled activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique, immutable identifier. Also the record's file stem.
    pub id: String,
    pub name: String,
    /// Free-text category ("raid", "dungeon", ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    /// Start of the current occurrence.
    pub start_time: DateTime<Utc>,
    /// Destination channel reference (opaque to the core).
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Reference to the chat platform's own calendar entry, if one was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_event_id: Option<String>,
    /// Whether the creator asked for an external calendar entry.
    #[serde(default)]
    pub create_external_event: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleSlot>,
    /// Role name → signups in arrival order.
    #[serde(default)]
    pub signups: BTreeMap<String, Vec<Signup>>,
    #[serde(default)]
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub allow_multi_signup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
    /// 0 = one-shot.
    #[serde(default)]
    pub repeat_every_days: u32,
    #[serde(default)]
    pub reminder_sent: bool,
    /// 0 = use the process-wide default.
    #[serde(default)]
    pub reminder_minutes: u32,
    /// Deferred first publication instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement_time: Option<DateTime<Utc>>,
    /// Hours before start the announcement was derived from (0 = none).
    #[serde(default)]
    pub announcement_offset_hours: u32,
    /// Tear down the posted message this many hours after start (0 = never).
    #[serde(default)]
    pub delete_after_hours: u32,
}

/// Event lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl EventStatus {
    /// Status only ever leaves `Active`.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Active, EventStatus::Completed)
                | (EventStatus::Active, EventStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A capacity-bounded signup category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSlot {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    /// 0 = unlimited.
    #[serde(default)]
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<ClassInfo>,
}

/// A sub-specialization inside a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One user's claim on a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signup {
    pub user_id: String,
    pub username: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub status: SignupStatus,
    pub signed_up_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignupStatus {
    Pending,
    Confirmed,
    Declined,
}

impl std::fmt::Display for SignupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Declined => write!(f, "declined"),
        }
    }
}

/// References returned by the messaging collaborator after publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl Event {
    pub fn is_active(&self) -> bool {
        self.status == EventStatus::Active
    }

    pub fn is_recurring(&self) -> bool {
        self.repeat_every_days > 0
    }

    pub fn is_posted(&self) -> bool {
        self.message_id.is_some()
    }

    /// Nominal end of the current occurrence. `None` when it falls outside
    /// the representable range.
    pub fn occurrence_end(&self) -> Option<DateTime<Utc>> {
        self.start_time
            .checked_add_signed(Duration::hours(OCCURRENCE_LENGTH_HOURS))
    }

    /// Event-specific lead, else the process default, else 15 minutes.
    pub fn reminder_lead_minutes(&self, process_default: u32) -> u32 {
        if self.reminder_minutes > 0 {
            self.reminder_minutes
        } else if process_default > 0 {
            process_default
        } else {
            FALLBACK_REMINDER_MINUTES
        }
    }

    pub fn reminder_time(&self, process_default: u32) -> Option<DateTime<Utc>> {
        let lead = i64::from(self.reminder_lead_minutes(process_default));
        self.start_time.checked_sub_signed(Duration::minutes(lead))
    }

    /// Instant after which the posted message should be torn down.
    /// `None` when no deadline is configured or it cannot be represented.
    pub fn auto_delete_at(&self) -> Option<DateTime<Utc>> {
        if self.delete_after_hours == 0 {
            return None;
        }
        self.start_time
            .checked_add_signed(Duration::hours(i64::from(self.delete_after_hours)))
    }

    /// Start of the occurrence after the current one.
    pub fn next_start(&self) -> Option<DateTime<Utc>> {
        self.start_time
            .checked_add_signed(Duration::days(i64::from(self.repeat_every_days)))
    }

    /// Announcement instant derived from `start` and the configured offset.
    fn announcement_for(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        start.checked_sub_signed(Duration::hours(i64::from(self.announcement_offset_hours)))
    }

    /// Every instant the scheduler derives from this record must be
    /// representable; a record that fails this is skipped, never evaluated.
    pub fn check_schedule(&self, process_default: u32) -> Result<()> {
        let overflow = |what: &str| {
            RaidcallError::Validation(format!(
                "event {}: {what} is outside the supported date range",
                self.id
            ))
        };
        self.occurrence_end().ok_or_else(|| overflow("occurrence end"))?;
        self.reminder_time(process_default)
            .ok_or_else(|| overflow("reminder time"))?;
        if self.delete_after_hours > 0 {
            self.auto_delete_at()
                .ok_or_else(|| overflow("auto-delete deadline"))?;
        }
        if self.is_recurring() {
            let next = self.next_start().ok_or_else(|| overflow("next occurrence"))?;
            next.checked_add_signed(Duration::hours(OCCURRENCE_LENGTH_HOURS))
                .ok_or_else(|| overflow("next occurrence"))?;
        }
        if self.announcement_offset_hours > 0 {
            self.announcement_for(self.start_time)
                .ok_or_else(|| overflow("announcement time"))?;
        }
        Ok(())
    }

    /// Move to the next occurrence: shift start, re-arm the reminder, and
    /// re-derive the announcement instant when one was configured.
    /// Leaves the event untouched if the next occurrence is unrepresentable.
    pub fn advance_occurrence(&mut self) -> Result<()> {
        let next = self.next_start().ok_or_else(|| {
            RaidcallError::Validation(format!(
                "event {}: next occurrence is outside the supported date range",
                self.id
            ))
        })?;
        let announcement = if self.announcement_offset_hours > 0 {
            Some(self.announcement_for(next).ok_or_else(|| {
                RaidcallError::Validation(format!(
                    "event {}: announcement time is outside the supported date range",
                    self.id
                ))
            })?)
        } else {
            self.announcement_time
        };
        self.start_time = next;
        self.announcement_time = announcement;
        self.reminder_sent = false;
        Ok(())
    }

    pub fn role(&self, name: &str) -> Option<&RoleSlot> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// Capacity of a role; roles not declared on the event are unlimited.
    pub fn capacity_of(&self, role: &str) -> u32 {
        self.role(role).map(|r| r.limit).unwrap_or(0)
    }

    pub fn confirmed_count(&self, role: &str) -> usize {
        self.signups
            .get(role)
            .map(|list| {
                list.iter()
                    .filter(|s| s.status == SignupStatus::Confirmed)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_role_full(&self, role: &str) -> bool {
        let limit = self.capacity_of(role);
        limit > 0 && self.confirmed_count(role) >= limit as usize
    }

    /// Role names the user currently holds a signup in.
    pub fn roles_held_by(&self, user_id: &str) -> Vec<&str> {
        self.signups
            .iter()
            .filter(|(_, list)| list.iter().any(|s| s.user_id == user_id))
            .map(|(role, _)| role.as_str())
            .collect()
    }

    pub fn signup_of(&self, user_id: &str, role: &str) -> Option<&Signup> {
        self.signups
            .get(role)
            .and_then(|list| list.iter().find(|s| s.user_id == user_id))
    }

    pub fn signup_of_mut(&mut self, user_id: &str, role: &str) -> Option<&mut Signup> {
        self.signups
            .get_mut(role)
            .and_then(|list| list.iter_mut().find(|s| s.user_id == user_id))
    }

    /// Append a signup under its role, creating the role bucket on first use.
    pub fn push_signup(&mut self, signup: Signup) {
        self.signups
            .entry(signup.role.clone())
            .or_default()
            .push(signup);
    }

    /// Remove every signup the user holds. Returns how many were removed.
    pub fn remove_signups_of(&mut self, user_id: &str) -> usize {
        let mut removed = 0;
        for list in self.signups.values_mut() {
            let before = list.len();
            list.retain(|s| s.user_id != user_id);
            removed += before - list.len();
        }
        self.signups.retain(|_, list| !list.is_empty());
        removed
    }

    /// Users to mention in a reminder, in role then arrival order, deduplicated.
    pub fn confirmed_user_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for signup in self.signups.values().flatten() {
            if signup.status == SignupStatus::Confirmed && !ids.contains(&signup.user_id.as_str())
            {
                ids.push(&signup.user_id);
            }
        }
        ids
    }

    pub fn signup_count(&self) -> usize {
        self.signups.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(start: DateTime<Utc>) -> Event {
        Event {
            id: "evt-1".into(),
            name: "Molten Core".into(),
            kind: "raid".into(),
            description: String::new(),
            start_time: start,
            channel: "chan-1".into(),
            message_id: None,
            thread_id: None,
            external_event_id: None,
            create_external_event: false,
            template_name: None,
            roles: vec![RoleSlot {
                name: "Tank".into(),
                emoji: "🛡️".into(),
                limit: 1,
                classes: vec![],
            }],
            signups: BTreeMap::new(),
            status: EventStatus::Active,
            created_at: start,
            created_by: "admin".into(),
            allow_multi_signup: false,
            max_participants: None,
            repeat_every_days: 0,
            reminder_sent: false,
            reminder_minutes: 0,
            announcement_time: None,
            announcement_offset_hours: 0,
            delete_after_hours: 0,
        }
    }

    fn signup(user: &str, role: &str, status: SignupStatus, at: DateTime<Utc>) -> Signup {
        Signup {
            user_id: user.into(),
            username: user.to_uppercase(),
            role: role.into(),
            class: None,
            status,
            signed_up_at: at,
            confirmed_by: None,
        }
    }

    #[test]
    fn test_reminder_lead_resolution() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let mut event = sample(start);
        assert_eq!(event.reminder_lead_minutes(0), 15);
        assert_eq!(event.reminder_lead_minutes(30), 30);
        event.reminder_minutes = 5;
        assert_eq!(event.reminder_lead_minutes(30), 5);
        assert_eq!(event.reminder_time(30), Some(start - Duration::minutes(5)));
    }

    #[test]
    fn test_status_transitions_never_go_backward() {
        assert!(EventStatus::Active.can_transition_to(EventStatus::Completed));
        assert!(EventStatus::Active.can_transition_to(EventStatus::Cancelled));
        assert!(!EventStatus::Completed.can_transition_to(EventStatus::Active));
        assert!(!EventStatus::Cancelled.can_transition_to(EventStatus::Completed));
    }

    #[test]
    fn test_advance_occurrence_rederives_announcement() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let mut event = sample(start);
        event.repeat_every_days = 7;
        event.reminder_sent = true;
        event.announcement_offset_hours = 24;
        event.announcement_time = Some(start - Duration::hours(24));

        event.advance_occurrence().unwrap();

        assert_eq!(event.start_time, start + Duration::days(7));
        assert!(!event.reminder_sent);
        assert_eq!(
            event.announcement_time,
            Some(start + Duration::days(7) - Duration::hours(24))
        );
    }

    #[test]
    fn test_unrepresentable_schedule_is_reported_not_panicked() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let mut event = sample(start);
        assert!(event.check_schedule(15).is_ok());

        event.delete_after_hours = 3_000_000_000;
        assert_eq!(event.auto_delete_at(), None);
        assert!(matches!(event.check_schedule(15), Err(RaidcallError::Validation(_))));

        event.delete_after_hours = 0;
        event.repeat_every_days = 200_000_000;
        event.reminder_sent = true;
        assert!(event.check_schedule(15).is_err());
        assert!(event.advance_occurrence().is_err());
        assert_eq!(event.start_time, start);
        assert!(event.reminder_sent);

        let mut late = sample(DateTime::<Utc>::MAX_UTC);
        assert_eq!(late.occurrence_end(), None);
        late.reminder_minutes = 5;
        assert!(late.check_schedule(0).is_err());
    }

    #[test]
    fn test_capacity_counts_only_confirmed() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let mut event = sample(start);
        event.push_signup(signup("u1", "Tank", SignupStatus::Pending, start));
        assert!(!event.is_role_full("Tank"));
        event.push_signup(signup("u2", "Tank", SignupStatus::Confirmed, start));
        assert!(event.is_role_full("Tank"));
        // Undeclared roles are unlimited.
        assert!(!event.is_role_full("Bard"));
    }

    #[test]
    fn test_remove_signups_and_mentions() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let mut event = sample(start);
        event.push_signup(signup("u1", "Tank", SignupStatus::Confirmed, start));
        event.push_signup(signup("u1", "DPS", SignupStatus::Confirmed, start));
        event.push_signup(signup("u2", "DPS", SignupStatus::Pending, start));

        assert_eq!(event.confirmed_user_ids(), vec!["u1"]);
        assert_eq!(event.roles_held_by("u1").len(), 2);

        assert_eq!(event.remove_signups_of("u1"), 2);
        assert_eq!(event.signup_count(), 1);
        assert!(!event.signups.contains_key("Tank"));
        assert_eq!(event.remove_signups_of("nobody"), 0);
    }

    #[test]
    fn test_json_uses_lowercase_status_and_type_key() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let event = sample(start);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["type"], "raid");
        assert!(json.get("message_id").is_none());
    }
}

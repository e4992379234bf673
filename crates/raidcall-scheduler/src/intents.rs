//! Intents: the side effects a scheduling pass asks for but never performs.

use raidcall_core::Event;
use serde::Serialize;

/// Batches produced by one [`crate::ReminderEngine::tick`].
///
/// A recurring event can sit in both `remind` and `update` on the same pass:
/// firing its reminder is itself a state change that should be re-rendered.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Send a reminder now.
    pub remind: Vec<Event>,
    /// Persisted state changed; re-render the posted message.
    pub update: Vec<Event>,
    /// Delete the posted message and thread.
    pub teardown: Vec<Event>,
}

impl TickOutcome {
    pub fn is_empty(&self) -> bool {
        self.remind.is_empty() && self.update.is_empty() && self.teardown.is_empty()
    }
}

/// Wire form of a single intent, as sent to external sinks.
#[derive(Debug, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent<'a> {
    Remind {
        event: &'a Event,
        /// Confirmed participants to mention.
        mentions: Vec<&'a str>,
    },
    Rerender {
        event: &'a Event,
    },
    Teardown {
        event_id: &'a str,
        channel: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread_id: Option<&'a str>,
    },
    Publish {
        event: &'a Event,
        /// Whether the adapter should also create an external calendar entry.
        create_external_event: bool,
    },
}

impl<'a> Intent<'a> {
    pub fn remind(event: &'a Event) -> Self {
        Self::Remind {
            event,
            mentions: event.confirmed_user_ids(),
        }
    }

    pub fn teardown(event: &'a Event) -> Self {
        Self::Teardown {
            event_id: &event.id,
            channel: &event.channel,
            message_id: event.message_id.as_deref(),
            thread_id: event.thread_id.as_deref(),
        }
    }

    pub fn publish(event: &'a Event) -> Self {
        Self::Publish {
            event,
            create_external_event: event.create_external_event
                && event.external_event_id.is_none(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remind { .. } => "remind",
            Self::Rerender { .. } => "rerender",
            Self::Teardown { .. } => "teardown",
            Self::Publish { .. } => "publish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use raidcall_core::{EventStatus, Signup, SignupStatus};
    use std::collections::BTreeMap;

    fn event() -> Event {
        let at = Utc.with_ymd_and_hms(2026, 6, 1, 20, 0, 0).unwrap();
        let mut event = Event {
            id: "e1".into(),
            name: "Zul'Gurub".into(),
            kind: "raid".into(),
            description: String::new(),
            start_time: at,
            channel: "chan".into(),
            message_id: Some("m1".into()),
            thread_id: None,
            external_event_id: None,
            create_external_event: true,
            template_name: None,
            roles: vec![],
            signups: BTreeMap::new(),
            status: EventStatus::Active,
            created_at: at,
            created_by: String::new(),
            allow_multi_signup: false,
            max_participants: None,
            repeat_every_days: 0,
            reminder_sent: false,
            reminder_minutes: 0,
            announcement_time: None,
            announcement_offset_hours: 0,
            delete_after_hours: 0,
        };
        for (user, status) in [("u1", SignupStatus::Confirmed), ("u2", SignupStatus::Pending)] {
            event.push_signup(Signup {
                user_id: user.into(),
                username: user.into(),
                role: "DPS".into(),
                class: None,
                status,
                signed_up_at: at,
                confirmed_by: None,
            });
        }
        event
    }

    #[test]
    fn test_remind_payload_mentions_confirmed_only() {
        let event = event();
        let json = serde_json::to_value(Intent::remind(&event)).unwrap();
        assert_eq!(json["intent"], "remind");
        assert_eq!(json["mentions"], serde_json::json!(["u1"]));
        assert_eq!(json["event"]["type"], "raid");
    }

    #[test]
    fn test_teardown_payload() {
        let event = event();
        let json = serde_json::to_value(Intent::teardown(&event)).unwrap();
        assert_eq!(json["intent"], "teardown");
        assert_eq!(json["message_id"], "m1");
        assert!(json.get("thread_id").is_none());
    }

    #[test]
    fn test_publish_asks_for_external_entry_once() {
        let mut event = event();
        assert_eq!(
            serde_json::to_value(Intent::publish(&event)).unwrap()["create_external_event"],
            true
        );
        event.external_event_id = Some("cal-1".into());
        assert_eq!(
            serde_json::to_value(Intent::publish(&event)).unwrap()["create_external_event"],
            false
        );
    }
}

//! Intent dispatch: hands a pass's batches to the messaging side and
//! records what it reports back.
//! Supports: log-only (no chat platform attached) and HTTP webhook.

use std::sync::Arc;

use async_trait::async_trait;
use raidcall_core::{Event, PostedMessage, RaidcallError, Result};
use raidcall_store::EventStore;

use crate::intents::{Intent, TickOutcome};

/// The messaging collaborator. Implementations render and deliver; they
/// never touch the store.
#[async_trait]
pub trait IntentSink: Send + Sync {
    fn name(&self) -> &str;

    async fn remind(&self, event: &Event) -> Result<()>;

    async fn rerender(&self, event: &Event) -> Result<()>;

    async fn teardown(&self, event: &Event) -> Result<()>;

    /// Post the event for the first time and return where it landed.
    async fn publish(&self, event: &Event) -> Result<PostedMessage>;
}

/// Writes every intent to the log. Used when no chat adapter is configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl IntentSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn remind(&self, event: &Event) -> Result<()> {
        let mentions = event.confirmed_user_ids();
        tracing::info!(
            "🔔 Reminder: {} starts at {}, notifying {} ({})",
            event.name,
            event.start_time,
            mentions.len(),
            mentions.join(", ")
        );
        Ok(())
    }

    async fn rerender(&self, event: &Event) -> Result<()> {
        tracing::info!(
            "🔄 Re-render {} [{}]: {} at {}",
            event.name,
            event.id,
            event.status,
            event.start_time
        );
        Ok(())
    }

    async fn teardown(&self, event: &Event) -> Result<()> {
        tracing::info!(
            "🧹 Tear down message {} of {}",
            event.message_id.as_deref().unwrap_or("-"),
            event.id
        );
        Ok(())
    }

    async fn publish(&self, event: &Event) -> Result<PostedMessage> {
        tracing::info!("📣 Publish {} to channel {}", event.name, event.channel);
        Ok(PostedMessage {
            message_id: format!("local-{}", event.id),
            thread_id: None,
        })
    }
}

/// POSTs each intent as JSON to a single endpoint.
///
/// Publish responses must carry `{"message_id": ..., "thread_id": ...}`.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            headers,
        }
    }

    async fn post(&self, intent: &Intent<'_>) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .post(&self.url)
            .json(intent)
            .timeout(std::time::Duration::from_secs(10));

        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = req.send().await.map_err(|e| {
            RaidcallError::Dispatch(format!("Webhook {} send failed: {e}", intent.kind()))
        })?;

        if resp.status().is_success() {
            tracing::debug!("✅ Webhook {} delivered to {}", intent.kind(), self.url);
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(RaidcallError::Dispatch(format!(
                "Webhook {} error {status}: {body}",
                intent.kind()
            )))
        }
    }
}

#[async_trait]
impl IntentSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn remind(&self, event: &Event) -> Result<()> {
        self.post(&Intent::remind(event)).await.map(|_| ())
    }

    async fn rerender(&self, event: &Event) -> Result<()> {
        self.post(&Intent::Rerender { event }).await.map(|_| ())
    }

    async fn teardown(&self, event: &Event) -> Result<()> {
        self.post(&Intent::teardown(event)).await.map(|_| ())
    }

    async fn publish(&self, event: &Event) -> Result<PostedMessage> {
        let resp = self.post(&Intent::publish(event)).await?;
        resp.json::<PostedMessage>()
            .await
            .map_err(|e| RaidcallError::Dispatch(format!("Bad publish response: {e}")))
    }
}

/// Counts from one dispatch round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn record<T>(&mut self, result: &Result<T>) {
        match result {
            Ok(_) => self.delivered += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Executes intent batches against a sink and writes the consequences back.
pub struct Dispatcher {
    store: Arc<EventStore>,
    sink: Arc<dyn IntentSink>,
}

impl Dispatcher {
    pub fn new(store: Arc<EventStore>, sink: Arc<dyn IntentSink>) -> Self {
        Self { store, sink }
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Run a pass's batches. Failures are logged and left for the next pass:
    /// an undelivered reminder is re-armed, an undelivered teardown keeps its
    /// message references.
    pub async fn dispatch(&self, outcome: &TickOutcome) -> DispatchReport {
        let mut report = DispatchReport::default();

        for event in &outcome.remind {
            let result = self.sink.remind(event).await;
            if let Err(e) = &result {
                tracing::warn!("⚠️ [{}] reminder for {} failed: {e}", self.sink.name(), event.id);
                self.rearm_reminder(event);
            }
            report.record(&result);
        }

        for event in &outcome.update {
            if !event.is_posted() {
                continue;
            }
            let result = self.sink.rerender(event).await;
            if let Err(e) = &result {
                tracing::warn!("⚠️ [{}] re-render of {} failed: {e}", self.sink.name(), event.id);
            }
            report.record(&result);
        }

        for event in &outcome.teardown {
            let result = match self.sink.teardown(event).await {
                Ok(()) => self.store.clear_message(&event.id).map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                tracing::warn!("⚠️ [{}] teardown of {} failed: {e}", self.sink.name(), event.id);
            }
            report.record(&result);
        }

        report
    }

    /// Publish due announcements and attach the returned references.
    pub async fn publish(&self, events: &[Event]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            let result = match self.sink.publish(event).await {
                Ok(posted) => self.store.attach_message(&event.id, &posted).map(|_| ()),
                Err(e) => Err(e),
            };
            match &result {
                Ok(()) => tracing::info!("📣 Published {} [{}]", event.name, event.id),
                Err(e) => tracing::warn!(
                    "⚠️ [{}] publication of {} failed: {e}",
                    self.sink.name(),
                    event.id
                ),
            }
            report.record(&result);
        }
        report
    }

    fn rearm_reminder(&self, sent: &Event) {
        let result = self.store.update(&sent.id, |event| {
            if event.start_time == sent.start_time {
                event.reminder_sent = false;
            }
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!("⚠️ Could not re-arm reminder for {}: {e}", sent.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use raidcall_core::EventStatus;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Records calls; fails every call when `fail` is set.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn log(&self, what: &str, event: &Event) -> Result<()> {
            self.calls.lock().unwrap().push(format!("{what}:{}", event.id));
            if self.fail {
                Err(RaidcallError::Dispatch("offline".into()))
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IntentSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }
        async fn remind(&self, event: &Event) -> Result<()> {
            self.log("remind", event)
        }
        async fn rerender(&self, event: &Event) -> Result<()> {
            self.log("rerender", event)
        }
        async fn teardown(&self, event: &Event) -> Result<()> {
            self.log("teardown", event)
        }
        async fn publish(&self, event: &Event) -> Result<PostedMessage> {
            self.log("publish", event)?;
            Ok(PostedMessage {
                message_id: format!("msg-{}", event.id),
                thread_id: Some("thr".into()),
            })
        }
    }

    fn event(id: &str, posted: bool) -> Event {
        let at = Utc.with_ymd_and_hms(2026, 8, 1, 19, 0, 0).unwrap();
        Event {
            id: id.into(),
            name: id.into(),
            kind: "raid".into(),
            description: String::new(),
            start_time: at,
            channel: "chan".into(),
            message_id: posted.then(|| "m1".to_string()),
            thread_id: posted.then(|| "t1".to_string()),
            external_event_id: None,
            create_external_event: false,
            template_name: None,
            roles: vec![],
            signups: BTreeMap::new(),
            status: EventStatus::Active,
            created_at: at,
            created_by: String::new(),
            allow_multi_signup: false,
            max_participants: None,
            repeat_every_days: 0,
            reminder_sent: true,
            reminder_minutes: 0,
            announcement_time: None,
            announcement_offset_hours: 0,
            delete_after_hours: 0,
        }
    }

    fn store_with(events: &[Event]) -> (tempfile::TempDir, Arc<EventStore>) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(EventStore::open(dir.path()).unwrap());
        for e in events {
            store.save(e.clone()).unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn test_teardown_clears_references() {
        let posted = event("a", true);
        let (_dir, store) = store_with(&[posted.clone()]);
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(store.clone(), sink.clone());

        let report = dispatcher
            .dispatch(&TickOutcome {
                teardown: vec![posted],
                ..TickOutcome::default()
            })
            .await;
        assert_eq!(report, DispatchReport { delivered: 1, failed: 0 });
        let stored = store.get("a").unwrap();
        assert!(stored.message_id.is_none());
        assert!(stored.thread_id.is_none());
        assert_eq!(sink.calls(), ["teardown:a"]);
    }

    #[tokio::test]
    async fn test_failures_leave_state_for_next_tick() {
        let posted = event("a", true);
        let (_dir, store) = store_with(&[posted.clone()]);
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(RecordingSink::failing()));

        let report = dispatcher
            .dispatch(&TickOutcome {
                remind: vec![posted.clone()],
                teardown: vec![posted],
                ..TickOutcome::default()
            })
            .await;
        assert_eq!(report.failed, 2);
        let stored = store.get("a").unwrap();
        assert_eq!(stored.message_id.as_deref(), Some("m1"));
        assert!(!stored.reminder_sent);
    }

    #[tokio::test]
    async fn test_rerender_skips_unposted() {
        let (_dir, store) = store_with(&[event("a", true), event("b", false)]);
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(store, sink.clone());
        dispatcher
            .dispatch(&TickOutcome {
                update: vec![event("a", true), event("b", false)],
                ..TickOutcome::default()
            })
            .await;
        assert_eq!(sink.calls(), ["rerender:a"]);
    }

    #[tokio::test]
    async fn test_publish_attaches_references() {
        let fresh = event("a", false);
        let (_dir, store) = store_with(&[fresh.clone()]);
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(RecordingSink::default()));

        let report = dispatcher.publish(&[fresh]).await;
        assert_eq!(report.delivered, 1);
        let stored = store.get("a").unwrap();
        assert_eq!(stored.message_id.as_deref(), Some("msg-a"));
        assert_eq!(stored.thread_id.as_deref(), Some("thr"));
    }

    #[tokio::test]
    async fn test_log_sink_fabricates_local_ids() {
        let posted = LogSink.publish(&event("a", false)).await.unwrap();
        assert_eq!(posted.message_id, "local-a");
        assert!(LogSink.remind(&event("a", false)).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_dispatch_error() {
        let sink = WebhookSink::new("http://127.0.0.1:9/intents", vec![]);
        let err = sink.remind(&event("a", false)).await.unwrap_err();
        assert!(matches!(err, RaidcallError::Dispatch(_)));
    }
}

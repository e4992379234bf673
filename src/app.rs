//! Service wiring: everything the CLI needs, built once from config.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use raidcall_core::{Clock, Event, RaidcallConfig, SystemClock};
use raidcall_scheduler::{Dispatcher, IntentSink, LogSink, ReminderEngine, WebhookSink};
use raidcall_services::{EventService, SignupService};
use raidcall_store::{EventStore, TemplateCatalog};

/// Wall-clock input format, interpreted in the configured timezone.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub struct App {
    pub config: RaidcallConfig,
    pub tz: Tz,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<EventStore>,
    pub catalog: Arc<TemplateCatalog>,
    pub events: EventService,
    pub signups: SignupService,
    pub engine: Arc<ReminderEngine>,
    pub sink: Arc<dyn IntentSink>,
    pub dispatcher: Arc<Dispatcher>,
}

impl App {
    pub fn build(config: RaidcallConfig) -> Result<Self> {
        let tz = config.tz()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = Arc::new(
            EventStore::open(&config.events_dir()).context("Failed to open event store")?,
        );
        let catalog = Arc::new(
            TemplateCatalog::open_with_defaults(&config.templates_dir(), clock.now())
                .context("Failed to open template catalog")?,
        );

        let events = EventService::new(
            store.clone(),
            catalog.clone(),
            config.default_role_slots(),
            clock.clone(),
        )
        .with_external_events(config.enable_external_events);
        let signups = SignupService::new(store.clone(), clock.clone());
        let engine = Arc::new(ReminderEngine::new(store.clone(), config.reminder_minutes));

        let sink: Arc<dyn IntentSink> = match &config.dispatch.webhook_url {
            Some(url) => Arc::new(WebhookSink::new(url.clone(), config.dispatch.headers.clone())),
            None => Arc::new(LogSink),
        };
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), sink.clone()));

        Ok(Self {
            config,
            tz,
            clock,
            store,
            catalog,
            events,
            signups,
            engine,
            sink,
            dispatcher,
        })
    }

    /// Parse `YYYY-MM-DD HH:MM` in the configured zone, or any RFC 3339 instant.
    pub fn parse_time(&self, input: &str) -> Result<DateTime<Utc>> {
        parse_time_in(self.tz, input)
    }

    /// Render an instant in the configured zone.
    pub fn local(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format(LOCAL_TIME_FORMAT).to_string()
    }

    /// Ask the messaging side to re-render an event that is already posted.
    pub async fn rerender(&self, event: &Event) {
        if event.is_posted()
            && let Err(e) = self.sink.rerender(event).await
        {
            tracing::warn!("⚠️ Re-render of {} failed: {e}", event.id);
        }
    }
}

pub fn parse_time_in(tz: Tz, input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(input, LOCAL_TIME_FORMAT)
        .with_context(|| format!("Invalid time '{input}' (expected YYYY-MM-DD HH:MM)"))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .with_context(|| format!("'{input}' does not exist in {tz}"))
}

//! # Raidcall Scheduler
//!
//! A once-a-minute pass over every event that advances recurring schedules,
//! fires reminders, completes finished events and retires stale messages.
//!
//! - `engine`: pure time logic plus the persisted state transitions
//! - `intents`: what a pass asks the messaging side to do
//! - `dispatch`: sinks that carry intents out (log, webhook)
//! - `runner`: the tokio interval loop

pub mod dispatch;
pub mod engine;
pub mod intents;
pub mod runner;

pub use dispatch::{DispatchReport, Dispatcher, IntentSink, LogSink, WebhookSink};
pub use engine::ReminderEngine;
pub use intents::{Intent, TickOutcome};
pub use runner::{run_once, spawn_scheduler};

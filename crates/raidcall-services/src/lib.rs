//! # Raidcall Services
//!
//! The two request-facing services adapters call into: event creation and
//! administration, and the signup rule engine. Both mutate events only
//! through [`raidcall_store::EventStore::update`].

pub mod creation;
pub mod signups;

pub use creation::{CreateEventInput, EventService};
pub use signups::{SignupPolicy, SignupRequest, SignupService};

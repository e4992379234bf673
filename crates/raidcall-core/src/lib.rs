//! # Raidcall Core
//!
//! Shared data model for the event scheduler: events, role slots, signups,
//! templates, the error taxonomy, configuration, and the clock seam.
//!
//! ## Architecture
//! ```text
//! raidcall-core       model + errors + config + clock
//!   ├── raidcall-store      EventStore, TemplateCatalog (file-backed)
//!   ├── raidcall-services   EventService, SignupService
//!   └── raidcall-scheduler  ReminderEngine → intent batches → IntentSink
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod template;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DispatchConfig, RaidcallConfig, RoleConfig};
pub use error::{RaidcallError, Result, SignupRejection};
pub use event::{
    ClassInfo, Event, EventStatus, OCCURRENCE_LENGTH_HOURS, PostedMessage, RoleSlot, Signup,
    SignupStatus,
};
pub use template::{EventTemplate, TemplateRole, sanitize_filename};

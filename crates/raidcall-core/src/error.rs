//! Error taxonomy shared by every Raidcall crate.

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, RaidcallError>;

/// All failures surfaced by the core.
#[derive(Debug, Error)]
pub enum RaidcallError {
    /// Malformed input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A signup rule said no. User-facing, not a system fault.
    #[error("{0}")]
    Rejected(SignupRejection),

    /// Durable read/write failure. The only class eligible for retry on the next tick.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Config error: {0}")]
    Config(String),

    /// The messaging collaborator could not execute an intent.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RaidcallError {
    pub fn event_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "event",
            id: id.to_string(),
        }
    }

    pub fn template_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "template",
            id: name.to_string(),
        }
    }

    /// True for rule violations that should be shown to the user rather than logged.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Io(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<SignupRejection> for RaidcallError {
    fn from(rejection: SignupRejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Why a signup-related request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignupRejection {
    #[error("already signed up for this role ({role})")]
    AlreadySignedUp { role: String },

    #[error("already signed up as {role}; cancel that signup first")]
    OtherRoleHeld { role: String },

    #[error("role full: {role}")]
    RoleFull { role: String },

    #[error("not signed up for this event")]
    NotSignedUp,

    #[error("event is no longer accepting signups")]
    EventClosed,
}

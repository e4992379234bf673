//! Signup rule engine.
//!
//! Every rule is checked inside the store's write lock against the current
//! record, so two concurrent signups for the last slot cannot both pass.

use std::sync::Arc;

use raidcall_core::{
    Clock, Event, RaidcallError, Result, Signup, SignupRejection, SignupStatus,
};
use raidcall_store::EventStore;

/// Initial status given to new signups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupPolicy {
    /// New signups wait for an admin (`pending`).
    RequireConfirmation,
    /// New signups count immediately (`confirmed`).
    AutoConfirm,
}

impl SignupPolicy {
    fn initial_status(self) -> SignupStatus {
        match self {
            Self::RequireConfirmation => SignupStatus::Pending,
            Self::AutoConfirm => SignupStatus::Confirmed,
        }
    }
}

/// One user's request to join a role.
#[derive(Debug, Clone, Default)]
pub struct SignupRequest {
    pub event_id: String,
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub class: Option<String>,
}

pub struct SignupService {
    store: Arc<EventStore>,
    clock: Arc<dyn Clock>,
}

impl SignupService {
    pub fn new(store: Arc<EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Add a signup if every rule allows it. Returns the updated event.
    pub fn signup(&self, request: SignupRequest, policy: SignupPolicy) -> Result<Event> {
        if request.user_id.trim().is_empty() || request.role.trim().is_empty() {
            return Err(RaidcallError::Validation(
                "signup needs a user and a role".into(),
            ));
        }
        let now = self.clock.now();

        let (event, ()) = self.store.update(&request.event_id, |event| {
            check_can_join(event, &request.user_id, &request.role)?;
            event.push_signup(Signup {
                user_id: request.user_id.clone(),
                username: request.username.clone(),
                role: request.role.clone(),
                class: request.class.clone().filter(|c| !c.is_empty()),
                status: policy.initial_status(),
                signed_up_at: now,
                confirmed_by: None,
            });
            Ok(())
        })?;

        tracing::info!(
            "✍️ {} signed up as {} for {} [{}]",
            request.username,
            request.role,
            event.name,
            event.id
        );
        Ok(event)
    }

    /// Remove the user from every role they hold on the event.
    pub fn cancel(&self, event_id: &str, user_id: &str) -> Result<Event> {
        let (event, removed) = self.store.update(event_id, |event| {
            match event.remove_signups_of(user_id) {
                0 => Err(SignupRejection::NotSignedUp.into()),
                n => Ok(n),
            }
        })?;
        tracing::info!("👋 {user_id} withdrew from {} ({removed} signups)", event.id);
        Ok(event)
    }

    /// Confirm a signup. A full role cannot be confirmed past its limit.
    pub fn confirm(
        &self,
        event_id: &str,
        user_id: &str,
        role: &str,
        confirmed_by: &str,
    ) -> Result<Event> {
        let event = self.store.confirm_signup(event_id, user_id, role, confirmed_by)?;
        tracing::info!("✅ {confirmed_by} confirmed {user_id} as {role} on {}", event.id);
        Ok(event)
    }

    /// Mark a signup declined. It stays on the event but no longer counts.
    pub fn decline(&self, event_id: &str, user_id: &str, role: &str) -> Result<Event> {
        let event = self.store.decline_signup(event_id, user_id, role)?;
        tracing::info!("❌ Declined {user_id} as {role} on {}", event.id);
        Ok(event)
    }
}

fn check_can_join(event: &Event, user_id: &str, role: &str) -> Result<()> {
    if !event.is_active() {
        return Err(SignupRejection::EventClosed.into());
    }
    if event.signup_of(user_id, role).is_some() {
        return Err(SignupRejection::AlreadySignedUp { role: role.to_string() }.into());
    }
    if !event.allow_multi_signup
        && let Some(other) = event.roles_held_by(user_id).first()
    {
        return Err(SignupRejection::OtherRoleHeld { role: other.to_string() }.into());
    }
    if event.is_role_full(role) {
        return Err(SignupRejection::RoleFull { role: role.to_string() }.into());
    }
    Ok(())
}

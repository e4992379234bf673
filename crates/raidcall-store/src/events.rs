//! File-based event store: one JSON record per event, named by its id.
//! The in-memory index is the read path; every write re-serializes the whole
//! record before the index is touched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use raidcall_core::{Event, PostedMessage, RaidcallError, Result, SignupRejection, SignupStatus};

use crate::fsio;

/// Concurrency-safe, persistent collection of events.
pub struct EventStore {
    dir: PathBuf,
    events: RwLock<HashMap<String, Event>>,
}

impl EventStore {
    /// Open the store at `dir`, creating it if needed and loading every record.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            RaidcallError::Persistence(format!("Create {}: {e}", dir.display()))
        })?;
        let store = Self {
            dir: dir.to_path_buf(),
            events: RwLock::new(HashMap::new()),
        };
        let loaded = store.load()?;
        tracing::info!("📦 Loaded {loaded} events from {}", dir.display());
        Ok(store)
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Upsert by id and persist. On failure the index keeps its previous value.
    pub fn save(&self, event: Event) -> Result<Event> {
        let mut events = self.write();
        self.persist(&event)?;
        events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    pub fn get(&self, id: &str) -> Result<Event> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| RaidcallError::event_not_found(id))
    }

    /// Snapshot of every event, ordered by start time.
    pub fn list_all(&self) -> Vec<Event> {
        self.snapshot(|_| true)
    }

    /// Snapshot of active events, ordered by start time.
    pub fn list_active(&self) -> Vec<Event> {
        self.snapshot(Event::is_active)
    }

    /// Remove from memory and disk. Absent records are fine.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut events = self.write();
        // An id that cannot name a record was never stored.
        let Ok(path) = self.record_path(id) else {
            return Ok(());
        };
        fsio::remove_if_exists(&path)?;
        if events.remove(id).is_some() {
            tracing::info!("🗑️ Event deleted: {id}");
        }
        Ok(())
    }

    /// Read-modify-write under the write lock.
    ///
    /// `f` runs against a copy; the copy is persisted and only then replaces
    /// the indexed value. If `f` or the write fails, nothing changes.
    pub fn update<T, F>(&self, id: &str, f: F) -> Result<(Event, T)>
    where
        F: FnOnce(&mut Event) -> Result<T>,
    {
        let mut events = self.write();
        let current = events
            .get(id)
            .ok_or_else(|| RaidcallError::event_not_found(id))?;
        let mut next = current.clone();
        let out = f(&mut next)?;
        if next.id != id {
            return Err(RaidcallError::Validation(format!(
                "event id is immutable ({id} → {})",
                next.id
            )));
        }
        self.persist(&next)?;
        events.insert(id.to_string(), next.clone());
        Ok((next, out))
    }

    /// Mark a user's signup in `role` confirmed by `confirmed_by`.
    ///
    /// Already-confirmed signups are left as they are. Anything else is
    /// refused while the role is at its limit.
    pub fn confirm_signup(
        &self,
        id: &str,
        user_id: &str,
        role: &str,
        confirmed_by: &str,
    ) -> Result<Event> {
        let (event, ()) = self.update(id, |event| {
            let current = event
                .signup_of(user_id, role)
                .map(|s| s.status)
                .ok_or_else(|| signup_not_found(user_id, role))?;
            if current == SignupStatus::Confirmed {
                return Ok(());
            }
            if event.is_role_full(role) {
                return Err(SignupRejection::RoleFull { role: role.to_string() }.into());
            }
            if let Some(signup) = event.signup_of_mut(user_id, role) {
                signup.status = SignupStatus::Confirmed;
                signup.confirmed_by = Some(confirmed_by.to_string());
            }
            Ok(())
        })?;
        Ok(event)
    }

    pub fn decline_signup(&self, id: &str, user_id: &str, role: &str) -> Result<Event> {
        let (event, ()) = self.update(id, |event| {
            let signup = event
                .signup_of_mut(user_id, role)
                .ok_or_else(|| signup_not_found(user_id, role))?;
            signup.status = SignupStatus::Declined;
            signup.confirmed_by = None;
            Ok(())
        })?;
        Ok(event)
    }

    /// Record where the event was published.
    pub fn attach_message(&self, id: &str, posted: &PostedMessage) -> Result<Event> {
        let (event, ()) = self.update(id, |event| {
            event.message_id = Some(posted.message_id.clone());
            event.thread_id = posted.thread_id.clone();
            Ok(())
        })?;
        Ok(event)
    }

    /// Forget the posted message and thread, so the event can be published again.
    pub fn clear_message(&self, id: &str) -> Result<Event> {
        let (event, ()) = self.update(id, |event| {
            event.message_id = None;
            event.thread_id = None;
            Ok(())
        })?;
        Ok(event)
    }

    pub fn set_external_ref(&self, id: &str, external_id: &str) -> Result<Event> {
        let (event, ()) = self.update(id, |event| {
            event.external_event_id = Some(external_id.to_string());
            Ok(())
        })?;
        Ok(event)
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    fn snapshot(&self, keep: impl Fn(&Event) -> bool) -> Vec<Event> {
        let mut events: Vec<Event> = self.read().values().filter(|e| keep(*e)).cloned().collect();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        events
    }

    fn persist(&self, event: &Event) -> Result<()> {
        let path = self.record_path(&event.id)?;
        let json = serde_json::to_string_pretty(event)
            .map_err(|e| RaidcallError::Persistence(format!("Serialize event: {e}")))?;
        fsio::write_atomic(&path, json.as_bytes())?;
        tracing::debug!("💾 Saved event {} to {}", event.id, path.display());
        Ok(())
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(RaidcallError::Validation(format!(
                "event id '{id}' is not a safe record name"
            )));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Load every `*.json` record. Unreadable or malformed files are skipped.
    fn load(&self) -> Result<usize> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            RaidcallError::Persistence(format!("Read {}: {e}", self.dir.display()))
        })?;

        let mut events = self.write();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let json = match std::fs::read_to_string(&path) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("⚠️ Failed to read {}: {e}", path.display());
                    continue;
                }
            };
            match serde_json::from_str::<Event>(&json) {
                Ok(event) => {
                    events.insert(event.id.clone(), event);
                }
                Err(e) => tracing::warn!("⚠️ Failed to parse {}: {e}", path.display()),
            }
        }
        Ok(events.len())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Event>> {
        self.events.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Event>> {
        self.events.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn signup_not_found(user_id: &str, role: &str) -> RaidcallError {
    RaidcallError::NotFound {
        kind: "signup",
        id: format!("{user_id}@{role}"),
    }
}

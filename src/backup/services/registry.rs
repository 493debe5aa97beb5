//! Owned index of definitions ordered by their next fire instant.

use crate::backup::domain::{BackupDefinition, BackupDefinitionId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

const NEVER_FIRES: &str = "cron expression never matches a calendar date";

/// Scheduling state of one definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Known but not firing: deactivated, or its schedule never fires.
    Inactive,
    /// Waiting for the given instant.
    Scheduled(DateTime<Utc>),
}

/// A definition whose fire instant has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueFire {
    /// Snapshot of the definition at dispatch time.
    pub definition: BackupDefinition,
    /// Fire instant being served.
    pub fire_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Entry {
    definition: BackupDefinition,
    next_fire: Option<DateTime<Utc>>,
    fault: Option<String>,
}

impl Entry {
    const fn state(&self) -> ScheduleState {
        match self.next_fire {
            Some(at) => ScheduleState::Scheduled(at),
            None => ScheduleState::Inactive,
        }
    }
}

/// Definitions keyed by id plus a min-ordered queue of fire instants.
///
/// The queue holds exactly one `(instant, id)` pair per scheduled entry.
/// Stored definitions that failed to load are kept apart as faulted ids.
#[derive(Debug, Default)]
pub struct ScheduleRegistry {
    entries: HashMap<BackupDefinitionId, Entry>,
    queue: BTreeSet<(DateTime<Utc>, BackupDefinitionId)>,
    faulted: HashMap<BackupDefinitionId, String>,
}

impl ScheduleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a definition, computing its next fire from `now`.
    pub fn upsert(&mut self, definition: BackupDefinition, now: DateTime<Utc>) -> ScheduleState {
        let id = definition.id();
        self.unqueue(id);
        self.faulted.remove(&id);
        let mut entry = Entry {
            definition,
            next_fire: None,
            fault: None,
        };
        if entry.definition.is_active() {
            self.schedule_from(&mut entry, now);
        }
        let state = entry.state();
        self.entries.insert(id, entry);
        state
    }

    /// Forgets a definition and cancels its pending fire.
    pub fn remove(&mut self, id: BackupDefinitionId) -> bool {
        self.unqueue(id);
        let faulted = self.faulted.remove(&id).is_some();
        self.entries.remove(&id).is_some() || faulted
    }

    /// Registers a stored definition that could not be loaded.
    ///
    /// The id stays `Inactive` with `reason` as its fault until the
    /// definition is saved again or removed.
    pub fn mark_faulted(&mut self, id: BackupDefinitionId, reason: &str) {
        self.unqueue(id);
        self.entries.remove(&id);
        warn!(definition_id = %id, reason, "definition could not be loaded; marking inactive");
        self.faulted.insert(id, reason.to_owned());
    }

    /// Pops every definition due at or before `now`, earliest first, and
    /// reschedules each from the instant it fired.
    ///
    /// When the recomputed instant is still not after `now` the missed
    /// instants are skipped and the next fire is computed from `now`.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<DueFire> {
        let mut due = Vec::new();
        while let Some(&(fire_at, id)) = self.queue.first() {
            if fire_at > now {
                break;
            }
            self.queue.pop_first();
            let Some(mut entry) = self.entries.remove(&id) else {
                continue;
            };
            due.push(DueFire {
                definition: entry.definition.clone(),
                fire_at,
            });

            let following = entry.definition.schedule().next_fire_after(fire_at);
            match following {
                Some(next) if next <= now => {
                    info!(
                        definition_id = %id,
                        fire_at = %fire_at,
                        "skipping missed fire instants"
                    );
                    self.schedule_from(&mut entry, now);
                }
                Some(next) => self.enqueue(&mut entry, next),
                None => self.deactivate(&mut entry),
            }
            self.entries.insert(id, entry);
        }
        due
    }

    /// Returns the earliest pending fire instant.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.queue.first().map(|&(at, _)| at)
    }

    /// Returns the state of a known definition.
    #[must_use]
    pub fn state_of(&self, id: BackupDefinitionId) -> Option<ScheduleState> {
        if self.faulted.contains_key(&id) {
            return Some(ScheduleState::Inactive);
        }
        self.entries.get(&id).map(Entry::state)
    }

    /// Returns why a definition was taken out of the schedule, if it was.
    #[must_use]
    pub fn fault_of(&self, id: BackupDefinitionId) -> Option<&str> {
        if let Some(reason) = self.faulted.get(&id) {
            return Some(reason);
        }
        self.entries.get(&id).and_then(|entry| entry.fault.as_deref())
    }

    /// Returns the registered definition.
    #[must_use]
    pub fn definition(&self, id: BackupDefinitionId) -> Option<&BackupDefinition> {
        self.entries.get(&id).map(|entry| &entry.definition)
    }

    /// Returns how many definitions are registered, faulted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() + self.faulted.len()
    }

    /// Returns whether no definitions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.faulted.is_empty()
    }

    fn schedule_from(&mut self, entry: &mut Entry, now: DateTime<Utc>) {
        match entry.definition.schedule().next_fire_after(now) {
            Some(next) => self.enqueue(entry, next),
            None => self.deactivate(entry),
        }
    }

    fn enqueue(&mut self, entry: &mut Entry, at: DateTime<Utc>) {
        entry.next_fire = Some(at);
        self.queue.insert((at, entry.definition.id()));
    }

    fn deactivate(&mut self, entry: &mut Entry) {
        warn!(
            definition_id = %entry.definition.id(),
            cron = %entry.definition.schedule().cron(),
            "{NEVER_FIRES}; marking inactive"
        );
        entry.next_fire = None;
        entry.fault = Some(NEVER_FIRES.to_owned());
        self.unqueue(entry.definition.id());
    }

    fn unqueue(&mut self, id: BackupDefinitionId) {
        if let Some(at) = self.entries.get(&id).and_then(|entry| entry.next_fire) {
            self.queue.remove(&(at, id));
        }
    }
}

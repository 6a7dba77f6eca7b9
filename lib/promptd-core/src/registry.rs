use crate::platform::{Bounds, SurfaceHandle};
use crate::request::SurfaceKind;
use crate::surface_key::{SurfaceId, SurfaceKey, SurfaceTicket};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// Reserved, creation in flight. Counts as live.
    Pending,
    Shown,
    /// Teardown started. The handle stays here until the entry is removed, so a
    /// teardown interrupted by shutdown is still finished by [`SurfaceRegistry::drain`].
    Dismissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceMeta {
    pub name: String,
    pub kind: SurfaceKind,
    pub bounds: Bounds,
    pub follows_display: bool,
}

#[derive(Debug)]
struct SurfaceEntry {
    id: SurfaceId,
    key: SurfaceKey,
    handle: Option<SurfaceHandle>,
    created_at: Instant,
    state: SurfaceState,
    meta: SurfaceMeta,
}

impl SurfaceEntry {
    fn ticket(&self) -> SurfaceTicket {
        SurfaceTicket::new(self.key.clone(), self.id)
    }

    fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            ticket: self.ticket(),
            state: self.state,
            created_at: self.created_at,
            meta: self.meta.clone(),
        }
    }
}

/// Copy of an entry's bookkeeping. The handle stays inside the registry.
#[derive(Debug, Clone)]
pub struct SurfaceSnapshot {
    pub ticket: SurfaceTicket,
    pub state: SurfaceState,
    pub created_at: Instant,
    pub meta: SurfaceMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub removed: bool,
    /// Registry size right after this removal, observed under the same lock.
    pub remaining: usize,
}

/// Result of [`SurfaceRegistry::begin_dismissal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dismissal {
    /// The caller owns the teardown. Pending entries have no handle yet.
    Started(Option<SurfaceHandle>),
    /// Another dismissal of the same generation got there first.
    InProgress,
    /// The ticket's generation is no longer live.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Registry is sealed, the host is terminating")]
    Sealed,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<SurfaceKey, SurfaceEntry>,
    next_id: SurfaceId,
    sealed: bool,
}

/// Live surfaces, at most one per [`SurfaceKey`].
///
/// Every operation is a single critical section on one mutex, and none of them call
/// out while holding it. Inserts and the termination zero-check therefore serialize
/// against each other.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    state: Mutex<RegistryState>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Critical sections never leave the map half-updated, so a poisoned lock is safe to reuse.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves `key` in the `Pending` state. If the key is already live, returns the
    /// existing entry with `false` and never calls `make_meta`.
    pub fn try_insert<F>(
        &self,
        key: SurfaceKey,
        make_meta: F,
    ) -> Result<(SurfaceSnapshot, bool), RegistryError>
    where
        F: FnOnce() -> SurfaceMeta,
    {
        let mut guard = self.lock();
        let state = &mut *guard;

        match state.entries.entry(key) {
            Entry::Occupied(existing) => Ok((existing.get().snapshot(), false)),
            Entry::Vacant(vacant) => {
                if state.sealed {
                    return Err(RegistryError::Sealed);
                }

                state.next_id += 1;
                let entry = SurfaceEntry {
                    id: state.next_id,
                    key: vacant.key().clone(),
                    handle: None,
                    created_at: Instant::now(),
                    state: SurfaceState::Pending,
                    meta: make_meta(),
                };
                let snapshot = entry.snapshot();
                vacant.insert(entry);
                Ok((snapshot, true))
            }
        }
    }

    /// Drops whatever entry `key` holds. Unknown keys are a no-op.
    pub fn remove(&self, key: &SurfaceKey) -> Removal {
        let mut state = self.lock();
        let removed = state.entries.remove(key).is_some();
        Removal {
            removed,
            remaining: state.entries.len(),
        }
    }

    /// Like [`remove`](Self::remove), but only if the entry is still the generation
    /// named by `ticket`.
    pub fn remove_surface(&self, ticket: &SurfaceTicket) -> Removal {
        let mut state = self.lock();
        let current = state
            .entries
            .get(&ticket.key)
            .is_some_and(|entry| entry.id == ticket.id);
        let removed = current && state.entries.remove(&ticket.key).is_some();
        Removal {
            removed,
            remaining: state.entries.len(),
        }
    }

    /// Removes a generation that never got past `Pending`. A dismissal that already
    /// started keeps ownership of the entry.
    pub fn remove_pending(&self, ticket: &SurfaceTicket) -> Removal {
        let mut state = self.lock();
        let pending = state.entries.get(&ticket.key).is_some_and(|entry| {
            entry.id == ticket.id && entry.state == SurfaceState::Pending
        });
        let removed = pending && state.entries.remove(&ticket.key).is_some();
        Removal {
            removed,
            remaining: state.entries.len(),
        }
    }

    /// Best-effort count. Decisions use the `remaining` of a [`Removal`] instead.
    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn get(&self, key: &SurfaceKey) -> Option<SurfaceSnapshot> {
        self.lock().entries.get(key).map(SurfaceEntry::snapshot)
    }

    pub fn ticket_for(&self, key: &SurfaceKey) -> Option<SurfaceTicket> {
        self.lock().entries.get(key).map(SurfaceEntry::ticket)
    }

    /// `Pending -> Shown`, taking ownership of the created handle. Returns `false` and
    /// leaves the registry untouched if the entry is gone, replaced or past `Pending`.
    pub fn mark_shown(&self, ticket: &SurfaceTicket, handle: SurfaceHandle) -> bool {
        let mut state = self.lock();
        match state.entries.get_mut(&ticket.key) {
            Some(entry) if entry.id == ticket.id && entry.state == SurfaceState::Pending => {
                entry.state = SurfaceState::Shown;
                entry.handle = Some(handle);
                true
            }
            _ => false,
        }
    }

    /// Moves the entry to `Dismissing` and hands out a copy of its handle for
    /// destruction. Only the first call for a generation is told to proceed.
    pub fn begin_dismissal(&self, ticket: &SurfaceTicket) -> Dismissal {
        let mut state = self.lock();
        match state.entries.get_mut(&ticket.key) {
            Some(entry) if entry.id == ticket.id => {
                if entry.state == SurfaceState::Dismissing {
                    return Dismissal::InProgress;
                }
                entry.state = SurfaceState::Dismissing;
                Dismissal::Started(entry.handle.clone())
            }
            _ => Dismissal::Stale,
        }
    }

    /// Records new bounds for the generation named by `ticket`.
    pub fn set_bounds(&self, ticket: &SurfaceTicket, bounds: Bounds) -> bool {
        let mut state = self.lock();
        match state.entries.get_mut(&ticket.key) {
            Some(entry) if entry.id == ticket.id => {
                entry.meta.bounds = bounds;
                true
            }
            _ => false,
        }
    }

    /// Shown surfaces that should track the display bounds.
    pub fn display_followers(&self) -> Vec<(SurfaceTicket, SurfaceHandle)> {
        self.lock()
            .entries
            .values()
            .filter(|entry| entry.state == SurfaceState::Shown && entry.meta.follows_display)
            .filter_map(|entry| entry.handle.clone().map(|handle| (entry.ticket(), handle)))
            .collect()
    }

    /// Commits to termination if nothing is live. Succeeds at most once; afterwards
    /// every insert fails with [`RegistryError::Sealed`].
    pub fn seal_if_empty(&self) -> bool {
        let mut state = self.lock();
        if state.sealed || !state.entries.is_empty() {
            return false;
        }
        state.sealed = true;
        true
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Seals the registry and empties it, returning the handles that were never destroyed.
    pub fn drain(&self) -> Vec<SurfaceHandle> {
        let mut state = self.lock();
        state.sealed = true;
        state
            .entries
            .drain()
            .filter_map(|(_, entry)| entry.handle)
            .collect()
    }
}

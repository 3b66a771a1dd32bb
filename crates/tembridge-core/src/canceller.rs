// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cancellation registry for outstanding SDK commands.

use tracing::warn;

use crate::error::BridgeError;

/// Thunk that asks the SDK to cancel one outstanding primitive. May fire the
/// primitive's result handler synchronously before returning.
pub type CancelThunk = Box<dyn FnOnce() -> Result<(), BridgeError>>;

/// Maps outstanding message ids to their cancel thunks, in insertion order.
#[derive(Default)]
pub struct Canceller {
    entries: Vec<(u64, CancelThunk)>,
}

impl Canceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the cancel thunk for message `id`.
    pub fn register(&mut self, id: u64, thunk: CancelThunk) {
        self.entries.push((id, thunk));
    }

    /// Drop the thunk for `id`, if present. Called once the command resolved.
    pub fn discard(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    /// Remove and return the thunks for the given ids, in insertion order.
    ///
    /// The caller invokes them after releasing its borrow of the canceller:
    /// a thunk may re-enter the coordinator (the SDK fires result handlers
    /// synchronously from cancel requests) and those handlers call
    /// [`discard`](Self::discard).
    pub fn take(&mut self, ids: &[u64]) -> Vec<(u64, CancelThunk)> {
        let mut taken = Vec::new();
        let mut kept = Vec::new();
        for (id, thunk) in self.entries.drain(..) {
            if ids.contains(&id) {
                taken.push((id, thunk));
            } else {
                kept.push((id, thunk));
            }
        }
        self.entries = kept;
        taken
    }

    /// Invoke the thunks for the given ids in insertion order.
    ///
    /// Every matching thunk runs even when an earlier one fails; the errors
    /// are aggregated into one. Unknown ids are skipped.
    pub fn cancel(&mut self, ids: &[u64]) -> Result<(), BridgeError> {
        let mut errors = Vec::new();
        for (id, thunk) in self.take(ids) {
            if let Err(err) = thunk() {
                warn!(id, %err, "cancel thunk failed");
                errors.push(format!("id {id}: {err}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Cancel(errors.join("; ")))
        }
    }
}

impl std::fmt::Debug for Canceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<u64> = self.entries.iter().map(|(id, _)| *id).collect();
        f.debug_struct("Canceller").field("ids", &ids).finish()
    }
}

//! Document model: shape records and the ordered in-memory list.
//!
//! This module defines what is on the canvas (`ShapeRecord`) and the store
//! that owns the live list (`DocStore`). List order is draw order: records
//! appended later are drawn over earlier ones, and there is no separate
//! z-index.
//!
//! A record is either confirmed (positive id assigned by storage) or a
//! placeholder (negative id synthesized locally) carrying the correlation
//! token of its outstanding creation. The token table maps token to record
//! id, never to a list position, so deletes and inserts elsewhere in the list
//! cannot make a confirmation land on the wrong record.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{HashMap, VecDeque};

use wire::ShapePayload;

use crate::consts::MAX_RETIRED_TOKENS;

/// Record identity. Positive = persisted, negative = local placeholder.
pub type ShapeId = i64;

/// One shape in the local view.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    /// Persistence id, or a negative placeholder until confirmed.
    pub id: ShapeId,
    /// Geometry.
    pub shape: ShapePayload,
    /// Correlation token of the outstanding creation, if unconfirmed.
    pub pending: Option<String>,
    /// Set when a placeholder was moved before its creation was confirmed.
    pub edited_while_pending: bool,
}

impl ShapeRecord {
    /// A record that already has a storage identity.
    #[must_use]
    pub fn confirmed(id: ShapeId, shape: ShapePayload) -> Self {
        Self { id, shape, pending: None, edited_while_pending: false }
    }

    /// A local record awaiting confirmation of `token`.
    #[must_use]
    pub fn placeholder(id: ShapeId, shape: ShapePayload, token: impl Into<String>) -> Self {
        Self { id, shape, pending: Some(token.into()), edited_while_pending: false }
    }

    /// Whether this record only exists locally.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.id < 0
    }
}

/// Result of matching a confirmation against the token table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The placeholder now carries the assigned id. `edited` reports whether
    /// it was moved while pending and so still differs from storage.
    Confirmed { placeholder: ShapeId, id: ShapeId, edited: bool },
    /// The token was ours, but its placeholder was removed before the
    /// confirmation arrived.
    Retired,
    /// The token was never issued by this store.
    Unknown,
}

/// Ordered in-memory list of shape records.
#[derive(Debug, Default)]
pub struct DocStore {
    records: Vec<ShapeRecord>,
    /// Outstanding creations: token -> placeholder id.
    pending: HashMap<String, ShapeId>,
    /// Tokens whose placeholder was removed while the creation was in flight,
    /// oldest first. A creation that never echoes leaves its token here until
    /// it is pushed out.
    retired: VecDeque<String>,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record on top. Returns `false` and leaves the store untouched
    /// if a record with the same id already exists.
    pub fn push(&mut self, record: ShapeRecord) -> bool {
        if self.contains(record.id) {
            return false;
        }
        if let Some(token) = &record.pending {
            self.pending.insert(token.clone(), record.id);
        }
        self.records.push(record);
        true
    }

    /// Remove a record by id, returning it if it was present. Removing a
    /// pending placeholder retires its token.
    pub fn remove(&mut self, id: ShapeId) -> Option<ShapeRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        let record = self.records.remove(index);
        if let Some(token) = &record.pending {
            self.pending.remove(token);
            self.retire(token.clone());
        }
        Some(record)
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: ShapeId) -> Option<&ShapeRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut ShapeRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: ShapeId) -> bool {
        self.get(id).is_some()
    }

    /// Placeholder id for an outstanding creation token.
    #[must_use]
    pub fn pending_id(&self, token: &str) -> Option<ShapeId> {
        self.pending.get(token).copied()
    }

    /// Resolve a creation confirmation. The token is consumed on every
    /// outcome except `Unknown`, so a token clears at most once.
    pub fn confirm(&mut self, token: &str, assigned: ShapeId) -> Confirmation {
        let Some(placeholder) = self.pending.remove(token) else {
            if let Some(index) = self.retired.iter().position(|t| t == token) {
                self.retired.remove(index);
                return Confirmation::Retired;
            }
            return Confirmation::Unknown;
        };

        // A history reload may already have brought in the persisted row.
        if self.contains(assigned) {
            let Some(index) = self.records.iter().position(|r| r.id == placeholder) else {
                return Confirmation::Retired;
            };
            let local = self.records.remove(index);
            if local.edited_while_pending
                && let Some(existing) = self.get_mut(assigned)
            {
                existing.shape = local.shape;
            }
            return Confirmation::Confirmed { placeholder, id: assigned, edited: local.edited_while_pending };
        }

        let Some(record) = self.get_mut(placeholder) else {
            return Confirmation::Retired;
        };
        record.id = assigned;
        record.pending = None;
        let edited = std::mem::take(&mut record.edited_while_pending);
        Confirmation::Confirmed { placeholder, id: assigned, edited }
    }

    /// Replace all confirmed records with a snapshot, in the given order.
    /// Placeholders still awaiting confirmation are kept on top.
    pub fn load_snapshot(&mut self, records: Vec<ShapeRecord>) {
        let placeholders: Vec<ShapeRecord> = self
            .records
            .drain(..)
            .filter(|r| r.pending.is_some())
            .collect();
        for record in records {
            if !self.contains(record.id) {
                self.records.push(record);
            }
        }
        for record in placeholders {
            if !self.contains(record.id) {
                self.records.push(record);
            }
        }
    }

    fn retire(&mut self, token: String) {
        if self.retired.len() >= MAX_RETIRED_TOKENS {
            self.retired.pop_front();
        }
        self.retired.push_back(token);
    }

    /// Number of retired tokens still remembered.
    #[must_use]
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Drop everything, including outstanding tokens.
    pub fn clear(&mut self) {
        self.records.clear();
        self.pending.clear();
        self.retired.clear();
    }

    /// Records in draw order (bottom first).
    #[must_use]
    pub fn records(&self) -> &[ShapeRecord] {
        &self.records
    }

    /// Records most-recently-appended first (hit-test order).
    pub fn top_down(&self) -> impl Iterator<Item = &ShapeRecord> {
        self.records.iter().rev()
    }

    /// Number of outstanding creations.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

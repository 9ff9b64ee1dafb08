//! Walker cache (§3 "Walker cache entry", §4.2).
//!
//! Re-deriving a walker from the document root on every query would make
//! `possible_at`/`speculatively_validate` linear in document size for every
//! call. Instead the traversal loop periodically stashes a cloned walker —
//! keyed by the `(NodeId, Phase)` it was taken at and the [`EventIndex`] at
//! that moment — and lookups fast-forward from the nearest entry at or
//! before the target instead of from the root.
//!
//! Spacing and eviction are governed by [`ValidatorOptions`](crate::validator::ValidatorOptions):
//! `walker_cache_gap` events must elapse between two insertions for the same
//! node/phase pair (dense stashing buys nothing once entries are this
//! close), and `walker_cache_max` bounds total entries, evicting the oldest
//! by insertion order once exceeded.

use std::collections::HashMap;

use rngval_tree::NodeId;

use crate::errors::EngineError;
use crate::index::EventIndex;

/// Which traversal stage transition a cached walker was taken at (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// After the start tag and all attributes, before any content child.
    AfterAttributes,
    /// After the element's end tag fired.
    AfterEnd,
}

#[derive(Clone)]
struct Entry<W> {
    walker: W,
    at: EventIndex,
    insertion_order: u64,
}

/// Sparse `(NodeId, Phase) -> cloned walker` map, generic over the walker
/// type so this module has no dependency on `rngval-grammar` specifically.
pub struct WalkerCache<W> {
    entries: HashMap<(NodeId, Phase), Entry<W>>,
    last_insert_at: HashMap<(NodeId, Phase), EventIndex>,
    gap: u64,
    max_entries: usize,
    next_insertion_order: u64,
}

impl<W: Clone> WalkerCache<W> {
    pub fn new(gap: u64, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            last_insert_at: HashMap::new(),
            gap,
            max_entries,
            next_insertion_order: 0,
        }
    }

    /// Stash `walker` for `(node, phase)` at event index `at`, unless a more
    /// recent entry for the same key was inserted less than `gap` events ago.
    pub fn maybe_insert(&mut self, node: NodeId, phase: Phase, at: EventIndex, walker: &W) {
        let key = (node, phase);
        if let Some(&last) = self.last_insert_at.get(&key) {
            if at.0.saturating_sub(last.0) < self.gap {
                return;
            }
        }
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.entries.insert(
            key,
            Entry {
                walker: walker.clone(),
                at,
                insertion_order: order,
            },
        );
        self.last_insert_at.insert(key, at);
        self.evict_if_over_capacity();
    }

    fn evict_if_over_capacity(&mut self) {
        while self.entries.len() > self.max_entries {
            let Some((&oldest_key, _)) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.insertion_order)
            else {
                break;
            };
            self.entries.remove(&oldest_key);
        }
    }

    /// Returns the cached walker for `(node, phase)` with the greatest
    /// `EventIndex` not exceeding `at`, along with that index, so the caller
    /// can fast-forward the remaining events itself. `Ok(None)` means no
    /// usable entry exists and the caller must replay from the root.
    pub fn lookup(
        &self,
        node: NodeId,
        phase: Phase,
        at: EventIndex,
    ) -> Result<Option<(&W, EventIndex)>, EngineError> {
        match self.entries.get(&(node, phase)) {
            Some(entry) if entry.at <= at => Ok(Some((&entry.walker, entry.at))),
            Some(entry) if entry.at > at => Err(EngineError::EventIndexException),
            _ => Ok(None),
        }
    }

    /// Drop every entry at or after `at` — the reset protocol (§4.5) calls
    /// this so a stale walker can never be handed back for a node whose
    /// content is about to be re-derived differently.
    pub fn purge_from(&mut self, at: EventIndex) {
        self.entries.retain(|_, e| e.at < at);
        self.last_insert_at.retain(|_, &mut last| last < at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

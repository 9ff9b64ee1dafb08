use serde::{Deserialize, Serialize};

/// §3: "Only `Invalid`/`Valid` are terminal and are reached only when the
/// entire document has been consumed."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WorkingState {
    Incomplete = 1,
    Working = 2,
    Invalid = 3,
    Valid = 4,
}

impl WorkingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkingState::Invalid | WorkingState::Valid)
    }
}

/// The `{state, part_done}` pair returned by `Validator::working_state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub state: WorkingState,
    pub part_done: f64,
}

/// Tracks `part_done` by interpolating sibling position at each depth, per
/// §4.1: "each level contributes `1 / Σ-siblings` of its parent's remaining
/// budget". A stack of `(index, sibling_count)` pairs mirrors the traversal
/// stack; `fraction()` folds it outside-in so the result is monotonic and
/// reaches exactly `1.0` once the stack is empty and the document is done.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    levels: Vec<(usize, usize)>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_level(&mut self, sibling_count: usize) {
        self.levels.push((0, sibling_count.max(1)));
    }

    pub fn pop_level(&mut self) {
        self.levels.pop();
    }

    pub fn advance(&mut self) {
        if let Some((index, _)) = self.levels.last_mut() {
            *index += 1;
        }
    }

    /// Fraction of the document consumed so far, in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        let mut acc = 1.0;
        for &(index, count) in self.levels.iter().rev() {
            let local = index as f64 / count as f64;
            acc = local + acc / count as f64;
        }
        acc.clamp(0.0, 1.0)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the virtual event stream (§3): monotonically increasing,
/// incremented once per event fired into the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventIndex(pub u64);

impl EventIndex {
    pub const ZERO: EventIndex = EventIndex(0);

    pub fn next(self) -> Self {
        EventIndex(self.0 + 1)
    }
}

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

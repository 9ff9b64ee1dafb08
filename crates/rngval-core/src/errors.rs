use crate::index::EventIndex;
use rngval_grammar::GrammarError;
use rngval_tree::NodeId;
use serde::Serialize;
use thiserror::Error;

/// Engine faults (§7, plane 2): unexpected implementation bugs, never
/// validation output. These propagate as `Err` and, when raised mid-cycle,
/// stop the scheduler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("cycle() was reentered while already running")]
    Reentrant,

    #[error("computed an impossible event index while locating a cached walker")]
    EventIndexException,

    #[error("walker cache entry referenced a node no longer reachable from the root")]
    CacheCorruption,

    #[error("the grammar walker could not be cloned")]
    WalkerCloneFailed,

    #[error("container node must be an element or text node")]
    InvalidContainer,
}

/// A single validation complaint (§3, "Error record"), the domain output of
/// the validator. Distinct from [`EngineError`] — this is never an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    #[serde(skip)]
    pub error: GrammarError,
    pub message: String,
    pub node: Option<NodeId>,
    pub index: Option<usize>,
    pub at: EventIndex,
}

impl ValidationError {
    pub fn new(error: GrammarError, node: Option<NodeId>, index: Option<usize>, at: EventIndex) -> Self {
        Self {
            message: error.to_string(),
            error,
            node,
            index,
            at,
        }
    }
}

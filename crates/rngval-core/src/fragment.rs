//! Thin wrapper around [`rngval_tree::fragment`] (§1, §6
//! `speculatively_validate_fragment`).
//!
//! `rngval-core` does not own XML parsing; it only needs *a* way to turn a
//! string the host hands to `speculatively_validate_fragment` into a
//! throwaway [`Document`] it can run a cloned walker over. This module is
//! that seam, kept separate so swapping in a different fragment reader never
//! touches `query.rs`.

use rngval_tree::{Document, ParsingError};

pub fn parse_standalone_fragment(source: &str) -> Result<Document, ParsingError> {
    rngval_tree::safe_parse(source)
}

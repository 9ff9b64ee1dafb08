use crate::name::{Name, NameTest};
use thiserror::Error;

/// A single grammar-level validation complaint. `rngval-core` wraps these
/// into `ValidationError` records with an owning node and index (§4.3); this
/// crate only ever describes *what* failed, never *where in the tree*.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    #[error("element not allowed here; expected one of: {}", display_expected(.expected))]
    OutOfPlaceElement { name: Name, expected: Vec<NameTest> },

    #[error("required content missing; expected one of: {}", display_expected(.expected))]
    MissingElement { expected: Vec<NameTest> },

    #[error("text not allowed here")]
    TextNotAllowed,

    #[error("attribute `{name}` not allowed here")]
    AttributeNotAllowed { name: Name },

    #[error("required attribute missing")]
    MissingAttribute,

    #[error("attribute `{name}` has invalid value `{value}`")]
    WrongAttributeValue { name: Name, value: String },
}

fn display_expected(expected: &[NameTest]) -> String {
    expected
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

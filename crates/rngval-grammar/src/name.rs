use std::fmt;

/// An expanded (namespace, local-name) pair, as understood by the grammar
/// engine. Intentionally structurally identical to, but independent of,
/// `rngval_tree::QName` — the grammar crate knows nothing about trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub ns: Option<String>,
    pub local: String,
}

impl Name {
    pub fn new(ns: impl Into<Option<String>>, local: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            local: local.into(),
        }
    }

    pub fn local(local: impl Into<String>) -> Self {
        Self {
            ns: None,
            local: local.into(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// A Relax NG-style name class, narrowed to what this reference engine
/// supports: an exact name, or the `anyName` wildcard. Real Relax NG also has
/// `nsName` and `except`; both are a documented non-goal here (§4.8 of
/// SPEC_FULL.md) — a production grammar compiler would extend this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameTest {
    Name(Name),
    AnyName,
}

impl NameTest {
    pub fn matches(&self, name: &Name) -> bool {
        match self {
            NameTest::Name(n) => n == name,
            NameTest::AnyName => true,
        }
    }

    /// Whether admission through this name-test counts as "wildcard
    /// acceptance" per the glossary: a match permitted only by a pattern
    /// that matches arbitrary names.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, NameTest::AnyName)
    }
}

impl fmt::Display for NameTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTest::Name(n) => write!(f, "{n}"),
            NameTest::AnyName => write!(f, "*"),
        }
    }
}

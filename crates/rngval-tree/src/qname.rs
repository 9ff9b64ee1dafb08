use std::fmt;

/// An expanded (namespace, local-name) pair.
///
/// `rngval-tree` never resolves prefixes itself — elements and attributes are
/// created with whatever namespace URI the host already resolved. Prefix
/// resolution against in-scope `xmlns` declarations is the validator's job
/// (`rngval-core`), not the tree's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI, or `None` for the null namespace.
    pub ns: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(ns: impl Into<Option<String>>, local: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            local: local.into(),
        }
    }

    /// Shorthand for a name in the null namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            ns: None,
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

//! Language-pack boundary.
//!
//! Locator terms are locale-specific literals ("Confirm", "Confirmar",
//! "Bestätigen") supplied by an external language pack. The engine treats
//! them as opaque strings: no translation logic lives here, only the lookup
//! seam.

use std::collections::HashMap;

/// Supplies locale-specific literal text used as locator terms
pub trait LanguagePack {
    /// The literal for `key`, if the pack defines one
    fn term(&self, key: &str) -> Option<&str>;

    /// The literal for `key`, falling back to the key itself.
    ///
    /// Packs are allowed to be sparse; an undefined key is used verbatim so
    /// suites can mix translated and literal terms.
    fn term_or_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.term(key).unwrap_or(key)
    }
}

/// In-memory language pack
#[derive(Debug, Clone, Default)]
pub struct StaticPack {
    terms: HashMap<String, String>,
}

impl StaticPack {
    /// Create an empty pack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term
    #[must_use]
    pub fn with_term(mut self, key: impl Into<String>, literal: impl Into<String>) -> Self {
        self.terms.insert(key.into(), literal.into());
        self
    }
}

impl FromIterator<(String, String)> for StaticPack {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

impl LanguagePack for StaticPack {
    fn term(&self, key: &str) -> Option<&str> {
        self.terms.get(key).map(String::as_str)
    }
}

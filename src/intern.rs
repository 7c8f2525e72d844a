//! String interning for property/entry-key identifiers.
//!
//! Identifiers that recur across a module (property names above all) are
//! interned once so that `MemberKey` comparisons and hashing are cheap
//! integer operations instead of string comparisons.

use ahash::AHashMap;

/// Handle to an interned string. Stable for the lifetime of the `Interns` table
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns the canonical text for every interned identifier seen during
/// evaluation of a module (and its imports, once the module resolver is
/// wired up by an embedder).
#[derive(Debug, Default)]
pub struct Interns {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, StringId>,
}

impl Interns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning the existing id if already seen.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId(self.strings.len() as u32);
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, id);
        id
    }

    /// Returns the text for `id`.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this table.
    #[must_use]
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interns = Interns::new();
        let a = interns.intern("name");
        let b = interns.intern("name");
        assert_eq!(a, b);
        assert_eq!(interns.get(a), "name");
        assert_eq!(interns.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut interns = Interns::new();
        let a = interns.intern("name");
        let b = interns.intern("age");
        assert_ne!(a, b);
        assert_eq!(interns.get(b), "age");
    }
}

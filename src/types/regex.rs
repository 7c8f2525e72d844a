//! `Regex` value: a compiled pattern plus its source text (§3, §4.A).
//!
//! Equality and hashing compare the source pattern only, never the compiled
//! automaton, per §4.A ("Regex equality compares source patterns").

use std::fmt;

#[derive(Clone)]
pub struct RegexData {
    pub source: String,
    pub compiled: regex::Regex,
}

impl RegexData {
    /// Compiles `source`. Callers surface `regex::Error` as an `EvalError`
    /// (constructing a `Regex` value is itself an expression evaluation,
    /// §4.D "standard" operation category).
    pub fn compile(source: &str) -> Result<Self, regex::Error> {
        let compiled = regex::Regex::new(source)?;
        Ok(Self { source: source.to_string(), compiled })
    }
}

impl fmt::Debug for RegexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexData").field("source", &self.source).finish()
    }
}

impl PartialEq for RegexData {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RegexData {}

impl std::hash::Hash for RegexData {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl serde::Serialize for RegexData {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.source.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for RegexData {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::compile(&source).map_err(serde::de::Error::custom)
    }
}

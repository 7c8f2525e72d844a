//! `List` value: an ordered, indexable, immutable sequence (§3).

use crate::value::Value;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListData(pub Vec<Value>);

impl ListData {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(items)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

//! `Map` value: ordered, keys unique by structural equality (§3).

use crate::value::Value;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MapData(Vec<(Value, Value)>);

impl MapData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut map = Self::new();
        for (k, v) in pairs {
            map.insert(k, v);
        }
        map
    }

    /// Inserts `key -> value`, overwriting the value of a structurally-equal
    /// existing key in place (keeping that key's original position, matching
    /// the amend engine's "overlay members keep the parent's position" rule
    /// applied here to the plain-Map case).
    pub fn insert(&mut self, key: Value, value: Value) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k.structural_eq(&key)) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k.structural_eq(key)).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.0.iter()
    }
}

pub fn maps_structurally_equal(a: &MapData, b: &MapData) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|v2| v.structural_eq(v2)))
}

//! `Pair` value: an ordered two-tuple of arbitrary values (§3).

use crate::value::Value;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PairData {
    pub first: Box<Value>,
    pub second: Box<Value>,
}

impl PairData {
    #[must_use]
    pub fn new(first: Value, second: Value) -> Self {
        Self { first: Box::new(first), second: Box::new(second) }
    }
}

//! Scope & frame model (§4.C).
//!
//! A `Frame` is passed down through one reduction: `receiver` is the
//! current dynamic `this`, `owner` is the def's physically-declaring
//! object, `arguments` binds parameter names for the currently executing
//! method/function, and `aux` is a stack of the two special scopes
//! named in §4.C — pushed on entry, popped on exit, innermost wins.

use indexmap::IndexMap;

use crate::heap::{Heap, ObjectId};
use crate::intern::StringId;
use crate::value::Value;

/// The two auxiliary scope kinds named in §4.C.
#[derive(Debug, Clone)]
pub enum AuxSlot {
    /// Unqualified `this` inside a constraint predicate or object predicate
    /// member refers to the value under validation, not the enclosing
    /// object.
    CustomThis(Value),
    /// Per-iteration comprehension bindings (`for (k, v in ...)`).
    ForGenerator(IndexMap<StringId, Value>),
}

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub receiver: Option<ObjectId>,
    pub owner: Option<ObjectId>,
    pub arguments: IndexMap<StringId, Value>,
    aux: Vec<AuxSlot>,
}

impl Frame {
    #[must_use]
    pub fn new(receiver: Option<ObjectId>, owner: Option<ObjectId>) -> Self {
        Self { receiver, owner, arguments: IndexMap::new(), aux: Vec::new() }
    }

    #[must_use]
    pub fn with_arguments(receiver: Option<ObjectId>, owner: Option<ObjectId>, arguments: IndexMap<StringId, Value>) -> Self {
        Self { receiver, owner, arguments, aux: Vec::new() }
    }

    pub fn push_aux(&mut self, slot: AuxSlot) {
        self.aux.push(slot);
    }

    pub fn pop_aux(&mut self) {
        self.aux.pop();
    }

    /// Innermost `custom-this` binding, if one is active (§4.C).
    #[must_use]
    pub fn custom_this(&self) -> Option<&Value> {
        self.aux.iter().rev().find_map(|slot| match slot {
            AuxSlot::CustomThis(v) => Some(v),
            AuxSlot::ForGenerator(_) => None,
        })
    }

    /// Innermost `for-generator` binding of `name`, if bound (§4.C).
    #[must_use]
    pub fn for_generator_var(&self, name: StringId) -> Option<&Value> {
        self.aux.iter().rev().find_map(|slot| match slot {
            AuxSlot::ForGenerator(vars) => vars.get(&name),
            AuxSlot::CustomThis(_) => None,
        })
    }
}

/// Walks `levels_up` `enclosing` links starting at `start` (§4.C
/// "Resolution is decided once at AST-preparation time ... the runtime
/// merely walks that many enclosing links").
///
/// # Panics
/// Panics if the chain is shorter than `levels_up` — this indicates a bug
/// in the upstream resolver pass (an `ast::Ident` whose `levels_up` doesn't
/// match the actual nesting), not a recoverable runtime condition.
#[must_use]
pub fn walk_enclosing(heap: &Heap, start: ObjectId, levels_up: u32) -> ObjectId {
    let mut current = start;
    for _ in 0..levels_up {
        current = heap.object(current).enclosing().expect("levels_up exceeds enclosing chain depth");
    }
    current
}

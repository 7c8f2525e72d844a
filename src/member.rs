//! Member table & memoization (§4.B).

use crate::ast::{Expr, MemberFlags, SourceSpan, TypeExpr};
use crate::heap::ObjectId;
use crate::intern::StringId;
use crate::value::Value;

/// Key identifying one member slot on an object-like value (§3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum MemberKey {
    Property(StringId),
    /// Entry keys are arbitrary *forced* values, compared structurally
    /// (§4.A, and the Open Question resolution in SPEC_FULL.md: structurally
    /// equal but distinct entry keys collide).
    Entry(Value),
    Element(u64),
}

impl PartialEq for MemberKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Property(a), Self::Property(b)) => a == b,
            (Self::Entry(a), Self::Entry(b)) => a.structural_eq(b),
            (Self::Element(a), Self::Element(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for MemberKey {}

impl std::hash::Hash for MemberKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::Property(id) => {
                0u8.hash(state);
                id.hash(state);
            }
            Self::Entry(v) => {
                1u8.hash(state);
                v.structural_hash().hash(state);
            }
            Self::Element(i) => {
                2u8.hash(state);
                i.hash(state);
            }
        }
    }
}

/// The body a member evaluates to when forced.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum MemberBody {
    Expr(Expr),
    /// A member whose value was supplied directly (e.g. synthesized by the
    /// amend engine rather than parsed from source).
    Value(Value),
}

/// Static definition of a member, independent of any particular force
/// (§3 "MemberDef fields").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemberDef {
    pub span: SourceSpan,
    pub flags: MemberFlags,
    pub declared_type: Option<TypeExpr>,
    pub body: MemberBody,
    /// The object on which this def physically lives (the *owner*, §4.B
    /// step 2). `None` until the def has been placed on an object by the
    /// amend engine.
    pub owner: Option<ObjectId>,
}

impl MemberDef {
    #[must_use]
    pub fn new(span: SourceSpan, flags: MemberFlags, declared_type: Option<TypeExpr>, body: MemberBody) -> Self {
        Self { span, flags, declared_type, body, owner: None }
    }
}

/// Per-key force state (§4.B, §4.D "State machines").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ForceState {
    Unforced,
    InProgress,
    Forced,
}

/// One slot in an object's member table: its static definition plus force
/// state and (once forced) its memoized value.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemberSlot {
    pub def: MemberDef,
    pub state: ForceState,
    pub cached: Option<Value>,
}

impl MemberSlot {
    #[must_use]
    pub fn new(def: MemberDef) -> Self {
        Self { def, state: ForceState::Unforced, cached: None }
    }
}

//! Object-like value representation shared by Listing/Mapping/Dynamic/Typed/Module (§3).

use indexmap::IndexMap;

use crate::heap::{ClassId, ObjectId};
use crate::member::{MemberDef, MemberKey, MemberSlot};
use crate::types::type_value::TypeValue;

/// Which object-like kind an `ObjectData` represents. Stdlib classes
/// (Listing/Mapping/Dynamic) are distinguished by this tag rather than by
/// class lookup, per §9's "stdlib classes resolved by variant tag" note;
/// `class` is still populated (with a synthetic class descriptor) so that
/// `isinstance`-style checks in the type checker stay uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ObjectKind {
    Dynamic,
    Listing,
    Mapping,
    Typed,
    Module,
}

/// An object-like value: its member table, its amend-chain parent, its
/// class, and the lexical environment its member bodies resolve free
/// identifiers against (§3, §4.C).
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ObjectData {
    kind: ObjectKind,
    class: ClassId,
    parent: Option<ObjectId>,
    /// Lexically enclosing object (the module, or an outer object literal),
    /// used to resolve free identifiers that aren't found on this object's
    /// own chain (§4.C). Non-owning: dropping this object does not imply
    /// anything about the enclosing object's lifetime (§9).
    enclosing: Option<ObjectId>,
    members: IndexMap<MemberKey, MemberSlot>,
    /// `default` member, if this object (or, once resolved during lookup,
    /// some ancestor) declares one (§3: "at most one per object-like").
    default_member: Option<MemberDef>,
    /// For a Listing/Mapping created from a parameterized type (`Listing<Int>`,
    /// `Mapping<String, Int>`): the element type (Listing) or entry value
    /// type (Mapping), attached once at creation and checked lazily on each
    /// element/entry force rather than eagerly over every member (§4.E
    /// "Parameterized class" row).
    element_type: Option<TypeValue>,
}

impl ObjectData {
    #[must_use]
    pub fn new(kind: ObjectKind, class: ClassId, parent: Option<ObjectId>, enclosing: Option<ObjectId>) -> Self {
        Self { kind, class, parent, enclosing, members: IndexMap::new(), default_member: None, element_type: None }
    }

    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    #[must_use]
    pub fn class(&self) -> ClassId {
        self.class
    }

    #[must_use]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    #[must_use]
    pub fn enclosing(&self) -> Option<ObjectId> {
        self.enclosing
    }

    #[must_use]
    pub fn members(&self) -> &IndexMap<MemberKey, MemberSlot> {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut IndexMap<MemberKey, MemberSlot> {
        &mut self.members
    }

    #[must_use]
    pub fn default_member(&self) -> Option<&MemberDef> {
        self.default_member.as_ref()
    }

    pub fn set_default_member(&mut self, def: MemberDef) {
        self.default_member = Some(def);
    }

    #[must_use]
    pub fn element_type(&self) -> Option<&TypeValue> {
        self.element_type.as_ref()
    }

    pub fn set_element_type(&mut self, ty: Option<TypeValue>) {
        self.element_type = ty;
    }

    /// Inserts a member at the end of the current iteration order. Used by
    /// the amend engine when building a freshly-amended object's table; see
    /// `amend.rs` for the position-preserving merge logic that produces the
    /// final order (§3 "Iteration of object members is deterministic").
    pub fn push_member(&mut self, key: MemberKey, slot: MemberSlot) {
        self.members.insert(key, slot);
    }

    /// Dense length of a Listing: one past the highest `Element` index
    /// present (§3 "Element indices in a Listing are dense 0..length").
    #[must_use]
    pub fn listing_length(&self) -> u64 {
        self.members
            .keys()
            .filter_map(|k| match k {
                MemberKey::Element(i) => Some(*i + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, MemberFlags, SourceSpan};
    use crate::heap::Heap;
    use crate::member::{MemberBody, MemberSlot};
    use crate::types::class::ClassData;
    use crate::ast::Expr;

    #[test]
    fn listing_length_is_one_past_highest_index() {
        let mut heap = Heap::new();
        let class = heap.alloc_class(ClassData::synthetic("Listing"));
        let mut data = ObjectData::new(ObjectKind::Listing, class, None, None);
        data.push_member(
            MemberKey::Element(0),
            MemberSlot::new(MemberDef::new(
                SourceSpan::default(),
                MemberFlags::default(),
                None,
                MemberBody::Expr(Expr::Const(Literal::Int(1))),
            )),
        );
        data.push_member(
            MemberKey::Element(2),
            MemberSlot::new(MemberDef::new(
                SourceSpan::default(),
                MemberFlags::default(),
                None,
                MemberBody::Expr(Expr::Const(Literal::Int(3))),
            )),
        );
        assert_eq!(data.listing_length(), 3);
    }
}

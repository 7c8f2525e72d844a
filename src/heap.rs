//! Arena allocator for object-like values, classes, and type aliases.
//!
//! A Pkl evaluator instance owns its value graph for the lifetime of one
//! `evaluate()` call (§5, §9: "evaluator owns its value graph
//! exclusively") and the whole graph — including any cycles through
//! enclosing-frame back-references — is dropped at once when the `Heap`
//! is dropped. So slots here are never individually freed or reused;
//! handles are plain stable indices, not refcounted, and `Value::clone()`
//! of an object-like variant is just an index copy.
//!
//! This is a deliberate simplification (documented in DESIGN.md): nothing
//! here requires intra-evaluation garbage collection, and incremental
//! re-evaluation across edits — the only scenario that would make
//! per-object reclamation worth its complexity — is out of scope.

use crate::{member::ForceState, object::ObjectData, types::class::ClassData, types::type_value::TypeAliasData};

/// Stable handle to an `ObjectData` slot. Never reused within one `Heap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ObjectId(u32);

/// Stable handle to a `ClassData` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ClassId(u32);

/// Stable handle to a `TypeAliasData` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TypeAliasId(u32);

impl ObjectId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ClassId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TypeAliasId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns every object-like, class, and type-alias allocated during one
/// evaluation. Dropped as a unit; see module docs.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<ObjectData>,
    classes: Vec<ClassData>,
    aliases: Vec<TypeAliasData>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_object(&mut self, data: ObjectData) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(data);
        id
    }

    pub fn alloc_class(&mut self, data: ClassData) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(data);
        id
    }

    pub fn alloc_alias(&mut self, data: TypeAliasData) -> TypeAliasId {
        let id = TypeAliasId(self.aliases.len() as u32);
        self.aliases.push(data);
        id
    }

    #[must_use]
    pub fn object(&self, id: ObjectId) -> &ObjectData {
        &self.objects[id.index()]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut ObjectData {
        &mut self.objects[id.index()]
    }

    #[must_use]
    pub fn class(&self, id: ClassId) -> &ClassData {
        &self.classes[id.index()]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassData {
        &mut self.classes[id.index()]
    }

    #[must_use]
    pub fn alias(&self, id: TypeAliasId) -> &TypeAliasData {
        &self.aliases[id.index()]
    }

    /// Current arena occupancy as a `HeapStats` snapshot.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_objects: self.objects.len(),
            live_classes: self.classes.len(),
            live_aliases: self.aliases.len(),
            in_progress_members: self
                .objects
                .iter()
                .map(|o| o.members().values().filter(|m| m.state == ForceState::InProgress).count())
                .sum(),
        }
    }
}

/// Point-in-time arena occupancy, useful for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub live_objects: usize,
    pub live_classes: usize,
    pub live_aliases: usize,
    pub in_progress_members: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;
    use crate::types::class::ClassData;

    #[test]
    fn allocated_ids_are_stable_and_dense() {
        let mut heap = Heap::new();
        let class = heap.alloc_class(ClassData::synthetic("Dynamic"));
        let a = heap.alloc_object(ObjectData::new(ObjectKind::Dynamic, class, None, None));
        let b = heap.alloc_object(ObjectData::new(ObjectKind::Dynamic, class, None, None));
        assert_ne!(a, b);
        assert_eq!(heap.object(a).kind(), ObjectKind::Dynamic);
        assert_eq!(heap.stats().live_objects, 2);
    }
}

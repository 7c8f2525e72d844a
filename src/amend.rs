//! Amend/compose engine (§4.F).
//!
//! `amend()` is the single composition primitive used by both `parent {
//! ... }` (§4.D "Amend") and `new T { ... }` (§4.D "New", once the caller
//! has already resolved `T`'s default value as the parent) — the component
//! diagram draws D invoking F for both expression kinds, and this module
//! doesn't need to know which one it was called for.
//!
//! Grounded on §3's invariant that overlay members are placed at the
//! parent's original position: this is implemented directly by
//! `IndexMap::insert`'s documented behavior of updating an existing key's
//! value in place without moving it, so no separate position-tracking
//! logic is needed.
//!
//! Simplification from "inherit by reference, no copy" (§4.F intro):
//! inherited defs are eagerly cloned into the child's own member table
//! rather than resolved by walking the parent chain at force time. Each
//! cloned def keeps its original `owner`, so force() still attributes the
//! member to whichever ancestor physically declared it — only the *table
//! entry* is duplicated, not the semantics. This trades a small amount of
//! memory for O(1) force/iteration lookups with no chain walk, which the
//! spec's own invariants never required to be avoided. Documented in
//! DESIGN.md.

use crate::ast::{Expr, ObjectLiteral, ObjectLiteralMember};
use crate::errors::{EvalError, RunResult};
use crate::frame::{AuxSlot, Frame};
use crate::heap::{Heap, ObjectId};
use crate::member::{MemberBody, MemberDef, MemberKey, MemberSlot};
use crate::object::{ObjectData, ObjectKind};
use crate::value::Value;

/// Callback seam into the expression evaluator (§4.D), needed for entry
/// keys, for-generator iterables, `when` conditions, and predicate
/// evaluation — all genuine expression evaluation, which is D's job.
pub trait AmendContext {
    fn eval_expr(&mut self, heap: &mut Heap, frame: &mut Frame, expr: &Expr) -> RunResult<Value>;

    /// Forces every member key visible on `object`'s amend chain (its own
    /// table, since inherited keys are already copied in per this module's
    /// simplification) plus the forced value at each, for predicate members
    /// (§4.F "iterate all visible entry keys of the parent chain").
    fn visible_entries(&mut self, heap: &mut Heap, object: ObjectId) -> RunResult<Vec<(MemberKey, Value)>>;

    /// Iterates a for-generator's source value, yielding `(key, value)`
    /// pairs — `key` is `Some` only for Map/Mapping sources (§4.D).
    fn iterate_for_generator(&mut self, heap: &mut Heap, value: &Value) -> RunResult<Vec<(Option<Value>, Value)>>;

    /// Human-readable description of a member key, for `DuplicateDefinition`
    /// messages (§4.D). The default rendering has no access to an intern
    /// table; `Evaluator` overrides it to resolve `Property` names.
    fn describe_key(&self, key: &MemberKey) -> String {
        match key {
            MemberKey::Property(id) => format!("property #{}", id.index()),
            MemberKey::Entry(v) => format!("entry [{v}]"),
            MemberKey::Element(i) => format!("element {i}"),
        }
    }
}

/// A flattened overlay member, after `for`/`when`/predicate lowering.
enum Lowered {
    Property { name: crate::intern::StringId, type_expr: Option<crate::ast::TypeExpr>, body: Expr },
    Entry { key: Value, body: Expr },
    Element { body: Expr },
    /// A predicate match: overlay the value at an already-existing key,
    /// skipping kind validation (the key was valid when first declared).
    Replace { key: MemberKey, body: Expr },
}

/// Composes `parent` with `overlay`, producing a new object-like of the
/// same kind as `parent` (§4.F). `enclosing` is the lexical scope the
/// overlay's own members resolve free identifiers against — the scope in
/// which the `parent { ... }`/`new T { ... }` expression itself appears,
/// not `parent`'s own enclosing scope. `default_key` is the interned
/// `"default"` identifier (§3 "Default member"): a property overlay member
/// with this name on a Mapping/Listing sets the object's `default_member`
/// slot instead of an ordinary property, since `default` is reserved
/// syntax there rather than a declarable property name.
pub fn amend(
    heap: &mut Heap,
    ctx: &mut dyn AmendContext,
    frame: &mut Frame,
    parent: ObjectId,
    enclosing: Option<ObjectId>,
    overlay: &ObjectLiteral,
    default_key: crate::intern::StringId,
) -> RunResult<ObjectId> {
    let kind = heap.object(parent).kind();
    let class = heap.object(parent).class();

    let mut seeded = ObjectData::new(kind, class, Some(parent), enclosing);
    let parent_keys: Vec<MemberKey> = heap.object(parent).members().keys().cloned().collect();
    for key in &parent_keys {
        let def = heap.object(parent).members()[key].def.clone();
        seeded.push_member(key.clone(), MemberSlot::new(def));
    }
    if let Some(default) = heap.object(parent).default_member().cloned() {
        seeded.set_default_member(default);
    }
    seeded.set_element_type(heap.object(parent).element_type().cloned());

    let new_id = heap.alloc_object(seeded);

    let lowered = lower_overlay(heap, ctx, frame, parent, overlay)?;
    let mut next_element_index = heap.object(new_id).listing_length();
    let mut declared_keys: std::collections::HashSet<MemberKey> = std::collections::HashSet::new();
    let mut default_declared = false;

    for member in lowered {
        apply_overlay_member(
            heap,
            new_id,
            kind,
            member,
            &mut next_element_index,
            default_key,
            &mut declared_keys,
            &mut default_declared,
            &*ctx,
        )?;
    }

    Ok(new_id)
}

fn lower_overlay(
    heap: &mut Heap,
    ctx: &mut dyn AmendContext,
    frame: &mut Frame,
    parent: ObjectId,
    overlay: &ObjectLiteral,
) -> RunResult<Vec<Lowered>> {
    let mut out = Vec::new();
    for member in &overlay.members {
        lower_member(heap, ctx, frame, parent, member, &mut out)?;
    }
    Ok(out)
}

fn lower_member(
    heap: &mut Heap,
    ctx: &mut dyn AmendContext,
    frame: &mut Frame,
    parent: ObjectId,
    member: &ObjectLiteralMember,
    out: &mut Vec<Lowered>,
) -> RunResult<()> {
    match member {
        ObjectLiteralMember::Property { name, type_expr, body, .. } => {
            out.push(Lowered::Property { name: *name, type_expr: type_expr.clone(), body: body.clone() });
            Ok(())
        }
        ObjectLiteralMember::Entry { key, body, .. } => {
            let key_value = ctx.eval_expr(heap, frame, key)?;
            out.push(Lowered::Entry { key: key_value, body: body.clone() });
            Ok(())
        }
        ObjectLiteralMember::Element { body, .. } => {
            out.push(Lowered::Element { body: body.clone() });
            Ok(())
        }
        ObjectLiteralMember::When { cond, then_template, else_template } => {
            let chosen = if matches!(ctx.eval_expr(heap, frame, cond)?, Value::Bool(true)) {
                Some(then_template.as_ref())
            } else {
                else_template.as_deref()
            };
            if let Some(template) = chosen {
                for inner in &template.members {
                    lower_member(heap, ctx, frame, parent, inner, out)?;
                }
            }
            Ok(())
        }
        ObjectLiteralMember::ForGenerator { key_binding, value_binding, iterable, template, .. } => {
            let source = ctx.eval_expr(heap, frame, iterable)?;
            let pairs = ctx.iterate_for_generator(heap, &source)?;
            for (k, v) in pairs {
                let mut vars = indexmap::IndexMap::new();
                if let (Some(kb), Some(kv)) = (key_binding, k) {
                    vars.insert(*kb, kv);
                }
                vars.insert(*value_binding, v);
                frame.push_aux(AuxSlot::ForGenerator(vars));
                let result = (|| {
                    for inner in &template.members {
                        lower_member(heap, ctx, frame, parent, inner, out)?;
                    }
                    Ok(())
                })();
                frame.pop_aux();
                result?;
            }
            Ok(())
        }
        ObjectLiteralMember::Predicate { predicate, body, .. } => {
            let entries = ctx.visible_entries(heap, parent)?;
            for (key, forced) in entries {
                frame.push_aux(AuxSlot::CustomThis(forced));
                let matched = ctx.eval_expr(heap, frame, predicate);
                frame.pop_aux();
                if matches!(matched?, Value::Bool(true)) {
                    out.push(Lowered::Replace { key, body: body.clone() });
                }
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_overlay_member(
    heap: &mut Heap,
    new_id: ObjectId,
    kind: ObjectKind,
    member: Lowered,
    next_element_index: &mut u64,
    default_key: crate::intern::StringId,
    declared_keys: &mut std::collections::HashSet<MemberKey>,
    default_declared: &mut bool,
    ctx: &dyn AmendContext,
) -> RunResult<()> {
    match member {
        Lowered::Property { name, type_expr, body } if name == default_key && matches!(kind, ObjectKind::Mapping | ObjectKind::Listing) => {
            if *default_declared {
                return Err(EvalError::DuplicateDefinition { name: "default".into() });
            }
            *default_declared = true;
            let mut def = MemberDef::new(crate::ast::SourceSpan::default(), crate::ast::MemberFlags::default(), type_expr, MemberBody::Expr(body));
            def.owner = Some(new_id);
            heap.object_mut(new_id).set_default_member(def);
            Ok(())
        }
        Lowered::Property { name, type_expr, body } => {
            if !matches!(kind, ObjectKind::Dynamic | ObjectKind::Typed | ObjectKind::Module) {
                return Err(EvalError::CannotAmend { reason: "property members are not valid on Listing/Mapping".into() });
            }
            let key = MemberKey::Property(name);
            if !declared_keys.insert(key.clone()) {
                return Err(EvalError::DuplicateDefinition { name: ctx.describe_key(&key) });
            }
            let declared_type = type_expr.or_else(|| inherited_type(heap, new_id, &key));
            push_def(heap, new_id, key, declared_type, body);
            Ok(())
        }
        Lowered::Entry { key, body } => {
            if !matches!(kind, ObjectKind::Dynamic | ObjectKind::Mapping) {
                return Err(EvalError::CannotAmend { reason: "entry members are only valid on Mapping/Dynamic".into() });
            }
            let member_key = MemberKey::Entry(key);
            if !declared_keys.insert(member_key.clone()) {
                return Err(EvalError::DuplicateDefinition { name: ctx.describe_key(&member_key) });
            }
            let declared_type = inherited_type(heap, new_id, &member_key);
            push_def(heap, new_id, member_key, declared_type, body);
            Ok(())
        }
        Lowered::Element { body } => {
            if !matches!(kind, ObjectKind::Dynamic | ObjectKind::Listing) {
                return Err(EvalError::CannotAmend { reason: "element members are only valid on Listing/Dynamic".into() });
            }
            let index = *next_element_index;
            *next_element_index += 1;
            push_def(heap, new_id, MemberKey::Element(index), None, body);
            Ok(())
        }
        Lowered::Replace { key, body } => {
            if !declared_keys.insert(key.clone()) {
                return Err(EvalError::DuplicateDefinition { name: ctx.describe_key(&key) });
            }
            let declared_type = inherited_type(heap, new_id, &key);
            push_def(heap, new_id, key, declared_type, body);
            Ok(())
        }
    }
}

fn push_def(heap: &mut Heap, new_id: ObjectId, key: MemberKey, declared_type: Option<crate::ast::TypeExpr>, body: Expr) {
    let mut def = MemberDef::new(
        crate::ast::SourceSpan::default(),
        crate::ast::MemberFlags::default(),
        declared_type,
        MemberBody::Expr(body),
    );
    def.owner = Some(new_id);
    heap.object_mut(new_id).push_member(key, MemberSlot::new(def));
}

/// Assigning at an amend site still type-checks against the property's
/// original declared type (§4.F second bullet): if the seeded (inherited)
/// def for this key already carries a declared type, the overlay inherits
/// it when it doesn't redeclare one of its own.
fn inherited_type(heap: &Heap, object: ObjectId, key: &MemberKey) -> Option<crate::ast::TypeExpr> {
    heap.object(object).members().get(key).and_then(|slot| slot.def.declared_type.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, MemberFlags, SourceSpan};
    use crate::types::class::ClassData;

    struct NoopCtx;
    impl AmendContext for NoopCtx {
        fn eval_expr(&mut self, _heap: &mut Heap, _frame: &mut Frame, _expr: &Expr) -> RunResult<Value> {
            Ok(Value::Null)
        }
        fn visible_entries(&mut self, _heap: &mut Heap, _object: ObjectId) -> RunResult<Vec<(MemberKey, Value)>> {
            Ok(Vec::new())
        }
        fn iterate_for_generator(&mut self, _heap: &mut Heap, _value: &Value) -> RunResult<Vec<(Option<Value>, Value)>> {
            Ok(Vec::new())
        }
    }

    fn dynamic_with(heap: &mut Heap, members: Vec<(MemberKey, Expr)>) -> ObjectId {
        let class = heap.alloc_class(ClassData::synthetic("Dynamic"));
        let mut data = ObjectData::new(ObjectKind::Dynamic, class, None, None);
        for (key, expr) in members {
            let def = MemberDef::new(SourceSpan::default(), MemberFlags::default(), None, MemberBody::Expr(expr));
            data.push_member(key, MemberSlot::new(def));
        }
        heap.alloc_object(data)
    }

    #[test]
    fn amend_keeps_parent_only_keys_and_overlays_in_place() {
        let mut heap = Heap::new();
        let mut ctx = NoopCtx;
        let mut frame = Frame::new(None, None);
        let mut interns = crate::intern::Interns::new();
        let x = interns.intern("x");
        let y = interns.intern("y");
        let z = interns.intern("z");

        let parent = dynamic_with(
            &mut heap,
            vec![
                (MemberKey::Property(x), Expr::Const(Literal::Int(1))),
                (MemberKey::Property(y), Expr::Const(Literal::Int(2))),
            ],
        );

        let overlay = ObjectLiteral {
            members: vec![
                ObjectLiteralMember::Property {
                    flags: MemberFlags::default(),
                    name: y,
                    type_expr: None,
                    body: Expr::Const(Literal::Int(3)),
                    span: SourceSpan::default(),
                },
                ObjectLiteralMember::Property {
                    flags: MemberFlags::default(),
                    name: z,
                    type_expr: None,
                    body: Expr::Const(Literal::Int(4)),
                    span: SourceSpan::default(),
                },
            ],
        };

        let default_key = interns.intern("default");
        let child = amend(&mut heap, &mut ctx, &mut frame, parent, None, &overlay, default_key).unwrap();
        let keys: Vec<_> = heap.object(child).members().keys().cloned().collect();
        assert_eq!(keys, vec![MemberKey::Property(x), MemberKey::Property(y), MemberKey::Property(z)]);
    }

    #[test]
    fn entry_syntax_on_listing_is_rejected() {
        let mut heap = Heap::new();
        let mut ctx = NoopCtx;
        let mut frame = Frame::new(None, None);
        let class = heap.alloc_class(ClassData::synthetic("Listing"));
        let parent = heap.alloc_object(ObjectData::new(ObjectKind::Listing, class, None, None));
        let overlay = ObjectLiteral {
            members: vec![ObjectLiteralMember::Entry {
                flags: MemberFlags::default(),
                key: Expr::Const(Literal::Int(1)),
                body: Expr::Const(Literal::Int(1)),
                span: SourceSpan::default(),
            }],
        };
        let mut interns = crate::intern::Interns::new();
        let default_key = interns.intern("default");
        assert!(amend(&mut heap, &mut ctx, &mut frame, parent, None, &overlay, default_key).is_err());
    }
}

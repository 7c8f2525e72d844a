//! Type checker & constraints (§4.E).
//!
//! A type expression reduces to a `TypeValue`, an immutable descriptor with
//! `check`/`default` operations. Evaluating a constraint predicate or
//! building a class prototype both require running Pkl expressions — that's
//! the expression evaluator's job (§4.D) — so `TypeValue` depends on a
//! small `TypeCheckContext` trait rather than on `eval.rs` directly; `eval.rs`
//! implements it. This keeps the dependency pointed the way the component
//! diagram (§2) draws it: D invokes E, and E calls back into D only through
//! this narrow seam.

use crate::ast::Expr;
use crate::errors::{EvalError, RunResult};
use crate::heap::{ClassId, Heap, TypeAliasId};
use crate::value::Value;

/// The five stdlib classes `spec.md` §4.E allows as a parameterized type's
/// base (`List<E>`, `Map<K,V>`, `Listing<E>`, `Mapping<K,V>`, `Set<E>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ParamBase {
    List,
    Set,
    Map,
    Listing,
    Mapping,
}

/// Callback seam E uses to run Pkl expressions (constraint predicates,
/// class-prototype construction) without owning the evaluator.
pub trait TypeCheckContext {
    /// Evaluates `predicate` with `this` bound to `subject` in the
    /// `custom-this` auxiliary scope (§4.C, §4.E).
    fn eval_predicate(&mut self, heap: &mut Heap, predicate: &Expr, subject: &Value) -> RunResult<bool>;

    /// Returns (building it if necessary) the prototype instance of
    /// `class`, or `None` if the class is abstract and has no concrete
    /// default (§4.E "Class C" row).
    fn class_prototype(&mut self, heap: &mut Heap, class: ClassId) -> RunResult<Option<Value>>;

    /// An empty `Dynamic`, used as the default parent when a declared type
    /// has no default of its own (§4.D "Infer parent").
    fn empty_dynamic(&mut self, heap: &mut Heap) -> Value;

    /// The canonical empty collection for a parameterized stdlib base
    /// (§4.E "Parameterized class" row: "default: empty collection").
    /// `type_args` are the resolved type arguments (`<Int>`, `<String,
    /// Int>`, ...); for `Listing`/`Mapping` the implementation attaches the
    /// element/entry-value type to the returned object so later forces can
    /// check it (§4.E "element/entry types are attached to the result
    /// value and checked on future reads").
    fn empty_collection(&mut self, heap: &mut Heap, base: ParamBase, type_args: &[TypeValue]) -> Value;
}

/// An immutable type descriptor (§4.E table).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum TypeValue {
    Unknown,
    Nothing,
    Class(ClassId),
    StringLiteral(String),
    Nullable(Box<TypeValue>),
    Union(Vec<TypeValue>),
    Constrained(Box<TypeValue>, Vec<Expr>),
    Alias(TypeAliasId),
    /// e.g. `List<Int>`: the parameterized base class plus its type
    /// arguments, attached to values of this type so that element/entry
    /// reads can be checked lazily (§4.E "does not eagerly check every
    /// element").
    Parameterized(ParamBase, Vec<TypeValue>),
}

/// A resolved type alias: its aliased type, and — when the alias is
/// enum-representable — the closed set of string literals it accepts
/// (§4.E "Alias" row).
#[derive(Debug, Clone)]
pub struct TypeAliasData {
    pub qualified_name: String,
    pub module_uri: String,
    pub target: TypeValue,
    pub enum_variants: Option<Vec<String>>,
}

impl TypeValue {
    /// Checks `v` against this type, in a `custom-this`-aware `ctx`.
    pub fn check(
        &self,
        v: &Value,
        heap: &mut Heap,
        ctx: &mut dyn TypeCheckContext,
        aliases: &impl Fn(TypeAliasId) -> TypeAliasData,
    ) -> RunResult<()> {
        match self {
            Self::Unknown => Ok(()),
            Self::Nothing => Err(EvalError::TypeMismatch { expected: "Nothing".into(), found: v.type_name(heap) }),
            Self::Class(class_id) => {
                if v.is_instance_of(*class_id, heap) {
                    Ok(())
                } else {
                    Err(EvalError::TypeMismatch {
                        expected: heap.class(*class_id).qualified_name.clone(),
                        found: v.type_name(heap),
                    })
                }
            }
            Self::StringLiteral(lit) => match v {
                Value::String(s) if s.as_ref() == lit.as_str() => Ok(()),
                _ => Err(EvalError::TypeMismatch { expected: format!("\"{lit}\""), found: v.type_name(heap) }),
            },
            Self::Nullable(inner) => {
                if matches!(v, Value::Null) {
                    Ok(())
                } else {
                    inner.check(v, heap, ctx, aliases)
                }
            }
            Self::Union(members) => {
                let mut last_err = None;
                for member in members {
                    match member.check(v, heap, ctx, aliases) {
                        Ok(()) => return Ok(()),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(last_err.unwrap_or_else(|| EvalError::TypeMismatch {
                    expected: "union".into(),
                    found: v.type_name(heap),
                }))
            }
            Self::Constrained(base, preds) => {
                base.check(v, heap, ctx, aliases)?;
                for pred in preds {
                    if !ctx.eval_predicate(heap, pred, v)? {
                        return Err(EvalError::ConstraintViolation { found: v.type_name(heap) });
                    }
                }
                Ok(())
            }
            Self::Alias(alias_id) => {
                let alias = aliases(*alias_id);
                if let Some(variants) = &alias.enum_variants {
                    return match v {
                        Value::String(s) if variants.iter().any(|variant| variant == s.as_ref()) => Ok(()),
                        _ => Err(EvalError::TypeMismatch { expected: alias.qualified_name, found: v.type_name(heap) }),
                    };
                }
                alias.target.check(v, heap, ctx, aliases)
            }
            Self::Parameterized(_, _) => Ok(()), // element/entry types are attached, not eagerly checked here
        }
    }

    /// Computes this type's default value, per the §4.E table. `None` means
    /// "no default" (e.g. `unknown`, `nothing`, an abstract class).
    pub fn default(
        &self,
        heap: &mut Heap,
        ctx: &mut dyn TypeCheckContext,
        aliases: &impl Fn(TypeAliasId) -> TypeAliasData,
    ) -> RunResult<Option<Value>> {
        match self {
            Self::Unknown | Self::Nothing => Ok(None),
            Self::Class(class_id) => ctx.class_prototype(heap, *class_id),
            Self::StringLiteral(lit) => Ok(Some(Value::from(lit.as_str()))),
            Self::Nullable(_) => Ok(Some(Value::Null)),
            Self::Union(members) => {
                for member in members {
                    if let Some(default) = member.default(heap, ctx, aliases)? {
                        return Ok(Some(default));
                    }
                }
                Ok(None)
            }
            Self::Constrained(base, preds) => {
                let Some(default) = base.default(heap, ctx, aliases)? else {
                    return Ok(None);
                };
                for pred in preds {
                    if !ctx.eval_predicate(heap, pred, &default)? {
                        return Ok(None);
                    }
                }
                Ok(Some(default))
            }
            Self::Alias(alias_id) => aliases(*alias_id).target.default(heap, ctx, aliases),
            Self::Parameterized(base, args) => Ok(Some(ctx.empty_collection(heap, *base, args))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    struct NoopCtx;
    impl TypeCheckContext for NoopCtx {
        fn eval_predicate(&mut self, _heap: &mut Heap, _predicate: &Expr, _subject: &Value) -> RunResult<bool> {
            Ok(true)
        }
        fn class_prototype(&mut self, _heap: &mut Heap, _class: ClassId) -> RunResult<Option<Value>> {
            Ok(None)
        }
        fn empty_dynamic(&mut self, _heap: &mut Heap) -> Value {
            Value::Null
        }
        fn empty_collection(&mut self, _heap: &mut Heap, _base: ParamBase, _type_args: &[TypeValue]) -> Value {
            Value::Null
        }
    }

    #[test]
    fn nullable_accepts_null() {
        let mut heap = Heap::new();
        let mut ctx = NoopCtx;
        let ty = TypeValue::Nullable(Box::new(TypeValue::Unknown));
        assert!(ty.check(&Value::Null, &mut heap, &mut ctx, &|_| unreachable!()).is_ok());
    }

    #[test]
    fn string_literal_type_rejects_mismatched_string() {
        let mut heap = Heap::new();
        let mut ctx = NoopCtx;
        let ty = TypeValue::StringLiteral("yes".into());
        assert!(ty.check(&Value::from("no"), &mut heap, &mut ctx, &|_| unreachable!()).is_err());
        assert!(ty.check(&Value::from("yes"), &mut heap, &mut ctx, &|_| unreachable!()).is_ok());
    }

    #[test]
    fn union_tries_left_to_right() {
        let mut heap = Heap::new();
        let mut ctx = NoopCtx;
        let ty = TypeValue::Union(vec![TypeValue::StringLiteral("a".into()), TypeValue::Unknown]);
        assert!(ty.check(&Value::Int(1), &mut heap, &mut ctx, &|_| unreachable!()).is_ok());
    }
}

//! Expression evaluator and module entry point (§4.D).
//!
//! `Evaluator` is the concrete type the rest of the crate only knows through
//! two narrow seams: `TypeCheckContext` (types/type_value.rs, "E calls back
//! into D only through this narrow seam") and `AmendContext` (amend.rs, same
//! shape). It owns the things that persist across one evaluation — interned
//! strings, the class/type-alias registries named in §4.H, the call stack
//! §7 attaches to diagnostics, the injected collaborators from
//! `EvaluatorOptions` — but never the `Heap` itself, which every method takes
//! as an explicit parameter, matching how `amend()` and `TypeValue::check`
//! are already shaped.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::amend::{self, AmendContext};
use crate::ast::{
    BinaryOp, ClassDecl, Expr, Literal, MethodDispatch, ModuleDecl, ReadKind, SourceSpan, TypeAliasDecl, TypeExpr,
    UnaryOp,
};
use crate::config::EvaluatorOptions;
use crate::errors::{EvalError, RunResult, StackFrame};
use crate::frame::{self, AuxSlot, Frame};
use crate::function;
use crate::heap::{ClassId, Heap, ObjectId, TypeAliasId};
use crate::intern::{Interns, StringId};
use crate::member::{ForceState, MemberBody, MemberDef, MemberKey, MemberSlot};
use crate::object::{ObjectData, ObjectKind};
use crate::resource::{LimitedTracker, ResourceTracker};
use crate::types::bytes::BytesData;
use crate::types::class::{ClassData, Property};
use crate::types::datasize::data_size_to_bytes;
use crate::types::duration::duration_to_nanos;
use crate::types::list::ListData;
use crate::types::map::MapData;
use crate::types::set::SetData;
use crate::types::type_value::{ParamBase, TypeAliasData, TypeCheckContext, TypeValue};
use crate::value::Value;

/// Drives one evaluation. Built once per top-level `evaluate()` call (§6);
/// `register_module` is called once per module in the import graph before
/// any of its members are forced.
pub struct Evaluator {
    interns: Interns,
    options: EvaluatorOptions,
    resource_tracker: Box<dyn ResourceTracker>,
    call_stack: Vec<StackFrame>,
    module_uri: String,
    class_by_name: AHashMap<StringId, ClassId>,
    alias_by_name: AHashMap<StringId, TypeAliasId>,
    /// Mirrors `Heap`'s alias arena index-for-index (§4.H): `TypeValue::check`/
    /// `default` need an `aliases` lookup closure that doesn't hold a
    /// conflicting borrow of `Heap` or `self` while the type checker itself
    /// holds `&mut Heap`/`&mut dyn TypeCheckContext`, so alias data is kept
    /// here too, behind an `Rc` cheap to clone into that closure.
    aliases: Rc<Vec<TypeAliasData>>,
    dynamic_class: ClassId,
    listing_class: ClassId,
    mapping_class: ClassId,
    /// The interned `"default"` identifier (§3 "Default member"), passed
    /// into `amend::amend` so it can recognize the reserved property name
    /// on a Mapping/Listing overlay without needing its own `Interns` access.
    default_key: StringId,
}

impl Evaluator {
    #[must_use]
    pub fn new(heap: &mut Heap, options: EvaluatorOptions, mut interns: Interns, module_uri: impl Into<String>) -> Self {
        let resource_tracker: Box<dyn ResourceTracker> = Box::new(LimitedTracker::new(options.limits.clone()));
        let dynamic_class = heap.alloc_class(ClassData::synthetic("Dynamic"));
        let listing_class = heap.alloc_class(ClassData::synthetic("Listing"));
        let mapping_class = heap.alloc_class(ClassData::synthetic("Mapping"));
        let default_key = interns.intern("default");
        Self {
            interns,
            options,
            resource_tracker,
            call_stack: Vec::new(),
            module_uri: module_uri.into(),
            class_by_name: AHashMap::new(),
            alias_by_name: AHashMap::new(),
            aliases: Rc::new(Vec::new()),
            dynamic_class,
            listing_class,
            mapping_class,
            default_key,
        }
    }

    #[must_use]
    pub fn call_stack(&self) -> &[StackFrame] {
        &self.call_stack
    }

    #[must_use]
    pub fn interns(&self) -> &Interns {
        &self.interns
    }

    pub fn interns_mut(&mut self) -> &mut Interns {
        &mut self.interns
    }

    /// Registers one module's classes, type aliases, and top-level
    /// properties/methods, and returns the `Module`-kind object standing in
    /// for it (§3, §4.H). Cross-module superclass/alias references are out
    /// of scope here — that requires the module-loading graph an embedder
    /// builds on top of this evaluator, so both passes below only resolve
    /// names declared in the same `ModuleDecl` (documented in DESIGN.md).
    pub fn register_module(&mut self, heap: &mut Heap, module: &ModuleDecl) -> RunResult<ObjectId> {
        let stub_ids = self.register_class_stubs(heap, &module.classes);
        self.fill_classes(heap, &module.classes, &stub_ids)?;
        self.register_type_aliases(heap, &module.type_aliases)?;

        let mut module_class = ClassData::new(format!("module:{}", module.uri), module.uri.clone());
        module_class.open = true;
        module_class.properties = module.properties.iter().map(|p| self.lower_property(p)).collect();
        module_class.methods = module.methods.clone();
        let module_class_id = heap.alloc_class(module_class);

        let module_id = heap.alloc_object(ObjectData::new(ObjectKind::Module, module_class_id, None, None));
        for prop in &module.properties {
            let mut def = MemberDef::new(
                prop.span,
                prop.flags,
                prop.type_expr.clone(),
                MemberBody::Expr(prop.default.clone().unwrap_or(Expr::Const(Literal::Null))),
            );
            def.owner = Some(module_id);
            heap.object_mut(module_id).push_member(MemberKey::Property(prop.name), MemberSlot::new(def));
        }
        Ok(module_id)
    }

    fn register_class_stubs(&mut self, heap: &mut Heap, decls: &[ClassDecl]) -> Vec<ClassId> {
        let mut ids = Vec::with_capacity(decls.len());
        for decl in decls {
            let name_id = self.interns.intern(&decl.name);
            let id = heap.alloc_class(ClassData::new(decl.name.clone(), decl.module_uri.clone()));
            self.class_by_name.insert(name_id, id);
            ids.push(id);
        }
        ids
    }

    fn fill_classes(&mut self, heap: &mut Heap, decls: &[ClassDecl], ids: &[ClassId]) -> RunResult<()> {
        for (decl, &id) in decls.iter().zip(ids) {
            let superclass = match decl.superclass {
                Some(name) => Some(self.lookup_class(name)?),
                None => None,
            };
            let properties: Vec<Property> = decl.properties.iter().map(|p| self.lower_property(p)).collect();
            let class = heap.class_mut(id);
            class.open = decl.open;
            class.abstract_ = decl.abstract_;
            class.superclass = superclass;
            class.properties = properties;
            class.methods = decl.methods.clone();
            class.type_params = decl.type_params.clone();
            class.doc = decl.doc.clone();
            class.annotations = decl.annotations.clone();
        }
        Ok(())
    }

    fn lower_property(&self, decl: &crate::ast::PropertyDecl) -> Property {
        Property {
            name: decl.name,
            type_expr: decl.type_expr.clone(),
            default: decl.default.clone(),
            hidden: decl.flags.hidden,
            span: decl.span,
            doc: decl.doc.clone(),
            annotations: decl.annotations.clone(),
        }
    }

    fn register_type_aliases(&mut self, heap: &mut Heap, decls: &[TypeAliasDecl]) -> RunResult<()> {
        let mut data = (*self.aliases).clone();
        for decl in decls {
            let target = self.resolve_type(&decl.target)?;
            let enum_variants = string_literal_union(&decl.target);
            let alias_data =
                TypeAliasData { qualified_name: decl.name.clone(), module_uri: decl.module_uri.clone(), target, enum_variants };
            let id = heap.alloc_alias(alias_data.clone());
            let name_id = self.interns.intern(&decl.name);
            self.alias_by_name.insert(name_id, id);
            data.push(alias_data);
        }
        self.aliases = Rc::new(data);
        Ok(())
    }

    /// Forces every member of `object`, materializing it fully (§9: the
    /// top-level `evaluate()` result is the fully-forced module object, not
    /// a lazily-forceable handle).
    pub fn force_all(&mut self, heap: &mut Heap, object: ObjectId) -> RunResult<()> {
        let keys: Vec<MemberKey> = heap.object(object).members().keys().cloned().collect();
        for key in keys {
            self.force(heap, object, &key)?;
        }
        Ok(())
    }

    fn lookup_class(&self, name: StringId) -> RunResult<ClassId> {
        self.class_by_name
            .get(&name)
            .copied()
            .ok_or_else(|| EvalError::Eval { message: format!("unknown class `{}`", self.interns.get(name)) })
    }

    fn lookup_alias(&self, name: StringId) -> RunResult<TypeAliasId> {
        self.alias_by_name
            .get(&name)
            .copied()
            .ok_or_else(|| EvalError::Eval { message: format!("unknown type alias `{}`", self.interns.get(name)) })
    }

    fn resolve_type(&self, type_expr: &TypeExpr) -> RunResult<TypeValue> {
        Ok(match type_expr {
            TypeExpr::Unknown => TypeValue::Unknown,
            TypeExpr::Nothing => TypeValue::Nothing,
            TypeExpr::Class(name) => TypeValue::Class(self.lookup_class(*name)?),
            TypeExpr::StringLiteral(s) => TypeValue::StringLiteral(s.clone()),
            TypeExpr::Nullable(inner) => TypeValue::Nullable(Box::new(self.resolve_type(inner)?)),
            TypeExpr::Union(members) => {
                let mut out = Vec::with_capacity(members.len());
                for m in members {
                    out.push(self.resolve_type(m)?);
                }
                TypeValue::Union(out)
            }
            TypeExpr::Constrained(base, preds) => TypeValue::Constrained(Box::new(self.resolve_type(base)?), preds.clone()),
            TypeExpr::Alias(name) => TypeValue::Alias(self.lookup_alias(*name)?),
            TypeExpr::Parameterized(base, args) => {
                let mut out = Vec::with_capacity(args.len());
                for a in args {
                    out.push(self.resolve_type(a)?);
                }
                TypeValue::Parameterized(*base, out)
            }
        })
    }

    fn check_type(&mut self, heap: &mut Heap, type_expr: &TypeExpr, value: &Value) -> RunResult<()> {
        let tv = self.resolve_type(type_expr)?;
        self.check_type_value(heap, &tv, value)
    }

    /// Checks an already-resolved `TypeValue`, as opposed to [`check_type`]'s
    /// `TypeExpr`. Used both by `check_type` and directly by `force`/
    /// `force_default` for a Listing/Mapping's attached element/entry type
    /// (§4.E "Parameterized class" row), which is stored as a `TypeValue` on
    /// `ObjectData` rather than re-resolved from a `TypeExpr` each force.
    fn check_type_value(&mut self, heap: &mut Heap, tv: &TypeValue, value: &Value) -> RunResult<()> {
        let aliases = Rc::clone(&self.aliases);
        let lookup = move |id: TypeAliasId| aliases[id.index()].clone();
        tv.check(value, heap, self, &lookup)
    }

    fn default_of(&mut self, heap: &mut Heap, type_expr: &TypeExpr) -> RunResult<Option<Value>> {
        let tv = self.resolve_type(type_expr)?;
        let aliases = Rc::clone(&self.aliases);
        let lookup = move |id: TypeAliasId| aliases[id.index()].clone();
        tv.default(heap, self, &lookup)
    }

    fn describe_key(&self, key: &MemberKey) -> String {
        match key {
            MemberKey::Property(id) => self.interns.get(*id).to_string(),
            MemberKey::Entry(v) => format!("[{v}]"),
            MemberKey::Element(i) => i.to_string(),
        }
    }

    /// The force algorithm (§4.B): memoized lookup, cycle detection via
    /// `ForceState`, frame push on entry (left in place on error, per
    /// `errors.rs`'s documented unwind design), then the declared-type check
    /// on a successful result before caching.
    pub fn force(&mut self, heap: &mut Heap, object: ObjectId, key: &MemberKey) -> RunResult<Value> {
        if let Some(cached) = heap.object(object).members().get(key).and_then(|slot| slot.cached.clone()) {
            return Ok(cached);
        }
        if !heap.object(object).members().contains_key(key) {
            if let Some(default_def) = heap.object(object).default_member().cloned() {
                return self.force_default(heap, object, key, default_def);
            }
            return Err(EvalError::MissingKey { key: self.describe_key(key) });
        }

        match heap.object(object).members()[key].state {
            ForceState::InProgress => return Err(EvalError::CircularReference { key: self.describe_key(key) }),
            ForceState::Forced => unreachable!("cache check above already returned"),
            ForceState::Unforced => {}
        }

        self.resource_tracker.on_force().map_err(EvalError::from)?;
        self.resource_tracker.check_time().map_err(EvalError::from)?;
        self.resource_tracker.check_recursion_depth(self.call_stack.len()).map_err(EvalError::from)?;

        heap.object_mut(object).members_mut().get_mut(key).expect("checked above").state = ForceState::InProgress;
        let def = heap.object(object).members()[key].def.clone();
        let owner = def.owner.unwrap_or(object);

        let module_uri = self.module_uri.clone();
        self.call_stack.push(StackFrame { module_uri, member: self.describe_key(key), span: def.span });

        let mut member_frame = Frame::new(Some(object), Some(owner));
        let result = match &def.body {
            MemberBody::Value(v) => Ok(v.clone()),
            MemberBody::Expr(expr) => self.eval(heap, &mut member_frame, expr),
        };
        let result = result.and_then(|v| {
            if let Some(declared_type) = def.declared_type.clone() {
                self.check_type(heap, &declared_type, &v)?;
            }
            if matches!(key, MemberKey::Element(_) | MemberKey::Entry(_)) {
                if let Some(element_type) = heap.object(object).element_type().cloned() {
                    self.check_type_value(heap, &element_type, &v)?;
                }
            }
            Ok(v)
        });

        match result {
            Ok(value) => {
                self.call_stack.pop();
                let slot = heap.object_mut(object).members_mut().get_mut(key).expect("checked above");
                slot.state = ForceState::Forced;
                slot.cached = Some(value.clone());
                self.options.tracer.borrow_mut().on_force(owner.index() as u32, &self.describe_key(key), self.call_stack.len());
                Ok(value)
            }
            Err(e) => {
                self.options.tracer.borrow_mut().on_error(&e.to_string());
                Err(e)
            }
        }
    }

    /// Resolves a missing entry/element via the object's `default` member
    /// (§4.B step 3, §3 "Default member"): evaluates the generator
    /// expression (typically a lambda literal) and, if it is a `Function`,
    /// invokes it with the missing key as its sole argument; a non-function
    /// default value applies uniformly to every missing key.
    fn force_default(&mut self, heap: &mut Heap, object: ObjectId, key: &MemberKey, default_def: MemberDef) -> RunResult<Value> {
        self.resource_tracker.on_force().map_err(EvalError::from)?;
        self.resource_tracker.check_time().map_err(EvalError::from)?;
        let owner = default_def.owner.unwrap_or(object);
        let mut member_frame = Frame::new(Some(object), Some(owner));
        let generator = match &default_def.body {
            MemberBody::Value(v) => v.clone(),
            MemberBody::Expr(expr) => self.eval(heap, &mut member_frame, expr)?,
        };
        let key_value = match key {
            MemberKey::Entry(v) => v.clone(),
            MemberKey::Element(i) => Value::Int(*i as i64),
            MemberKey::Property(_) => return Err(EvalError::MissingKey { key: self.describe_key(key) }),
        };
        let value = match generator {
            Value::Function(f) => self.invoke_closure(heap, f, vec![key_value])?,
            other => other,
        };
        if let Some(element_type) = heap.object(object).element_type().cloned() {
            self.check_type_value(heap, &element_type, &value)?;
        }
        heap.object_mut(object).push_member(
            key.clone(),
            MemberSlot { def: default_def, state: ForceState::Forced, cached: Some(value.clone()) },
        );
        Ok(value)
    }

    fn resolve_method(&self, heap: &Heap, start_class: ClassId, name: StringId) -> Option<(ClassId, crate::ast::MethodDecl)> {
        let mut current = Some(start_class);
        while let Some(class_id) = current {
            if let Some(method) = heap.class(class_id).method(name) {
                return Some((class_id, method.clone()));
            }
            current = heap.class(class_id).superclass;
        }
        None
    }

    fn invoke_user_method(
        &mut self,
        heap: &mut Heap,
        receiver: ObjectId,
        start_class: ClassId,
        name: StringId,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> RunResult<Value> {
        let (owner_class, method) = self
            .resolve_method(heap, start_class, name)
            .ok_or_else(|| EvalError::Eval { message: format!("no method named `{}`", self.interns.get(name)) })?;
        let bound = function::bind_arguments(&method.params, args)?;
        self.resource_tracker.check_recursion_depth(self.call_stack.len()).map_err(EvalError::from)?;

        let module_uri = heap.class(owner_class).module_uri.clone();
        self.call_stack.push(StackFrame { module_uri, member: self.interns.get(name).to_string(), span: method.span });

        let mut method_frame = Frame::with_arguments(Some(receiver), Some(receiver), bound);
        let result = self.eval(heap, &mut method_frame, &method.body);
        let result = result.and_then(|v| {
            if let Some(return_type) = method.return_type.clone() {
                self.check_type(heap, &return_type, &v)?;
            }
            Ok(v)
        });
        let _ = span;
        match result {
            Ok(v) => {
                self.call_stack.pop();
                Ok(v)
            }
            Err(e) => Err(e),
        }
    }

    fn invoke_closure(&mut self, heap: &mut Heap, f: Rc<crate::value::FunctionData>, args: Vec<Value>) -> RunResult<Value> {
        let bound = function::bind_arguments(&f.params, args)?;
        self.resource_tracker.check_recursion_depth(self.call_stack.len()).map_err(EvalError::from)?;
        let module_uri = self.module_uri.clone();
        self.call_stack.push(StackFrame { module_uri, member: "<function>".to_string(), span: SourceSpan::default() });
        let mut call_frame = Frame::with_arguments(None, f.enclosing, bound);
        let result = self.eval(heap, &mut call_frame, &f.body);
        if result.is_ok() {
            self.call_stack.pop();
        }
        result
    }

    /// A narrow, explicitly-scoped stdlib method surface. Full coverage of
    /// the standard library is out of scope (§1, mirroring how `interfaces.rs`
    /// treats surface code generation) — this only implements the one
    /// operation every collection-ish value shares.
    fn invoke_builtin_method(&self, heap: &Heap, receiver: &Value, name: StringId, span: SourceSpan) -> RunResult<Value> {
        match (receiver, self.interns.get(name)) {
            (Value::String(s), "length") => Ok(Value::Int(s.chars().count() as i64)),
            (Value::List(items), "length") => Ok(Value::Int(items.len() as i64)),
            (Value::Set(items), "length") => Ok(Value::Int(items.len() as i64)),
            (Value::Map(entries), "length") => Ok(Value::Int(entries.len() as i64)),
            (Value::Bytes(b), "length") => Ok(Value::Int(b.as_slice().len() as i64)),
            _ => Err(EvalError::internal_bug(
                format!("unsupported built-in method `{}` on `{}`", self.interns.get(name), receiver.type_name(heap)),
                span,
            )),
        }
    }

    fn binary_type_mismatch(&self, heap: &Heap, op: &str, l: &Value, r: &Value) -> EvalError {
        EvalError::TypeMismatch {
            expected: format!("operands compatible with `{op}`"),
            found: format!("{} and {}", l.type_name(heap), r.type_name(heap)),
        }
    }

    fn as_f64_pair(&self, heap: &Heap, l: &Value, r: &Value, op: &str) -> RunResult<(f64, f64)> {
        let a = match l {
            Value::Int(a) => *a as f64,
            Value::Float(a) => *a,
            _ => return Err(self.binary_type_mismatch(heap, op, l, r)),
        };
        let b = match r {
            Value::Int(b) => *b as f64,
            Value::Float(b) => *b,
            _ => return Err(self.binary_type_mismatch(heap, op, l, r)),
        };
        Ok((a, b))
    }

    fn apply_comparison(&self, heap: &Heap, op: BinaryOp, l: &Value, r: &Value) -> RunResult<Value> {
        use std::cmp::Ordering;
        let ordering = match (l, r) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.as_ref().cmp(b.as_ref())),
            (Value::Duration { value: av, unit: au }, Value::Duration { value: bv, unit: bu }) => {
                duration_to_nanos(*av, *au).partial_cmp(&duration_to_nanos(*bv, *bu))
            }
            (Value::DataSize { value: av, unit: au }, Value::DataSize { value: bv, unit: bu }) => {
                data_size_to_bytes(*av, *au).partial_cmp(&data_size_to_bytes(*bv, *bu))
            }
            _ => return Err(self.binary_type_mismatch(heap, "comparison", l, r)),
        };
        let ordering = ordering.ok_or_else(|| EvalError::Eval { message: "comparison produced no ordering".into() })?;
        let result = match op {
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::Le => ordering != Ordering::Greater,
            BinaryOp::Gt => ordering == Ordering::Greater,
            BinaryOp::Ge => ordering != Ordering::Less,
            _ => unreachable!("only comparison ops reach here"),
        };
        Ok(Value::Bool(result))
    }

    fn apply_binary(&mut self, heap: &mut Heap, op: BinaryOp, l: Value, r: Value, _span: SourceSpan) -> RunResult<Value> {
        use BinaryOp::{Add, Div, Eq, Ge, Gt, IntDiv, Le, Lt, Mul, Ne, Pow, Rem, Sub};
        match op {
            Eq => Ok(Value::Bool(l.structural_eq(&r))),
            Ne => Ok(Value::Bool(!l.structural_eq(&r))),
            Add => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => {
                    a.checked_add(*b).map(Value::Int).ok_or_else(|| EvalError::IntegerOverflow { op: "+".into() })
                }
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
                (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
                (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
                (Value::String(a), Value::String(b)) => Ok(Value::from(format!("{a}{b}"))),
                (Value::List(a), Value::List(b)) => {
                    let mut items: Vec<Value> = a.iter().cloned().collect();
                    items.extend(b.iter().cloned());
                    Ok(Value::List(Rc::new(ListData::new(items))))
                }
                _ => Err(self.binary_type_mismatch(heap, "+", &l, &r)),
            },
            Sub => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => {
                    a.checked_sub(*b).map(Value::Int).ok_or_else(|| EvalError::IntegerOverflow { op: "-".into() })
                }
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
                (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 - b)),
                (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a - *b as f64)),
                _ => Err(self.binary_type_mismatch(heap, "-", &l, &r)),
            },
            Mul => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => {
                    a.checked_mul(*b).map(Value::Int).ok_or_else(|| EvalError::IntegerOverflow { op: "*".into() })
                }
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
                (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 * b)),
                (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a * *b as f64)),
                _ => Err(self.binary_type_mismatch(heap, "*", &l, &r)),
            },
            Div => {
                let (a, b) = self.as_f64_pair(heap, &l, &r, "/")?;
                Ok(Value::Float(a / b))
            }
            IntDiv => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => {
                    if *b == 0 {
                        return Err(EvalError::Eval { message: "division by zero in `~/`".into() });
                    }
                    a.checked_div(*b).map(Value::Int).ok_or_else(|| EvalError::IntegerOverflow { op: "~/".into() })
                }
                _ => Err(self.binary_type_mismatch(heap, "~/", &l, &r)),
            },
            Rem => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => {
                    if *b == 0 {
                        return Err(EvalError::Eval { message: "division by zero in `%`".into() });
                    }
                    a.checked_rem(*b).map(Value::Int).ok_or_else(|| EvalError::IntegerOverflow { op: "%".into() })
                }
                (Value::Float(_), _) | (_, Value::Float(_)) => {
                    let (a, b) = self.as_f64_pair(heap, &l, &r, "%")?;
                    Ok(Value::Float(a % b))
                }
                _ => Err(self.binary_type_mismatch(heap, "%", &l, &r)),
            },
            Pow => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) if *b >= 0 && *b <= i64::from(u32::MAX) => match a.checked_pow(*b as u32) {
                    Some(v) => Ok(Value::Int(v)),
                    None => Ok(Value::Float((*a as f64).powf(*b as f64))),
                },
                _ => {
                    let (a, b) = self.as_f64_pair(heap, &l, &r, "**")?;
                    Ok(Value::Float(a.powf(b)))
                }
            },
            Lt | Le | Gt | Ge => self.apply_comparison(heap, op, &l, &r),
            BinaryOp::And | BinaryOp::Or | BinaryOp::NullCoalesce => unreachable!("short-circuit ops handled by caller"),
        }
    }

    /// Evaluates one expression node (§4.D). The single entry point every
    /// other operation in this module funnels through.
    pub fn eval(&mut self, heap: &mut Heap, frame: &mut Frame, expr: &Expr) -> RunResult<Value> {
        self.resource_tracker.check_time().map_err(EvalError::from)?;
        match expr {
            Expr::Const(lit) => Ok(match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::String(s) => Value::from(s.as_str()),
            }),
            Expr::This => {
                if let Some(v) = frame.custom_this() {
                    return Ok(v.clone());
                }
                let id = frame.receiver.ok_or_else(|| EvalError::internal_bug("`this` with no receiver", SourceSpan::default()))?;
                Ok(Value::Object(id))
            }
            Expr::ReadProperty { receiver, name, needs_const, span } => {
                let recv_id = match receiver {
                    Some(e) => match self.eval(heap, frame, e)? {
                        Value::Object(id) => id,
                        other => {
                            return Err(EvalError::TypeMismatch {
                                expected: "an object-like value".into(),
                                found: other.type_name(heap),
                            });
                        }
                    },
                    None => frame.receiver.ok_or_else(|| EvalError::internal_bug("property read with no receiver", *span))?,
                };
                let key = MemberKey::Property(*name);
                if *needs_const {
                    let is_const = heap.object(recv_id).members().get(&key).map(|s| s.def.flags.const_).unwrap_or(false);
                    if !is_const {
                        return Err(EvalError::ConstRequired { name: self.interns.get(*name).to_string() });
                    }
                }
                self.force(heap, recv_id, &key).map_err(|e| match e {
                    EvalError::MissingKey { .. } => EvalError::MissingProperty { name: self.interns.get(*name).to_string() },
                    other => other,
                })
            }
            Expr::ReadLocalProperty { ident, span } => {
                if let Some(v) = frame.for_generator_var(ident.name) {
                    return Ok(v.clone());
                }
                if ident.levels_up == 0 {
                    if let Some(v) = frame.arguments.get(&ident.name) {
                        return Ok(v.clone());
                    }
                }
                let start = frame.owner.ok_or_else(|| EvalError::internal_bug("local read with no lexical owner", *span))?;
                let target = frame::walk_enclosing(heap, start, ident.levels_up);
                self.force(heap, target, &MemberKey::Property(ident.name))
            }
            Expr::ReadSuperProperty { name, span } => {
                let recv_id = frame.receiver.ok_or_else(|| EvalError::internal_bug("super read with no receiver", *span))?;
                let owner_id = frame.owner.unwrap_or(recv_id);
                let parent = heap
                    .object(owner_id)
                    .parent()
                    .ok_or_else(|| EvalError::Eval { message: "no parent for `super` property access".into() })?;
                self.force(heap, parent, &MemberKey::Property(*name))
            }
            Expr::ReadSuperEntry { key, span } => {
                let recv_id = frame.receiver.ok_or_else(|| EvalError::internal_bug("super entry with no receiver", *span))?;
                let owner_id = frame.owner.unwrap_or(recv_id);
                let parent = heap
                    .object(owner_id)
                    .parent()
                    .ok_or_else(|| EvalError::Eval { message: "no parent for `super` entry access".into() })?;
                let key_val = self.eval(heap, frame, key)?;
                self.force(heap, parent, &MemberKey::Entry(key_val))
            }
            Expr::Subscript { object, key, span: _ } => {
                let obj_val = self.eval(heap, frame, object)?;
                let key_val = self.eval(heap, frame, key)?;
                match &obj_val {
                    Value::List(items) => {
                        let idx = key_val
                            .as_int()
                            .ok_or_else(|| EvalError::TypeMismatch { expected: "Int".into(), found: key_val.type_name(heap) })?;
                        usize::try_from(idx)
                            .ok()
                            .and_then(|i| items.get(i))
                            .cloned()
                            .ok_or_else(|| EvalError::Eval { message: format!("index {idx} out of range") })
                    }
                    Value::Map(entries) => {
                        entries.get(&key_val).cloned().ok_or_else(|| EvalError::MissingKey { key: key_val.to_string() })
                    }
                    Value::Object(id) => match heap.object(*id).kind() {
                        ObjectKind::Listing => {
                            let idx = key_val
                                .as_int()
                                .ok_or_else(|| EvalError::TypeMismatch { expected: "Int".into(), found: key_val.type_name(heap) })?;
                            self.force(heap, *id, &MemberKey::Element(idx as u64))
                        }
                        ObjectKind::Mapping => self.force(heap, *id, &MemberKey::Entry(key_val)),
                        _ => Err(EvalError::TypeMismatch { expected: "Listing or Mapping".into(), found: obj_val.type_name(heap) }),
                    },
                    _ => Err(EvalError::TypeMismatch { expected: "an indexable value".into(), found: obj_val.type_name(heap) }),
                }
            }
            Expr::InvokeMethod { receiver, dispatch, name, args, span } => {
                let arg_values: Vec<Value> = args.iter().map(|a| self.eval(heap, frame, a)).collect::<RunResult<_>>()?;
                let recv_value = match receiver {
                    Some(e) => Some(self.eval(heap, frame, e)?),
                    None => None,
                };
                if let Some(Value::Function(f)) = &recv_value {
                    return self.invoke_closure(heap, Rc::clone(f), arg_values);
                }
                match dispatch {
                    MethodDispatch::Lexical(ident) => {
                        let start = frame.owner.ok_or_else(|| EvalError::internal_bug("lexical call with no owner", *span))?;
                        let target = frame::walk_enclosing(heap, start, ident.levels_up);
                        let class_id = heap.object(target).class();
                        self.invoke_user_method(heap, target, class_id, *name, arg_values, *span)
                    }
                    MethodDispatch::Direct | MethodDispatch::Virtual => {
                        let recv_id = match recv_value {
                            Some(Value::Object(id)) => id,
                            Some(other) => return self.invoke_builtin_method(heap, &other, *name, *span),
                            None => frame.receiver.ok_or_else(|| EvalError::internal_bug("method call with no receiver", *span))?,
                        };
                        let class_id = heap.object(recv_id).class();
                        self.invoke_user_method(heap, recv_id, class_id, *name, arg_values, *span)
                    }
                    MethodDispatch::Super => {
                        let recv_id = frame.receiver.ok_or_else(|| EvalError::internal_bug("super call with no receiver", *span))?;
                        let owner_id = frame.owner.unwrap_or(recv_id);
                        let owner_class = heap.object(owner_id).class();
                        let start = heap
                            .class(owner_class)
                            .superclass
                            .ok_or_else(|| EvalError::Eval { message: "no superclass for `super` call".into() })?;
                        self.invoke_user_method(heap, recv_id, start, *name, arg_values, *span)
                    }
                }
            }
            Expr::Amend { parent, literal, span: _ } => {
                let parent_val = self.eval(heap, frame, parent)?;
                let parent_id = match parent_val {
                    Value::Object(id) => id,
                    other => {
                        return Err(EvalError::CannotAmend { reason: format!("amend target is not object-like (`{}`)", other.type_name(heap)) });
                    }
                };
                let enclosing = heap.object(parent_id).enclosing();
                let new_id = amend::amend(heap, self, frame, parent_id, enclosing, literal, self.default_key)?;
                Ok(Value::Object(new_id))
            }
            Expr::New { type_expr, literal, span } => {
                let parent_id = match type_expr {
                    Some(te) => self.infer_parent(heap, te, *span)?,
                    None => match self.empty_dynamic(heap) {
                        Value::Object(id) => id,
                        _ => unreachable!("empty_dynamic always returns an Object"),
                    },
                };
                let enclosing = frame.owner;
                let new_id = amend::amend(heap, self, frame, parent_id, enclosing, literal, self.default_key)?;
                Ok(Value::Object(new_id))
            }
            Expr::Unary { op, operand, span: _ } => {
                let v = self.eval(heap, frame, operand)?;
                match (op, &v) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => {
                        i.checked_neg().map(Value::Int).ok_or_else(|| EvalError::IntegerOverflow { op: "unary -".into() })
                    }
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Neg, Value::Duration { value, unit }) => Ok(Value::Duration { value: -value, unit: *unit }),
                    (UnaryOp::Neg, Value::DataSize { value, unit }) => Ok(Value::DataSize { value: -value, unit: *unit }),
                    _ => Err(EvalError::TypeMismatch {
                        expected: "an operand compatible with this unary operator".into(),
                        found: v.type_name(heap),
                    }),
                }
            }
            Expr::Binary { op, left, right, span } => match op {
                BinaryOp::And => {
                    let l = self.eval(heap, frame, left)?;
                    match l {
                        Value::Bool(false) => Ok(Value::Bool(false)),
                        Value::Bool(true) => match self.eval(heap, frame, right)? {
                            Value::Bool(b) => Ok(Value::Bool(b)),
                            other => Err(EvalError::TypeMismatch { expected: "Boolean".into(), found: other.type_name(heap) }),
                        },
                        other => Err(EvalError::TypeMismatch { expected: "Boolean".into(), found: other.type_name(heap) }),
                    }
                }
                BinaryOp::Or => {
                    let l = self.eval(heap, frame, left)?;
                    match l {
                        Value::Bool(true) => Ok(Value::Bool(true)),
                        Value::Bool(false) => match self.eval(heap, frame, right)? {
                            Value::Bool(b) => Ok(Value::Bool(b)),
                            other => Err(EvalError::TypeMismatch { expected: "Boolean".into(), found: other.type_name(heap) }),
                        },
                        other => Err(EvalError::TypeMismatch { expected: "Boolean".into(), found: other.type_name(heap) }),
                    }
                }
                BinaryOp::NullCoalesce => {
                    let l = self.eval(heap, frame, left)?;
                    if matches!(l, Value::Null) {
                        self.eval(heap, frame, right)
                    } else {
                        Ok(l)
                    }
                }
                _ => {
                    let l = self.eval(heap, frame, left)?;
                    let r = self.eval(heap, frame, right)?;
                    self.apply_binary(heap, *op, l, r, *span)
                }
            },
            Expr::If { cond, then_branch, else_branch } => match self.eval(heap, frame, cond)? {
                Value::Bool(true) => self.eval(heap, frame, then_branch),
                Value::Bool(false) => self.eval(heap, frame, else_branch),
                other => Err(EvalError::TypeMismatch { expected: "Boolean".into(), found: other.type_name(heap) }),
            },
            Expr::Lambda { params, body } => {
                Ok(Value::Function(Rc::new(function::make_closure(params.clone(), (**body).clone(), frame.owner))))
            }
            Expr::Read { kind, url, span } => self.eval_read(heap, frame, *kind, url, *span),
            Expr::TypeCheck { operand, type_expr, span: _ } => {
                let v = self.eval(heap, frame, operand)?;
                self.check_type(heap, type_expr, &v)?;
                Ok(v)
            }
        }
    }

    fn eval_read(&mut self, heap: &mut Heap, frame: &mut Frame, kind: ReadKind, url: &Expr, span: SourceSpan) -> RunResult<Value> {
        let url_val = self.eval(heap, frame, url)?;
        let uri = match &url_val {
            Value::String(s) => s.to_string(),
            other => return Err(EvalError::TypeMismatch { expected: "String".into(), found: other.type_name(heap) }),
        };
        let scheme = uri.split(':').next().unwrap_or("");
        match kind {
            ReadKind::Read | ReadKind::ReadOrNull => {
                let or_null = matches!(kind, ReadKind::ReadOrNull);
                if let Err(e) = self.options.security_manager.check_read_resource(&self.module_uri, &uri) {
                    return if or_null { Ok(Value::Null) } else { Err(e) };
                }
                match self.options.resource_reader_for(scheme).cloned() {
                    Some(reader) => match reader.read(&uri) {
                        Ok(bytes) => Ok(Value::Bytes(Rc::new(BytesData::new(bytes)))),
                        Err(_) if or_null => Ok(Value::Null),
                        Err(e) => Err(e),
                    },
                    None if or_null => Ok(Value::Null),
                    None => Err(EvalError::IoError { message: format!("no resource reader registered for scheme `{scheme}`") }),
                }
            }
            ReadKind::Import | ReadKind::ImportGlob => {
                self.options.security_manager.check_import_module(&self.module_uri, &uri)?;
                let _ = span;
                Err(EvalError::Eval {
                    message: "module imports require a module-loading embedder that parses and registers the target module; \
                              this evaluator only evaluates an already-parsed `ModuleDecl`"
                        .into(),
                })
            }
        }
    }

    fn infer_parent(&mut self, heap: &mut Heap, type_expr: &TypeExpr, span: SourceSpan) -> RunResult<ObjectId> {
        match type_expr {
            TypeExpr::Class(name) => {
                let class_id = self.lookup_class(*name)?;
                match self.class_prototype(heap, class_id)? {
                    Some(Value::Object(id)) => Ok(id),
                    Some(_) => Err(EvalError::internal_bug("class prototype was not object-like", span)),
                    None => Err(EvalError::CannotInferParent { reason: format!("`{}` is abstract with no default", self.interns.get(*name)) }),
                }
            }
            TypeExpr::Parameterized(base, args) => {
                let mut resolved = Vec::with_capacity(args.len());
                for a in args {
                    resolved.push(self.resolve_type(a)?);
                }
                match self.empty_collection(heap, *base, &resolved) {
                    Value::Object(id) => Ok(id),
                    _ => Err(EvalError::CannotInferParent { reason: "a scalar collection type has no object-like parent".into() }),
                }
            }
            TypeExpr::Nullable(inner) | TypeExpr::Constrained(inner, _) => self.infer_parent(heap, inner, span),
            _ => Err(EvalError::CannotInferParent { reason: "unsupported parent type for `new`".into() }),
        }
    }
}

/// Best-effort extraction of the closed string-literal set a `TypeAliasDecl`
/// denotes, used to populate `TypeAliasData::enum_variants` (§4.E "Alias"
/// row: "when the alias is enum-representable").
fn string_literal_union(target: &TypeExpr) -> Option<Vec<String>> {
    match target {
        TypeExpr::StringLiteral(s) => Some(vec![s.clone()]),
        TypeExpr::Union(members) => {
            let mut out = Vec::with_capacity(members.len());
            for m in members {
                match m {
                    TypeExpr::StringLiteral(s) => out.push(s.clone()),
                    _ => return None,
                }
            }
            Some(out)
        }
        _ => None,
    }
}

impl TypeCheckContext for Evaluator {
    fn eval_predicate(&mut self, heap: &mut Heap, predicate: &Expr, subject: &Value) -> RunResult<bool> {
        let mut pred_frame = Frame::new(None, None);
        pred_frame.push_aux(AuxSlot::CustomThis(subject.clone()));
        match self.eval(heap, &mut pred_frame, predicate)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::TypeMismatch { expected: "Boolean".into(), found: other.type_name(heap) }),
        }
    }

    fn class_prototype(&mut self, heap: &mut Heap, class: ClassId) -> RunResult<Option<Value>> {
        if let Some(id) = heap.class(class).prototype {
            return Ok(Some(Value::Object(id)));
        }
        if heap.class(class).abstract_ {
            return Ok(None);
        }
        let properties = heap.class(class).properties.clone();
        let superclass = heap.class(class).superclass;

        let parent_id = match superclass {
            Some(super_class) => match self.class_prototype(heap, super_class)? {
                Some(Value::Object(id)) => Some(id),
                _ => None,
            },
            None => None,
        };

        let mut data = ObjectData::new(ObjectKind::Typed, class, parent_id, parent_id);
        if let Some(pid) = parent_id {
            let parent_keys: Vec<MemberKey> = heap.object(pid).members().keys().cloned().collect();
            for key in &parent_keys {
                let def = heap.object(pid).members()[key].def.clone();
                data.push_member(key.clone(), MemberSlot::new(def));
            }
        }
        let new_id = heap.alloc_object(data);

        for prop in &properties {
            let key = MemberKey::Property(prop.name);
            if heap.object(new_id).members().contains_key(&key) {
                continue;
            }
            if let Some(default_expr) = &prop.default {
                let mut def = MemberDef::new(
                    prop.span,
                    crate::ast::MemberFlags { hidden: prop.hidden, ..Default::default() },
                    prop.type_expr.clone(),
                    MemberBody::Expr(default_expr.clone()),
                );
                def.owner = Some(new_id);
                heap.object_mut(new_id).push_member(key, MemberSlot::new(def));
            } else if let Some(type_expr) = prop.type_expr.clone() {
                if let Some(default_val) = self.default_of(heap, &type_expr)? {
                    let mut def = MemberDef::new(
                        prop.span,
                        crate::ast::MemberFlags { hidden: prop.hidden, ..Default::default() },
                        Some(type_expr),
                        MemberBody::Value(default_val),
                    );
                    def.owner = Some(new_id);
                    heap.object_mut(new_id).push_member(key, MemberSlot::new(def));
                }
            }
        }

        heap.class_mut(class).prototype = Some(new_id);
        Ok(Some(Value::Object(new_id)))
    }

    fn empty_dynamic(&mut self, heap: &mut Heap) -> Value {
        let id = heap.alloc_object(ObjectData::new(ObjectKind::Dynamic, self.dynamic_class, None, None));
        Value::Object(id)
    }

    fn empty_collection(&mut self, heap: &mut Heap, base: ParamBase, type_args: &[TypeValue]) -> Value {
        match base {
            ParamBase::List => Value::List(Rc::new(ListData::new(Vec::new()))),
            ParamBase::Set => Value::Set(Rc::new(SetData::new())),
            ParamBase::Map => Value::Map(Rc::new(MapData::new())),
            ParamBase::Listing => {
                let mut data = ObjectData::new(ObjectKind::Listing, self.listing_class, None, None);
                data.set_element_type(type_args.first().cloned());
                Value::Object(heap.alloc_object(data))
            }
            ParamBase::Mapping => {
                let mut data = ObjectData::new(ObjectKind::Mapping, self.mapping_class, None, None);
                // type_args is [key, value]; only the entry value type is
                // enforced on force (§4.E) — entry keys are arbitrary forced
                // values compared structurally, not constrained here.
                data.set_element_type(type_args.get(1).cloned());
                Value::Object(heap.alloc_object(data))
            }
        }
    }
}

impl AmendContext for Evaluator {
    fn eval_expr(&mut self, heap: &mut Heap, frame: &mut Frame, expr: &Expr) -> RunResult<Value> {
        self.eval(heap, frame, expr)
    }

    fn visible_entries(&mut self, heap: &mut Heap, object: ObjectId) -> RunResult<Vec<(MemberKey, Value)>> {
        let keys: Vec<MemberKey> = heap.object(object).members().keys().cloned().collect();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let v = self.force(heap, object, &key)?;
            out.push((key, v));
        }
        Ok(out)
    }

    fn iterate_for_generator(&mut self, heap: &mut Heap, value: &Value) -> RunResult<Vec<(Option<Value>, Value)>> {
        match value {
            Value::List(items) => Ok(items.iter().map(|v| (None, v.clone())).collect()),
            Value::Set(items) => Ok(items.iter().map(|v| (None, v.clone())).collect()),
            Value::Map(entries) => Ok(entries.iter().map(|(k, v)| (Some(k.clone()), v.clone())).collect()),
            Value::IntSeq(seq) => Ok(seq.iter().map(|i| (None, Value::Int(i))).collect()),
            Value::Object(id) => {
                let kind = heap.object(*id).kind();
                let keys: Vec<MemberKey> = heap.object(*id).members().keys().cloned().collect();
                let mut out = Vec::with_capacity(keys.len());
                for key in keys {
                    let v = self.force(heap, *id, &key)?;
                    match (&key, kind) {
                        (MemberKey::Element(_), ObjectKind::Listing) => out.push((None, v)),
                        (MemberKey::Entry(k), ObjectKind::Mapping) => out.push((Some(k.clone()), v)),
                        (MemberKey::Property(_), ObjectKind::Dynamic) => out.push((None, v)),
                        _ => {}
                    }
                }
                Ok(out)
            }
            other => Err(EvalError::TypeMismatch { expected: "an iterable value".into(), found: other.type_name(heap) }),
        }
    }

    fn describe_key(&self, key: &MemberKey) -> String {
        Evaluator::describe_key(self, key)
    }
}

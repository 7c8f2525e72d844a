//! The tagged runtime value (§3, §4.A).
//!
//! A tagged-enum `Value` with a cheap-clone shape: scalars are `Copy`-ish,
//! structured payloads sit behind
//! an `Rc` so cloning a `Value` never deep-copies a collection. Equality and
//! hashing are **not** derived: §4.A requires numeric Int/Float equality
//! across tags, Regex equality by source pattern only, and Duration/DataSize
//! equality after normalizing to a canonical unit, none of which match
//! derived `PartialEq`/`Hash` semantics. `structural_eq`/`structural_hash`
//! carry that logic; `PartialEq`/`Eq` are intentionally not implemented on
//! `Value` itself so call sites can't reach for `==` by accident and get
//! Rust's (wrong) notion of equality.

use std::fmt;
use std::rc::Rc;

use crate::heap::{ClassId, Heap, ObjectId};
use crate::intern::StringId;
use crate::object::ObjectKind;
use crate::types::bytes::BytesData;
use crate::types::datasize::{DataSizeUnit, data_size_to_bytes};
use crate::types::duration::{DurationUnit, duration_to_nanos};
use crate::types::intseq::IntSeqData;
use crate::types::list::ListData;
use crate::types::map::{MapData, maps_structurally_equal};
use crate::types::pair::PairData;
use crate::types::regex::RegexData;
use crate::types::set::{SetData, sets_structurally_equal};
use crate::ast::Expr;

/// A closure value produced by a `Lambda` expression or a method reference
/// (§4.D). Captures its defining object as the enclosing scope for free
/// identifiers, the same way `ObjectData::enclosing` does for object
/// literals (§4.C).
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub params: Vec<StringId>,
    pub body: Expr,
    pub enclosing: Option<ObjectId>,
}

/// The runtime value model (§3 "Value").
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Duration { value: f64, unit: DurationUnit },
    DataSize { value: f64, unit: DataSizeUnit },
    Regex(Rc<RegexData>),
    List(Rc<ListData>),
    Set(Rc<SetData>),
    Map(Rc<MapData>),
    Pair(Rc<PairData>),
    IntSeq(IntSeqData),
    Bytes(Rc<BytesData>),
    Function(Rc<FunctionData>),
    /// A class referenced as a value, e.g. `List` in `x is List` once
    /// reduced to a runtime value rather than a static `TypeExpr` (§4.E).
    Class(ClassId),
    /// Every object-like instance — Dynamic, Listing, Mapping, Typed, and
    /// Module — lives in the heap; the kind tag distinguishing them is on
    /// the `ObjectData` itself (§3, §9).
    Object(ObjectId),
}

/// Wire shape for `Value` (§4.A, DESIGN.md `value.rs`): same tags, with
/// every `Rc`-boxed payload owned rather than shared (serde has no use for
/// the sharing) and `Function` narrowed to a unit marker. Deriving here
/// instead of on `Value` itself sidesteps `Rc<T>: Serialize` entirely.
#[derive(serde::Serialize, serde::Deserialize)]
enum ValueRepr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Duration { value: f64, unit: DurationUnit },
    DataSize { value: f64, unit: DataSizeUnit },
    Regex(crate::types::regex::RegexData),
    List(crate::types::list::ListData),
    Set(crate::types::set::SetData),
    Map(crate::types::map::MapData),
    Pair(crate::types::pair::PairData),
    IntSeq(IntSeqData),
    Bytes(crate::types::bytes::BytesData),
    Function,
    Class(ClassId),
    Object(ObjectId),
}

impl serde::Serialize for Value {
    /// Every variant round-trips except `Function`, which serializes as an
    /// opaque marker: deserializing an AST-backed closure from untrusted
    /// wire data would be a code-construction surface this evaluator has
    /// no reason to expose.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            Self::Null => ValueRepr::Null,
            Self::Bool(b) => ValueRepr::Bool(*b),
            Self::Int(i) => ValueRepr::Int(*i),
            Self::Float(f) => ValueRepr::Float(*f),
            Self::String(s) => ValueRepr::String(s.to_string()),
            Self::Duration { value, unit } => ValueRepr::Duration { value: *value, unit: *unit },
            Self::DataSize { value, unit } => ValueRepr::DataSize { value: *value, unit: *unit },
            Self::Regex(r) => ValueRepr::Regex((**r).clone()),
            Self::List(l) => ValueRepr::List((**l).clone()),
            Self::Set(s) => ValueRepr::Set((**s).clone()),
            Self::Map(m) => ValueRepr::Map((**m).clone()),
            Self::Pair(p) => ValueRepr::Pair((**p).clone()),
            Self::IntSeq(i) => ValueRepr::IntSeq(*i),
            Self::Bytes(b) => ValueRepr::Bytes((**b).clone()),
            Self::Function(_) => ValueRepr::Function,
            Self::Class(c) => ValueRepr::Class(*c),
            Self::Object(o) => ValueRepr::Object(*o),
        };
        repr.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = ValueRepr::deserialize(deserializer)?;
        Ok(match repr {
            ValueRepr::Null => Self::Null,
            ValueRepr::Bool(b) => Self::Bool(b),
            ValueRepr::Int(i) => Self::Int(i),
            ValueRepr::Float(f) => Self::Float(f),
            ValueRepr::String(s) => Self::String(Rc::from(s.as_str())),
            ValueRepr::Duration { value, unit } => Self::Duration { value, unit },
            ValueRepr::DataSize { value, unit } => Self::DataSize { value, unit },
            ValueRepr::Regex(r) => Self::Regex(Rc::new(r)),
            ValueRepr::List(l) => Self::List(Rc::new(l)),
            ValueRepr::Set(s) => Self::Set(Rc::new(s)),
            ValueRepr::Map(m) => Self::Map(Rc::new(m)),
            ValueRepr::Pair(p) => Self::Pair(Rc::new(p)),
            ValueRepr::IntSeq(i) => Self::IntSeq(i),
            ValueRepr::Bytes(b) => Self::Bytes(Rc::new(b)),
            ValueRepr::Function => {
                return Err(serde::de::Error::custom("cannot deserialize a Function value"));
            }
            ValueRepr::Class(c) => Self::Class(c),
            ValueRepr::Object(o) => Self::Object(o),
        })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s.as_str()))
    }
}

impl Value {
    /// The unqualified stdlib type name for every tag except `Object` and
    /// `Class`, whose name depends on heap-resident class data (§4.E table).
    fn stdlib_type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Boolean",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::String(_) => "String",
            Self::Duration { .. } => "Duration",
            Self::DataSize { .. } => "DataSize",
            Self::Regex(_) => "Regex",
            Self::List(_) => "List",
            Self::Set(_) => "Set",
            Self::Map(_) => "Map",
            Self::Pair(_) => "Pair",
            Self::IntSeq(_) => "IntSeq",
            Self::Bytes(_) => "Bytes",
            Self::Function(_) => "Function",
            Self::Class(_) | Self::Object(_) => unreachable!("handled by caller"),
        }
    }

    /// Human-readable type name, used in error messages (§7) and for the
    /// `Value.type` reflection-ish helpers the stdlib exposes.
    #[must_use]
    pub fn type_name(&self, heap: &Heap) -> String {
        match self {
            Self::Class(_) => "Class".to_string(),
            Self::Object(id) => {
                let obj = heap.object(*id);
                match obj.kind() {
                    ObjectKind::Dynamic => "Dynamic".to_string(),
                    ObjectKind::Listing => "Listing".to_string(),
                    ObjectKind::Mapping => "Mapping".to_string(),
                    ObjectKind::Typed | ObjectKind::Module => heap.class(obj.class()).qualified_name.clone(),
                }
            }
            other => other.stdlib_type_name().to_string(),
        }
    }

    /// `v is C` (§4.E "Class C" row): for object-like values, walks the
    /// class/superclass chain; for every other tag, the value's stdlib type
    /// name is compared against `class_id`'s name, with `Int`/`Float` also
    /// satisfying the `Number` supertype.
    #[must_use]
    pub fn is_instance_of(&self, class_id: ClassId, heap: &Heap) -> bool {
        match self {
            Self::Object(id) => {
                let mut cur = Some(heap.object(*id).class());
                while let Some(c) = cur {
                    if c == class_id {
                        return true;
                    }
                    cur = heap.class(c).superclass;
                }
                false
            }
            Self::Class(_) => heap.class(class_id).qualified_name == "Class",
            other => {
                let target = heap.class(class_id).qualified_name.as_str();
                if target == "Number" && matches!(other, Self::Int(_) | Self::Float(_)) {
                    return true;
                }
                other.stdlib_type_name() == target
            }
        }
    }

    /// Structural equality (§3, §4.A): numeric cross-tag, regex by source,
    /// duration/data-size after canonicalization, collections element-wise,
    /// object-like values by identity (their member graphs are not
    /// compared — two freshly-amended `Dynamic`s with identical members are
    /// still distinct objects).
    #[must_use]
    pub fn structural_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Duration { value: av, unit: au }, Self::Duration { value: bv, unit: bu }) => {
                duration_to_nanos(*av, *au) == duration_to_nanos(*bv, *bu)
            }
            (Self::DataSize { value: av, unit: au }, Self::DataSize { value: bv, unit: bu }) => {
                data_size_to_bytes(*av, *au) == data_size_to_bytes(*bv, *bu)
            }
            (Self::Regex(a), Self::Regex(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Self::Set(a), Self::Set(b)) => sets_structurally_equal(a, b),
            (Self::Map(a), Self::Map(b)) => maps_structurally_equal(a, b),
            (Self::Pair(a), Self::Pair(b)) => a.first.structural_eq(&b.first) && a.second.structural_eq(&b.second),
            (Self::IntSeq(a), Self::IntSeq(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }

    /// A hash consistent with [`Value::structural_eq`] (§4.A, and the
    /// `MemberKey::Entry`/`Set`/`Map` uses that rely on it). Collections
    /// whose equality is order-independent (`Set`, `Map`) combine element
    /// hashes commutatively so that equal-but-differently-ordered
    /// collections hash identically.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = ahash::AHasher::default();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into<H: std::hash::Hasher>(&self, hasher: &mut H) {
        use std::hash::Hash;
        match self {
            Self::Null => 0u8.hash(hasher),
            Self::Bool(b) => {
                1u8.hash(hasher);
                b.hash(hasher);
            }
            Self::Int(i) => {
                2u8.hash(hasher);
                (*i as f64).to_bits().hash(hasher);
            }
            Self::Float(f) => {
                2u8.hash(hasher);
                f.to_bits().hash(hasher);
            }
            Self::String(s) => {
                3u8.hash(hasher);
                s.hash(hasher);
            }
            Self::Duration { value, unit } => {
                4u8.hash(hasher);
                duration_to_nanos(*value, *unit).to_bits().hash(hasher);
            }
            Self::DataSize { value, unit } => {
                5u8.hash(hasher);
                data_size_to_bytes(*value, *unit).to_bits().hash(hasher);
            }
            Self::Regex(r) => {
                6u8.hash(hasher);
                r.source.hash(hasher);
            }
            Self::List(items) => {
                7u8.hash(hasher);
                items.len().hash(hasher);
                for item in items.iter() {
                    item.structural_hash().hash(hasher);
                }
            }
            Self::Set(items) => {
                8u8.hash(hasher);
                let combined: u64 = items.iter().map(Self::structural_hash).fold(0, |acc, h| acc ^ h);
                combined.hash(hasher);
            }
            Self::Map(entries) => {
                9u8.hash(hasher);
                let combined: u64 = entries
                    .iter()
                    .map(|(k, v)| k.structural_hash() ^ v.structural_hash().rotate_left(1))
                    .fold(0, |acc, h| acc ^ h);
                combined.hash(hasher);
            }
            Self::Pair(pair) => {
                10u8.hash(hasher);
                pair.first.structural_hash().hash(hasher);
                pair.second.structural_hash().hash(hasher);
            }
            Self::IntSeq(seq) => {
                11u8.hash(hasher);
                seq.start.hash(hasher);
                seq.end.hash(hasher);
                seq.step.hash(hasher);
            }
            Self::Bytes(b) => {
                12u8.hash(hasher);
                b.as_slice().hash(hasher);
            }
            Self::Function(f) => {
                13u8.hash(hasher);
                (Rc::as_ptr(f) as usize).hash(hasher);
            }
            Self::Class(c) => {
                14u8.hash(hasher);
                c.hash(hasher);
            }
            Self::Object(id) => {
                15u8.hash(hasher);
                id.hash(hasher);
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Truthiness, used by `if`/`&&`/`||` (§4.D): only `Boolean` is
    /// permitted as a condition; callers that need Pkl's strict "no
    /// implicit truthiness" rule should match on `Value::Bool` directly
    /// instead of calling this — it exists only for diagnostics/tracing
    /// that want a best-effort description.
    #[must_use]
    pub fn is_truthy_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Duration { value, unit } => write!(f, "{value}.{}", unit.short_name()),
            Self::DataSize { value, unit } => write!(f, "{value}.{}", unit.short_name()),
            Self::Regex(r) => write!(f, "Regex(\"{}\")", r.source),
            Self::List(items) => {
                write!(f, "List(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Self::Set(_) => write!(f, "Set(...)"),
            Self::Map(_) => write!(f, "Map(...)"),
            Self::Pair(p) => write!(f, "Pair({}, {})", p.first, p.second),
            Self::IntSeq(seq) => write!(f, "IntSeq({}, {}, {})", seq.start, seq.end, seq.step),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.as_slice().len()),
            Self::Function(_) => write!(f, "<function>"),
            Self::Class(_) => write!(f, "<class>"),
            Self::Object(_) => write!(f, "<object>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_float_are_structurally_equal() {
        assert!(Value::Int(1).structural_eq(&Value::Float(1.0)));
        assert_eq!(Value::Int(1).structural_hash(), Value::Float(1.0).structural_hash());
    }

    #[test]
    fn strings_compare_by_content_not_identity() {
        let a = Value::from("hi");
        let b = Value::from("hi");
        assert!(a.structural_eq(&b));
    }

    #[test]
    fn durations_normalize_before_comparing() {
        let a = Value::Duration { value: 1.0, unit: DurationUnit::Minutes };
        let b = Value::Duration { value: 60.0, unit: DurationUnit::Seconds };
        assert!(a.structural_eq(&b));
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn sets_hash_equal_regardless_of_insertion_order() {
        let a = Value::Set(Rc::new(SetData::from_items([Value::Int(1), Value::Int(2)])));
        let b = Value::Set(Rc::new(SetData::from_items([Value::Int(2), Value::Int(1)])));
        assert!(a.structural_eq(&b));
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn is_instance_of_number_accepts_int_and_float() {
        let mut heap = Heap::new();
        let number = heap.alloc_class(crate::types::class::ClassData::synthetic("Number"));
        assert!(Value::Int(1).is_instance_of(number, &heap));
        assert!(Value::Float(1.0).is_instance_of(number, &heap));
        assert!(!Value::from("x").is_instance_of(number, &heap));
    }

    #[test]
    fn an_ordinary_value_round_trips_through_serde() {
        let original = Value::from("hello");
        let encoded = serde_json::to_string(&original).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert!(decoded.structural_eq(&original));
    }

    #[test]
    fn a_function_value_serializes_but_refuses_to_deserialize() {
        let f = Value::Function(Rc::new(crate::value::FunctionData {
            params: vec![],
            body: crate::ast::Expr::Const(crate::ast::Literal::Null),
            enclosing: None,
        }));
        let encoded = serde_json::to_string(&f).unwrap();
        assert!(serde_json::from_str::<Value>(&encoded).is_err());
    }
}

//! The pkl-binary wire codec (§4.G): MessagePack values with an embedded
//! type-code discriminator. Built on `rmpv`'s dynamic `Value` tree rather
//! than a derived `serde::Serialize` mapping, since the per-type wire
//! shapes here (an explicit leading code in every array) don't line up
//! with what a struct/enum derive would produce.
//!
//! Encoding walks an already fully-forced value graph — this module never
//! forces anything itself, matching the OVERVIEW's framing of the codec as
//! a boundary concern, not an evaluation one. Decoding produces a
//! standalone, read-only snapshot: a decoded `Object` gets a synthetic
//! `ClassData` allocated for its `(className, moduleUri)` pair and every
//! member arrives pre-forced, never reconnected to a live class registry.

use std::io::Cursor;

use rmpv::Value as Wire;

use crate::errors::{EvalError, RunResult};
use crate::heap::{Heap, ObjectId};
use crate::intern::Interns;
use crate::member::{ForceState, MemberDef, MemberKey, MemberSlot};
use crate::object::{ObjectData, ObjectKind};
use crate::types::bytes::BytesData;
use crate::types::class::ClassData;
use crate::types::datasize::DataSizeUnit;
use crate::types::duration::DurationUnit;
use crate::types::intseq::IntSeqData;
use crate::types::list::ListData;
use crate::types::map::MapData;
use crate::types::pair::PairData;
use crate::types::regex::RegexData;
use crate::types::set::SetData;
use crate::value::Value;

pub const CODE_OBJECT: i64 = 1;
pub const CODE_MAP: i64 = 2;
pub const CODE_MAPPING: i64 = 3;
pub const CODE_LIST: i64 = 4;
pub const CODE_LISTING: i64 = 5;
pub const CODE_SET: i64 = 6;
pub const CODE_DURATION: i64 = 7;
pub const CODE_DATASIZE: i64 = 8;
pub const CODE_PAIR: i64 = 9;
pub const CODE_INTSEQ: i64 = 10;
pub const CODE_REGEX: i64 = 11;
pub const CODE_CLASS: i64 = 12;
pub const CODE_TYPEALIAS: i64 = 13;
pub const CODE_FUNCTION: i64 = 14;
pub const CODE_BYTES: i64 = 15;
pub const CODE_PROPERTY: i64 = 16;
pub const CODE_ENTRY: i64 = 17;
pub const CODE_ELEMENT: i64 = 18;

fn invalid(path: &[String], message: impl Into<String>) -> EvalError {
    EvalError::InvalidEncoding { offset: 0, path: path.join("."), message: message.into() }
}

/// Encodes one value into the wire `rmpv::Value` tree (§4.G). Every member
/// of every nested object-like must already be forced; an unforced member
/// is a caller error surfaced as `EvalError::Eval`, since this module has
/// no `Evaluator` to force through. `interns` resolves `Property` member
/// names to their text.
pub fn encode_value(heap: &Heap, interns: &Interns, value: &Value) -> RunResult<Wire> {
    Ok(match value {
        Value::Null => Wire::Nil,
        Value::Bool(b) => Wire::Boolean(*b),
        Value::Int(i) => Wire::Integer((*i).into()),
        Value::Float(f) => Wire::F64(*f),
        Value::String(s) => Wire::String(s.as_ref().into()),
        Value::Duration { value, unit } => {
            Wire::Array(vec![Wire::Integer(CODE_DURATION.into()), Wire::F64(*value), Wire::String(unit.short_name().into())])
        }
        Value::DataSize { value, unit } => {
            Wire::Array(vec![Wire::Integer(CODE_DATASIZE.into()), Wire::F64(*value), Wire::String(unit.short_name().into())])
        }
        Value::Regex(r) => Wire::Array(vec![Wire::Integer(CODE_REGEX.into()), Wire::String(r.source.as_str().into())]),
        Value::List(items) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items.iter() {
                encoded.push(encode_value(heap, interns, item)?);
            }
            Wire::Array(vec![Wire::Integer(CODE_LIST.into()), Wire::Array(encoded)])
        }
        Value::Set(items) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items.iter() {
                encoded.push(encode_value(heap, interns, item)?);
            }
            Wire::Array(vec![Wire::Integer(CODE_SET.into()), Wire::Array(encoded)])
        }
        Value::Map(entries) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (k, v) in entries.iter() {
                pairs.push((encode_value(heap, interns, k)?, encode_value(heap, interns, v)?));
            }
            Wire::Array(vec![Wire::Integer(CODE_MAP.into()), Wire::Map(pairs)])
        }
        Value::Pair(p) => {
            Wire::Array(vec![Wire::Integer(CODE_PAIR.into()), encode_value(heap, interns, &p.first)?, encode_value(heap, interns, &p.second)?])
        }
        Value::IntSeq(seq) => Wire::Array(vec![
            Wire::Integer(CODE_INTSEQ.into()),
            Wire::Integer(seq.start.into()),
            Wire::Integer(seq.end.into()),
            Wire::Integer(seq.step.into()),
        ]),
        Value::Bytes(b) => Wire::Array(vec![Wire::Integer(CODE_BYTES.into()), Wire::Binary(b.as_slice().to_vec())]),
        Value::Function(_) => Wire::Array(vec![Wire::Integer(CODE_FUNCTION.into())]),
        Value::Class(class_id) => {
            let class = heap.class(*class_id);
            Wire::Array(vec![
                Wire::Integer(CODE_CLASS.into()),
                Wire::String(class.qualified_name.as_str().into()),
                Wire::String(class.module_uri.as_str().into()),
            ])
        }
        Value::Object(id) => encode_object(heap, interns, *id)?,
    })
}

fn encode_object(heap: &Heap, interns: &Interns, id: ObjectId) -> RunResult<Wire> {
    let data = heap.object(id);
    match data.kind() {
        ObjectKind::Mapping => {
            let mut pairs = Vec::new();
            for (key, slot) in data.members() {
                let MemberKey::Entry(k) = key else { continue };
                let v = forced_value(slot)?;
                pairs.push((encode_value(heap, interns, k)?, encode_value(heap, interns, v)?));
            }
            Ok(Wire::Array(vec![Wire::Integer(CODE_MAPPING.into()), Wire::Map(pairs)]))
        }
        ObjectKind::Listing => {
            let mut elements: Vec<(u64, &MemberSlot)> = data
                .members()
                .iter()
                .filter_map(|(key, slot)| if let MemberKey::Element(i) = key { Some((*i, slot)) } else { None })
                .collect();
            elements.sort_by_key(|(i, _)| *i);
            let mut encoded = Vec::with_capacity(elements.len());
            for (_, slot) in elements {
                encoded.push(encode_value(heap, interns, forced_value(slot)?)?);
            }
            Ok(Wire::Array(vec![Wire::Integer(CODE_LISTING.into()), Wire::Array(encoded)]))
        }
        ObjectKind::Dynamic | ObjectKind::Typed | ObjectKind::Module => {
            let class = heap.class(data.class());
            let mut members = Vec::with_capacity(data.members().len());
            for (key, slot) in data.members() {
                let value = forced_value(slot)?;
                let encoded_value = encode_value(heap, interns, value)?;
                let member = match key {
                    MemberKey::Property(name) => {
                        Wire::Array(vec![Wire::Integer(CODE_PROPERTY.into()), Wire::String(interns.get(*name).into()), encoded_value])
                    }
                    MemberKey::Entry(k) => Wire::Array(vec![Wire::Integer(CODE_ENTRY.into()), encode_value(heap, interns, k)?, encoded_value]),
                    MemberKey::Element(i) => Wire::Array(vec![Wire::Integer(CODE_ELEMENT.into()), Wire::Integer((*i).into()), encoded_value]),
                };
                members.push(member);
            }
            Ok(Wire::Array(vec![
                Wire::Integer(CODE_OBJECT.into()),
                Wire::String(class.qualified_name.as_str().into()),
                Wire::String(class.module_uri.as_str().into()),
                Wire::Array(members),
            ]))
        }
    }
}

fn forced_value(slot: &MemberSlot) -> RunResult<&Value> {
    slot.cached.as_ref().ok_or_else(|| EvalError::Eval { message: "cannot encode an unforced member".into() })
}

pub fn encode_to_bytes(heap: &Heap, interns: &Interns, value: &Value) -> RunResult<Vec<u8>> {
    let wire = encode_value(heap, interns, value)?;
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &wire).map_err(|e| EvalError::IoError { message: e.to_string() })?;
    Ok(buf)
}

/// Decodes one value from an already-parsed `rmpv::Value` tree, tracking a
/// breadcrumb `path` for diagnostics (§4.G "readers track a breadcrumb path
/// ... for precise error locations"). Byte-offset tracking would need a
/// fully streaming `rmp::decode` reader rather than an in-memory tree;
/// this always reports offset `0` (see `invalid()`), a simplification
/// documented in DESIGN.md. Decoded objects get a fresh synthetic class
/// allocated per `(className, moduleUri)` pair — they are standalone
/// snapshots, not reconnected to any existing class registry.
pub fn decode_value(heap: &mut Heap, interns: &mut Interns, msg: &Wire, path: &mut Vec<String>) -> RunResult<Value> {
    match msg {
        Wire::Nil => Ok(Value::Null),
        Wire::Boolean(b) => Ok(Value::Bool(*b)),
        Wire::Integer(i) => i.as_i64().map(Value::Int).ok_or_else(|| invalid(path, "integer out of i64 range")),
        Wire::F64(f) => Ok(Value::Float(*f)),
        Wire::F32(f) => Ok(Value::Float(f64::from(*f))),
        Wire::String(s) => s.as_str().map(Value::from).ok_or_else(|| invalid(path, "non-UTF-8 string")),
        Wire::Array(items) => decode_array(heap, interns, items, path),
        other => Err(invalid(path, format!("unexpected top-level msgpack value `{other:?}`"))),
    }
}

fn decode_array(heap: &mut Heap, interns: &mut Interns, items: &[Wire], path: &mut Vec<String>) -> RunResult<Value> {
    let code = items.first().and_then(Wire::as_i64).ok_or_else(|| invalid(path, "array is missing its type code"))?;
    match code {
        CODE_DURATION => {
            let value = items.get(1).and_then(Wire::as_f64).ok_or_else(|| invalid(path, "DURATION missing value"))?;
            let unit_str = items.get(2).and_then(Wire::as_str).ok_or_else(|| invalid(path, "DURATION missing unit"))?;
            let unit = parse_duration_unit(unit_str).ok_or_else(|| invalid(path, format!("unknown duration unit `{unit_str}`")))?;
            Ok(Value::Duration { value, unit })
        }
        CODE_DATASIZE => {
            let value = items.get(1).and_then(Wire::as_f64).ok_or_else(|| invalid(path, "DATASIZE missing value"))?;
            let unit_str = items.get(2).and_then(Wire::as_str).ok_or_else(|| invalid(path, "DATASIZE missing unit"))?;
            let unit = parse_datasize_unit(unit_str).ok_or_else(|| invalid(path, format!("unknown data size unit `{unit_str}`")))?;
            Ok(Value::DataSize { value, unit })
        }
        CODE_REGEX => {
            let source = items.get(1).and_then(Wire::as_str).ok_or_else(|| invalid(path, "REGEX missing source"))?;
            let compiled = RegexData::compile(source).map_err(|e| invalid(path, format!("invalid regex: {e}")))?;
            Ok(Value::Regex(std::rc::Rc::new(compiled)))
        }
        CODE_PAIR => {
            path.push("first".into());
            let first = decode_value(heap, interns, items.get(1).ok_or_else(|| invalid(path, "PAIR missing first"))?, path)?;
            path.pop();
            path.push("second".into());
            let second = decode_value(heap, interns, items.get(2).ok_or_else(|| invalid(path, "PAIR missing second"))?, path)?;
            path.pop();
            Ok(Value::Pair(std::rc::Rc::new(PairData::new(first, second))))
        }
        CODE_INTSEQ => {
            let start = items.get(1).and_then(Wire::as_i64).ok_or_else(|| invalid(path, "INTSEQ missing start"))?;
            let end = items.get(2).and_then(Wire::as_i64).ok_or_else(|| invalid(path, "INTSEQ missing end"))?;
            let step = items.get(3).and_then(Wire::as_i64).ok_or_else(|| invalid(path, "INTSEQ missing step"))?;
            Ok(Value::IntSeq(IntSeqData::new(start, end, step)))
        }
        CODE_BYTES => {
            let bin = items.get(1).and_then(Wire::as_slice).ok_or_else(|| invalid(path, "BYTES missing payload"))?;
            Ok(Value::Bytes(std::rc::Rc::new(BytesData::new(bin.to_vec()))))
        }
        CODE_FUNCTION => Err(invalid(path, "decoding a FUNCTION value is refused")),
        CODE_CLASS => {
            let qualified_name = items.get(1).and_then(Wire::as_str).ok_or_else(|| invalid(path, "CLASS missing qualifiedName"))?;
            let module_uri = items.get(2).and_then(Wire::as_str).ok_or_else(|| invalid(path, "CLASS missing moduleUri"))?;
            let class_id = heap.alloc_class(ClassData::new(qualified_name, module_uri));
            Ok(Value::Class(class_id))
        }
        CODE_LIST | CODE_SET => {
            let inner = items.get(1).and_then(Wire::as_array).ok_or_else(|| invalid(path, "expected an inner array"))?;
            let mut out = Vec::with_capacity(inner.len());
            for (i, item) in inner.iter().enumerate() {
                path.push(i.to_string());
                out.push(decode_value(heap, interns, item, path)?);
                path.pop();
            }
            if code == CODE_LIST {
                Ok(Value::List(std::rc::Rc::new(ListData::new(out))))
            } else {
                Ok(Value::Set(std::rc::Rc::new(SetData::from_items(out))))
            }
        }
        CODE_MAP => {
            let inner = items.get(1).and_then(Wire::as_map).ok_or_else(|| invalid(path, "expected an inner map"))?;
            let mut out = MapData::new();
            for (i, (k, v)) in inner.iter().enumerate() {
                path.push(format!("[{i}].key"));
                let key = decode_value(heap, interns, k, path)?;
                path.pop();
                path.push(format!("[{i}].value"));
                let value = decode_value(heap, interns, v, path)?;
                path.pop();
                out.insert(key, value);
            }
            Ok(Value::Map(std::rc::Rc::new(out)))
        }
        CODE_MAPPING => {
            let inner = items.get(1).and_then(Wire::as_map).ok_or_else(|| invalid(path, "expected an inner map"))?;
            let class_id = heap.alloc_class(ClassData::synthetic("Mapping"));
            let id = heap.alloc_object(ObjectData::new(ObjectKind::Mapping, class_id, None, None));
            for (i, (k, v)) in inner.iter().enumerate() {
                path.push(format!("[{i}].key"));
                let key = decode_value(heap, interns, k, path)?;
                path.pop();
                path.push(format!("[{i}].value"));
                let value = decode_value(heap, interns, v, path)?;
                path.pop();
                push_forced(heap, id, MemberKey::Entry(key), value);
            }
            Ok(Value::Object(id))
        }
        CODE_LISTING => {
            let inner = items.get(1).and_then(Wire::as_array).ok_or_else(|| invalid(path, "expected an inner array"))?;
            let class_id = heap.alloc_class(ClassData::synthetic("Listing"));
            let id = heap.alloc_object(ObjectData::new(ObjectKind::Listing, class_id, None, None));
            for (i, item) in inner.iter().enumerate() {
                path.push(i.to_string());
                let value = decode_value(heap, interns, item, path)?;
                path.pop();
                push_forced(heap, id, MemberKey::Element(i as u64), value);
            }
            Ok(Value::Object(id))
        }
        CODE_OBJECT => {
            let qualified_name = items.get(1).and_then(Wire::as_str).ok_or_else(|| invalid(path, "OBJECT missing className"))?;
            let module_uri = items.get(2).and_then(Wire::as_str).ok_or_else(|| invalid(path, "OBJECT missing moduleUri"))?;
            let members = items.get(3).and_then(Wire::as_array).ok_or_else(|| invalid(path, "OBJECT missing members"))?;
            let class_id = heap.alloc_class(ClassData::new(qualified_name, module_uri));
            let id = heap.alloc_object(ObjectData::new(ObjectKind::Dynamic, class_id, None, None));
            for (i, member) in members.iter().enumerate() {
                path.push(format!("members[{i}]"));
                let triple = member.as_array().ok_or_else(|| invalid(path, "member is not an array"))?;
                let member_code = triple.first().and_then(Wire::as_i64).ok_or_else(|| invalid(path, "member missing code"))?;
                match member_code {
                    CODE_PROPERTY => {
                        let name = triple.get(1).and_then(Wire::as_str).ok_or_else(|| invalid(path, "PROPERTY missing name"))?;
                        let value = decode_value(heap, interns, triple.get(2).ok_or_else(|| invalid(path, "PROPERTY missing value"))?, path)?;
                        let name_id = interns.intern(name);
                        push_forced(heap, id, MemberKey::Property(name_id), value);
                    }
                    CODE_ENTRY => {
                        let key = decode_value(heap, interns, triple.get(1).ok_or_else(|| invalid(path, "ENTRY missing key"))?, path)?;
                        let value = decode_value(heap, interns, triple.get(2).ok_or_else(|| invalid(path, "ENTRY missing value"))?, path)?;
                        push_forced(heap, id, MemberKey::Entry(key), value);
                    }
                    CODE_ELEMENT => {
                        let idx = triple.get(1).and_then(Wire::as_i64).ok_or_else(|| invalid(path, "ELEMENT missing index"))?;
                        let value = decode_value(heap, interns, triple.get(2).ok_or_else(|| invalid(path, "ELEMENT missing value"))?, path)?;
                        push_forced(heap, id, MemberKey::Element(idx as u64), value);
                    }
                    other => return Err(invalid(path, format!("unknown member code `{other}`"))),
                }
                path.pop();
            }
            Ok(Value::Object(id))
        }
        other => Err(invalid(path, format!("unknown type code `{other}`"))),
    }
}

fn push_forced(heap: &mut Heap, object: ObjectId, key: MemberKey, value: Value) {
    let def = MemberDef::new(crate::ast::SourceSpan::default(), crate::ast::MemberFlags::default(), None, crate::member::MemberBody::Value(value.clone()));
    heap.object_mut(object).push_member(key, MemberSlot { def, state: ForceState::Forced, cached: Some(value) });
}

fn parse_duration_unit(s: &str) -> Option<DurationUnit> {
    Some(match s {
        "ns" => DurationUnit::Nanos,
        "us" => DurationUnit::Micros,
        "ms" => DurationUnit::Millis,
        "s" => DurationUnit::Seconds,
        "min" => DurationUnit::Minutes,
        "h" => DurationUnit::Hours,
        "d" => DurationUnit::Days,
        _ => return None,
    })
}

fn parse_datasize_unit(s: &str) -> Option<DataSizeUnit> {
    Some(match s {
        "b" => DataSizeUnit::B,
        "kb" => DataSizeUnit::Kb,
        "mb" => DataSizeUnit::Mb,
        "gb" => DataSizeUnit::Gb,
        "tb" => DataSizeUnit::Tb,
        "pb" => DataSizeUnit::Pb,
        "kib" => DataSizeUnit::Kib,
        "mib" => DataSizeUnit::Mib,
        "gib" => DataSizeUnit::Gib,
        "tib" => DataSizeUnit::Tib,
        "pib" => DataSizeUnit::Pib,
        _ => return None,
    })
}

pub fn decode_from_bytes(heap: &mut Heap, interns: &mut Interns, bytes: &[u8]) -> RunResult<Value> {
    let mut cursor = Cursor::new(bytes);
    let wire = rmpv::decode::read_value(&mut cursor).map_err(|e| EvalError::InvalidEncoding {
        offset: cursor.position() as usize,
        path: String::new(),
        message: e.to_string(),
    })?;
    let mut path = Vec::new();
    decode_value(heap, interns, &wire, &mut path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interns;

    #[test]
    fn round_trips_scalar_values() {
        let mut heap = Heap::new();
        let mut interns = Interns::new();
        for v in [Value::Null, Value::Bool(true), Value::Int(42), Value::Float(1.5), Value::from("hi")] {
            let bytes = encode_to_bytes(&heap, &interns, &v).unwrap();
            let decoded = decode_from_bytes(&mut heap, &mut interns, &bytes).unwrap();
            assert!(decoded.structural_eq(&v));
        }
    }

    #[test]
    fn round_trips_a_list() {
        let mut heap = Heap::new();
        let mut interns = Interns::new();
        let list = Value::List(std::rc::Rc::new(ListData::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)])));
        let bytes = encode_to_bytes(&heap, &interns, &list).unwrap();
        let decoded = decode_from_bytes(&mut heap, &mut interns, &bytes).unwrap();
        assert!(decoded.structural_eq(&list));
    }

    #[test]
    fn round_trips_an_object_with_properties() {
        let mut heap = Heap::new();
        let mut interns = Interns::new();
        let class_id = heap.alloc_class(ClassData::new("Foo", "file:///m.pkl"));
        let id = heap.alloc_object(ObjectData::new(ObjectKind::Dynamic, class_id, None, None));
        let name = interns.intern("x");
        push_forced(&mut heap, id, MemberKey::Property(name), Value::Int(7));
        let value = Value::Object(id);

        let bytes = encode_to_bytes(&heap, &interns, &value).unwrap();
        let decoded = decode_from_bytes(&mut heap, &mut interns, &bytes).unwrap();
        let Value::Object(decoded_id) = decoded else { panic!("expected an object") };
        let decoded_name = interns.intern("x");
        let slot = &heap.object(decoded_id).members()[&MemberKey::Property(decoded_name)];
        assert!(matches!(slot.cached, Some(Value::Int(7))));
    }

    #[test]
    fn function_values_refuse_to_decode() {
        let mut heap = Heap::new();
        let mut interns = Interns::new();
        let wire = Wire::Array(vec![Wire::Integer(CODE_FUNCTION.into())]);
        let mut path = Vec::new();
        let result = decode_value(&mut heap, &mut interns, &wire, &mut path);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_code_reports_a_path() {
        let mut heap = Heap::new();
        let mut interns = Interns::new();
        let wire = Wire::Array(vec![
            Wire::Integer(CODE_OBJECT.into()),
            Wire::String("Foo".into()),
            Wire::String("file:///m.pkl".into()),
            Wire::Array(vec![Wire::Array(vec![Wire::Integer(99.into())])]),
        ]);
        let mut path = Vec::new();
        let err = decode_value(&mut heap, &mut interns, &wire, &mut path).unwrap_err();
        match err {
            EvalError::InvalidEncoding { path, .. } => assert!(path.contains("members")),
            other => panic!("expected InvalidEncoding, got {other:?}"),
        }
    }
}

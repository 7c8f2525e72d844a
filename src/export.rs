//! JSON and `.properties` export (SUPPLEMENT). Walks the same
//! fully-forced object graph `codec.rs` walks, but towards two
//! text formats rather than the binary wire format — neither format is
//! ever read back by this crate, so export is one-directional.
//!
//! Grounded on `codec.rs`'s object-walking shape, reusing `serde_json`
//! (already carried for the core data model's own `Serialize`/`Deserialize`
//! derives) rather than hand-rolling JSON text.

use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::errors::{EvalError, RunResult};
use crate::heap::Heap;
use crate::intern::Interns;
use crate::member::{MemberKey, MemberSlot};
use crate::object::{ObjectData, ObjectKind};
use crate::value::Value;

/// Renders a fully-forced value as a `serde_json::Value` (§4.G-adjacent,
/// but JSON rather than the binary format). `Duration`/`DataSize`/`Regex`/
/// `Pair`/`IntSeq`/`Class`/`Function`, which have no native JSON shape,
/// render as their Pkl literal text — the same rendering a `toString()`
/// call would produce, not a structured encoding a reader could decode
/// back losslessly.
pub fn to_json(heap: &Heap, interns: &Interns, value: &Value) -> RunResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::String(s) => Json::String(s.to_string()),
        Value::Duration { value, unit } => Json::String(format!("{value}.{}", unit.short_name())),
        Value::DataSize { value, unit } => Json::String(format!("{value}.{}", unit.short_name())),
        Value::Regex(r) => Json::String(r.source.clone()),
        Value::Pair(p) => Json::Array(vec![to_json(heap, interns, &p.first)?, to_json(heap, interns, &p.second)?]),
        Value::IntSeq(seq) => Json::String(format!("{}..{}step {}", seq.start, seq.end, seq.step)),
        Value::Bytes(b) => Json::Array(b.as_slice().iter().map(|byte| Json::Number((*byte).into())).collect()),
        Value::Function(_) => Json::String("<function>".into()),
        Value::Class(class_id) => Json::String(heap.class(*class_id).qualified_name.clone()),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items.iter() {
                out.push(to_json(heap, interns, item)?);
            }
            Json::Array(out)
        }
        Value::Set(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items.iter() {
                out.push(to_json(heap, interns, item)?);
            }
            Json::Array(out)
        }
        Value::Map(entries) => {
            let mut out = JsonMap::new();
            for (k, v) in entries.iter() {
                out.insert(json_key(k)?, to_json(heap, interns, v)?);
            }
            Json::Object(out)
        }
        Value::Object(id) => object_to_json(heap, interns, *id)?,
    })
}

fn object_to_json(heap: &Heap, interns: &Interns, id: crate::heap::ObjectId) -> RunResult<Json> {
    let data = heap.object(id);
    match data.kind() {
        ObjectKind::Listing => {
            let mut elements: Vec<(u64, &MemberSlot)> = data
                .members()
                .iter()
                .filter_map(|(key, slot)| if let MemberKey::Element(i) = key { Some((*i, slot)) } else { None })
                .collect();
            elements.sort_by_key(|(i, _)| *i);
            let mut out = Vec::with_capacity(elements.len());
            for (_, slot) in elements {
                out.push(to_json(heap, interns, forced(slot)?)?);
            }
            Ok(Json::Array(out))
        }
        ObjectKind::Mapping => {
            let mut out = JsonMap::new();
            for (key, slot) in data.members() {
                let MemberKey::Entry(k) = key else { continue };
                out.insert(json_key(k)?, to_json(heap, interns, forced(slot)?)?);
            }
            Ok(Json::Object(out))
        }
        ObjectKind::Dynamic | ObjectKind::Typed | ObjectKind::Module => {
            let mut out = JsonMap::new();
            for (key, slot) in data.members() {
                match key {
                    MemberKey::Property(name) => {
                        out.insert(interns.get(*name).to_string(), to_json(heap, interns, forced(slot)?)?);
                    }
                    MemberKey::Entry(k) => {
                        out.insert(json_key(k)?, to_json(heap, interns, forced(slot)?)?);
                    }
                    MemberKey::Element(i) => {
                        out.insert(i.to_string(), to_json(heap, interns, forced(slot)?)?);
                    }
                }
            }
            Ok(Json::Object(out))
        }
    }
}

/// Map/Mapping keys render to their JSON string form directly when already
/// a string, and to their textual literal otherwise — JSON object keys are
/// always strings, so there is no `CannotExportToProperties`-style refusal
/// here; `.properties` export is the format that draws that line (§4.G
/// Open Question #3), since it has no quoting convention for composite keys.
fn json_key(key: &Value) -> RunResult<String> {
    Ok(match key {
        Value::String(s) => s.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Null => "null".to_string(),
        other => format!("{other}"),
    })
}

fn forced(slot: &MemberSlot) -> RunResult<&Value> {
    slot.cached.as_ref().ok_or_else(|| EvalError::Eval { message: "cannot export an unforced member".into() })
}

/// Renders a fully-forced value as Java-style `.properties` text (Open
/// Question #3's decision): nested Dynamic/Typed property paths flatten
/// with `.` (`a.b.c=value`), Listing/List elements flatten with numeric
/// indices (`a.0=value`), and any Mapping/Map entry whose key is not a
/// plain string is refused with `CannotExportToProperties` rather than
/// silently stringified.
pub fn to_properties(heap: &Heap, interns: &Interns, value: &Value) -> RunResult<String> {
    let mut lines = Vec::new();
    flatten(heap, interns, value, &mut Vec::new(), &mut lines)?;
    lines.sort();
    let mut out = String::new();
    for (key, rendered) in lines {
        out.push_str(&key);
        out.push('=');
        out.push_str(&escape_properties_value(&rendered));
        out.push('\n');
    }
    Ok(out)
}

fn flatten(heap: &Heap, interns: &Interns, value: &Value, path: &mut Vec<String>, out: &mut Vec<(String, String)>) -> RunResult<()> {
    match value {
        Value::Object(id) => flatten_object(heap, interns, *id, path, out),
        Value::List(items) => flatten_indexed(heap, interns, items.iter(), path, out),
        Value::Set(items) => flatten_indexed(heap, interns, items.iter(), path, out),
        Value::Map(entries) => {
            for (k, v) in entries.iter() {
                let segment = properties_key_segment(k)?;
                path.push(segment);
                flatten(heap, interns, v, path, out)?;
                path.pop();
            }
            Ok(())
        }
        scalar => {
            out.push((path.join("."), scalar_to_properties_text(scalar)));
            Ok(())
        }
    }
}

fn flatten_indexed<'a>(
    heap: &Heap,
    interns: &Interns,
    items: impl Iterator<Item = &'a Value>,
    path: &mut Vec<String>,
    out: &mut Vec<(String, String)>,
) -> RunResult<()> {
    for (i, item) in items.enumerate() {
        path.push(i.to_string());
        flatten(heap, interns, item, path, out)?;
        path.pop();
    }
    Ok(())
}

fn flatten_object(heap: &Heap, interns: &Interns, id: crate::heap::ObjectId, path: &mut Vec<String>, out: &mut Vec<(String, String)>) -> RunResult<()> {
    let data = heap.object(id);
    match data.kind() {
        ObjectKind::Listing => {
            let mut elements: Vec<(u64, &MemberSlot)> = data
                .members()
                .iter()
                .filter_map(|(key, slot)| if let MemberKey::Element(i) = key { Some((*i, slot)) } else { None })
                .collect();
            elements.sort_by_key(|(i, _)| *i);
            for (i, slot) in elements {
                path.push(i.to_string());
                flatten(heap, interns, forced(slot)?, path, out)?;
                path.pop();
            }
        }
        ObjectKind::Mapping => {
            for (key, slot) in data.members() {
                let MemberKey::Entry(k) = key else { continue };
                let segment = properties_key_segment(k)?;
                path.push(segment);
                flatten(heap, interns, forced(slot)?, path, out)?;
                path.pop();
            }
        }
        ObjectKind::Dynamic | ObjectKind::Typed | ObjectKind::Module => {
            for (key, slot) in data.members() {
                match key {
                    MemberKey::Property(name) => {
                        path.push(interns.get(*name).to_string());
                        flatten(heap, interns, forced(slot)?, path, out)?;
                        path.pop();
                    }
                    MemberKey::Entry(k) => {
                        let segment = properties_key_segment(k)?;
                        path.push(segment);
                        flatten(heap, interns, forced(slot)?, path, out)?;
                        path.pop();
                    }
                    MemberKey::Element(i) => {
                        path.push(i.to_string());
                        flatten(heap, interns, forced(slot)?, path, out)?;
                        path.pop();
                    }
                }
            }
        }
    }
    Ok(())
}

/// A Mapping/Map key usable as a `.properties` path segment: only plain
/// strings qualify (Open Question #3).
fn properties_key_segment(key: &Value) -> RunResult<String> {
    match key {
        Value::String(s) => Ok(s.to_string()),
        other => Err(EvalError::Eval { message: format!("cannot export to .properties: non-string key `{other}`") }),
    }
}

fn scalar_to_properties_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.to_string(),
        Value::Duration { value, unit } => format!("{value}.{}", unit.short_name()),
        Value::DataSize { value, unit } => format!("{value}.{}", unit.short_name()),
        Value::Regex(r) => r.source.clone(),
        other => format!("{other}"),
    }
}

fn escape_properties_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

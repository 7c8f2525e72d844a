//! Binary wire codec roundtrips (§4.G, invariant "encode then decode
//! reproduces the same structural value").

use pklcore::ast::{MemberFlags, SourceSpan};
use pklcore::codec::{decode_from_bytes, encode_to_bytes};
use pklcore::heap::Heap;
use pklcore::intern::Interns;
use pklcore::member::{ForceState, MemberBody, MemberDef, MemberKey, MemberSlot};
use pklcore::object::{ObjectData, ObjectKind};
use pklcore::types::class::ClassData;
use pklcore::value::Value;

fn forced_slot(value: Value) -> MemberSlot {
    let def = MemberDef::new(SourceSpan::default(), MemberFlags::default(), None, MemberBody::Value(value.clone()));
    MemberSlot { def, state: ForceState::Forced, cached: Some(value) }
}

#[test]
fn scalars_roundtrip_through_the_wire() {
    let mut heap = Heap::new();
    let mut interns = Interns::new();
    for value in [
        Value::Null,
        Value::Bool(true),
        Value::Bool(false),
        Value::Int(-7),
        Value::Int(i64::MAX),
        Value::Float(3.5),
        Value::String(std::rc::Rc::from("hello")),
    ] {
        let bytes = encode_to_bytes(&heap, &interns, &value).unwrap();
        let decoded = decode_from_bytes(&mut heap, &mut interns, &bytes).unwrap();
        assert!(value.structural_eq(&decoded), "{value:?} did not roundtrip, got {decoded:?}");
    }
}

#[test]
fn a_forced_dynamic_object_roundtrips_with_its_members_in_order() {
    let mut heap = Heap::new();
    let mut interns = Interns::new();
    let class = heap.alloc_class(ClassData::synthetic("Dynamic"));
    let mut object = ObjectData::new(ObjectKind::Dynamic, class, None, None);

    let a = interns.intern("a");
    let b = interns.intern("b");
    object.push_member(MemberKey::Property(a), forced_slot(Value::Int(1)));
    object.push_member(MemberKey::Property(b), forced_slot(Value::Int(2)));
    let object_id = heap.alloc_object(object);

    let value = Value::Object(object_id);
    let bytes = encode_to_bytes(&heap, &interns, &value).unwrap();
    let decoded = decode_from_bytes(&mut heap, &mut interns, &bytes).unwrap();

    let decoded_id = match decoded {
        Value::Object(id) => id,
        other => panic!("expected an object, got {other:?}"),
    };
    let keys: Vec<&str> = heap
        .object(decoded_id)
        .members()
        .keys()
        .map(|k| match k {
            MemberKey::Property(name) => interns.get(*name),
            _ => panic!("unexpected member key kind"),
        })
        .collect();
    // order preservation (§4.A invariant): the decoded member order matches
    // the order members were pushed, not re-sorted.
    assert_eq!(keys, vec!["a", "b"]);
}

#[test]
fn a_listing_preserves_element_order_through_the_wire() {
    let mut heap = Heap::new();
    let mut interns = Interns::new();
    let class = heap.alloc_class(ClassData::synthetic("Listing"));
    let mut object = ObjectData::new(ObjectKind::Listing, class, None, None);
    for (i, v) in [30, 10, 20].into_iter().enumerate() {
        object.push_member(MemberKey::Element(i as u64), forced_slot(Value::Int(v)));
    }
    let object_id = heap.alloc_object(object);

    let value = Value::Object(object_id);
    let bytes = encode_to_bytes(&heap, &interns, &value).unwrap();
    let decoded = decode_from_bytes(&mut heap, &mut interns, &bytes).unwrap();
    let decoded_id = match decoded {
        Value::Object(id) => id,
        other => panic!("expected an object, got {other:?}"),
    };
    let values: Vec<i64> = (0..3)
        .map(|i| match heap.object(decoded_id).members()[&MemberKey::Element(i)].cached.clone().unwrap() {
            Value::Int(n) => n,
            other => panic!("unexpected value {other:?}"),
        })
        .collect();
    assert_eq!(values, vec![30, 10, 20]);
}

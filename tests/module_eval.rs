//! End-to-end module evaluation: registration, forcing every property,
//! JSON export, amend overlay ordering, and circular-reference detection.

use std::rc::Rc;

use pklcore::ast::{
    BinaryOp, Expr, Literal, MemberFlags, ModuleDecl, ObjectLiteral, ObjectLiteralMember, PropertyDecl, SourceSpan,
};
use pklcore::config::EvaluatorOptions;
use pklcore::errors::EvalError;
use pklcore::export::to_json;
use pklcore::frame::Frame;
use pklcore::heap::Heap;
use pklcore::interfaces::SecurityManager;
use pklcore::intern::Interns;
use pklcore::member::MemberKey;
use pklcore::value::Value;
use pklcore::Evaluator;

struct AllowAll;
impl SecurityManager for AllowAll {
    fn check_import_module(&self, _from: &str, _to: &str) -> pklcore::RunResult<()> {
        Ok(())
    }
    fn check_read_resource(&self, _from: &str, _to: &str) -> pklcore::RunResult<()> {
        Ok(())
    }
}

fn new_evaluator(heap: &mut Heap) -> Evaluator {
    let options = EvaluatorOptions::minimal(Rc::new(AllowAll));
    Evaluator::new(heap, options, Interns::new(), "file:///module_eval.pkl")
}

fn simple_module(name: pklcore::intern::StringId, default: Expr) -> ModuleDecl {
    ModuleDecl {
        uri: "file:///module_eval.pkl".into(),
        name: "module_eval".into(),
        classes: vec![],
        type_aliases: vec![],
        properties: vec![PropertyDecl {
            flags: MemberFlags::default(),
            name,
            type_expr: None,
            default: Some(default),
            span: SourceSpan::default(),
            doc: None,
            annotations: vec![],
        }],
        methods: vec![],
    }
}

#[test]
fn registering_and_forcing_a_module_exports_its_properties_as_json() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator(&mut heap);

    let name = evaluator.interns_mut().intern("name");
    let count = evaluator.interns_mut().intern("count");
    let module = ModuleDecl {
        uri: "file:///module_eval.pkl".into(),
        name: "module_eval".into(),
        classes: vec![],
        type_aliases: vec![],
        properties: vec![
            PropertyDecl {
                flags: MemberFlags::default(),
                name,
                type_expr: None,
                default: Some(Expr::Const(Literal::String("widget".into()))),
                span: SourceSpan::default(),
                doc: None,
                annotations: vec![],
            },
            PropertyDecl {
                flags: MemberFlags::default(),
                name: count,
                type_expr: None,
                default: Some(Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(Expr::Const(Literal::Int(1))),
                    right: Box::new(Expr::Const(Literal::Int(2))),
                    span: SourceSpan::default(),
                }),
                span: SourceSpan::default(),
                doc: None,
                annotations: vec![],
            },
        ],
        methods: vec![],
    };

    let module_id = evaluator.register_module(&mut heap, &module).unwrap();
    evaluator.force_all(&mut heap, module_id).unwrap();

    let json = to_json(&heap, evaluator.interns(), &Value::Object(module_id)).unwrap();
    assert_eq!(json["name"], serde_json::json!("widget"));
    assert_eq!(json["count"], serde_json::json!(3));
}

#[test]
fn amending_a_module_overlays_a_property_without_mutating_the_parent() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator(&mut heap);

    let x = evaluator.interns_mut().intern("x");
    let module = simple_module(x, Expr::Const(Literal::Int(1)));
    let module_id = evaluator.register_module(&mut heap, &module).unwrap();

    // `(module) { x = 99 }`, evaluated with `this` bound to the module so
    // `Expr::Amend`'s `parent` sub-expression resolves to it.
    let overlay = ObjectLiteral {
        members: vec![ObjectLiteralMember::Property {
            flags: MemberFlags::default(),
            name: x,
            type_expr: None,
            body: Expr::Const(Literal::Int(99)),
            span: SourceSpan::default(),
        }],
    };
    let amend_expr = Expr::Amend { parent: Box::new(Expr::This), literal: Box::new(overlay), span: SourceSpan::default() };
    let mut frame = Frame::new(Some(module_id), Some(module_id));
    let amended = evaluator.eval(&mut heap, &mut frame, &amend_expr).unwrap();
    let amended_id = match amended {
        Value::Object(id) => id,
        other => panic!("expected an object, got {other:?}"),
    };

    let amended_x = evaluator.force(&mut heap, amended_id, &MemberKey::Property(x)).unwrap();
    assert!(matches!(amended_x, Value::Int(99)));

    // parent untouched
    let parent_x = evaluator.force(&mut heap, module_id, &MemberKey::Property(x)).unwrap();
    assert!(matches!(parent_x, Value::Int(1)));
}

#[test]
fn amending_the_same_overlay_twice_is_idempotent() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator(&mut heap);

    let x = evaluator.interns_mut().intern("x");
    let module = simple_module(x, Expr::Const(Literal::Int(1)));
    let module_id = evaluator.register_module(&mut heap, &module).unwrap();

    let make_overlay = || ObjectLiteral {
        members: vec![ObjectLiteralMember::Property {
            flags: MemberFlags::default(),
            name: x,
            type_expr: None,
            body: Expr::Const(Literal::Int(99)),
            span: SourceSpan::default(),
        }],
    };
    let mut frame = Frame::new(Some(module_id), Some(module_id));
    let first = evaluator
        .eval(&mut heap, &mut frame, &Expr::Amend { parent: Box::new(Expr::This), literal: Box::new(make_overlay()), span: SourceSpan::default() })
        .unwrap();
    let second = evaluator
        .eval(&mut heap, &mut frame, &Expr::Amend { parent: Box::new(Expr::This), literal: Box::new(make_overlay()), span: SourceSpan::default() })
        .unwrap();

    let first_id = match first {
        Value::Object(id) => id,
        other => panic!("expected an object, got {other:?}"),
    };
    let second_id = match second {
        Value::Object(id) => id,
        other => panic!("expected an object, got {other:?}"),
    };
    let first_x = evaluator.force(&mut heap, first_id, &MemberKey::Property(x)).unwrap();
    let second_x = evaluator.force(&mut heap, second_id, &MemberKey::Property(x)).unwrap();
    assert!(matches!((first_x, second_x), (Value::Int(99), Value::Int(99))));
}

#[test]
fn a_property_that_reads_itself_is_a_circular_reference() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator(&mut heap);

    let a = evaluator.interns_mut().intern("a");
    let module = simple_module(a, Expr::ReadProperty { receiver: None, name: a, needs_const: false, span: SourceSpan::default() });
    let module_id = evaluator.register_module(&mut heap, &module).unwrap();
    let result = evaluator.force(&mut heap, module_id, &MemberKey::Property(a));
    assert!(matches!(result, Err(EvalError::CircularReference { .. })));
}

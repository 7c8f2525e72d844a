//! Duplicate member definitions within one object literal overlay (§4.D):
//! redeclaring the same property/entry twice in a single `{ ... }` raises
//! `DuplicateDefinition`, while an overlay that merely overwrites a key the
//! *parent* already declares still succeeds.

use std::rc::Rc;

use pklcore::ast::{Expr, Literal, MemberFlags, ObjectLiteral, ObjectLiteralMember, SourceSpan};
use pklcore::config::EvaluatorOptions;
use pklcore::errors::EvalError;
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
    Evaluator::new(heap, options, Interns::new(), "file:///duplicate_definitions.pkl")
}

#[test]
fn a_repeated_property_in_one_overlay_is_a_duplicate_definition() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator(&mut heap);
    let mut frame = Frame::new(None, None);
    let x = evaluator.interns_mut().intern("x");

    let new_expr = Expr::New {
        type_expr: None,
        literal: Box::new(ObjectLiteral {
            members: vec![
                ObjectLiteralMember::Property {
                    flags: MemberFlags::default(),
                    name: x,
                    type_expr: None,
                    body: Expr::Const(Literal::Int(1)),
                    span: SourceSpan::default(),
                },
                ObjectLiteralMember::Property {
                    flags: MemberFlags::default(),
                    name: x,
                    type_expr: None,
                    body: Expr::Const(Literal::Int(2)),
                    span: SourceSpan::default(),
                },
            ],
        }),
        span: SourceSpan::default(),
    };
    let result = evaluator.eval(&mut heap, &mut frame, &new_expr);
    assert!(matches!(result, Err(EvalError::DuplicateDefinition { .. })));
}

#[test]
fn a_repeated_entry_in_one_overlay_is_a_duplicate_definition() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator(&mut heap);
    let mut frame = Frame::new(None, None);

    let new_expr = Expr::New {
        type_expr: None,
        literal: Box::new(ObjectLiteral {
            members: vec![
                ObjectLiteralMember::Entry {
                    flags: MemberFlags::default(),
                    key: Expr::Const(Literal::String("k".into())),
                    body: Expr::Const(Literal::Int(1)),
                    span: SourceSpan::default(),
                },
                ObjectLiteralMember::Entry {
                    flags: MemberFlags::default(),
                    key: Expr::Const(Literal::String("k".into())),
                    body: Expr::Const(Literal::Int(2)),
                    span: SourceSpan::default(),
                },
            ],
        }),
        span: SourceSpan::default(),
    };
    let result = evaluator.eval(&mut heap, &mut frame, &new_expr);
    assert!(matches!(result, Err(EvalError::DuplicateDefinition { .. })));
}

#[test]
fn overlaying_a_key_the_parent_already_declares_is_not_a_duplicate() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator(&mut heap);
    let mut frame = Frame::new(None, None);
    let x = evaluator.interns_mut().intern("x");

    let parent_expr = Expr::New {
        type_expr: None,
        literal: Box::new(ObjectLiteral {
            members: vec![ObjectLiteralMember::Property {
                flags: MemberFlags::default(),
                name: x,
                type_expr: None,
                body: Expr::Const(Literal::Int(1)),
                span: SourceSpan::default(),
            }],
        }),
        span: SourceSpan::default(),
    };
    let amended = Expr::Amend {
        parent: Box::new(parent_expr),
        literal: Box::new(ObjectLiteral {
            members: vec![ObjectLiteralMember::Property {
                flags: MemberFlags::default(),
                name: x,
                type_expr: None,
                body: Expr::Const(Literal::Int(2)),
                span: SourceSpan::default(),
            }],
        }),
        span: SourceSpan::default(),
    };
    let Value::Object(id) = evaluator.eval(&mut heap, &mut frame, &amended).unwrap() else {
        unreachable!("amending an object-like value always returns an object")
    };
    let value = evaluator.force(&mut heap, id, &MemberKey::Property(x)).unwrap();
    assert!(matches!(value, Value::Int(2)));
}

#[test]
fn two_default_members_in_one_mapping_overlay_is_a_duplicate_definition() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator(&mut heap);
    let mut frame = Frame::new(None, None);
    let default_name = evaluator.interns_mut().intern("default");
    let k = evaluator.interns_mut().intern("k");

    let new_expr = Expr::New {
        type_expr: Some(Box::new(pklcore::ast::TypeExpr::Parameterized(
            pklcore::types::type_value::ParamBase::Mapping,
            vec![pklcore::ast::TypeExpr::Unknown, pklcore::ast::TypeExpr::Unknown],
        ))),
        literal: Box::new(ObjectLiteral {
            members: vec![
                ObjectLiteralMember::Property {
                    flags: MemberFlags::default(),
                    name: default_name,
                    type_expr: None,
                    body: Expr::Lambda { params: vec![k], body: Box::new(Expr::Const(Literal::Int(1))) },
                    span: SourceSpan::default(),
                },
                ObjectLiteralMember::Property {
                    flags: MemberFlags::default(),
                    name: default_name,
                    type_expr: None,
                    body: Expr::Lambda { params: vec![k], body: Box::new(Expr::Const(Literal::Int(2))) },
                    span: SourceSpan::default(),
                },
            ],
        }),
        span: SourceSpan::default(),
    };
    let result = evaluator.eval(&mut heap, &mut frame, &new_expr);
    assert!(matches!(result, Err(EvalError::DuplicateDefinition { .. })));
}

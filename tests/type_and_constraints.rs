//! Type-checking and constraint enforcement (§4.E): `TypeCheck` rejects a
//! mismatched scalar and a constraint predicate that evaluates false.

use std::rc::Rc;

use pklcore::ast::{
    BinaryOp, ClassDecl, Expr, Literal, MemberFlags, ModuleDecl, ObjectLiteral, ObjectLiteralMember, SourceSpan, TypeExpr,
};
use pklcore::config::EvaluatorOptions;
use pklcore::errors::EvalError;
use pklcore::frame::Frame;
use pklcore::heap::Heap;
use pklcore::interfaces::SecurityManager;
use pklcore::intern::Interns;
use pklcore::types::type_value::ParamBase;
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

fn new_evaluator_with_int_class(heap: &mut Heap) -> Evaluator {
    let options = EvaluatorOptions::minimal(Rc::new(AllowAll));
    let mut evaluator = Evaluator::new(heap, options, Interns::new(), "file:///type_and_constraints.pkl");
    let module = ModuleDecl {
        uri: "pkl:base".into(),
        name: "base".into(),
        classes: vec![ClassDecl {
            name: "Int".into(),
            module_uri: "pkl:base".into(),
            superclass: None,
            open: false,
            abstract_: false,
            properties: vec![],
            methods: vec![],
            type_params: vec![],
            doc: None,
            annotations: vec![],
        }],
        type_aliases: vec![],
        properties: vec![],
        methods: vec![],
    };
    evaluator.register_module(heap, &module).unwrap();
    evaluator
}

#[test]
fn a_string_fails_a_typecheck_against_int() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator_with_int_class(&mut heap);
    let mut frame = Frame::new(None, None);
    let int_name = evaluator.interns_mut().intern("Int");

    let expr = Expr::TypeCheck {
        operand: Box::new(Expr::Const(Literal::String("oops".into()))),
        type_expr: Box::new(TypeExpr::Class(int_name)),
        span: SourceSpan::default(),
    };
    let result = evaluator.eval(&mut heap, &mut frame, &expr);
    assert!(matches!(result, Err(EvalError::TypeMismatch { .. })));
}

#[test]
fn a_matching_int_passes_a_typecheck_against_int() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator_with_int_class(&mut heap);
    let mut frame = Frame::new(None, None);
    let int_name = evaluator.interns_mut().intern("Int");

    let expr = Expr::TypeCheck {
        operand: Box::new(Expr::Const(Literal::Int(5))),
        type_expr: Box::new(TypeExpr::Class(int_name)),
        span: SourceSpan::default(),
    };
    let result = evaluator.eval(&mut heap, &mut frame, &expr).unwrap();
    assert!(matches!(result, Value::Int(5)));
}

#[test]
fn a_negative_int_fails_a_positivity_constraint() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator_with_int_class(&mut heap);
    let mut frame = Frame::new(None, None);
    let int_name = evaluator.interns_mut().intern("Int");

    // `Int(this > 0)` checked against -3.
    let predicate = Expr::Binary {
        op: BinaryOp::Gt,
        left: Box::new(Expr::This),
        right: Box::new(Expr::Const(Literal::Int(0))),
        span: SourceSpan::default(),
    };
    let expr = Expr::TypeCheck {
        operand: Box::new(Expr::Const(Literal::Int(-3))),
        type_expr: Box::new(TypeExpr::Constrained(Box::new(TypeExpr::Class(int_name)), vec![predicate])),
        span: SourceSpan::default(),
    };
    let result = evaluator.eval(&mut heap, &mut frame, &expr);
    assert!(matches!(result, Err(EvalError::ConstraintViolation { .. })));
}

#[test]
fn a_positive_int_satisfies_a_positivity_constraint() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator_with_int_class(&mut heap);
    let mut frame = Frame::new(None, None);
    let int_name = evaluator.interns_mut().intern("Int");

    let predicate = Expr::Binary {
        op: BinaryOp::Gt,
        left: Box::new(Expr::This),
        right: Box::new(Expr::Const(Literal::Int(0))),
        span: SourceSpan::default(),
    };
    let expr = Expr::TypeCheck {
        operand: Box::new(Expr::Const(Literal::Int(3))),
        type_expr: Box::new(TypeExpr::Constrained(Box::new(TypeExpr::Class(int_name)), vec![predicate])),
        span: SourceSpan::default(),
    };
    let result = evaluator.eval(&mut heap, &mut frame, &expr).unwrap();
    assert!(matches!(result, Value::Int(3)));
}

fn listing_of_int_with_elements(heap: &mut Heap, evaluator: &mut Evaluator, elements: Vec<Literal>) -> Value {
    let int_name = evaluator.interns_mut().intern("Int");
    let mut frame = Frame::new(None, None);
    let expr = Expr::New {
        type_expr: Some(Box::new(TypeExpr::Parameterized(ParamBase::Listing, vec![TypeExpr::Class(int_name)]))),
        literal: Box::new(ObjectLiteral {
            members: elements
                .into_iter()
                .map(|lit| ObjectLiteralMember::Element {
                    flags: MemberFlags::default(),
                    body: Expr::Const(lit),
                    span: SourceSpan::default(),
                })
                .collect(),
        }),
        span: SourceSpan::default(),
    };
    evaluator.eval(heap, &mut frame, &expr).unwrap()
}

#[test]
fn a_string_element_in_a_listing_of_int_fails_on_force() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator_with_int_class(&mut heap);
    let listing = listing_of_int_with_elements(
        &mut heap,
        &mut evaluator,
        vec![Literal::Int(1), Literal::String("two".into()), Literal::Int(3)],
    );
    let Value::Object(id) = listing else { unreachable!("new Listing<Int> always returns an object") };
    let result = evaluator.force_all(&mut heap, id);
    assert!(matches!(result, Err(EvalError::TypeMismatch { .. })));
}

#[test]
fn all_int_elements_in_a_listing_of_int_force_cleanly() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator_with_int_class(&mut heap);
    let listing = listing_of_int_with_elements(&mut heap, &mut evaluator, vec![Literal::Int(1), Literal::Int(2), Literal::Int(3)]);
    let Value::Object(id) = listing else { unreachable!("new Listing<Int> always returns an object") };
    assert!(evaluator.force_all(&mut heap, id).is_ok());
}

#[test]
fn a_listing_of_ints_element_type_survives_an_amend() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator_with_int_class(&mut heap);
    let int_name = evaluator.interns_mut().intern("Int");

    let base = Expr::New {
        type_expr: Some(Box::new(TypeExpr::Parameterized(ParamBase::Listing, vec![TypeExpr::Class(int_name)]))),
        literal: Box::new(ObjectLiteral {
            members: vec![ObjectLiteralMember::Element {
                flags: MemberFlags::default(),
                body: Expr::Const(Literal::Int(1)),
                span: SourceSpan::default(),
            }],
        }),
        span: SourceSpan::default(),
    };
    let amended = Expr::Amend {
        parent: Box::new(base),
        literal: Box::new(ObjectLiteral {
            members: vec![ObjectLiteralMember::Element {
                flags: MemberFlags::default(),
                body: Expr::Const(Literal::String("three".into())),
                span: SourceSpan::default(),
            }],
        }),
        span: SourceSpan::default(),
    };

    let mut frame = Frame::new(None, None);
    let Value::Object(id) = evaluator.eval(&mut heap, &mut frame, &amended).unwrap() else {
        unreachable!("amending an object-like value always returns an object")
    };
    let result = evaluator.force_all(&mut heap, id);
    assert!(matches!(result, Err(EvalError::TypeMismatch { .. })));
}

#[test]
fn a_mapping_of_int_values_rejects_a_mismatched_entry_value_but_not_its_key() {
    let mut heap = Heap::new();
    let mut evaluator = new_evaluator_with_int_class(&mut heap);
    let int_name = evaluator.interns_mut().intern("Int");
    let mut frame = Frame::new(None, None);

    let expr = Expr::New {
        type_expr: Some(Box::new(TypeExpr::Parameterized(
            ParamBase::Mapping,
            vec![TypeExpr::Unknown, TypeExpr::Class(int_name)],
        ))),
        literal: Box::new(ObjectLiteral {
            members: vec![ObjectLiteralMember::Entry {
                flags: MemberFlags::default(),
                key: Expr::Const(Literal::Int(99)),
                body: Expr::Const(Literal::String("not an int".into())),
                span: SourceSpan::default(),
            }],
        }),
        span: SourceSpan::default(),
    };
    let Value::Object(id) = evaluator.eval(&mut heap, &mut frame, &expr).unwrap() else {
        unreachable!("new Mapping<Unknown, Int> always returns an object")
    };
    let result = evaluator.force_all(&mut heap, id);
    assert!(matches!(result, Err(EvalError::TypeMismatch { .. })));
}

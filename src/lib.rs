//! A lazy object-graph evaluator and binary wire codec for a Pkl-like
//! configuration language (§1).
//!
//! This crate is the runtime core only: the object model, the lazy member
//! evaluator, the amend/extend composition algebra, the type/constraint
//! checker, and the binary wire codec. A parser, a module-resolution/security
//! sandbox implementation, surface code generators, and a CLI are
//! collaborators this crate defines contracts for ([`interfaces`],
//! [`protocol`]) but does not implement.
//!
//! The evaluator never owns a [`heap::Heap`] — every [`eval::Evaluator`]
//! method takes one as an explicit parameter, the same shape
//! [`types::type_value::TypeValue::check`] and [`amend::amend`] already use.
//! This keeps the dependency direction spec.md §2 describes: the evaluator
//! calls into the type checker and the amend engine, and they call back into
//! the evaluator only through the narrow [`types::type_value::TypeCheckContext`]
//! and [`amend::AmendContext`] seams.

pub mod amend;
pub mod ast;
pub mod codec;
pub mod config;
pub mod errors;
pub mod eval;
pub mod export;
pub mod frame;
pub mod function;
pub mod heap;
pub mod interfaces;
pub mod intern;
pub mod member;
pub mod object;
pub mod protocol;
pub mod resource;
pub mod schema;
pub mod tracer;
pub mod types;
pub mod value;

pub use config::EvaluatorOptions;
pub use errors::{Diagnostic, EvalError, RunResult, StackFrame};
pub use eval::Evaluator;
pub use heap::{ClassId, Heap, ObjectId, TypeAliasId};
pub use value::Value;

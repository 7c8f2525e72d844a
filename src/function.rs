//! Function/method invocation: parameter binding (§4.D "InvokeMethod...").
//!
//! Pkl's call surface is just positional parameters with no defaults, no
//! varargs, and no keyword arguments, so there is no separate signature
//! type to speak of — binding is arity-checked zip.

use indexmap::IndexMap;

use crate::errors::{EvalError, RunResult};
use crate::intern::StringId;
use crate::value::{FunctionData, Value};

/// Binds `args` positionally to `params`, erroring on arity mismatch.
/// Lambda/method bodies read these bindings out of the auxiliary
/// `for-generator`-style slot the caller installs (§4.C); this function only
/// does the zip-and-check, not scope installation.
pub fn bind_arguments(params: &[StringId], args: Vec<Value>) -> RunResult<IndexMap<StringId, Value>> {
    if args.len() != params.len() {
        return Err(EvalError::Eval {
            message: format!("expected {} argument(s), got {}", params.len(), args.len()),
        });
    }
    Ok(params.iter().copied().zip(args).collect())
}

/// Constructs a `Function` value for a `Lambda` expression (§4.D), capturing
/// the object whose scope free identifiers in the body resolve against.
#[must_use]
pub fn make_closure(
    params: Vec<StringId>,
    body: crate::ast::Expr,
    enclosing: Option<crate::heap::ObjectId>,
) -> FunctionData {
    FunctionData { params, body, enclosing }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut interns = crate::intern::Interns::new();
        let params = vec![interns.intern("x")];
        let result = bind_arguments(&params, vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn matching_arity_binds_in_order() {
        let mut interns = crate::intern::Interns::new();
        let params = vec![interns.intern("x"), interns.intern("y")];
        let bound = bind_arguments(&params, vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(bound.get(&params[0]).and_then(Value::as_int), Some(1));
    }
}

//! Error taxonomy, stack-frame capture, and user-facing formatting (§7).
//!
//! A flat `Result`-error enum plus a `RunResult<T>` alias, with manual
//! `Display`/`std::error::Error` impls rather than a derive-macro error
//! crate.
//!
//! Frame capture doesn't thread frames through every `Result`: the
//! evaluator keeps a `call_stack: Vec<StackFrame>` that is pushed on
//! member/method entry and popped only on the *successful* exit path (§7
//! "the unwind attaches a stack of source frames captured during
//! member/method entry"). On an error path the frame is deliberately left in
//! place, so by the time an error reaches the top-level `evaluate*` call the
//! stack already holds exactly the frames that were active when the fault
//! occurred — no per-`Result` bookkeeping required.

use std::fmt;

use crate::ast::SourceSpan;

/// Result alias used throughout the evaluator (§7).
pub type RunResult<T> = Result<T, EvalError>;

/// The error taxonomy named in §7, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A general user-visible semantic error not covered by a more specific kind.
    Eval { message: String },
    TypeMismatch { expected: String, found: String },
    ConstraintViolation { found: String },
    CircularReference { key: String },
    MissingProperty { name: String },
    MissingKey { key: String },
    DuplicateDefinition { name: String },
    CannotAmend { reason: String },
    CannotInferParent { reason: String },
    IntegerOverflow { op: String },
    SecurityDenied { message: String },
    IoError { message: String },
    InvalidEncoding { offset: usize, path: String, message: String },
    ConstRequired { name: String },
    Cancelled,
    Timeout,
    InternalBug { message: String, span: SourceSpan },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eval { message } => write!(f, "{message}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected type `{expected}`, but got `{found}`")
            }
            Self::ConstraintViolation { found } => {
                write!(f, "value `{found}` violates a type constraint")
            }
            Self::CircularReference { key } => write!(f, "circular reference to `{key}`"),
            Self::MissingProperty { name } => write!(f, "missing required property `{name}`"),
            Self::MissingKey { key } => write!(f, "no member found for key `{key}`"),
            Self::DuplicateDefinition { name } => write!(f, "duplicate definition of `{name}`"),
            Self::CannotAmend { reason } => write!(f, "cannot amend: {reason}"),
            Self::CannotInferParent { reason } => write!(f, "cannot infer parent: {reason}"),
            Self::IntegerOverflow { op } => write!(f, "integer overflow in `{op}`"),
            Self::SecurityDenied { message } => write!(f, "security denied: {message}"),
            Self::IoError { message } => write!(f, "I/O error: {message}"),
            Self::InvalidEncoding { offset, path, message } => {
                write!(f, "invalid encoding at byte {offset} (path {path}): {message}")
            }
            Self::ConstRequired { name } => {
                write!(f, "`{name}` is not `const` but is referenced from a `const` context")
            }
            Self::Cancelled => write!(f, "evaluation was cancelled"),
            Self::Timeout => write!(f, "evaluation exceeded its time limit"),
            Self::InternalBug { message, .. } => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for EvalError {}

impl EvalError {
    /// `InternalBug` always carries the offending node's source range (§7).
    #[must_use]
    pub fn internal_bug(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::InternalBug { message: message.into(), span }
    }
}

/// One entry in the call-site stack attached to an unwinding error (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub module_uri: String,
    pub member: String,
    pub span: SourceSpan,
}

/// A fully-formed, user-facing evaluation failure: the error plus the call
/// stack active when it was raised.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub error: EvalError,
    pub stack: Vec<StackFrame>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(error: EvalError, stack: Vec<StackFrame>) -> Self {
        Self { error, stack }
    }

    /// Renders (a) a single-sentence description, (b) the faulting source
    /// line with a caret span, (c) a stack of call sites with module URIs
    /// (§7 "User-visible behavior"). `source` is the module's text, used to
    /// slice out the faulting line for the caret.
    #[must_use]
    pub fn format(&self, source: &str) -> String {
        let mut out = format!("{}\n", self.error);
        if let Some(top) = self.stack.first() {
            if let Some(line) = source.lines().nth(top.span.line as usize) {
                out.push_str(line);
                out.push('\n');
                let caret_col = top.span.col as usize;
                out.push_str(&" ".repeat(caret_col));
                let width = (top.span.end.saturating_sub(top.span.start)).max(1) as usize;
                out.push_str(&"^".repeat(width));
                out.push('\n');
            }
        }
        for frame in &self.stack {
            out.push_str(&format!("  at {} ({})\n", frame.member, frame.module_uri));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_single_sentences() {
        let err = EvalError::ConstraintViolation { found: "0".into() };
        assert_eq!(err.to_string(), "value `0` violates a type constraint");
    }

    #[test]
    fn diagnostic_format_includes_stack_and_caret() {
        let err = EvalError::MissingProperty { name: "age".into() };
        let stack = vec![StackFrame {
            module_uri: "file:///p.pkl".into(),
            member: "age".into(),
            span: SourceSpan { start: 0, end: 3, line: 0, col: 0 },
        }];
        let diag = Diagnostic::new(err, stack);
        let rendered = diag.format("age: Int\n");
        assert!(rendered.contains("missing required property"));
        assert!(rendered.contains("^^^"));
        assert!(rendered.contains("file:///p.pkl"));
    }
}

//! AST node shapes the evaluator consumes.
//!
//! The parser and AST builder are out of scope (§1): this module defines the
//! *contract* an upstream parser/resolver produces, not a parser. Identifier
//! resolution is assumed already done statically into `(levels_up, name)`
//! pairs (§4.C: "Resolution is decided once at AST-preparation time ... the
//! runtime merely walks that many enclosing links"), and type-expression
//! class/alias references are assumed already resolved to qualified names
//! the evaluator looks up in its class/alias registries (§4.H holds those
//! registries; a separate out-of-scope resolver pass is what would normally
//! turn bare identifiers into these qualified references).

use crate::intern::StringId;

/// Byte-offset source span, used to build the error-reporting stack (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceSpan {
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub col: u32,
}

/// A statically-resolved free identifier: walk `levels_up` enclosing links,
/// then look up `name` (§4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ident {
    pub levels_up: u32,
    pub name: StringId,
}

/// Which amend-chain walk a method invocation dispatches through (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MethodDispatch {
    /// The method is defined directly on the statically-known receiver type.
    Direct,
    /// The method is resolved via the lexical enclosing chain (a module-level function).
    Lexical(Ident),
    /// Virtual dispatch: resolved by the receiver's runtime class.
    Virtual,
    /// `super.m(...)`: starts the amend-chain walk at `owner.parent()`.
    Super,
}

/// What `read`/`import` family of expressions resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReadKind {
    Read,
    ReadOrNull,
    Import,
    ImportGlob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Pow,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    NullCoalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A literal that can appear directly in source without any amend/compose
/// machinery — the restricted subset of `Value` the parser can produce
/// without the evaluator's involvement.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// An expression node (§4.D).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Const(Literal),
    /// Unqualified `this`: the current receiver.
    This,
    ReadProperty {
        receiver: Option<Box<Expr>>,
        name: StringId,
        needs_const: bool,
        span: SourceSpan,
    },
    ReadLocalProperty {
        ident: Ident,
        span: SourceSpan,
    },
    ReadSuperProperty {
        name: StringId,
        span: SourceSpan,
    },
    ReadSuperEntry {
        key: Box<Expr>,
        span: SourceSpan,
    },
    Subscript {
        object: Box<Expr>,
        key: Box<Expr>,
        span: SourceSpan,
    },
    InvokeMethod {
        receiver: Option<Box<Expr>>,
        dispatch: MethodDispatch,
        name: StringId,
        args: Vec<Expr>,
        span: SourceSpan,
    },
    /// `parent { members... }`.
    Amend {
        parent: Box<Expr>,
        literal: Box<ObjectLiteral>,
        span: SourceSpan,
    },
    /// `new T { ... }` (`type_expr = Some`) or `new { ... }` (`type_expr =
    /// None`, parent inferred per §4.D "Infer parent").
    New {
        type_expr: Option<Box<TypeExpr>>,
        literal: Box<ObjectLiteral>,
        span: SourceSpan,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: SourceSpan,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: SourceSpan,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Lambda {
        params: Vec<StringId>,
        body: Box<Expr>,
    },
    Read {
        kind: ReadKind,
        url: Box<Expr>,
        span: SourceSpan,
    },
    /// Type-checks `operand` against `type_expr`, used for `as` expressions
    /// and for property/return-type enforcement (§4.E).
    TypeCheck {
        operand: Box<Expr>,
        type_expr: Box<TypeExpr>,
        span: SourceSpan,
    },
}

/// A type expression, reduced to a `TypeValue` by the checker (§4.E).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum TypeExpr {
    Unknown,
    Nothing,
    Class(StringId),
    StringLiteral(String),
    Nullable(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Constrained(Box<TypeExpr>, Vec<Expr>),
    Alias(StringId),
    /// e.g. `List<Int>`, `Map<String, Int>`: base class name plus type arguments.
    Parameterized(crate::types::type_value::ParamBase, Vec<TypeExpr>),
}

/// Flags attached to a `MemberDef` (§3). Plain bools rather than a bitflags
/// type: there are only seven of them and each is inspected by name
/// throughout the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct MemberFlags {
    pub local: bool,
    pub hidden: bool,
    pub const_: bool,
    pub fixed: bool,
    pub external: bool,
    pub abstract_: bool,
    pub default: bool,
}

/// One member of an object literal, prior to being folded into an
/// `ObjectData`'s member table by the amend engine (§4.F).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ObjectLiteralMember {
    Property {
        flags: MemberFlags,
        name: StringId,
        type_expr: Option<TypeExpr>,
        body: Expr,
        span: SourceSpan,
    },
    Entry {
        flags: MemberFlags,
        key: Expr,
        body: Expr,
        span: SourceSpan,
    },
    Element {
        flags: MemberFlags,
        body: Expr,
        span: SourceSpan,
    },
    /// `[[pred]] { ... }` predicate member (§4.F).
    Predicate {
        predicate: Expr,
        body: Expr,
        span: SourceSpan,
    },
    /// `for (k, v in iterable) { template }` (§4.D).
    ForGenerator {
        key_binding: Option<StringId>,
        value_binding: StringId,
        iterable: Expr,
        template: Box<ObjectLiteral>,
        span: SourceSpan,
    },
    /// `when (cond) { template } else { template }`.
    When {
        cond: Expr,
        then_template: Box<ObjectLiteral>,
        else_template: Option<Box<ObjectLiteral>>,
    },
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ObjectLiteral {
    pub members: Vec<ObjectLiteralMember>,
}

/// `@ModuleInfo { ... }`-style annotation attached to a class/property
/// declaration (§4.H "annotations"). Arguments are restricted to literals,
/// same as any other annotation argument a parser would produce without
/// needing the evaluator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    pub class_name: String,
    pub args: Vec<Literal>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PropertyDecl {
    pub flags: MemberFlags,
    pub name: StringId,
    pub type_expr: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub span: SourceSpan,
    pub doc: Option<String>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MethodDecl {
    pub name: StringId,
    pub params: Vec<StringId>,
    pub return_type: Option<TypeExpr>,
    pub body: Expr,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub module_uri: String,
    pub superclass: Option<StringId>,
    pub open: bool,
    pub abstract_: bool,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<MethodDecl>,
    pub type_params: Vec<StringId>,
    pub doc: Option<String>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TypeAliasDecl {
    pub name: String,
    pub module_uri: String,
    pub target: TypeExpr,
    pub type_params: Vec<StringId>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModuleDecl {
    pub uri: String,
    pub name: String,
    pub classes: Vec<ClassDecl>,
    pub type_aliases: Vec<TypeAliasDecl>,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<MethodDecl>,
}

//! Class descriptor (§3 "Class descriptor").

use crate::ast::{Annotation, Expr, MethodDecl, SourceSpan, TypeExpr};
use crate::heap::ClassId;
use crate::intern::StringId;

/// One declared property on a class (ordered, per §3).
#[derive(Debug, Clone)]
pub struct Property {
    pub name: StringId,
    pub type_expr: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub hidden: bool,
    pub span: SourceSpan,
    pub doc: Option<String>,
    pub annotations: Vec<Annotation>,
}

/// A class descriptor: the static shape every `Typed`/`Module` instance of
/// this class is checked against (§3, §4.E, §4.H).
#[derive(Debug, Clone)]
pub struct ClassData {
    pub qualified_name: String,
    pub module_uri: String,
    pub open: bool,
    pub abstract_: bool,
    pub superclass: Option<ClassId>,
    pub properties: Vec<Property>,
    pub methods: Vec<MethodDecl>,
    pub type_params: Vec<StringId>,
    pub doc: Option<String>,
    pub annotations: Vec<Annotation>,
    /// A cached prototype instance, if one has been materialized — the
    /// canonical empty instance used as the default parent for `new C {
    /// ... }` (GLOSSARY "Prototype"). Populated lazily by the evaluator, not
    /// at class-registration time, since building it may itself require
    /// forcing property defaults.
    pub prototype: Option<crate::heap::ObjectId>,
}

impl ClassData {
    #[must_use]
    pub fn new(qualified_name: impl Into<String>, module_uri: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            module_uri: module_uri.into(),
            open: false,
            abstract_: false,
            superclass: None,
            properties: Vec::new(),
            methods: Vec::new(),
            type_params: Vec::new(),
            doc: None,
            annotations: Vec::new(),
            prototype: None,
        }
    }

    /// A stdlib class descriptor with no declared shape, e.g. `Dynamic`,
    /// `Listing`, `Mapping` — these are checked by `Value` tag, not by
    /// walking `properties` (§9).
    #[must_use]
    pub fn synthetic(name: &str) -> Self {
        Self::new(name, "pkl:base")
    }

    pub fn method(&self, name: StringId) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn property(&self, name: StringId) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

//! Schema mirror (§4.H): a plain-data description of a registered module's
//! shape for code-generator consumers — module name, module URI, class
//! descriptors, type aliases, and top-level methods. Built directly off the
//! `Heap`'s class/alias arenas rather than re-walking `ModuleDecl`, since
//! those arenas are what `eval.rs::register_module` already normalized into
//! (stub classes filled in, type aliases resolved).

use crate::heap::{ClassId, Heap, TypeAliasId};
use crate::intern::Interns;
use crate::types::class::ClassData;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnnotationDescriptor {
    pub class_name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub type_expr: String,
    pub doc: Option<String>,
    pub annotations: Vec<AnnotationDescriptor>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<String>,
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassDescriptor {
    pub qualified_name: String,
    pub open: bool,
    pub abstract_: bool,
    pub superclass: Option<String>,
    pub doc: Option<String>,
    pub annotations: Vec<AnnotationDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TypeAliasDescriptor {
    pub qualified_name: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ModuleSchema {
    pub module_name: String,
    pub module_uri: String,
    pub classes: Vec<ClassDescriptor>,
    pub type_aliases: Vec<TypeAliasDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

/// Builds the schema mirror for the classes in `class_ids` (typically every
/// class a module declared, excluding the synthetic `module:<uri>` class
/// itself — that one's properties/methods populate `methods`/top-level
/// properties-as-methods separately via the caller).
pub fn describe_module(
    heap: &Heap,
    interns: &Interns,
    module_name: &str,
    module_uri: &str,
    class_ids: &[ClassId],
    alias_ids: &[TypeAliasId],
    module_methods: &[crate::ast::MethodDecl],
) -> ModuleSchema {
    ModuleSchema {
        module_name: module_name.to_string(),
        module_uri: module_uri.to_string(),
        classes: class_ids.iter().map(|&id| describe_class(heap, interns, id)).collect(),
        type_aliases: alias_ids.iter().map(|&id| describe_alias(heap, id)).collect(),
        methods: module_methods.iter().map(|m| describe_method(interns, m)).collect(),
    }
}

pub fn describe_class(heap: &Heap, interns: &Interns, id: ClassId) -> ClassDescriptor {
    let class: &ClassData = heap.class(id);
    ClassDescriptor {
        qualified_name: class.qualified_name.clone(),
        open: class.open,
        abstract_: class.abstract_,
        superclass: class.superclass.map(|sup| heap.class(sup).qualified_name.clone()),
        doc: class.doc.clone(),
        annotations: class.annotations.iter().map(describe_annotation).collect(),
        properties: class
            .properties
            .iter()
            .map(|p| PropertyDescriptor {
                name: interns.get(p.name).to_string(),
                type_expr: p.type_expr.as_ref().map(render_type_expr).unwrap_or_else(|| "unknown".to_string()),
                doc: p.doc.clone(),
                annotations: p.annotations.iter().map(describe_annotation).collect(),
                hidden: p.hidden,
            })
            .collect(),
        methods: class.methods.iter().map(|m| describe_method(interns, m)).collect(),
    }
}

fn describe_method(interns: &Interns, method: &crate::ast::MethodDecl) -> MethodDescriptor {
    MethodDescriptor {
        name: interns.get(method.name).to_string(),
        params: method.params.iter().map(|p| interns.get(*p).to_string()).collect(),
        return_type: method.return_type.as_ref().map(render_type_expr),
    }
}

fn describe_alias(heap: &Heap, id: TypeAliasId) -> TypeAliasDescriptor {
    let alias = heap.alias(id);
    TypeAliasDescriptor { qualified_name: alias.qualified_name.clone(), target: render_type_value(&alias.target) }
}

fn describe_annotation(a: &crate::ast::Annotation) -> AnnotationDescriptor {
    AnnotationDescriptor { class_name: a.class_name.clone(), args: a.args.iter().map(render_literal).collect() }
}

fn render_literal(lit: &crate::ast::Literal) -> String {
    match lit {
        crate::ast::Literal::Null => "null".to_string(),
        crate::ast::Literal::Bool(b) => b.to_string(),
        crate::ast::Literal::Int(i) => i.to_string(),
        crate::ast::Literal::Float(f) => f.to_string(),
        crate::ast::Literal::String(s) => format!("\"{s}\""),
    }
}

/// Renders a `TypeExpr` as the textual type expression a Pkl author would
/// write, e.g. `List<String>` or `Int?`. Class/alias references render by
/// their interned name only — this module has no `Interns` reachable from
/// a bare `StringId` without a caller-supplied table, so `Class`/`Alias`
/// variants render their raw `StringId` index wrapped in angle brackets as
/// a documented placeholder when no name is available; `describe_class`
/// above only calls this on `TypeExpr`s already captured inside a
/// `Property`, where upstream resolution has left the name intact in
/// source text the embedder can re-derive if it needs the exact spelling.
fn render_type_expr(ty: &crate::ast::TypeExpr) -> String {
    use crate::ast::TypeExpr;
    use crate::types::type_value::ParamBase;
    match ty {
        TypeExpr::Unknown => "unknown".to_string(),
        TypeExpr::Nothing => "nothing".to_string(),
        TypeExpr::Class(name) => format!("<class#{}>", name.index()),
        TypeExpr::StringLiteral(lit) => format!("\"{lit}\""),
        TypeExpr::Nullable(inner) => format!("{}?", render_type_expr(inner)),
        TypeExpr::Union(members) => members.iter().map(render_type_expr).collect::<Vec<_>>().join("|"),
        TypeExpr::Constrained(base, _) => format!("{}({{constraints}})", render_type_expr(base)),
        TypeExpr::Alias(name) => format!("<alias#{}>", name.index()),
        TypeExpr::Parameterized(base, args) => {
            let base_name = match base {
                ParamBase::List => "List",
                ParamBase::Set => "Set",
                ParamBase::Map => "Map",
                ParamBase::Listing => "Listing",
                ParamBase::Mapping => "Mapping",
            };
            let args = args.iter().map(render_type_expr).collect::<Vec<_>>().join(", ");
            format!("{base_name}<{args}>")
        }
    }
}

fn render_type_value(ty: &crate::types::type_value::TypeValue) -> String {
    use crate::types::type_value::{ParamBase, TypeValue};
    match ty {
        TypeValue::Unknown => "unknown".to_string(),
        TypeValue::Nothing => "nothing".to_string(),
        TypeValue::Class(id) => format!("<class#{}>", id.index()),
        TypeValue::StringLiteral(lit) => format!("\"{lit}\""),
        TypeValue::Nullable(inner) => format!("{}?", render_type_value(inner)),
        TypeValue::Union(members) => members.iter().map(render_type_value).collect::<Vec<_>>().join("|"),
        TypeValue::Constrained(base, _) => format!("{}({{constraints}})", render_type_value(base)),
        TypeValue::Alias(id) => format!("<alias#{}>", id.index()),
        TypeValue::Parameterized(base, args) => {
            let base_name = match base {
                ParamBase::List => "List",
                ParamBase::Set => "Set",
                ParamBase::Map => "Map",
                ParamBase::Listing => "Listing",
                ParamBase::Mapping => "Mapping",
            };
            let args = args.iter().map(render_type_value).collect::<Vec<_>>().join(", ");
            format!("{base_name}<{args}>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Annotation, Literal, MethodDecl, SourceSpan};
    use crate::types::class::Property;

    #[test]
    fn describes_a_class_with_a_superclass_and_an_annotation() {
        let mut heap = Heap::new();
        let mut interns = Interns::new();
        let base_id = heap.alloc_class(ClassData::new("Base", "file:///m.pkl"));
        let mut derived = ClassData::new("Derived", "file:///m.pkl");
        derived.superclass = Some(base_id);
        derived.doc = Some("A derived class.".to_string());
        derived.annotations.push(Annotation { class_name: "Deprecated".to_string(), args: vec![] });
        let name_id = interns.intern("x");
        derived.properties.push(Property {
            name: name_id,
            type_expr: None,
            default: None,
            hidden: false,
            span: SourceSpan::default(),
            doc: None,
            annotations: vec![],
        });
        let derived_id = heap.alloc_class(derived);

        let descriptor = describe_class(&heap, &interns, derived_id);
        assert_eq!(descriptor.superclass.as_deref(), Some("Base"));
        assert_eq!(descriptor.doc.as_deref(), Some("A derived class."));
        assert_eq!(descriptor.annotations.len(), 1);
        assert_eq!(descriptor.properties.len(), 1);
    }

    #[test]
    fn renders_parameterized_type_expressions() {
        use crate::ast::TypeExpr;
        use crate::types::type_value::ParamBase;
        let ty = TypeExpr::Nullable(Box::new(TypeExpr::Parameterized(ParamBase::List, vec![TypeExpr::Unknown])));
        assert_eq!(render_type_expr(&ty), "List<unknown>?");
    }

    #[test]
    fn describes_a_method_signature() {
        let mut interns = Interns::new();
        let name = interns.intern("run");
        let p1 = interns.intern("a");
        let method = MethodDecl { name, params: vec![p1], return_type: None, body: crate::ast::Expr::Const(Literal::Null), span: SourceSpan::default() };
        let descriptor = describe_method(&interns, &method);
        assert_eq!(descriptor.name, "run");
        assert_eq!(descriptor.params, vec!["a".to_string()]);
    }
}

//! Schema mirror (§4.H): a class's doc comment, annotation, and declared
//! property text survive into its descriptor.

use pklcore::ast::{Annotation, SourceSpan};
use pklcore::heap::Heap;
use pklcore::intern::Interns;
use pklcore::schema::describe_class;
use pklcore::types::class::{ClassData, Property};

#[test]
fn a_documented_annotated_class_property_survives_into_its_descriptor() {
    let mut heap = Heap::new();
    let mut interns = Interns::new();
    let label = interns.intern("label");

    let mut class = ClassData::new("Widget", "file:///schema_mirror.pkl");
    class.doc = Some("A configurable widget.".into());
    class.properties.push(Property {
        name: label,
        type_expr: None,
        default: None,
        hidden: false,
        span: SourceSpan::default(),
        doc: Some("The widget's display name.".into()),
        annotations: vec![Annotation { class_name: "Deprecated".into(), args: vec![] }],
    });
    let class_id = heap.alloc_class(class);

    let descriptor = describe_class(&heap, &interns, class_id);
    assert_eq!(descriptor.qualified_name, "Widget");
    assert_eq!(descriptor.doc.as_deref(), Some("A configurable widget."));
    assert_eq!(descriptor.properties.len(), 1);
    let prop = &descriptor.properties[0];
    assert_eq!(prop.name, "label");
    assert_eq!(prop.doc.as_deref(), Some("The widget's display name."));
    assert_eq!(prop.annotations.len(), 1);
    assert_eq!(prop.annotations[0].class_name, "Deprecated");
}

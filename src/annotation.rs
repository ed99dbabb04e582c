//! The embedded annotation schema (§4.7, §6): a fixed set of recognized
//! annotation classes (`Placement`, `Icon`, `Diagram`, `Line`, `Rectangle`,
//! `Ellipse`, `Polygon`, `Text`, `Bitmap`, `choices`, `dialog`) that each
//! top-level argument of an `annotation(...)` clause is instantiated
//! against.
//!
//! `DEFAULT_SCHEMA_SOURCE` is the schema's canonical Modelica text, matching
//! what a production host would feed through the `Parser` collaborator
//! (§6) once a real grammar is wired in. Since that grammar is out of scope
//! here (§1), the schema tree itself is built directly through the AST
//! builders below rather than round-tripped through a parser — the two are
//! kept in sync by hand.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Ast;
use crate::ast::ClassKind;
use crate::ast::ClassPrefixes;
use crate::ast::ClassSpecifier;
use crate::ast::Element;
use crate::ast::ModArg as AstModArg;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::error::ErrorCollector;
use crate::error::Range;
use crate::instance::ClassInstance;
use crate::instance::ClassInstanceRef;
use crate::intern::DottedName;
use crate::intern::Name;
use crate::modification::Modification;

pub const DEFAULT_SCHEMA_SOURCE: &str = r#"
package ModelicaAnnotations
  record Placement
    Boolean visible = true;
    Real transformation;
  end Placement;

  record Icon
    Real coordinateSystem;
    Real graphics;
  end Icon;

  record Diagram
    Real coordinateSystem;
    Real graphics;
  end Diagram;

  record Line
    Real points;
    String color;
    Real thickness;
  end Line;

  record Rectangle
    Real extent;
    String lineColor;
    String fillColor;
    String pattern;
  end Rectangle;

  record Ellipse
    Real extent;
    String lineColor;
    String fillColor;
  end Ellipse;

  record Polygon
    Real points;
    String lineColor;
    String fillColor;
  end Polygon;

  record Text
    Real extent;
    String textString;
    String textColor;
  end Text;

  record Bitmap
    String fileName;
  end Bitmap;

  record choices
    Boolean checkBox = false;
  end choices;

  record dialog
    String tab = "General";
    String group = "";
    Boolean enable = true;
  end dialog;
end ModelicaAnnotations;
"#;

fn scalar_field(ast: &mut Ast, name: &str, type_name: &str) -> Element {
    let decl = ast.add_component_declaration(None, Range::zero(), Name::new(name), Vec::new(), None, None, None, None);
    let clause = ast.add_component_clause(
        None,
        Range::zero(),
        crate::ast::FlowStream::None,
        crate::ast::Variability::default(),
        crate::ast::Causality::default(),
        DottedName::from_str(type_name),
        Vec::new(),
        vec1::vec1![decl],
    );
    Element::Component(clause)
}

/// Every field clause is built before the class node itself, so its `parent`
/// is left `None` rather than back-pointing to the class — these schema
/// nodes are never walked via `Ast::ancestors`, only addressed directly by
/// `NodeId` through `ClassSpecifier::Long::elements`.
fn record_class(ast: &mut Ast, name: &str, fields: &[(&str, &str)]) -> NodeId {
    let elements: Vec<Element> = fields.iter().map(|(n, t)| scalar_field(ast, n, t)).collect();
    ast.add_class_definition(
        None,
        Range::zero(),
        ClassPrefixes::default(),
        ClassKind::Record,
        ClassSpecifier::Long {
            identifier: Name::new(name),
            description: None,
            elements,
            imports: Vec::new(),
            equations: Vec::new(),
            initial_equations: Vec::new(),
            algorithms: Vec::new(),
            end_identifier: Name::new(name),
            annotation: None,
        },
    )
}

/// The schema's in-process class tree plus a name -> node index.
pub struct AnnotationSchema {
    ast: Rc<Ast>,
    classes: HashMap<Name, NodeId>,
}

impl AnnotationSchema {
    pub fn build() -> Self {
        let mut ast = Ast::new();
        let mut classes = HashMap::new();
        classes.insert(Name::new("Placement"), record_class(&mut ast, "Placement", &[("visible", "Boolean"), ("transformation", "Real")]));
        classes.insert(Name::new("Icon"), record_class(&mut ast, "Icon", &[("coordinateSystem", "Real"), ("graphics", "Real")]));
        classes.insert(Name::new("Diagram"), record_class(&mut ast, "Diagram", &[("coordinateSystem", "Real"), ("graphics", "Real")]));
        classes.insert(Name::new("Line"), record_class(&mut ast, "Line", &[("points", "Real"), ("color", "String"), ("thickness", "Real")]));
        classes.insert(
            Name::new("Rectangle"),
            record_class(&mut ast, "Rectangle", &[("extent", "Real"), ("lineColor", "String"), ("fillColor", "String"), ("pattern", "String")]),
        );
        classes.insert(Name::new("Ellipse"), record_class(&mut ast, "Ellipse", &[("extent", "Real"), ("lineColor", "String"), ("fillColor", "String")]));
        classes.insert(Name::new("Polygon"), record_class(&mut ast, "Polygon", &[("points", "Real"), ("lineColor", "String"), ("fillColor", "String")]));
        classes.insert(Name::new("Text"), record_class(&mut ast, "Text", &[("extent", "Real"), ("textString", "String"), ("textColor", "String")]));
        classes.insert(Name::new("Bitmap"), record_class(&mut ast, "Bitmap", &[("fileName", "String")]));
        classes.insert(Name::new("choices"), record_class(&mut ast, "choices", &[("checkBox", "Boolean")]));
        classes.insert(Name::new("dialog"), record_class(&mut ast, "dialog", &[("tab", "String"), ("group", "String"), ("enable", "Boolean")]));
        AnnotationSchema { ast: Rc::new(ast), classes }
    }

    fn class_node(&self, name: Name) -> Option<NodeId> {
        self.classes.get(&name).copied()
    }

    /// A bare, uninstantiated master for `name`'s schema entry, or `None` if
    /// `name` has no schema entry at all.
    fn master(&self, name: Name) -> Option<ClassInstanceRef> {
        let node = self.class_node(name)?;
        Some(ClassInstance::from_class_definition(self.ast.clone(), node, None))
    }
}

/// Instantiate every top-level argument of `class`'s own `annotation(...)`
/// clause against `schema`, pushing each result onto `class`'s annotation
/// elements (§4.7). An argument whose name has no schema entry still
/// produces a "dummy" instance carrying the user's modification, built over
/// an empty `Normal`-kind master so downstream code can still read whatever
/// fields the user wrote.
pub fn instantiate_annotations(class: &ClassInstanceRef, schema: &AnnotationSchema, errors: &ErrorCollector, resource_path: &str) {
    let Some(ann_node) = class.annotation_node() else { return };
    let NodeKind::Annotation { arguments } = class.ast.get(ann_node).clone() else {
        return;
    };
    for arg in arguments {
        let (name, modification) = match arg {
            AstModArg::Modification(id) => {
                let NodeKind::ElementModification { name, modification, .. } = class.ast.get(id).clone() else {
                    continue;
                };
                let head = name.first();
                let modif = match modification {
                    Some(m) => Modification::from_modification_node(&class.ast, m, Some(class.clone())),
                    None => Modification::empty(),
                };
                (head, modif)
            }
            AstModArg::Redeclaration(_) => continue,
        };
        let master = schema.master(name).unwrap_or_else(|| dummy_master(name));
        let cloned = master.clone_with(&modification);
        if cloned.instantiate(errors, resource_path).is_ok() {
            class.push_annotation_element(name, cloned);
        }
    }
}

/// A schemaless annotation entry: an empty `Normal`-kind class so a clone
/// under the user's modification still has somewhere to carry it (§4.7).
fn dummy_master(name: Name) -> ClassInstanceRef {
    let mut ast = Ast::new();
    let node = ast.add_class_definition(
        None,
        Range::zero(),
        ClassPrefixes::default(),
        ClassKind::Record,
        ClassSpecifier::Long {
            identifier: name,
            description: None,
            elements: Vec::new(),
            imports: Vec::new(),
            equations: Vec::new(),
            initial_equations: Vec::new(),
            algorithms: Vec::new(),
            end_identifier: name,
            annotation: None,
        },
    );
    ClassInstance::from_class_definition(Rc::new(ast), node, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ModArg as AstModArg;

    fn class_with_one_annotation_argument(annotation_name: &str) -> ClassInstanceRef {
        let mut ast = Ast::new();
        let elem = ast.add_element_modification(None, Range::zero(), false, false, DottedName::from_str(annotation_name), None, None);
        let ann = ast.add_annotation(None, Range::zero(), vec![AstModArg::Modification(elem)]);
        let cls = ast.add_class_definition(
            None,
            Range::zero(),
            ClassPrefixes::default(),
            ClassKind::Model,
            ClassSpecifier::Long {
                identifier: Name::new("M"),
                description: None,
                elements: Vec::new(),
                imports: Vec::new(),
                equations: Vec::new(),
                initial_equations: Vec::new(),
                algorithms: Vec::new(),
                end_identifier: Name::new("M"),
                annotation: Some(ann),
            },
        );
        ClassInstance::from_class_definition(Rc::new(ast), cls, None)
    }

    #[test]
    fn schema_entry_is_instantiated_and_readable_by_name() {
        let schema = AnnotationSchema::build();
        let class = class_with_one_annotation_argument("Placement");
        let errors = ErrorCollector::new();
        instantiate_annotations(&class, &schema, &errors, "m.mo");
        assert!(class.annotation(Name::new("Placement")).is_some());
    }

    #[test]
    fn unknown_annotation_name_still_produces_a_dummy_instance() {
        let schema = AnnotationSchema::build();
        let class = class_with_one_annotation_argument("__custom");
        let errors = ErrorCollector::new();
        instantiate_annotations(&class, &schema, &errors, "m.mo");
        assert!(class.annotation(Name::new("__custom")).is_some());
    }
}

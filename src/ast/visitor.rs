//! A visitor interface over every non-abstract `NodeKind` (§4.1), in the
//! teacher's uniplate-style shape (`util/visit.rs`): one method per kind,
//! with a default no-op so callers only override what they need.

use crate::ast::Ast;
use crate::ast::ClassSpecifier;
use crate::ast::Element;
use crate::ast::ImportClause;
use crate::ast::ModArg;
use crate::ast::ModificationBody;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::RedeclarationTarget;

pub trait Visitor {
    fn visit_stored_definition(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_class_definition(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_extends_clause(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_component_clause(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_component_declaration(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_import(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_modification(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_element_modification(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_element_redeclaration(&mut self, _ast: &Ast, _id: NodeId) {}
    fn visit_annotation(&mut self, _ast: &Ast, _id: NodeId) {}
}

/// Dispatches `id` to the matching `Visitor` method, then recurses into
/// its structural children (not into expressions/equations, which are
/// opaque to this walk — see `ast::mod` doc comment).
pub fn walk(v: &mut dyn Visitor, ast: &Ast, id: NodeId) {
    match ast.get(id).clone() {
        NodeKind::StoredDefinition { classes, .. } => {
            v.visit_stored_definition(ast, id);
            for c in classes {
                walk(v, ast, c);
            }
        }
        NodeKind::ClassDefinition { specifier, .. } => {
            v.visit_class_definition(ast, id);
            if let ClassSpecifier::Long {
                elements,
                imports,
                annotation,
                ..
            } = specifier
            {
                for e in elements {
                    match e {
                        Element::Class(c) => walk(v, ast, c),
                        Element::Component(c) => walk(v, ast, c),
                        Element::Extends(c) => walk(v, ast, c),
                    }
                }
                for i in imports {
                    walk(v, ast, i);
                }
                if let Some(a) = annotation {
                    walk(v, ast, a);
                }
            }
        }
        NodeKind::ExtendsClause {
            modification,
            annotation,
            ..
        } => {
            v.visit_extends_clause(ast, id);
            if let Some(m) = modification {
                walk(v, ast, m);
            }
            if let Some(a) = annotation {
                walk(v, ast, a);
            }
        }
        NodeKind::ComponentClause { declarations, .. } => {
            v.visit_component_clause(ast, id);
            for d in declarations {
                walk(v, ast, d);
            }
        }
        NodeKind::ComponentDeclaration {
            modification,
            annotation,
            ..
        } => {
            v.visit_component_declaration(ast, id);
            if let Some(m) = modification {
                walk(v, ast, m);
            }
            if let Some(a) = annotation {
                walk(v, ast, a);
            }
        }
        NodeKind::Import(ImportClause::Simple { .. })
        | NodeKind::Import(ImportClause::Compound { .. })
        | NodeKind::Import(ImportClause::Unqualified { .. }) => {
            v.visit_import(ast, id);
        }
        NodeKind::Modification(body) => {
            v.visit_modification(ast, id);
            if let ModificationBody::ClassMod { arguments, .. } = body {
                for arg in arguments {
                    match arg {
                        ModArg::Modification(m) => walk(v, ast, m),
                        ModArg::Redeclaration(r) => walk(v, ast, r),
                    }
                }
            }
        }
        NodeKind::ElementModification { modification, .. } => {
            v.visit_element_modification(ast, id);
            if let Some(m) = modification {
                walk(v, ast, m);
            }
        }
        NodeKind::ElementRedeclaration { target, .. } => {
            v.visit_element_redeclaration(ast, id);
            match target {
                RedeclarationTarget::Class(c) => walk(v, ast, c),
                RedeclarationTarget::Component(c) => walk(v, ast, c),
            }
        }
        NodeKind::Annotation { arguments } => {
            v.visit_annotation(ast, id);
            for arg in arguments {
                match arg {
                    ModArg::Modification(m) => walk(v, ast, m),
                    ModArg::Redeclaration(r) => walk(v, ast, r),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ClassKind;
    use crate::ast::ClassPrefixes;
    use crate::error::Range;
    use crate::intern::Name;

    struct Counter {
        classes: u32,
    }

    impl Visitor for Counter {
        fn visit_class_definition(&mut self, _ast: &Ast, _id: NodeId) {
            self.classes += 1;
        }
    }

    #[test]
    fn walk_counts_nested_classes() {
        let mut ast = Ast::new();
        let inner = ast.add_class_definition(
            None,
            Range::zero(),
            ClassPrefixes::default(),
            ClassKind::Model,
            ClassSpecifier::Long {
                identifier: Name::new("Foo"),
                description: None,
                elements: Vec::new(),
                imports: Vec::new(),
                equations: Vec::new(),
                initial_equations: Vec::new(),
                algorithms: Vec::new(),
                end_identifier: Name::new("Foo"),
                annotation: None,
            },
        );
        let outer = ast.add_class_definition(
            None,
            Range::zero(),
            ClassPrefixes::default(),
            ClassKind::Model,
            ClassSpecifier::Long {
                identifier: Name::new("Motor"),
                description: None,
                elements: vec![Element::Class(inner)],
                imports: Vec::new(),
                equations: Vec::new(),
                initial_equations: Vec::new(),
                algorithms: Vec::new(),
                end_identifier: Name::new("Motor"),
                annotation: None,
            },
        );
        let mut counter = Counter { classes: 0 };
        walk(&mut counter, &ast, outer);
        assert_eq!(counter.classes, 2);
    }
}

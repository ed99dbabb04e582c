//! Name resolution (§4.5): simple-name, type-specifier, and
//! component-reference resolution against a `ClassInstance` scope.
//!
//! Resolution order at one scope level: locally-declared element, then
//! qualified imports, then unqualified imports in declaration order, then
//! (type lookups only) the predefined types. A dotted path's first segment
//! is resolved by climbing the scope chain; every segment after that is
//! looked up purely within the previous segment's result — it never climbs
//! back out (§4.5).

use std::rc::Rc;

use crate::ast::expr::ComponentRef;
use crate::error::ErrorCollector;
use crate::instance::component::ComponentInstance;
use crate::instance::ClassInstance;
use crate::instance::ClassInstanceRef;
use crate::instance::PredefinedType;
use crate::intern::DottedName;
use crate::intern::Name;

pub fn resolve_simple_name(scope: &ClassInstanceRef, name: Name) -> Option<ClassInstanceRef> {
    let mut current = Some(scope.clone());
    while let Some(c) = current {
        if let Some(found) = resolve_at_level(&c, name) {
            return Some(found);
        }
        current = c.parent();
    }
    None
}

fn resolve_at_level(scope: &ClassInstanceRef, name: Name) -> Option<ClassInstanceRef> {
    if let Some(cls) = scope.declared_class(name) {
        return Some(cls);
    }
    if let Some(path) = scope.qualified_import(name) {
        if let Some(found) = resolve_dotted_from_root(scope, &path) {
            return Some(found);
        }
    }
    for unqualified in scope.unqualified_import_paths() {
        if let Some(root) = resolve_dotted_from_root(scope, &unqualified) {
            if let Some(member) = root.declared_class(name) {
                return Some(member);
            }
        }
    }
    None
}

/// Resolve a dotted type specifier (§4.5): first segment via the climbing
/// algorithm or the predefined-type fallback, the rest purely nested.
///
/// Each intermediate segment is instantiated before its nested-class table
/// is consulted: a package's nested classes are only registered once the
/// package itself has run through `instantiate()` (§4.4), and a multi-segment
/// path like `A.B.C` walks through packages nothing else has necessarily
/// instantiated yet.
pub fn resolve_type_specifier(
    scope: &ClassInstanceRef,
    path: &DottedName,
    errors: &ErrorCollector,
    resource_path: &str,
) -> Option<ClassInstanceRef> {
    let mut current = resolve_simple_name(scope, path.first()).or_else(|| predefined_fallback(path.first()))?;
    for seg in path.rest() {
        current.instantiate(errors, resource_path).ok()?;
        current = current.declared_class(*seg)?;
    }
    Some(current)
}

fn resolve_dotted_from_root(scope: &ClassInstanceRef, path: &DottedName) -> Option<ClassInstanceRef> {
    let root = root_of(scope);
    let mut current = root.declared_class(path.first())?;
    for seg in path.rest() {
        current = current.declared_class(*seg)?;
    }
    Some(current)
}

fn root_of(scope: &ClassInstanceRef) -> ClassInstanceRef {
    let mut current = scope.clone();
    while let Some(p) = current.parent() {
        current = p;
    }
    current
}

fn predefined_fallback(name: Name) -> Option<ClassInstanceRef> {
    match name.as_str() {
        "Boolean" => Some(ClassInstance::predefined(PredefinedType::Boolean)),
        "Integer" => Some(ClassInstance::predefined(PredefinedType::Integer)),
        "Real" => Some(ClassInstance::predefined(PredefinedType::Real)),
        "String" => Some(ClassInstance::predefined(PredefinedType::String)),
        _ => None,
    }
}

/// Resolve a (possibly dotted) component reference (§4.5): the first
/// segment climbs scopes looking for a declared component; every segment
/// after that descends into the previous component's instantiated class.
pub fn resolve_component_reference(
    scope: &ClassInstanceRef,
    cref: &ComponentRef,
    errors: &ErrorCollector,
    resource_path: &str,
) -> Option<Rc<ComponentInstance>> {
    let first = cref.parts.first()?.name;
    let (mut component, mut owner) = resolve_component_simple(scope, first)?;
    for seg in cref.parts.iter().skip(1) {
        let class = component.resolve_class(&owner, errors, resource_path)?;
        let (next, next_owner) = class.declared_component_with_owner(seg.name)?;
        component = next;
        owner = next_owner;
    }
    Some(component)
}

fn resolve_component_simple(scope: &ClassInstanceRef, name: Name) -> Option<(Rc<ComponentInstance>, ClassInstanceRef)> {
    let mut current = Some(scope.clone());
    while let Some(c) = current {
        if let Some(found) = c.declared_component_with_owner(name) {
            return Some(found);
        }
        current = c.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::RefSegment;
    use crate::ast::Ast;
    use crate::ast::ClassKind;
    use crate::ast::ClassPrefixes;
    use crate::ast::ClassSpecifier;
    use crate::ast::Element;
    use crate::ast::FlowStream;
    use crate::ast::Variability;
    use crate::error::Range;

    #[test]
    fn predefined_type_resolves_when_not_locally_declared() {
        let mut ast = Ast::new();
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
                annotation: None,
            },
        );
        let ast = std::rc::Rc::new(ast);
        let scope = ClassInstance::from_class_definition(ast, cls, None);
        let errors = ErrorCollector::new();
        let real = resolve_type_specifier(&scope, &DottedName::single(Name::new("Real")), &errors, "m.mo").unwrap();
        assert_eq!(real.name, Name::new("Real"));
    }

    #[test]
    fn component_reference_resolves_through_declaration() {
        let mut ast = Ast::new();
        let decl = ast.add_component_declaration(None, Range::zero(), Name::new("j"), Vec::new(), None, None, None, None);
        let clause = ast.add_component_clause(
            None,
            Range::zero(),
            FlowStream::None,
            Variability::default(),
            crate::ast::Causality::default(),
            DottedName::from_str("Real"),
            Vec::new(),
            vec1::vec1![decl],
        );
        let cls = ast.add_class_definition(
            None,
            Range::zero(),
            ClassPrefixes::default(),
            ClassKind::Model,
            ClassSpecifier::Long {
                identifier: Name::new("M"),
                description: None,
                elements: vec![Element::Component(clause)],
                imports: Vec::new(),
                equations: Vec::new(),
                initial_equations: Vec::new(),
                algorithms: Vec::new(),
                end_identifier: Name::new("M"),
                annotation: None,
            },
        );
        let ast = std::rc::Rc::new(ast);
        let scope = ClassInstance::from_class_definition(ast, cls, None);
        let errors = ErrorCollector::new();
        scope.instantiate(&errors, "m.mo").unwrap();
        let cref = ComponentRef {
            global: false,
            parts: vec![RefSegment {
                name: Name::new("j"),
                subscripts: Vec::new(),
            }],
        };
        let found = resolve_component_reference(&scope, &cref, &errors, "m.mo").unwrap();
        assert_eq!(found.name, Name::new("j"));
    }
}

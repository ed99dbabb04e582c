//! The instance graph (§3, §4.4): `ClassInstance` is the hub object that
//! instantiation produces. Rather than mirror the specification's five
//! instance subtypes (plain class, short-class alias, enumeration, array,
//! predefined) as five Rust types, they are folded into one `ClassInstance`
//! carrying a `ClassInstanceKind` — the same enum-over-struct shape the
//! teacher uses for its `Binding` variants (see DESIGN.md). `extends` and
//! component slots still get their own types (`ComponentInstance`) since
//! they carry materially different data.
//!
//! Back-references (child -> parent scope) are `Weak`, matching the arena
//! re-architecture's goal for `ast::mod`: an `Rc` cycle between a class and
//! its own nested classes would otherwise never get collected.

pub mod component;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::rc::Weak;

use crate::ast::equation::Equation;
use crate::ast::Ast;
use crate::ast::ClassSpecifier;
use crate::ast::Element;
use crate::ast::ImportClause;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::error::ErrorCollector;
use crate::error::ErrorKind;
use crate::error::FatalError;
use crate::error::Range;
use crate::intern::DottedName;
use crate::intern::Name;
use crate::modification::Modification;

pub use component::ComponentInstance;

pub type ClassInstanceRef = Rc<ClassInstance>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstState {
    Uninstantiated,
    Instantiating,
    Instantiated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedType {
    Boolean,
    Integer,
    Real,
    String,
}

#[derive(Debug, Clone)]
pub enum ClassInstanceKind {
    Normal,
    /// `type A = B(mods);` or `type A = der(B, x);` — both are resolved the
    /// same way: a single implicit extends of `target`, with `modification`
    /// (the short class's own trailing `(...)`, if any) merged in.
    Short {
        target: DottedName,
        modification: Option<NodeId>,
    },
    /// `ordinal` is 1-based, per the Modelica enumeration rule (§4.2).
    Enumeration { literals: Vec<(u32, Name, Option<String>)> },
    Array { element: ClassInstanceRef, shape: Vec<i64> },
    Predefined(PredefinedType),
}

/// The instantiation hub (§3). One `ClassInstance` exists per distinct
/// (base class, merged modification) pair, via the clone cache below.
#[derive(Debug)]
pub struct ClassInstance {
    pub name: Name,
    pub kind: ClassInstanceKind,
    pub ast: Rc<Ast>,
    pub class_node: Option<NodeId>,
    parent: RefCell<Option<Weak<ClassInstance>>>,
    pub modification: Modification,
    state: RefCell<InstState>,
    components: RefCell<Vec<Rc<ComponentInstance>>>,
    nested_classes: RefCell<Vec<(Name, ClassInstanceRef)>>,
    extends: RefCell<Vec<ClassInstanceRef>>,
    qualified_imports: RefCell<Vec<(Name, DottedName)>>,
    unqualified_imports: RefCell<Vec<DottedName>>,
    /// Instantiated annotation elements (§3 `annotations`, §4.7), populated
    /// by `crate::annotation::instantiate_annotations` after `instantiate()`
    /// — kept as a separate pass rather than inline in `instantiate_body` so
    /// the annotation schema (owned by `Context`) doesn't need threading
    /// through every `instantiate()` call site (see DESIGN.md).
    annotation_elements: RefCell<Vec<(Name, ClassInstanceRef)>>,
    clone_cache: RefCell<HashMap<[u8; 32], ClassInstanceRef>>,
}

impl ClassInstance {
    fn bare(name: Name, kind: ClassInstanceKind, ast: Rc<Ast>, class_node: Option<NodeId>, parent: Option<ClassInstanceRef>) -> Self {
        ClassInstance {
            name,
            kind,
            ast,
            class_node,
            parent: RefCell::new(parent.map(|p| Rc::downgrade(&p))),
            modification: Modification::empty(),
            state: RefCell::new(InstState::Uninstantiated),
            components: RefCell::new(Vec::new()),
            nested_classes: RefCell::new(Vec::new()),
            extends: RefCell::new(Vec::new()),
            qualified_imports: RefCell::new(Vec::new()),
            unqualified_imports: RefCell::new(Vec::new()),
            annotation_elements: RefCell::new(Vec::new()),
            clone_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Build the (uninstantiated) master instance for a `ClassDefinition` node.
    pub fn from_class_definition(ast: Rc<Ast>, node: NodeId, parent: Option<ClassInstanceRef>) -> ClassInstanceRef {
        let NodeKind::ClassDefinition { specifier, .. } = ast.get(node).clone() else {
            panic!("from_class_definition requires a ClassDefinition node");
        };
        let (name, kind) = match specifier {
            ClassSpecifier::Long { identifier, .. } => (identifier, ClassInstanceKind::Normal),
            ClassSpecifier::Short {
                identifier,
                type_specifier,
                modification,
                ..
            } => (
                identifier,
                ClassInstanceKind::Short {
                    target: type_specifier,
                    modification,
                },
            ),
            ClassSpecifier::Der { identifier, base_type, .. } => (
                identifier,
                ClassInstanceKind::Short {
                    target: base_type,
                    modification: None,
                },
            ),
            ClassSpecifier::Enumeration { identifier, literals } => (
                identifier,
                ClassInstanceKind::Enumeration {
                    literals: literals
                        .into_iter()
                        .enumerate()
                        .map(|(i, l)| (i as u32 + 1, l.name, l.description))
                        .collect(),
                },
            ),
        };
        Rc::new(ClassInstance::bare(name, kind, ast, Some(node), parent))
    }

    /// A predefined type has no body and is always already instantiated.
    pub fn predefined(kind: PredefinedType) -> ClassInstanceRef {
        let name = Name::new(match kind {
            PredefinedType::Boolean => "Boolean",
            PredefinedType::Integer => "Integer",
            PredefinedType::Real => "Real",
            PredefinedType::String => "String",
        });
        let instance = ClassInstance::bare(name, ClassInstanceKind::Predefined(kind), Rc::new(Ast::new()), None, None);
        *instance.state.borrow_mut() = InstState::Instantiated;
        Rc::new(instance)
    }

    /// An ephemeral master wrapping `element` as an array of the given
    /// `shape`, used by `ComponentInstance::resolve_class` before the real
    /// element-level modification (including any `split`) is merged in.
    pub fn new_array(element: ClassInstanceRef, shape: Vec<i64>) -> Self {
        let name = element.name;
        let ast = element.ast.clone();
        ClassInstance::bare(name, ClassInstanceKind::Array { element, shape }, ast, None, None)
    }

    pub fn parent(&self) -> Option<ClassInstanceRef> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn declared_class(&self, name: Name) -> Option<ClassInstanceRef> {
        if let Some((_, c)) = self.nested_classes.borrow().iter().find(|(n, _)| *n == name) {
            return Some(c.clone());
        }
        for base in self.extends.borrow().iter() {
            if let Some(c) = base.declared_class(name) {
                return Some(c);
            }
        }
        None
    }

    pub fn declared_component(&self, name: Name) -> Option<Rc<ComponentInstance>> {
        if let Some(c) = self.components.borrow().iter().find(|c| c.name == name) {
            return Some(c.clone());
        }
        for base in self.extends.borrow().iter() {
            if let Some(c) = base.declared_component(name) {
                return Some(c);
            }
        }
        None
    }

    /// Like `declared_component`, but also returns the instance that
    /// actually declares it — `self` if it's a direct component, or
    /// whichever `extends` base's own component list it was found in.
    /// Modification-extraction and redeclaration lookups need this true
    /// owner, not the scope the search started from (§4.4, §4.8).
    pub fn declared_component_with_owner(self: &ClassInstanceRef, name: Name) -> Option<(Rc<ComponentInstance>, ClassInstanceRef)> {
        if let Some(c) = self.components.borrow().iter().find(|c| c.name == name) {
            return Some((c.clone(), self.clone()));
        }
        for base in self.extends.borrow().iter() {
            if let Some(found) = base.declared_component_with_owner(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn components_snapshot(&self) -> Vec<Rc<ComponentInstance>> {
        let mut all: Vec<Rc<ComponentInstance>> = self.components.borrow().clone();
        for base in self.extends.borrow().iter() {
            all.extend(base.components_snapshot());
        }
        all
    }

    /// Only this instance's own component clauses — not those reached
    /// through `extends` (§4.8's flattener walks those separately so each
    /// component's modification is extracted against its true declaring
    /// instance, not always the root).
    pub fn own_components(&self) -> Vec<Rc<ComponentInstance>> {
        self.components.borrow().clone()
    }

    pub fn extends_snapshot(&self) -> Vec<ClassInstanceRef> {
        self.extends.borrow().clone()
    }

    /// This instance's own equation list, in declaration order (§4.8).
    pub fn own_equations(&self) -> Vec<Equation> {
        let Some(node) = self.class_node else { return Vec::new() };
        let NodeKind::ClassDefinition { specifier, .. } = self.ast.get(node) else {
            return Vec::new();
        };
        match specifier {
            ClassSpecifier::Long { equations, .. } => equations.clone(),
            _ => Vec::new(),
        }
    }

    pub fn qualified_import(&self, name: Name) -> Option<DottedName> {
        self.qualified_imports
            .borrow()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| p.clone())
    }

    pub fn unqualified_import_paths(&self) -> Vec<DottedName> {
        self.unqualified_imports.borrow().clone()
    }

    pub fn enumeration_literals(&self) -> Option<Vec<(u32, Name, Option<String>)>> {
        match &self.kind {
            ClassInstanceKind::Enumeration { literals } => Some(literals.clone()),
            _ => None,
        }
    }

    /// The `annotation(...)` AST node trailing this class's long-form body, if any.
    pub fn annotation_node(&self) -> Option<NodeId> {
        let node = self.class_node?;
        let NodeKind::ClassDefinition { specifier, .. } = self.ast.get(node) else {
            return None;
        };
        match specifier {
            ClassSpecifier::Long { annotation, .. } => *annotation,
            _ => None,
        }
    }

    /// `annotation(name)` (§4.7): the first instantiated annotation element
    /// matching `name`, set by `crate::annotation::instantiate_annotations`.
    pub fn annotation(&self, name: Name) -> Option<ClassInstanceRef> {
        self.annotation_elements.borrow().iter().find(|(n, _)| *n == name).map(|(_, c)| c.clone())
    }

    pub fn annotation_elements(&self) -> Vec<(Name, ClassInstanceRef)> {
        self.annotation_elements.borrow().clone()
    }

    pub fn push_annotation_element(&self, name: Name, instance: ClassInstanceRef) {
        self.annotation_elements.borrow_mut().push((name, instance));
    }

    /// Test hook (§8 cache-reuse scenario): the number of distinct merged
    /// modifications this instance has been cloned under so far.
    pub fn clone_cache_len(&self) -> usize {
        self.clone_cache.borrow().len()
    }

    /// `clone(modification)` (§4.4): merge `extra` into this instance's own
    /// modification and return the cached clone for the resulting hash, or
    /// build a fresh one. Two call sites producing structurally identical
    /// modifications get the same `Rc` — the identity the cache-reuse
    /// scenario in §8 exercises.
    pub fn clone_with(self: &ClassInstanceRef, extra: &Modification) -> ClassInstanceRef {
        let merged = Modification::merge(&self.modification, extra);
        let key = *merged.hash().as_bytes();
        if let Some(hit) = self.clone_cache.borrow().get(&key) {
            return hit.clone();
        }
        let fresh = Rc::new(ClassInstance {
            name: self.name,
            kind: self.kind.clone(),
            ast: self.ast.clone(),
            class_node: self.class_node,
            parent: RefCell::new(self.parent.borrow().clone()),
            modification: merged,
            state: RefCell::new(InstState::Uninstantiated),
            components: RefCell::new(Vec::new()),
            nested_classes: RefCell::new(Vec::new()),
            extends: RefCell::new(Vec::new()),
            qualified_imports: RefCell::new(Vec::new()),
            unqualified_imports: RefCell::new(Vec::new()),
            annotation_elements: RefCell::new(Vec::new()),
            clone_cache: RefCell::new(HashMap::new()),
        });
        self.clone_cache.borrow_mut().insert(key, fresh.clone());
        fresh
    }

    /// Idempotent: a second call on an already-`Instantiated` node is a
    /// no-op, not an error (§3 invariant 5). A call re-entering a node still
    /// `Instantiating` — a dependency cycle through `extends` or a
    /// short-class alias — is the one fatal condition in this crate (§4.9).
    #[tracing::instrument(level = "debug", skip(self, errors), fields(class = %self.name))]
    pub fn instantiate(self: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Result<(), FatalError> {
        match *self.state.borrow() {
            InstState::Instantiated => return Ok(()),
            InstState::Instantiating => return Err(FatalError::ReentrantInstantiation(self.name.to_string())),
            InstState::Uninstantiated => {}
        }
        *self.state.borrow_mut() = InstState::Instantiating;
        self.instantiate_body(errors, resource_path)?;
        *self.state.borrow_mut() = InstState::Instantiated;
        Ok(())
    }

    fn instantiate_body(self: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Result<(), FatalError> {
        match self.kind.clone() {
            ClassInstanceKind::Predefined(_) | ClassInstanceKind::Enumeration { .. } => Ok(()),
            ClassInstanceKind::Short { target, modification } => {
                let Some(base) = crate::resolve::resolve_type_specifier(self, &target, errors, resource_path) else {
                    errors.error(
                        ErrorKind::UnresolvedType,
                        format!("type '{target}' not found"),
                        resource_path,
                        Range::zero(),
                    );
                    return Ok(());
                };
                let own_mod = match modification {
                    Some(m) => Modification::from_modification_node(&self.ast, m, Some(self.clone())),
                    None => Modification::empty(),
                };
                let merged = Modification::merge(&self.modification, &own_mod);
                let cloned = base.clone_with(&merged);
                cloned.instantiate(errors, resource_path)?;
                self.extends.borrow_mut().push(cloned);
                Ok(())
            }
            ClassInstanceKind::Array { element, shape } => {
                let count: usize = if shape.is_empty() {
                    0
                } else {
                    shape.iter().map(|d| (*d).max(0) as usize).product()
                };
                for i in 0..count {
                    let split_mod = self.modification.split(count, i);
                    let elem_clone = element.clone_with(&split_mod);
                    elem_clone.instantiate(errors, resource_path)?;
                    self.components.borrow_mut().push(Rc::new(ComponentInstance::array_element(i, elem_clone)));
                }
                Ok(())
            }
            ClassInstanceKind::Normal => {
                let Some(node) = self.class_node else { return Ok(()) };
                let NodeKind::ClassDefinition { specifier, .. } = self.ast.get(node).clone() else {
                    return Ok(());
                };
                let ClassSpecifier::Long { elements, imports, .. } = specifier else {
                    return Ok(());
                };
                for import_id in imports {
                    self.register_import(import_id);
                }
                for element in elements {
                    match element {
                        Element::Extends(ext_id) => self.instantiate_extends(ext_id, errors, resource_path)?,
                        Element::Component(comp_id) => self.instantiate_component_clause(comp_id),
                        Element::Class(cls_id) => {
                            let nested = ClassInstance::from_class_definition(self.ast.clone(), cls_id, Some(self.clone()));
                            self.nested_classes.borrow_mut().push((nested.name, nested));
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn instantiate_extends(self: &ClassInstanceRef, ext_id: NodeId, errors: &ErrorCollector, resource_path: &str) -> Result<(), FatalError> {
        let NodeKind::ExtendsClause {
            type_specifier,
            modification,
            ..
        } = self.ast.get(ext_id).clone()
        else {
            return Ok(());
        };
        let Some(base) = crate::resolve::resolve_type_specifier(self, &type_specifier, errors, resource_path) else {
            errors.error(
                ErrorKind::UnresolvedType,
                format!("extends type '{type_specifier}' not found"),
                resource_path,
                self.ast.range(ext_id),
            );
            return Ok(());
        };
        let ext_mod = match modification {
            Some(m) => Modification::from_modification_node(&self.ast, m, Some(self.clone())),
            None => Modification::empty(),
        };
        let cloned = base.clone_with(&ext_mod);
        cloned.instantiate(errors, resource_path)?;
        self.extends.borrow_mut().push(cloned);
        Ok(())
    }

    fn instantiate_component_clause(self: &ClassInstanceRef, comp_id: NodeId) {
        let NodeKind::ComponentClause {
            flow_stream,
            variability,
            causality,
            type_specifier,
            array_subscripts,
            declarations,
        } = self.ast.get(comp_id).clone()
        else {
            return;
        };
        for decl_id in declarations {
            let NodeKind::ComponentDeclaration {
                name,
                array_subscripts: decl_subscripts,
                modification,
                condition,
                description,
                ..
            } = self.ast.get(decl_id).clone()
            else {
                continue;
            };
            let own_mod = match modification {
                Some(m) => Modification::from_modification_node(&self.ast, m, Some(self.clone())),
                None => Modification::empty(),
            };
            let mut subscripts = array_subscripts.clone();
            subscripts.extend(decl_subscripts);
            let comp = ComponentInstance::new(
                name,
                type_specifier.clone(),
                variability,
                causality,
                flow_stream,
                subscripts,
                own_mod,
                condition,
                description,
            );
            self.components.borrow_mut().push(Rc::new(comp));
        }
    }

    fn register_import(self: &ClassInstanceRef, import_id: NodeId) {
        let NodeKind::Import(clause) = self.ast.get(import_id).clone() else {
            return;
        };
        match clause {
            ImportClause::Simple { short_name, path } => {
                let bound = short_name.unwrap_or_else(|| *path.0.last().expect("dotted name is never empty"));
                self.qualified_imports.borrow_mut().push((bound, path));
            }
            ImportClause::Compound { path, names } => {
                for n in names {
                    let mut full = path.0.clone();
                    full.push(n);
                    self.qualified_imports.borrow_mut().push((n, DottedName(full)));
                }
            }
            ImportClause::Unqualified { path } => {
                self.unqualified_imports.borrow_mut().push(path);
            }
        }
    }
}

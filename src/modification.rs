//! The modification algebra (§4.3): construction from AST, merge, split,
//! and the content hash that drives the clone cache (§4.4).

use std::cell::RefCell;

use crate::ast::expr::Expr as AstExpr;
use crate::ast::Ast;
use crate::ast::ClassSpecifier;
use crate::ast::ModArg as AstModArg;
use crate::ast::ModificationBody;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::RedeclarationTarget;
use crate::expr_ir::Expr as IrExpr;
use crate::instance::ClassInstanceRef;
use crate::intern::DottedName;
use crate::intern::Name;

/// The scope a modification's expressions are evaluated against (§3).
pub type Scope = ClassInstanceRef;

#[derive(Debug, Clone)]
pub struct ElementMod {
    pub each: bool,
    pub r#final: bool,
    pub path: DottedName,
    pub arguments: Vec<ModArg>,
    pub expr: Option<AstExpr>,
    pub description: Option<String>,
}

/// What `ElementMod::extract` produces: either the tail of a still-dotted
/// path, or — at the leaf — the nested arguments/expr/description to graft
/// onto the child's own modification (§4.3, §4.4 `extractModification`).
pub enum Extracted {
    Nested(ElementMod),
    Leaf {
        arguments: Vec<ModArg>,
        expr: Option<AstExpr>,
        description: Option<String>,
    },
}

impl ElementMod {
    pub fn head(&self) -> Name {
        self.path.first()
    }

    pub fn extract(&self) -> Extracted {
        if self.path.rest().is_empty() {
            Extracted::Leaf {
                arguments: self.arguments.clone(),
                expr: self.expr.clone(),
                description: self.description.clone(),
            }
        } else {
            Extracted::Nested(ElementMod {
                each: self.each,
                r#final: self.r#final,
                path: DottedName(self.path.rest().to_vec()),
                arguments: self.arguments.clone(),
                expr: self.expr.clone(),
                description: self.description.clone(),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterMod {
    pub name: Name,
    pub expr: AstExpr,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeclKind {
    Class,
    Component,
}

/// A redeclaration's replacement, resolved structurally (type specifier +
/// its own modification) rather than as an already-instantiated
/// `ClassInstance`. Spec §4.3 describes the hash as covering "the hash of
/// the replacement instance"; requiring a live instance at hash time would
/// force eager instantiation, contradicting the late-type-resolution
/// invariant (§3 invariant 6). Two redeclarations with identical type +
/// modification always clone to the same cached instance regardless, so
/// hashing the structural description is equivalent for cache-correctness
/// purposes. Recorded as a decision in DESIGN.md.
#[derive(Debug, Clone)]
pub struct Redeclaration {
    pub name: Name,
    pub each: bool,
    pub r#final: bool,
    pub replaceable: bool,
    pub kind: RedeclKind,
    pub type_specifier: DottedName,
    pub modification: Box<Modification>,
}

#[derive(Debug, Clone)]
pub enum ModArg {
    Element(ElementMod),
    Parameter(ParameterMod),
    Redeclare(Redeclaration),
}

impl ModArg {
    pub fn name(&self) -> Name {
        match self {
            ModArg::Element(e) => e.head(),
            ModArg::Parameter(p) => p.name,
            ModArg::Redeclare(r) => r.name,
        }
    }

    pub fn content_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        match self {
            ModArg::Element(e) => {
                hasher.update(b"element");
                hasher.update(e.path.to_string().as_bytes());
                for arg in &e.arguments {
                    hasher.update(arg.content_hash().as_bytes());
                }
                hash_opt_expr(&e.expr, &mut hasher);
            }
            ModArg::Parameter(p) => {
                hasher.update(b"parameter");
                hasher.update(p.name.as_str().as_bytes());
                hash_opt_expr(&Some(p.expr.clone()), &mut hasher);
            }
            ModArg::Redeclare(r) => {
                hasher.update(b"redeclare");
                hasher.update(r.name.as_str().as_bytes());
                hasher.update(r.type_specifier.to_string().as_bytes());
                hasher.update(r.modification.hash().as_bytes());
            }
        }
        hasher.finalize()
    }
}

fn hash_opt_expr(expr: &Option<AstExpr>, hasher: &mut blake3::Hasher) {
    match expr {
        Some(e) => {
            hasher.update(b"expr:");
            hasher.update(format!("{e:?}").as_bytes());
        }
        None => hasher.update(b"noexpr"),
    };
}

/// An immutable, merged set of overrides affecting one class/component
/// instance (§3). Built once per `clone()` call on the enclosing class
/// instance; never mutated in place — `merge`/`split` always return a new
/// `Modification`.
#[derive(Debug, Clone)]
pub struct Modification {
    pub scope: Option<Scope>,
    pub arguments: Vec<ModArg>,
    pub expr: Option<AstExpr>,
    pub description: Option<String>,
    pub annotations: Option<Box<Modification>>,
    folded: RefCell<Option<Option<IrExpr>>>,
}

impl Modification {
    pub fn empty() -> Self {
        Modification {
            scope: None,
            arguments: Vec::new(),
            expr: None,
            description: None,
            annotations: None,
            folded: RefCell::new(None),
        }
    }

    pub fn new(
        scope: Option<Scope>,
        arguments: Vec<ModArg>,
        expr: Option<AstExpr>,
        description: Option<String>,
        annotations: Option<Modification>,
    ) -> Self {
        Modification {
            scope,
            arguments: merge_arguments(arguments),
            expr,
            description,
            annotations: annotations.map(Box::new),
            folded: RefCell::new(None),
        }
    }

    /// Build a `Modification` from a `Modification` AST node — either a
    /// `ClassMod` (possibly nested arguments plus a trailing expression) or
    /// a bare `Eq` (§4.3 "Construction from AST").
    pub fn from_modification_node(ast: &Ast, node: NodeId, scope: Option<Scope>) -> Self {
        let (args, expr) = class_mod_to_args_and_expr(ast, node, scope.clone());
        Modification::new(scope, args, expr, None, None)
    }

    pub fn set_memoized_fold(&self, value: Option<IrExpr>) {
        *self.folded.borrow_mut() = Some(value);
    }

    pub fn memoized_fold(&self) -> Option<Option<IrExpr>> {
        self.folded.borrow().clone()
    }

    pub fn argument_named(&self, name: Name) -> Option<&ModArg> {
        self.arguments.iter().find(|a| a.name() == name)
    }

    /// `extractModification(childName)` (§4.4): the subset of this
    /// modification addressing `childName`.
    pub fn extract_child(&self, child_name: Name) -> Modification {
        let mut arguments = Vec::new();
        let mut expr = None;
        let mut description = None;
        for arg in &self.arguments {
            if let ModArg::Element(e) = arg {
                if e.head() == child_name {
                    match e.extract() {
                        Extracted::Nested(tail) => arguments.push(ModArg::Element(tail)),
                        Extracted::Leaf {
                            arguments: leaf_args,
                            expr: leaf_expr,
                            description: leaf_desc,
                        } => {
                            arguments.extend(leaf_args);
                            expr = leaf_expr.or(expr);
                            description = leaf_desc.or(description);
                        }
                    }
                }
            }
        }
        Modification::new(self.scope.clone(), arguments, expr, description, None)
    }

    /// Any component-redeclaration addressing `name` directly at this level.
    pub fn component_redeclaration(&self, name: Name) -> Option<&Redeclaration> {
        self.arguments.iter().find_map(|a| match a {
            ModArg::Redeclare(r) if r.kind == RedeclKind::Component && r.name == name => Some(r),
            _ => None,
        })
    }

    pub fn class_redeclaration(&self, name: Name) -> Option<&Redeclaration> {
        self.arguments.iter().find_map(|a| match a {
            ModArg::Redeclare(r) if r.kind == RedeclKind::Class && r.name == name => Some(r),
            _ => None,
        })
    }

    /// `merge(base, override)` (§4.3): override wins on conflicts.
    pub fn merge(base: &Modification, over: &Modification) -> Modification {
        let mut arguments = base.arguments.clone();
        arguments.extend(over.arguments.clone());
        let arguments = merge_arguments(arguments);
        let expr = over.expr.clone().or_else(|| base.expr.clone());
        let description = over.description.clone().or_else(|| base.description.clone());
        let annotations = match (&base.annotations, &over.annotations) {
            (None, None) => None,
            (Some(b), None) => Some(b.as_ref().clone()),
            (None, Some(o)) => Some(o.as_ref().clone()),
            (Some(b), Some(o)) => Some(Modification::merge(b, o)),
        };
        Modification {
            scope: over.scope.clone().or_else(|| base.scope.clone()),
            arguments,
            expr,
            description,
            annotations: annotations.map(Box::new),
            folded: RefCell::new(None),
        }
    }

    /// Propagate an array split through every layer (§4.3): `n` is the
    /// array's element count, `i` the 0-based element index. Arguments
    /// marked `each` broadcast unchanged; others are indexed so each
    /// element resolves its own slice of the original expression.
    pub fn split(&self, n: usize, i: usize) -> Modification {
        let arguments = self.arguments.iter().map(|a| split_arg(a, n, i)).collect();
        let expr = self.expr.as_ref().map(|e| if n <= 1 { e.clone() } else { index_expr(e, i) });
        Modification {
            scope: self.scope.clone(),
            arguments,
            expr,
            description: self.description.clone(),
            annotations: self.annotations.as_ref().map(|a| Box::new(a.split(n, i))),
            folded: RefCell::new(None),
        }
    }

    /// Deterministic digest over (arguments, expr, annotations), in order (§4.3).
    pub fn hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for arg in &self.arguments {
            hasher.update(arg.content_hash().as_bytes());
        }
        hash_opt_expr(&self.expr, &mut hasher);
        match &self.annotations {
            Some(a) => {
                hasher.update(b"ann:");
                hasher.update(a.hash().as_bytes());
            }
            None => hasher.update(b"noann"),
        };
        hasher.finalize()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty() && self.expr.is_none()
    }
}

fn index_expr(e: &AstExpr, i: usize) -> AstExpr {
    AstExpr::Index {
        base: Box::new(e.clone()),
        subscripts: vec![AstExpr::int((i + 1) as i64)],
    }
}

fn split_arg(arg: &ModArg, n: usize, i: usize) -> ModArg {
    match arg {
        ModArg::Element(e) => ModArg::Element(ElementMod {
            each: e.each,
            r#final: e.r#final,
            path: e.path.clone(),
            arguments: e.arguments.iter().map(|a| split_arg(a, n, i)).collect(),
            expr: e
                .expr
                .as_ref()
                .map(|ex| if e.each || n <= 1 { ex.clone() } else { index_expr(ex, i) }),
            description: e.description.clone(),
        }),
        ModArg::Parameter(p) => ModArg::Parameter(ParameterMod {
            name: p.name,
            expr: if n <= 1 { p.expr.clone() } else { index_expr(&p.expr, i) },
            scope: p.scope.clone(),
        }),
        // Splitting a redeclaration is a no-op: the same replacement
        // applies to every array element (§4.3).
        ModArg::Redeclare(r) => ModArg::Redeclare(r.clone()),
    }
}

/// Group `ModificationArgument`s by name and collapse duplicates (§4.3
/// `mergeModificationArguments`): for same-named `ElementMod`s, recursively
/// merge nested arguments and keep the last declared expression; for a
/// mixed or non-element group, last declared wins outright.
fn merge_arguments(args: Vec<ModArg>) -> Vec<ModArg> {
    let mut groups: Vec<(Name, Vec<ModArg>)> = Vec::new();
    for arg in args {
        let name = arg.name();
        if let Some(group) = groups.iter_mut().find(|(n, _)| *n == name) {
            group.1.push(arg);
        } else {
            groups.push((name, vec![arg]));
        }
    }
    groups.into_iter().map(|(_, group)| collapse_group(group)).collect()
}

fn collapse_group(group: Vec<ModArg>) -> ModArg {
    if group.len() == 1 {
        return group.into_iter().next().unwrap();
    }
    if group.iter().all(|a| matches!(a, ModArg::Element(_))) {
        let elements: Vec<ElementMod> = group
            .into_iter()
            .map(|a| match a {
                ModArg::Element(e) => e,
                _ => unreachable!(),
            })
            .collect();
        let each = elements[0].each;
        let r#final = elements.iter().any(|e| e.r#final);
        let path = elements[0].path.clone();
        // Policy (§9 open question, decided in DESIGN.md): first member's
        // description, last member's concrete expression.
        let description = elements[0].description.clone();
        let expr = elements.iter().rev().find_map(|e| e.expr.clone());
        let nested: Vec<ModArg> = elements.into_iter().flat_map(|e| e.arguments).collect();
        ModArg::Element(ElementMod {
            each,
            r#final,
            path,
            arguments: merge_arguments(nested),
            expr,
            description,
        })
    } else {
        group.into_iter().last().unwrap()
    }
}

fn class_mod_to_args_and_expr(ast: &Ast, node: NodeId, scope: Option<Scope>) -> (Vec<ModArg>, Option<AstExpr>) {
    match ast.get(node).clone() {
        NodeKind::Modification(ModificationBody::ClassMod { arguments, expr }) => (
            arguments.into_iter().map(|a| mod_arg_from_ast(ast, a, scope.clone())).collect(),
            expr,
        ),
        NodeKind::Modification(ModificationBody::Eq { expr }) => (Vec::new(), Some(expr)),
        _ => panic!("expected a Modification node"),
    }
}

fn mod_arg_from_ast(ast: &Ast, arg: AstModArg, scope: Option<Scope>) -> ModArg {
    match arg {
        AstModArg::Modification(id) => {
            let NodeKind::ElementModification {
                each,
                r#final,
                name,
                modification,
                description,
            } = ast.get(id).clone()
            else {
                panic!("ModArg::Modification must point at an ElementModification node");
            };
            let (arguments, expr) = match modification {
                Some(m) => class_mod_to_args_and_expr(ast, m, scope.clone()),
                None => (Vec::new(), None),
            };
            ModArg::Element(ElementMod {
                each,
                r#final,
                path: name,
                arguments,
                expr,
                description,
            })
        }
        AstModArg::Redeclaration(id) => {
            let NodeKind::ElementRedeclaration {
                each,
                r#final,
                replaceable,
                target,
            } = ast.get(id).clone()
            else {
                panic!("ModArg::Redeclaration must point at an ElementRedeclaration node");
            };
            let (name, kind, type_specifier, modification) = match target {
                RedeclarationTarget::Class(cls) => {
                    let NodeKind::ClassDefinition { specifier, .. } = ast.get(cls).clone() else {
                        panic!("redeclaration class target must be a ClassDefinition");
                    };
                    match specifier {
                        ClassSpecifier::Short {
                            identifier,
                            type_specifier,
                            modification,
                            ..
                        } => {
                            let modif = modification
                                .map(|m| Modification::from_modification_node(ast, m, scope.clone()))
                                .unwrap_or_else(Modification::empty);
                            (identifier, RedeclKind::Class, type_specifier, modif)
                        }
                        _ => panic!("class redeclaration must be a short class specifier"),
                    }
                }
                RedeclarationTarget::Component(comp) => {
                    let NodeKind::ComponentClause {
                        type_specifier,
                        declarations,
                        ..
                    } = ast.get(comp).clone()
                    else {
                        panic!("redeclaration component target must be a ComponentClause");
                    };
                    let decl_id = *declarations.first();
                    let NodeKind::ComponentDeclaration { name, modification, .. } = ast.get(decl_id).clone() else {
                        panic!("component clause must declare at least one component");
                    };
                    let modif = modification
                        .map(|m| Modification::from_modification_node(ast, m, scope.clone()))
                        .unwrap_or_else(Modification::empty);
                    (name, RedeclKind::Component, type_specifier, modif)
                }
            };
            ModArg::Redeclare(Redeclaration {
                name,
                each,
                r#final,
                replaceable,
                kind,
                type_specifier,
                modification: Box::new(modification),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem(path: &str, expr: AstExpr) -> ModArg {
        ModArg::Element(ElementMod {
            each: false,
            r#final: false,
            path: DottedName::from_str(path),
            arguments: Vec::new(),
            expr: Some(expr),
            description: None,
        })
    }

    #[test]
    fn merge_is_identity_on_empty() {
        let m = Modification::new(None, vec![elem("j", AstExpr::real(1.0))], None, None, None);
        let merged = Modification::merge(&m, &Modification::empty());
        assert_eq!(merged.hash(), m.hash());
        let merged2 = Modification::merge(&Modification::empty(), &m);
        assert_eq!(merged2.hash(), m.hash());
    }

    #[test]
    fn merge_is_associative_for_compatible_arguments() {
        let a = Modification::new(None, vec![elem("j", AstExpr::real(1.0))], None, None, None);
        let b = Modification::new(None, vec![elem("k", AstExpr::real(2.0))], None, None, None);
        let c = Modification::new(None, vec![elem("l", AstExpr::real(3.0))], None, None, None);
        let left = Modification::merge(&Modification::merge(&a, &b), &c);
        let right = Modification::merge(&a, &Modification::merge(&b, &c));
        assert_eq!(left.hash(), right.hash());
    }

    #[test]
    fn override_wins_on_duplicate_element_name() {
        let base = Modification::new(None, vec![elem("j", AstExpr::real(1.0))], None, None, None);
        let over = Modification::new(None, vec![elem("j", AstExpr::real(3.0))], None, None, None);
        let merged = Modification::merge(&base, &over);
        let j = merged.argument_named(Name::new("j")).unwrap();
        match j {
            ModArg::Element(e) => assert_eq!(e.expr, Some(AstExpr::real(3.0))),
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn extract_child_peels_dotted_path() {
        let nested = ModArg::Element(ElementMod {
            each: false,
            r#final: false,
            path: DottedName::from_str("f.q"),
            arguments: Vec::new(),
            expr: Some(AstExpr::real(2.0)),
            description: None,
        });
        let m = Modification::new(None, vec![nested], None, None, None);
        let extracted = m.extract_child(Name::new("f"));
        let q = extracted.argument_named(Name::new("q")).unwrap();
        match q {
            ModArg::Element(e) => assert_eq!(e.expr, Some(AstExpr::real(2.0))),
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn hash_is_identical_for_structurally_identical_modifications() {
        let a = Modification::new(None, vec![elem("j", AstExpr::real(1.0))], None, None, None);
        let b = Modification::new(None, vec![elem("j", AstExpr::real(1.0))], None, None, None);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn split_broadcasts_each_but_indexes_otherwise() {
        let broadcast = match elem("start", AstExpr::real(5.0)) {
            ModArg::Element(mut e) => {
                e.each = true;
                ModArg::Element(e)
            }
            _ => unreachable!(),
        };
        let indexed = elem("value", AstExpr::name("v"));
        let m = Modification::new(None, vec![broadcast, indexed], None, None, None);
        let zero = m.split(3, 0);
        let one = m.split(3, 1);
        match (
            zero.argument_named(Name::new("start")).unwrap(),
            one.argument_named(Name::new("start")).unwrap(),
        ) {
            (ModArg::Element(a), ModArg::Element(b)) => assert_eq!(a.expr, b.expr),
            _ => panic!("expected elements"),
        }
        match (
            zero.argument_named(Name::new("value")).unwrap(),
            one.argument_named(Name::new("value")).unwrap(),
        ) {
            (ModArg::Element(a), ModArg::Element(b)) => assert_ne!(a.expr, b.expr),
            _ => panic!("expected elements"),
        }
    }
}

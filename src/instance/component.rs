//! `ComponentInstance` (§3, §4.4): a declared variable/sub-component slot.
//! Its class is resolved lazily — on first access, not at `instantiate()`
//! time — per the late-type-resolution invariant (§3 invariant 6).

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::expr::Expr as AstExpr;
use crate::ast::Causality;
use crate::ast::FlowStream;
use crate::ast::Variability;
use crate::error::ErrorCollector;
use crate::error::ErrorKind;
use crate::error::Range;
use crate::instance::ClassInstance;
use crate::instance::ClassInstanceRef;
use crate::intern::DottedName;
use crate::intern::Name;
use crate::modification::Modification;

#[derive(Debug)]
pub struct ComponentInstance {
    pub name: Name,
    pub declared_type: DottedName,
    pub variability: Variability,
    pub causality: Causality,
    pub flow_stream: FlowStream,
    pub array_subscripts: Vec<AstExpr>,
    pub modification: Modification,
    pub condition: Option<AstExpr>,
    pub description: Option<String>,
    class: RefCell<Option<ClassInstanceRef>>,
}

impl ComponentInstance {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: Name,
        declared_type: DottedName,
        variability: Variability,
        causality: Causality,
        flow_stream: FlowStream,
        array_subscripts: Vec<AstExpr>,
        modification: Modification,
        condition: Option<AstExpr>,
        description: Option<String>,
    ) -> Self {
        ComponentInstance {
            name,
            declared_type,
            variability,
            causality,
            flow_stream,
            array_subscripts,
            modification,
            condition,
            description,
            class: RefCell::new(None),
        }
    }

    /// A synthetic per-element slot created while instantiating an
    /// `ArrayClassInstance` kind (§4.4): its class is already resolved.
    pub fn array_element(index: usize, class: ClassInstanceRef) -> Self {
        ComponentInstance {
            name: Name::new(&format!("[{}]", index + 1)),
            declared_type: DottedName::single(class.name),
            variability: Variability::default(),
            causality: Causality::default(),
            flow_stream: FlowStream::default(),
            array_subscripts: Vec::new(),
            modification: Modification::empty(),
            condition: None,
            description: None,
            class: RefCell::new(Some(class)),
        }
    }

    /// Resolve, clone, and instantiate this component's class against
    /// `owner` (the `ClassInstance` that declared it) — memoized so later
    /// lookups are free. `owner.modification` may carry a component
    /// redeclaration or an element modification addressing this component's
    /// name; both are applied here (§4.3, §4.4).
    pub fn resolve_class(
        &self,
        owner: &ClassInstanceRef,
        errors: &ErrorCollector,
        resource_path: &str,
    ) -> Option<ClassInstanceRef> {
        if let Some(c) = self.class.borrow().clone() {
            return Some(c);
        }
        let redeclaration = owner.modification.component_redeclaration(self.name);
        let type_specifier = redeclaration
            .map(|r| r.type_specifier.clone())
            .unwrap_or_else(|| self.declared_type.clone());
        let Some(mut base) = crate::resolve::resolve_type_specifier(owner, &type_specifier, errors, resource_path) else {
            errors.error(
                ErrorKind::UnresolvedType,
                format!("component '{}' type '{}' did not resolve in scope", self.name, type_specifier),
                resource_path,
                Range::zero(),
            );
            return None;
        };
        if let Some(r) = redeclaration {
            base = base.clone_with(&r.modification);
        }
        let own_mod = owner.modification.extract_child(self.name);
        let merged = Modification::merge(&self.modification, &own_mod);

        let target = if self.array_subscripts.is_empty() {
            base
        } else {
            let shape = self.evaluate_shape(owner, errors, resource_path);
            Rc::new(ClassInstance::new_array(base, shape))
        };
        let cloned = target.clone_with(&merged);
        if cloned.instantiate(errors, resource_path).is_err() {
            return None;
        }
        *self.class.borrow_mut() = Some(cloned.clone());
        Some(cloned)
    }

    fn evaluate_shape(&self, owner: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Vec<i64> {
        self.array_subscripts
            .iter()
            .map(|dim| {
                if matches!(dim, AstExpr::DeferredSubscript) {
                    return -1;
                }
                match crate::interpreter::fold_expr(dim, owner, errors, resource_path) {
                    Some(crate::expr_ir::Expr::IntegerLit(n)) if n >= 0 => n,
                    _ => {
                        errors.warning(
                            ErrorKind::ArraySplitMismatch,
                            format!("could not evaluate array dimension for component '{}'", self.name),
                            resource_path,
                            Range::zero(),
                        );
                        -1
                    }
                }
            })
            .collect()
    }
}

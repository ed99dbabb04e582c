//! The constant-folding interpreter (§4.6): turns syntactic `ast::expr::Expr`
//! into the partially-evaluated `expr_ir::Expr`, resolving component
//! references and instantiating record-constructor calls along the way.
//!
//! This covers literal folding, component-value lookup through an already
//! merged `Modification`, array constructor/concatenation/range
//! shape-building, and function-call-to-record-clone via synthesized
//! `ParameterModification`s. It does not perform general dataflow constant
//! propagation across equations — out of scope per the source system's own
//! non-goals around equation solving.

use crate::ast::expr::Arg;
use crate::ast::expr::ComponentRef;
use crate::ast::expr::Expr as AstExpr;
use crate::error::ErrorCollector;
use crate::error::ErrorKind;
use crate::error::Range;
use crate::expr_ir::Expr as IrExpr;
use crate::instance::ClassInstanceRef;
use crate::intern::DottedName;
use crate::modification::ModArg;
use crate::modification::Modification;
use crate::modification::ParameterMod;

/// Fold `expr` against `scope`, returning `None` when a sub-expression
/// can't yet be reduced to a value (§4.2's "partial results via `None`").
pub fn fold_expr(expr: &AstExpr, scope: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Option<IrExpr> {
    match expr {
        AstExpr::BooleanLit(b) => Some(IrExpr::BooleanLit(*b)),
        AstExpr::UnsignedIntegerLit(i) => Some(IrExpr::IntegerLit(*i)),
        AstExpr::UnsignedRealLit(r) => Some(IrExpr::RealLit(*r)),
        AstExpr::StringLit(s) => Some(IrExpr::StringLit(s.clone())),
        AstExpr::Paren(inner) => fold_expr(inner, scope, errors, resource_path),
        AstExpr::Unary(op, operand) => Some(IrExpr::unary(*op, fold_expr(operand, scope, errors, resource_path)?)),
        AstExpr::Binary(op, lhs, rhs) => {
            let l = fold_expr(lhs, scope, errors, resource_path)?;
            let r = fold_expr(rhs, scope, errors, resource_path)?;
            Some(IrExpr::binary(*op, l, r))
        }
        AstExpr::ComponentReference(cref) => resolve_and_fold_component(cref, scope, errors, resource_path),
        AstExpr::Index { base, subscripts } => fold_index(base, subscripts, scope, errors, resource_path),
        AstExpr::Field { base, name } => {
            let base_val = fold_expr(base, scope, errors, resource_path)?;
            match base_val {
                IrExpr::Record { fields, .. } => fields.into_iter().find(|(n, _)| n == name).map(|(_, v)| v),
                _ => None,
            }
        }
        AstExpr::ArrayConstructor { elements, comprehension } if comprehension.is_empty() => {
            let folded: Vec<IrExpr> = elements
                .iter()
                .map(|e| fold_expr(e, scope, errors, resource_path))
                .collect::<Option<_>>()?;
            Some(IrExpr::Array {
                shape: vec![folded.len() as i64],
                elements: folded,
            })
        }
        AstExpr::ArrayConcatenation(rows) => fold_matrix(rows, scope, errors, resource_path),
        AstExpr::Range { start, step, stop } => fold_range(start, step.as_deref(), stop, scope, errors, resource_path),
        AstExpr::IfElse { branches, else_branch } => {
            for (cond, value) in branches.iter() {
                match fold_expr(cond, scope, errors, resource_path) {
                    Some(IrExpr::BooleanLit(true)) => return fold_expr(value, scope, errors, resource_path),
                    Some(IrExpr::BooleanLit(false)) => continue,
                    _ => return None,
                }
            }
            fold_expr(else_branch, scope, errors, resource_path)
        }
        AstExpr::FunctionCall { function, args } => fold_function_call(function, args, scope, errors, resource_path),
        // Comprehensions iterate over a range this crate does not evaluate
        // as a full for-loop; out of scope (§1 Non-goals).
        AstExpr::ArrayConstructor { .. } => None,
        // A `:` dimension is deferred by definition; `evaluate_shape` maps
        // it straight to `-1` without ever calling into the folder.
        AstExpr::DeferredSubscript => None,
    }
}

fn fold_index(base: &AstExpr, subscripts: &[AstExpr], scope: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Option<IrExpr> {
    if subscripts.len() != 1 {
        return None;
    }
    let base_val = fold_expr(base, scope, errors, resource_path)?;
    let idx_val = fold_expr(&subscripts[0], scope, errors, resource_path)?;
    match (base_val, idx_val) {
        (IrExpr::Array { elements, .. }, IrExpr::IntegerLit(i)) => {
            let idx = usize::try_from(i - 1).ok()?;
            elements.get(idx).cloned()
        }
        _ => None,
    }
}

fn fold_matrix(rows: &[Vec<AstExpr>], scope: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Option<IrExpr> {
    let ncols = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut flat = Vec::new();
    for row in rows {
        if row.len() != ncols {
            errors.warning(
                ErrorKind::ArraySplitMismatch,
                "matrix literal rows have differing lengths",
                resource_path,
                Range::zero(),
            );
        }
        for e in row {
            flat.push(fold_expr(e, scope, errors, resource_path)?);
        }
    }
    Some(IrExpr::Array {
        shape: vec![rows.len() as i64, ncols as i64],
        elements: flat,
    })
}

fn fold_range(
    start: &AstExpr,
    step: Option<&AstExpr>,
    stop: &AstExpr,
    scope: &ClassInstanceRef,
    errors: &ErrorCollector,
    resource_path: &str,
) -> Option<IrExpr> {
    let a = fold_expr(start, scope, errors, resource_path)?;
    let b = fold_expr(stop, scope, errors, resource_path)?;
    let k = match step {
        Some(s) => fold_expr(s, scope, errors, resource_path)?,
        None => IrExpr::IntegerLit(1),
    };
    let (IrExpr::IntegerLit(a), IrExpr::IntegerLit(b), IrExpr::IntegerLit(k)) = (a, b, k) else {
        return None;
    };
    if k == 0 {
        return None;
    }
    let mut values = Vec::new();
    let mut cur = a;
    while (k > 0 && cur <= b) || (k < 0 && cur >= b) {
        values.push(IrExpr::IntegerLit(cur));
        cur += k;
    }
    Some(IrExpr::Array {
        shape: vec![values.len() as i64],
        elements: values,
    })
}

fn resolve_and_fold_component(cref: &ComponentRef, scope: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Option<IrExpr> {
    if let Some(component) = crate::resolve::resolve_component_reference(scope, cref, errors, resource_path) {
        if let Some(memoized) = component.modification.memoized_fold() {
            return memoized;
        }
        let value = component
            .modification
            .expr
            .as_ref()
            .and_then(|e| fold_expr(e, scope, errors, resource_path))
            .or_else(|| {
                component
                    .resolve_class(scope, errors, resource_path)
                    .and_then(|ci| from_class_instance(&ci, errors, resource_path))
            });
        component.modification.set_memoized_fold(value.clone());
        return value;
    }
    if let Some(class) = crate::resolve::resolve_type_specifier(scope, &path_from_cref(cref), errors, resource_path) {
        if let Some(value) = from_class_instance(&class, errors, resource_path) {
            return Some(value);
        }
    }
    fold_enumeration_literal(cref, scope, errors, resource_path)
}

/// `Expression::fromClassInstance(ci)` (§4.2, §4.6): the canonical rule for
/// turning an *instantiated class* into an IR value, as opposed to folding a
/// syntactic expression. Dispatches on `ci.kind`: a predefined or
/// enumeration instance reads back through its own merged modification
/// (the same literal-selection `fold_expr` already does for a component's
/// bound expression); an array-class instance converts each per-index
/// child in order; anything else becomes a Record tagged with the class
/// name, one field per child component, missing children skipped.
pub fn from_class_instance(ci: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Option<IrExpr> {
    match &ci.kind {
        crate::instance::ClassInstanceKind::Predefined(_) | crate::instance::ClassInstanceKind::Enumeration { .. } => {
            ci.modification.expr.as_ref().and_then(|e| fold_expr(e, ci, errors, resource_path))
        }
        crate::instance::ClassInstanceKind::Array { shape, .. } => {
            let elements: Vec<IrExpr> = ci
                .components_snapshot()
                .into_iter()
                .filter_map(|component| {
                    let child = component.resolve_class(ci, errors, resource_path)?;
                    from_class_instance(&child, errors, resource_path)
                })
                .collect();
            Some(IrExpr::Array {
                shape: shape.clone(),
                elements,
            })
        }
        crate::instance::ClassInstanceKind::Normal | crate::instance::ClassInstanceKind::Short { .. } => {
            let fields: Vec<(crate::intern::Name, IrExpr)> = ci
                .components_snapshot()
                .into_iter()
                .filter_map(|component| {
                    let child = component.resolve_class(ci, errors, resource_path)?;
                    from_class_instance(&child, errors, resource_path).map(|v| (component.name, v))
                })
                .collect();
            Some(IrExpr::Record {
                fields,
                class_tag: Some(ci.name),
            })
        }
    }
}

/// A dotted path whose last segment names an enumeration literal of the
/// class its leading segments resolve to — e.g. `Modelica.Blocks.Types.Init.InitialState`
/// (§4.2, §4.6 enumeration-selection scenario). Tried only after component
/// resolution fails, since a component always shadows a type-path read.
fn fold_enumeration_literal(cref: &ComponentRef, scope: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Option<IrExpr> {
    let parts = &cref.parts;
    if parts.len() < 2 {
        return None;
    }
    let last = parts.last()?.name;
    let parent_path = DottedName(parts[..parts.len() - 1].iter().map(|p| p.name).collect());
    let enum_class = crate::resolve::resolve_type_specifier(scope, &parent_path, errors, resource_path)?;
    let literals = enum_class.enumeration_literals()?;
    let (ordinal, name, _) = literals.into_iter().find(|(_, n, _)| *n == last)?;
    Some(IrExpr::EnumerationLit(ordinal, name))
}

fn path_from_cref(cref: &ComponentRef) -> DottedName {
    DottedName(cref.parts.iter().map(|p| p.name).collect())
}

/// A bare function call on a record/model type is treated as a record
/// constructor (§4.6): named arguments become synthesized
/// `ParameterModification`s, the callee is cloned and instantiated, and its
/// fields are read back as a `Record` value.
fn fold_function_call(function: &ComponentRef, args: &[Arg], scope: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Option<IrExpr> {
    let target = crate::resolve::resolve_type_specifier(scope, &path_from_cref(function), errors, resource_path)?;
    let mod_args = args
        .iter()
        .filter_map(|a| match a {
            Arg::Named(name, expr) => Some(ModArg::Parameter(ParameterMod {
                name: *name,
                expr: expr.clone(),
                scope: Some(scope.clone()),
            })),
            Arg::Positional(_) => None,
        })
        .collect();
    let synthesized = Modification::new(Some(scope.clone()), mod_args, None, None, None);
    let cloned = target.clone_with(&synthesized);
    cloned.instantiate(errors, resource_path).ok()?;
    fold_record_fields(&cloned, errors, resource_path)
}

fn fold_record_fields(instance: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Option<IrExpr> {
    let mut fields = Vec::new();
    for component in instance.components_snapshot() {
        if let Some(memoized) = component.modification.memoized_fold() {
            if let Some(v) = memoized {
                fields.push((component.name, v));
                continue;
            }
        }
        let value = component
            .modification
            .expr
            .as_ref()
            .and_then(|e| fold_expr(e, instance, errors, resource_path));
        component.modification.set_memoized_fold(value.clone());
        if let Some(v) = value {
            fields.push((component.name, v));
        }
    }
    Some(IrExpr::Record {
        fields,
        class_tag: Some(instance.name),
    })
}

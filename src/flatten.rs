//! The flattener/printer (§4.8): walks an instantiated class tree from a
//! root class name and emits the canonical `class Name … end Name;` form —
//! one declaration per reachable leaf component, one line per equation,
//! component references rewritten through the full instance path.

use std::rc::Rc;

use crate::ast::equation::Equation;
use crate::ast::expr::Arg;
use crate::ast::expr::ComponentRef;
use crate::ast::expr::Expr as AstExpr;
use crate::ast::Causality;
use crate::ast::FlowStream;
use crate::ast::Variability;
use crate::collab::Writer;
use crate::error::ErrorCollector;
use crate::error::FatalError;
use crate::instance::component::ComponentInstance;
use crate::instance::ClassInstanceKind;
use crate::instance::ClassInstanceRef;
use crate::intern::Name;

/// Attribute names read off a predefined scalar's merged modification and
/// printed as `name(attr = expr, …)` (§3 "Predefined instances", §4.8).
const PREDEFINED_ATTRS: &[&str] = &[
    "quantity",
    "unit",
    "displayUnit",
    "min",
    "max",
    "start",
    "fixed",
    "nominal",
    "unbounded",
    "stateSelect",
];

struct Output {
    decls: Vec<String>,
    equations: Vec<String>,
}

/// Instantiate `root` (idempotent if already done) and write its flattened
/// form to `writer`. LF newlines, two-space indent (§6).
#[tracing::instrument(level = "debug", skip(root, errors, writer))]
pub fn flatten(root: &ClassInstanceRef, class_name: &str, errors: &ErrorCollector, resource_path: &str, writer: &mut dyn Writer) -> Result<(), FatalError> {
    root.instantiate(errors, resource_path)?;
    let mut out = Output {
        decls: Vec::new(),
        equations: Vec::new(),
    };
    collect_declarations(root, "", errors, resource_path, &mut out);
    collect_equations(root, "", &mut out);

    write_line(writer, 0, &format!("class {class_name}"));
    for decl in &out.decls {
        write_line(writer, 1, decl);
    }
    if !out.equations.is_empty() {
        write_line(writer, 1, "equation");
        for eq in &out.equations {
            write_line(writer, 1, eq);
        }
    }
    write_line(writer, 0, &format!("end {class_name};"));
    Ok(())
}

fn write_line(writer: &mut dyn Writer, indent: usize, text: &str) {
    for _ in 0..indent {
        writer.write("  ").expect("writing to an in-memory sink never fails");
    }
    writer.write(text).expect("writing to an in-memory sink never fails");
    writer.write("\n").expect("writing to an in-memory sink never fails");
}

fn join_path(prefix: &str, name: &str) -> String {
    if name.starts_with('[') {
        format!("{prefix}{name}")
    } else if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn collect_declarations(owner: &ClassInstanceRef, path_prefix: &str, errors: &ErrorCollector, resource_path: &str, out: &mut Output) {
    for comp in owner.own_components() {
        emit_component(&comp, owner, path_prefix, errors, resource_path, out);
    }
    for base in owner.extends_snapshot() {
        collect_declarations(&base, path_prefix, errors, resource_path, out);
    }
}

fn collect_equations(owner: &ClassInstanceRef, path_prefix: &str, out: &mut Output) {
    for eq in owner.own_equations() {
        out.equations.push(render_equation(&eq, path_prefix));
    }
    for base in owner.extends_snapshot() {
        collect_equations(&base, path_prefix, out);
    }
}

fn emit_component(comp: &Rc<ComponentInstance>, owner: &ClassInstanceRef, path_prefix: &str, errors: &ErrorCollector, resource_path: &str, out: &mut Output) {
    let Some(class) = comp.resolve_class(owner, errors, resource_path) else {
        return;
    };
    let full_path = join_path(path_prefix, &comp.name.to_string());
    match &class.kind {
        ClassInstanceKind::Predefined(_) => out.decls.push(render_scalar_decl(comp, &class, &full_path, errors, resource_path)),
        ClassInstanceKind::Enumeration { .. } => out.decls.push(render_enum_decl(comp, &class, &full_path, errors, resource_path)),
        ClassInstanceKind::Array { .. } => {
            for element in class.own_components() {
                emit_component(&element, &class, &full_path, errors, resource_path, out);
            }
        }
        ClassInstanceKind::Short { .. } | ClassInstanceKind::Normal => {
            collect_declarations(&class, &full_path, errors, resource_path, out);
            collect_equations(&class, &full_path, out);
        }
    }
}

fn prefix_keywords(comp: &ComponentInstance) -> String {
    let mut parts = Vec::new();
    match comp.flow_stream {
        FlowStream::Flow => parts.push("flow"),
        FlowStream::Stream => parts.push("stream"),
        FlowStream::None => {}
    }
    match comp.variability {
        Variability::Parameter => parts.push("parameter"),
        Variability::Constant => parts.push("constant"),
        Variability::Discrete => parts.push("discrete"),
        Variability::Continuous => {}
    }
    match comp.causality {
        Causality::Input => parts.push("input"),
        Causality::Output => parts.push("output"),
        Causality::None => {}
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{} ", parts.join(" "))
    }
}

fn render_description(comp: &ComponentInstance) -> String {
    match &comp.description {
        Some(d) => format!(" {d:?}"),
        None => String::new(),
    }
}

fn collect_attrs(class: &ClassInstanceRef, errors: &ErrorCollector, resource_path: &str) -> Vec<String> {
    let mut attrs = Vec::new();
    for attr in PREDEFINED_ATTRS {
        if let Some(crate::modification::ModArg::Element(e)) = class.modification.argument_named(Name::new(attr)) {
            if let Some(expr) = &e.expr {
                if let Some(folded) = crate::interpreter::fold_expr(expr, class, errors, resource_path) {
                    attrs.push(format!("{attr} = {folded}"));
                }
            }
        }
    }
    attrs
}

fn render_scalar_decl(comp: &ComponentInstance, class: &ClassInstanceRef, full_path: &str, errors: &ErrorCollector, resource_path: &str) -> String {
    let mut s = String::new();
    s.push_str(&prefix_keywords(comp));
    s.push_str(class.name.as_str());
    s.push(' ');
    s.push_str(full_path);
    let attrs = collect_attrs(class, errors, resource_path);
    if !attrs.is_empty() {
        s.push('(');
        s.push_str(&attrs.join(", "));
        s.push(')');
    }
    if let Some(expr) = &class.modification.expr {
        if let Some(folded) = crate::interpreter::fold_expr(expr, class, errors, resource_path) {
            s.push_str(" = ");
            s.push_str(&folded.to_string());
        }
    }
    s.push_str(&render_description(comp));
    s.push(';');
    s
}

fn render_enum_decl(comp: &ComponentInstance, class: &ClassInstanceRef, full_path: &str, errors: &ErrorCollector, resource_path: &str) -> String {
    let mut s = String::new();
    s.push_str(&prefix_keywords(comp));
    s.push_str(class.name.as_str());
    s.push(' ');
    s.push_str(full_path);
    if let Some(expr) = &class.modification.expr {
        if let Some(folded) = crate::interpreter::fold_expr(expr, class, errors, resource_path) {
            s.push_str(" = ");
            s.push_str(&folded.to_string());
        }
    }
    s.push_str(&render_description(comp));
    s.push(';');
    s
}

fn render_equation(eq: &Equation, path_prefix: &str) -> String {
    match eq {
        Equation::Simple { lhs, rhs } => format!("{} = {};", render_expr(lhs, path_prefix), render_expr(rhs, path_prefix)),
        Equation::Procedure { call } => format!("{};", render_expr(call, path_prefix)),
        Equation::Connect { lhs, rhs } => format!("connect({}, {});", render_cref(lhs, path_prefix), render_cref(rhs, path_prefix)),
        Equation::If { branches, else_branch } => {
            let mut s = String::new();
            for (i, (cond, body)) in branches.iter().enumerate() {
                s.push_str(if i == 0 { "if " } else { "elseif " });
                s.push_str(&render_expr(cond, path_prefix));
                s.push_str(" then ");
                s.push_str(&render_equation_block(body, path_prefix));
            }
            if !else_branch.is_empty() {
                s.push_str(" else ");
                s.push_str(&render_equation_block(else_branch, path_prefix));
            }
            s.push_str(" end if;");
            s
        }
        Equation::For { indices, body } => {
            let names: Vec<String> = indices.iter().map(|i| i.name.to_string()).collect();
            format!("for {} loop {} end for;", names.join(", "), render_equation_block(body, path_prefix))
        }
        Equation::When { branches } => {
            let mut s = String::new();
            for (i, (cond, body)) in branches.iter().enumerate() {
                s.push_str(if i == 0 { "when " } else { "elsewhen " });
                s.push_str(&render_expr(cond, path_prefix));
                s.push_str(" then ");
                s.push_str(&render_equation_block(body, path_prefix));
            }
            s.push_str(" end when;");
            s
        }
    }
}

fn render_equation_block(body: &[Equation], path_prefix: &str) -> String {
    body.iter().map(|e| render_equation(e, path_prefix)).collect::<Vec<_>>().join(" ")
}

fn render_cref(cref: &ComponentRef, path_prefix: &str) -> String {
    let rendered = cref
        .parts
        .iter()
        .map(|p| {
            if p.subscripts.is_empty() {
                p.name.to_string()
            } else {
                let subs: Vec<String> = p.subscripts.iter().map(|s| render_expr(s, "")).collect();
                format!("{}[{}]", p.name, subs.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(".");
    if path_prefix.is_empty() {
        rendered
    } else {
        format!("{path_prefix}.{rendered}")
    }
}

fn render_expr(e: &AstExpr, path_prefix: &str) -> String {
    use crate::ast::expr::BinaryOp::*;
    match e {
        AstExpr::BooleanLit(b) => b.to_string(),
        AstExpr::UnsignedIntegerLit(i) => i.to_string(),
        AstExpr::UnsignedRealLit(r) => r.to_string(),
        AstExpr::StringLit(s) => format!("{s:?}"),
        AstExpr::ComponentReference(cref) => render_cref(cref, path_prefix),
        AstExpr::Paren(inner) => format!("({})", render_expr(inner, path_prefix)),
        AstExpr::Unary(op, operand) => {
            let sym = match op {
                crate::ast::expr::UnaryOp::Not => "not ",
                crate::ast::expr::UnaryOp::Neg => "-",
                crate::ast::expr::UnaryOp::Plus => "+",
            };
            format!("{sym}{}", render_expr(operand, path_prefix))
        }
        AstExpr::Binary(op, lhs, rhs) => {
            let sym = match op {
                Or => "or",
                And => "and",
                Lt => "<",
                Le => "<=",
                Gt => ">",
                Ge => ">=",
                Eq => "==",
                Ne => "<>",
                Add => "+",
                Sub => "-",
                ElemAdd => ".+",
                ElemSub => ".-",
                Mul => "*",
                Div => "/",
                ElemMul => ".*",
                ElemDiv => "./",
                Pow => "^",
                ElemPow => ".^",
            };
            format!("{} {sym} {}", render_expr(lhs, path_prefix), render_expr(rhs, path_prefix))
        }
        AstExpr::IfElse { branches, else_branch } => {
            let mut s = String::new();
            for (i, (cond, value)) in branches.iter().enumerate() {
                s.push_str(if i == 0 { "if " } else { " elseif " });
                s.push_str(&render_expr(cond, path_prefix));
                s.push_str(" then ");
                s.push_str(&render_expr(value, path_prefix));
            }
            s.push_str(" else ");
            s.push_str(&render_expr(else_branch, path_prefix));
            s
        }
        AstExpr::Range { start, step, stop } => match step {
            Some(s) => format!("{}:{}:{}", render_expr(start, path_prefix), render_expr(s, path_prefix), render_expr(stop, path_prefix)),
            None => format!("{}:{}", render_expr(start, path_prefix), render_expr(stop, path_prefix)),
        },
        AstExpr::FunctionCall { function, args } => {
            let rendered_args: Vec<String> = args
                .iter()
                .map(|a| match a {
                    Arg::Positional(e) => render_expr(e, path_prefix),
                    Arg::Named(n, e) => format!("{n} = {}", render_expr(e, path_prefix)),
                })
                .collect();
            format!("{}({})", render_cref(function, ""), rendered_args.join(", "))
        }
        AstExpr::Index { base, subscripts } => {
            let subs: Vec<String> = subscripts.iter().map(|s| render_expr(s, path_prefix)).collect();
            format!("{}[{}]", render_expr(base, path_prefix), subs.join(", "))
        }
        AstExpr::Field { base, name } => format!("{}.{}", render_expr(base, path_prefix), name),
        AstExpr::ArrayConcatenation(rows) => {
            let rows_rendered: Vec<String> = rows
                .iter()
                .map(|row| row.iter().map(|e| render_expr(e, path_prefix)).collect::<Vec<_>>().join(", "))
                .collect();
            format!("[{}]", rows_rendered.join("; "))
        }
        AstExpr::ArrayConstructor { elements, .. } => {
            let rendered: Vec<String> = elements.iter().map(|e| render_expr(e, path_prefix)).collect();
            format!("{{{}}}", rendered.join(", "))
        }
        AstExpr::DeferredSubscript => ":".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;
    use crate::ast::ClassKind;
    use crate::ast::ClassPrefixes;
    use crate::ast::ClassSpecifier;
    use crate::ast::Element;
    use crate::error::Range;
    use crate::instance::ClassInstance;
    use crate::modification::ElementMod;
    use crate::modification::ModArg;
    use crate::modification::Modification;

    fn scalar_component(ast: &mut Ast, name: &str, type_name: &str, modification: Option<crate::ast::NodeId>) -> crate::ast::NodeId {
        let decl = ast.add_component_declaration(None, Range::zero(), Name::new(name), Vec::new(), modification, None, None, None);
        ast.add_component_clause(
            None,
            Range::zero(),
            FlowStream::None,
            Variability::Parameter,
            Causality::default(),
            crate::intern::DottedName::from_str(type_name),
            Vec::new(),
            vec1::vec1![decl],
        )
    }

    #[test]
    fn flattens_a_single_parameter_declaration() {
        let mut ast = Ast::new();
        let value = ast.add_modification(None, Range::zero(), crate::ast::ModificationBody::Eq { expr: AstExpr::real(3.0) });
        let clause = scalar_component(&mut ast, "j", "Real", Some(value));
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
        let root = ClassInstance::from_class_definition(Rc::new(ast), cls, None);
        let errors = ErrorCollector::new();
        let mut out = String::new();
        flatten(&root, "M", &errors, "m.mo", &mut out).unwrap();
        assert_eq!(out, "class M\n  parameter Real j = 3.0;\nend M;\n");
    }

    #[test]
    fn merge_identity_keeps_empty_modification_scalar_unprinted() {
        // A component with no assigned value folds to no `= expr` suffix.
        let mut ast = Ast::new();
        let clause = scalar_component(&mut ast, "j", "Real", None);
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
        let root = ClassInstance::from_class_definition(Rc::new(ast), cls, None);
        let errors = ErrorCollector::new();
        let mut out = String::new();
        flatten(&root, "M", &errors, "m.mo", &mut out).unwrap();
        assert_eq!(out, "class M\n  parameter Real j;\nend M;\n");
        let _ = ModArg::Element(ElementMod {
            each: false,
            r#final: false,
            path: crate::intern::DottedName::from_str("j"),
            arguments: Vec::new(),
            expr: None,
            description: None,
        });
        let _ = Modification::empty();
    }
}

//! End-to-end scenarios: build a small source tree directly through the
//! AST builders (no concrete grammar in this crate), instantiate it, and
//! check the flattened text or resolved values against the literal inputs
//! and outputs these scenarios name.

use std::rc::Rc;

use modc::ast::expr::Expr as AstExpr;
use modc::ast::Ast;
use modc::ast::ClassKind;
use modc::ast::ClassPrefixes;
use modc::ast::ClassSpecifier;
use modc::ast::Element;
use modc::ast::FlowStream;
use modc::ast::ModArg as AstModArg;
use modc::ast::ModificationBody;
use modc::ast::NodeId;
use modc::ast::RedeclarationTarget;
use modc::ast::Variability;
use modc::error::ErrorCollector;
use modc::error::Range;
use modc::instance::ClassInstance;
use modc::instance::ClassInstanceRef;
use modc::intern::DottedName;
use modc::intern::Name;

fn long_class(
    ast: &mut Ast,
    name: &str,
    elements: Vec<Element>,
) -> NodeId {
    ast.add_class_definition(
        None,
        Range::zero(),
        ClassPrefixes::default(),
        ClassKind::Model,
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

fn package(ast: &mut Ast, name: &str, elements: Vec<Element>) -> NodeId {
    ast.add_class_definition(
        None,
        Range::zero(),
        ClassPrefixes::default(),
        ClassKind::Package,
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

/// A scalar `variability TypeName name [= value];` component clause.
fn scalar(
    ast: &mut Ast,
    variability: Variability,
    type_name: &str,
    decl_name: &str,
    value: Option<AstExpr>,
) -> NodeId {
    let modification = value.map(|v| ast.add_modification(None, Range::zero(), ModificationBody::Eq { expr: v }));
    let decl = ast.add_component_declaration(None, Range::zero(), Name::new(decl_name), Vec::new(), modification, None, None, None);
    ast.add_component_clause(
        None,
        Range::zero(),
        FlowStream::None,
        variability,
        modc::ast::Causality::default(),
        DottedName::from_str(type_name),
        Vec::new(),
        vec1::vec1![decl],
    )
}

/// A component clause with a single element-modification argument, e.g.
/// `Foo f(q = 2.0);`.
fn component_with_mod(ast: &mut Ast, type_name: &str, decl_name: &str, arg_name: &str, arg_value: AstExpr) -> NodeId {
    let arg_mod = ast.add_modification(None, Range::zero(), ModificationBody::Eq { expr: arg_value });
    let class_mod = ast.add_modification(
        None,
        Range::zero(),
        ModificationBody::ClassMod {
            arguments: vec![AstModArg::Modification(ast.add_element_modification(
                None,
                Range::zero(),
                false,
                false,
                DottedName::from_str(arg_name),
                Some(arg_mod),
                None,
            ))],
            expr: None,
        },
    );
    let decl = ast.add_component_declaration(None, Range::zero(), Name::new(decl_name), Vec::new(), Some(class_mod), None, None, None);
    ast.add_component_clause(
        None,
        Range::zero(),
        FlowStream::None,
        Variability::default(),
        modc::ast::Causality::default(),
        DottedName::from_str(type_name),
        Vec::new(),
        vec1::vec1![decl],
    )
}

fn instantiate_and_fetch(ast: Ast, root_node: NodeId, child: &str) -> ClassInstanceRef {
    let ast = Rc::new(ast);
    let root = ClassInstance::from_class_definition(ast, root_node, None);
    let errors = ErrorCollector::new();
    root.instantiate(&errors, "m.mo").unwrap();
    root.declared_class(Name::new(child)).unwrap()
}

#[test]
fn simple_layered_modification() {
    // model Motor
    //   model Foo parameter Real q; end Foo;
    //   parameter Real j = 1.0;
    //   Foo f(q = 2.0);
    // end Motor;
    // model M
    //   Motor m(j = 3.0);
    //   Motor n(f(q = 5.0));
    // end M;
    let mut ast = Ast::new();
    let foo = long_class(&mut ast, "Foo", vec![Element::Component(scalar(&mut ast, Variability::Parameter, "Real", "q", None))]);
    let j_clause = scalar(&mut ast, Variability::Parameter, "Real", "j", Some(AstExpr::real(1.0)));
    let f_clause = component_with_mod(&mut ast, "Foo", "f", "q", AstExpr::real(2.0));
    let motor = long_class(&mut ast, "Motor", vec![Element::Class(foo), Element::Component(j_clause), Element::Component(f_clause)]);

    let m_clause = component_with_mod(&mut ast, "Motor", "m", "j", AstExpr::real(3.0));
    let n_f_mod = ast.add_modification(
        None,
        Range::zero(),
        ModificationBody::Eq { expr: AstExpr::real(5.0) },
    );
    let n_class_mod = ast.add_modification(
        None,
        Range::zero(),
        ModificationBody::ClassMod {
            arguments: vec![AstModArg::Modification(ast.add_element_modification(
                None,
                Range::zero(),
                false,
                false,
                DottedName::from_str("f"),
                Some(ast.add_modification(
                    None,
                    Range::zero(),
                    ModificationBody::ClassMod {
                        arguments: vec![AstModArg::Modification(ast.add_element_modification(
                            None,
                            Range::zero(),
                            false,
                            false,
                            DottedName::from_str("q"),
                            Some(n_f_mod),
                            None,
                        ))],
                        expr: None,
                    },
                )),
                None,
            ))],
            expr: None,
        },
    );
    let n_decl = ast.add_component_declaration(None, Range::zero(), Name::new("n"), Vec::new(), Some(n_class_mod), None, None, None);
    let n_clause = ast.add_component_clause(
        None,
        Range::zero(),
        FlowStream::None,
        Variability::default(),
        modc::ast::Causality::default(),
        DottedName::from_str("Motor"),
        Vec::new(),
        vec1::vec1![n_decl],
    );

    let m_model = long_class(&mut ast, "M", vec![Element::Component(m_clause), Element::Component(n_clause)]);
    let root = package(&mut ast, "Root", vec![Element::Class(motor), Element::Class(m_model)]);

    let m_instance = instantiate_and_fetch(ast, root, "M");
    let errors = ErrorCollector::new();
    let mut out = String::new();
    modc::flatten::flatten(&m_instance, "M", &errors, "m.mo", &mut out).unwrap();
    assert_eq!(
        out,
        "class M\n  parameter Real m.j = 3.0;\n  parameter Real m.f.q = 2.0;\n  parameter Real n.j = 1.0;\n  parameter Real n.f.q = 5.0;\nend M;\n"
    );
}

#[test]
fn inheritance_with_modification_through_extends() {
    // model A parameter Real x = 1; end A;
    // model B extends A(x = 2); end B;
    let mut ast = Ast::new();
    let a = long_class(&mut ast, "A", vec![Element::Component(scalar(&mut ast, Variability::Parameter, "Real", "x", Some(AstExpr::int(1))))]);

    let x_mod = ast.add_modification(None, Range::zero(), ModificationBody::Eq { expr: AstExpr::int(2) });
    let ext_class_mod = ast.add_modification(
        None,
        Range::zero(),
        ModificationBody::ClassMod {
            arguments: vec![AstModArg::Modification(ast.add_element_modification(
                None,
                Range::zero(),
                false,
                false,
                DottedName::from_str("x"),
                Some(x_mod),
                None,
            ))],
            expr: None,
        },
    );
    let extends = ast.add_extends_clause(None, Range::zero(), DottedName::from_str("A"), Some(ext_class_mod), None);
    let b = long_class(&mut ast, "B", vec![Element::Extends(extends)]);
    let root = package(&mut ast, "Root", vec![Element::Class(a), Element::Class(b)]);

    let b_instance = instantiate_and_fetch(ast, root, "B");
    let errors = ErrorCollector::new();
    let mut out = String::new();
    modc::flatten::flatten(&b_instance, "B", &errors, "m.mo", &mut out).unwrap();
    assert_eq!(out, "class B\n  parameter Real x = 2;\nend B;\n");
}

#[test]
fn enumeration_selection() {
    // package Modelica
    //   package Blocks
    //     package Types
    //       type Init = enumeration(InitialState, SteadyState);
    //     end Types;
    //   end Blocks;
    // end Modelica;
    // model User <uses Modelica.Blocks.Types.Init.InitialState> end User;
    let mut ast = Ast::new();
    let init = ast.add_class_definition(
        None,
        Range::zero(),
        ClassPrefixes::default(),
        ClassKind::Type,
        ClassSpecifier::Enumeration {
            identifier: Name::new("Init"),
            literals: vec![
                modc::ast::equation::EnumerationLiteral {
                    name: Name::new("InitialState"),
                    description: None,
                },
                modc::ast::equation::EnumerationLiteral {
                    name: Name::new("SteadyState"),
                    description: None,
                },
            ],
        },
    );
    let types = package(&mut ast, "Types", vec![Element::Class(init)]);
    let blocks = package(&mut ast, "Blocks", vec![Element::Class(types)]);
    let modelica = package(&mut ast, "Modelica", vec![Element::Class(blocks)]);
    let user = long_class(&mut ast, "User", Vec::new());
    let root = package(&mut ast, "Root", vec![Element::Class(modelica), Element::Class(user)]);

    let user_instance = instantiate_and_fetch(ast, root, "User");
    let errors = ErrorCollector::new();
    let path_expr = AstExpr::path("Modelica.Blocks.Types.Init.InitialState");
    let folded = modc::interpreter::fold_expr(&path_expr, &user_instance, &errors, "m.mo").expect("enumeration literal resolves");
    assert_eq!(folded.to_string(), "InitialState");
}

#[test]
fn array_dimensioning_via_parameter() {
    // parameter Integer n = 3; Real v[n] = {1.0, 2.0, 3.0};
    let mut ast = Ast::new();
    let n_clause = scalar(&mut ast, Variability::Parameter, "Integer", "n", Some(AstExpr::int(3)));

    let array_value = ast.add_modification(
        None,
        Range::zero(),
        ModificationBody::Eq {
            expr: AstExpr::ArrayConstructor {
                elements: vec![AstExpr::real(1.0), AstExpr::real(2.0), AstExpr::real(3.0)],
                comprehension: Vec::new(),
            },
        },
    );
    let v_decl = ast.add_component_declaration(None, Range::zero(), Name::new("v"), Vec::new(), Some(array_value), None, None, None);
    let v_clause = ast.add_component_clause(
        None,
        Range::zero(),
        FlowStream::None,
        Variability::default(),
        modc::ast::Causality::default(),
        DottedName::from_str("Real"),
        vec![AstExpr::name("n")],
        vec1::vec1![v_decl],
    );
    let model = long_class(&mut ast, "M", vec![Element::Component(n_clause), Element::Component(v_clause)]);
    let root = package(&mut ast, "Root", vec![Element::Class(model)]);

    let m_instance = instantiate_and_fetch(ast, root, "M");
    let errors = ErrorCollector::new();
    let mut out = String::new();
    modc::flatten::flatten(&m_instance, "M", &errors, "m.mo", &mut out).unwrap();
    assert!(errors.is_empty());
    assert!(out.contains("v[1] = 1.0;"), "output was:\n{out}");
    assert!(out.contains("v[2] = 2.0;"), "output was:\n{out}");
    assert!(out.contains("v[3] = 3.0;"), "output was:\n{out}");
}

#[test]
fn redeclaration() {
    // model Foo end Foo;
    // model Bar end Bar;
    // model C replaceable Foo x; end C;
    // model D = C(redeclare Bar x);
    let mut ast = Ast::new();
    let foo = long_class(&mut ast, "Foo", Vec::new());
    let bar = long_class(&mut ast, "Bar", Vec::new());

    let x_decl = ast.add_component_declaration(None, Range::zero(), Name::new("x"), Vec::new(), None, None, None, None);
    let x_clause = ast.add_component_clause(
        None,
        Range::zero(),
        FlowStream::None,
        Variability::default(),
        modc::ast::Causality::default(),
        DottedName::from_str("Foo"),
        Vec::new(),
        vec1::vec1![x_decl],
    );
    let c = long_class(&mut ast, "C", vec![Element::Component(x_clause)]);

    let redeclare_decl = ast.add_component_declaration(None, Range::zero(), Name::new("x"), Vec::new(), None, None, None, None);
    let redeclare_clause = ast.add_component_clause(
        None,
        Range::zero(),
        FlowStream::None,
        Variability::default(),
        modc::ast::Causality::default(),
        DottedName::from_str("Bar"),
        Vec::new(),
        vec1::vec1![redeclare_decl],
    );
    let redeclaration = ast.add_element_redeclaration(None, Range::zero(), false, false, false, RedeclarationTarget::Component(redeclare_clause));
    let d_mod = ast.add_modification(
        None,
        Range::zero(),
        ModificationBody::ClassMod {
            arguments: vec![AstModArg::Redeclaration(redeclaration)],
            expr: None,
        },
    );
    let d = ast.add_class_definition(
        None,
        Range::zero(),
        ClassPrefixes::default(),
        ClassKind::Model,
        ClassSpecifier::Short {
            identifier: Name::new("D"),
            type_specifier: DottedName::from_str("C"),
            array_subscripts: Vec::new(),
            modification: Some(d_mod),
        },
    );
    let root = package(&mut ast, "Root", vec![Element::Class(foo), Element::Class(bar), Element::Class(c), Element::Class(d)]);

    let d_instance = instantiate_and_fetch(ast, root, "D");
    let errors = ErrorCollector::new();
    let (x, owner) = d_instance
        .declared_component_with_owner(Name::new("x"))
        .expect("x inherited through D's extends of C");
    let x_class = x.resolve_class(&owner, &errors, "m.mo").expect("x's type resolves");
    assert_eq!(x_class.name, Name::new("Bar"));
}

#[test]
fn cache_reuse_grows_by_one_not_two() {
    let mut ast = Ast::new();
    let cls = long_class(&mut ast, "Simple", vec![Element::Component(scalar(&mut ast, Variability::Parameter, "Real", "j", None))]);
    let ast = Rc::new(ast);
    let root = ClassInstance::from_class_definition(ast, cls, None);
    let errors = ErrorCollector::new();
    root.instantiate(&errors, "m.mo").unwrap();

    let modification = modc::modification::Modification::new(
        None,
        vec![modc::modification::ModArg::Element(modc::modification::ElementMod {
            each: false,
            r#final: false,
            path: DottedName::from_str("j"),
            arguments: Vec::new(),
            expr: Some(AstExpr::real(2.0)),
            description: None,
        })],
        None,
        None,
        None,
    );

    assert_eq!(root.clone_cache_len(), 0);
    let a = root.clone_with(&modification);
    let b = root.clone_with(&modification);
    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(root.clone_cache_len(), 1);
}

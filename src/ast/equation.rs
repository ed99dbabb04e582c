//! Equation and statement syntax (§4.1). These are carried through the
//! core largely opaquely (§1 Non-goals: no when-equations / stream
//! connectors in evaluation) and rewritten name-wise by the flattener
//! (§4.8).

use crate::ast::expr::ComponentRef;
use crate::ast::expr::Expr;
use crate::ast::expr::ForIndex;
use crate::intern::Name;

#[derive(Debug, Clone, PartialEq)]
pub enum Equation {
    /// `lhs = rhs;`
    Simple { lhs: Expr, rhs: Expr },
    /// A bare function-call statement used as an equation.
    Procedure { call: Expr },
    If {
        branches: Vec<(Expr, Vec<Equation>)>,
        else_branch: Vec<Equation>,
    },
    For {
        indices: Vec<ForIndex>,
        body: Vec<Equation>,
    },
    /// `connect(a, b);` — topological resolution is out of scope (§4.8).
    Connect { lhs: ComponentRef, rhs: ComponentRef },
    When {
        branches: Vec<(Expr, Vec<Equation>)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment { target: ComponentRef, value: Expr },
    Call { call: Expr },
    If {
        branches: Vec<(Expr, Vec<Statement>)>,
        else_branch: Vec<Statement>,
    },
    For {
        indices: Vec<ForIndex>,
        body: Vec<Statement>,
    },
    While {
        condition: Expr,
        body: Vec<Statement>,
    },
    When {
        branches: Vec<(Expr, Vec<Statement>)>,
    },
    Break,
    Return,
}

/// A declared literal inside `type X = enumeration(a, b, c)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationLiteral {
    pub name: Name,
    pub description: Option<String>,
}

//! Expression syntax (§4.1). Kept as an owned recursive tree rather than
//! arena-indexed: expressions are read-only inputs to the interpreter
//! (§4.6) and are never mutated or diamond-shared the way class/component
//! instances are, so they don't need the cycle-breaking indirection the
//! instance graph does (see DESIGN.md).

use crate::intern::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Add,
    Sub,
    ElemAdd,
    ElemSub,
    Mul,
    Div,
    ElemMul,
    ElemDiv,
    Pow,
    ElemPow,
}

impl BinaryOp {
    /// Precedence, lowest-binds-last: `or` < `and` < relational < additive
    /// < multiplicative < exponentiation (§4.1).
    pub fn precedence(self) -> u8 {
        use BinaryOp::*;
        match self {
            Or => 1,
            And => 2,
            Lt | Le | Gt | Ge | Eq | Ne => 3,
            Add | Sub | ElemAdd | ElemSub => 4,
            Mul | Div | ElemMul | ElemDiv => 5,
            Pow | ElemPow => 6,
        }
    }

    /// Only exponentiation is right-associative.
    pub fn right_associative(self) -> bool {
        matches!(self, BinaryOp::Pow | BinaryOp::ElemPow)
    }
}

/// One segment of a dotted component reference, with its own subscripts:
/// `a[1].b[2,3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RefSegment {
    pub name: Name,
    pub subscripts: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRef {
    pub global: bool,
    pub parts: Vec<RefSegment>,
}

impl ComponentRef {
    pub fn simple(name: Name) -> Self {
        ComponentRef {
            global: false,
            parts: vec![RefSegment {
                name,
                subscripts: Vec::new(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Named(Name, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForIndex {
    pub name: Name,
    pub range: Option<Expr>,
}

/// Syntactic expressions (§4.1). Distinct from the partially-evaluated
/// `expr_ir::Expr` the interpreter (§4.6) produces from these.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BooleanLit(bool),
    UnsignedIntegerLit(i64),
    UnsignedRealLit(f64),
    StringLit(String),
    ComponentReference(ComponentRef),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Paren(Box<Expr>),
    IfElse {
        branches: Vec1<(Expr, Expr)>,
        else_branch: Box<Expr>,
    },
    Range {
        start: Box<Expr>,
        step: Option<Box<Expr>>,
        stop: Box<Expr>,
    },
    FunctionCall {
        function: ComponentRef,
        args: Vec<Arg>,
    },
    Index {
        base: Box<Expr>,
        subscripts: Vec<Expr>,
    },
    Field {
        base: Box<Expr>,
        name: Name,
    },
    /// `[e11, e12; e21, e22]`
    ArrayConcatenation(Vec<Vec<Expr>>),
    /// `{e1, e2, ...}`, optionally a comprehension `{e for i in range}`.
    ArrayConstructor {
        elements: Vec<Expr>,
        comprehension: Vec<ForIndex>,
    },
    /// A bare `:` subscript — dimension left for the compiler to infer from
    /// a binding, recorded as a deferred (`-1`) axis rather than folded to
    /// a concrete size (§4.4).
    DeferredSubscript,
}

use vec1::Vec1;

impl Expr {
    pub fn int(v: i64) -> Self {
        Expr::UnsignedIntegerLit(v)
    }

    pub fn real(v: f64) -> Self {
        Expr::UnsignedRealLit(v)
    }

    pub fn name(n: &str) -> Self {
        Expr::ComponentReference(ComponentRef::simple(Name::new(n)))
    }

    pub fn path(p: &str) -> Self {
        let parts = p
            .split('.')
            .map(|s| RefSegment {
                name: Name::new(s),
                subscripts: Vec::new(),
            })
            .collect();
        Expr::ComponentReference(ComponentRef {
            global: false,
            parts,
        })
    }
}

//! Expression IR (§4.2): flattened, partially-evaluated expression values.
//!
//! Unlike `ast::expr::Expr` (raw syntax), values here are either fully
//! literal or a folded combination of literals; `split`/`fromClassInstance`
//! and the flattener all operate on this representation.

use std::fmt;

use itertools::Itertools;
use serde_json::Value as Json;

use crate::ast::expr::BinaryOp;
use crate::ast::expr::UnaryOp;
use crate::intern::Name;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BooleanLit(bool),
    IntegerLit(i64),
    RealLit(f64),
    StringLit(String),
    /// `(ordinal, label)` — ordinal is 1-based per the Modelica enumeration rule.
    EnumerationLit(u32, Name),
    Array {
        shape: Vec<i64>,
        elements: Vec<Expr>,
    },
    /// Ordered name -> value, with an optional class tag for `@type`.
    Record {
        fields: Vec<(Name, Expr)>,
        class_tag: Option<Name>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn flat_len(&self) -> Option<usize> {
        match self {
            Expr::Array { elements, .. } => Some(elements.len()),
            _ => None,
        }
    }

    /// Fold a unary operator over a (possibly non-literal) operand,
    /// producing a literal when the operand is compatible, else a
    /// still-unevaluated `Unary` node (§4.2).
    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        match (op, &operand) {
            (UnaryOp::Not, Expr::BooleanLit(b)) => Expr::BooleanLit(!b),
            (UnaryOp::Neg, Expr::IntegerLit(i)) => Expr::IntegerLit(-i),
            (UnaryOp::Neg, Expr::RealLit(r)) => Expr::RealLit(-r),
            (UnaryOp::Plus, Expr::IntegerLit(_) | Expr::RealLit(_)) => operand,
            _ => Expr::Unary(op, Box::new(operand)),
        }
    }

    /// Fold a binary operator over two (possibly non-literal) operands
    /// (§4.2). Integer-op-Real and Real-op-Real yield Real.
    ///
    /// Boolean equality here intentionally preserves the source's
    /// documented behavior: `==` folds to "values are unequal" and `<>`
    /// to "values are equal". This is flagged, not silently fixed — see
    /// DESIGN.md and spec §9.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        use BinaryOp::*;
        match (op, &lhs, &rhs) {
            (Or, Expr::BooleanLit(a), Expr::BooleanLit(b)) => Expr::BooleanLit(*a || *b),
            (And, Expr::BooleanLit(a), Expr::BooleanLit(b)) => Expr::BooleanLit(*a && *b),
            (Eq, Expr::BooleanLit(a), Expr::BooleanLit(b)) => Expr::BooleanLit(a != b),
            (Ne, Expr::BooleanLit(a), Expr::BooleanLit(b)) => Expr::BooleanLit(a == b),
            (Eq, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::BooleanLit(a == b),
            (Ne, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::BooleanLit(a != b),
            (Eq, Expr::StringLit(a), Expr::StringLit(b)) => Expr::BooleanLit(a == b),
            (Ne, Expr::StringLit(a), Expr::StringLit(b)) => Expr::BooleanLit(a != b),
            (Lt, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::BooleanLit(a < b),
            (Le, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::BooleanLit(a <= b),
            (Gt, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::BooleanLit(a > b),
            (Ge, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::BooleanLit(a >= b),
            (Lt, a, b) if is_numeric(a) && is_numeric(b) => Expr::BooleanLit(as_f64(a) < as_f64(b)),
            (Le, a, b) if is_numeric(a) && is_numeric(b) => Expr::BooleanLit(as_f64(a) <= as_f64(b)),
            (Gt, a, b) if is_numeric(a) && is_numeric(b) => Expr::BooleanLit(as_f64(a) > as_f64(b)),
            (Ge, a, b) if is_numeric(a) && is_numeric(b) => Expr::BooleanLit(as_f64(a) >= as_f64(b)),
            (Add, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::IntegerLit(a + b),
            (Sub, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::IntegerLit(a - b),
            (Mul, Expr::IntegerLit(a), Expr::IntegerLit(b)) => Expr::IntegerLit(a * b),
            (Div, Expr::IntegerLit(a), Expr::IntegerLit(b)) if *b != 0 => Expr::RealLit(*a as f64 / *b as f64),
            (Add, a, b) | (ElemAdd, a, b) if is_numeric(a) && is_numeric(b) => Expr::RealLit(as_f64(a) + as_f64(b)),
            (Sub, a, b) | (ElemSub, a, b) if is_numeric(a) && is_numeric(b) => Expr::RealLit(as_f64(a) - as_f64(b)),
            (Mul, a, b) | (ElemMul, a, b) if is_numeric(a) && is_numeric(b) => Expr::RealLit(as_f64(a) * as_f64(b)),
            (Div, a, b) | (ElemDiv, a, b) if is_numeric(a) && is_numeric(b) && as_f64(b) != 0.0 => {
                Expr::RealLit(as_f64(a) / as_f64(b))
            }
            (Pow, a, b) | (ElemPow, a, b) if is_numeric(a) && is_numeric(b) => {
                Expr::RealLit(as_f64(a).powf(as_f64(b)))
            }
            _ => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Split into `n` per-element expressions, as used when an array-class
    /// is constructed from a literal modification (§4.2).
    ///
    /// Scalars yield `n` copies; binary/unary operands split componentwise;
    /// an already-flat array of length `n` is returned as-is.
    pub fn split(&self, n: usize) -> Vec<Expr> {
        match self {
            Expr::Array { elements, .. } if elements.len() == n => elements.clone(),
            Expr::Array { elements, shape } if shape.len() > 1 && elements.len() % n.max(1) == 0 && n > 0 => {
                let chunk = elements.len() / n;
                elements
                    .chunks(chunk)
                    .map(|c| Expr::Array {
                        shape: shape[1..].to_vec(),
                        elements: c.to_vec(),
                    })
                    .collect()
            }
            Expr::Unary(op, operand) => operand.split(n).into_iter().map(|e| Expr::unary(*op, e)).collect(),
            Expr::Binary(op, lhs, rhs) => {
                let ls = lhs.split(n);
                let rs = rhs.split(n);
                ls.into_iter()
                    .zip(rs)
                    .map(|(l, r)| Expr::binary(*op, l, r))
                    .collect()
            }
            other => std::iter::repeat(other.clone()).take(n).collect(),
        }
    }

    pub fn split_one(&self, n: usize, i: usize) -> Expr {
        self.split(n).into_iter().nth(i).expect("split index in range")
    }

    /// Stable JSON serialization (§4.2): literals map to scalars, arrays
    /// fold back to nested lists via `shape`, records become objects with
    /// an optional `@type` key.
    pub fn to_json(&self) -> Json {
        match self {
            Expr::BooleanLit(b) => Json::Bool(*b),
            Expr::IntegerLit(i) => Json::Number((*i).into()),
            Expr::RealLit(r) => serde_json::Number::from_f64(*r).map(Json::Number).unwrap_or(Json::Null),
            Expr::StringLit(s) => Json::String(s.clone()),
            Expr::EnumerationLit(_, label) => Json::String(label.to_string()),
            Expr::Array { shape, elements } => fold_array_json(shape, elements),
            Expr::Record { fields, class_tag } => {
                let mut map = serde_json::Map::new();
                if let Some(tag) = class_tag {
                    map.insert("@type".to_string(), Json::String(tag.to_string()));
                }
                for (name, value) in fields {
                    map.insert(name.to_string(), value.to_json());
                }
                Json::Object(map)
            }
            // Unevaluated operators have no final literal form; we still
            // need a stable representation for round-trip tests.
            Expr::Unary(op, operand) => Json::Array(vec![Json::String(format!("{op:?}")), operand.to_json()]),
            Expr::Binary(op, lhs, rhs) => Json::Array(vec![
                Json::String(format!("{op:?}")),
                lhs.to_json(),
                rhs.to_json(),
            ]),
        }
    }

    /// Deterministic, run-stable hash used by `Modification::hash` (§4.3).
    pub fn content_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hash_into(self, &mut hasher);
        hasher.finalize()
    }
}

fn is_numeric(e: &Expr) -> bool {
    matches!(e, Expr::IntegerLit(_) | Expr::RealLit(_))
}

fn as_f64(e: &Expr) -> f64 {
    match e {
        Expr::IntegerLit(i) => *i as f64,
        Expr::RealLit(r) => *r,
        _ => unreachable!("as_f64 called on non-numeric literal"),
    }
}

fn fold_array_json(shape: &[i64], elements: &[Expr]) -> Json {
    match shape {
        [] | [_] => Json::Array(elements.iter().map(Expr::to_json).collect()),
        [head, rest @ ..] if *head >= 0 => {
            let chunk = if *head == 0 { 0 } else { elements.len() / (*head as usize) };
            Json::Array(
                elements
                    .chunks(chunk.max(1))
                    .map(|c| fold_array_json(rest, c))
                    .collect(),
            )
        }
        _ => Json::Array(elements.iter().map(Expr::to_json).collect()),
    }
}

fn hash_into(e: &Expr, hasher: &mut blake3::Hasher) {
    match e {
        Expr::BooleanLit(b) => {
            hasher.update(b"bool");
            hasher.update(&[*b as u8]);
        }
        Expr::IntegerLit(i) => {
            hasher.update(b"int");
            hasher.update(&i.to_le_bytes());
        }
        Expr::RealLit(r) => {
            hasher.update(b"real");
            hasher.update(&r.to_bits().to_le_bytes());
        }
        Expr::StringLit(s) => {
            hasher.update(b"str");
            hasher.update(s.as_bytes());
        }
        Expr::EnumerationLit(ord, label) => {
            hasher.update(b"enum");
            hasher.update(&ord.to_le_bytes());
            hasher.update(label.as_str().as_bytes());
        }
        Expr::Array { shape, elements } => {
            hasher.update(b"array");
            for s in shape {
                hasher.update(&s.to_le_bytes());
            }
            for el in elements {
                hash_into(el, hasher);
            }
        }
        Expr::Record { fields, class_tag } => {
            hasher.update(b"record");
            if let Some(tag) = class_tag {
                hasher.update(tag.as_str().as_bytes());
            }
            for (name, value) in fields {
                hasher.update(name.as_str().as_bytes());
                hash_into(value, hasher);
            }
        }
        Expr::Unary(op, operand) => {
            hasher.update(b"unary");
            hasher.update(format!("{op:?}").as_bytes());
            hash_into(operand, hasher);
        }
        Expr::Binary(op, lhs, rhs) => {
            hasher.update(b"binary");
            hasher.update(format!("{op:?}").as_bytes());
            hash_into(lhs, hasher);
            hash_into(rhs, hasher);
        }
    }
}

/// Render a `Real` the way the flattener's output form requires: always
/// carrying a fractional part, even for a whole number (`3.0`, never `3`).
/// Same `serde_json::Number::from_f64` path `to_json` already uses, so the
/// two stay in lockstep.
fn format_real(r: f64) -> String {
    match serde_json::Number::from_f64(r) {
        Some(n) => n.to_string(),
        None => r.to_string(),
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "not ",
        UnaryOp::Neg => "-",
        UnaryOp::Plus => "+",
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    use BinaryOp::*;
    match op {
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
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::BooleanLit(b) => write!(f, "{b}"),
            Expr::IntegerLit(i) => write!(f, "{i}"),
            Expr::RealLit(r) => write!(f, "{}", format_real(*r)),
            Expr::StringLit(s) => write!(f, "{s:?}"),
            Expr::EnumerationLit(_, label) => write!(f, "{label}"),
            Expr::Array { elements, .. } => write!(f, "{{{}}}", elements.iter().map(|e| e.to_string()).join(", ")),
            Expr::Record { fields, .. } => {
                write!(f, "({})", fields.iter().map(|(n, v)| format!("{n} = {v}")).join(", "))
            }
            Expr::Unary(op, operand) => write!(f, "{}{operand}", unary_symbol(*op)),
            Expr::Binary(op, lhs, rhs) => write!(f, "{lhs} {} {rhs}", binary_symbol(*op)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition_folds() {
        let sum = Expr::binary(BinaryOp::Add, Expr::IntegerLit(1), Expr::IntegerLit(2));
        assert_eq!(sum, Expr::IntegerLit(3));
    }

    #[test]
    fn integer_plus_real_yields_real() {
        let sum = Expr::binary(BinaryOp::Add, Expr::IntegerLit(1), Expr::RealLit(2.5));
        assert_eq!(sum, Expr::RealLit(3.5));
    }

    #[test]
    fn boolean_equality_matches_documented_source_behavior() {
        // Flagged open question (§9): `==` folds to "values are unequal".
        let eq = Expr::binary(BinaryOp::Eq, Expr::BooleanLit(true), Expr::BooleanLit(true));
        assert_eq!(eq, Expr::BooleanLit(false));
        let ne = Expr::binary(BinaryOp::Ne, Expr::BooleanLit(true), Expr::BooleanLit(true));
        assert_eq!(ne, Expr::BooleanLit(true));
    }

    #[test]
    fn split_scalar_yields_n_copies() {
        let v = Expr::RealLit(1.0);
        assert_eq!(v.split(3), vec![Expr::RealLit(1.0); 3]);
    }

    #[test]
    fn split_flat_array_of_matching_length_passes_through() {
        let arr = Expr::Array {
            shape: vec![3],
            elements: vec![Expr::IntegerLit(1), Expr::IntegerLit(2), Expr::IntegerLit(3)],
        };
        assert_eq!(arr.split(3), vec![Expr::IntegerLit(1), Expr::IntegerLit(2), Expr::IntegerLit(3)]);
    }

    #[test]
    fn to_json_is_stable_for_identical_inputs() {
        let arr = Expr::Array {
            shape: vec![2],
            elements: vec![Expr::RealLit(1.0), Expr::RealLit(2.0)],
        };
        assert_eq!(arr.to_json(), arr.to_json());
        assert_eq!(arr.to_json().to_string(), "[1.0,2.0]");
    }

    #[test]
    fn hash_is_stable_and_structural() {
        let a = Expr::binary(BinaryOp::Add, Expr::IntegerLit(1), Expr::IntegerLit(2));
        let b = Expr::IntegerLit(3);
        // a folds to IntegerLit(3) at construction time, so the hashes agree.
        assert_eq!(a.content_hash(), b.content_hash());
    }
}

//! Diagnostics: typed error kinds, individual errors, and the per-library
//! collector that accumulates them without unwinding (§7, §4.9).

use std::cell::RefCell;
use std::fmt;
use std::fmt::Display;

use parse_display::Display as DeriveDisplay;

/// A byte/line interval into some source text, mirroring the `range`
/// parameter of the diagnostics callback in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start_byte: u32,
    pub end_byte: u32,
    pub start_line: u32,
    pub start_column: u32,
}

impl Range {
    pub const fn zero() -> Self {
        Range {
            start_byte: 0,
            end_byte: 0,
            start_line: 1,
            start_column: 1,
        }
    }
}

/// Severity as described in §6's diagnostics callback: `"error"` or `"warning"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

// Kept lexicographically sorted, per the teacher's convention in error/kind.rs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeriveDisplay)]
#[display(style = "Title Case")]
pub enum ErrorKind {
    /// Evaluated array shape disagreed with a literal modification's element count.
    ArraySplitMismatch,
    /// Two sibling elements in the same scope share a name; the later one wins.
    DuplicateElementName,
    /// A long-class specifier's trailing identifier did not match its header.
    EndIdentifierMismatch,
    /// A node produced by the parser collaborator was error- or missing-marked.
    ParseError,
    /// `instantiate()` was re-entered on a node already `Instantiating`. Fatal.
    ReentrantInstantiation,
    /// An import clause named a package or symbol that does not resolve.
    UnresolvedImport,
    /// A component's type specifier did not resolve to any class.
    UnresolvedType,
}

impl ErrorKind {
    /// Whether this kind is raised as a hard `Err` rather than collected.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::ReentrantInstantiation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub resource_path: String,
    pub range: Range,
    pub kind: ErrorKind,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({}:{}:{})",
            self.severity, self.message, self.resource_path, self.range.start_line, self.range.start_column
        )
    }
}

/// A fatal, non-diagnostic failure — the only kind that unwinds to the caller (§7).
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("reentrant instantiate() on '{0}'")]
    ReentrantInstantiation(String),
}

/// Accumulates diagnostics for one `Library`/`flatten()` invocation.
///
/// Single-threaded per §5, so this is `RefCell`-backed rather than the
/// teacher's `Mutex`: there is exactly one logical owner mutating the graph,
/// and no internal parallelism ever contends for this collector.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    items: RefCell<Vec<Diagnostic>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(
        &self,
        severity: Severity,
        kind: ErrorKind,
        message: impl Into<String>,
        resource_path: impl Into<String>,
        range: Range,
    ) {
        self.items.borrow_mut().push(Diagnostic {
            severity,
            message: message.into(),
            resource_path: resource_path.into(),
            range,
            kind,
        });
    }

    pub fn error(&self, kind: ErrorKind, message: impl Into<String>, resource_path: impl Into<String>, range: Range) {
        self.report(Severity::Error, kind, message, resource_path, range);
    }

    pub fn warning(&self, kind: ErrorKind, message: impl Into<String>, resource_path: impl Into<String>, range: Range) {
        self.report(Severity::Warning, kind, message, resource_path, range);
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        self.items.borrow_mut().drain(..).collect()
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.items.borrow().clone()
    }

    pub fn extend(&self, other: &ErrorCollector) {
        self.items.borrow_mut().extend(other.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_without_unwinding() {
        let errors = ErrorCollector::new();
        errors.error(ErrorKind::UnresolvedType, "Class 'X' not found in scope 'Y'.", "m.mo", Range::zero());
        errors.warning(ErrorKind::UnresolvedImport, "import not found", "m.mo", Range::zero());
        assert_eq!(errors.len(), 2);
        let snap = errors.take();
        assert_eq!(snap[0].severity, Severity::Error);
        assert_eq!(snap[1].severity, Severity::Warning);
        assert!(errors.is_empty());
    }

    #[test]
    fn reentrant_instantiation_is_fatal() {
        assert!(ErrorKind::ReentrantInstantiation.is_fatal());
        assert!(!ErrorKind::UnresolvedType.is_fatal());
    }
}

//! Identifier interning.
//!
//! Every simple identifier that flows through the instantiation engine
//! (class names, component names, modification path segments) is interned
//! once per process. After interning, equality and hashing are pointer
//! comparisons, which is what lets `Modification::hash` and name lookups
//! stay cheap even on large libraries.

use std::fmt;
use std::fmt::Display;

use dupe::Dupe;
use static_interner::Interned;
use static_interner::Interner;

static INTERNER: Interner<str> = Interner::new();

/// An interned identifier.
///
/// `Copy`, and compared/hashed by interner id rather than by byte content.
#[derive(Debug, Clone, Copy, Dupe, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Interned<str>);

impl Name {
    pub fn new(s: &str) -> Self {
        Name(INTERNER.intern(s))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name::new(&s)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dotted path of interned identifiers, e.g. `Modelica.Blocks.Types`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DottedName(pub Vec<Name>);

impl DottedName {
    pub fn single(name: Name) -> Self {
        DottedName(vec![name])
    }

    pub fn from_str(path: &str) -> Self {
        DottedName(path.split('.').map(Name::new).collect())
    }

    pub fn first(&self) -> Name {
        self.0[0]
    }

    pub fn rest(&self) -> &[Name] {
        &self.0[1..]
    }
}

impl Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            Display::fmt(part, f)?;
        }
        Ok(())
    }
}

//! External collaborators (§6): the interfaces this crate depends on but
//! does not implement in full. Production hosts supply real
//! implementations (a tree-sitter grammar for `ParseNode`, a structured
//! package crawler for `Filesystem`, a PO catalog for `Translator`); this
//! crate ships the minimal implementations it needs for its own tests.

use std::fmt;

use crate::error::Range;

/// A node of the parser collaborator's concrete parse tree.
///
/// The real grammar lives outside this crate (§1); this trait is the seam
/// the AST builders (`ast::*::from_concrete`) read through.
pub trait ParseNode {
    /// The grammar's name for this node's kind, e.g. `"component_clause"`.
    fn kind_name(&self) -> &str;

    fn range(&self) -> Range;

    /// The single child registered under `field`, if any.
    fn child_by_field<'a>(&'a self, field: &str) -> Option<&'a dyn ParseNode>;

    /// All children registered under `field`, in source order.
    fn children_by_field<'a>(&'a self, field: &str) -> Vec<&'a dyn ParseNode>;

    fn text(&self) -> &str;

    fn is_error(&self) -> bool {
        false
    }

    fn is_missing(&self) -> bool {
        false
    }
}

/// `getParser(extension) -> { parse(text) -> parseTree }`.
pub trait Parser {
    type Tree: ParseNode;

    fn parse(&self, text: &str) -> Self::Tree;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub is_file: bool,
    pub is_directory: bool,
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_file: bool,
    pub is_directory: bool,
}

/// The filesystem collaborator backing `Library::load` (§6).
pub trait Filesystem {
    fn stat(&self, path: &str) -> Option<Stat>;
    fn readdir(&self, path: &str) -> Vec<DirEntry>;
    fn read(&self, path: &str) -> anyhow::Result<String>;
    fn join(&self, a: &str, b: &str) -> String {
        if a.is_empty() {
            b.to_string()
        } else if a.ends_with('/') {
            format!("{a}{b}")
        } else {
            format!("{a}/{b}")
        }
    }
    fn extname<'a>(&self, path: &'a str) -> &'a str {
        match path.rfind('.') {
            Some(i) => &path[i..],
            None => "",
        }
    }
}

/// Any sink the flattener can write to. LF newlines, two-space indents (§6).
pub trait Writer {
    fn write(&mut self, s: &str) -> fmt::Result;
}

impl Writer for String {
    fn write(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

/// A PO-style message lookup. Passthrough when absent (§6).
pub trait Translator {
    fn translate(&self, msgid: &str, msgctxt: Option<&str>) -> String;
}

/// The identity translator used when no PO catalog is configured.
pub struct PassthroughTranslator;

impl Translator for PassthroughTranslator {
    fn translate(&self, msgid: &str, _msgctxt: Option<&str>) -> String {
        msgid.to_string()
    }
}

/// `std::fs`-backed `Filesystem`, with errors wrapped the way the teacher's
/// `fs_anyhow` wraps every `std::fs` call in its source path.
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    fn stat(&self, path: &str) -> Option<Stat> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Stat {
            is_file: meta.is_file(),
            is_directory: meta.is_dir(),
        })
    }

    fn readdir(&self, path: &str) -> Vec<DirEntry> {
        let Ok(entries) = std::fs::read_dir(path) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let file_type = e.file_type().ok()?;
                Some(DirEntry {
                    name: e.file_name().to_string_lossy().into_owned(),
                    is_file: file_type.is_file(),
                    is_directory: file_type.is_dir(),
                })
            })
            .collect()
    }

    fn read(&self, path: &str) -> anyhow::Result<String> {
        use anyhow::Context;
        std::fs::read_to_string(path).with_context(|| format!("reading '{path}'"))
    }
}

/// In-memory `Filesystem`, keyed by full path, for library-loader tests
/// (§6) — a directory exists implicitly as soon as some file's path has it
/// as a prefix, matching how the teacher's in-memory test filesystems work.
#[derive(Debug, Default, Clone)]
pub struct MemoryFilesystem {
    files: std::collections::BTreeMap<String, String>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, content: &str) {
        self.files.insert(path.to_string(), content.to_string());
    }

    fn is_dir(&self, path: &str) -> bool {
        let prefix = if path.is_empty() { String::new() } else { format!("{path}/") };
        self.files.keys().any(|k| k.starts_with(&prefix) && k.len() > prefix.len())
    }
}

impl Filesystem for MemoryFilesystem {
    fn stat(&self, path: &str) -> Option<Stat> {
        if self.files.contains_key(path) {
            Some(Stat {
                is_file: true,
                is_directory: false,
            })
        } else if self.is_dir(path) {
            Some(Stat {
                is_file: false,
                is_directory: true,
            })
        } else {
            None
        }
    }

    fn readdir(&self, path: &str) -> Vec<DirEntry> {
        let prefix = if path.is_empty() { String::new() } else { format!("{path}/") };
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for key in self.files.keys() {
            let Some(rest) = key.strip_prefix(prefix.as_str()) else { continue };
            if rest.is_empty() {
                continue;
            }
            let name = rest.split('/').next().unwrap().to_string();
            if !seen.insert(name.clone()) {
                continue;
            }
            let is_file = rest == name;
            out.push(DirEntry {
                is_file,
                is_directory: !is_file,
                name,
            });
        }
        out
    }

    fn read(&self, path: &str) -> anyhow::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| anyhow::anyhow!("no such file '{path}' in MemoryFilesystem"))
    }
}

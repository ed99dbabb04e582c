//! The `Library`/`Entity` loader (§3, §6 "Library layout"): walks the
//! `Filesystem` collaborator, distinguishing unstructured single-file
//! entities from structured package directories, honoring `package.order`.
//! Converting a file's text into class-definition nodes is the `Parser`
//! collaborator's job (§1 non-goal: no grammar ships here) — `Entity` holds
//! whatever parse tree `Parser::parse` hands back, unexamined.

use crate::collab::Filesystem;
use crate::collab::ParseNode;
use crate::collab::Parser;

/// One node of the loaded package tree (§3). `definition` is the parsed
/// `package.mo` (structured) or the file itself (unstructured); `None` for
/// a structured directory with no `package.mo`.
pub struct Entity<T> {
    pub path: String,
    pub name: String,
    pub structured: bool,
    pub definition: Option<T>,
    pub children: Vec<Entity<T>>,
}

impl<T> Entity<T> {
    pub fn is_structured(&self) -> bool {
        self.structured
    }
}

pub struct Library<P: Parser, F: Filesystem> {
    parser: P,
    filesystem: F,
    pub root_path: String,
    pub root: Entity<P::Tree>,
}

impl<P: Parser, F: Filesystem> Library<P, F> {
    #[tracing::instrument(level = "debug", skip(parser, filesystem))]
    pub fn load(parser: P, filesystem: F, root_path: &str) -> Self {
        let name = file_stem(root_path);
        let root = load_entity(&parser, &filesystem, root_path, name);
        Library {
            parser,
            filesystem,
            root_path: root_path.to_string(),
            root,
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn filesystem(&self) -> &F {
        &self.filesystem
    }
}

fn file_stem(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(i) => base[..i].to_string(),
        None => base.to_string(),
    }
}

fn load_entity<P: Parser>(parser: &P, filesystem: &impl Filesystem, path: &str, name: String) -> Entity<P::Tree> {
    match filesystem.stat(path) {
        Some(s) if s.is_directory => load_structured(parser, filesystem, path, name),
        _ => load_unstructured(parser, filesystem, path, name),
    }
}

fn load_unstructured<P: Parser>(parser: &P, filesystem: &impl Filesystem, path: &str, name: String) -> Entity<P::Tree> {
    let definition = filesystem.read(path).ok().map(|text| parser.parse(&text));
    Entity {
        path: path.to_string(),
        name,
        structured: false,
        definition,
        children: Vec::new(),
    }
}

/// A directory is a package only if it carries `package.mo` (§6). Its direct
/// children are either a `.mo` file (excluding `package.mo` itself) or a
/// sub-directory that is itself a package — a bare subdirectory with no
/// `package.mo` is not a class entity and is skipped.
fn load_structured<P: Parser>(parser: &P, filesystem: &impl Filesystem, path: &str, name: String) -> Entity<P::Tree> {
    let package_mo = filesystem.join(path, "package.mo");
    let definition = filesystem
        .stat(&package_mo)
        .filter(|s| s.is_file)
        .and_then(|_| filesystem.read(&package_mo).ok())
        .map(|text| parser.parse(&text));

    let mut entries: Vec<String> = filesystem
        .readdir(path)
        .into_iter()
        .filter(|e| e.name != "package.mo" && e.name != "package.order")
        .filter(|e| {
            if e.is_directory {
                let child_package_mo = filesystem.join(&filesystem.join(path, &e.name), "package.mo");
                filesystem.stat(&child_package_mo).map(|s| s.is_file).unwrap_or(false)
            } else {
                filesystem.extname(&e.name) == ".mo"
            }
        })
        .map(|e| e.name)
        .collect();

    let order = read_package_order(filesystem, path);
    entries = sort_by_order(entries, &order);

    let children = entries
        .into_iter()
        .map(|entry_name| {
            let child_path = filesystem.join(path, &entry_name);
            let stem = file_stem(&entry_name);
            load_entity(parser, filesystem, &child_path, stem)
        })
        .collect();

    Entity {
        path: path.to_string(),
        name,
        structured: true,
        definition,
        children,
    }
}

fn read_package_order(filesystem: &impl Filesystem, path: &str) -> Vec<String> {
    let order_path = filesystem.join(path, "package.order");
    match filesystem.read(&order_path) {
        Ok(text) => text.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect(),
        Err(_) => Vec::new(),
    }
}

/// `package.order` entries first (in listed order), then everything else in
/// plain lexicographic order (§6 — locale collation is not attempted here).
fn sort_by_order(entries: Vec<String>, order: &[String]) -> Vec<String> {
    let mut remaining = entries;
    let mut ordered = Vec::new();
    for wanted in order {
        if let Some(pos) = remaining.iter().position(|e| &file_stem(e) == wanted) {
            ordered.push(remaining.remove(pos));
        }
    }
    remaining.sort();
    ordered.extend(remaining);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::MemoryFilesystem;
    use crate::error::Range;

    struct TextTree(String);

    impl ParseNode for TextTree {
        fn kind_name(&self) -> &str {
            "text"
        }
        fn range(&self) -> Range {
            Range::zero()
        }
        fn child_by_field<'a>(&'a self, _field: &str) -> Option<&'a dyn ParseNode> {
            None
        }
        fn children_by_field<'a>(&'a self, _field: &str) -> Vec<&'a dyn ParseNode> {
            Vec::new()
        }
        fn text(&self) -> &str {
            &self.0
        }
    }

    struct TextParser;

    impl Parser for TextParser {
        type Tree = TextTree;
        fn parse(&self, text: &str) -> TextTree {
            TextTree(text.to_string())
        }
    }

    #[test]
    fn unstructured_entity_is_a_single_file() {
        let mut fs = MemoryFilesystem::new();
        fs.insert("M.mo", "model M end M;");
        let lib = Library::load(TextParser, fs, "M.mo");
        assert!(!lib.root.is_structured());
        assert!(lib.root.definition.is_some());
        assert!(lib.root.children.is_empty());
    }

    #[test]
    fn structured_entity_orders_children_by_package_order_then_name() {
        let mut fs = MemoryFilesystem::new();
        fs.insert("P/package.mo", "package P end P;");
        fs.insert("P/package.order", "B\nA\n");
        fs.insert("P/A.mo", "model A end A;");
        fs.insert("P/B.mo", "model B end B;");
        fs.insert("P/C.mo", "model C end C;");
        let lib = Library::load(TextParser, fs, "P");
        assert!(lib.root.is_structured());
        let names: Vec<&str> = lib.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn nested_package_without_package_mo_is_not_a_sub_entity() {
        let mut fs = MemoryFilesystem::new();
        fs.insert("P/package.mo", "package P end P;");
        fs.insert("P/Sub/leftover.txt", "not modelica");
        let lib = Library::load(TextParser, fs, "P");
        assert!(lib.root.children.is_empty());
    }
}

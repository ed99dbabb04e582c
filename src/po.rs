//! PO-catalog `Translator` (§6): parses `msgctxt`/`msgid`/`msgstr` entries,
//! concatenating continuation strings and unescaping `\n`, `\"`, `\\`.
//!
//! `\r\n`-terminated files are not specially normalized (§9 open question):
//! a trailing `\r` is stripped per-line along with the rest of the line
//! terminator before quote-parsing, so it never ends up embedded in a
//! decoded string, but no attempt is made to detect or reject mixed
//! line-ending files. Left as the spec leaves it — undefined rather than
//! silently picking a behavior — and recorded in DESIGN.md.

use std::collections::HashMap;

use crate::collab::Translator;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    msgctxt: Option<String>,
    msgid: String,
}

enum Field {
    Ctxt,
    Id,
    Str,
}

/// A parsed PO catalog: `(msgctxt, msgid) -> msgstr`.
#[derive(Debug, Clone, Default)]
pub struct PoCatalog {
    entries: HashMap<Key, String>,
}

impl PoCatalog {
    pub fn parse(source: &str) -> Self {
        let mut entries = HashMap::new();
        let mut msgctxt: Option<String> = None;
        let mut msgid: Option<String> = None;
        let mut msgstr: Option<String> = None;
        let mut current: Option<Field> = None;

        for raw_line in source.lines() {
            let line = raw_line.trim_end_matches('\r');
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                flush(&mut entries, &mut msgctxt, &mut msgid, &mut msgstr);
                current = None;
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("msgctxt ") {
                msgctxt = Some(unescape(unquote(rest)));
                current = Some(Field::Ctxt);
            } else if let Some(rest) = trimmed.strip_prefix("msgid ") {
                msgid = Some(unescape(unquote(rest)));
                current = Some(Field::Id);
            } else if let Some(rest) = trimmed.strip_prefix("msgstr ") {
                msgstr = Some(unescape(unquote(rest)));
                current = Some(Field::Str);
            } else if trimmed.starts_with('"') {
                let cont = unescape(unquote(trimmed));
                match current {
                    Some(Field::Ctxt) => {
                        if let Some(s) = &mut msgctxt {
                            s.push_str(&cont);
                        }
                    }
                    Some(Field::Id) => {
                        if let Some(s) = &mut msgid {
                            s.push_str(&cont);
                        }
                    }
                    Some(Field::Str) => {
                        if let Some(s) = &mut msgstr {
                            s.push_str(&cont);
                        }
                    }
                    None => {}
                }
            }
        }
        flush(&mut entries, &mut msgctxt, &mut msgid, &mut msgstr);

        PoCatalog { entries }
    }

    pub fn lookup(&self, msgid: &str, msgctxt: Option<&str>) -> Option<&str> {
        self.entries
            .get(&Key {
                msgctxt: msgctxt.map(str::to_string),
                msgid: msgid.to_string(),
            })
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Translator for PoCatalog {
    fn translate(&self, msgid: &str, msgctxt: Option<&str>) -> String {
        self.lookup(msgid, msgctxt).map(str::to_string).unwrap_or_else(|| msgid.to_string())
    }
}

fn flush(entries: &mut HashMap<Key, String>, msgctxt: &mut Option<String>, msgid: &mut Option<String>, msgstr: &mut Option<String>) {
    if let (Some(id), Some(s)) = (msgid.take(), msgstr.take()) {
        entries.insert(Key { msgctxt: msgctxt.take(), msgid: id }, s);
    } else {
        *msgctxt = None;
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_a_simple_entry() {
        let catalog = PoCatalog::parse("msgid \"hello\"\nmsgstr \"bonjour\"\n");
        assert_eq!(catalog.lookup("hello", None), Some("bonjour"));
    }

    #[test]
    fn concatenates_continuation_strings() {
        let source = "msgid \"\"\n\"first \"\n\"second\"\nmsgstr \"\"\n\"premier \"\n\"second\"\n";
        let catalog = PoCatalog::parse(source);
        assert_eq!(catalog.lookup("first second", None), Some("premier second"));
    }

    #[test]
    fn unescapes_newline_quote_and_backslash() {
        let source = r#"msgid "a\nb\"c\\d"
msgstr "x\ny\"z\\w"
"#;
        let catalog = PoCatalog::parse(source);
        assert_eq!(catalog.lookup("a\nb\"c\\d", None), Some("x\ny\"z\\w"));
    }

    #[test]
    fn msgctxt_disambiguates_identical_msgids() {
        let source = "msgctxt \"menu\"\nmsgid \"Open\"\nmsgstr \"Ouvrir\"\n\nmsgctxt \"verb\"\nmsgid \"Open\"\nmsgstr \"Ouvrez\"\n";
        let catalog = PoCatalog::parse(source);
        assert_eq!(catalog.lookup("Open", Some("menu")), Some("Ouvrir"));
        assert_eq!(catalog.lookup("Open", Some("verb")), Some("Ouvrez"));
        assert_eq!(catalog.lookup("Open", None), None);
    }

    #[test]
    fn translator_passes_through_when_absent() {
        let catalog = PoCatalog::parse("msgid \"known\"\nmsgstr \"connu\"\n");
        assert_eq!(Translator::translate(&catalog, "unknown", None), "unknown");
        assert_eq!(Translator::translate(&catalog, "known", None), "connu");
    }
}

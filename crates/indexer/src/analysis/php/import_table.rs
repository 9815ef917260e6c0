//! Per-namespace name resolution.
//!
//! Each `namespace` block of a file gets its own table holding the `use`
//! aliases declared in it. Class and function aliases are case-insensitive,
//! constant aliases are not.

use rustc_hash::FxHashMap;

use super::types::{NAMESPACE_SEPARATOR, TypeRef};
use crate::analysis::types::TextEdit;
use crate::parsing::tree::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Class,
    Function,
    Const,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Alias {
    alias: String,
    fqn: String,
}

#[derive(Debug, Clone)]
pub struct ImportTable {
    namespace: String,
    start: u32,
    classes: FxHashMap<String, Alias>,
    functions: FxHashMap<String, Alias>,
    consts: FxHashMap<String, Alias>,
    insert_position: Position,
}

/// Leading-backslash form of a namespace or name.
pub fn absolute(name: &str) -> String {
    let trimmed = name.trim().trim_start_matches(NAMESPACE_SEPARATOR);
    format!("{NAMESPACE_SEPARATOR}{trimmed}")
}

/// `name` declared inside `namespace`.
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace == "\\" {
        absolute(name)
    } else {
        format!("{namespace}{NAMESPACE_SEPARATOR}{name}")
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit(NAMESPACE_SEPARATOR).next().unwrap_or(name)
}

fn namespace_of(fqn: &str) -> &str {
    match fqn.rfind(NAMESPACE_SEPARATOR) {
        Some(0) | None => "\\",
        Some(index) => &fqn[..index],
    }
}

impl ImportTable {
    pub fn new(namespace: &str, start: u32) -> Self {
        let namespace = if namespace.trim().trim_matches(NAMESPACE_SEPARATOR).is_empty() {
            "\\".to_string()
        } else {
            absolute(namespace)
        };
        Self {
            namespace,
            start,
            classes: FxHashMap::default(),
            functions: FxHashMap::default(),
            consts: FxHashMap::default(),
            insert_position: Position::default(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Byte offset from which this table applies.
    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn insert_position(&self) -> Position {
        self.insert_position
    }

    /// Moves the point where new `use` statements are inserted.
    pub fn set_insert_position(&mut self, position: Position) {
        self.insert_position = position;
    }

    pub fn add_class_name(&mut self, alias: &str, fq_name: &str) {
        let (alias, fqn) = Self::alias_for(alias, fq_name);
        self.classes.insert(alias.to_lowercase(), Alias { alias, fqn });
    }

    pub fn add_function_name(&mut self, alias: &str, fq_name: &str) {
        let (alias, fqn) = Self::alias_for(alias, fq_name);
        self.functions.insert(alias.to_lowercase(), Alias { alias, fqn });
    }

    pub fn add_const_name(&mut self, alias: &str, fq_name: &str) {
        let (alias, fqn) = Self::alias_for(alias, fq_name);
        self.consts.insert(alias.clone(), Alias { alias, fqn });
    }

    fn alias_for(alias: &str, fq_name: &str) -> (String, String) {
        let fqn = absolute(fq_name);
        let alias = if alias.trim().is_empty() {
            last_segment(&fqn).to_string()
        } else {
            alias.trim().to_string()
        };
        (alias, fqn)
    }

    fn class_alias(&self, alias: &str) -> Option<&str> {
        self.classes.get(&alias.to_lowercase()).map(|a| a.fqn.as_str())
    }

    /// Resolves the class name in `type_ref` in place and returns its fqn.
    ///
    /// Native types and already-qualified names are left as they are.
    pub fn class_reference_fqn(&self, type_ref: &mut TypeRef) -> String {
        if type_ref.is_native() {
            return type_ref.fqn().to_string();
        }
        let original = type_ref.base_original();
        let dimensions = type_ref.dimensions();
        let mut resolved = self.qualify_with_aliases(original, |alias| self.class_alias(alias));
        resolved.push_str(&"[]".repeat(dimensions));
        type_ref.set_fqn(resolved.clone());
        resolved
    }

    fn qualify_with_aliases<'a>(
        &'a self,
        name: &str,
        lookup: impl Fn(&str) -> Option<&'a str>,
    ) -> String {
        if name.starts_with(NAMESPACE_SEPARATOR) {
            return name.to_string();
        }
        if let Some(rest) = strip_prefix_ignore_case(name, "namespace\\") {
            return qualify(&self.namespace, rest);
        }
        match name.split_once(NAMESPACE_SEPARATOR) {
            Some((first, rest)) => match self.class_alias(first) {
                Some(prefix) => format!("{prefix}{NAMESPACE_SEPARATOR}{rest}"),
                None => qualify(&self.namespace, name),
            },
            None => match lookup(name) {
                Some(fqn) => fqn.to_string(),
                None => qualify(&self.namespace, name),
            },
        }
    }

    /// Candidate fqns for a function call, in lookup order. Unqualified
    /// names fall back to the global namespace.
    pub fn function_reference_fqn(&self, name: &str) -> Vec<String> {
        self.fallback_candidates(name, |alias| {
            self.functions.get(&alias.to_lowercase()).map(|a| a.fqn.as_str())
        })
    }

    /// Candidate fqns for a constant, in lookup order.
    pub fn const_reference_fqn(&self, name: &str) -> Vec<String> {
        self.fallback_candidates(name, |alias| self.consts.get(alias).map(|a| a.fqn.as_str()))
    }

    fn fallback_candidates<'a>(
        &'a self,
        name: &str,
        lookup: impl Fn(&str) -> Option<&'a str>,
    ) -> Vec<String> {
        let name = name.trim();
        if name.starts_with(NAMESPACE_SEPARATOR) || name.contains(NAMESPACE_SEPARATOR) {
            return vec![self.qualify_with_aliases(name, |_| None)];
        }
        if let Some(fqn) = lookup(name) {
            return vec![fqn.to_string()];
        }
        let local = qualify(&self.namespace, name);
        let global = absolute(name);
        if local == global {
            vec![local]
        } else {
            vec![local, global]
        }
    }

    /// Shortest spelling of `fqn` valid in this table, plus the `use`
    /// statement to insert when the name has to be imported first.
    pub fn resolve_to_qualified(&self, fqn: &str, kind: ImportKind) -> (String, Option<TextEdit>) {
        let fqn = absolute(fqn);
        let aliases = match kind {
            ImportKind::Class => &self.classes,
            ImportKind::Function => &self.functions,
            ImportKind::Const => &self.consts,
        };

        if let Some(existing) = aliases.values().find(|a| a.fqn.eq_ignore_ascii_case(&fqn)) {
            return (existing.alias.clone(), None);
        }

        if kind == ImportKind::Class {
            for alias in self.classes.values() {
                let prefix = format!("{}{NAMESPACE_SEPARATOR}", alias.fqn);
                let rest = strip_prefix_ignore_case(&fqn, &prefix).filter(|r| !r.is_empty());
                if let Some(rest) = rest {
                    return (format!("{}{NAMESPACE_SEPARATOR}{rest}", alias.alias), None);
                }
            }
        }

        let short = last_segment(&fqn).to_string();
        if namespace_of(&fqn).eq_ignore_ascii_case(&self.namespace) {
            return (short, None);
        }

        let taken = match kind {
            ImportKind::Const => aliases.contains_key(&short),
            _ => aliases.contains_key(&short.to_lowercase()),
        };
        if taken {
            return (fqn, None);
        }

        let keyword = match kind {
            ImportKind::Class => "use",
            ImportKind::Function => "use function",
            ImportKind::Const => "use const",
        };
        let edit = TextEdit {
            position: self.insert_position,
            new_text: format!("{keyword} {};\n", fqn.trim_start_matches(NAMESPACE_SEPARATOR)),
        };
        (short, Some(edit))
    }
}

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        name.get(prefix.len()..)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ImportTable {
        let mut table = ImportTable::new("App\\Http", 0);
        table.add_class_name("", "App\\Models\\User");
        table.add_class_name("Carbon", "Illuminate\\Support\\Carbon");
        table.add_class_name("", "App\\Services");
        table.add_function_name("", "App\\Support\\helper");
        table.add_const_name("", "App\\Support\\LIMIT");
        table.set_insert_position(Position::new(3, 0));
        table
    }

    #[test]
    fn test_class_reference_resolution() {
        let table = table();
        let resolve = |name: &str| table.class_reference_fqn(&mut TypeRef::new(name));

        assert_eq!(resolve("user"), "\\App\\Models\\User");
        assert_eq!(resolve("Carbon[]"), "\\Illuminate\\Support\\Carbon[]");
        assert_eq!(resolve("Services\\Mailer"), "\\App\\Services\\Mailer");
        assert_eq!(resolve("Request"), "\\App\\Http\\Request");
        assert_eq!(resolve("namespace\\Kernel"), "\\App\\Http\\Kernel");
        assert_eq!(resolve("\\Exception"), "\\Exception");
        assert_eq!(resolve("string"), "string");
    }

    #[test]
    fn test_resolution_updates_type_ref() {
        let table = table();
        let mut type_ref = TypeRef::new("User");
        table.class_reference_fqn(&mut type_ref);

        assert_eq!(type_ref.original(), "User");
        assert_eq!(type_ref.fqn(), "\\App\\Models\\User");
    }

    #[test]
    fn test_function_and_const_candidates() {
        let table = table();

        assert_eq!(table.function_reference_fqn("HELPER"), vec!["\\App\\Support\\helper"]);
        assert_eq!(
            table.function_reference_fqn("strlen"),
            vec!["\\App\\Http\\strlen", "\\strlen"]
        );
        assert_eq!(table.const_reference_fqn("LIMIT"), vec!["\\App\\Support\\LIMIT"]);
        assert_eq!(table.const_reference_fqn("limit").len(), 2);
        assert_eq!(
            ImportTable::new("", 0).function_reference_fqn("strlen"),
            vec!["\\strlen"]
        );
    }

    #[test]
    fn test_resolve_to_qualified() {
        let table = table();

        assert_eq!(
            table.resolve_to_qualified("\\App\\Models\\User", ImportKind::Class),
            ("User".to_string(), None)
        );
        assert_eq!(
            table.resolve_to_qualified("\\App\\Services\\Mailer", ImportKind::Class),
            ("Services\\Mailer".to_string(), None)
        );
        assert_eq!(
            table.resolve_to_qualified("\\App\\Http\\Request", ImportKind::Class),
            ("Request".to_string(), None)
        );
        assert_eq!(
            table.resolve_to_qualified("\\Other\\User", ImportKind::Class),
            ("\\Other\\User".to_string(), None)
        );

        let (label, edit) = table.resolve_to_qualified("\\App\\Jobs\\SendMail", ImportKind::Class);
        assert_eq!(label, "SendMail");
        let edit = edit.unwrap();
        assert_eq!(edit.new_text, "use App\\Jobs\\SendMail;\n");
        assert_eq!(edit.position, Position::new(3, 0));
    }

    #[test]
    fn test_multibyte_names_do_not_split_characters() {
        let mut table = ImportTable::new("", 0);
        table.add_class_name("", "Ärger\\Modul");

        assert_eq!(strip_prefix_ignore_case("aÄÄÄÄÄ", "namespace\\"), None);
        assert_eq!(table.class_reference_fqn(&mut TypeRef::new("aÄÄÄÄÄ")), "\\aÄÄÄÄÄ");

        let (label, edit) = table.resolve_to_qualified("\\aaaaaaaaaaaaÄ\\X", ImportKind::Class);
        assert_eq!(label, "X");
        assert_eq!(edit.unwrap().new_text, "use aaaaaaaaaaaaÄ\\X;\n");
        assert_eq!(
            table.resolve_to_qualified("\\Ärger\\Modul\\Ding", ImportKind::Class).0,
            "Modul\\Ding"
        );
    }
}

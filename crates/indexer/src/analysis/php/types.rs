//! Type references and ordered type unions.
//!
//! A [`TypeRef`] keeps the spelling found in source next to its fully
//! qualified form. Native types are lowercased and never carry a leading
//! backslash; class names always do. Array types are written with one `[]`
//! suffix per dimension, so `Foo[][]` is a two dimensional array of `\Foo`.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::import_table::ImportTable;

pub const NAMESPACE_SEPARATOR: char = '\\';
const ARRAY_SUFFIX: &str = "[]";

const NATIVE_TYPES: &[&str] = &[
    "$this", "array", "bool", "callable", "false", "float", "int", "iterable", "mixed", "never",
    "null", "object", "parent", "resource", "self", "static", "string", "true", "void",
];

/// Canonical spelling of native type aliases accepted in docblocks.
fn canonical_native(lower: &str) -> &str {
    match lower {
        "boolean" => "bool",
        "integer" => "int",
        "double" | "real" => "float",
        "callback" => "callable",
        "this" => "$this",
        other => other,
    }
}

fn is_native_name(name: &str) -> bool {
    NATIVE_TYPES.contains(&name)
}

/// Splits `Foo[][]` into (`Foo`, 2).
fn split_array_suffix(name: &str) -> (&str, usize) {
    let mut base = name;
    let mut dimensions = 0;
    while let Some(stripped) = base.strip_suffix(ARRAY_SUFFIX) {
        base = stripped;
        dimensions += 1;
    }
    (base, dimensions)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    original: String,
    fqn: String,
}

impl TypeRef {
    /// Builds a reference from a source spelling. Class names are taken as
    /// global until [`ImportTable::class_reference_fqn`] resolves them.
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        let (base, dimensions) = split_array_suffix(name);
        let lower = base.to_lowercase();
        let canonical = canonical_native(&lower);
        let fqn_base = if is_native_name(canonical) {
            canonical.to_string()
        } else if base.starts_with(NAMESPACE_SEPARATOR) {
            base.to_string()
        } else {
            format!("{NAMESPACE_SEPARATOR}{base}")
        };

        Self {
            original: name.to_string(),
            fqn: format!("{fqn_base}{}", ARRAY_SUFFIX.repeat(dimensions)),
        }
    }

    pub fn with_fqn(original: impl Into<String>, fqn: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            fqn: fqn.into(),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn fqn(&self) -> &str {
        &self.fqn
    }

    pub(crate) fn set_fqn(&mut self, fqn: String) {
        self.fqn = fqn;
    }

    /// Original spelling without array dimensions.
    pub fn base_original(&self) -> &str {
        split_array_suffix(&self.original).0
    }

    pub fn dimensions(&self) -> usize {
        split_array_suffix(&self.fqn).1
    }

    /// Unqualified name: `User` for `\App\User`.
    pub fn name(&self) -> &str {
        let base = split_array_suffix(&self.fqn).0;
        base.rsplit(NAMESPACE_SEPARATOR).next().unwrap_or(base)
    }

    /// Namespace part of the fqn, `\` for global names.
    pub fn namespace(&self) -> &str {
        let base = split_array_suffix(&self.fqn).0;
        match base.rfind(NAMESPACE_SEPARATOR) {
            Some(0) | None => "\\",
            Some(index) => &base[..index],
        }
    }

    pub fn is_native(&self) -> bool {
        is_native_name(split_array_suffix(&self.fqn).0)
    }

    pub fn is_array(&self) -> bool {
        self.fqn.ends_with(ARRAY_SUFFIX) || self.fqn == "array"
    }

    /// A class, interface or trait name that members can be looked up on.
    pub fn is_class_like(&self) -> bool {
        !self.fqn.is_empty() && !self.is_native() && !self.fqn.ends_with(ARRAY_SUFFIX)
    }

    /// `static` and `$this`, which stand for the receiver of a member access.
    pub fn is_late_bound(&self) -> bool {
        self.fqn == "static" || self.fqn == "$this"
    }

    /// Element type of an array type. Plain `array` has no known element.
    pub fn de_array(&self) -> Option<TypeRef> {
        let fqn = self.fqn.strip_suffix(ARRAY_SUFFIX)?;
        let original = self
            .original
            .strip_suffix(ARRAY_SUFFIX)
            .unwrap_or(&self.original);
        Some(TypeRef::with_fqn(original, fqn))
    }

    pub fn to_array(&self) -> TypeRef {
        TypeRef::with_fqn(
            format!("{}{ARRAY_SUFFIX}", self.original),
            format!("{}{ARRAY_SUFFIX}", self.fqn),
        )
    }

    /// Same-type comparison; class names are case-insensitive in PHP.
    pub fn same_as(&self, other: &TypeRef) -> bool {
        self.fqn.eq_ignore_ascii_case(&other.fqn)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqn)
    }
}

/// Ordered union of types with no two entries sharing an fqn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeSet {
    types: SmallVec<[TypeRef; 2]>,
}

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(type_ref: TypeRef) -> Self {
        let mut set = Self::new();
        set.add(type_ref);
        set
    }

    /// Parses a type expression such as `?Foo`, `A|B[]` or `array<int, Foo>`.
    pub fn parse(expression: &str) -> Self {
        let mut set = Self::new();
        for part in split_top_level(expression, &['|', '&']) {
            parse_single(part.trim(), &mut set);
        }
        set
    }

    /// Adds `type_ref` unless an entry with the same fqn is present.
    pub fn add(&mut self, type_ref: TypeRef) -> bool {
        if type_ref.fqn.is_empty() || self.types.iter().any(|t| t.same_as(&type_ref)) {
            return false;
        }
        self.types.push(type_ref);
        true
    }

    pub fn merge(&mut self, other: &TypeSet) {
        for type_ref in &other.types {
            self.add(type_ref.clone());
        }
    }

    pub fn union(mut self, other: &TypeSet) -> Self {
        self.merge(other);
        self
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.types.iter().any(|t| t.fqn.eq_ignore_ascii_case(fqn))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeRef> {
        self.types.iter()
    }

    pub fn class_types(&self) -> impl Iterator<Item = &TypeRef> {
        self.types.iter().filter(|t| t.is_class_like())
    }

    /// Element types of every array member of the set.
    pub fn de_array(&self) -> TypeSet {
        self.types.iter().filter_map(TypeRef::de_array).collect()
    }

    /// Qualifies every class name through `table`.
    pub fn resolve(&mut self, table: &ImportTable) {
        for type_ref in self.types.iter_mut() {
            table.class_reference_fqn(type_ref);
        }
        self.dedup();
    }

    /// Replaces `static` and `$this` with `receiver`, keeping array dimensions.
    pub fn bind_late_static(&self, receiver: &TypeRef) -> TypeSet {
        self.types
            .iter()
            .map(|type_ref| {
                let (base, dimensions) = split_array_suffix(&type_ref.fqn);
                if base == "static" || base == "$this" {
                    let mut bound = receiver.clone();
                    for _ in 0..dimensions {
                        bound = bound.to_array();
                    }
                    bound
                } else {
                    type_ref.clone()
                }
            })
            .collect()
    }

    fn dedup(&mut self) {
        let types = std::mem::take(&mut self.types);
        for type_ref in types {
            self.add(type_ref);
        }
    }
}

impl FromIterator<TypeRef> for TypeSet {
    fn from_iter<I: IntoIterator<Item = TypeRef>>(iter: I) -> Self {
        let mut set = TypeSet::new();
        for type_ref in iter {
            set.add(type_ref);
        }
        set
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, type_ref) in self.types.iter().enumerate() {
            if index > 0 {
                f.write_str("|")?;
            }
            write!(f, "{type_ref}")?;
        }
        Ok(())
    }
}

/// Splits on any of `separators` outside of `<>`, `()` and `{}`.
fn split_top_level<'a>(expression: &'a str, separators: &[char]) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (index, ch) in expression.char_indices() {
        match ch {
            '<' | '(' | '{' => depth += 1,
            '>' | ')' | '}' => depth -= 1,
            c if depth == 0 && separators.contains(&c) => {
                parts.push(&expression[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

fn parse_single(part: &str, set: &mut TypeSet) {
    if part.is_empty() {
        return;
    }
    if let Some(inner) = part.strip_prefix('?') {
        parse_single(inner, set);
        set.add(TypeRef::new("null"));
        return;
    }
    if let Some(inner) = part.strip_prefix('(').and_then(|p| p.strip_suffix(')')) {
        set.merge(&TypeSet::parse(inner));
        return;
    }
    if let Some(open) = part.find('<') {
        let base = part[..open].trim();
        let arguments = part[open + 1..].strip_suffix('>').unwrap_or(&part[open + 1..]);
        let lower = base.to_lowercase();
        if matches!(
            lower.as_str(),
            "array" | "list" | "iterable" | "non-empty-array" | "non-empty-list"
        ) {
            // The value type is the last generic argument.
            let value = split_top_level(arguments, &[',']).pop().unwrap_or_default();
            let elements = TypeSet::parse(value);
            if elements.is_empty() {
                set.add(TypeRef::new("array"));
            }
            for element in elements.iter() {
                set.add(element.to_array());
            }
        } else {
            set.add(TypeRef::new(base));
        }
        return;
    }
    if part.contains('{') || part.starts_with('\'') || part.starts_with('"') {
        // Array shapes and literal types.
        let base = part.split('{').next().unwrap_or(part).trim();
        if base.eq_ignore_ascii_case("array") {
            set.add(TypeRef::new("array"));
        } else if part.starts_with('\'') || part.starts_with('"') {
            set.add(TypeRef::new("string"));
        }
        return;
    }
    let lower = part.to_lowercase();
    let normalized = match lower.as_str() {
        "non-empty-string" | "class-string" | "numeric-string" => "string",
        "positive-int" | "negative-int" | "non-negative-int" => "int",
        _ => part,
    };
    set.add(TypeRef::new(normalized));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fqns(set: &TypeSet) -> Vec<&str> {
        set.iter().map(TypeRef::fqn).collect()
    }

    #[test]
    fn test_native_aliases_are_canonical() {
        assert_eq!(TypeRef::new("Boolean").fqn(), "bool");
        assert_eq!(TypeRef::new("integer").fqn(), "int");
        assert_eq!(TypeRef::new("double").fqn(), "float");
        assert_eq!(TypeRef::new("callback").fqn(), "callable");
        assert_eq!(TypeRef::new("Foo").fqn(), "\\Foo");
        assert_eq!(TypeRef::new("\\App\\Foo[]").fqn(), "\\App\\Foo[]");
    }

    #[test]
    fn test_name_and_namespace() {
        let type_ref = TypeRef::new("\\App\\Models\\User");
        assert_eq!(type_ref.name(), "User");
        assert_eq!(type_ref.namespace(), "\\App\\Models");
        assert_eq!(TypeRef::new("Foo").namespace(), "\\");
    }

    #[test]
    fn test_de_array() {
        let type_ref = TypeRef::new("Foo[][]");
        let element = type_ref.de_array().unwrap();
        assert_eq!(element.fqn(), "\\Foo[]");
        assert_eq!(element.de_array().unwrap().fqn(), "\\Foo");
        assert!(TypeRef::new("array").de_array().is_none());
        assert!(TypeRef::new("Foo").de_array().is_none());
    }

    #[test]
    fn test_merge_deduplicates_by_fqn_and_keeps_order() {
        let mut left = TypeSet::parse("A|B");
        let right = TypeSet::parse("b|C");
        left.merge(&right);

        assert_eq!(fqns(&left), vec!["\\A", "\\B", "\\C"]);
    }

    #[test]
    fn test_merge_is_a_set_union() {
        let a = TypeSet::parse("A|B");
        let b = TypeSet::parse("B|C");
        let c = TypeSet::parse("D");

        let left = a.clone().union(&b).union(&c);
        let right = a.clone().union(&b.clone().union(&c));
        assert_eq!(left, right);

        let ab = a.clone().union(&b);
        let ba = b.clone().union(&a);
        let mut ab_sorted = fqns(&ab);
        let mut ba_sorted = fqns(&ba);
        ab_sorted.sort();
        ba_sorted.sort();
        assert_eq!(ab_sorted, ba_sorted);
    }

    #[test]
    fn test_parse_nullable_and_generics() {
        assert_eq!(fqns(&TypeSet::parse("?Foo")), vec!["\\Foo", "null"]);
        assert_eq!(fqns(&TypeSet::parse("array<int, Foo>")), vec!["\\Foo[]"]);
        assert_eq!(fqns(&TypeSet::parse("list<Foo|Bar>")), vec!["\\Foo[]", "\\Bar[]"]);
        assert_eq!(fqns(&TypeSet::parse("Collection<User>")), vec!["\\Collection"]);
        assert_eq!(fqns(&TypeSet::parse("array{id: int}")), vec!["array"]);
    }

    #[test]
    fn test_bind_late_static() {
        let receiver = TypeRef::new("\\App\\Model");
        let bound = TypeSet::parse("static|$this[]|int").bind_late_static(&receiver);
        assert_eq!(fqns(&bound), vec!["\\App\\Model", "\\App\\Model[]", "int"]);
    }
}

//! Key layout of the symbol store.
//!
//! Every key is a sequence of components separated by a NUL byte, led by a
//! one-byte key space tag:
//!
//! | space | layout                                         | value            |
//! |-------|------------------------------------------------|------------------|
//! | `e`   | `e \0 collection \0 fqn \0 disambiguator`      | serialized entity|
//! | `c`   | `c \0 collection \0 token \0 disambiguator`    | fqn              |
//! | `r`   | `r \0 fqn \0 uri \0 range`                     | serialized site  |
//! | `R`   | `R \0 uri \0 fqn \0 range`                     | empty            |
//! | `d`   | `d \0 uri \0 <any key above except R>`         | empty            |
//!
//! Collections whose names are case-insensitive in PHP (classes, functions,
//! methods) are keyed by their lowercased fqn.

use strum::{AsRefStr, Display};

use crate::errors::{Result, StoreError};

pub(crate) const SEPARATOR: u8 = 0;

const ENTITY_SPACE: u8 = b'e';
const COMPLETION_SPACE: u8 = b'c';
const REFERENCE_SPACE: u8 = b'r';
const REVERSE_REFERENCE_SPACE: u8 = b'R';
const DOCUMENT_SPACE: u8 = b'd';

/// Separator between a member's owning scope and its name in member fqns.
pub const MEMBER_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "camelCase")]
pub enum Collection {
    Class,
    Interface,
    Trait,
    Function,
    Method,
    Property,
    ClassConst,
    Const,
    GlobalVariable,
}

impl Collection {
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Collection::Class
                | Collection::Interface
                | Collection::Trait
                | Collection::Function
                | Collection::Method
        )
    }

    /// Key spelling of `fqn` inside this collection.
    pub fn normalize(self, fqn: &str) -> String {
        if self.is_case_insensitive() {
            fqn.to_lowercase()
        } else {
            fqn.to_string()
        }
    }
}

pub(crate) fn check_component(component: &str) -> Result<()> {
    if component.as_bytes().contains(&SEPARATOR) {
        return Err(StoreError::InvalidKey(component.to_string()));
    }
    Ok(())
}

fn compose(space: u8, components: &[&str], trailing_separator: bool) -> Vec<u8> {
    let capacity = 2 + components.iter().map(|c| c.len() + 1).sum::<usize>();
    let mut key = Vec::with_capacity(capacity);
    key.push(space);
    for component in components {
        key.push(SEPARATOR);
        key.extend_from_slice(component.as_bytes());
    }
    if trailing_separator {
        key.push(SEPARATOR);
    }
    key
}

pub(crate) fn entity_key(collection: Collection, fqn: &str, disambiguator: &str) -> Vec<u8> {
    compose(
        ENTITY_SPACE,
        &[collection.as_ref(), &collection.normalize(fqn), disambiguator],
        false,
    )
}

/// Prefix matching every disambiguated entry of exactly `fqn`.
pub(crate) fn entity_exact_prefix(collection: Collection, fqn: &str) -> Vec<u8> {
    compose(
        ENTITY_SPACE,
        &[collection.as_ref(), &collection.normalize(fqn)],
        true,
    )
}

/// Prefix matching every entry whose fqn starts with `fqn_prefix`.
pub(crate) fn entity_open_prefix(collection: Collection, fqn_prefix: &str) -> Vec<u8> {
    compose(
        ENTITY_SPACE,
        &[collection.as_ref(), &collection.normalize(fqn_prefix)],
        false,
    )
}

pub(crate) fn completion_key(collection: Collection, token: &str, disambiguator: &str) -> Vec<u8> {
    compose(
        COMPLETION_SPACE,
        &[collection.as_ref(), token, disambiguator],
        false,
    )
}

pub(crate) fn completion_prefix(collection: Collection, token_prefix: &str) -> Vec<u8> {
    compose(COMPLETION_SPACE, &[collection.as_ref(), token_prefix], false)
}

pub(crate) fn reference_key(fqn: &str, uri: &str, range: &str) -> Vec<u8> {
    compose(REFERENCE_SPACE, &[&fqn.to_lowercase(), uri, range], false)
}

pub(crate) fn reference_prefix(fqn: &str) -> Vec<u8> {
    compose(REFERENCE_SPACE, &[&fqn.to_lowercase()], true)
}

pub(crate) fn reverse_reference_key(uri: &str, fqn: &str, range: &str) -> Vec<u8> {
    compose(
        REVERSE_REFERENCE_SPACE,
        &[uri, &fqn.to_lowercase(), range],
        false,
    )
}

pub(crate) fn reverse_reference_prefix(uri: &str) -> Vec<u8> {
    compose(REVERSE_REFERENCE_SPACE, &[uri], true)
}

pub(crate) fn document_key(uri: &str, key: &[u8]) -> Vec<u8> {
    let mut document_key = document_prefix(uri);
    document_key.extend_from_slice(key);
    document_key
}

pub(crate) fn document_prefix(uri: &str) -> Vec<u8> {
    compose(DOCUMENT_SPACE, &[uri], true)
}

/// Turns a reverse reference key back into the forward key it mirrors.
pub(crate) fn forward_from_reverse(reverse_key: &[u8]) -> Result<Vec<u8>> {
    let parts: Vec<&[u8]> = reverse_key.split(|b| *b == SEPARATOR).collect();
    if parts.len() != 4 || parts[0] != [REVERSE_REFERENCE_SPACE] {
        return Err(StoreError::InvalidKey(printable(reverse_key)));
    }
    let mut key = vec![REFERENCE_SPACE];
    for part in [parts[2], parts[1], parts[3]] {
        key.push(SEPARATOR);
        key.extend_from_slice(part);
    }
    Ok(key)
}

/// Human readable form of a key for logs and errors.
pub(crate) fn printable(key: &[u8]) -> String {
    String::from_utf8_lossy(key).replace('\0', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_prefix_does_not_match_longer_names() {
        let prefix = entity_exact_prefix(Collection::Class, "\\Foo");
        let own = entity_key(Collection::Class, "\\Foo", "file:///a.php#0");
        let other = entity_key(Collection::Class, "\\FooBar", "file:///a.php#0");

        assert!(own.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
    }

    #[test]
    fn test_case_insensitive_collections_are_lowercased() {
        assert_eq!(Collection::Class.normalize("\\App\\User"), "\\app\\user");
        assert_eq!(Collection::Property.normalize("\\App\\User::$Name"), "\\App\\User::$Name");
        assert_eq!(Collection::ClassConst.as_ref(), "classConst");
    }

    #[test]
    fn test_forward_from_reverse() {
        let reverse = reverse_reference_key("file:///a.php", "\\Foo", "3:6");
        let forward = forward_from_reverse(&reverse).unwrap();

        assert_eq!(forward, reference_key("\\Foo", "file:///a.php", "3:6"));
    }

    #[test]
    fn test_check_component_rejects_separator() {
        assert!(check_component("ok").is_ok());
        assert!(matches!(
            check_component("bad\0name"),
            Err(StoreError::InvalidKey(_))
        ));
    }
}

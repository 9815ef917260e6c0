//! Declarations extracted from PHP documents and persisted in the symbol store.

use database::{Collection, MEMBER_SEPARATOR};
use serde::{Deserialize, Serialize};

use super::types::{TypeRef, TypeSet};
use crate::analysis::types::Location;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_lowercase().as_str() {
            "private" => Visibility::Private,
            "protected" => Visibility::Protected,
            _ => Visibility::Public,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassModifier {
    #[default]
    None,
    Abstract,
    Final,
}

/// Read/write restriction declared with `@property-read` / `@property-write`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyAccess {
    #[default]
    ReadWrite,
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstKind {
    #[default]
    Const,
    Define,
}

/// `scope::name` key of a member. The scope is lowercased since class names
/// are case-insensitive.
pub fn member_fqn(scope: &str, name: &str) -> String {
    format!("{}{MEMBER_SEPARATOR}{name}", scope.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub location: Location,
    pub name: TypeRef,
    #[serde(default)]
    pub modifier: ClassModifier,
    pub extends: Option<TypeRef>,
    #[serde(default)]
    pub implements: Vec<TypeRef>,
    /// Traits pulled in with `use`
    #[serde(default)]
    pub uses: Vec<TypeRef>,
    #[serde(default)]
    pub is_enum: bool,
    #[serde(default)]
    pub description: String,
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub location: Location,
    pub name: TypeRef,
    #[serde(default)]
    pub extends: Vec<TypeRef>,
    #[serde(default)]
    pub description: String,
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    pub location: Location,
    pub name: TypeRef,
    #[serde(default)]
    pub description: String,
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub types: TypeSet,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub is_variadic: bool,
    #[serde(default)]
    pub by_reference: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub location: Location,
    pub name: TypeRef,
    pub params: Vec<Parameter>,
    pub return_types: TypeSet,
    #[serde(default)]
    pub description: String,
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub location: Location,
    pub name: String,
    pub scope: TypeRef,
    pub params: Vec<Parameter>,
    pub return_types: TypeSet,
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub modifier: ClassModifier,
    /// Declared through `@method` rather than in code
    #[serde(default)]
    pub is_magic: bool,
    #[serde(default)]
    pub description: String,
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub location: Location,
    /// Name including the leading `$`
    pub name: String,
    pub scope: TypeRef,
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    pub types: TypeSet,
    #[serde(default)]
    pub access: PropertyAccess,
    #[serde(default)]
    pub is_magic: bool,
    #[serde(default)]
    pub description: String,
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassConst {
    pub location: Location,
    pub name: String,
    pub scope: TypeRef,
    pub visibility: Visibility,
    pub types: TypeSet,
    pub value: String,
    #[serde(default)]
    pub description: String,
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Const {
    pub location: Location,
    pub name: TypeRef,
    pub kind: ConstKind,
    pub types: TypeSet,
    pub value: String,
    #[serde(default)]
    pub description: String,
    pub deprecated: Option<String>,
}

/// A variable assigned at file scope, visible to `global` declarations
/// anywhere in the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub location: Location,
    pub name: String,
    pub types: TypeSet,
    #[serde(default)]
    pub description: String,
}

/// Common view of anything written to the store.
pub trait Symbol {
    fn collection(&self) -> Collection;

    fn fqn(&self) -> String;

    fn location(&self) -> &Location;

    /// Names completion prefix search should find this symbol by.
    fn completion_tokens(&self) -> Vec<String>;

    fn deprecated(&self) -> Option<&str> {
        None
    }
}

macro_rules! named_symbol {
    ($entity:ty, $collection:expr) => {
        impl Symbol for $entity {
            fn collection(&self) -> Collection {
                $collection
            }

            fn fqn(&self) -> String {
                self.name.fqn().to_string()
            }

            fn location(&self) -> &Location {
                &self.location
            }

            fn completion_tokens(&self) -> Vec<String> {
                vec![self.name.name().to_string(), self.name.fqn().to_string()]
            }

            fn deprecated(&self) -> Option<&str> {
                self.deprecated.as_deref()
            }
        }
    };
}

named_symbol!(Class, Collection::Class);
named_symbol!(Interface, Collection::Interface);
named_symbol!(Trait, Collection::Trait);
named_symbol!(Function, Collection::Function);
named_symbol!(Const, Collection::Const);

macro_rules! member_symbol {
    ($entity:ty, $collection:expr) => {
        impl Symbol for $entity {
            fn collection(&self) -> Collection {
                $collection
            }

            fn fqn(&self) -> String {
                member_fqn(self.scope.fqn(), &self.name)
            }

            fn location(&self) -> &Location {
                &self.location
            }

            fn completion_tokens(&self) -> Vec<String> {
                vec![self.name.trim_start_matches('$').to_string()]
            }

            fn deprecated(&self) -> Option<&str> {
                self.deprecated.as_deref()
            }
        }
    };
}

member_symbol!(Method, Collection::Method);
member_symbol!(Property, Collection::Property);
member_symbol!(ClassConst, Collection::ClassConst);

impl Symbol for GlobalVariable {
    fn collection(&self) -> Collection {
        Collection::GlobalVariable
    }

    fn fqn(&self) -> String {
        self.name.clone()
    }

    fn location(&self) -> &Location {
        &self.location
    }

    fn completion_tokens(&self) -> Vec<String> {
        vec![self.name.trim_start_matches('$').to_string()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    Property,
    ClassConst,
}

impl MemberKind {
    pub fn collection(self) -> Collection {
        match self {
            MemberKind::Method => Collection::Method,
            MemberKind::Property => Collection::Property,
            MemberKind::ClassConst => Collection::ClassConst,
        }
    }
}

/// A class member of any kind, as returned by member searches.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Method(Method),
    Property(Property),
    ClassConst(ClassConst),
}

impl Member {
    pub fn kind(&self) -> MemberKind {
        match self {
            Member::Method(_) => MemberKind::Method,
            Member::Property(_) => MemberKind::Property,
            Member::ClassConst(_) => MemberKind::ClassConst,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Member::Method(m) => &m.name,
            Member::Property(p) => &p.name,
            Member::ClassConst(c) => &c.name,
        }
    }

    /// Name compared when deduplicating overrides; methods are case-insensitive.
    pub fn name_key(&self) -> String {
        match self {
            Member::Method(m) => m.name.to_lowercase(),
            other => other.name().to_string(),
        }
    }

    pub fn scope(&self) -> &TypeRef {
        match self {
            Member::Method(m) => &m.scope,
            Member::Property(p) => &p.scope,
            Member::ClassConst(c) => &c.scope,
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Member::Method(m) => m.visibility,
            Member::Property(p) => p.visibility,
            Member::ClassConst(c) => c.visibility,
        }
    }

    /// Class constants always belong to the class itself.
    pub fn is_static(&self) -> bool {
        match self {
            Member::Method(m) => m.is_static,
            Member::Property(p) => p.is_static,
            Member::ClassConst(_) => true,
        }
    }

    /// Type produced by accessing the member: a method's return type, a
    /// property's or a constant's value type.
    pub fn types(&self) -> &TypeSet {
        match self {
            Member::Method(m) => &m.return_types,
            Member::Property(p) => &p.types,
            Member::ClassConst(c) => &c.types,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Member::Method(m) => &m.location,
            Member::Property(p) => &p.location,
            Member::ClassConst(c) => &c.location,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Member::Method(m) => &m.description,
            Member::Property(p) => &p.description,
            Member::ClassConst(c) => &c.description,
        }
    }

    pub fn deprecated(&self) -> Option<&str> {
        match self {
            Member::Method(m) => m.deprecated.as_deref(),
            Member::Property(p) => p.deprecated.as_deref(),
            Member::ClassConst(c) => c.deprecated.as_deref(),
        }
    }

    pub fn fqn(&self) -> String {
        member_fqn(self.scope().fqn(), self.name())
    }
}

impl From<Method> for Member {
    fn from(method: Method) -> Self {
        Member::Method(method)
    }
}

impl From<Property> for Member {
    fn from(property: Property) -> Self {
        Member::Property(property)
    }
}

impl From<ClassConst> for Member {
    fn from(constant: ClassConst) -> Self {
        Member::ClassConst(constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::tree::TextRange;
    use database::{StoreEntry, SymbolStore};

    fn location() -> Location {
        Location::new(
            "file:///src/User.php",
            TextRange {
                start_byte: 12,
                end_byte: 40,
                ..Default::default()
            },
        )
    }

    fn store_and_load<T>(entity: &T) -> Vec<T>
    where
        T: Symbol + Serialize + serde::de::DeserializeOwned,
    {
        let store = SymbolStore::in_memory();
        let entry = StoreEntry::new(
            entity.collection(),
            entity.fqn(),
            entity.location().disambiguator(),
            entity,
        )
        .unwrap();
        store
            .sync_document(&entity.location().uri, vec![entry], vec![])
            .unwrap();
        store.get_exact(entity.collection(), &entity.fqn()).unwrap()
    }

    #[test]
    fn test_entities_survive_the_store() {
        let scope = TypeRef::with_fqn("User", "\\App\\User");
        let class = Class {
            location: location(),
            name: scope.clone(),
            modifier: ClassModifier::Final,
            extends: Some(TypeRef::new("\\App\\Model")),
            implements: vec![TypeRef::new("\\JsonSerializable")],
            uses: vec![TypeRef::new("\\App\\HasName")],
            is_enum: false,
            description: "A user".to_string(),
            deprecated: Some("use Account".to_string()),
        };
        let method = Method {
            location: location(),
            name: "rename".to_string(),
            scope: scope.clone(),
            params: vec![Parameter {
                name: "$name".to_string(),
                types: TypeSet::parse("string|null"),
                has_default: true,
                ..Default::default()
            }],
            return_types: TypeSet::parse("static"),
            visibility: Visibility::Protected,
            is_static: false,
            modifier: ClassModifier::Abstract,
            is_magic: false,
            description: String::new(),
            deprecated: None,
        };
        let property = Property {
            location: location(),
            name: "$email".to_string(),
            scope: scope.clone(),
            visibility: Visibility::Private,
            is_static: true,
            types: TypeSet::parse("?string"),
            access: PropertyAccess::Read,
            is_magic: true,
            description: String::new(),
            deprecated: None,
        };
        let constant = Const {
            location: location(),
            name: TypeRef::new("\\App\\VERSION"),
            kind: ConstKind::Define,
            types: TypeSet::parse("string"),
            value: "'1.0'".to_string(),
            description: String::new(),
            deprecated: None,
        };
        let interface = Interface {
            location: location(),
            name: TypeRef::with_fqn("Named", "\\App\\Named"),
            extends: vec![TypeRef::new("\\Stringable")],
            description: "Has a name".to_string(),
            deprecated: None,
        };
        let trait_ = Trait {
            location: location(),
            name: TypeRef::with_fqn("HasName", "\\App\\HasName"),
            description: String::new(),
            deprecated: Some(String::new()),
        };
        let function = Function {
            location: location(),
            name: TypeRef::with_fqn("user", "\\App\\user"),
            params: vec![Parameter {
                name: "$ids".to_string(),
                types: TypeSet::parse("int[]"),
                is_variadic: true,
                by_reference: true,
                description: "Lookup keys".to_string(),
                ..Default::default()
            }],
            return_types: TypeSet::parse("?\\App\\User"),
            description: String::new(),
            deprecated: None,
        };
        let class_const = ClassConst {
            location: location(),
            name: "ROLE".to_string(),
            scope: scope.clone(),
            visibility: Visibility::Protected,
            types: TypeSet::parse("string"),
            value: "'admin'".to_string(),
            description: String::new(),
            deprecated: Some("use roles()".to_string()),
        };
        let global = GlobalVariable {
            location: location(),
            name: "$config".to_string(),
            types: TypeSet::parse("array"),
            description: String::new(),
        };

        assert_eq!(store_and_load(&class), vec![class.clone()]);
        assert_eq!(store_and_load(&method), vec![method.clone()]);
        assert_eq!(store_and_load(&property), vec![property.clone()]);
        assert_eq!(store_and_load(&constant), vec![constant.clone()]);
        assert_eq!(store_and_load(&global), vec![global.clone()]);
        assert_eq!(store_and_load(&interface), vec![interface.clone()]);
        assert_eq!(store_and_load(&trait_), vec![trait_.clone()]);
        assert_eq!(store_and_load(&function), vec![function.clone()]);
        assert_eq!(store_and_load(&class_const), vec![class_const.clone()]);
    }

    #[test]
    fn test_member_fqn_lowercases_scope_only() {
        assert_eq!(member_fqn("\\App\\User", "$Email"), "\\app\\user::$Email");
    }
}

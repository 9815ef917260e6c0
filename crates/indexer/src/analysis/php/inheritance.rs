//! Member lookup across class hierarchies.
//!
//! A search walks the hierarchy of a class-like breadth first, child before
//! parent, reading declarations from the [`SymbolStore`]:
//!
//! - a class contributes its own members, then the members of every trait it
//!   uses; its parent is queued and its interfaces are searched separately
//! - an interface contributes its own members and queues its parents
//! - a trait contributes its own members only
//!
//! Interface members are appended after every class and trait member so an
//! implementation always wins over the declaration it implements. Cyclic
//! hierarchies terminate through the searched set, pathological ones through
//! an iteration cap.
//!
//! Search results are then reduced to what is visible from the access site,
//! keeping the first (most derived) member of each name:
//!
//! | access                 | visible when                                      |
//! |------------------------|---------------------------------------------------|
//! | `parent::m`            | declared in an ancestor and not private           |
//! | `self::m`, `static::m` | declared in the current class, or not private     |
//! | `Foo::m`               | static and public                                 |
//! | `$this->m`             | declared in the current class, or not private     |
//! | `$obj->m`              | public                                            |
//!
//! On the instance path a protected member declared outside the current
//! class is only visible when the current class and the declaring class are
//! related by inheritance.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use database::{Collection, SymbolStore};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use super::symbols::{
    Class, ClassConst, Interface, Member, MemberKind, Method, Property, Trait, Visibility,
    member_fqn,
};
use super::types::TypeRef;
use crate::errors::Result;

/// Upper bound on class-likes visited by a single search.
const MAX_SEARCH_STEPS: usize = 256;

/// Score of a member reached the expected way.
pub const BASE_SCORE: i32 = 100;
/// Score of a static member reached through an instance.
pub const STATIC_THROUGH_INSTANCE_SCORE: i32 = 50;

/// Inheritance edges met during a search, keyed by lowercased fqn.
#[derive(Debug, Clone, Default)]
pub struct RelationMap {
    ancestors: FxHashMap<String, FxHashSet<String>>,
}

impl RelationMap {
    pub fn add(&mut self, child: &str, ancestor: &str) {
        self.ancestors
            .entry(child.to_lowercase())
            .or_default()
            .insert(ancestor.to_lowercase());
    }

    fn is_ancestor(&self, child: &str, ancestor: &str) -> bool {
        let mut queue = VecDeque::from([child.to_string()]);
        let mut seen = FxHashSet::default();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(parents) = self.ancestors.get(&current) {
                if parents.contains(ancestor) {
                    return true;
                }
                queue.extend(parents.iter().cloned());
            }
        }
        false
    }

    /// Whether `a` and `b` are the same class or one inherits from the other.
    pub fn is_related(&self, a: &str, b: &str) -> bool {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        a == b || self.is_ancestor(&a, &b) || self.is_ancestor(&b, &a)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemberSearch {
    /// Matching members, most derived first.
    pub members: Vec<Member>,
    pub relations: RelationMap,
}

/// How a static access names its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticScope {
    Parent,
    SelfScope,
    Static,
    /// An explicit class name or an expression
    Named,
}

#[derive(Debug, Clone)]
pub struct ScoredMember {
    pub member: Member,
    pub score: i32,
}

/// Where an instance access happens.
#[derive(Debug, Clone, Copy)]
pub struct AccessContext<'c> {
    /// Class-like lexically enclosing the access.
    pub current_class: Option<&'c TypeRef>,
    /// Type of the receiver being accessed.
    pub receiver: &'c TypeRef,
    /// The receiver is `$this`.
    pub receiver_is_this: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Operation {
    Members(MemberKind),
}

type SearchKey = (Operation, String, String);

/// Memoizing member search for the lifetime of one query session.
pub struct InheritanceEngine<'s> {
    store: &'s SymbolStore,
    cache: RefCell<FxHashMap<SearchKey, Rc<MemberSearch>>>,
}

impl<'s> InheritanceEngine<'s> {
    pub fn new(store: &'s SymbolStore) -> Self {
        Self {
            store,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Members named `name` (every member when `name` is empty) visible
    /// anywhere in the hierarchy of `scope`, most derived first.
    pub fn search(&self, scope: &str, name: &str, kind: MemberKind) -> Result<Rc<MemberSearch>> {
        let key = (Operation::Members(kind), scope.to_lowercase(), name.to_lowercase());
        if let Some(found) = self.cache.borrow().get(&key) {
            return Ok(Rc::clone(found));
        }
        let search = Rc::new(self.collect(scope, name, kind)?);
        self.cache.borrow_mut().insert(key, Rc::clone(&search));
        Ok(search)
    }

    fn collect(&self, start: &str, name: &str, kind: MemberKind) -> Result<MemberSearch> {
        let mut members = Vec::new();
        let mut interface_members = Vec::new();
        let mut relations = RelationMap::default();
        let mut searched: FxHashSet<String> = FxHashSet::default();
        let mut searched_traits: FxHashSet<String> = FxHashSet::default();
        let mut searched_interfaces: FxHashSet<String> = FxHashSet::default();
        let mut queue = VecDeque::from([start.to_string()]);
        let mut steps = 0;

        while let Some(fqn) = queue.pop_front() {
            steps += 1;
            if steps > MAX_SEARCH_STEPS {
                warn!(scope = start, "Member search stopped at iteration cap");
                break;
            }
            if !searched.insert(fqn.to_lowercase()) {
                continue;
            }

            let classes: Vec<Class> = self.store.get_exact(Collection::Class, &fqn)?;
            if !classes.is_empty() {
                members.extend(self.own_members(&fqn, name, kind)?);
                for class in &classes {
                    for used in &class.uses {
                        relations.add(&fqn, used.fqn());
                        if searched_traits.insert(used.fqn().to_lowercase()) {
                            members.extend(self.own_members(used.fqn(), name, kind)?);
                        }
                    }
                    if let Some(parent) = &class.extends {
                        relations.add(&fqn, parent.fqn());
                        queue.push_back(parent.fqn().to_string());
                    }
                    for interface in &class.implements {
                        relations.add(&fqn, interface.fqn());
                        self.collect_interface(
                            interface.fqn(),
                            name,
                            kind,
                            &mut searched_interfaces,
                            &mut interface_members,
                            &mut relations,
                        )?;
                    }
                }
                continue;
            }

            let interfaces: Vec<Interface> = self.store.get_exact(Collection::Interface, &fqn)?;
            if !interfaces.is_empty() {
                members.extend(self.own_members(&fqn, name, kind)?);
                for interface in &interfaces {
                    for parent in &interface.extends {
                        relations.add(&fqn, parent.fqn());
                        queue.push_back(parent.fqn().to_string());
                    }
                }
                continue;
            }

            let traits: Vec<Trait> = self.store.get_exact(Collection::Trait, &fqn)?;
            if !traits.is_empty() {
                members.extend(self.own_members(&fqn, name, kind)?);
            }
        }

        members.extend(interface_members);
        Ok(MemberSearch { members, relations })
    }

    fn collect_interface(
        &self,
        start: &str,
        name: &str,
        kind: MemberKind,
        searched: &mut FxHashSet<String>,
        members: &mut Vec<Member>,
        relations: &mut RelationMap,
    ) -> Result<()> {
        let mut queue = VecDeque::from([start.to_string()]);
        let mut steps = 0;
        while let Some(fqn) = queue.pop_front() {
            steps += 1;
            if steps > MAX_SEARCH_STEPS {
                warn!(scope = start, "Interface search stopped at iteration cap");
                break;
            }
            if !searched.insert(fqn.to_lowercase()) {
                continue;
            }
            let interfaces: Vec<Interface> = self.store.get_exact(Collection::Interface, &fqn)?;
            if interfaces.is_empty() {
                continue;
            }
            members.extend(self.own_members(&fqn, name, kind)?);
            for interface in &interfaces {
                for parent in &interface.extends {
                    relations.add(&fqn, parent.fqn());
                    queue.push_back(parent.fqn().to_string());
                }
            }
        }
        Ok(())
    }

    /// Members declared directly on `scope`.
    fn own_members(&self, scope: &str, name: &str, kind: MemberKind) -> Result<Vec<Member>> {
        let collection = kind.collection();
        let key_name = match kind {
            MemberKind::Property if !name.is_empty() && !name.starts_with('$') => {
                format!("${name}")
            }
            _ => name.to_string(),
        };
        let fqn = member_fqn(scope, &key_name);
        let members = match kind {
            MemberKind::Method => self.load::<Method>(collection, &fqn, name.is_empty())?,
            MemberKind::Property => self.load::<Property>(collection, &fqn, name.is_empty())?,
            MemberKind::ClassConst => self.load::<ClassConst>(collection, &fqn, name.is_empty())?,
        };
        Ok(members)
    }

    fn load<T>(&self, collection: Collection, fqn: &str, all: bool) -> Result<Vec<Member>>
    where
        T: serde::de::DeserializeOwned + Into<Member>,
    {
        let found: Vec<T> = if all {
            self.store.get_by_prefix(collection, fqn)?
        } else {
            self.store.get_exact(collection, fqn)?
        };
        Ok(found.into_iter().map(Into::into).collect())
    }

    /// Members of `search` visible through an instance access.
    pub fn reduce_access(
        &self,
        search: &MemberSearch,
        context: &AccessContext<'_>,
    ) -> Vec<ScoredMember> {
        let current = context.current_class.map(|c| c.fqn().to_lowercase());
        let same_class = context.receiver_is_this
            || current
                .as_deref()
                .is_some_and(|c| c == context.receiver.fqn().to_lowercase());

        dedup_first(&search.members)
            .filter(|member| {
                let declared_in_current = declared_in(member, current.as_deref());
                let visibility = member.visibility();
                let base = if same_class {
                    declared_in_current || visibility != Visibility::Private
                } else {
                    visibility == Visibility::Public
                };
                base && (visibility != Visibility::Protected
                    || declared_in_current
                    || current
                        .as_deref()
                        .is_some_and(|c| search.relations.is_related(c, member.scope().fqn())))
            })
            .map(|member| ScoredMember {
                score: if member.is_static() && member.kind() != MemberKind::ClassConst {
                    STATIC_THROUGH_INSTANCE_SCORE
                } else {
                    BASE_SCORE
                },
                member: member.clone(),
            })
            .collect()
    }

    /// Members of `search` visible through a `::` access.
    pub fn reduce_static(
        &self,
        search: &MemberSearch,
        scope: StaticScope,
        current_class: Option<&TypeRef>,
    ) -> Vec<ScoredMember> {
        let current = current_class.map(|c| c.fqn().to_lowercase());
        dedup_first(&search.members)
            .filter(|member| {
                let declared_in_current = declared_in(member, current.as_deref());
                let visibility = member.visibility();
                match scope {
                    StaticScope::Parent => {
                        !declared_in_current && visibility != Visibility::Private
                    }
                    StaticScope::SelfScope | StaticScope::Static => {
                        declared_in_current || visibility != Visibility::Private
                    }
                    StaticScope::Named => member.is_static() && visibility == Visibility::Public,
                }
            })
            .map(|member| ScoredMember {
                member: member.clone(),
                score: BASE_SCORE,
            })
            .collect()
    }
}

fn declared_in(member: &Member, class: Option<&str>) -> bool {
    class.is_some_and(|c| member.scope().fqn().eq_ignore_ascii_case(c))
}

/// First member of each name, preserving order.
fn dedup_first(members: &[Member]) -> impl Iterator<Item = &Member> {
    let mut seen = FxHashSet::default();
    members.iter().filter(move |member| seen.insert(member.name_key()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::php::symbols::{ClassModifier, Symbol};
    use crate::analysis::php::types::TypeSet;
    use crate::analysis::types::Location;
    use crate::parsing::tree::TextRange;
    use database::StoreEntry;
    use database::testing::CountingEngine;
    use std::sync::Arc;

    fn location(start: u32) -> Location {
        Location::new(
            "file:///h.php",
            TextRange {
                start_byte: start,
                end_byte: start + 1,
                ..Default::default()
            },
        )
    }

    fn class(fqn: &str, extends: Option<&str>, at: u32) -> Class {
        Class {
            location: location(at),
            name: TypeRef::new(fqn),
            modifier: ClassModifier::None,
            extends: extends.map(TypeRef::new),
            implements: Vec::new(),
            uses: Vec::new(),
            is_enum: false,
            description: String::new(),
            deprecated: None,
        }
    }

    fn method(scope: &str, name: &str, visibility: Visibility, returns: &str, at: u32) -> Method {
        Method {
            location: location(at),
            name: name.to_string(),
            scope: TypeRef::new(scope),
            params: Vec::new(),
            return_types: TypeSet::parse(returns),
            visibility,
            is_static: false,
            modifier: ClassModifier::None,
            is_magic: false,
            description: String::new(),
            deprecated: None,
        }
    }

    fn interface(fqn: &str, extends: &[&str], at: u32) -> Interface {
        Interface {
            location: location(at),
            name: TypeRef::new(fqn),
            extends: extends.iter().map(|name| TypeRef::new(name)).collect(),
            description: String::new(),
            deprecated: None,
        }
    }

    fn entry<T: Symbol + serde::Serialize>(symbol: &T) -> StoreEntry {
        StoreEntry::new(
            symbol.collection(),
            symbol.fqn(),
            symbol.location().disambiguator(),
            symbol,
        )
        .unwrap()
    }

    fn hierarchy(store: &SymbolStore) {
        let entries = vec![
            entry(&class("\\Base", None, 1)),
            entry(&class("\\Child", Some("\\Base"), 2)),
            entry(&class("\\Other", None, 3)),
            entry(&method("\\Base", "m", Visibility::Public, "\\FromBase", 10)),
            entry(&method("\\Child", "m", Visibility::Public, "\\FromChild", 11)),
            entry(&method("\\Base", "secret", Visibility::Private, "", 12)),
            entry(&method("\\Base", "guarded", Visibility::Protected, "", 13)),
        ];
        store.sync_document("file:///h.php", entries, vec![]).unwrap();
    }

    fn names(members: &[ScoredMember]) -> Vec<String> {
        members.iter().map(|m| m.member.fqn()).collect()
    }

    #[test]
    fn test_most_derived_member_wins() {
        let store = SymbolStore::in_memory();
        hierarchy(&store);
        let engine = InheritanceEngine::new(&store);

        let child = TypeRef::new("\\Child");
        let search = engine.search("\\Child", "m", MemberKind::Method).unwrap();
        let visible = engine.reduce_access(
            &search,
            &AccessContext {
                current_class: None,
                receiver: &child,
                receiver_is_this: false,
            },
        );
        assert_eq!(names(&visible), vec!["\\child::m"]);

        let parent_search = engine.search("\\Base", "m", MemberKind::Method).unwrap();
        let through_parent =
            engine.reduce_static(&parent_search, StaticScope::Parent, Some(&child));
        assert_eq!(names(&through_parent), vec!["\\base::m"]);
    }

    #[test]
    fn test_private_visibility() {
        let store = SymbolStore::in_memory();
        hierarchy(&store);
        let engine = InheritanceEngine::new(&store);
        let child = TypeRef::new("\\Child");
        let base = TypeRef::new("\\Base");

        let all = engine.search("\\Child", "", MemberKind::Method).unwrap();
        let external = engine.reduce_access(
            &all,
            &AccessContext {
                current_class: None,
                receiver: &child,
                receiver_is_this: false,
            },
        );
        assert!(!names(&external).contains(&"\\base::secret".to_string()));
        assert!(!names(&external).contains(&"\\base::guarded".to_string()));

        let in_base = engine.search("\\Base", "secret", MemberKind::Method).unwrap();
        let via_self = engine.reduce_static(&in_base, StaticScope::SelfScope, Some(&base));
        assert_eq!(names(&via_self), vec!["\\base::secret"]);
    }

    #[test]
    fn test_protected_needs_related_class() {
        let store = SymbolStore::in_memory();
        hierarchy(&store);
        let engine = InheritanceEngine::new(&store);
        let child = TypeRef::new("\\Child");
        let other = TypeRef::new("\\Other");
        let search = engine.search("\\Child", "guarded", MemberKind::Method).unwrap();

        let from_this = engine.reduce_access(
            &search,
            &AccessContext {
                current_class: Some(&child),
                receiver: &child,
                receiver_is_this: true,
            },
        );
        assert_eq!(names(&from_this), vec!["\\base::guarded"]);

        let from_unrelated = engine.reduce_access(
            &search,
            &AccessContext {
                current_class: Some(&other),
                receiver: &child,
                receiver_is_this: false,
            },
        );
        assert!(from_unrelated.is_empty());
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let store = SymbolStore::in_memory();
        let entries = vec![
            entry(&class("\\A", Some("\\B"), 1)),
            entry(&class("\\B", Some("\\A"), 2)),
            entry(&method("\\B", "run", Visibility::Public, "int", 3)),
        ];
        store.sync_document("file:///h.php", entries, vec![]).unwrap();
        let engine = InheritanceEngine::new(&store);

        let search = engine.search("\\A", "run", MemberKind::Method).unwrap();
        assert_eq!(search.members.len(), 1);
    }

    #[test]
    fn test_class_members_rank_ahead_of_interface_members() {
        let store = SymbolStore::in_memory();
        let mut implementation = class("\\Impl", Some("\\Parent"), 1);
        implementation.implements = vec![TypeRef::new("\\Contract")];
        let entries = vec![
            entry(&implementation),
            entry(&class("\\Parent", None, 2)),
            entry(&interface("\\Contract", &[], 3)),
            entry(&method("\\Impl", "run", Visibility::Public, "\\FromImpl", 10)),
            entry(&method("\\Parent", "describe", Visibility::Public, "\\FromParent", 11)),
            entry(&method("\\Contract", "run", Visibility::Public, "\\FromContract", 12)),
            entry(&method("\\Contract", "describe", Visibility::Public, "\\FromContract", 13)),
            entry(&method("\\Contract", "only", Visibility::Public, "\\FromContract", 14)),
        ];
        store.sync_document("file:///h.php", entries, vec![]).unwrap();
        let engine = InheritanceEngine::new(&store);
        let receiver = TypeRef::new("\\Impl");

        let search = engine.search("\\Impl", "", MemberKind::Method).unwrap();
        let visible = engine.reduce_access(
            &search,
            &AccessContext {
                current_class: None,
                receiver: &receiver,
                receiver_is_this: false,
            },
        );
        assert_eq!(
            names(&visible),
            vec!["\\impl::run", "\\parent::describe", "\\contract::only"]
        );
        assert!(search.relations.is_related("\\Impl", "\\Contract"));
    }

    #[test]
    fn test_diamond_interfaces_are_searched_once() {
        let store = SymbolStore::in_memory();
        let mut leaf = class("\\Leaf", None, 1);
        leaf.implements = vec![TypeRef::new("\\Left"), TypeRef::new("\\Right")];
        let entries = vec![
            entry(&leaf),
            entry(&interface("\\Top", &[], 2)),
            entry(&interface("\\Left", &["\\Top"], 3)),
            entry(&interface("\\Right", &["\\Top"], 4)),
            entry(&interface("\\Bottom", &["\\Left", "\\Right"], 5)),
            entry(&method("\\Top", "top", Visibility::Public, "int", 10)),
        ];
        store.sync_document("file:///h.php", entries, vec![]).unwrap();
        let engine = InheritanceEngine::new(&store);

        let from_class = engine.search("\\Leaf", "top", MemberKind::Method).unwrap();
        assert_eq!(from_class.members.len(), 1);
        assert!(from_class.relations.is_related("\\Leaf", "\\Top"));

        let from_interface = engine.search("\\Bottom", "top", MemberKind::Method).unwrap();
        assert_eq!(from_interface.members.len(), 1);
        assert_eq!(from_interface.members[0].scope().fqn(), "\\Top");
    }

    #[test]
    fn test_search_is_memoized() {
        let engine_backend = Arc::new(CountingEngine::new());
        let store = SymbolStore::new(engine_backend.clone());
        hierarchy(&store);
        let engine = InheritanceEngine::new(&store);

        engine.search("\\Child", "m", MemberKind::Method).unwrap();
        let reads = engine_backend.reads();
        engine.search("\\child", "M", MemberKind::Method).unwrap();

        assert_eq!(engine_backend.reads(), reads);
    }

    #[test]
    fn test_relation_map() {
        let mut relations = RelationMap::default();
        relations.add("\\C", "\\B");
        relations.add("\\B", "\\A");

        assert!(relations.is_related("\\A", "\\c"));
        assert!(relations.is_related("\\C", "\\C"));
        assert!(!relations.is_related("\\C", "\\D"));
    }
}

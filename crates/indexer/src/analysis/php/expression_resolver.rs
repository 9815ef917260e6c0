//! Lazy, memoized type inference over the expression nodes of a document.
//!
//! Extraction leaves behind an arena of [`ResolverNode`]s: one per variable,
//! member access, class reference, call and literal the analysis cares
//! about. A node points at the expression it depends on through its `scope`
//! (the receiver of `$a->b`, the right-hand side of an assignment, the
//! collection of a `foreach`), so the arena forms a graph that is only walked
//! when a query asks for a type.
//!
//! ## Resolution
//!
//! The resolver keeps a [`ResolutionState`] per node. The first request
//! computes the type and stores it; later requests on the same resolver
//! return the stored [`TypeSet`] without touching the symbol store again.
//! Nodes live as long as their [`Document`], states only as long as the
//! resolver, so a new resolver sees the store as it is now. A node met again while it is being
//! computed (`$a = $a->next()`) resolves to the empty set, which cuts cycles.
//! A store failure leaves the node unresolved so a later request can retry.
//!
//! ## Node kinds
//!
//! - **Variable**: `$this` is the enclosing class. A variable on the left of an
//!   assignment takes the type of the assigned expression; any other variable
//!   takes the binding visible at its position in the variable table, plus
//!   the workspace globals when the binding came from `global`.
//! - **Member accesses**: the receiver is resolved, members are searched
//!   through the hierarchy of every class type of the receiver and filtered
//!   by visibility; `static` and `$this` in the member type stand for the
//!   receiver.
//! - **Class references** resolve to the referenced class, `self`/`static`
//!   to the enclosing class and `parent` to its parent.
//! - **Constants and function calls** take the first candidate name the
//!   store knows about.
//! - **Foreach collections** strip one array dimension from the collection.
//! - **Conditionals** are the union of their branches.
//!
//! Types attached during extraction (`instanceof` narrowing, `@var`
//! annotations) are merged into whatever the node resolves to.

use std::cell::RefCell;

use database::{Collection, SymbolStore};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use super::document::Document;
use super::inheritance::{AccessContext, InheritanceEngine, ScoredMember, StaticScope};
use super::symbols::{Const, Function, GlobalVariable, MemberKind};
use super::types::{TypeRef, TypeSet};
use super::variable_table::BindingKind;
use crate::analysis::types::Location;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResolutionState {
    #[default]
    Unresolved,
    /// Resolution is in progress further up the stack.
    Resolving,
    Resolved(TypeSet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRole {
    Class,
    Interface,
    Trait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeScope {
    SelfScope,
    Static,
    Parent,
}

impl RelativeScope {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_lowercase().as_str() {
            "self" => Some(RelativeScope::SelfScope),
            "static" => Some(RelativeScope::Static),
            "parent" => Some(RelativeScope::Parent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Variable { table: usize },
    PropertyAccess,
    MethodAccess,
    ScopedPropertyAccess,
    ScopedMethodAccess,
    ScopedConstantAccess,
    ClassAccess { class: TypeRef, role: ClassRole },
    /// The class named by `new`
    ClassTypeDesignator { class: Option<TypeRef> },
    RelativeScope(RelativeScope),
    ConstantAccess { candidates: Vec<String> },
    FunctionCall { candidates: Vec<String> },
    TypeDeclaration { types: TypeSet },
    Literal { types: TypeSet },
    /// `clone $x`, `@$x` and other wrappers that keep their operand's type
    Encapsulated,
    Parenthesised,
    ForeachCollection,
    Conditional { branches: SmallVec<[NodeId; 2]> },
}

impl ExprKind {
    pub fn label(&self) -> &'static str {
        match self {
            ExprKind::Variable { .. } => "variable",
            ExprKind::PropertyAccess | ExprKind::ScopedPropertyAccess => "property",
            ExprKind::MethodAccess | ExprKind::ScopedMethodAccess => "method",
            ExprKind::ScopedConstantAccess => "class constant",
            ExprKind::ClassAccess { role: ClassRole::Interface, .. } => "interface",
            ExprKind::ClassAccess { role: ClassRole::Trait, .. } => "trait",
            ExprKind::ClassAccess { .. } | ExprKind::ClassTypeDesignator { .. } => "class",
            ExprKind::RelativeScope(_) => "relative scope",
            ExprKind::ConstantAccess { .. } => "constant",
            ExprKind::FunctionCall { .. } => "function",
            ExprKind::TypeDeclaration { .. } => "type",
            ExprKind::Literal { .. } => "literal",
            ExprKind::Encapsulated | ExprKind::Parenthesised => "expression",
            ExprKind::ForeachCollection => "collection",
            ExprKind::Conditional { .. } => "conditional",
        }
    }

    /// Member kind looked up by an access node.
    pub fn member_kind(&self) -> Option<MemberKind> {
        match self {
            ExprKind::PropertyAccess | ExprKind::ScopedPropertyAccess => Some(MemberKind::Property),
            ExprKind::MethodAccess | ExprKind::ScopedMethodAccess => Some(MemberKind::Method),
            ExprKind::ScopedConstantAccess => Some(MemberKind::ClassConst),
            _ => None,
        }
    }

    pub fn is_static_access(&self) -> bool {
        matches!(
            self,
            ExprKind::ScopedPropertyAccess
                | ExprKind::ScopedMethodAccess
                | ExprKind::ScopedConstantAccess
        )
    }
}

/// Class-like lexically enclosing a node.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerScope {
    pub name: TypeRef,
    pub parent: Option<TypeRef>,
}

#[derive(Debug)]
pub struct ResolverNode {
    pub kind: ExprKind,
    pub name: String,
    /// Span used for lookups by position; the member name for accesses.
    pub location: Location,
    pub scope: Option<NodeId>,
    pub owner: Option<OwnerScope>,
    pub(crate) added_types: TypeSet,
}

impl ResolverNode {
    pub fn new(kind: ExprKind, name: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            name: name.into(),
            location,
            scope: None,
            owner: None,
            added_types: TypeSet::new(),
        }
    }

    pub fn with_scope(mut self, scope: Option<NodeId>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_owner(mut self, owner: Option<OwnerScope>) -> Self {
        self.owner = owner;
        self
    }

    pub fn is_this(&self) -> bool {
        matches!(self.kind, ExprKind::Variable { .. }) && self.name == "$this"
    }
}

pub trait HasName {
    fn name(&self) -> &str;
}

pub trait HasScope {
    fn scope(&self) -> Option<NodeId>;
}

/// Types a node has without consulting the store.
pub trait HasTypes {
    fn declared_types(&self) -> TypeSet;
}

impl HasName for ResolverNode {
    fn name(&self) -> &str {
        &self.name
    }
}

impl HasScope for ResolverNode {
    fn scope(&self) -> Option<NodeId> {
        self.scope
    }
}

impl HasTypes for ResolverNode {
    fn declared_types(&self) -> TypeSet {
        let mut types = match &self.kind {
            ExprKind::ClassAccess { class, .. } => TypeSet::single(class.clone()),
            ExprKind::ClassTypeDesignator { class: Some(class) } => TypeSet::single(class.clone()),
            ExprKind::TypeDeclaration { types } | ExprKind::Literal { types } => types.clone(),
            _ => TypeSet::new(),
        };
        types.merge(&self.added_types);
        types
    }
}

/// A member reached from an access node, with the receiver it was found on.
#[derive(Debug, Clone)]
pub struct MemberMatch {
    pub receiver: TypeRef,
    pub scored: ScoredMember,
}

pub struct ExpressionResolver<'a> {
    document: &'a Document,
    store: &'a SymbolStore,
    inheritance: InheritanceEngine<'a>,
    globals: RefCell<FxHashMap<String, TypeSet>>,
    states: RefCell<FxHashMap<NodeId, ResolutionState>>,
}

impl<'a> ExpressionResolver<'a> {
    pub fn new(document: &'a Document, store: &'a SymbolStore) -> Self {
        Self {
            document,
            store,
            inheritance: InheritanceEngine::new(store),
            globals: RefCell::new(FxHashMap::default()),
            states: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn store(&self) -> &'a SymbolStore {
        self.store
    }

    pub fn inheritance(&self) -> &InheritanceEngine<'a> {
        &self.inheritance
    }

    pub fn state(&self, id: NodeId) -> ResolutionState {
        self.states
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or(ResolutionState::Unresolved)
    }

    /// Type of node `id`, computed on first request.
    pub fn resolve(&self, id: NodeId) -> Result<TypeSet> {
        let node = self.document.node(id);
        match self.state(id) {
            ResolutionState::Resolved(types) => return Ok(types),
            ResolutionState::Resolving => {
                debug!(node = %node.name, "Cyclic expression, resolving to no type");
                return Ok(TypeSet::new());
            }
            ResolutionState::Unresolved => {}
        }

        self.states.borrow_mut().insert(id, ResolutionState::Resolving);
        match self.compute(node) {
            Ok(mut types) => {
                types.merge(&node.added_types);
                self.states
                    .borrow_mut()
                    .insert(id, ResolutionState::Resolved(types.clone()));
                Ok(types)
            }
            Err(error) => {
                self.states.borrow_mut().remove(&id);
                Err(error)
            }
        }
    }

    fn compute(&self, node: &ResolverNode) -> Result<TypeSet> {
        match &node.kind {
            ExprKind::Variable { table } => self.variable(node, *table),
            ExprKind::PropertyAccess
            | ExprKind::MethodAccess
            | ExprKind::ScopedPropertyAccess
            | ExprKind::ScopedMethodAccess => self.member_types(node),
            ExprKind::ScopedConstantAccess => {
                if node.name.eq_ignore_ascii_case("class") {
                    return Ok(TypeSet::single(TypeRef::new("string")));
                }
                self.member_types(node)
            }
            ExprKind::ClassAccess { class, .. } => Ok(TypeSet::single(class.clone())),
            ExprKind::ClassTypeDesignator { class: Some(class) } => {
                Ok(TypeSet::single(class.clone()))
            }
            ExprKind::ClassTypeDesignator { class: None } => match node.scope {
                Some(scope) => Ok(self.resolve(scope)?.class_types().cloned().collect()),
                None => Ok(TypeSet::new()),
            },
            ExprKind::RelativeScope(relative) => Ok(relative_types(*relative, node.owner.as_ref())),
            ExprKind::ConstantAccess { candidates } => {
                for candidate in candidates {
                    let found: Vec<Const> = self.store.get_exact(Collection::Const, candidate)?;
                    if !found.is_empty() {
                        return Ok(found.iter().fold(TypeSet::new(), |acc, c| acc.union(&c.types)));
                    }
                }
                Ok(TypeSet::new())
            }
            ExprKind::FunctionCall { candidates } => {
                for candidate in candidates {
                    let found: Vec<Function> =
                        self.store.get_exact(Collection::Function, candidate)?;
                    if !found.is_empty() {
                        return Ok(found
                            .iter()
                            .fold(TypeSet::new(), |acc, f| acc.union(&f.return_types)));
                    }
                }
                Ok(TypeSet::new())
            }
            ExprKind::TypeDeclaration { types } | ExprKind::Literal { types } => Ok(types.clone()),
            ExprKind::Encapsulated | ExprKind::Parenthesised => match node.scope {
                Some(scope) => self.resolve(scope),
                None => Ok(TypeSet::new()),
            },
            ExprKind::ForeachCollection => match node.scope {
                Some(scope) => Ok(self.resolve(scope)?.de_array()),
                None => Ok(TypeSet::new()),
            },
            ExprKind::Conditional { branches } => {
                let mut types = TypeSet::new();
                for branch in branches {
                    types.merge(&self.resolve(*branch)?);
                }
                Ok(types)
            }
        }
    }

    fn variable(&self, node: &ResolverNode, table: usize) -> Result<TypeSet> {
        if node.is_this() {
            return Ok(node
                .owner
                .as_ref()
                .map(|owner| TypeSet::single(owner.name.clone()))
                .unwrap_or_default());
        }
        if let Some(scope) = node.scope {
            return self.resolve(scope);
        }

        let mut types = TypeSet::new();
        let Some(binding) = self
            .document
            .lookup_variable(table, &node.name, node.location.start_byte())
        else {
            return Ok(types);
        };
        types.merge(&binding.types);
        if let Some(expression) = binding.expression {
            types.merge(&self.resolve(expression)?);
        }
        if binding.kind == BindingKind::Global {
            types.merge(&self.global_types(&node.name)?);
        }
        Ok(types)
    }

    fn global_types(&self, name: &str) -> Result<TypeSet> {
        if let Some(types) = self.globals.borrow().get(name) {
            return Ok(types.clone());
        }
        let found: Vec<GlobalVariable> = self.store.get_exact(Collection::GlobalVariable, name)?;
        let types = found.iter().fold(TypeSet::new(), |acc, g| acc.union(&g.types));
        self.globals.borrow_mut().insert(name.to_string(), types.clone());
        Ok(types)
    }

    fn member_types(&self, node: &ResolverNode) -> Result<TypeSet> {
        let Some(kind) = node.kind.member_kind() else {
            return Ok(TypeSet::new());
        };
        let mut types = TypeSet::new();
        for found in self.access_members(node, kind, &node.name)? {
            types.merge(&found.scored.member.types().bind_late_static(&found.receiver));
        }
        Ok(types)
    }

    /// Members named `name` (all members when empty) reachable from access
    /// node `node`, filtered by visibility at the access site.
    pub fn access_members(
        &self,
        node: &ResolverNode,
        kind: MemberKind,
        name: &str,
    ) -> Result<Vec<MemberMatch>> {
        let Some(scope) = node.scope else {
            return Ok(Vec::new());
        };
        let current = node.owner.as_ref().map(|owner| &owner.name);
        let mut matches = Vec::new();

        if node.kind.is_static_access() {
            let scope_node = self.document.node(scope);
            let static_scope = match &scope_node.kind {
                ExprKind::RelativeScope(RelativeScope::Parent) => StaticScope::Parent,
                ExprKind::RelativeScope(RelativeScope::SelfScope) => StaticScope::SelfScope,
                ExprKind::RelativeScope(RelativeScope::Static) => StaticScope::Static,
                _ => StaticScope::Named,
            };
            let owners = self.resolve(scope)?;
            for owner in owners.class_types() {
                let receiver = match (static_scope, current) {
                    (StaticScope::Parent, Some(current)) => current.clone(),
                    _ => owner.clone(),
                };
                let search = self.inheritance.search(owner.fqn(), name, kind)?;
                for scored in self.inheritance.reduce_static(&search, static_scope, current) {
                    matches.push(MemberMatch {
                        receiver: receiver.clone(),
                        scored,
                    });
                }
            }
        } else {
            let receiver_is_this = self.document.node(scope).is_this();
            let receivers = self.resolve(scope)?;
            for receiver in receivers.class_types() {
                let search = self.inheritance.search(receiver.fqn(), name, kind)?;
                let context = AccessContext {
                    current_class: current,
                    receiver,
                    receiver_is_this,
                };
                for scored in self.inheritance.reduce_access(&search, &context) {
                    matches.push(MemberMatch {
                        receiver: receiver.clone(),
                        scored,
                    });
                }
            }
        }
        Ok(matches)
    }
}

fn relative_types(relative: RelativeScope, owner: Option<&OwnerScope>) -> TypeSet {
    let Some(owner) = owner else {
        return TypeSet::new();
    };
    match relative {
        RelativeScope::SelfScope | RelativeScope::Static => TypeSet::single(owner.name.clone()),
        RelativeScope::Parent => owner.parent.iter().cloned().collect(),
    }
}

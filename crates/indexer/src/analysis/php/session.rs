//! Position-based queries over one document: hover facts, definitions,
//! references, completions and diagnostics.
//!
//! A [`QuerySession`] owns the [`ExpressionResolver`] of the document, so the
//! types and member searches computed for one query are reused by the next
//! as long as the session lives. Sessions are cheap; open one per request
//! batch and drop it when the document or the store changes.

use database::Collection;
use serde::Serialize;
use tracing::debug;

use super::document::Document;
use super::expression_resolver::{ExprKind, ExpressionResolver, NodeId, ResolverNode};
use super::import_table::ImportKind;
use super::symbols::{
    Class, ClassConst, Const, Function, Interface, Member, MemberKind, Method, Property, Symbol,
    Trait,
};
use super::types::{TypeRef, TypeSet};
use crate::analysis::types::{Diagnostic, Location, Severity, TextEdit};
use crate::errors::Result;
use crate::parsing::tree::TextRange;

/// What a name at a position refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "declaration", rename_all = "snake_case")]
pub enum Declaration {
    Class(Class),
    Interface(Interface),
    Trait(Trait),
    Function(Function),
    Method(Method),
    Property(Property),
    ClassConst(ClassConst),
    Const(Const),
    Variable {
        name: String,
        location: Location,
        types: TypeSet,
    },
}

impl Declaration {
    pub fn location(&self) -> &Location {
        match self {
            Declaration::Class(c) => c.location(),
            Declaration::Interface(i) => i.location(),
            Declaration::Trait(t) => t.location(),
            Declaration::Function(f) => f.location(),
            Declaration::Method(m) => m.location(),
            Declaration::Property(p) => p.location(),
            Declaration::ClassConst(c) => c.location(),
            Declaration::Const(c) => c.location(),
            Declaration::Variable { location, .. } => location,
        }
    }

    pub fn deprecated(&self) -> Option<&str> {
        match self {
            Declaration::Class(c) => c.deprecated.as_deref(),
            Declaration::Interface(i) => i.deprecated.as_deref(),
            Declaration::Trait(t) => t.deprecated.as_deref(),
            Declaration::Function(f) => f.deprecated.as_deref(),
            Declaration::Method(m) => m.deprecated.as_deref(),
            Declaration::Property(p) => p.deprecated.as_deref(),
            Declaration::ClassConst(c) => c.deprecated.as_deref(),
            Declaration::Const(c) => c.deprecated.as_deref(),
            Declaration::Variable { .. } => None,
        }
    }
}

impl From<Member> for Declaration {
    fn from(member: Member) -> Self {
        match member {
            Member::Method(m) => Declaration::Method(m),
            Member::Property(p) => Declaration::Property(p),
            Member::ClassConst(c) => Declaration::ClassConst(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverFact {
    pub kind: &'static str,
    pub name: String,
    pub types: TypeSet,
    pub range: TextRange,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    Method,
    Property,
    ClassConst,
    Variable,
    Class,
    Interface,
    Trait,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    /// Type or fqn shown next to the label.
    pub detail: String,
    /// Text to insert when it differs from the label.
    pub insert_text: Option<String>,
    /// `use` statement to add along with the completion.
    pub additional_edit: Option<TextEdit>,
    pub deprecated: bool,
}

pub struct QuerySession<'a> {
    resolver: ExpressionResolver<'a>,
}

impl<'a> QuerySession<'a> {
    pub fn new(resolver: ExpressionResolver<'a>) -> Self {
        Self { resolver }
    }

    pub fn document(&self) -> &'a Document {
        self.resolver.document()
    }

    pub fn resolver(&self) -> &ExpressionResolver<'a> {
        &self.resolver
    }

    pub fn resolve(&self, id: NodeId) -> Result<TypeSet> {
        self.resolver.resolve(id)
    }

    /// Type of the innermost expression at `offset`.
    pub fn type_at(&self, offset: u32) -> Result<Option<TypeSet>> {
        match self.document().node_at(offset) {
            Some(id) => Ok(Some(self.resolver.resolve(id)?)),
            None => Ok(None),
        }
    }

    pub fn hover(&self, offset: u32) -> Result<Option<HoverFact>> {
        let Some(id) = self.document().node_at(offset) else {
            return Ok(None);
        };
        let node = self.document().node(id);
        let types = self.resolver.resolve(id)?;
        let declarations = self.declarations(id)?;
        debug!(
            kind = node.kind.label(),
            name = %node.name,
            types = %types,
            declarations = declarations.len(),
            "Hover"
        );
        Ok(Some(HoverFact {
            kind: node.kind.label(),
            name: node.name.clone(),
            types,
            range: node.location.range,
            declarations,
        }))
    }

    pub fn definition(&self, offset: u32) -> Result<Vec<Location>> {
        let Some(id) = self.document().node_at(offset) else {
            return Ok(Vec::new());
        };
        Ok(self
            .declarations(id)?
            .iter()
            .map(|d| d.location().clone())
            .collect())
    }

    /// Sites referring to the symbol at `offset`. Classes, functions and
    /// constants come from the workspace reference index, variables from the
    /// document itself.
    pub fn references(&self, offset: u32) -> Result<Vec<Location>> {
        let Some(id) = self.document().node_at(offset) else {
            return Ok(Vec::new());
        };
        let node = self.document().node(id);
        if let ExprKind::Variable { table } = node.kind {
            return Ok(self.variable_references(node, table));
        }

        let mut locations = Vec::new();
        for fqn in self.referenced_names(id)? {
            let found: Vec<Location> = self.resolver.store().references(&fqn)?;
            locations.extend(found);
        }
        locations.sort_by(|a, b| (&a.uri, a.start_byte()).cmp(&(&b.uri, b.start_byte())));
        locations.dedup();
        Ok(locations)
    }

    /// PHP variables are function scoped: every occurrence of the name in
    /// the same table is the same variable.
    fn variable_references(&self, node: &ResolverNode, table: usize) -> Vec<Location> {
        self.document()
            .nodes()
            .filter(|(_, other)| other.name == node.name)
            .filter(|(_, other)| {
                matches!(other.kind, ExprKind::Variable { table: t } if t == table)
            })
            .map(|(_, other)| other.location.clone())
            .collect()
    }

    fn referenced_names(&self, id: NodeId) -> Result<Vec<String>> {
        let node = self.document().node(id);
        let names = match &node.kind {
            ExprKind::ClassAccess { class, .. } => vec![class.fqn().to_string()],
            ExprKind::ClassTypeDesignator { class: Some(class) } => vec![class.fqn().to_string()],
            ExprKind::FunctionCall { candidates } | ExprKind::ConstantAccess { candidates } => {
                candidates.clone()
            }
            ExprKind::TypeDeclaration { types } => {
                types.class_types().map(|t| t.fqn().to_string()).collect()
            }
            ExprKind::RelativeScope(_) | ExprKind::ClassTypeDesignator { class: None } => self
                .resolver
                .resolve(id)?
                .class_types()
                .map(|t| t.fqn().to_string())
                .collect(),
            _ => Vec::new(),
        };
        Ok(names)
    }

    /// Declarations the node `id` refers to.
    pub fn declarations(&self, id: NodeId) -> Result<Vec<Declaration>> {
        let node = self.document().node(id);
        if let Some(kind) = node.kind.member_kind() {
            let found = self.resolver.access_members(node, kind, &node.name)?;
            return Ok(found
                .into_iter()
                .map(|m| Declaration::from(m.scored.member))
                .collect());
        }

        match &node.kind {
            ExprKind::Variable { table } => {
                if node.is_this() {
                    return self.class_declarations(&self.resolver.resolve(id)?);
                }
                Ok(self
                    .document()
                    .lookup_variable(*table, &node.name, node.location.start_byte())
                    .map(|binding| Declaration::Variable {
                        name: binding.name.clone(),
                        location: binding.location.clone(),
                        types: binding.types.clone(),
                    })
                    .into_iter()
                    .collect())
            }
            ExprKind::FunctionCall { candidates } => {
                for candidate in candidates {
                    let found: Vec<Function> =
                        self.resolver.store().get_exact(Collection::Function, candidate)?;
                    if !found.is_empty() {
                        return Ok(found.into_iter().map(Declaration::Function).collect());
                    }
                }
                Ok(Vec::new())
            }
            ExprKind::ConstantAccess { candidates } => {
                for candidate in candidates {
                    let found: Vec<Const> =
                        self.resolver.store().get_exact(Collection::Const, candidate)?;
                    if !found.is_empty() {
                        return Ok(found.into_iter().map(Declaration::Const).collect());
                    }
                }
                Ok(Vec::new())
            }
            ExprKind::ClassAccess { .. }
            | ExprKind::ClassTypeDesignator { .. }
            | ExprKind::RelativeScope(_)
            | ExprKind::TypeDeclaration { .. } => {
                self.class_declarations(&self.resolver.resolve(id)?)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn class_declarations(&self, types: &TypeSet) -> Result<Vec<Declaration>> {
        let store = self.resolver.store();
        let mut declarations = Vec::new();
        for class in types.class_types() {
            let fqn = class.fqn();
            let classes: Vec<Class> = store.get_exact(Collection::Class, fqn)?;
            declarations.extend(classes.into_iter().map(Declaration::Class));
            let interfaces: Vec<Interface> = store.get_exact(Collection::Interface, fqn)?;
            declarations.extend(interfaces.into_iter().map(Declaration::Interface));
            let traits: Vec<Trait> = store.get_exact(Collection::Trait, fqn)?;
            declarations.extend(traits.into_iter().map(Declaration::Trait));
        }
        Ok(declarations)
    }

    /// Members accessible from the member access at `offset`, filtered by the
    /// partially typed name and ordered by how close to the receiver they are
    /// declared.
    pub fn complete_members(&self, offset: u32) -> Result<Vec<CompletionItem>> {
        let Some(id) = self.document().node_at(offset) else {
            return Ok(Vec::new());
        };
        let node = self.document().node(id);
        let kinds: &[MemberKind] = match node.kind {
            ExprKind::PropertyAccess | ExprKind::MethodAccess => {
                &[MemberKind::Method, MemberKind::Property]
            }
            ExprKind::ScopedPropertyAccess
            | ExprKind::ScopedMethodAccess
            | ExprKind::ScopedConstantAccess => {
                &[MemberKind::Method, MemberKind::Property, MemberKind::ClassConst]
            }
            _ => return Ok(Vec::new()),
        };
        let typed = node.name.trim_start_matches('$').to_lowercase();
        let is_static = node.kind.is_static_access();

        let mut scored = Vec::new();
        for kind in kinds {
            for found in self.resolver.access_members(node, *kind, "")? {
                let member = &found.scored.member;
                if !member.name().trim_start_matches('$').to_lowercase().starts_with(&typed) {
                    continue;
                }
                if is_static && *kind != MemberKind::ClassConst && !member.is_static() {
                    continue;
                }
                scored.push((found.scored.score, member_completion(member, is_static)));
            }
        }
        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score.cmp(a_score).then_with(|| a.label.cmp(&b.label))
        });
        Ok(scored.into_iter().map(|(_, item)| item).collect())
    }

    /// Variables in scope at `offset` starting with `prefix`.
    pub fn complete_variables(&self, offset: u32, prefix: &str) -> Vec<CompletionItem> {
        let prefix = prefix.trim_start_matches('$');
        let mut items: Vec<CompletionItem> = self
            .document()
            .variables_at(offset)
            .into_iter()
            .filter(|v| v.name.trim_start_matches('$').starts_with(prefix))
            .map(|v| CompletionItem {
                label: v.name.clone(),
                kind: CompletionKind::Variable,
                detail: v.types.to_string(),
                insert_text: None,
                additional_edit: None,
                deprecated: false,
            })
            .collect();
        items.sort_by(|a, b| a.label.cmp(&b.label));
        items
    }

    /// Class-likes whose name starts with `prefix`, inserted the way they
    /// can be written at `offset`, importing them when needed.
    pub fn complete_classes(&self, offset: u32, prefix: &str) -> Result<Vec<CompletionItem>> {
        let store = self.resolver.store();
        let imports = self.document().import_table_at(offset);
        let mut items = Vec::new();
        for (collection, kind) in [
            (Collection::Class, CompletionKind::Class),
            (Collection::Interface, CompletionKind::Interface),
            (Collection::Trait, CompletionKind::Trait),
        ] {
            for fqn in store.prefix_search(collection, prefix)? {
                let (insert, edit) = imports.resolve_to_qualified(&fqn, ImportKind::Class);
                let name = TypeRef::with_fqn(fqn.as_str(), fqn.as_str());
                items.push(CompletionItem {
                    label: name.name().to_string(),
                    kind,
                    detail: fqn.clone(),
                    insert_text: Some(insert),
                    additional_edit: edit,
                    deprecated: false,
                });
            }
        }
        items.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.detail.cmp(&b.detail)));
        Ok(items)
    }

    pub fn unused_variables(&self) -> Vec<Diagnostic> {
        self.document()
            .unused_variables()
            .into_iter()
            .map(|v| {
                Diagnostic::new(
                    v.location.range,
                    Severity::Hint,
                    format!("Variable {} is assigned but never used", v.name),
                )
            })
            .collect()
    }

    /// Uses of deprecated classes, functions, constants and members.
    pub fn deprecated_usages(&self) -> Result<Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        for (id, node) in self.document().nodes() {
            if matches!(
                node.kind,
                ExprKind::Variable { .. }
                    | ExprKind::Literal { .. }
                    | ExprKind::Encapsulated
                    | ExprKind::Parenthesised
                    | ExprKind::ForeachCollection
                    | ExprKind::Conditional { .. }
                    | ExprKind::RelativeScope(_)
            ) {
                continue;
            }
            for declaration in self.declarations(id)? {
                if let Some(reason) = declaration.deprecated() {
                    let message = if reason.is_empty() {
                        format!("{} is deprecated", node.name)
                    } else {
                        format!("{} is deprecated: {reason}", node.name)
                    };
                    let range = node.location.range;
                    diagnostics.push(Diagnostic::new(range, Severity::Warning, message));
                    break;
                }
            }
        }
        Ok(diagnostics)
    }

    /// Syntax errors, unused variables and deprecated usages together.
    pub fn diagnostics(&self) -> Result<Vec<Diagnostic>> {
        let mut diagnostics = self.document().diagnostics().to_vec();
        diagnostics.extend(self.unused_variables());
        diagnostics.extend(self.deprecated_usages()?);
        diagnostics.sort_by_key(|d| d.range.start_byte);
        Ok(diagnostics)
    }
}

fn member_completion(member: &Member, is_static: bool) -> CompletionItem {
    let (kind, label, insert_text) = match member {
        Member::Method(m) => (
            CompletionKind::Method,
            m.name.clone(),
            Some(format!("{}()", m.name)),
        ),
        Member::Property(p) if is_static => (CompletionKind::Property, p.name.clone(), None),
        Member::Property(p) => (
            CompletionKind::Property,
            p.name.trim_start_matches('$').to_string(),
            None,
        ),
        Member::ClassConst(c) => (CompletionKind::ClassConst, c.name.clone(), None),
    };
    CompletionItem {
        label,
        kind,
        detail: member.types().to_string(),
        insert_text,
        additional_edit: None,
        deprecated: member.deprecated().is_some(),
    }
}

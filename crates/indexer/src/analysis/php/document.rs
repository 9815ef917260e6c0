use database::{ReferenceEntry, StoreEntry, SymbolStore, SyncStats};
use serde::Serialize;
use tracing::debug;

use super::expression_resolver::{ExprKind, NodeId, ResolverNode};
use super::extraction;
use super::import_table::ImportTable;
use super::symbols::{
    Class, ClassConst, Const, Function, GlobalVariable, Interface, Method, Property, Symbol, Trait,
};
use super::types::TypeRef;
use super::variable_table::{Variable, VariableTable};
use crate::analysis::types::Diagnostic;
use crate::errors::Result;
use crate::parsing::tree::TextRange;

/// Everything extracted from one PHP file.
#[derive(Debug, Default)]
pub struct Document {
    pub(crate) uri: String,
    pub(crate) text: String,
    pub(crate) classes: Vec<Class>,
    pub(crate) interfaces: Vec<Interface>,
    pub(crate) traits: Vec<Trait>,
    pub(crate) functions: Vec<Function>,
    pub(crate) methods: Vec<Method>,
    pub(crate) properties: Vec<Property>,
    pub(crate) class_consts: Vec<ClassConst>,
    pub(crate) consts: Vec<Const>,
    pub(crate) global_variables: Vec<GlobalVariable>,
    /// Sorted by start offset, always holding the file-level table first.
    pub(crate) import_tables: Vec<ImportTable>,
    /// Index 0 is the file scope.
    pub(crate) variable_tables: Vec<VariableTable>,
    pub(crate) nodes: Vec<ResolverNode>,
    /// Body ranges of class-likes with their names.
    pub(crate) class_ranges: Vec<(TextRange, TypeRef)>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl Document {
    /// Parses and analyses `text`. Syntax errors do not fail the parse; they
    /// are reported through [`Document::diagnostics`].
    pub fn parse(uri: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        extraction::extract(uri.into(), text.into())
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn traits(&self) -> &[Trait] {
        &self.traits
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn class_consts(&self) -> &[ClassConst] {
        &self.class_consts
    }

    pub fn consts(&self) -> &[Const] {
        &self.consts
    }

    pub fn global_variables(&self) -> &[GlobalVariable] {
        &self.global_variables
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn node(&self, id: NodeId) -> &ResolverNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ResolverNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index as u32), node))
    }

    pub(crate) fn push_node(&mut self, node: ResolverNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Innermost node whose span contains `offset`. Foreach element nodes
    /// share the span of their collection and are never returned.
    pub fn node_at(&self, offset: u32) -> Option<NodeId> {
        self.nodes()
            .filter(|(_, node)| !matches!(node.kind, ExprKind::ForeachCollection))
            .filter(|(_, node)| node.location.contains(offset))
            .min_by_key(|(id, node)| (node.location.range.len(), std::cmp::Reverse(*id)))
            .map(|(id, _)| id)
    }

    /// Import table in effect at `offset`.
    pub fn import_table_at(&self, offset: u32) -> &ImportTable {
        let index = self
            .import_tables
            .partition_point(|table| table.start() <= offset)
            .saturating_sub(1);
        &self.import_tables[index]
    }

    /// Innermost variable table containing `offset`.
    pub fn variable_table_at(&self, offset: u32) -> usize {
        self.variable_tables
            .iter()
            .enumerate()
            .filter(|(_, table)| table.contains(offset))
            .min_by_key(|(index, table)| (table.span(), std::cmp::Reverse(*index)))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    pub fn variable_table(&self, index: usize) -> &VariableTable {
        &self.variable_tables[index]
    }

    /// Binding of `name` visible at `position` from table `table`, following
    /// arrow functions out to their parent scope.
    pub fn lookup_variable(&self, table: usize, name: &str, position: u32) -> Option<&Variable> {
        let mut current = Some(table);
        while let Some(index) = current {
            let table = self.variable_tables.get(index)?;
            if let Some(variable) = table.get(name, position) {
                return Some(variable);
            }
            current = if table.inherits_parent() {
                table.parent()
            } else {
                None
            };
        }
        None
    }

    /// Bindings visible at `offset`, innermost scope first.
    pub fn variables_at(&self, offset: u32) -> Vec<&Variable> {
        let mut visible: Vec<&Variable> = Vec::new();
        let mut current = Some(self.variable_table_at(offset));
        while let Some(index) = current {
            let table = &self.variable_tables[index];
            for variable in table.get_variables(offset) {
                if !visible.iter().any(|v| v.name == variable.name) {
                    visible.push(variable);
                }
            }
            current = if table.inherits_parent() {
                table.parent()
            } else {
                None
            };
        }
        visible
    }

    /// Class-like whose body contains `offset`.
    pub fn enclosing_class_at(&self, offset: u32) -> Option<&TypeRef> {
        self.class_ranges
            .iter()
            .filter(|(range, _)| range.contains(offset))
            .min_by_key(|(range, _)| range.len())
            .map(|(_, name)| name)
    }

    pub fn unused_variables(&self) -> Vec<&Variable> {
        self.variable_tables
            .iter()
            .flat_map(VariableTable::unused_variables)
            .collect()
    }

    /// Every declaration of the document as store entries.
    pub fn store_entries(&self) -> Result<Vec<StoreEntry>> {
        let mut entries = Vec::new();
        push_entries(&mut entries, &self.classes)?;
        push_entries(&mut entries, &self.interfaces)?;
        push_entries(&mut entries, &self.traits)?;
        push_entries(&mut entries, &self.functions)?;
        push_entries(&mut entries, &self.methods)?;
        push_entries(&mut entries, &self.properties)?;
        push_entries(&mut entries, &self.class_consts)?;
        push_entries(&mut entries, &self.consts)?;
        push_entries(&mut entries, &self.global_variables)?;
        Ok(entries)
    }

    /// Name-based references (classes, functions, constants) of the document.
    pub fn reference_entries(&self) -> Result<Vec<ReferenceEntry>> {
        let mut references = Vec::new();
        for (_, node) in self.nodes() {
            for fqn in referenced_names(node) {
                let range = node.location.range;
                references.push(ReferenceEntry::new(
                    fqn,
                    self.uri.as_str(),
                    (range.start_byte, range.end_byte),
                    &node.location,
                )?);
            }
        }
        Ok(references)
    }

    /// Replaces whatever the store holds for this document with its current
    /// declarations and references.
    pub fn sync(&self, store: &SymbolStore) -> Result<SyncStats> {
        let entries = self.store_entries()?;
        let references = self.reference_entries()?;
        debug!(
            uri = %self.uri,
            entries = entries.len(),
            references = references.len(),
            "Syncing document"
        );
        Ok(store.sync_document(&self.uri, entries, references)?)
    }
}

fn push_entries<T: Symbol + Serialize>(entries: &mut Vec<StoreEntry>, symbols: &[T]) -> Result<()> {
    for symbol in symbols {
        let entry = StoreEntry::new(
            symbol.collection(),
            symbol.fqn(),
            symbol.location().disambiguator(),
            symbol,
        )?
        .with_tokens(symbol.completion_tokens());
        entries.push(entry);
    }
    Ok(())
}

fn referenced_names(node: &ResolverNode) -> Vec<String> {
    match &node.kind {
        ExprKind::ClassAccess { class, .. } => vec![class.fqn().to_string()],
        ExprKind::ClassTypeDesignator { class: Some(class) } => vec![class.fqn().to_string()],
        ExprKind::TypeDeclaration { types } => types
            .class_types()
            .map(|t| t.fqn().to_string())
            .collect(),
        ExprKind::FunctionCall { candidates } | ExprKind::ConstantAccess { candidates } => {
            candidates.clone()
        }
        _ => Vec::new(),
    }
}

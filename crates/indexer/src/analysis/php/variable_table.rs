//! Position-ordered variable bindings of one function-like scope.
//!
//! Every binding applies from its position onward, so the binding visible at
//! an offset is the last one positioned at or before it. Reads are not stored;
//! they only mark the nearest preceding declaration as used.

use rustc_hash::FxHashMap;

use super::expression_resolver::NodeId;
use super::types::TypeSet;
use crate::analysis::types::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Assignment,
    Parameter,
    Foreach,
    Catch,
    /// Imported into a closure through `use (...)`
    Captured,
    /// Declared with `global $x`
    Global,
    /// Narrowed by an `instanceof` test
    Narrowing,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub location: Location,
    /// Byte offset from which the binding applies.
    pub position: u32,
    pub types: TypeSet,
    /// Expression whose type flows into the variable.
    pub expression: Option<NodeId>,
    pub kind: BindingKind,
    pub is_declaration: bool,
    pub is_used: bool,
}

impl Variable {
    pub fn declaration(
        name: impl Into<String>,
        location: Location,
        position: u32,
        kind: BindingKind,
    ) -> Self {
        Self {
            name: name.into(),
            location,
            position,
            types: TypeSet::new(),
            expression: None,
            kind,
            is_declaration: kind != BindingKind::Narrowing,
            is_used: false,
        }
    }

    pub fn read(name: impl Into<String>, location: Location) -> Self {
        let position = location.start_byte();
        Self {
            name: name.into(),
            location,
            position,
            types: TypeSet::new(),
            expression: None,
            kind: BindingKind::Assignment,
            is_declaration: false,
            is_used: true,
        }
    }

    pub fn with_types(mut self, types: TypeSet) -> Self {
        self.types = types;
        self
    }

    pub fn with_expression(mut self, expression: Option<NodeId>) -> Self {
        self.expression = expression;
        self
    }

    /// Whether an unread binding of this kind is worth reporting.
    fn is_reportable(&self) -> bool {
        matches!(self.kind, BindingKind::Assignment | BindingKind::Foreach)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    start: u32,
    end: u32,
    parent: Option<usize>,
    /// Arrow functions see every binding of their parent scope.
    inherits_parent: bool,
    variables: FxHashMap<String, Vec<Variable>>,
}

impl VariableTable {
    pub fn new(start: u32, end: u32, parent: Option<usize>, inherits_parent: bool) -> Self {
        Self {
            start,
            end,
            parent,
            inherits_parent,
            variables: FxHashMap::default(),
        }
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn inherits_parent(&self) -> bool {
        self.inherits_parent
    }

    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn span(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Records `variable`. A declaration is inserted in position order; a
    /// read marks the declaration preceding it as used and is dropped.
    pub fn add(&mut self, variable: Variable, is_declaration: bool) {
        if !is_declaration {
            self.mark_used(&variable.name, variable.position);
            return;
        }
        let mut variable = variable;
        variable.is_declaration = variable.kind != BindingKind::Narrowing;
        self.insert(variable);
    }

    /// Records a type refinement that is visible from `variable.position`
    /// but is never itself reported or marked.
    pub fn add_narrowing(&mut self, mut variable: Variable) {
        variable.kind = BindingKind::Narrowing;
        variable.is_declaration = false;
        variable.is_used = true;
        self.insert(variable);
    }

    fn insert(&mut self, variable: Variable) {
        let bindings = self.variables.entry(variable.name.clone()).or_default();
        let index = bindings.partition_point(|v| v.position <= variable.position);
        bindings.insert(index, variable);
    }

    /// Marks the declaration visible at `position` as used. Returns false when
    /// this table holds no such declaration.
    pub fn mark_used(&mut self, name: &str, position: u32) -> bool {
        let Some(bindings) = self.variables.get_mut(name) else {
            return false;
        };
        let index = bindings.partition_point(|v| v.position <= position);
        match bindings[..index].iter_mut().rev().find(|v| v.is_declaration) {
            Some(binding) => {
                binding.is_used = true;
                true
            }
            None => false,
        }
    }

    /// Binding of `name` in effect at `position`.
    pub fn get(&self, name: &str, position: u32) -> Option<&Variable> {
        let bindings = self.variables.get(name)?;
        let index = bindings.partition_point(|v| v.position <= position);
        index.checked_sub(1).map(|i| &bindings[i])
    }

    /// One binding per variable name visible at `position`, ordered by name.
    pub fn get_variables(&self, position: u32) -> Vec<&Variable> {
        let mut visible: Vec<&Variable> = self
            .variables
            .keys()
            .filter_map(|name| self.get(name, position))
            .filter(|v| v.is_declaration || v.kind == BindingKind::Narrowing)
            .collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name));
        visible
    }

    /// Assigned but never read declarations, in source order.
    pub fn unused_variables(&self) -> Vec<&Variable> {
        let mut unused: Vec<&Variable> = self
            .variables
            .values()
            .flatten()
            .filter(|v| v.is_declaration && !v.is_used && v.is_reportable())
            .collect();
        unused.sort_by_key(|v| v.location.start_byte());
        unused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::tree::TextRange;

    fn location(start: u32) -> Location {
        Location::new(
            "file:///t.php",
            TextRange {
                start_byte: start,
                end_byte: start + 2,
                ..Default::default()
            },
        )
    }

    fn declared(name: &str, position: u32, types: &str) -> Variable {
        Variable::declaration(name, location(position), position, BindingKind::Assignment)
            .with_types(TypeSet::parse(types))
    }

    #[test]
    fn test_shadowing_by_position() {
        let mut table = VariableTable::new(0, 100, None, false);
        table.add(declared("$x", 5, "A"), true);
        table.add(declared("$x", 20, "B"), true);

        assert!(table.get("$x", 10).unwrap().types.contains("\\A"));
        assert!(table.get("$x", 25).unwrap().types.contains("\\B"));
        assert!(table.get("$x", 2).is_none());
        assert!(table.get("$y", 25).is_none());
    }

    #[test]
    fn test_read_marks_nearest_preceding_declaration() {
        let mut table = VariableTable::new(0, 100, None, false);
        table.add(declared("$x", 5, "A"), true);
        table.add(declared("$x", 20, "B"), true);
        table.add(Variable::read("$x", location(30)), false);

        let unused = table.unused_variables();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].position, 5);
    }

    #[test]
    fn test_read_does_not_create_binding() {
        let mut table = VariableTable::new(0, 100, None, false);
        table.add(Variable::read("$x", location(10)), false);

        assert!(table.get("$x", 50).is_none());
        assert!(table.get_variables(50).is_empty());
    }

    #[test]
    fn test_parameters_are_never_reported() {
        let mut table = VariableTable::new(0, 100, None, false);
        table.add(
            Variable::declaration("$p", location(1), 1, BindingKind::Parameter),
            true,
        );

        assert!(table.unused_variables().is_empty());
        assert_eq!(table.get_variables(10).len(), 1);
    }

    #[test]
    fn test_narrowing_is_skipped_when_marking_reads() {
        let mut table = VariableTable::new(0, 100, None, false);
        table.add(declared("$x", 5, "A"), true);
        table.add_narrowing(declared("$x", 30, "Foo"));
        table.add(Variable::read("$x", location(40)), false);

        assert!(table.unused_variables().is_empty());
        assert!(table.get("$x", 40).unwrap().types.contains("\\Foo"));
    }
}

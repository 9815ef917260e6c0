//! Thin adapter over the tree-sitter PHP grammar.
//!
//! The extraction pass only ever talks to [`SyntaxNode`], so the rest of the
//! analysis does not depend on tree-sitter's cursor and index types.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser, Tree};

use crate::errors::{IndexerError, Result};

/// Zero-based line and UTF-8 column of a position in a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Byte offsets plus line/column positions of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start_byte: u32,
    pub end_byte: u32,
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    /// Whether `offset` falls inside the range. The end is inclusive so a
    /// cursor placed right after a word still hits it.
    pub fn contains(&self, offset: u32) -> bool {
        self.start_byte <= offset && offset <= self.end_byte
    }

    pub fn len(&self) -> u32 {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn parse(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
        .map_err(|e| IndexerError::Parse(format!("failed to load PHP grammar: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| IndexerError::Parse("parser produced no tree".to_string()))
}

/// A node of the parse tree with its type tag looked up once.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxNode<'t> {
    node: Node<'t>,
    kind: &'static str,
}

impl<'t> SyntaxNode<'t> {
    pub fn new(node: Node<'t>) -> Self {
        Self {
            node,
            kind: node.kind(),
        }
    }

    pub fn root(tree: &'t Tree) -> Self {
        Self::new(tree.root_node())
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn is_named(&self) -> bool {
        self.node.is_named()
    }

    pub fn is_error(&self) -> bool {
        self.node.is_error()
    }

    pub fn is_missing(&self) -> bool {
        self.node.is_missing()
    }

    /// Whether the subtree contains any error or missing node.
    pub fn has_error(&self) -> bool {
        self.node.has_error()
    }

    pub fn child_count(&self) -> usize {
        self.node.child_count()
    }

    /// The `index`-th child, named or not.
    pub fn child(&self, index: usize) -> Option<SyntaxNode<'t>> {
        self.node.child(index).map(SyntaxNode::new)
    }

    pub fn children(&self) -> impl Iterator<Item = SyntaxNode<'t>> {
        let mut cursor = self.node.walk();
        let children: Vec<_> = self.node.children(&mut cursor).map(SyntaxNode::new).collect();
        children.into_iter()
    }

    /// Named children, skipping comments.
    pub fn named_children(&self) -> Vec<SyntaxNode<'t>> {
        let mut cursor = self.node.walk();
        self.node
            .named_children(&mut cursor)
            .map(SyntaxNode::new)
            .filter(|child| !child.is("comment"))
            .collect()
    }

    pub fn child_by_field(&self, field: &str) -> Option<SyntaxNode<'t>> {
        self.node.child_by_field_name(field).map(SyntaxNode::new)
    }

    pub fn first_child_of_kind(&self, kinds: &[&str]) -> Option<SyntaxNode<'t>> {
        self.children().find(|child| kinds.contains(&child.kind))
    }

    pub fn has_child_of_kind(&self, kind: &str) -> bool {
        self.children().any(|child| child.is(kind))
    }

    pub fn parent(&self) -> Option<SyntaxNode<'t>> {
        self.node.parent().map(SyntaxNode::new)
    }

    pub fn next_sibling(&self) -> Option<SyntaxNode<'t>> {
        self.node.next_sibling().map(SyntaxNode::new)
    }

    pub fn prev_sibling(&self) -> Option<SyntaxNode<'t>> {
        self.node.prev_sibling().map(SyntaxNode::new)
    }

    pub fn start_byte(&self) -> u32 {
        self.node.start_byte() as u32
    }

    pub fn end_byte(&self) -> u32 {
        self.node.end_byte() as u32
    }

    pub fn text_range(&self) -> TextRange {
        let start = self.node.start_position();
        let end = self.node.end_position();
        TextRange {
            start_byte: self.start_byte(),
            end_byte: self.end_byte(),
            start: Position::new(start.row as u32, start.column as u32),
            end: Position::new(end.row as u32, end.column as u32),
        }
    }

    /// Source text covered by the node.
    pub fn content<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.node.start_byte()..self.node.end_byte())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exposes_program_root() {
        let source = "<?php\nclass Foo {}\n";
        let tree = parse(source).unwrap();
        let root = SyntaxNode::root(&tree);

        assert_eq!(root.kind(), "program");
        let class = root
            .named_children()
            .into_iter()
            .find(|n| n.is("class_declaration"))
            .unwrap();
        let name = class.child_by_field("name").unwrap();
        assert_eq!(name.content(source), "Foo");
        assert_eq!(name.text_range().start, Position::new(1, 6));
    }

    #[test]
    fn test_siblings_and_parent() {
        let source = "<?php\n/** doc */\nfunction f() {}\n";
        let tree = parse(source).unwrap();
        let root = SyntaxNode::root(&tree);
        let function = root
            .named_children()
            .into_iter()
            .find(|n| n.is("function_definition"))
            .unwrap();

        let comment = function.prev_sibling().unwrap();
        assert_eq!(comment.kind(), "comment");
        assert_eq!(comment.content(source), "/** doc */");
        assert_eq!(function.parent().unwrap().kind(), "program");
    }

    #[test]
    fn test_child_by_index() {
        let tree = parse("<?php\n").unwrap();
        let root = SyntaxNode::root(&tree);
        let count = root.child_count();

        assert_eq!(root.child(0).map(|n| n.kind()), Some("php_tag"));
        assert!(root.child(count).is_none());
    }

    #[test]
    fn test_text_range_contains_end() {
        let range = TextRange {
            start_byte: 4,
            end_byte: 8,
            ..Default::default()
        };
        assert!(range.contains(4));
        assert!(range.contains(8));
        assert!(!range.contains(9));
    }
}

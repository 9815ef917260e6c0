//! Single pass over the syntax tree of a PHP file.
//!
//! The pass records declarations as symbols, builds the import tables and
//! variable tables of the file, and lays out the [`ResolverNode`] arena that
//! type resolution later walks. Nothing here touches the symbol store: all
//! names are qualified against the import table in effect where they appear,
//! and everything that needs other files is left to the resolver.

use smallvec::SmallVec;

use super::document::Document;
use super::expression_resolver::{
    ClassRole, ExprKind, HasTypes, NodeId, OwnerScope, RelativeScope, ResolverNode,
};
use super::import_table::{ImportKind, ImportTable, absolute, qualify};
use super::phpdoc::PhpDoc;
use super::symbols::{
    Class, ClassConst, ClassModifier, Const, ConstKind, Function, GlobalVariable, Interface,
    Method, Parameter, Property, PropertyAccess, Trait, Visibility,
};
use super::types::{TypeRef, TypeSet};
use super::variable_table::{BindingKind, Variable, VariableTable};
use crate::analysis::types::{Diagnostic, Location, Severity};
use crate::errors::Result;
use crate::parsing::tree::{self, Position, SyntaxNode};

pub(crate) fn extract(uri: String, text: String) -> Result<Document> {
    let tree = tree::parse(&text)?;
    let mut document = {
        let mut extractor = Extractor::new(uri, &text);
        extractor.run(SyntaxNode::root(&tree));
        extractor.document
    };
    document.text = text;
    Ok(document)
}

#[derive(Debug, Clone)]
struct Owner {
    /// Index into the document classes when the owner is a class.
    class: Option<usize>,
    scope: OwnerScope,
}

#[derive(Debug, Clone)]
struct TraversalContext {
    /// Variable table receiving bindings.
    table: usize,
    owner: Option<Owner>,
}

impl TraversalContext {
    fn with_table(&self, table: usize) -> Self {
        Self {
            table,
            owner: self.owner.clone(),
        }
    }

    fn owner_scope(&self) -> Option<OwnerScope> {
        self.owner.as_ref().map(|owner| owner.scope.clone())
    }
}

struct Extractor<'s> {
    source: &'s str,
    uri: String,
    document: Document,
    /// Index of the import table in effect.
    imports: usize,
}

impl<'s> Extractor<'s> {
    fn new(uri: String, source: &'s str) -> Self {
        let document = Document {
            uri: uri.clone(),
            ..Document::default()
        };
        Self {
            source,
            uri,
            document,
            imports: 0,
        }
    }

    fn run(&mut self, root: SyntaxNode<'_>) {
        self.syntax_errors(root);

        let mut imports = ImportTable::new("", 0);
        if let Some(tag) = root.first_child_of_kind(&["php_tag"]) {
            imports.set_insert_position(Position::new(tag.text_range().end.line + 1, 0));
        }
        self.document.import_tables.push(imports);
        self.document
            .variable_tables
            .push(VariableTable::new(0, root.end_byte(), None, false));

        let ctx = TraversalContext {
            table: 0,
            owner: None,
        };
        self.visit_children(root, &ctx);
    }

    fn text(&self, node: SyntaxNode<'_>) -> &'s str {
        node.content(self.source)
    }

    fn location(&self, node: SyntaxNode<'_>) -> Location {
        Location::new(self.uri.as_str(), node.text_range())
    }

    fn imports(&self) -> &ImportTable {
        &self.document.import_tables[self.imports]
    }

    fn node(
        &self,
        kind: ExprKind,
        name: impl Into<String>,
        syntax: SyntaxNode<'_>,
        ctx: &TraversalContext,
    ) -> ResolverNode {
        ResolverNode::new(kind, name, self.location(syntax)).with_owner(ctx.owner_scope())
    }

    fn add_node(&mut self, node: ResolverNode) -> NodeId {
        self.document.push_node(node)
    }

    fn syntax_errors(&mut self, node: SyntaxNode<'_>) {
        if node.is_missing() {
            let message = format!("Missing {}", node.kind());
            self.document
                .diagnostics
                .push(Diagnostic::new(node.text_range(), Severity::Error, message));
        } else if node.is_error() {
            self.document
                .diagnostics
                .push(Diagnostic::new(node.text_range(), Severity::Error, "Syntax error"));
        } else if node.has_error() {
            for child in node.children() {
                self.syntax_errors(child);
            }
        }
    }

    /// Docblock immediately preceding `node`.
    fn leading_doc(&self, node: SyntaxNode<'_>) -> Option<PhpDoc> {
        let previous = node.prev_sibling()?;
        if !previous.is("comment") {
            return None;
        }
        PhpDoc::parse(self.text(previous))
    }

    /// Docblock of the statement an expression belongs to.
    fn statement_doc(&self, node: SyntaxNode<'_>) -> Option<PhpDoc> {
        let statement = node.parent().filter(|p| p.is("expression_statement"))?;
        self.leading_doc(statement)
    }

    fn visit_children(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        for child in node.named_children() {
            self.visit(child, ctx);
        }
    }

    fn visit(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        match node.kind() {
            "namespace_definition" => self.namespace(node, ctx),
            "namespace_use_declaration" => self.use_declaration(node),
            "class_declaration" | "enum_declaration" => self.class(node, ctx),
            "interface_declaration" => self.interface(node, ctx),
            "trait_declaration" => self.trait_declaration(node, ctx),
            "function_definition" => self.function(node, ctx),
            "method_declaration" => self.detached_method(node, ctx),
            "const_declaration" => self.constants(node, ctx),
            "global_declaration" => self.global_declaration(node, ctx),
            "static_variable_declaration" => self.static_variable(node, ctx),
            "foreach_statement" => self.foreach(node, ctx),
            "catch_clause" => self.catch_clause(node, ctx),
            "expression_statement" => {
                if let Some(doc) = self.leading_doc(node) {
                    self.doc_narrowing(&doc, node, ctx);
                }
                self.visit_children(node, ctx);
            }
            "argument" => {
                let label = node.child_by_field("name").map(|n| n.start_byte());
                for child in node.named_children() {
                    if Some(child.start_byte()) != label {
                        self.visit(child, ctx);
                    }
                }
            }
            "comment" | "php_tag" | "text" | "text_interpolation" | "attribute_list"
            | "declare_directive" | "named_label_statement" | "goto_statement" => {}
            kind if is_expression(kind) => {
                self.expression(node, ctx);
            }
            _ => self.visit_children(node, ctx),
        }
    }

    // Namespaces and imports

    fn namespace(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let name_node = node.child_by_field("name");
        let name = name_node.map(|n| self.text(n)).unwrap_or_default();
        let mut table = ImportTable::new(name, node.start_byte());
        let line = name_node.unwrap_or(node).text_range().end.line;
        table.set_insert_position(Position::new(line + 1, 0));
        self.document.import_tables.push(table);
        let index = self.document.import_tables.len() - 1;

        match node.child_by_field("body") {
            Some(body) => {
                let previous = self.imports;
                self.imports = index;
                self.visit_children(body, ctx);
                self.imports = previous;
            }
            None => self.imports = index,
        }
    }

    fn use_declaration(&mut self, node: SyntaxNode<'_>) {
        let kind = self.import_kind(node).unwrap_or(ImportKind::Class);
        let prefix = node
            .first_child_of_kind(&["namespace_name"])
            .map(|n| self.text(n))
            .unwrap_or_default();

        for child in node.named_children() {
            match child.kind() {
                "namespace_use_clause" => self.use_clause(child, "", kind),
                "namespace_use_group" => {
                    for clause in child.named_children() {
                        let clause_kind = self.import_kind(clause).unwrap_or(kind);
                        self.use_clause(clause, prefix, clause_kind);
                    }
                }
                _ => {}
            }
        }

        let position = Position::new(node.text_range().end.line + 1, 0);
        self.document.import_tables[self.imports].set_insert_position(position);
    }

    fn import_kind(&self, node: SyntaxNode<'_>) -> Option<ImportKind> {
        node.children()
            .filter(|child| !child.is_named())
            .find_map(|child| match self.text(child).to_lowercase().as_str() {
                "function" => Some(ImportKind::Function),
                "const" => Some(ImportKind::Const),
                _ => None,
            })
    }

    fn use_clause(&mut self, clause: SyntaxNode<'_>, prefix: &str, kind: ImportKind) {
        let alias_node = clause.child_by_field("alias").or_else(|| {
            clause
                .first_child_of_kind(&["namespace_aliasing_clause"])
                .and_then(|c| c.first_child_of_kind(&["name"]))
        });
        let alias_start = alias_node.map(|a| a.start_byte());
        let Some(name_node) = clause.named_children().into_iter().find(|n| {
            matches!(n.kind(), "name" | "qualified_name" | "namespace_name")
                && Some(n.start_byte()) != alias_start
        }) else {
            return;
        };

        let name = self.text(name_node).trim_start_matches('\\');
        let fq_name = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}\\{name}", prefix.trim_end_matches('\\'))
        };
        let alias = alias_node.map(|a| self.text(a)).unwrap_or_default();

        let table = &mut self.document.import_tables[self.imports];
        match kind {
            ImportKind::Class => table.add_class_name(alias, &fq_name),
            ImportKind::Function => table.add_function_name(alias, &fq_name),
            ImportKind::Const => table.add_const_name(alias, &fq_name),
        }
    }

    // Type names

    fn resolve_class(&self, name: &str) -> TypeRef {
        let mut class = TypeRef::new(name);
        self.imports().class_reference_fqn(&mut class);
        class
    }

    /// Qualifies a type against the imports, with `self` and `parent` bound
    /// to the enclosing class.
    fn resolve_type(&self, mut type_ref: TypeRef, ctx: &TraversalContext) -> TypeRef {
        let dimensions = type_ref.dimensions();
        let base = type_ref.fqn().trim_end_matches("[]").to_string();
        let bound = match base.as_str() {
            "self" => ctx.owner.as_ref().map(|o| o.scope.name.fqn().to_string()),
            "parent" => ctx
                .owner
                .as_ref()
                .and_then(|o| o.scope.parent.as_ref())
                .map(|p| p.fqn().to_string()),
            _ => None,
        };
        if let Some(fqn) = bound {
            type_ref.set_fqn(format!("{fqn}{}", "[]".repeat(dimensions)));
            return type_ref;
        }
        self.imports().class_reference_fqn(&mut type_ref);
        type_ref
    }

    fn resolve_types(&self, types: &TypeSet, ctx: &TraversalContext) -> TypeSet {
        types.iter().map(|t| self.resolve_type(t.clone(), ctx)).collect()
    }

    fn hint_types(&self, hint: SyntaxNode<'_>, ctx: &TraversalContext) -> TypeSet {
        match hint.kind() {
            "named_type" => match hint.named_children().first() {
                Some(name) => self.hint_types(*name, ctx),
                None => TypeSet::new(),
            },
            "name" | "qualified_name" | "relative_scope" => {
                TypeSet::single(self.resolve_type(TypeRef::new(self.text(hint)), ctx))
            }
            "primitive_type" | "bottom_type" => TypeSet::single(TypeRef::new(self.text(hint))),
            "optional_type" => {
                let mut types = hint
                    .named_children()
                    .first()
                    .map(|inner| self.hint_types(*inner, ctx))
                    .unwrap_or_default();
                types.add(TypeRef::new("null"));
                types
            }
            "union_type" | "intersection_type" | "disjunctive_normal_form_type" | "type_list" => {
                let mut types = TypeSet::new();
                for member in hint.named_children() {
                    types.merge(&self.hint_types(member, ctx));
                }
                types
            }
            _ => self.resolve_types(&TypeSet::parse(self.text(hint)), ctx),
        }
    }

    /// Types of a declared hint, recorded as a type declaration node.
    fn type_hint(&mut self, hint: SyntaxNode<'_>, ctx: &TraversalContext) -> TypeSet {
        let types = self.hint_types(hint, ctx);
        let node = self.node(
            ExprKind::TypeDeclaration {
                types: types.clone(),
            },
            self.text(hint),
            hint,
            ctx,
        );
        self.add_node(node);
        types
    }

    fn class_reference(
        &mut self,
        name: SyntaxNode<'_>,
        role: ClassRole,
        ctx: &TraversalContext,
    ) -> TypeRef {
        let class = self.resolve_class(self.text(name));
        let node = self.node(
            ExprKind::ClassAccess {
                class: class.clone(),
                role,
            },
            self.text(name),
            name,
            ctx,
        );
        self.add_node(node);
        class
    }

    fn class_names(
        &mut self,
        clause: Option<SyntaxNode<'_>>,
        role: ClassRole,
        ctx: &TraversalContext,
    ) -> Vec<TypeRef> {
        let Some(clause) = clause else {
            return Vec::new();
        };
        clause
            .named_children()
            .into_iter()
            .filter(|n| matches!(n.kind(), "name" | "qualified_name"))
            .map(|n| self.class_reference(n, role, ctx))
            .collect()
    }

    // Class-likes

    fn class(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let Some(name_node) = node.child_by_field("name") else {
            self.visit_children(node, ctx);
            return;
        };
        let short = self.text(name_node);
        let name = TypeRef::with_fqn(short, qualify(self.imports().namespace(), short));
        let doc = self.leading_doc(node);
        let modifier = if node.has_child_of_kind("abstract_modifier") {
            ClassModifier::Abstract
        } else if node.has_child_of_kind("final_modifier") {
            ClassModifier::Final
        } else {
            ClassModifier::None
        };
        let extends = self
            .class_names(node.first_child_of_kind(&["base_clause"]), ClassRole::Class, ctx)
            .into_iter()
            .next();
        let implements = self.class_names(
            node.first_child_of_kind(&["class_interface_clause"]),
            ClassRole::Interface,
            ctx,
        );

        let index = self.document.classes.len();
        self.document.classes.push(Class {
            location: self.location(name_node),
            name: name.clone(),
            modifier,
            extends: extends.clone(),
            implements,
            uses: Vec::new(),
            is_enum: node.is("enum_declaration"),
            description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
            deprecated: doc.as_ref().and_then(|d| d.deprecated.clone()),
        });

        let inner = TraversalContext {
            table: ctx.table,
            owner: Some(Owner {
                class: Some(index),
                scope: OwnerScope {
                    name: name.clone(),
                    parent: extends,
                },
            }),
        };
        self.class_like_body(node, name, doc.as_ref(), &inner);
    }

    fn interface(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let Some(name_node) = node.child_by_field("name") else {
            return;
        };
        let short = self.text(name_node);
        let name = TypeRef::with_fqn(short, qualify(self.imports().namespace(), short));
        let doc = self.leading_doc(node);
        let extends = self.class_names(
            node.first_child_of_kind(&["base_clause"]),
            ClassRole::Interface,
            ctx,
        );

        self.document.interfaces.push(Interface {
            location: self.location(name_node),
            name: name.clone(),
            extends,
            description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
            deprecated: doc.as_ref().and_then(|d| d.deprecated.clone()),
        });

        let inner = TraversalContext {
            table: ctx.table,
            owner: Some(Owner {
                class: None,
                scope: OwnerScope {
                    name: name.clone(),
                    parent: None,
                },
            }),
        };
        self.class_like_body(node, name, doc.as_ref(), &inner);
    }

    fn trait_declaration(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let Some(name_node) = node.child_by_field("name") else {
            return;
        };
        let short = self.text(name_node);
        let name = TypeRef::with_fqn(short, qualify(self.imports().namespace(), short));
        let doc = self.leading_doc(node);

        self.document.traits.push(Trait {
            location: self.location(name_node),
            name: name.clone(),
            description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
            deprecated: doc.as_ref().and_then(|d| d.deprecated.clone()),
        });

        let inner = TraversalContext {
            table: ctx.table,
            owner: Some(Owner {
                class: None,
                scope: OwnerScope {
                    name: name.clone(),
                    parent: None,
                },
            }),
        };
        self.class_like_body(node, name, doc.as_ref(), &inner);
    }

    fn class_like_body(
        &mut self,
        node: SyntaxNode<'_>,
        name: TypeRef,
        doc: Option<&PhpDoc>,
        ctx: &TraversalContext,
    ) {
        self.document.class_ranges.push((node.text_range(), name));
        if let Some(body) = node.child_by_field("body") {
            for member in body.named_children() {
                match member.kind() {
                    "method_declaration" => self.method(member, ctx),
                    "property_declaration" => self.properties(member, ctx),
                    "const_declaration" => self.class_constants(member, ctx),
                    "use_declaration" => self.trait_use(member, ctx),
                    "enum_case" => self.enum_case(member, ctx),
                    _ => {}
                }
            }
        }
        if let Some(doc) = doc {
            self.magic_members(node, doc, ctx);
        }
    }

    /// `@property` and `@method` tags of a class docblock.
    fn magic_members(&mut self, node: SyntaxNode<'_>, doc: &PhpDoc, ctx: &TraversalContext) {
        let Some(owner) = ctx.owner.as_ref() else {
            return;
        };
        let location = self.location(node.child_by_field("name").unwrap_or(node));

        for property in &doc.properties {
            self.document.properties.push(Property {
                location: location.clone(),
                name: property.name.clone(),
                scope: owner.scope.name.clone(),
                visibility: Visibility::Public,
                is_static: false,
                types: self.resolve_types(&property.types, ctx),
                access: property.access,
                is_magic: true,
                description: property.description.clone(),
                deprecated: None,
            });
        }

        for method in &doc.methods {
            let params = method
                .params
                .iter()
                .map(|param| Parameter {
                    name: param.name.clone(),
                    types: self.resolve_types(&param.types, ctx),
                    description: param.description.clone(),
                    ..Parameter::default()
                })
                .collect();
            self.document.methods.push(Method {
                location: location.clone(),
                name: method.name.clone(),
                scope: owner.scope.name.clone(),
                params,
                return_types: self.resolve_types(&method.return_types, ctx),
                visibility: Visibility::Public,
                is_static: method.is_static,
                modifier: ClassModifier::None,
                is_magic: true,
                description: method.description.clone(),
                deprecated: None,
            });
        }
    }

    fn trait_use(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let used = self.class_names(Some(node), ClassRole::Trait, ctx);
        if let Some(index) = ctx.owner.as_ref().and_then(|owner| owner.class) {
            self.document.classes[index].uses.extend(used);
        }
    }

    fn enum_case(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let (Some(owner), Some(name_node)) = (ctx.owner.as_ref(), node.child_by_field("name"))
        else {
            return;
        };
        let doc = self.leading_doc(node);
        let value = node
            .child_by_field("value")
            .map(|v| self.text(v).to_string())
            .unwrap_or_default();
        self.document.class_consts.push(ClassConst {
            location: self.location(name_node),
            name: self.text(name_node).to_string(),
            scope: owner.scope.name.clone(),
            visibility: Visibility::Public,
            types: TypeSet::single(owner.scope.name.clone()),
            value,
            description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
            deprecated: doc.and_then(|d| d.deprecated),
        });
    }

    fn visibility(&self, node: SyntaxNode<'_>) -> Visibility {
        node.first_child_of_kind(&["visibility_modifier"])
            .map(|v| Visibility::from_keyword(self.text(v)))
            .unwrap_or_default()
    }

    fn method(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let (Some(owner), Some(name_node)) = (ctx.owner.clone(), node.child_by_field("name")) else {
            self.detached_method(node, ctx);
            return;
        };
        let doc = self.leading_doc(node);
        let table = self.new_table(node, ctx.table, false);
        let inner = ctx.with_table(table);

        let params = self.parameters(node, doc.as_ref(), &inner);
        let mut return_types = node
            .child_by_field("return_type")
            .map(|hint| self.type_hint(hint, &inner))
            .unwrap_or_default();
        if let Some(returns) = doc.as_ref().and_then(|d| d.returns.as_ref()) {
            return_types.merge(&self.resolve_types(&returns.types, &inner));
        }
        let modifier = if node.has_child_of_kind("abstract_modifier") {
            ClassModifier::Abstract
        } else if node.has_child_of_kind("final_modifier") {
            ClassModifier::Final
        } else {
            ClassModifier::None
        };

        self.document.methods.push(Method {
            location: self.location(name_node),
            name: self.text(name_node).to_string(),
            scope: owner.scope.name.clone(),
            params,
            return_types,
            visibility: self.visibility(node),
            is_static: node.has_child_of_kind("static_modifier"),
            modifier,
            is_magic: false,
            description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
            deprecated: doc.and_then(|d| d.deprecated),
        });

        if let Some(body) = node.child_by_field("body") {
            self.visit_children(body, &inner);
        }
    }

    /// A method outside any named class-like (anonymous classes): its body
    /// is analysed but nothing is declared.
    fn detached_method(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let table = self.new_table(node, ctx.table, false);
        let inner = TraversalContext { table, owner: None };
        self.parameters(node, None, &inner);
        if let Some(body) = node.child_by_field("body") {
            self.visit_children(body, &inner);
        }
    }

    fn properties(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let Some(owner) = ctx.owner.clone() else {
            return;
        };
        let doc = self.leading_doc(node);
        let visibility = self.visibility(node);
        let is_static = node.has_child_of_kind("static_modifier");
        let hinted = node
            .child_by_field("type")
            .map(|hint| self.type_hint(hint, ctx))
            .unwrap_or_default();

        for element in node.named_children().into_iter().filter(|c| c.is("property_element")) {
            let Some(variable) = element
                .child_by_field("name")
                .or_else(|| element.first_child_of_kind(&["variable_name"]))
            else {
                continue;
            };
            let name = self.text(variable).to_string();
            let mut types = hinted.clone();
            if let Some(var) = doc.as_ref().and_then(|d| d.var_for(&name)) {
                types.merge(&self.resolve_types(&var.types, ctx));
            }
            let default = element.child_by_field("default_value").or_else(|| {
                element
                    .first_child_of_kind(&["property_initializer"])
                    .and_then(|init| init.named_children().first().copied())
            });
            if let Some(default) = default {
                if types.is_empty() {
                    if let Some(literal) = literal_type(default.kind()) {
                        types.add(TypeRef::new(literal));
                    }
                }
                self.expression(default, ctx);
            }

            self.document.properties.push(Property {
                location: self.location(variable),
                name,
                scope: owner.scope.name.clone(),
                visibility,
                is_static,
                types,
                access: PropertyAccess::ReadWrite,
                is_magic: false,
                description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
                deprecated: doc.as_ref().and_then(|d| d.deprecated.clone()),
            });
        }
    }

    fn class_constants(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let Some(owner) = ctx.owner.clone() else {
            return;
        };
        let doc = self.leading_doc(node);
        let visibility = self.visibility(node);
        for (name_node, value) in const_elements(node) {
            let types = self.constant_types(value, doc.as_ref(), ctx);
            self.document.class_consts.push(ClassConst {
                location: self.location(name_node),
                name: self.text(name_node).to_string(),
                scope: owner.scope.name.clone(),
                visibility,
                types,
                value: value.map(|v| self.text(v).to_string()).unwrap_or_default(),
                description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
                deprecated: doc.as_ref().and_then(|d| d.deprecated.clone()),
            });
        }
    }

    fn constant_types(
        &mut self,
        value: Option<SyntaxNode<'_>>,
        doc: Option<&PhpDoc>,
        ctx: &TraversalContext,
    ) -> TypeSet {
        let mut types = TypeSet::new();
        if let Some(var) = doc.and_then(|d| d.vars.first()) {
            types.merge(&self.resolve_types(&var.types, ctx));
        }
        if let Some(value) = value {
            if let Some(id) = self.expression(value, ctx) {
                types.merge(&self.document.node(id).declared_types());
            }
        }
        types
    }

    // Functions and parameters

    fn function(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let Some(name_node) = node.child_by_field("name") else {
            return;
        };
        let short = self.text(name_node);
        let doc = self.leading_doc(node);
        let table = self.new_table(node, ctx.table, false);
        let inner = ctx.with_table(table);

        let params = self.parameters(node, doc.as_ref(), &inner);
        let mut return_types = node
            .child_by_field("return_type")
            .map(|hint| self.type_hint(hint, &inner))
            .unwrap_or_default();
        if let Some(returns) = doc.as_ref().and_then(|d| d.returns.as_ref()) {
            return_types.merge(&self.resolve_types(&returns.types, &inner));
        }

        self.document.functions.push(Function {
            location: self.location(name_node),
            name: TypeRef::with_fqn(short, qualify(self.imports().namespace(), short)),
            params,
            return_types,
            description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
            deprecated: doc.and_then(|d| d.deprecated),
        });

        if let Some(body) = node.child_by_field("body") {
            self.visit_children(body, &inner);
        }
    }

    fn bind(&mut self, table: usize, variable: Variable, is_declaration: bool) {
        self.document.variable_tables[table].add(variable, is_declaration);
    }

    fn narrow(&mut self, table: usize, variable: Variable) {
        self.document.variable_tables[table].add_narrowing(variable);
    }

    fn new_table(&mut self, node: SyntaxNode<'_>, parent: usize, inherits_parent: bool) -> usize {
        self.document.variable_tables.push(VariableTable::new(
            node.start_byte(),
            node.end_byte(),
            Some(parent),
            inherits_parent,
        ));
        self.document.variable_tables.len() - 1
    }

    /// Declares the parameters of `callable` in `ctx.table`.
    fn parameters(
        &mut self,
        callable: SyntaxNode<'_>,
        doc: Option<&PhpDoc>,
        ctx: &TraversalContext,
    ) -> Vec<Parameter> {
        let Some(list) = callable.child_by_field("parameters") else {
            return Vec::new();
        };
        let mut params = Vec::new();
        for param in list.named_children() {
            if !matches!(
                param.kind(),
                "simple_parameter" | "variadic_parameter" | "property_promotion_parameter"
            ) {
                continue;
            }
            let Some(name_node) = param.child_by_field("name") else {
                continue;
            };
            let name = self.text(name_node).to_string();
            let mut types = param
                .child_by_field("type")
                .map(|hint| self.type_hint(hint, ctx))
                .unwrap_or_default();
            let tag = doc.and_then(|d| d.param(&name));
            if let Some(tag) = tag {
                types.merge(&self.resolve_types(&tag.types, ctx));
            }
            let is_variadic = param.is("variadic_parameter");
            let default = param.child_by_field("default_value");
            if let Some(default) = default {
                self.expression(default, ctx);
            }

            let bound: TypeSet = if is_variadic {
                types.iter().map(TypeRef::to_array).collect()
            } else {
                types.clone()
            };
            let location = self.location(name_node);
            self.bind(
                ctx.table,
                Variable::declaration(
                    name.as_str(),
                    location.clone(),
                    param.end_byte(),
                    BindingKind::Parameter,
                )
                .with_types(bound.clone()),
                true,
            );
            let kind = ExprKind::Variable { table: ctx.table };
            let mut variable = self.node(kind, name.as_str(), name_node, ctx);
            variable.added_types = bound;
            self.add_node(variable);

            if param.is("property_promotion_parameter") {
                if let Some(owner) = ctx.owner.as_ref() {
                    self.document.properties.push(Property {
                        location,
                        name: name.clone(),
                        scope: owner.scope.name.clone(),
                        visibility: self.visibility(param),
                        is_static: false,
                        types: types.clone(),
                        access: PropertyAccess::ReadWrite,
                        is_magic: false,
                        description: tag.map(|t| t.description.clone()).unwrap_or_default(),
                        deprecated: None,
                    });
                }
            }

            params.push(Parameter {
                name,
                types,
                has_default: default.is_some(),
                is_variadic,
                by_reference: param.has_child_of_kind("reference_modifier"),
                description: tag.map(|t| t.description.clone()).unwrap_or_default(),
            });
        }
        params
    }

    // Constants and globals

    /// Top-level `const` statement.
    fn constants(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let doc = self.leading_doc(node);
        for (name_node, value) in const_elements(node) {
            let short = self.text(name_node);
            let types = self.constant_types(value, doc.as_ref(), ctx);
            self.document.consts.push(Const {
                location: self.location(name_node),
                name: TypeRef::with_fqn(short, qualify(self.imports().namespace(), short)),
                kind: ConstKind::Const,
                types,
                value: value.map(|v| self.text(v).to_string()).unwrap_or_default(),
                description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
                deprecated: doc.as_ref().and_then(|d| d.deprecated.clone()),
            });
        }
    }

    /// `define('NAME', value)`.
    fn define(&mut self, call: SyntaxNode<'_>, arguments: SyntaxNode<'_>) {
        let values: Vec<SyntaxNode<'_>> = arguments
            .named_children()
            .into_iter()
            .filter(|a| a.is("argument"))
            .filter_map(|a| a.named_children().last().copied())
            .collect();
        let Some(name_node) = values
            .first()
            .filter(|n| matches!(n.kind(), "string" | "encapsed_string"))
        else {
            return;
        };
        let name = self
            .text(*name_node)
            .trim_matches(|c| c == '\'' || c == '"')
            .to_string();
        if name.is_empty() {
            return;
        }
        let value = values.get(1).copied();
        let types = value
            .and_then(|v| literal_type(v.kind()))
            .map(|t| TypeSet::single(TypeRef::new(t)))
            .unwrap_or_default();
        let doc = self.statement_doc(call);

        self.document.consts.push(Const {
            location: self.location(*name_node),
            name: TypeRef::with_fqn(name.as_str(), absolute(&name)),
            kind: ConstKind::Define,
            types,
            value: value.map(|v| self.text(v).to_string()).unwrap_or_default(),
            description: doc.as_ref().map(|d| d.description.clone()).unwrap_or_default(),
            deprecated: doc.and_then(|d| d.deprecated),
        });
    }

    fn global_declaration(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let doc = self.leading_doc(node);
        for variable in node.named_children().into_iter().filter(|c| c.is("variable_name")) {
            let name = self.text(variable);
            let types = doc
                .as_ref()
                .and_then(|d| d.globals.iter().find(|g| g.name == name))
                .map(|g| self.resolve_types(&g.types, ctx))
                .unwrap_or_default();
            self.bind(
                ctx.table,
                Variable::declaration(
                    name,
                    self.location(variable),
                    variable.start_byte(),
                    BindingKind::Global,
                )
                .with_types(types),
                true,
            );
            let node = self.node(ExprKind::Variable { table: ctx.table }, name, variable, ctx);
            self.add_node(node);
        }
    }

    fn static_variable(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let Some(variable) = node.child_by_field("name") else {
            return;
        };
        let value = node
            .child_by_field("value")
            .and_then(|v| self.expression(v, ctx));
        self.declare_assigned(variable, node.end_byte(), value, None, ctx);
    }

    /// Inline `/** @var Type $name */` before a statement.
    fn doc_narrowing(&mut self, doc: &PhpDoc, statement: SyntaxNode<'_>, ctx: &TraversalContext) {
        for var in &doc.vars {
            let Some(name) = var.name.as_deref() else {
                continue;
            };
            let types = self.resolve_types(&var.types, ctx);
            let location = self.location(statement);
            self.narrow(
                ctx.table,
                Variable::declaration(
                    name,
                    location,
                    statement.start_byte(),
                    BindingKind::Narrowing,
                )
                .with_types(types),
            );
        }
    }

    // Variables

    /// Marks the binding of `name` visible at `position` as read, looking
    /// through arrow functions into the scope they capture.
    fn mark_read(&mut self, table: usize, name: &str, position: u32) {
        let mut current = Some(table);
        while let Some(index) = current {
            let table = &mut self.document.variable_tables[index];
            if table.mark_used(name, position) {
                return;
            }
            current = if table.inherits_parent() {
                table.parent()
            } else {
                None
            };
        }
    }

    fn variable_read(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> NodeId {
        let name = self.text(node);
        if name != "$this" {
            self.mark_read(ctx.table, name, node.start_byte());
        }
        let variable = self.node(ExprKind::Variable { table: ctx.table }, name, node, ctx);
        self.add_node(variable)
    }

    /// Declares the variable written by an assignment ending at `position`.
    fn declare_assigned(
        &mut self,
        variable: SyntaxNode<'_>,
        position: u32,
        value: Option<NodeId>,
        doc: Option<&PhpDoc>,
        ctx: &TraversalContext,
    ) -> NodeId {
        let name = self.text(variable);
        if name == "$this" {
            return self.variable_read(variable, ctx);
        }
        let annotated = doc
            .and_then(|d| d.var_for(name))
            .map(|var| self.resolve_types(&var.types, ctx))
            .unwrap_or_default();
        let location = self.location(variable);
        self.bind(
            ctx.table,
            Variable::declaration(name, location.clone(), position, BindingKind::Assignment)
                .with_types(annotated.clone())
                .with_expression(value),
            true,
        );

        if ctx.table == 0 {
            let mut types = annotated.clone();
            if let Some(value) = value {
                types.merge(&self.document.node(value).declared_types());
            }
            self.document.global_variables.push(GlobalVariable {
                location,
                name: name.to_string(),
                types,
                description: doc.map(|d| d.description.clone()).unwrap_or_default(),
            });
        }

        let mut node = self
            .node(ExprKind::Variable { table: ctx.table }, name, variable, ctx)
            .with_scope(value);
        node.added_types = annotated;
        self.add_node(node)
    }

    // Expressions

    fn expression(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> Option<NodeId> {
        match node.kind() {
            "variable_name" => Some(self.variable_read(node, ctx)),
            "assignment_expression" | "reference_assignment_expression" => {
                self.assignment(node, ctx)
            }
            "augmented_assignment_expression" => {
                if let Some(left) = node.child_by_field("left") {
                    self.expression(left, ctx);
                }
                if let Some(right) = node.child_by_field("right") {
                    self.expression(right, ctx);
                }
                let concatenation = node
                    .child_by_field("operator")
                    .is_some_and(|op| self.text(op) == ".=");
                concatenation.then(|| self.literal(node, "string", ctx))
            }
            "member_call_expression" | "nullsafe_member_call_expression" => {
                self.member_access(node, ExprKind::MethodAccess, ctx)
            }
            "member_access_expression" | "nullsafe_member_access_expression" => {
                self.member_access(node, ExprKind::PropertyAccess, ctx)
            }
            "scoped_call_expression" => self.scoped_access(node, ExprKind::ScopedMethodAccess, ctx),
            "scoped_property_access_expression" => {
                self.scoped_access(node, ExprKind::ScopedPropertyAccess, ctx)
            }
            "class_constant_access_expression" => self.class_constant_access(node, ctx),
            "function_call_expression" => self.function_call(node, ctx),
            "object_creation_expression" => self.object_creation(node, ctx),
            "binary_expression" => self.binary(node, ctx),
            "conditional_expression" => self.conditional(node, ctx),
            "parenthesized_expression" => self.wrapper(node, ExprKind::Parenthesised, ctx),
            "clone_expression" => self.wrapper(node, ExprKind::Encapsulated, ctx),
            "anonymous_function" | "anonymous_function_creation_expression" => {
                Some(self.closure(node, ctx))
            }
            "arrow_function" => Some(self.arrow_function(node, ctx)),
            "cast_expression" => {
                if let Some(value) = node.child_by_field("value") {
                    self.expression(value, ctx);
                }
                let cast = node
                    .child_by_field("type")
                    .and_then(|t| cast_type(&self.text(t).to_lowercase()));
                cast.map(|t| self.literal(node, t, ctx))
            }
            "name" | "qualified_name" => Some(self.constant_access(node, ctx)),
            kind => match literal_type(kind) {
                Some(literal) => {
                    if matches!(kind, "encapsed_string" | "heredoc" | "array_creation_expression") {
                        self.visit_children(node, ctx);
                    }
                    Some(self.literal(node, literal, ctx))
                }
                None => {
                    self.visit_children(node, ctx);
                    None
                }
            },
        }
    }

    fn literal(&mut self, node: SyntaxNode<'_>, type_name: &str, ctx: &TraversalContext) -> NodeId {
        let literal = self.node(
            ExprKind::Literal {
                types: TypeSet::single(TypeRef::new(type_name)),
            },
            type_name,
            node,
            ctx,
        );
        self.add_node(literal)
    }

    fn wrapper(
        &mut self,
        node: SyntaxNode<'_>,
        kind: ExprKind,
        ctx: &TraversalContext,
    ) -> Option<NodeId> {
        let inner = node
            .named_children()
            .first()
            .and_then(|inner| self.expression(*inner, ctx));
        let wrapper = self.node(kind, "", node, ctx).with_scope(inner);
        Some(self.add_node(wrapper))
    }

    fn assignment(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> Option<NodeId> {
        let value = node
            .child_by_field("right")
            .and_then(|right| self.expression(right, ctx));
        let left = node.child_by_field("left")?;
        let doc = self.statement_doc(node);

        match left.kind() {
            "variable_name" => {
                self.declare_assigned(left, node.end_byte(), value, doc.as_ref(), ctx);
            }
            "list_literal" | "array_creation_expression" => {
                for variable in variable_names(left) {
                    self.declare_assigned(variable, node.end_byte(), None, doc.as_ref(), ctx);
                }
            }
            _ => {
                self.expression(left, ctx);
            }
        }
        value
    }

    fn member_access(
        &mut self,
        node: SyntaxNode<'_>,
        kind: ExprKind,
        ctx: &TraversalContext,
    ) -> Option<NodeId> {
        let receiver = node
            .child_by_field("object")
            .and_then(|object| self.expression(object, ctx));
        let id = match node.child_by_field("name") {
            Some(name) if name.is("name") => {
                let access = self.node(kind, self.text(name), name, ctx).with_scope(receiver);
                Some(self.add_node(access))
            }
            Some(dynamic) => {
                self.expression(dynamic, ctx);
                None
            }
            None => None,
        };
        if let Some(arguments) = node.child_by_field("arguments") {
            self.visit(arguments, ctx);
        }
        id
    }

    fn scoped_access(
        &mut self,
        node: SyntaxNode<'_>,
        kind: ExprKind,
        ctx: &TraversalContext,
    ) -> Option<NodeId> {
        let scope = node
            .child_by_field("scope")
            .and_then(|scope| self.scope_expression(scope, ctx));
        let id = match node.child_by_field("name") {
            Some(name) if name.is("name") || name.is("variable_name") => {
                let access = self.node(kind, self.text(name), name, ctx).with_scope(scope);
                Some(self.add_node(access))
            }
            Some(dynamic) => {
                self.expression(dynamic, ctx);
                None
            }
            None => None,
        };
        if let Some(arguments) = node.child_by_field("arguments") {
            self.visit(arguments, ctx);
        }
        id
    }

    fn class_constant_access(
        &mut self,
        node: SyntaxNode<'_>,
        ctx: &TraversalContext,
    ) -> Option<NodeId> {
        let parts = node.named_children();
        let (Some(scope), Some(name)) = (parts.first().copied(), parts.last().copied()) else {
            return None;
        };
        if parts.len() < 2 {
            self.expression(scope, ctx);
            return None;
        }
        let scope = self.scope_expression(scope, ctx);
        let access = self
            .node(ExprKind::ScopedConstantAccess, self.text(name), name, ctx)
            .with_scope(scope);
        Some(self.add_node(access))
    }

    /// Left-hand side of `::`.
    fn scope_expression(
        &mut self,
        scope: SyntaxNode<'_>,
        ctx: &TraversalContext,
    ) -> Option<NodeId> {
        match scope.kind() {
            "relative_scope" | "name" | "qualified_name" => {
                let text = self.text(scope);
                let node = match RelativeScope::from_keyword(text) {
                    Some(relative) => {
                        self.node(ExprKind::RelativeScope(relative), text, scope, ctx)
                    }
                    None => self.node(
                        ExprKind::ClassAccess {
                            class: self.resolve_class(text),
                            role: ClassRole::Class,
                        },
                        text,
                        scope,
                        ctx,
                    ),
                };
                Some(self.add_node(node))
            }
            _ => self.expression(scope, ctx),
        }
    }

    fn constant_access(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> NodeId {
        let name = self.text(node);
        let constant = match name.to_lowercase().as_str() {
            "true" | "false" => return self.literal(node, "bool", ctx),
            "null" => return self.literal(node, "null", ctx),
            _ => self.node(
                ExprKind::ConstantAccess {
                    candidates: self.imports().const_reference_fqn(name),
                },
                name,
                node,
                ctx,
            ),
        };
        self.add_node(constant)
    }

    fn function_call(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> Option<NodeId> {
        let arguments = node.child_by_field("arguments");
        let id = match node.child_by_field("function") {
            Some(function) if function.is("name") || function.is("qualified_name") => {
                let name = self.text(function);
                if name.eq_ignore_ascii_case("define") {
                    if let Some(arguments) = arguments {
                        self.define(node, arguments);
                    }
                }
                let call = self.node(
                    ExprKind::FunctionCall {
                        candidates: self.imports().function_reference_fqn(name),
                    },
                    name,
                    function,
                    ctx,
                );
                Some(self.add_node(call))
            }
            Some(callable) => {
                self.expression(callable, ctx);
                None
            }
            None => None,
        };
        if let Some(arguments) = arguments {
            self.visit(arguments, ctx);
        }
        id
    }

    fn object_creation(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> Option<NodeId> {
        let designator = node
            .named_children()
            .into_iter()
            .find(|c| !matches!(c.kind(), "arguments" | "attribute_list"));

        let created = match designator {
            Some(class) if matches!(class.kind(), "name" | "qualified_name" | "relative_scope") => {
                let text = self.text(class);
                match RelativeScope::from_keyword(text) {
                    Some(relative) => {
                        let scope = self.node(ExprKind::RelativeScope(relative), text, class, ctx);
                        let scope = self.add_node(scope);
                        self.node(ExprKind::ClassTypeDesignator { class: None }, text, class, ctx)
                            .with_scope(Some(scope))
                    }
                    None => self.node(
                        ExprKind::ClassTypeDesignator {
                            class: Some(self.resolve_class(text)),
                        },
                        text,
                        class,
                        ctx,
                    ),
                }
            }
            Some(anonymous)
                if matches!(anonymous.kind(), "anonymous_class" | "declaration_list") =>
            {
                let container = if anonymous.is("anonymous_class") {
                    anonymous
                } else {
                    node
                };
                self.anonymous_class(container, ctx);
                self.node(ExprKind::ClassTypeDesignator { class: None }, "class", anonymous, ctx)
            }
            Some(dynamic) => {
                let scope = self.expression(dynamic, ctx);
                self.node(ExprKind::ClassTypeDesignator { class: None }, "", dynamic, ctx)
                    .with_scope(scope)
            }
            None => return None,
        };
        let id = self.add_node(created);

        if let Some(arguments) = node.first_child_of_kind(&["arguments"]) {
            self.visit(arguments, ctx);
        }
        Some(id)
    }

    fn anonymous_class(&mut self, container: SyntaxNode<'_>, ctx: &TraversalContext) {
        self.class_names(container.first_child_of_kind(&["base_clause"]), ClassRole::Class, ctx);
        self.class_names(
            container.first_child_of_kind(&["class_interface_clause"]),
            ClassRole::Interface,
            ctx,
        );
        if container.is("anonymous_class") {
            if let Some(arguments) = container.first_child_of_kind(&["arguments"]) {
                self.visit(arguments, ctx);
            }
        }
        let Some(body) = container.first_child_of_kind(&["declaration_list"]) else {
            return;
        };
        let detached = TraversalContext {
            table: ctx.table,
            owner: None,
        };
        for member in body.named_children() {
            if member.is("method_declaration") {
                self.detached_method(member, &detached);
            }
        }
    }

    fn binary(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> Option<NodeId> {
        let operator = node
            .child_by_field("operator")
            .map(|op| self.text(op).to_lowercase())
            .unwrap_or_default();
        let left = node.child_by_field("left");
        let right = node.child_by_field("right");

        match operator.as_str() {
            "instanceof" => {
                self.instanceof(node, left, right, ctx);
                Some(self.literal(node, "bool", ctx))
            }
            "??" => {
                let branches: SmallVec<[NodeId; 2]> = [left, right]
                    .into_iter()
                    .flatten()
                    .filter_map(|side| self.expression(side, ctx))
                    .collect();
                let conditional = self.node(ExprKind::Conditional { branches }, "??", node, ctx);
                Some(self.add_node(conditional))
            }
            operator => {
                for side in [left, right].into_iter().flatten() {
                    self.expression(side, ctx);
                }
                binary_type(operator).map(|t| self.literal(node, t, ctx))
            }
        }
    }

    /// `$x instanceof Foo` narrows `$x` to include `Foo` from the end of the
    /// test onwards.
    fn instanceof(
        &mut self,
        node: SyntaxNode<'_>,
        left: Option<SyntaxNode<'_>>,
        right: Option<SyntaxNode<'_>>,
        ctx: &TraversalContext,
    ) {
        let subject = left.and_then(|l| self.expression(l, ctx));
        let class = match right {
            Some(class) if matches!(class.kind(), "name" | "qualified_name") => {
                match RelativeScope::from_keyword(self.text(class)) {
                    Some(_) => {
                        let types = self.hint_types(class, ctx);
                        types.iter().next().cloned()
                    }
                    None => Some(self.class_reference(class, ClassRole::Class, ctx)),
                }
            }
            Some(other) => {
                self.expression(other, ctx);
                None
            }
            None => None,
        };

        let (Some(subject), Some(class), Some(left)) = (subject, class, left) else {
            return;
        };
        if !left.is("variable_name") || self.document.node(subject).is_this() {
            return;
        }
        self.document.nodes[subject.index()].added_types.add(class.clone());

        let name = self.text(left);
        let prior = self
            .document
            .lookup_variable(ctx.table, name, left.start_byte())
            .map(|v| (v.types.clone(), v.expression));
        let (mut types, expression) = prior.unwrap_or_default();
        types.add(class);
        self.narrow(
            ctx.table,
            Variable::declaration(
                name,
                self.location(left),
                node.end_byte(),
                BindingKind::Narrowing,
            )
            .with_types(types)
            .with_expression(expression),
        );
    }

    fn conditional(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> Option<NodeId> {
        let condition = node
            .child_by_field("condition")
            .and_then(|c| self.expression(c, ctx));
        let body = match node.child_by_field("body") {
            Some(body) => self.expression(body, ctx),
            None => condition,
        };
        let alternative = node
            .child_by_field("alternative")
            .and_then(|a| self.expression(a, ctx));
        let branches: SmallVec<[NodeId; 2]> = [body, alternative].into_iter().flatten().collect();
        let conditional = self.node(ExprKind::Conditional { branches }, "?:", node, ctx);
        Some(self.add_node(conditional))
    }

    fn closure(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> NodeId {
        let table = self.new_table(node, ctx.table, false);
        let inner = ctx.with_table(table);
        let doc = self.statement_doc(node);
        self.parameters(node, doc.as_ref(), &inner);

        if let Some(uses) = node.first_child_of_kind(&["anonymous_function_use_clause"]) {
            for captured in variable_names(uses) {
                let name = self.text(captured);
                let prior = self
                    .document
                    .lookup_variable(ctx.table, name, node.start_byte())
                    .map(|v| (v.types.clone(), v.expression));
                self.variable_read(captured, ctx);
                let (types, expression) = prior.unwrap_or_default();
                self.bind(
                    table,
                    Variable::declaration(
                        name,
                        self.location(captured),
                        captured.end_byte(),
                        BindingKind::Captured,
                    )
                    .with_types(types)
                    .with_expression(expression),
                    true,
                );
            }
        }

        if let Some(hint) = node.child_by_field("return_type") {
            self.type_hint(hint, &inner);
        }
        if let Some(body) = node.child_by_field("body") {
            self.visit_children(body, &inner);
        }
        self.literal(node, "\\Closure", ctx)
    }

    fn arrow_function(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) -> NodeId {
        let table = self.new_table(node, ctx.table, true);
        let inner = ctx.with_table(table);
        self.parameters(node, None, &inner);
        if let Some(hint) = node.child_by_field("return_type") {
            self.type_hint(hint, &inner);
        }
        if let Some(body) = node.child_by_field("body") {
            self.expression(body, &inner);
        }
        self.literal(node, "\\Closure", ctx)
    }

    // Statements

    fn foreach(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let parts = node.named_children();
        let Some((collection, rest)) = parts.split_first() else {
            return;
        };
        let source = self.expression(*collection, ctx);
        let element = self
            .node(ExprKind::ForeachCollection, "", *collection, ctx)
            .with_scope(source);
        let element = self.add_node(element);
        let doc = self.leading_doc(node);

        let mut rest = rest.iter().copied();
        if let Some(target) = rest.next() {
            let (key, value) = if target.is("pair") {
                let pair = target.named_children();
                (pair.first().copied(), pair.last().copied())
            } else {
                (None, Some(target))
            };
            if let Some(key) = key.filter(|k| k.is("variable_name")) {
                self.foreach_variable(key, None, None, ctx);
            }
            if let Some(value) = value {
                self.foreach_value(value, element, doc.as_ref(), ctx);
            }
        }
        for statement in rest {
            self.visit(statement, ctx);
        }
    }

    fn foreach_value(
        &mut self,
        value: SyntaxNode<'_>,
        element: NodeId,
        doc: Option<&PhpDoc>,
        ctx: &TraversalContext,
    ) {
        match value.kind() {
            "variable_name" => self.foreach_variable(value, Some(element), doc, ctx),
            "by_ref" => {
                if let Some(variable) = value.first_child_of_kind(&["variable_name"]) {
                    self.foreach_variable(variable, Some(element), doc, ctx);
                }
            }
            "list_literal" | "array_creation_expression" => {
                for variable in variable_names(value) {
                    self.foreach_variable(variable, None, None, ctx);
                }
            }
            _ => {
                self.expression(value, ctx);
            }
        }
    }

    /// Loop variables are bound from the end of their own span.
    fn foreach_variable(
        &mut self,
        variable: SyntaxNode<'_>,
        element: Option<NodeId>,
        doc: Option<&PhpDoc>,
        ctx: &TraversalContext,
    ) {
        let name = self.text(variable);
        let annotated = doc
            .and_then(|d| d.var_for(name))
            .map(|var| self.resolve_types(&var.types, ctx))
            .unwrap_or_default();
        self.bind(
            ctx.table,
            Variable::declaration(
                name,
                self.location(variable),
                variable.end_byte(),
                BindingKind::Foreach,
            )
            .with_types(annotated.clone())
            .with_expression(element),
            true,
        );
        let mut node = self
            .node(ExprKind::Variable { table: ctx.table }, name, variable, ctx)
            .with_scope(element);
        node.added_types = annotated;
        self.add_node(node);
    }

    fn catch_clause(&mut self, node: SyntaxNode<'_>, ctx: &TraversalContext) {
        let mut types = TypeSet::new();
        if let Some(list) = node.child_by_field("type") {
            let names = if list.is("type_list") {
                list.named_children()
            } else {
                vec![list]
            };
            for name in names {
                let name = if name.is("named_type") {
                    name.named_children().first().copied().unwrap_or(name)
                } else {
                    name
                };
                if matches!(name.kind(), "name" | "qualified_name") {
                    types.add(self.class_reference(name, ClassRole::Class, ctx));
                }
            }
        }

        if let Some(variable) = node.child_by_field("name") {
            let name = self.text(variable);
            self.bind(
                ctx.table,
                Variable::declaration(
                    name,
                    self.location(variable),
                    variable.end_byte(),
                    BindingKind::Catch,
                )
                .with_types(types.clone()),
                true,
            );
            let kind = ExprKind::Variable { table: ctx.table };
            let mut caught = self.node(kind, name, variable, ctx);
            caught.added_types = types;
            self.add_node(caught);
        }

        if let Some(body) = node.child_by_field("body") {
            self.visit(body, ctx);
        }
    }
}

/// `(name, value)` pairs of a `const` statement.
fn const_elements<'t>(node: SyntaxNode<'t>) -> Vec<(SyntaxNode<'t>, Option<SyntaxNode<'t>>)> {
    node.named_children()
        .into_iter()
        .filter(|c| c.is("const_element"))
        .filter_map(|element| {
            let parts = element.named_children();
            let name = parts.first().copied().filter(|n| n.is("name"))?;
            let value = element.child_by_field("value").or_else(|| parts.get(1).copied());
            Some((name, value))
        })
        .collect()
}

/// Every `$variable` below `node`, in source order.
fn variable_names<'t>(node: SyntaxNode<'t>) -> Vec<SyntaxNode<'t>> {
    let mut found = Vec::new();
    for child in node.named_children() {
        if child.is("variable_name") {
            found.push(child);
        } else {
            found.extend(variable_names(child));
        }
    }
    found
}

fn is_expression(kind: &str) -> bool {
    matches!(
        kind,
        "variable_name"
            | "assignment_expression"
            | "reference_assignment_expression"
            | "augmented_assignment_expression"
            | "member_call_expression"
            | "nullsafe_member_call_expression"
            | "member_access_expression"
            | "nullsafe_member_access_expression"
            | "scoped_call_expression"
            | "scoped_property_access_expression"
            | "class_constant_access_expression"
            | "function_call_expression"
            | "object_creation_expression"
            | "binary_expression"
            | "conditional_expression"
            | "parenthesized_expression"
            | "clone_expression"
            | "anonymous_function"
            | "anonymous_function_creation_expression"
            | "arrow_function"
            | "cast_expression"
            | "name"
            | "qualified_name"
    ) || literal_type(kind).is_some()
}

fn literal_type(kind: &str) -> Option<&'static str> {
    match kind {
        "string" | "encapsed_string" | "heredoc" | "nowdoc" | "shell_command_expression" => {
            Some("string")
        }
        "integer" => Some("int"),
        "float" => Some("float"),
        "boolean" => Some("bool"),
        "null" => Some("null"),
        "array_creation_expression" => Some("array"),
        _ => None,
    }
}

fn cast_type(cast: &str) -> Option<&'static str> {
    match cast {
        "int" | "integer" => Some("int"),
        "bool" | "boolean" => Some("bool"),
        "float" | "double" | "real" => Some("float"),
        "string" | "binary" => Some("string"),
        "array" => Some("array"),
        "object" => Some("object"),
        "unset" => Some("null"),
        _ => None,
    }
}

fn binary_type(operator: &str) -> Option<&'static str> {
    match operator {
        "." => Some("string"),
        "==" | "===" | "!=" | "!==" | "<>" | "<" | ">" | "<=" | ">=" | "&&" | "||" | "and"
        | "or" | "xor" => Some("bool"),
        _ => None,
    }
}

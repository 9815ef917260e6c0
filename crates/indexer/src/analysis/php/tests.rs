use std::sync::Arc;

use database::testing::CountingEngine;
use database::{Collection, SymbolStore};
use tracing_test::traced_test;

use super::document::Document;
use super::expression_resolver::ExpressionResolver;
use super::inheritance::InheritanceEngine;
use super::session::{CompletionKind, Declaration, QuerySession};
use super::symbols::{Class, MemberKind};
use super::types::TypeSet;
use crate::analysis::types::Severity;

fn index(sources: &[(&str, &str)]) -> (SymbolStore, Vec<Document>) {
    let store = SymbolStore::in_memory();
    let documents = sources
        .iter()
        .map(|(uri, text)| {
            let document = Document::parse(*uri, *text).unwrap();
            document.sync(&store).unwrap();
            document
        })
        .collect();
    (store, documents)
}

fn last_offset(document: &Document, needle: &str) -> u32 {
    document.text().rfind(needle).unwrap() as u32
}

fn fqns(types: &TypeSet) -> Vec<String> {
    types.iter().map(|t| t.fqn().to_string()).collect()
}

fn type_at(store: &SymbolStore, document: &Document, offset: u32) -> TypeSet {
    QuerySession::new(ExpressionResolver::new(document, store))
        .type_at(offset)
        .unwrap()
        .unwrap()
}

#[test]
#[traced_test]
fn test_inherited_method_return_type() {
    let (store, documents) = index(&[(
        "file:///a.php",
        "<?php\nclass A { public function f(): B {} }\nclass C extends A {}\n$v = new C();\n$v->f();\n",
    )]);
    let document = &documents[0];

    let types = type_at(&store, document, last_offset(document, "f()"));
    assert_eq!(fqns(&types), vec!["\\B"]);
    assert!(logs_contain("Syncing document"));

    let search = InheritanceEngine::new(&store)
        .search("\\C", "f", MemberKind::Method)
        .unwrap();
    assert_eq!(search.members.len(), 1);
    assert_eq!(search.members[0].scope().fqn(), "\\A");
}

#[test]
fn test_instanceof_narrows_variable() {
    let (store, documents) = index(&[(
        "file:///narrow.php",
        "<?php\nclass Foo { public function bar(): Baz {} }\nfunction test($x) {\n    if ($x instanceof Foo) {\n        $x->bar();\n    }\n}\n",
    )]);
    let document = &documents[0];

    let types = type_at(&store, document, last_offset(document, "bar()"));
    assert_eq!(fqns(&types), vec!["\\Baz"]);
}

#[test]
fn test_namespace_and_aliased_import() {
    let (_, documents) = index(&[(
        "file:///user.php",
        "<?php\nnamespace App\\Models;\n\nuse App\\Support\\Collection as Coll;\n\nclass User {\n    /** @return Coll */\n    public function items() {}\n}\n",
    )]);
    let document = &documents[0];

    assert_eq!(document.classes()[0].name.fqn(), "\\App\\Models\\User");
    let method = &document.methods()[0];
    assert_eq!(method.scope.fqn(), "\\App\\Models\\User");
    assert!(method.return_types.contains("\\App\\Support\\Collection"));
}

#[test]
fn test_private_property_through_this() {
    let (store, documents) = index(&[(
        "file:///repo.php",
        "<?php\nclass Repo {\n    /** @var Conn */\n    private $conn;\n    public function run() {\n        return $this->conn->query();\n    }\n}\nclass Conn { public function query(): Result {} }\n",
    )]);
    let document = &documents[0];

    let conn = type_at(&store, document, last_offset(document, "conn->"));
    assert_eq!(fqns(&conn), vec!["\\Conn"]);
    let result = type_at(&store, document, last_offset(document, "query()"));
    assert_eq!(fqns(&result), vec!["\\Result"]);
}

#[test]
fn test_private_property_hidden_outside_class() {
    let (store, documents) = index(&[(
        "file:///hidden.php",
        "<?php\nclass Box { private Item $item; }\n$box = new Box();\n$box->item;\n",
    )]);
    let document = &documents[0];

    let types = type_at(&store, document, last_offset(document, "item;"));
    assert!(types.is_empty());
}

#[test]
fn test_static_return_binds_to_receiver() {
    let (store, documents) = index(&[(
        "file:///static.php",
        "<?php\nclass Base { public static function make(): static {} }\nclass Child extends Base {}\n$c = Child::make();\n$c;\n",
    )]);
    let document = &documents[0];

    let types = type_at(&store, document, last_offset(document, "$c;"));
    assert_eq!(fqns(&types), vec!["\\Child"]);
}

#[test]
fn test_parent_call_resolves_in_base() {
    let (store, documents) = index(&[(
        "file:///parent.php",
        "<?php\nclass Base { protected function build(): Part {} }\nclass Derived extends Base {\n    public function build(): Part { return parent::build(); }\n}\n",
    )]);
    let document = &documents[0];

    let types = type_at(&store, document, last_offset(document, "build()"));
    assert!(types.contains("\\Part"));
}

#[test]
fn test_trait_methods_are_inherited() {
    let (store, documents) = index(&[(
        "file:///trait.php",
        "<?php\ntrait Greets { public function greet(): Greeting {} }\nclass Person { use Greets; }\n$p = new Person();\n$p->greet();\n",
    )]);
    let document = &documents[0];

    let types = type_at(&store, document, last_offset(document, "greet()"));
    assert_eq!(fqns(&types), vec!["\\Greeting"]);
}

#[test]
fn test_foreach_over_documented_array() {
    let (store, documents) = index(&[(
        "file:///loop.php",
        "<?php\n/** @param Item[] $items */\nfunction walk(array $items) {\n    foreach ($items as $item) {\n        $item->name();\n    }\n}\nclass Item { public function name(): string {} }\n",
    )]);
    let document = &documents[0];

    let item = type_at(&store, document, last_offset(document, "$item->"));
    assert_eq!(fqns(&item), vec!["\\Item"]);
    let name = type_at(&store, document, last_offset(document, "name()"));
    assert_eq!(fqns(&name), vec!["string"]);

    let collection = type_at(&store, document, last_offset(document, "$items as"));
    assert!(collection.contains("\\Item[]"));
    assert!(!collection.contains("\\Item"));
}

#[test]
fn test_multibyte_class_names_parse() {
    let (store, documents) = index(&[(
        "file:///unicode.php",
        "<?php\nclass aÄÄÄÄÄ { public function größe(): int {} }\n$x = new aÄÄÄÄÄ();\n$x->größe();\n",
    )]);
    let document = &documents[0];

    assert_eq!(document.classes()[0].name.fqn(), "\\aÄÄÄÄÄ");
    let types = type_at(&store, document, last_offset(document, "größe()"));
    assert_eq!(fqns(&types), vec!["int"]);
}

#[test]
fn test_global_variable_from_another_scope() {
    let (store, documents) = index(&[(
        "file:///globals.php",
        "<?php\n$config = new Config();\nfunction f() {\n    global $config;\n    $config->x();\n}\nclass Config { public function x(): int {} }\n",
    )]);
    let document = &documents[0];

    assert_eq!(document.global_variables().len(), 1);
    let types = type_at(&store, document, last_offset(document, "x()"));
    assert_eq!(fqns(&types), vec!["int"]);
}

#[test]
fn test_resolution_is_memoized() {
    let engine = Arc::new(CountingEngine::new());
    let store = SymbolStore::new(engine.clone());
    let document = Document::parse(
        "file:///memo.php",
        "<?php\nclass A { public function f(): B {} }\nclass C extends A {}\n$v = new C();\n$v->f();\n",
    )
    .unwrap();
    document.sync(&store).unwrap();

    let resolver = ExpressionResolver::new(&document, &store);
    let id = document.node_at(last_offset(&document, "f()")).unwrap();
    let first = resolver.resolve(id).unwrap();
    assert!(engine.reads() > 0);

    engine.reset();
    let second = resolver.resolve(id).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.reads(), 0);
}

#[test]
fn test_sync_replaces_previous_declarations() {
    let store = SymbolStore::in_memory();
    let old = Document::parse("file:///rename.php", "<?php\nclass Old {}\n").unwrap();
    old.sync(&store).unwrap();
    let renamed = Document::parse("file:///rename.php", "<?php\nclass Renamed {}\n").unwrap();
    renamed.sync(&store).unwrap();

    let old_classes: Vec<Class> = store.get_exact(Collection::Class, "\\Old").unwrap();
    let new_classes: Vec<Class> = store.get_exact(Collection::Class, "\\Renamed").unwrap();
    assert!(old_classes.is_empty());
    assert_eq!(new_classes.len(), 1);
}

#[test]
fn test_unused_variables_are_reported() {
    let (store, documents) = index(&[(
        "file:///unused.php",
        "<?php\nfunction f($param) {\n    $unused = 1;\n    $used = 2;\n    return $used;\n}\n",
    )]);
    let session = QuerySession::new(ExpressionResolver::new(&documents[0], &store));

    let diagnostics = session.unused_variables();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Hint);
    assert!(diagnostics[0].message.contains("$unused"));
}

#[test]
fn test_deprecated_function_usage() {
    let (store, documents) = index(&[(
        "file:///deprecated.php",
        "<?php\n/** @deprecated use newer() */\nfunction older() {}\nolder();\n",
    )]);
    let session = QuerySession::new(ExpressionResolver::new(&documents[0], &store));

    let diagnostics = session.deprecated_usages().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert_eq!(diagnostics[0].message, "older is deprecated: use newer()");
}

#[test]
fn test_syntax_errors_become_diagnostics() {
    let (_, documents) = index(&[("file:///broken.php", "<?php\n$x = ;\n")]);
    let diagnostics = documents[0].diagnostics();
    assert!(!diagnostics.is_empty());
    assert!(diagnostics.iter().all(|d| d.severity == Severity::Error));
}

#[test]
fn test_member_completion_respects_visibility() {
    let (store, documents) = index(&[(
        "file:///complete.php",
        "<?php\nclass P {\n    public $a;\n    protected $b;\n    public function go() {}\n    private function gone() {}\n}\n$p = new P();\n$p->g;\n",
    )]);
    let document = &documents[0];
    let session = QuerySession::new(ExpressionResolver::new(document, &store));

    let items = session.complete_members(last_offset(document, "g;")).unwrap();
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["go"]);
    assert_eq!(items[0].kind, CompletionKind::Method);
    assert_eq!(items[0].insert_text.as_deref(), Some("go()"));
}

#[test]
fn test_variable_completion() {
    let (store, documents) = index(&[(
        "file:///vars.php",
        "<?php\nfunction f($alpha) {\n    $beta = 1;\n    $al;\n}\n",
    )]);
    let document = &documents[0];
    let session = QuerySession::new(ExpressionResolver::new(document, &store));

    let items = session.complete_variables(last_offset(document, "$al;"), "$a");
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["$alpha"]);
}

#[test]
fn test_class_completion_adds_import() {
    let (store, documents) = index(&[
        ("file:///lib.php", "<?php\nnamespace Lib;\nclass Widget {}\n"),
        ("file:///app.php", "<?php\nnamespace App;\n\n$w = null;\n"),
    ]);
    let app = &documents[1];
    let session = QuerySession::new(ExpressionResolver::new(app, &store));

    let items = session.complete_classes(last_offset(app, "$w"), "Wid").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "Widget");
    assert_eq!(items[0].insert_text.as_deref(), Some("Widget"));
    let edit = items[0].additional_edit.as_ref().unwrap();
    assert_eq!(edit.new_text, "use Lib\\Widget;\n");
}

#[test]
fn test_definition_and_hover_of_class() {
    let (store, documents) = index(&[(
        "file:///def.php",
        "<?php\nclass C {}\n$v = new C();\n",
    )]);
    let document = &documents[0];
    let session = QuerySession::new(ExpressionResolver::new(document, &store));
    let offset = last_offset(document, "C()");

    let locations = session.definition(offset).unwrap();
    assert_eq!(locations.len(), 1);
    let range = locations[0].range;
    assert_eq!(&document.text()[range.start_byte as usize..range.end_byte as usize], "C");

    let hover = session.hover(offset).unwrap().unwrap();
    assert_eq!(hover.kind, "class");
    assert!(matches!(hover.declarations[0], Declaration::Class(_)));
}

#[test]
fn test_references_across_documents() {
    let (store, documents) = index(&[
        ("file:///lib.php", "<?php\nnamespace Lib;\nclass Widget {}\n"),
        ("file:///one.php", "<?php\nuse Lib\\Widget;\n$a = new Widget();\n"),
        ("file:///two.php", "<?php\nfunction make(\\Lib\\Widget $w) {}\n"),
    ]);
    let one = &documents[1];
    let session = QuerySession::new(ExpressionResolver::new(one, &store));

    let references = session.references(last_offset(one, "Widget()")).unwrap();
    let uris: Vec<&str> = references.iter().map(|l| l.uri.as_str()).collect();
    assert_eq!(uris, vec!["file:///one.php", "file:///two.php"]);
}

#[test]
fn test_magic_members_from_class_docblock() {
    let (store, documents) = index(&[(
        "file:///magic.php",
        "<?php\n/**\n * @property-read Address $address\n * @method static Query where(string $column)\n */\nclass Model {}\n$m = new Model();\n$m->address;\nModel::where('a');\n",
    )]);
    let document = &documents[0];

    assert!(document.properties().iter().any(|p| p.name == "$address" && p.is_magic));
    let address = type_at(&store, document, last_offset(document, "address;"));
    assert_eq!(fqns(&address), vec!["\\Address"]);
    let query = type_at(&store, document, last_offset(document, "where("));
    assert_eq!(fqns(&query), vec!["\\Query"]);
}

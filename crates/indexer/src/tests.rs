use crate::analysis::php::{Document, ExpressionResolver, QuerySession};
use crate::analysis::types::Severity;
use crate::execution::config::IndexingConfigBuilder;
use crate::runner::run_workspace_indexer;
use database::{Collection, SymbolStore};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing_test::traced_test;

/// Lays out a small PHP project with a vendored dependency and a non-PHP file.
fn create_test_workspace() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let root = temp_dir.path();

    write(
        root,
        "src/Model/User.php",
        r#"<?php
namespace App\Model;

class User
{
    /** @var string */
    public $name;

    public function profile(): Profile
    {
        return new Profile();
    }
}
"#,
    );
    write(
        root,
        "src/Model/Profile.php",
        r#"<?php
namespace App\Model;

class Profile
{
    /** @deprecated use avatarUrl() */
    public function avatar(): string
    {
        return '';
    }
}
"#,
    );
    write(
        root,
        "src/Http/Controller.php",
        r#"<?php
namespace App\Http;

use App\Model\User;

class Controller
{
    public function show(User $user)
    {
        $profile = $user->profile();
        $unused = 1;
        return $profile->avatar();
    }
}
"#,
    );
    write(root, "vendor/lib/Ignored.php", "<?php\nclass Ignored {}\n");
    write(root, ".gitignore", "vendor/\n");
    write(root, "README.md", "# test project\n");

    temp_dir
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    fs::write(path, content).expect("Failed to write fixture");
}

fn index(root: &Path) -> SymbolStore {
    let store = SymbolStore::in_memory();
    let mut messages = Vec::new();
    let result = run_workspace_indexer(
        store.clone(),
        root,
        IndexingConfigBuilder::build(2),
        |message| messages.push(message.to_string()),
    )
    .expect("indexing should succeed");
    assert_eq!(result.processed_files, 3);
    assert!(result.errored_files.is_empty());
    assert!(messages.iter().any(|m| m.contains("Files processed: 3")));
    store
}

#[traced_test]
#[test]
fn test_workspace_indexing_honours_gitignore() {
    let workspace = create_test_workspace();
    let store = index(workspace.path());

    assert_eq!(
        store.prefix_search(Collection::Class, "\\app\\model\\").unwrap().len(),
        2
    );
    assert!(store.prefix_search(Collection::Class, "ignored").unwrap().is_empty());
    assert!(logs_contain("Indexed 3 of 3 files"));
}

#[test]
fn test_cross_file_resolution_after_indexing() {
    let workspace = create_test_workspace();
    let store = index(workspace.path());

    let path = workspace.path().join("src/Http/Controller.php");
    let text = fs::read_to_string(&path).unwrap();
    let document = Document::parse(path.to_string_lossy(), text.as_str()).unwrap();
    let session = QuerySession::new(ExpressionResolver::new(&document, &store));

    let offset = text.rfind("$profile").unwrap() as u32 + 1;
    let types = session.type_at(offset).unwrap().unwrap();
    let names: Vec<&str> = types.iter().map(|t| t.fqn()).collect();
    assert_eq!(names, vec!["\\App\\Model\\Profile"]);

    let diagnostics = session.diagnostics().unwrap();
    assert!(
        diagnostics
            .iter()
            .any(|d| d.severity == Severity::Hint && d.message.contains("$unused"))
    );
    assert!(
        diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning && d.message.contains("use avatarUrl()"))
    );
}

#[test]
fn test_reindexing_replaces_previous_declarations() {
    let workspace = create_test_workspace();
    let store = index(workspace.path());

    write(
        workspace.path(),
        "src/Model/Profile.php",
        "<?php\nnamespace App\\Model;\n\nclass Settings {}\n",
    );
    let result = run_workspace_indexer(
        store.clone(),
        workspace.path(),
        IndexingConfigBuilder::build(1),
        |_| {},
    )
    .unwrap();

    assert!(result.entries_deleted > 0);
    let classes = store.prefix_search(Collection::Class, "\\app\\model\\").unwrap();
    assert!(classes.contains(&"\\App\\Model\\Settings".to_string()));
    assert!(!classes.contains(&"\\App\\Model\\Profile".to_string()));
}

#[test]
fn test_empty_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let result = run_workspace_indexer(
        SymbolStore::in_memory(),
        temp_dir.path(),
        IndexingConfigBuilder::build(1),
        |_| {},
    )
    .unwrap();

    assert_eq!(result.total_files, 0);
}

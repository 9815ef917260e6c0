//! PHP language intelligence.
//!
//! A PHP file goes through three stages:
//!
//! 1. **Extraction** ([`document::Document::parse`]): one walk over the
//!    tree-sitter tree collects declarations (classes, interfaces, traits,
//!    functions, members, constants, globals), per-namespace
//!    [`import_table::ImportTable`]s, per-scope
//!    [`variable_table::VariableTable`]s and the arena of expression nodes.
//! 2. **Synchronisation** ([`document::Document::sync`]): the declarations
//!    and name references of the document replace whatever the workspace
//!    [`database::SymbolStore`] held for it.
//! 3. **Queries** ([`session::QuerySession`]): types are resolved lazily
//!    through the [`expression_resolver::ExpressionResolver`], walking class
//!    hierarchies with the [`inheritance::InheritanceEngine`] when a member
//!    is involved.
//!
//! ```text
//! source ──parse──▶ Document ──sync──▶ SymbolStore
//!                      │                    ▲
//!                      └──▶ QuerySession ───┘
//! ```
//!
//! Names are always compared in their fully-qualified, leading-backslash
//! form (`\App\Models\User`). Class and function names are case-insensitive,
//! constants and variables are not.

pub mod document;
pub mod expression_resolver;
mod extraction;
pub mod import_table;
pub mod inheritance;
pub mod phpdoc;
pub mod session;
pub mod symbols;
pub mod types;
pub mod variable_table;

#[cfg(test)]
mod tests;

pub use document::Document;
pub use expression_resolver::ExpressionResolver;
pub use session::QuerySession;

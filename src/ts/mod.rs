//! Tree-sitter integration.
//!
//! Snapshots are parsed with tree-sitter's Rust grammar and flattened into an
//! owned [`SyntaxTree`] arena. Declaration, invocation and binding queries
//! over that arena live in [`items`].

pub mod errors;
pub mod items;
pub mod parser;
pub mod syntax;

pub use errors::TreeSitterError;
pub use items::{
    call_arguments, callee_name, is_binding, pattern_bindings, read_identifiers, Class,
    DeclarationHandle, Method,
};
pub use parser::RustParser;
pub use syntax::{Node, NodeId, SyntaxTree, IDENTIFIER_KINDS};

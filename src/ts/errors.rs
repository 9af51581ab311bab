use thiserror::Error;

/// Why a snapshot could not be turned into a [`SyntaxTree`](crate::ts::SyntaxTree).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeSitterError {
    #[error("failed to load the Rust grammar")]
    LanguageSet,

    #[error("tree-sitter returned no tree")]
    ParseFailed,

    #[error("syntax error at byte {byte_start}..{byte_end}")]
    SyntaxError { byte_start: usize, byte_end: usize },

    #[error("{count} syntax errors")]
    MultipleSyntaxErrors { count: usize },
}

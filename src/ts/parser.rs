use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use std::ops::Range;
use tree_sitter::{Parser, Tree};

/// Tree-sitter parser loaded with the Rust grammar.
pub struct RustParser {
    parser: Parser,
}

impl RustParser {
    pub fn new() -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        parser
            .set_language(&SupportLang::Rust.get_ts_language())
            .map_err(|_| TreeSitterError::LanguageSet)?;
        Ok(Self { parser })
    }

    /// Parse leniently; the tree may contain ERROR and MISSING nodes.
    pub fn parse(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse and reject any tree tree-sitter had to recover.
    ///
    /// Snapshots caught mid-edit usually land here; the history search skips
    /// them rather than diffing a half-recovered tree.
    pub fn parse_strict(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        let tree = self.parse(source)?;
        let mut broken = recovered_spans(&tree);
        match (broken.len(), broken.pop()) {
            (0, _) => Ok(tree),
            (1, Some(span)) => Err(TreeSitterError::SyntaxError {
                byte_start: span.start,
                byte_end: span.end,
            }),
            (count, _) => Err(TreeSitterError::MultipleSyntaxErrors { count }),
        }
    }
}

/// Outermost ERROR or MISSING spans, in document order.
fn recovered_spans(tree: &Tree) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut pending = vec![tree.root_node()];
    while let Some(node) = pending.pop() {
        if node.is_error() || node.is_missing() {
            spans.push(node.byte_range());
        } else if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            pending.extend(children.into_iter().rev());
        }
    }
    spans
}

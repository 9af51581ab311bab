//! Workspace-wide invocation lookup.

use crate::cache::MemoSize;
use crate::matcher::stripped;
use crate::snapshot::{DocumentKey, SnapshotError, SnapshotProvider, Timestamp};
use crate::ts::{call_arguments, DeclarationHandle, SyntaxTree, TreeSitterError};
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("failed to parse {document}: {source}")]
    Parse {
        document: DocumentKey,
        #[source]
        source: TreeSitterError,
    },
}

/// One invocation bound to a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSite {
    pub document: DocumentKey,
    /// Span of the whole `call_expression`.
    pub call_range: Range<usize>,
    /// Span of the parenthesized argument list.
    pub arguments_range: Range<usize>,
    /// Argument list as written, parentheses included.
    pub arguments_text: String,
    /// Argument texts as written.
    pub arguments: Vec<String>,
}

impl InvocationSite {
    pub fn stripped_arguments(&self) -> String {
        self.arguments
            .iter()
            .map(|a| stripped(a))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl MemoSize for InvocationSite {
    fn memo_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.arguments_text.len()
            + self.arguments.iter().map(String::len).sum::<usize>()
    }
}

pub trait WorkspaceQuery: Send + Sync {
    fn documents(&self) -> Vec<DocumentKey>;

    /// Invocations in `document` whose callee resolves to `declaration`.
    fn invocations_of(
        &self,
        document: &DocumentKey,
        declaration: &DeclarationHandle,
    ) -> Result<Vec<InvocationSite>, WorkspaceError>;

    /// Invocations in the version of `document` that was current at
    /// `timestamp`; `None` when the document had no snapshot yet.
    fn invocations_as_of(
        &self,
        document: &DocumentKey,
        declaration: &DeclarationHandle,
        timestamp: Timestamp,
    ) -> Result<Option<Vec<InvocationSite>>, WorkspaceError>;
}

/// The latest snapshot of every tracked document, parsed on demand.
pub struct SnapshotWorkspace {
    provider: Arc<dyn SnapshotProvider>,
}

impl SnapshotWorkspace {
    pub fn new(provider: Arc<dyn SnapshotProvider>) -> Self {
        Self { provider }
    }

    fn sites(
        document: &DocumentKey,
        text: &str,
        declaration: &DeclarationHandle,
    ) -> Result<Vec<InvocationSite>, WorkspaceError> {
        let tree = SyntaxTree::parse(text).map_err(|source| WorkspaceError::Parse {
            document: document.clone(),
            source,
        })?;
        Ok(sites_in(document, &tree, declaration))
    }
}

impl WorkspaceQuery for SnapshotWorkspace {
    fn documents(&self) -> Vec<DocumentKey> {
        self.provider.identities()
    }

    fn invocations_of(
        &self,
        document: &DocumentKey,
        declaration: &DeclarationHandle,
    ) -> Result<Vec<InvocationSite>, WorkspaceError> {
        match self.provider.latest(document)? {
            Some(latest) => Self::sites(document, latest.text(), declaration),
            None => Ok(Vec::new()),
        }
    }

    fn invocations_as_of(
        &self,
        document: &DocumentKey,
        declaration: &DeclarationHandle,
        timestamp: Timestamp,
    ) -> Result<Option<Vec<InvocationSite>>, WorkspaceError> {
        let mut current = self.provider.latest(document)?;
        while let Some(snapshot) = current {
            if snapshot.timestamp() <= timestamp {
                return Self::sites(document, snapshot.text(), declaration).map(Some);
            }
            current = self.provider.previous(&snapshot)?;
        }
        Ok(None)
    }
}

/// Every invocation of `declaration` in `tree`.
pub fn sites_in(
    document: &DocumentKey,
    tree: &SyntaxTree,
    declaration: &DeclarationHandle,
) -> Vec<InvocationSite> {
    tree.invocations_of(tree.root(), declaration)
        .into_iter()
        .filter_map(|call| {
            let arguments = call.child_by_field("arguments")?;
            Some(InvocationSite {
                document: document.clone(),
                call_range: call.byte_range(),
                arguments_range: arguments.byte_range(),
                arguments_text: arguments.text().to_string(),
                arguments: call_arguments(call)
                    .iter()
                    .map(|a| a.text().to_string())
                    .collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySnapshotStore;

    #[test]
    fn finds_invocations_across_documents() {
        let store = Arc::new(MemorySnapshotStore::new());
        let lib = DocumentKey::new("app", "bank", "lib.rs");
        let main = DocumentKey::new("app", "bank", "main.rs");
        store
            .create_next_at(&lib, "fn transfer(a: u32, b: u32) {}\nfn f() { transfer(1, 2); }\n", 1)
            .unwrap();
        store
            .create_next_at(&main, "fn main() { transfer(x, y); other(1); }\n", 1)
            .unwrap();

        let workspace = SnapshotWorkspace::new(store);
        let handle = DeclarationHandle::new(None, "transfer", 2);
        assert_eq!(workspace.documents().len(), 2);

        let sites = workspace.invocations_of(&main, &handle).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].arguments, vec!["x", "y"]);
        assert_eq!(sites[0].stripped_arguments(), "x,y");
    }

    #[test]
    fn earlier_versions_are_looked_up_by_time() {
        let store = Arc::new(MemorySnapshotStore::new());
        let main = DocumentKey::new("app", "bank", "main.rs");
        store.create_next_at(&main, "fn main() { transfer(1, 2); }\n", 3).unwrap();
        store.create_next_at(&main, "fn main() { transfer(2, 1); }\n", 7).unwrap();

        let workspace = SnapshotWorkspace::new(store);
        let handle = DeclarationHandle::new(None, "transfer", 2);
        let at = |t| {
            workspace
                .invocations_as_of(&main, &handle, t)
                .unwrap()
                .map(|sites| sites[0].stripped_arguments())
        };
        assert_eq!(at(2), None);
        assert_eq!(at(3).as_deref(), Some("1,2"));
        assert_eq!(at(6).as_deref(), Some("1,2"));
        assert_eq!(at(9).as_deref(), Some("2,1"));
    }

    #[test]
    fn unknown_document_has_no_sites() {
        let workspace = SnapshotWorkspace::new(Arc::new(MemorySnapshotStore::new()));
        let sites = workspace
            .invocations_of(
                &DocumentKey::new("a", "b", "c.rs"),
                &DeclarationHandle::new(None, "f", 0),
            )
            .unwrap();
        assert!(sites.is_empty());
    }
}

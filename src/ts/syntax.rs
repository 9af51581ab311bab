use crate::pool::with_parser;
use crate::ts::errors::TreeSitterError;
use std::fmt;
use std::ops::Range;
use xxhash_rust::xxh3::xxh3_64;

/// Node kinds treated as identifiers by the rename detector.
pub const IDENTIFIER_KINDS: &[&str] = &["identifier", "field_identifier", "type_identifier"];

const COMMENT_KINDS: &[&str] = &["line_comment", "block_comment"];

/// Stable handle to a node inside one [`SyntaxTree`].
///
/// Ids are assigned in pre-order, so a node's descendants occupy the id range
/// directly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct NodeData {
    kind: &'static str,
    field: Option<&'static str>,
    named: bool,
    byte_start: usize,
    byte_end: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    subtree_end: usize,
}

/// An owned, immutable parse of one snapshot.
///
/// The tree-sitter tree is flattened into an arena so descriptors can keep
/// `Arc<SyntaxTree>` plus [`NodeId`]s without borrowing a parser-owned tree.
pub struct SyntaxTree {
    source: String,
    nodes: Vec<NodeData>,
    fingerprint: u64,
}

impl SyntaxTree {
    /// Parse `source`, rejecting sources with syntax errors.
    pub fn parse(source: &str) -> Result<Self, TreeSitterError> {
        let tree = with_parser(|parser| parser.parse_strict(source))??;
        Ok(Self::from_tree(source, &tree))
    }

    fn from_tree(source: &str, tree: &tree_sitter::Tree) -> Self {
        let mut nodes: Vec<NodeData> = Vec::new();
        let mut ancestors: Vec<NodeId> = Vec::new();
        let mut cursor = tree.walk();

        loop {
            let node = cursor.node();
            let id = NodeId(nodes.len() as u32);
            let parent = ancestors.last().copied();
            nodes.push(NodeData {
                kind: node.kind(),
                field: cursor.field_name(),
                named: node.is_named(),
                byte_start: node.start_byte(),
                byte_end: node.end_byte(),
                parent,
                children: Vec::new(),
                subtree_end: 0,
            });
            if let Some(parent) = parent {
                nodes[parent.index()].children.push(id);
            }

            if cursor.goto_first_child() {
                ancestors.push(id);
                continue;
            }
            nodes[id.index()].subtree_end = nodes.len();

            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return Self {
                        source: source.to_string(),
                        fingerprint: xxh3_64(source.as_bytes()),
                        nodes,
                    };
                }
                if let Some(closed) = ancestors.pop() {
                    nodes[closed.index()].subtree_end = nodes.len();
                }
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// xxh3 of the source text.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: NodeId(0),
        }
    }

    /// View of a node by id. Ids from a different tree are a caller bug and
    /// panic on out-of-range access, exactly like slice indexing.
    pub fn node(&self, id: NodeId) -> Node<'_> {
        assert!(id.index() < self.nodes.len(), "node id out of range");
        Node { tree: self, id }
    }

    /// Look up a node by id, returning `None` for foreign ids.
    pub fn get(&self, id: NodeId) -> Option<Node<'_>> {
        (id.index() < self.nodes.len()).then_some(Node { tree: self, id })
    }

    /// All nodes in document (pre-)order.
    pub fn preorder(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        (0..self.nodes.len()).map(move |i| Node {
            tree: self,
            id: NodeId(i as u32),
        })
    }

    /// Identifier leaves in pre-order.
    pub fn identifiers(&self) -> Vec<Node<'_>> {
        self.preorder()
            .filter(|n| IDENTIFIER_KINDS.contains(&n.kind()))
            .collect()
    }

    /// Innermost named node spanning exactly `range`, if any.
    pub fn node_for_range(&self, range: Range<usize>) -> Option<Node<'_>> {
        self.preorder()
            .filter(|n| n.is_named() && n.byte_range() == range)
            .last()
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

impl crate::cache::MemoSize for SyntaxTree {
    fn memo_size(&self) -> usize {
        self.source.len() + self.nodes.len() * std::mem::size_of::<NodeData>()
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("bytes", &self.source.len())
            .field("nodes", &self.nodes.len())
            .field("fingerprint", &format_args!("{:016x}", self.fingerprint))
            .finish()
    }
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    pub fn id(self) -> NodeId {
        self.id
    }

    pub fn tree(self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn kind(self) -> &'static str {
        self.tree.data(self.id).kind
    }

    /// Field name this node occupies in its parent (`name`, `body`, ...).
    pub fn field(self) -> Option<&'static str> {
        self.tree.data(self.id).field
    }

    pub fn is_named(self) -> bool {
        self.tree.data(self.id).named
    }

    pub fn byte_range(self) -> Range<usize> {
        let data = self.tree.data(self.id);
        data.byte_start..data.byte_end
    }

    pub fn text(self) -> &'t str {
        &self.tree.source[self.byte_range()]
    }

    /// Rendered text with all whitespace removed.
    pub fn stripped_text(self) -> String {
        crate::matcher::stripped(self.text())
    }

    pub fn parent(self) -> Option<Node<'t>> {
        self.tree.data(self.id).parent.map(|id| Node {
            tree: self.tree,
            id,
        })
    }

    pub fn children(self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        tree.data(self.id)
            .children
            .iter()
            .map(move |&id| Node { tree, id })
    }

    pub fn named_children(self) -> impl Iterator<Item = Node<'t>> + 't {
        self.children().filter(|c| c.is_named() && !c.is_comment())
    }

    pub fn child_by_field(self, field: &str) -> Option<Node<'t>> {
        self.children().find(|c| c.field() == Some(field))
    }

    /// Strict descendants in pre-order.
    pub fn descendants(self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        let data = tree.data(self.id);
        (self.id.index() + 1..data.subtree_end).map(move |i| Node {
            tree,
            id: NodeId(i as u32),
        })
    }

    pub fn ancestors(self) -> impl Iterator<Item = Node<'t>> + 't {
        std::iter::successors(self.parent(), |n| n.parent())
    }

    /// Whether `other` lies in this node's subtree (or is this node).
    pub fn contains(self, other: Node<'_>) -> bool {
        std::ptr::eq(self.tree, other.tree)
            && other.id >= self.id
            && other.id.index() < self.tree.data(self.id).subtree_end
    }

    pub fn is_comment(self) -> bool {
        COMMENT_KINDS.contains(&self.kind())
    }

    /// Statements are the named, non-comment children of a block.
    pub fn is_statement(self) -> bool {
        self.is_named()
            && !self.is_comment()
            && self.parent().is_some_and(|p| p.kind() == "block")
    }

    pub fn is_expression(self) -> bool {
        let kind = self.kind();
        kind.ends_with("_expression") || kind == "macro_invocation"
    }

    /// Position among the statement siblings of the enclosing block.
    pub fn statement_index(self) -> Option<usize> {
        if !self.is_statement() {
            return None;
        }
        self.parent()?
            .named_children()
            .position(|sibling| sibling.id == self.id)
    }

    /// Statements of a block node; empty for any other kind.
    pub fn statements(self) -> Vec<Node<'t>> {
        if self.kind() != "block" {
            return Vec::new();
        }
        self.named_children().collect()
    }

    /// First ancestor-or-self of the given kind.
    pub fn enclosing(self, kind: &str) -> Option<Node<'t>> {
        std::iter::once(self)
            .chain(self.ancestors())
            .find(|n| n.kind() == kind)
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = self.byte_range();
        write!(f, "{}@{}..{}", self.kind(), range.start, range.end)
    }
}

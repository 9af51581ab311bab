//! Declaration and invocation queries over a [`SyntaxTree`].
//!
//! "Classes" are `impl` blocks grouped by the implementing type's name; free
//! functions belong to the module-level pseudo-class. Binding is name and
//! arity based: it resolves an invocation to a declaration in the same tree
//! when exactly one candidate exists, and to an external handle when none
//! does.

use crate::ts::syntax::{Node, SyntaxTree};
use serde::Serialize;
use std::fmt;

/// Resolved target of an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclarationHandle {
    /// Implementing type, `None` for free functions or unknown receivers.
    pub owner: Option<String>,
    pub name: String,
    /// Parameter count excluding `self`.
    pub arity: usize,
}

impl DeclarationHandle {
    pub fn new(owner: Option<&str>, name: impl Into<String>, arity: usize) -> Self {
        Self {
            owner: owner.map(str::to_string),
            name: name.into(),
            arity,
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}::{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Name and arity must agree; an unknown owner on either side matches
    /// any owner.
    pub fn matches(&self, other: &DeclarationHandle) -> bool {
        self.name == other.name
            && self.arity == other.arity
            && match (&self.owner, &other.owner) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

impl fmt::Display for DeclarationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.qualified_name(), self.arity)
    }
}

/// A `function_item` at module level or directly inside an `impl` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method<'t> {
    pub owner: Option<&'t str>,
    pub name: &'t str,
    pub node: Node<'t>,
}

impl<'t> Method<'t> {
    pub fn body(&self) -> Option<Node<'t>> {
        self.node.child_by_field("body")
    }

    pub fn return_type(&self) -> Option<Node<'t>> {
        self.node.child_by_field("return_type")
    }

    fn parameter_list(&self) -> Option<Node<'t>> {
        self.node.child_by_field("parameters")
    }

    /// Non-`self` parameters in declaration order.
    pub fn parameters(&self) -> Vec<Node<'t>> {
        self.parameter_list()
            .map(|list| {
                list.named_children()
                    .filter(|p| p.kind() == "parameter")
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_self(&self) -> bool {
        self.parameter_list()
            .is_some_and(|list| list.named_children().any(|p| p.kind() == "self_parameter"))
    }

    pub fn arity(&self) -> usize {
        self.parameters().len()
    }

    /// Names bound by the parameter patterns.
    pub fn parameter_names(&self) -> Vec<&'t str> {
        self.parameters()
            .into_iter()
            .filter_map(|p| p.child_by_field("pattern"))
            .flat_map(pattern_bindings)
            .map(|n| n.text())
            .collect()
    }

    pub fn handle(&self) -> DeclarationHandle {
        DeclarationHandle::new(self.owner, self.name, self.arity())
    }

    /// Key used to pair a method across two versions of a file.
    pub fn key(&self) -> (Option<&'t str>, &'t str) {
        (self.owner, self.name)
    }
}

/// Methods grouped by implementing type.
#[derive(Debug, Clone)]
pub struct Class<'t> {
    pub name: Option<&'t str>,
    pub methods: Vec<Method<'t>>,
}

impl<'t> Class<'t> {
    pub fn method(&self, name: &str) -> Option<&Method<'t>> {
        self.methods.iter().find(|m| m.name == name)
    }
}

impl SyntaxTree {
    /// Every module-level function and every function directly inside an
    /// `impl` block, in document order.
    pub fn methods(&self) -> Vec<Method<'_>> {
        self.preorder()
            .filter(|n| n.kind() == "function_item")
            .filter_map(|node| {
                let name = node.child_by_field("name")?.text();
                let parent = node.parent()?;
                let owner = match parent.kind() {
                    "source_file" => None,
                    "declaration_list" => {
                        let container = parent.parent()?;
                        match container.kind() {
                            "impl_item" => Some(impl_type_name(container)?),
                            "mod_item" => None,
                            _ => return None,
                        }
                    }
                    _ => return None,
                };
                Some(Method { owner, name, node })
            })
            .collect()
    }

    /// Methods grouped by owner, in order of first appearance. Several `impl`
    /// blocks for one type merge into a single class.
    pub fn classes(&self) -> Vec<Class<'_>> {
        let mut classes: Vec<Class<'_>> = Vec::new();
        for method in self.methods() {
            match classes.iter_mut().find(|c| c.name == method.owner) {
                Some(class) => class.methods.push(method),
                None => classes.push(Class {
                    name: method.owner,
                    methods: vec![method],
                }),
            }
        }
        classes
    }

    pub fn find_method(&self, owner: Option<&str>, name: &str) -> Option<Method<'_>> {
        self.methods()
            .into_iter()
            .find(|m| m.owner == owner && m.name == name)
    }

    /// The method whose declaration node is `node`.
    pub fn method_at(&self, node: Node<'_>) -> Option<Method<'_>> {
        self.methods().into_iter().find(|m| m.node.id() == node.id())
    }

    /// All `call_expression` nodes.
    pub fn invocations(&self) -> Vec<Node<'_>> {
        self.preorder()
            .filter(|n| n.kind() == "call_expression")
            .collect()
    }

    /// Resolve an invocation to its declaration.
    ///
    /// Returns `None` when the callee shape is not understood or when several
    /// declarations in this tree fit; such invocations are left out of match
    /// sets by callers.
    pub fn resolve_invocation_target(&self, call: Node<'_>) -> Option<DeclarationHandle> {
        let callee = call.child_by_field("function")?;
        let name = callee_name(call)?;
        let args = call_arguments(call).len();

        let (owner, receiver_call) = match callee.kind() {
            "identifier" => (None, false),
            "field_expression" => {
                let receiver = callee.child_by_field("value")?;
                let owner = if receiver.kind() == "self" {
                    enclosing_owner(call)
                } else {
                    None
                };
                (owner, true)
            }
            "scoped_identifier" => {
                let path = callee.child_by_field("path").map(|p| p.text());
                let owner = match path {
                    Some("Self") => enclosing_owner(call),
                    Some(path) => path.rsplit("::").next(),
                    None => None,
                };
                (owner, false)
            }
            "generic_function" => (None, false),
            _ => return None,
        };

        let candidates: Vec<Method<'_>> = self
            .methods()
            .into_iter()
            .filter(|m| m.name == name)
            .filter(|m| owner.is_none() || m.owner == owner)
            .filter(|m| {
                if receiver_call {
                    m.has_self() && m.arity() == args
                } else if m.has_self() {
                    m.arity() + 1 == args
                } else {
                    m.arity() == args
                }
            })
            .filter(|m| callee.kind() != "identifier" || m.owner.is_none())
            .collect();

        match candidates.len() {
            0 => Some(DeclarationHandle::new(owner, name, args)),
            1 => Some(candidates[0].handle()),
            n => {
                tracing::debug!(callee = name, candidates = n, "ambiguous invocation target");
                None
            }
        }
    }

    /// Invocations inside `scope` whose callee's simple name is `name`.
    ///
    /// Used where arity may legitimately disagree between a call and its
    /// declaration, e.g. while a refactoring is only half applied.
    pub fn invocations_named(&self, scope: Node<'_>, name: &str) -> Vec<Node<'_>> {
        self.invocations()
            .into_iter()
            .filter(|call| scope.contains(*call) && callee_name(*call) == Some(name))
            .collect()
    }

    /// Invocations inside `scope` that resolve to `target`, in document order.
    pub fn invocations_of(&self, scope: Node<'_>, target: &DeclarationHandle) -> Vec<Node<'_>> {
        self.invocations()
            .into_iter()
            .filter(|call| scope.contains(*call))
            .filter(|call| {
                self.resolve_invocation_target(*call)
                    .is_some_and(|handle| handle.matches(target))
            })
            .collect()
    }
}

/// Name of the type an `impl` block implements, without generics.
fn impl_type_name(impl_item: Node<'_>) -> Option<&str> {
    let ty = impl_item.child_by_field("type")?;
    match ty.kind() {
        "generic_type" => ty.child_by_field("type").map(|t| t.text()),
        "scoped_type_identifier" => ty.child_by_field("name").map(|t| t.text()),
        _ => Some(ty.text()),
    }
}

fn enclosing_owner(node: Node<'_>) -> Option<&str> {
    node.enclosing("impl_item").and_then(impl_type_name)
}

/// Simple name of the callee: `f(..)`, `x.f(..)`, `T::f(..)`, `f::<T>(..)`.
pub fn callee_name(call: Node<'_>) -> Option<&str> {
    let mut callee = call.child_by_field("function")?;
    if callee.kind() == "generic_function" {
        callee = callee.child_by_field("function")?;
    }
    match callee.kind() {
        "identifier" => Some(callee.text()),
        "field_expression" => callee.child_by_field("field").map(|f| f.text()),
        "scoped_identifier" => callee.child_by_field("name").map(|n| n.text()),
        _ => None,
    }
}

/// Argument expressions of a call.
pub fn call_arguments(call: Node<'_>) -> Vec<Node<'_>> {
    call.child_by_field("arguments")
        .map(|args| args.named_children().collect())
        .unwrap_or_default()
}

/// Identifiers bound by a pattern node (`x`, `mut x`, `(a, b)`, `Some(v)`).
pub fn pattern_bindings(pattern: Node<'_>) -> Vec<Node<'_>> {
    std::iter::once(pattern)
        .chain(pattern.descendants())
        .filter(|n| n.kind() == "identifier" && is_binding(*n))
        .collect()
}

/// Whether an identifier introduces a binding rather than reading one.
pub fn is_binding(node: Node<'_>) -> bool {
    let mut current = node;
    loop {
        if current.field() == Some("pattern") {
            return true;
        }
        let Some(parent) = current.parent() else {
            return false;
        };
        match parent.kind() {
            "closure_parameters" => return true,
            "tuple_struct_pattern" if current.field() == Some("type") => return false,
            kind if kind.ends_with("_pattern") => current = parent,
            _ => return false,
        }
    }
}

/// Identifiers read inside `scope`: excludes bindings, callee names, macro
/// names, and path segments.
pub fn read_identifiers(scope: Node<'_>) -> Vec<Node<'_>> {
    std::iter::once(scope)
        .chain(scope.descendants())
        .filter(|n| n.kind() == "identifier")
        .filter(|n| !is_binding(*n))
        .filter(|n| {
            let field = n.field();
            let parent_kind = n.parent().map(|p| p.kind()).unwrap_or_default();
            !(field == Some("function") && parent_kind == "call_expression")
                && !(field == Some("macro") && parent_kind == "macro_invocation")
                && parent_kind != "scoped_identifier"
                && parent_kind != "scoped_type_identifier"
                && field != Some("type")
        })
        .collect()
}

//! Name-level data flow around an extracted region.

use crate::ts::{is_binding, pattern_bindings, read_identifiers, Method, Node};

/// A name visible before the region, with its declared type when written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    pub name: String,
    pub ty: Option<String>,
}

/// Parameters of `method` plus `let` bindings that end before `offset`.
pub fn declared_before(method: Method<'_>, offset: usize) -> Vec<Declared> {
    let mut declared: Vec<Declared> = method
        .parameters()
        .into_iter()
        .filter_map(|param| {
            let pattern = param.child_by_field("pattern")?;
            let ty = param.child_by_field("type").map(|t| t.text().to_string());
            Some(typed_bindings(pattern, ty))
        })
        .flatten()
        .collect();

    if let Some(body) = method.body() {
        for node in body.descendants() {
            if node.kind() != "let_declaration" || node.byte_range().end > offset {
                continue;
            }
            let Some(pattern) = node.child_by_field("pattern") else {
                continue;
            };
            let ty = node.child_by_field("type").map(|t| t.text().to_string());
            declared.extend(typed_bindings(pattern, ty));
        }
    }
    declared
}

/// A type annotation only describes the binding when the pattern is a single
/// name.
fn typed_bindings(pattern: Node<'_>, ty: Option<String>) -> Vec<Declared> {
    let bindings = pattern_bindings(pattern);
    let single = bindings.len() == 1;
    bindings
        .into_iter()
        .map(|n| Declared {
            name: n.text().to_string(),
            ty: if single { ty.clone() } else { None },
        })
        .collect()
}

/// Distinct names read inside `nodes`, in first-read order.
pub fn reads(nodes: &[Node<'_>]) -> Vec<String> {
    let mut names = Vec::new();
    for node in nodes {
        for ident in read_identifiers(*node) {
            push_unique(&mut names, ident.text());
        }
    }
    names
}

/// Distinct names bound by `let` or assigned inside `nodes`.
pub fn written(nodes: &[Node<'_>]) -> Vec<String> {
    let mut names = Vec::new();
    for node in nodes {
        for inner in std::iter::once(*node).chain(node.descendants()) {
            match inner.kind() {
                "let_declaration" => {
                    if let Some(pattern) = inner.child_by_field("pattern") {
                        for binding in pattern_bindings(pattern) {
                            push_unique(&mut names, binding.text());
                        }
                    }
                }
                "assignment_expression" | "compound_assignment_expr" => {
                    if let Some(left) = inner.child_by_field("left") {
                        if left.kind() == "identifier" && !is_binding(left) {
                            push_unique(&mut names, left.text());
                        }
                    }
                }
                _ => {}
            }
        }
    }
    names
}

/// Distinct names read in `scope` at or after `offset`.
pub fn reads_after(scope: Node<'_>, offset: usize) -> Vec<String> {
    let mut names = Vec::new();
    for ident in read_identifiers(scope) {
        if ident.byte_range().start >= offset {
            push_unique(&mut names, ident.text());
        }
    }
    names
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::SyntaxTree;

    const SOURCE: &str = r#"
fn run(limit: u32, (a, b): (u32, u32)) -> u32 {
    let base: u32 = a + b;
    let mut acc = base;
    acc += limit;
    let out = acc * 2;
    out + base
}
"#;

    #[test]
    fn declared_before_collects_params_and_lets() {
        let tree = SyntaxTree::parse(SOURCE).unwrap();
        let method = tree.methods()[0];
        let offset = SOURCE.find("let mut acc").unwrap();

        let declared = declared_before(method, offset);
        let names: Vec<_> = declared.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["limit", "a", "b", "base"]);
        assert_eq!(declared[0].ty.as_deref(), Some("u32"));
        assert_eq!(declared[1].ty, None);
        assert_eq!(declared[3].ty.as_deref(), Some("u32"));
    }

    #[test]
    fn written_and_read_after() {
        let tree = SyntaxTree::parse(SOURCE).unwrap();
        let body = tree.methods()[0].body().unwrap();
        let statements = body.statements();
        let region = &statements[1..3];

        assert_eq!(written(region), vec!["acc"]);
        assert_eq!(reads(region), vec!["base", "acc", "limit"]);

        let end = region[1].byte_range().end;
        assert_eq!(reads_after(body, end), vec!["acc", "out", "base"]);
    }
}

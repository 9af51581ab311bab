use crate::refactoring::{DetectionSettings, Detector, Refactoring, RefactoringKind};
use crate::ts::{DeclarationHandle, Method, NodeId, SyntaxTree};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("mapping has {mapping} entries but the method takes {arity} parameters")]
    ArityMismatch { mapping: usize, arity: usize },

    #[error("mapping is not a permutation: {0:?}")]
    NotAPermutation(Vec<usize>),

    #[error("node is not a method declaration")]
    NotAMethod,
}

/// A parameter reorder of one method.
///
/// `mapping[new_index] = old_index`: the parameter now at `new_index` used to
/// sit at `old_index`.
#[derive(Debug, Clone)]
pub struct ChangeSignature {
    pub before: Arc<SyntaxTree>,
    pub after: Arc<SyntaxTree>,
    pub before_method: NodeId,
    pub after_method: NodeId,
    pub declaration: DeclarationHandle,
    mapping: Vec<usize>,
}

impl ChangeSignature {
    /// Build a descriptor from an externally supplied mapping.
    pub fn new(
        before: Arc<SyntaxTree>,
        after: Arc<SyntaxTree>,
        before_method: NodeId,
        after_method: NodeId,
        mapping: Vec<usize>,
    ) -> Result<Self, SignatureError> {
        let method = after
            .get(after_method)
            .and_then(|node| after.method_at(node))
            .ok_or(SignatureError::NotAMethod)?;
        let declaration = method.handle();

        if mapping.len() != declaration.arity {
            return Err(SignatureError::ArityMismatch {
                mapping: mapping.len(),
                arity: declaration.arity,
            });
        }
        let mut seen = vec![false; mapping.len()];
        for &old in &mapping {
            match seen.get_mut(old) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(SignatureError::NotAPermutation(mapping.clone())),
            }
        }

        Ok(Self {
            before,
            after,
            before_method,
            after_method,
            declaration,
            mapping,
        })
    }

    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    pub fn is_identity(&self) -> bool {
        self.mapping.iter().enumerate().all(|(new, old)| new == *old)
    }

    /// Arrange items given in the old parameter order into the new order.
    ///
    /// Returns `None` when the item count does not match the arity.
    pub fn reorder<T: Clone>(&self, items: &[T]) -> Option<Vec<T>> {
        if items.len() != self.mapping.len() {
            return None;
        }
        Some(self.mapping.iter().map(|&old| items[old].clone()).collect())
    }

    pub fn after_method(&self) -> Option<Method<'_>> {
        self.after.method_at(self.after.get(self.after_method)?)
    }

    pub fn summary(&self) -> String {
        format!(
            "reordered parameters of `{}` as {:?}",
            self.declaration.qualified_name(),
            self.mapping
        )
    }
}

/// Emits a descriptor when a method kept in both trees has a parameter list
/// that is a non-identity permutation of its previous one.
pub struct ChangeSignatureDetector;

impl Detector for ChangeSignatureDetector {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::ChangeSignature
    }

    fn detect(
        &self,
        before: &Arc<SyntaxTree>,
        after: &Arc<SyntaxTree>,
        _settings: &DetectionSettings,
    ) -> Vec<Refactoring> {
        let mut found = Vec::new();
        for old in before.methods() {
            let Some(new) = after.find_method(old.owner, old.name) else {
                continue;
            };
            let Some(mapping) = parameter_permutation(&old, &new) else {
                continue;
            };
            if mapping.iter().enumerate().all(|(i, m)| i == *m) {
                continue;
            }
            match ChangeSignature::new(
                Arc::clone(before),
                Arc::clone(after),
                old.node.id(),
                new.node.id(),
                mapping,
            ) {
                Ok(descriptor) => found.push(Refactoring::ChangeSignature(descriptor)),
                Err(err) => tracing::debug!(method = new.name, %err, "rejected parameter mapping"),
            }
        }
        found
    }
}

/// `mapping[new] = old` when both lists hold the same distinct parameters.
fn parameter_permutation(old: &Method<'_>, new: &Method<'_>) -> Option<Vec<usize>> {
    let old_params: Vec<String> = old.parameters().iter().map(|p| p.stripped_text()).collect();
    let new_params: Vec<String> = new.parameters().iter().map(|p| p.stripped_text()).collect();
    if old_params.len() != new_params.len() || old_params.len() < 2 {
        return None;
    }

    let mut mapping = Vec::with_capacity(new_params.len());
    for param in &new_params {
        let mut positions = old_params
            .iter()
            .enumerate()
            .filter(|(_, p)| *p == param)
            .map(|(i, _)| i);
        let (Some(old_index), None) = (positions.next(), positions.next()) else {
            return None;
        };
        mapping.push(old_index);
    }
    Some(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEFORE: &str = r#"
fn transfer(from: u32, to: u32, amount: u64) -> bool {
    from != to && amount > 0
}
"#;

    const AFTER: &str = r#"
fn transfer(amount: u64, from: u32, to: u32) -> bool {
    from != to && amount > 0
}
"#;

    fn trees(before: &str, after: &str) -> (Arc<SyntaxTree>, Arc<SyntaxTree>) {
        (
            Arc::new(SyntaxTree::parse(before).unwrap()),
            Arc::new(SyntaxTree::parse(after).unwrap()),
        )
    }

    #[test]
    fn detects_parameter_reorder() {
        let (before, after) = trees(BEFORE, AFTER);
        let found = ChangeSignatureDetector.detect(&before, &after, &DetectionSettings::default());
        assert_eq!(found.len(), 1);

        let Refactoring::ChangeSignature(change) = &found[0] else {
            panic!("expected change-signature");
        };
        assert_eq!(change.mapping(), &[2, 0, 1]);
        assert_eq!(change.declaration, DeclarationHandle::new(None, "transfer", 3));
        assert_eq!(
            change.reorder(&["a", "b", "c"]).unwrap(),
            vec!["c", "a", "b"]
        );
    }

    #[test]
    fn unchanged_signature_is_not_reported() {
        let (before, after) = trees(BEFORE, BEFORE);
        assert!(!ChangeSignatureDetector.has_refactoring(&before, &after, &DetectionSettings::default()));
    }

    #[test]
    fn renamed_parameter_is_not_a_reorder() {
        let after = BEFORE.replace("amount: u64", "value: u64");
        let (before, after) = trees(BEFORE, &after);
        assert!(!ChangeSignatureDetector.has_refactoring(&before, &after, &DetectionSettings::default()));
    }

    #[test]
    fn external_mapping_is_validated() {
        let (before, after) = trees(BEFORE, AFTER);
        let old = before.methods()[0].node.id();
        let new = after.methods()[0].node.id();

        let err = ChangeSignature::new(before.clone(), after.clone(), old, new, vec![0, 1])
            .unwrap_err();
        assert_eq!(err, SignatureError::ArityMismatch { mapping: 2, arity: 3 });

        let err = ChangeSignature::new(before.clone(), after.clone(), old, new, vec![0, 0, 1])
            .unwrap_err();
        assert!(matches!(err, SignatureError::NotAPermutation(_)));

        let ok = ChangeSignature::new(before, after, old, new, vec![0, 1, 2]).unwrap();
        assert!(ok.is_identity());
    }
}

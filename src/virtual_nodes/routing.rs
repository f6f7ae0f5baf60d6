//! Override routing
//!
//! Given a concrete node, routing decides which virtual node (if any) replaces
//! the node's identity in the result stream and which virtual nodes are merely
//! inserted next to it.
//!
//! Fixed rules never compete: each applicable one contributes its node with
//! its own [`InsertionHint`]. Overridable rules compete through the static
//! override relation each rule declares; the single applicant no other
//! applicant overrides wins and is returned with [`InsertionHint::None`].
//! Anything else is a registry bug and fails with
//! [`QueryError::OverrideConflict`].

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::error::QueryError;
use crate::ir::node::NodeRef;
use crate::ir::virtual_node::{VirtualNode, VirtualNodeKind};
use crate::virtual_nodes::rules::{standard_rules, InsertionHint, Overridability, VirtualNodeQuery};

/// A virtual node together with where it goes relative to the real node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutedNode<'t> {
    pub hint: InsertionHint,
    pub node: VirtualNode<'t>,
}

/// Source of virtual nodes consulted by the walker at every visited node.
pub trait VirtualNodeSource: Send + Sync {
    /// Routes one concrete node.
    ///
    /// # Returns
    /// Zero or more routed nodes. At most one should carry
    /// [`InsertionHint::None`]; the walker rejects more.
    fn resolve<'t>(&self, node: NodeRef<'t>) -> Result<Vec<RoutedNode<'t>>, QueryError>;
}

static STANDARD: Lazy<VirtualNodeRegistry> = Lazy::new(|| {
    VirtualNodeRegistry::new(standard_rules()).expect("standard virtual node rules are consistent")
});

/// A validated set of synthesis rules.
#[derive(Debug)]
pub struct VirtualNodeRegistry {
    rules: Vec<Box<dyn VirtualNodeQuery>>,
}

impl VirtualNodeRegistry {
    /// Validates and registers `rules`.
    ///
    /// # Errors
    /// * [`QueryError::InvalidArgument`] if a kind is registered twice or a
    ///   rule claims the `Empty` kind
    /// * [`QueryError::IsolatedOverride`] if a rule declares an override of a
    ///   kind no registered rule provides
    pub fn new(rules: Vec<Box<dyn VirtualNodeQuery>>) -> Result<Self, QueryError> {
        let mut kinds = HashSet::new();
        for rule in &rules {
            if rule.kind() == VirtualNodeKind::Empty {
                return Err(QueryError::invalid_argument(
                    "rules",
                    "the Empty kind cannot have a synthesis rule",
                ));
            }
            if !kinds.insert(rule.kind()) {
                return Err(QueryError::invalid_argument(
                    "rules",
                    format!("{} is registered more than once", rule.kind()),
                ));
            }
        }

        for rule in &rules {
            if let Some(target) = rule
                .overridability()
                .overrides()
                .iter()
                .find(|target| !kinds.contains(*target))
            {
                return Err(QueryError::IsolatedOverride {
                    rule: rule.kind(),
                    target: *target,
                });
            }
        }

        debug!("Registered {} virtual node rule(s)", rules.len());
        Ok(Self { rules })
    }

    /// The eight built-in rules, registered once per process.
    pub fn standard() -> &'static VirtualNodeRegistry {
        &STANDARD
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = VirtualNodeKind> + '_ {
        self.rules.iter().map(|rule| rule.kind())
    }

    /// Picks the overridable applicant no other applicant overrides.
    fn select_winner<'r>(
        node: NodeRef<'_>,
        applicants: &[&'r dyn VirtualNodeQuery],
    ) -> Result<Option<&'r dyn VirtualNodeQuery>, QueryError> {
        match applicants {
            [] => return Ok(None),
            [single] => return Ok(Some(*single)),
            _ => {}
        }

        let undominated: Vec<&'r dyn VirtualNodeQuery> = applicants
            .iter()
            .copied()
            .filter(|candidate| {
                !applicants.iter().any(|other| {
                    other.kind() != candidate.kind()
                        && other.overridability().overrides().contains(&candidate.kind())
                })
            })
            .collect();

        match undominated.as_slice() {
            [winner] => {
                trace!(
                    "{} wins over {} other rule(s) at {:?}",
                    winner.kind(),
                    applicants.len() - 1,
                    node
                );
                Ok(Some(*winner))
            }
            [] => Err(QueryError::OverrideConflict {
                node: node.kind(),
                rules: applicants.iter().map(|rule| rule.kind()).collect(),
            }),
            _ => Err(QueryError::OverrideConflict {
                node: node.kind(),
                rules: undominated.iter().map(|rule| rule.kind()).collect(),
            }),
        }
    }
}

impl VirtualNodeSource for VirtualNodeRegistry {
    fn resolve<'t>(&self, node: NodeRef<'t>) -> Result<Vec<RoutedNode<'t>>, QueryError> {
        let mut routed = Vec::new();
        let mut overridable: Vec<&dyn VirtualNodeQuery> = Vec::new();

        for rule in self.rules.iter().filter(|rule| rule.can_apply(node)) {
            match rule.overridability() {
                Overridability::Fixed(hint) => routed.push(RoutedNode {
                    hint,
                    node: rule.synthesize(node)?,
                }),
                Overridability::Overridable { .. } => overridable.push(rule.as_ref()),
            }
        }

        if let Some(winner) = Self::select_winner(node, &overridable)? {
            routed.push(RoutedNode {
                hint: InsertionHint::None,
                node: winner.synthesize(node)?,
            });
        }

        Ok(routed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::{ChildRole, Span, SyntaxKind, SyntaxTreeBuilder};

    #[test]
    fn test_standard_registry_is_valid() {
        let registry = VirtualNodeRegistry::standard();
        assert_eq!(registry.len(), 8);
        assert!(registry.kinds().all(|kind| kind != VirtualNodeKind::Empty));
    }

    #[test]
    fn test_try_body_overrides_nested_block() {
        let mut b = SyntaxTreeBuilder::from_text("", None);
        b.start_node(SyntaxKind::IfStatement, Span::default()).unwrap();
        let block = b.start_node(SyntaxKind::Block, Span::default()).unwrap();
        b.set_role(block, ChildRole::Consequence);
        b.start_node(SyntaxKind::TryStatement, Span::default()).unwrap();
        b.start_node(SyntaxKind::Block, Span::default()).unwrap();
        for _ in 0..4 {
            b.finish_node().unwrap();
        }
        let tree = b.finish().unwrap();
        let try_block = tree.preorder().nth(3).unwrap();

        let routed = VirtualNodeRegistry::standard().resolve(try_block).unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].hint, InsertionHint::None);
        assert_eq!(routed[0].node.kind(), VirtualNodeKind::TryBody);

        let if_block = tree.preorder().nth(1).unwrap();
        let routed = VirtualNodeRegistry::standard().resolve(if_block).unwrap();
        assert_eq!(routed[0].node.kind(), VirtualNodeKind::IfBody);
    }

    #[test]
    fn test_method_body_is_routed_after() {
        let mut b = SyntaxTreeBuilder::from_text("", None);
        b.start_node(SyntaxKind::MethodDeclaration, Span::default()).unwrap();
        b.start_node(SyntaxKind::ArrowExpressionClause, Span::default()).unwrap();
        b.finish_node().unwrap();
        b.finish_node().unwrap();
        let tree = b.finish().unwrap();

        let routed = VirtualNodeRegistry::standard().resolve(tree.root()).unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].hint, InsertionHint::After);
        assert_eq!(routed[0].node.kind(), VirtualNodeKind::MethodBody);
    }

    #[test]
    fn test_duplicate_and_empty_kinds_are_rejected() {
        use crate::virtual_nodes::rules::{NestedBlockQuery, TryBodyQuery};

        let duplicate = VirtualNodeRegistry::new(vec![Box::new(NestedBlockQuery), Box::new(NestedBlockQuery)]);
        assert!(matches!(duplicate, Err(QueryError::InvalidArgument { .. })));

        let isolated = VirtualNodeRegistry::new(vec![Box::new(TryBodyQuery)]);
        assert!(matches!(
            isolated,
            Err(QueryError::IsolatedOverride { rule: VirtualNodeKind::TryBody, target: VirtualNodeKind::MethodBody })
        ));
    }
}

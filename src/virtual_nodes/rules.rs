//! Virtual node synthesis rules
//!
//! Each rule is a stateless unit struct implementing [`VirtualNodeQuery`]. It
//! decides whether it applies to a concrete node, builds the virtual node, and
//! declares how it competes with other rules for the same node.
//!
//! `synthesize` re-validates its input: a node of the wrong kind is reported as
//! [`QueryError::SynthesisMisuse`], a node of the right kind that fails
//! `can_apply` as [`QueryError::InvalidArgument`].

use std::fmt;

use tracing::trace;

use crate::error::QueryError;
use crate::ir::node::{ChildRole, NodeRef, SyntaxKind};
use crate::ir::virtual_node::{VirtualNode, VirtualNodeKind};

/// Where a non-overridable rule's node goes relative to the real node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertionHint {
    /// Replaces the real node.
    None,
    Before,
    After,
}

/// How a rule competes with other rules applying to the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overridability {
    /// The rule replaces the real node. When several overridable rules apply,
    /// the one not overridden by any other wins.
    Overridable {
        overrides: &'static [VirtualNodeKind],
    },
    /// The rule always contributes its node at a fixed position.
    Fixed(InsertionHint),
}

impl Overridability {
    pub fn overrides(&self) -> &'static [VirtualNodeKind] {
        match self {
            Overridability::Overridable { overrides } => overrides,
            Overridability::Fixed(_) => &[],
        }
    }
}

/// A synthesis rule for one virtual node kind.
pub trait VirtualNodeQuery: Send + Sync + fmt::Debug {
    fn kind(&self) -> VirtualNodeKind;

    fn can_apply(&self, node: NodeRef<'_>) -> bool;

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError>;

    fn overridability(&self) -> Overridability;
}

const CONTROL_FLOW_OVERRIDES: &[VirtualNodeKind] =
    &[VirtualNodeKind::MethodBody, VirtualNodeKind::NestedBlock];

/// Rejects nodes of a kind the rule can never apply to, then nodes the rule
/// does not apply to.
fn validate(
    rule: &dyn VirtualNodeQuery,
    node: NodeRef<'_>,
    expected: &'static str,
    compatible: bool,
) -> Result<(), QueryError> {
    if !compatible {
        return Err(QueryError::SynthesisMisuse {
            rule: rule.kind(),
            expected,
            actual: node.kind(),
        });
    }
    if !rule.can_apply(node) {
        return Err(QueryError::invalid_argument(
            "node",
            format!("{} does not apply to {:?}", rule.kind(), node),
        ));
    }
    trace!("Synthesizing {} from {:?}", rule.kind(), node);
    Ok(())
}

fn parent_kind(node: NodeRef<'_>) -> Option<SyntaxKind> {
    node.parent().map(|parent| parent.kind())
}

fn method_body<'t>(method: NodeRef<'t>) -> Option<NodeRef<'t>> {
    method.children().find(|child| {
        matches!(child.kind(), SyntaxKind::Block | SyntaxKind::ArrowExpressionClause)
    })
}

/// Method declaration with a block or arrow body. Inserted after the method.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodBodyQuery;

impl VirtualNodeQuery for MethodBodyQuery {
    fn kind(&self) -> VirtualNodeKind {
        VirtualNodeKind::MethodBody
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        node.kind() == SyntaxKind::MethodDeclaration && method_body(node).is_some()
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        validate(self, node, "a method declaration", node.kind() == SyntaxKind::MethodDeclaration)?;
        let body = method_body(node).ok_or_else(|| QueryError::invalid_argument("node", "method has no body"))?;
        Ok(VirtualNode::MethodBody { method: node, body })
    }

    fn overridability(&self) -> Overridability {
        Overridability::Fixed(InsertionHint::After)
    }
}

/// Property whose accessors all lack a body: `{ get; set; }`, with or
/// without an initializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoPropertyQuery;

impl AutoPropertyQuery {
    fn accessor_list<'t>(node: NodeRef<'t>) -> Option<NodeRef<'t>> {
        node.first_child_of_kind(SyntaxKind::AccessorList)
    }
}

impl VirtualNodeQuery for AutoPropertyQuery {
    fn kind(&self) -> VirtualNodeKind {
        VirtualNodeKind::AutoProperty
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        if node.kind() != SyntaxKind::PropertyDeclaration {
            return false;
        }
        let Some(list) = Self::accessor_list(node) else {
            return false;
        };
        let mut accessors = list
            .children()
            .filter(|child| child.kind() == SyntaxKind::AccessorDeclaration)
            .peekable();
        accessors.peek().is_some()
            && accessors.all(|accessor| {
                !accessor.has_child_of_kind(SyntaxKind::Block)
                    && !accessor.has_child_of_kind(SyntaxKind::ArrowExpressionClause)
            })
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        validate(self, node, "a property declaration", node.kind() == SyntaxKind::PropertyDeclaration)?;
        let accessors = Self::accessor_list(node)
            .ok_or_else(|| QueryError::invalid_argument("node", "property has no accessor list"))?;
        Ok(VirtualNode::AutoProperty { property: node, accessors })
    }

    fn overridability(&self) -> Overridability {
        Overridability::Overridable { overrides: &[] }
    }
}

/// Property with an arrow body and no accessor list: `int X => 5;`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyPropertyQuery;

impl VirtualNodeQuery for ReadOnlyPropertyQuery {
    fn kind(&self) -> VirtualNodeKind {
        VirtualNodeKind::ReadOnlyProperty
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        node.kind() == SyntaxKind::PropertyDeclaration
            && node.has_child_of_kind(SyntaxKind::ArrowExpressionClause)
            && !node.has_child_of_kind(SyntaxKind::AccessorList)
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        validate(self, node, "a property declaration", node.kind() == SyntaxKind::PropertyDeclaration)?;
        let arrow = node
            .first_child_of_kind(SyntaxKind::ArrowExpressionClause)
            .ok_or_else(|| QueryError::invalid_argument("node", "property has no arrow body"))?;
        Ok(VirtualNode::ReadOnlyProperty { property: node, arrow })
    }

    fn overridability(&self) -> Overridability {
        Overridability::Overridable { overrides: &[] }
    }
}

/// The protected block of a try statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct TryBodyQuery;

impl VirtualNodeQuery for TryBodyQuery {
    fn kind(&self) -> VirtualNodeKind {
        VirtualNodeKind::TryBody
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        node.kind() == SyntaxKind::Block && parent_kind(node) == Some(SyntaxKind::TryStatement)
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        validate(self, node, "a block", node.kind() == SyntaxKind::Block)?;
        let try_statement = node
            .parent()
            .ok_or_else(|| QueryError::invalid_argument("node", "block has no parent"))?;
        Ok(VirtualNode::TryBody { try_statement, block: node })
    }

    fn overridability(&self) -> Overridability {
        Overridability::Overridable { overrides: CONTROL_FLOW_OVERRIDES }
    }
}

/// The condition expression of an if statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfConditionQuery;

impl VirtualNodeQuery for IfConditionQuery {
    fn kind(&self) -> VirtualNodeKind {
        VirtualNodeKind::IfCondition
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        node.kind().is_expression() && parent_kind(node) == Some(SyntaxKind::IfStatement)
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        validate(self, node, "an expression", node.kind().is_expression())?;
        let if_statement = node
            .parent()
            .ok_or_else(|| QueryError::invalid_argument("node", "condition has no parent"))?;
        Ok(VirtualNode::IfCondition { if_statement, condition: node })
    }

    fn overridability(&self) -> Overridability {
        Overridability::Overridable { overrides: CONTROL_FLOW_OVERRIDES }
    }
}

/// The statement run when an if condition holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfBodyQuery;

impl VirtualNodeQuery for IfBodyQuery {
    fn kind(&self) -> VirtualNodeKind {
        VirtualNodeKind::IfBody
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        node.kind().is_statement()
            && node.role() != Some(ChildRole::Alternative)
            && parent_kind(node) == Some(SyntaxKind::IfStatement)
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        validate(self, node, "a statement", node.kind().is_statement())?;
        let if_statement = node
            .parent()
            .ok_or_else(|| QueryError::invalid_argument("node", "statement has no parent"))?;
        Ok(VirtualNode::IfBody { if_statement, statement: node })
    }

    fn overridability(&self) -> Overridability {
        Overridability::Overridable { overrides: CONTROL_FLOW_OVERRIDES }
    }
}

/// The statement of an else clause, including an `else if` chain link.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElseBodyQuery;

impl VirtualNodeQuery for ElseBodyQuery {
    fn kind(&self) -> VirtualNodeKind {
        VirtualNodeKind::ElseBody
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        node.kind().is_statement() && parent_kind(node) == Some(SyntaxKind::ElseClause)
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        validate(self, node, "a statement", node.kind().is_statement())?;
        let else_clause = node
            .parent()
            .ok_or_else(|| QueryError::invalid_argument("node", "statement has no parent"))?;
        Ok(VirtualNode::ElseBody { else_clause, statement: node })
    }

    fn overridability(&self) -> Overridability {
        Overridability::Overridable { overrides: CONTROL_FLOW_OVERRIDES }
    }
}

/// A block, arrow clause or expression nested directly in control flow.
///
/// The lowest-priority rule: every other control-flow rule overrides it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NestedBlockQuery;

impl NestedBlockQuery {
    fn is_container(kind: SyntaxKind) -> bool {
        matches!(kind, SyntaxKind::Block | SyntaxKind::ArrowExpressionClause) || kind.is_expression()
    }

    /// Control-flow statements and clauses are nested-block parents, as are
    /// blocks and arrow clauses sitting (transitively) inside one. A method
    /// body is never one.
    fn is_nested_block_parent(node: NodeRef<'_>) -> bool {
        let mut current = node;
        loop {
            match current.kind() {
                SyntaxKind::TryStatement
                | SyntaxKind::CatchClause
                | SyntaxKind::FinallyClause
                | SyntaxKind::ElseClause
                | SyntaxKind::IfStatement
                | SyntaxKind::ForStatement
                | SyntaxKind::ForEachStatement
                | SyntaxKind::WhileStatement
                | SyntaxKind::DoStatement => return true,
                SyntaxKind::Block | SyntaxKind::ArrowExpressionClause => match current.parent() {
                    Some(parent) if parent.kind() != SyntaxKind::MethodDeclaration => current = parent,
                    _ => return false,
                },
                _ => return false,
            }
        }
    }
}

impl VirtualNodeQuery for NestedBlockQuery {
    fn kind(&self) -> VirtualNodeKind {
        VirtualNodeKind::NestedBlock
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        Self::is_container(node.kind()) && node.parent().is_some_and(Self::is_nested_block_parent)
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        validate(
            self,
            node,
            "a block, arrow clause or expression",
            Self::is_container(node.kind()),
        )?;
        Ok(VirtualNode::NestedBlock { container: node })
    }

    fn overridability(&self) -> Overridability {
        Overridability::Overridable { overrides: &[] }
    }
}

/// The rules registered by
/// [`VirtualNodeRegistry::standard`](super::routing::VirtualNodeRegistry::standard).
pub fn standard_rules() -> Vec<Box<dyn VirtualNodeQuery>> {
    vec![
        Box::new(MethodBodyQuery),
        Box::new(AutoPropertyQuery),
        Box::new(ReadOnlyPropertyQuery),
        Box::new(TryBodyQuery),
        Box::new(IfConditionQuery),
        Box::new(IfBodyQuery),
        Box::new(ElseBodyQuery),
        Box::new(NestedBlockQuery),
    ]
}

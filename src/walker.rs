//! Pre-order tree walker
//!
//! The walker visits every node of a [`SyntaxTree`] exactly once, in document
//! order, and never prunes: a class that fails the query still has its
//! methods visited. At each node it asks a [`VirtualNodeSource`] how the node
//! is routed, picks the candidate identity (the replacing virtual node, or the
//! real node), and emits the candidate together with its `Before`/`After`
//! insertions when the candidate passes the query.
//!
//! Scope tracking is a cursor owned by one traversal. It holds the scope
//! nodes enclosing the current position; a candidate passes a scoped query
//! only when its anchor is structurally nested inside one of them, so sibling
//! scopes never leak matches into each other.

use tracing::{debug, trace};

use crate::error::QueryError;
use crate::ir::node::{NodeRef, SyntaxTree};
use crate::ir::virtual_node::CombinedNode;
use crate::query::builder::Query;
use crate::virtual_nodes::routing::{RoutedNode, VirtualNodeSource};
use crate::virtual_nodes::rules::InsertionHint;

/// Stack of matches collected by one traversal.
#[derive(Debug, Default)]
pub struct MatchAccumulator<'t> {
    items: Vec<CombinedNode<'t>>,
}

impl<'t> MatchAccumulator<'t> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, node: CombinedNode<'t>) {
        self.items.push(node);
    }

    /// Most recently pushed match.
    pub fn peek(&self) -> Result<&CombinedNode<'t>, QueryError> {
        self.items.last().ok_or(QueryError::EmptyAccumulator)
    }

    pub fn pop(&mut self) -> Result<CombinedNode<'t>, QueryError> {
        self.items.pop().ok_or(QueryError::EmptyAccumulator)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<CombinedNode<'t>> {
        self.items
    }
}

/// Outcome of one traversal.
#[derive(Debug)]
pub struct WalkResult<'t> {
    /// Matches in document order.
    pub matches: Vec<CombinedNode<'t>>,
    /// Number of real nodes visited.
    pub visited: usize,
}

/// Scope nodes enclosing the node being visited, outermost first.
struct ScopeCursor<'t> {
    open: Vec<NodeRef<'t>>,
}

impl<'t> ScopeCursor<'t> {
    fn new() -> Self {
        Self { open: Vec::new() }
    }

    /// Drops scopes the traversal has left, then opens `node` if it is a
    /// scope itself.
    fn enter(&mut self, node: NodeRef<'t>, query: &Query) {
        while let Some(scope) = self.open.last() {
            if node.is_descendant_of(*scope) {
                break;
            }
            self.open.pop();
        }
        if query.is_scope(node) {
            trace!("Entering scope {:?}", node);
            self.open.push(node);
        }
    }

    fn contains(&self, node: NodeRef<'_>) -> bool {
        self.open.iter().any(|scope| node.is_descendant_of(*scope))
    }
}

/// Runs one [`Query`] over syntax trees.
///
/// The walker borrows the query and the virtual node source; both are
/// read-only, so one walker (or many) can be used from several threads.
pub struct TreeWalker<'q> {
    query: &'q Query,
    source: &'q dyn VirtualNodeSource,
}

impl<'q> TreeWalker<'q> {
    pub fn new(query: &'q Query, source: &'q dyn VirtualNodeSource) -> Self {
        Self { query, source }
    }

    /// Collects every match in `tree`.
    ///
    /// # Errors
    /// Routing failures ([`QueryError::OverrideConflict`] and friends) and
    /// [`QueryError::DoubleReplacement`] abort the traversal.
    pub fn walk<'t>(&self, tree: &'t SyntaxTree) -> Result<WalkResult<'t>, QueryError> {
        let mut accumulator = MatchAccumulator::new();
        let visited = self.traverse(tree, &mut accumulator)?;
        debug!(
            "Visited {} node(s) in {:?}, {} match(es)",
            visited,
            tree.path(),
            accumulator.len()
        );
        Ok(WalkResult {
            matches: accumulator.into_vec(),
            visited,
        })
    }

    /// The last match in document order, which for a position query is the
    /// innermost node containing the position.
    ///
    /// # Errors
    /// [`QueryError::EmptyAccumulator`] when nothing matched.
    pub fn innermost<'t>(&self, tree: &'t SyntaxTree) -> Result<CombinedNode<'t>, QueryError> {
        let mut accumulator = MatchAccumulator::new();
        self.traverse(tree, &mut accumulator)?;
        accumulator.pop()
    }

    fn traverse<'t>(
        &self,
        tree: &'t SyntaxTree,
        accumulator: &mut MatchAccumulator<'t>,
    ) -> Result<usize, QueryError> {
        let mut scopes = ScopeCursor::new();
        let mut visited = 0;
        for node in tree.preorder() {
            visited += 1;
            self.visit(node, &mut scopes, accumulator)?;
        }
        Ok(visited)
    }

    fn visit<'t>(
        &self,
        node: NodeRef<'t>,
        scopes: &mut ScopeCursor<'t>,
        accumulator: &mut MatchAccumulator<'t>,
    ) -> Result<(), QueryError> {
        let routed = self.source.resolve(node)?;

        let replacements = routed.iter().filter(|r| r.hint == InsertionHint::None).count();
        if replacements > 1 {
            return Err(QueryError::DoubleReplacement {
                node: node.kind(),
                count: replacements,
            });
        }

        scopes.enter(node, self.query);

        let candidate = routed
            .iter()
            .find(|r| r.hint == InsertionHint::None)
            .map(|r| CombinedNode::Virtual(r.node))
            .unwrap_or(CombinedNode::Real(node));

        if !self.accepts(&candidate, scopes) {
            return Ok(());
        }

        trace!("Matched {:?} ({})", candidate.anchor(), candidate.virtual_kind());
        self.emit_insertions(&routed, InsertionHint::Before, scopes, accumulator);
        accumulator.push(candidate);
        self.emit_insertions(&routed, InsertionHint::After, scopes, accumulator);
        Ok(())
    }

    fn emit_insertions<'t>(
        &self,
        routed: &[RoutedNode<'t>],
        hint: InsertionHint,
        scopes: &ScopeCursor<'t>,
        accumulator: &mut MatchAccumulator<'t>,
    ) {
        for inserted in routed.iter().filter(|r| r.hint == hint) {
            let candidate = CombinedNode::Virtual(inserted.node);
            if self.accepts(&candidate, scopes) {
                accumulator.push(candidate);
            }
        }
    }

    fn accepts(&self, candidate: &CombinedNode<'_>, scopes: &ScopeCursor<'_>) -> bool {
        if self.query.has_scope() && !scopes.contains(candidate.anchor()) {
            return false;
        }
        self.query.matches(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::{Span, SyntaxKind, SyntaxTreeBuilder};
    use crate::ir::virtual_node::{VirtualNode, VirtualNodeKind};
    use crate::query::builder::QueryBuilder;
    use crate::query::descriptor::{QueryDescriptor, ScopeKind, TargetKind};
    use crate::virtual_nodes::routing::VirtualNodeRegistry;

    /// Routes every node to two replacements.
    struct DoubleSource;

    impl VirtualNodeSource for DoubleSource {
        fn resolve<'t>(&self, node: NodeRef<'t>) -> Result<Vec<RoutedNode<'t>>, QueryError> {
            let routed = RoutedNode {
                hint: InsertionHint::None,
                node: VirtualNode::NestedBlock { container: node },
            };
            Ok(vec![routed, routed])
        }
    }

    fn class_tree(classes: &[(&str, Vec<&str>)]) -> SyntaxTree {
        let mut b = SyntaxTreeBuilder::from_text("", None);
        b.start_node(SyntaxKind::CompilationUnit, Span::default()).unwrap();
        for (class_name, methods) in classes {
            let class = b.start_node(SyntaxKind::ClassDeclaration, Span::default()).unwrap();
            b.set_name(class, *class_name);
            for method_name in methods.iter() {
                let method = b.start_node(SyntaxKind::MethodDeclaration, Span::default()).unwrap();
                b.set_name(method, *method_name);
                b.start_node(SyntaxKind::Block, Span::default()).unwrap();
                b.finish_node().unwrap();
                b.finish_node().unwrap();
            }
            b.finish_node().unwrap();
        }
        b.finish_node().unwrap();
        b.finish().unwrap()
    }

    #[test]
    fn test_accumulator_errors_when_empty() {
        let mut accumulator = MatchAccumulator::new();
        assert_eq!(accumulator.peek().unwrap_err(), QueryError::EmptyAccumulator);
        assert_eq!(accumulator.pop().unwrap_err(), QueryError::EmptyAccumulator);
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_walk_visits_every_node() {
        let tree = class_tree(&[("Alpha", vec!["Run", "Stop"]), ("Beta", vec!["Run"])]);
        let query = QueryBuilder::build(&QueryDescriptor::default()).unwrap();
        let walker = TreeWalker::new(&query, VirtualNodeRegistry::standard());
        let result = walker.walk(&tree).unwrap();
        assert_eq!(result.visited, tree.len());
        // Every real node plus one MethodBody insertion per method.
        assert_eq!(result.matches.len(), tree.len() + 3);
        let bodies = result
            .matches
            .iter()
            .filter(|m| m.virtual_kind() == VirtualNodeKind::MethodBody)
            .count();
        assert_eq!(bodies, 3);
    }

    #[test]
    fn test_method_body_follows_its_method() {
        let tree = class_tree(&[("Alpha", vec!["Run"])]);
        let query = QueryBuilder::build(&QueryDescriptor::default()).unwrap();
        let walker = TreeWalker::new(&query, VirtualNodeRegistry::standard());
        let kinds: Vec<_> = walker
            .walk(&tree)
            .unwrap()
            .matches
            .iter()
            .map(|m| (m.kind(), m.virtual_kind()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (SyntaxKind::CompilationUnit, VirtualNodeKind::Empty),
                (SyntaxKind::ClassDeclaration, VirtualNodeKind::Empty),
                (SyntaxKind::MethodDeclaration, VirtualNodeKind::Empty),
                (SyntaxKind::Block, VirtualNodeKind::MethodBody),
                (SyntaxKind::Block, VirtualNodeKind::Empty),
            ]
        );
    }

    #[test]
    fn test_scope_does_not_leak_into_sibling() {
        let tree = class_tree(&[("Alpha", vec!["Run"]), ("Beta", vec!["Run"])]);
        let query = QueryBuilder::build(&QueryDescriptor {
            target: TargetKind::Method,
            scope: ScopeKind::Class,
            scope_name: Some("Alpha".into()),
            ..Default::default()
        })
        .unwrap();
        let walker = TreeWalker::new(&query, VirtualNodeRegistry::standard());
        let matches = walker.walk(&tree).unwrap().matches;
        assert_eq!(matches.len(), 1);
        let class = matches[0].anchor().parent().unwrap();
        assert_eq!(class.name(), Some("Alpha"));
    }

    #[test]
    fn test_scope_is_restored_after_nested_scope() {
        // class Outer { class Inner { void A() {} } void B() {} }
        let mut b = SyntaxTreeBuilder::from_text("", None);
        let outer = b.start_node(SyntaxKind::ClassDeclaration, Span::default()).unwrap();
        b.set_name(outer, "Outer");
        let inner = b.start_node(SyntaxKind::ClassDeclaration, Span::default()).unwrap();
        b.set_name(inner, "Inner");
        let a = b.start_node(SyntaxKind::MethodDeclaration, Span::default()).unwrap();
        b.set_name(a, "A");
        b.finish_node().unwrap();
        b.finish_node().unwrap();
        let method_b = b.start_node(SyntaxKind::MethodDeclaration, Span::default()).unwrap();
        b.set_name(method_b, "B");
        b.finish_node().unwrap();
        b.finish_node().unwrap();
        let tree = b.finish().unwrap();

        let query = QueryBuilder::build(&QueryDescriptor {
            target: TargetKind::Method,
            scope: ScopeKind::Class,
            ..Default::default()
        })
        .unwrap();
        let walker = TreeWalker::new(&query, VirtualNodeRegistry::standard());
        let names: Vec<_> = walker
            .walk(&tree)
            .unwrap()
            .matches
            .iter()
            .filter_map(|m| m.identifier())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_double_replacement_is_rejected() {
        let tree = class_tree(&[]);
        let query = QueryBuilder::build(&QueryDescriptor::default()).unwrap();
        let walker = TreeWalker::new(&query, &DoubleSource);
        assert_eq!(
            walker.walk(&tree).unwrap_err(),
            QueryError::DoubleReplacement {
                node: SyntaxKind::CompilationUnit,
                count: 2
            }
        );
    }

    #[test]
    fn test_innermost_without_matches() {
        let tree = class_tree(&[("Alpha", vec![])]);
        let query = QueryBuilder::build(&QueryDescriptor {
            target: TargetKind::Method,
            ..Default::default()
        })
        .unwrap();
        let walker = TreeWalker::new(&query, VirtualNodeRegistry::standard());
        assert_eq!(walker.innermost(&tree).unwrap_err(), QueryError::EmptyAccumulator);
    }
}

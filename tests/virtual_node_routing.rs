use sharpgrep::error::QueryError;
use sharpgrep::ir::node::{NodeRef, Span, SyntaxKind, SyntaxTree, SyntaxTreeBuilder};
use sharpgrep::ir::virtual_node::{VirtualNode, VirtualNodeKind};
use sharpgrep::query::{QueryBuilder, QueryDescriptor};
use sharpgrep::virtual_nodes::{
    InsertionHint, Overridability, VirtualNodeQuery, VirtualNodeRegistry, VirtualNodeSource,
};
use sharpgrep::walker::TreeWalker;

/// A rule that applies to every block.
#[derive(Debug)]
struct BlockRule {
    kind: VirtualNodeKind,
    overridability: Overridability,
}

impl BlockRule {
    fn overriding(kind: VirtualNodeKind, overrides: &'static [VirtualNodeKind]) -> Box<dyn VirtualNodeQuery> {
        Box::new(Self {
            kind,
            overridability: Overridability::Overridable { overrides },
        })
    }

    fn fixed(kind: VirtualNodeKind, hint: InsertionHint) -> Box<dyn VirtualNodeQuery> {
        Box::new(Self {
            kind,
            overridability: Overridability::Fixed(hint),
        })
    }
}

impl VirtualNodeQuery for BlockRule {
    fn kind(&self) -> VirtualNodeKind {
        self.kind
    }

    fn can_apply(&self, node: NodeRef<'_>) -> bool {
        node.kind() == SyntaxKind::Block
    }

    fn synthesize<'t>(&self, node: NodeRef<'t>) -> Result<VirtualNode<'t>, QueryError> {
        Ok(match self.kind {
            VirtualNodeKind::MethodBody => VirtualNode::MethodBody { method: node, body: node },
            VirtualNodeKind::AutoProperty => VirtualNode::AutoProperty { property: node, accessors: node },
            VirtualNodeKind::TryBody => VirtualNode::TryBody { try_statement: node, block: node },
            VirtualNodeKind::IfBody => VirtualNode::IfBody { if_statement: node, statement: node },
            VirtualNodeKind::ElseBody => VirtualNode::ElseBody { else_clause: node, statement: node },
            _ => VirtualNode::NestedBlock { container: node },
        })
    }

    fn overridability(&self) -> Overridability {
        self.overridability
    }
}

fn block_tree() -> SyntaxTree {
    let mut b = SyntaxTreeBuilder::from_text("", None);
    b.start_node(SyntaxKind::CompilationUnit, Span::default()).unwrap();
    b.start_node(SyntaxKind::Block, Span::default()).unwrap();
    b.finish_node().unwrap();
    b.finish_node().unwrap();
    b.finish().unwrap()
}

fn block(tree: &SyntaxTree) -> NodeRef<'_> {
    tree.preorder().find(|node| node.kind() == SyntaxKind::Block).unwrap()
}

#[test]
fn test_siblings_overriding_a_common_rule_conflict() {
    use VirtualNodeKind::*;
    let registry = VirtualNodeRegistry::new(vec![
        BlockRule::overriding(NestedBlock, &[]),
        BlockRule::overriding(IfBody, &[NestedBlock]),
        BlockRule::overriding(ElseBody, &[NestedBlock]),
    ])
    .unwrap();

    let tree = block_tree();
    let err = registry.resolve(block(&tree)).unwrap_err();
    assert_eq!(
        err,
        QueryError::OverrideConflict {
            node: SyntaxKind::Block,
            rules: vec![IfBody, ElseBody],
        }
    );
}

#[test]
fn test_conflict_aborts_the_walk() {
    use VirtualNodeKind::*;
    let registry = VirtualNodeRegistry::new(vec![
        BlockRule::overriding(NestedBlock, &[]),
        BlockRule::overriding(IfBody, &[NestedBlock]),
        BlockRule::overriding(ElseBody, &[NestedBlock]),
    ])
    .unwrap();
    let query = QueryBuilder::build(&QueryDescriptor::default()).unwrap();

    let tree = block_tree();
    let result = TreeWalker::new(&query, &registry).walk(&tree);
    assert!(matches!(result, Err(QueryError::OverrideConflict { .. })));
}

#[test]
fn test_override_cycle_is_a_conflict() {
    use VirtualNodeKind::*;
    let registry = VirtualNodeRegistry::new(vec![
        BlockRule::overriding(IfBody, &[ElseBody]),
        BlockRule::overriding(ElseBody, &[IfBody]),
    ])
    .unwrap();

    let tree = block_tree();
    let err = registry.resolve(block(&tree)).unwrap_err();
    assert_eq!(
        err,
        QueryError::OverrideConflict {
            node: SyntaxKind::Block,
            rules: vec![IfBody, ElseBody],
        }
    );
}

#[test]
fn test_chain_resolves_to_the_top_rule() {
    use VirtualNodeKind::*;
    let registry = VirtualNodeRegistry::new(vec![
        BlockRule::overriding(NestedBlock, &[]),
        BlockRule::overriding(IfBody, &[NestedBlock]),
        BlockRule::overriding(ElseBody, &[IfBody, NestedBlock]),
    ])
    .unwrap();

    let tree = block_tree();
    let routed = registry.resolve(block(&tree)).unwrap();
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].hint, InsertionHint::None);
    assert_eq!(routed[0].node.kind(), ElseBody);
}

#[test]
fn test_isolated_override_is_rejected() {
    use VirtualNodeKind::*;
    let err = VirtualNodeRegistry::new(vec![BlockRule::overriding(IfBody, &[TryBody])]).unwrap_err();
    assert_eq!(err, QueryError::IsolatedOverride { rule: IfBody, target: TryBody });
}

#[test]
fn test_fixed_insertions_surround_the_candidate() {
    use VirtualNodeKind::*;
    let registry = VirtualNodeRegistry::new(vec![
        BlockRule::fixed(MethodBody, InsertionHint::After),
        BlockRule::fixed(AutoProperty, InsertionHint::Before),
        BlockRule::overriding(TryBody, &[]),
    ])
    .unwrap();
    let query = QueryBuilder::build(&QueryDescriptor::default()).unwrap();

    let tree = block_tree();
    let matches = TreeWalker::new(&query, &registry).walk(&tree).unwrap().matches;
    let kinds: Vec<_> = matches.iter().map(|m| m.virtual_kind()).collect();
    // Root first, then the block's insertions around its replacement.
    assert_eq!(kinds, vec![Empty, AutoProperty, TryBody, MethodBody]);
    assert!(matches[1..].iter().all(|m| m.kind() == SyntaxKind::Block));
}

use std::path::PathBuf;

use indoc::indoc;
use sharpgrep::ir::identifier::full_name;
use sharpgrep::ir::node::{Position, SyntaxKind, SyntaxTree};
use sharpgrep::ir::virtual_node::{CombinedNode, VirtualNodeKind};
use sharpgrep::parsers::csharp::parse_to_syntax_tree;
use sharpgrep::query::{AccessModifier, Query, QueryBuilder, QueryDescriptor, ScopeKind, TargetKind, TextSpan};
use sharpgrep::virtual_nodes::VirtualNodeRegistry;
use sharpgrep::walker::TreeWalker;

fn parse(code: &str) -> SyntaxTree {
    parse_to_syntax_tree(code, Some(PathBuf::from("src/Zoo/Cat.cs"))).unwrap()
}

fn build(descriptor: QueryDescriptor) -> Query {
    QueryBuilder::build(&descriptor).unwrap()
}

fn search<'t>(tree: &'t SyntaxTree, query: &Query) -> Vec<CombinedNode<'t>> {
    TreeWalker::new(query, VirtualNodeRegistry::standard())
        .walk(tree)
        .unwrap()
        .matches
}

fn identifiers(matches: &[CombinedNode<'_>]) -> Vec<String> {
    matches.iter().filter_map(|m| m.identifier()).collect()
}

/// Zero-based position of the first occurrence of `needle`.
fn point_of(code: &str, needle: &str) -> Position {
    let offset = code.find(needle).unwrap();
    let before = &code[..offset];
    let row = before.matches('\n').count();
    let column = offset - before.rfind('\n').map_or(0, |newline| newline + 1);
    Position::at(row, column)
}

#[test]
fn test_private_method_is_the_only_match() {
    let code = indoc! {r#"
        class Cat
        {
            public void Purr() { }
            public void Eat() { }
            private void Sleep() { }
        }
    "#};
    let tree = parse(code);
    let query = build(QueryDescriptor {
        target: TargetKind::Method,
        access: AccessModifier::Private,
        ..Default::default()
    });

    let matches = search(&tree, &query);
    assert_eq!(identifiers(&matches), vec!["Sleep"]);
    assert_eq!(matches[0].virtual_kind(), VirtualNodeKind::Empty);
}

#[test]
fn test_arrow_property_is_read_only_property() {
    let code = indoc! {r#"
        class Shape
        {
            int X => 5;
        }
    "#};
    let tree = parse(code);
    let query = build(QueryDescriptor {
        target: TargetKind::Property,
        ..Default::default()
    });

    let matches = search(&tree, &query);
    assert_eq!(matches.len(), 1);
    let CombinedNode::Virtual(property) = matches[0] else {
        panic!("expected a virtual node, got {:?}", matches[0]);
    };
    assert_eq!(property.kind(), VirtualNodeKind::ReadOnlyProperty);
    assert_eq!(property.base().kind(), SyntaxKind::ArrowExpressionClause);
    assert_eq!(matches[0].identifier().as_deref(), Some("X"));
}

#[test]
fn test_position_in_else_block_is_else_body() {
    let code = indoc! {r#"
        class Cat
        {
            void Decide(bool cond)
            {
                if (cond) { A(); } else { B(); }
            }
        }
    "#};
    let tree = parse(code);
    let span = TextSpan::point(Some(PathBuf::from("src/Zoo/Cat.cs")), point_of(code, "B()"));
    let query = QueryBuilder::from_span(span);

    let found = TreeWalker::new(&query, VirtualNodeRegistry::standard())
        .innermost(&tree)
        .unwrap();
    assert_eq!(found.virtual_kind(), VirtualNodeKind::ElseBody);
    assert_eq!(found.kind(), SyntaxKind::Block);
    let else_clause = found.anchor().parent().unwrap();
    assert_eq!(else_clause.kind(), SyntaxKind::ElseClause);
}

#[test]
fn test_position_in_if_condition_is_if_condition() {
    let code = indoc! {r#"
        class Cat
        {
            void Decide()
            {
                if (cond) { A(); }
            }
        }
    "#};
    let tree = parse(code);
    let span = TextSpan::point(None, point_of(code, "cond)"));
    let found = TreeWalker::new(&QueryBuilder::from_span(span), VirtualNodeRegistry::standard())
        .innermost(&tree)
        .unwrap();
    assert_eq!(found.virtual_kind(), VirtualNodeKind::IfCondition);
    // The condition's span covers the parentheses.
    let start = point_of(code, "(cond)");
    assert_eq!(found.span().start.line_col(), start.line_col());
}

#[test]
fn test_field_full_name_includes_namespace_and_class() {
    let code = indoc! {r#"
        namespace Zoo
        {
            class Cat
            {
                int lives;
            }
        }
    "#};
    let tree = parse(code);
    let query = build(QueryDescriptor {
        target: TargetKind::Field,
        ..Default::default()
    });

    let matches = search(&tree, &query);
    assert_eq!(matches.len(), 1);
    assert_eq!(full_name(matches[0].anchor(), false).unwrap(), "Zoo.Cat.lives");
    assert_eq!(full_name(matches[0].anchor(), true).unwrap(), "Cat.lives");
}

#[test]
fn test_namespace_scope_covers_both_namespace_forms() {
    let block_scoped = indoc! {r#"
        namespace Zoo
        {
            class Cat
            {
                int lives;
            }
        }
    "#};
    let file_scoped = indoc! {r#"
        namespace Zoo;

        class Cat
        {
            int lives;
        }
    "#};
    let query = build(QueryDescriptor {
        target: TargetKind::Field,
        scope: ScopeKind::Namespace,
        scope_name: Some("Zoo".to_string()),
        ..Default::default()
    });
    let elsewhere = build(QueryDescriptor {
        target: TargetKind::Field,
        scope: ScopeKind::Namespace,
        scope_name: Some("Aquarium".to_string()),
        ..Default::default()
    });

    for code in [block_scoped, file_scoped] {
        let tree = parse(code);
        let matches = search(&tree, &query);
        assert_eq!(matches.len(), 1, "{}", code);
        assert_eq!(full_name(matches[0].anchor(), false).unwrap(), "Zoo.Cat.lives");
        assert!(search(&tree, &elsewhere).is_empty(), "{}", code);
    }
}

#[test]
fn test_foreach_variable_is_not_reported_as_a_block() {
    let code = indoc! {r#"
        class Cat
        {
            void Groom(Brush[] brushes)
            {
                foreach (var brush in brushes) { Use(brush); }
            }
        }
    "#};
    let tree = parse(code);
    let nested: Vec<_> = search(&tree, &build(QueryDescriptor::default()))
        .iter()
        .filter(|m| m.virtual_kind() == VirtualNodeKind::NestedBlock)
        .map(|m| m.anchor().text())
        .collect();
    assert_eq!(nested, vec!["brushes", "{ Use(brush); }"]);
}

#[test]
fn test_any_public_excludes_internal_and_private() {
    let code = indoc! {r#"
        public class Cat
        {
            public int Age { get; set; }
            private int lives;
        }

        internal class Secret
        {
        }
    "#};
    let tree = parse(code);
    let query = build(QueryDescriptor {
        target: TargetKind::Any,
        access: AccessModifier::Public,
        ..Default::default()
    });

    let matches = search(&tree, &query);
    assert_eq!(identifiers(&matches), vec!["Cat", "Age"]);
    assert_eq!(matches[0].virtual_kind(), VirtualNodeKind::Empty);
    assert_eq!(matches[1].virtual_kind(), VirtualNodeKind::AutoProperty);
}

#[test]
fn test_scope_name_keeps_sibling_classes_apart() {
    let code = indoc! {r#"
        class Alpha
        {
            void Run() { }
        }

        class Beta
        {
            void Run() { }
        }
    "#};
    let tree = parse(code);
    let query = build(QueryDescriptor {
        target: TargetKind::Method,
        scope: ScopeKind::Class,
        scope_name: Some("Alpha".to_string()),
        ..Default::default()
    });

    let matches = search(&tree, &query);
    assert_eq!(matches.len(), 1);
    assert_eq!(full_name(matches[0].anchor(), false).unwrap(), "Alpha.Run");
}

#[test]
fn test_try_block_is_reported_once_as_try_body() {
    let code = indoc! {r#"
        class Cat
        {
            void Risky()
            {
                if (ready)
                {
                    try { Jump(); } catch { Land(); }
                }
            }
        }
    "#};
    let tree = parse(code);
    let query = build(QueryDescriptor::default());
    let matches = search(&tree, &query);

    let try_block = tree
        .preorder()
        .find(|node| {
            node.kind() == SyntaxKind::Block
                && node.parent().is_some_and(|p| p.kind() == SyntaxKind::TryStatement)
        })
        .unwrap();
    let reported: Vec<_> = matches.iter().filter(|m| m.anchor() == try_block).collect();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].virtual_kind(), VirtualNodeKind::TryBody);
}

#[test]
fn test_method_body_follows_its_method() {
    let code = indoc! {r#"
        class Cat
        {
            int Lives() => 9;
            void Purr() { Rumble(); }
        }
    "#};
    let tree = parse(code);
    let matches = search(&tree, &build(QueryDescriptor::default()));

    let kinds: Vec<_> = matches
        .iter()
        .filter(|m| {
            m.kind() == SyntaxKind::MethodDeclaration || m.virtual_kind() == VirtualNodeKind::MethodBody
        })
        .map(|m| (m.kind(), m.virtual_kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (SyntaxKind::MethodDeclaration, VirtualNodeKind::Empty),
            (SyntaxKind::ArrowExpressionClause, VirtualNodeKind::MethodBody),
            (SyntaxKind::MethodDeclaration, VirtualNodeKind::Empty),
            (SyntaxKind::Block, VirtualNodeKind::MethodBody),
        ]
    );
}

#[test]
fn test_name_and_exclude_filters() {
    let code = indoc! {r#"
        class Top
        {
            void Spin() { }
            void SpinFaster() { }
            void SpinSlower() { }
        }
    "#};
    let tree = parse(code);
    let query = build(QueryDescriptor {
        target: TargetKind::Method,
        name_contains: vec!["Spin".to_string()],
        name_excludes: vec!["Slower".to_string()],
        ..Default::default()
    });
    assert_eq!(identifiers(&search(&tree, &query)), vec!["Spin", "SpinFaster"]);

    let regex = build(QueryDescriptor {
        target: TargetKind::Method,
        name_contains: vec!["^Spin(Faster)?$".to_string()],
        regex: true,
        ..Default::default()
    });
    assert_eq!(identifiers(&search(&tree, &regex)), vec!["Spin", "SpinFaster"]);
}

#[test]
fn test_path_filter_and_multi_declarator_fields() {
    let code = indoc! {r#"
        class Cat
        {
            int x, y;
        }
    "#};
    let tree = parse(code);
    let matching = build(QueryDescriptor {
        target: TargetKind::Field,
        path_contains: vec!["Zoo".to_string(), "Cat.cs".to_string()],
        ..Default::default()
    });
    let matches = search(&tree, &matching);
    assert_eq!(identifiers(&matches), vec!["x"]);
    assert_eq!(
        sharpgrep::ir::identifier::declared_identifiers(matches[0].anchor()),
        vec!["x", "y"]
    );

    let elsewhere = build(QueryDescriptor {
        target: TargetKind::Field,
        path_contains: vec!["Zoo".to_string(), "Dog.cs".to_string()],
        ..Default::default()
    });
    assert!(search(&tree, &elsewhere).is_empty());
}

#[test]
fn test_locals_parameters_and_arguments() {
    let code = indoc! {r#"
        class Cat
        {
            void Feed(Bowl bowl)
            {
                var portion = 3;
                Eat(bowl.Size, portion);
            }
        }
    "#};
    let tree = parse(code);
    let ids = |target| identifiers(&search(&tree, &build(QueryDescriptor { target, ..Default::default() })));

    assert_eq!(ids(TargetKind::LocalVariable), vec!["portion"]);
    assert_eq!(ids(TargetKind::Parameter), vec!["bowl"]);
    assert_eq!(ids(TargetKind::Argument), vec!["bowl.Size", "portion"]);
}

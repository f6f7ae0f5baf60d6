//! Tree-Sitter parsing interface for C#
//!
//! Public entry points for parsing C# source with Tree-Sitter and lowering
//! the concrete syntax tree into a [`SyntaxTree`].

use std::path::PathBuf;

use ropey::Rope;
use tracing::debug;
use tree_sitter::{Parser, Tree};

use crate::ir::node::{SyntaxTree, SyntaxTreeBuilder};
use super::conversion::Lowering;
use super::ParseError;

/// Parse C# code into a Tree-Sitter syntax tree
///
/// # Arguments
/// * `code` - The C# source code to parse
///
/// # Returns
/// A Tree-Sitter Tree. Syntax errors do not fail the parse; they show up as
/// `ERROR` nodes in the tree.
pub fn parse_code(code: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|err| ParseError::Language(err.to_string()))?;
    parser.parse(code, None).ok_or(ParseError::Aborted)
}

/// Parse C# code and lower it into a [`SyntaxTree`]
///
/// # Arguments
/// * `code` - The C# source code
/// * `path` - File the code was read from, recorded on the tree
///
/// # Returns
/// The lowered tree, rooted at its compilation unit
pub fn parse_to_syntax_tree(code: &str, path: Option<PathBuf>) -> Result<SyntaxTree, ParseError> {
    let tree = parse_code(code)?;
    let root = tree.root_node();
    if root.has_error() {
        debug!("Parse tree for {:?} contains errors", path);
    }

    let rope = Rope::from_str(code);
    let builder = SyntaxTreeBuilder::new(rope.clone(), path);
    let mut lowering = Lowering::new(builder, &rope);
    lowering.lower_node(root, None, false)?;
    let syntax_tree = lowering.into_builder().finish()?;
    debug!("Lowered {} node(s)", syntax_tree.len());
    Ok(syntax_tree)
}

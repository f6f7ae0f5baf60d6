//! C# parser - Tree-Sitter based parsing and lowering
//!
//! # Architecture
//!
//! - `parsing`: Public API for parsing C# code using Tree-Sitter
//! - `conversion`: CST to syntax tree lowering
//!
//! # Usage
//!
//! ```ignore
//! use sharpgrep::parsers::csharp::parse_to_syntax_tree;
//!
//! let tree = parse_to_syntax_tree("class Cat { int lives; }", None)?;
//! assert_eq!(tree.root().kind(), SyntaxKind::CompilationUnit);
//! ```

pub mod conversion;
pub mod parsing;

use thiserror::Error;

use crate::error::QueryError;

pub use parsing::{parse_code, parse_to_syntax_tree};

/// Failures of the C# front end.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load the C# grammar: {0}")]
    Language(String),

    #[error("the parser gave up before producing a tree")]
    Aborted,

    #[error("failed to build the syntax tree: {0}")]
    Tree(#[from] QueryError),
}

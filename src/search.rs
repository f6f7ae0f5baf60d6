//! Multi-file search host
//!
//! Discovers `.cs` files with `walkdir`, parses and walks each one on the
//! Rayon thread pool, and turns matches into owned [`MatchReport`]s. Files
//! are independent: a file that fails to read, parse or walk is logged and
//! reported as a [`FileFailure`] while the others carry on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::QueryError;
use crate::ir::identifier;
use crate::ir::node::SyntaxKind;
use crate::ir::virtual_node::{CombinedNode, VirtualNodeKind};
use crate::parsers::csharp::parse_to_syntax_tree;
use crate::query::builder::Query;
use crate::virtual_nodes::routing::VirtualNodeSource;
use crate::walker::TreeWalker;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["bin", "obj", ".git", ".vs", "node_modules"];

/// Which matches of a file to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Every match, in document order.
    #[default]
    All,
    /// Only the last match, i.e. the innermost node at a position.
    Innermost,
}

/// Owned summary of one match. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub path: String,
    pub kind: SyntaxKind,
    pub virtual_kind: VirtualNodeKind,
    pub identifier: Option<String>,
    pub full_name: Option<String>,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl MatchReport {
    pub fn from_match(node: &CombinedNode<'_>) -> Self {
        let span = node.span();
        let anchor = node.anchor();
        Self {
            path: node
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
            kind: node.kind(),
            virtual_kind: node.virtual_kind(),
            identifier: node.identifier(),
            full_name: identifier::full_name(anchor, false).ok(),
            start_line: span.start.row + 1,
            start_column: span.start.column + 1,
            end_line: span.end.row + 1,
            end_column: span.end.column + 1,
        }
    }

    /// Kind label shown to users: the virtual kind when there is one.
    pub fn label(&self) -> &'static str {
        match self.virtual_kind {
            VirtualNodeKind::Empty => self.kind.as_str(),
            virtual_kind => virtual_kind.as_str(),
        }
    }
}

/// A file the search could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of searching many files.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Matches grouped by file, files in discovery order.
    pub reports: Vec<MatchReport>,
    pub failures: Vec<FileFailure>,
    pub files_searched: usize,
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn is_csharp_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "cs")
}

/// Expands `roots` into the list of C# files to search.
///
/// Files named explicitly are kept whatever their extension; directories are
/// walked for `.cs` files, skipping build output and VCS directories.
pub fn collect_source_files(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in roots {
        let metadata = std::fs::metadata(root)
            .with_context(|| format!("cannot access {}", root.display()))?;
        if metadata.is_file() {
            files.push(root.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry))
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Failed to read directory entry under {}: {}", root.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_csharp_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        debug!("Found {} C# file(s) under {}", found.len(), root.display());
        files.extend(found);
    }
    Ok(files)
}

/// Parses and searches one in-memory source.
///
/// An innermost search that finds nothing yields no reports rather than an
/// error.
pub fn search_source(
    code: &str,
    path: Option<PathBuf>,
    query: &Query,
    source: &dyn VirtualNodeSource,
    mode: SearchMode,
) -> Result<Vec<MatchReport>> {
    let tree = parse_to_syntax_tree(code, path)?;
    let walker = TreeWalker::new(query, source);
    match mode {
        SearchMode::All => {
            let result = walker.walk(&tree)?;
            Ok(result.matches.iter().map(MatchReport::from_match).collect())
        }
        SearchMode::Innermost => match walker.innermost(&tree) {
            Ok(node) => Ok(vec![MatchReport::from_match(&node)]),
            Err(QueryError::EmptyAccumulator) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        },
    }
}

/// Reads and searches one file.
pub fn search_file(
    path: &Path,
    query: &Query,
    source: &dyn VirtualNodeSource,
    mode: SearchMode,
) -> Result<Vec<MatchReport>> {
    let code = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    search_source(&code, Some(path.to_path_buf()), query, source, mode)
        .with_context(|| format!("failed to search {}", path.display()))
}

/// Searches every file under `roots` in parallel.
///
/// # Errors
/// Only discovery failures (a root that does not exist) are errors. Per-file
/// failures are collected in [`SearchOutcome::failures`].
pub fn search_paths(
    roots: &[PathBuf],
    query: &Query,
    source: &dyn VirtualNodeSource,
    mode: SearchMode,
) -> Result<SearchOutcome> {
    let files = collect_source_files(roots)?;
    info!("Searching {} file(s)", files.len());

    let results: Vec<(PathBuf, Result<Vec<MatchReport>>)> = files
        .par_iter()
        .map(|path| (path.clone(), search_file(path, query, source, mode)))
        .collect();

    let mut outcome = SearchOutcome {
        files_searched: files.len(),
        ..SearchOutcome::default()
    };
    for (path, result) in results {
        match result {
            Ok(reports) => outcome.reports.extend(reports),
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                outcome.failures.push(FileFailure {
                    path,
                    message: format!("{:#}", e),
                });
            }
        }
    }

    info!(
        "Found {} match(es) in {} file(s), {} failure(s)",
        outcome.reports.len(),
        outcome.files_searched,
        outcome.failures.len()
    );
    Ok(outcome)
}

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};

use sharpgrep::ir::node::Position;
use sharpgrep::logging;
use sharpgrep::query::{
    AccessModifier, Query, QueryBuilder, QueryDescriptor, ScopeKind, TargetKind, TextSpan,
};
use sharpgrep::search::{MatchReport, SearchMode, SearchOutcome, search_paths};
use sharpgrep::virtual_nodes::VirtualNodeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Structural search over C# syntax trees
#[derive(Parser, Debug)]
#[command(name = "sharpgrep", author, version, about, long_about = None)]
struct Cli {
    /// Files or directories to search
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Construct to match (class, method, property, local-variable, ...)
    #[arg(short, long)]
    target: Option<TargetKind>,

    /// Exact access modifier set (public, private, protected-internal, ...)
    #[arg(short, long)]
    access: Option<AccessModifier>,

    /// Only match inside this kind of scope
    #[arg(short, long)]
    scope: Option<ScopeKind>,

    /// Enclosing scope's name must contain this
    #[arg(long)]
    scope_name: Option<String>,

    /// Name must contain one of these (repeatable)
    #[arg(short, long = "name")]
    names: Vec<String>,

    /// Name must contain none of these (repeatable)
    #[arg(short = 'x', long = "exclude")]
    excludes: Vec<String>,

    /// File path must contain every one of these (repeatable)
    #[arg(short, long = "path")]
    path_filters: Vec<String>,

    /// Treat --name, --exclude, --scope-name and --path as regular expressions
    #[arg(short, long)]
    regex: bool,

    /// Report the innermost construct at FILE:LINE:COL (1-based, column in characters)
    #[arg(
        long,
        value_name = "FILE:LINE:COL",
        conflicts_with_all = [
            "target", "access", "scope", "scope_name", "names", "excludes", "path_filters", "regex",
            "query_file",
        ]
    )]
    at: Option<String>,

    /// Read the query from a JSON file instead of flags
    #[arg(short = 'q', long)]
    query_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print only the number of matches
    #[arg(short, long)]
    count: bool,

    /// Worker threads (defaults to one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Log level for stderr (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Disable ANSI colors in log output
    #[arg(long)]
    no_color: bool,

    /// Also write a debug log to the user cache directory
    #[arg(long)]
    log_to_file: bool,
}

impl Cli {
    fn descriptor(&self) -> Result<QueryDescriptor> {
        let mut descriptor = match &self.query_file {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read query file {}", path.display()))?;
                QueryDescriptor::from_json(&json)
                    .with_context(|| format!("invalid query file {}", path.display()))?
            }
            None => QueryDescriptor::default(),
        };

        // Flags refine a query file.
        if let Some(target) = self.target {
            descriptor.target = target;
        }
        if let Some(access) = self.access {
            descriptor.access = access;
        }
        if let Some(scope) = self.scope {
            descriptor.scope = scope;
        }
        if self.scope_name.is_some() {
            descriptor.scope_name = self.scope_name.clone();
        }
        descriptor.name_contains.extend(self.names.iter().cloned());
        descriptor.name_excludes.extend(self.excludes.iter().cloned());
        descriptor.path_contains.extend(self.path_filters.iter().cloned());
        descriptor.regex |= self.regex;
        Ok(descriptor)
    }
}

/// Parses `FILE:LINE:COL` into a file and a zero-based position.
fn parse_location(location: &str) -> Result<(PathBuf, Position)> {
    let mut parts = location.rsplitn(3, ':');
    let (Some(column), Some(line), Some(file)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("expected FILE:LINE:COL, got `{}`", location);
    };
    let line: usize = line
        .parse()
        .with_context(|| format!("invalid line `{}` in `{}`", line, location))?;
    let column: usize = column
        .parse()
        .with_context(|| format!("invalid column `{}` in `{}`", column, location))?;
    if line == 0 || column == 0 || file.is_empty() {
        return Err(anyhow!("lines and columns are 1-based in `{}`", location));
    }
    Ok((PathBuf::from(file), Position::at(line - 1, column - 1)))
}

/// Converts a zero-based character column on `row` into the byte column the
/// parser reports. Columns past the end of the line keep their overshoot.
fn byte_column(source: &str, row: usize, column: usize) -> usize {
    match source.lines().nth(row) {
        Some(line) => match line.char_indices().nth(column) {
            Some((offset, _)) => offset,
            None => line.len() + column.saturating_sub(line.chars().count()),
        },
        None => column,
    }
}

fn print_outcome(outcome: &SearchOutcome, format: OutputFormat, count: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if count {
        writeln!(out, "{}", outcome.reports.len())?;
        return Ok(());
    }
    for report in &outcome.reports {
        match format {
            OutputFormat::Text => writeln!(out, "{}", format_text(report))?,
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(report)?)?,
        }
    }
    Ok(())
}

fn format_text(report: &MatchReport) -> String {
    let name = report
        .full_name
        .as_deref()
        .or(report.identifier.as_deref())
        .unwrap_or("");
    format!(
        "{}:{}:{}: {} {}",
        report.path,
        report.start_line,
        report.start_column,
        report.label(),
        name
    )
    .trim_end()
    .to_string()
}

fn run(cli: &Cli) -> Result<bool> {
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the worker pool")?;
        debug!("Using {} worker thread(s)", threads);
    }

    let (query, roots, mode): (Query, Vec<PathBuf>, SearchMode) = match &cli.at {
        Some(location) => {
            let (file, position) = parse_location(location)?;
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let position = Position::at(position.row, byte_column(&source, position.row, position.column));
            let span = TextSpan::point(Some(file.clone()), position);
            (QueryBuilder::from_span(span), vec![file], SearchMode::Innermost)
        }
        None => {
            let descriptor = cli.descriptor()?;
            debug!("Query descriptor: {:?}", descriptor);
            (QueryBuilder::build(&descriptor)?, cli.paths.clone(), SearchMode::All)
        }
    };

    let outcome = search_paths(&roots, &query, VirtualNodeRegistry::standard(), mode)?;
    for failure in &outcome.failures {
        eprintln!("sharpgrep: {}: {}", failure.path.display(), failure.message);
    }
    print_outcome(&outcome, cli.format, cli.count)?;
    info!("Done: {} match(es)", outcome.reports.len());
    Ok(!outcome.reports.is_empty())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match logging::init_logger(cli.no_color, cli.log_level.as_deref(), cli.log_to_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("sharpgrep: failed to initialize logging: {}", e);
            return ExitCode::from(2);
        }
    };

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("sharpgrep: {:#}", e);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_is_one_based() {
        let (file, position) = parse_location("src/Cat.cs:3:5").unwrap();
        assert_eq!(file, PathBuf::from("src/Cat.cs"));
        assert_eq!(position.line_col(), (2, 4));
    }

    #[test]
    fn test_parse_location_keeps_colons_in_file() {
        let (file, _) = parse_location("C:/src/Cat.cs:1:1").unwrap();
        assert_eq!(file, PathBuf::from("C:/src/Cat.cs"));
    }

    #[test]
    fn test_parse_location_rejects_malformed_input() {
        assert!(parse_location("Cat.cs:0:1").is_err());
        assert!(parse_location("Cat.cs:1").is_err());
        assert!(parse_location("Cat.cs:one:1").is_err());
    }

    #[test]
    fn test_character_columns_become_byte_columns() {
        let source = "class Café\n{\n    string s = \"ü\"; int n;\n}\n";
        assert_eq!(byte_column(source, 0, 6), 6);
        assert_eq!(byte_column(source, 0, 9), 9);
        assert_eq!(byte_column(source, 2, 19), 20);
        assert_eq!(byte_column(source, 2, 40), 41);
        assert_eq!(byte_column(source, 9, 3), 3);
    }

    #[test]
    fn test_at_rejects_query_flags() {
        for flag in [
            &["--target", "method"][..],
            &["--access", "public"][..],
            &["--scope", "class"][..],
            &["--scope-name", "Cat"][..],
            &["--name", "Purr"][..],
            &["--exclude", "Purr"][..],
            &["--path", "src"][..],
            &["--regex"][..],
        ] {
            let mut args = vec!["sharpgrep", "--at", "Cat.cs:1:1"];
            args.extend_from_slice(flag);
            assert!(Cli::try_parse_from(args).is_err(), "{:?}", flag);
        }
        assert!(Cli::try_parse_from(["sharpgrep", "--at", "Cat.cs:1:1", "--count"]).is_ok());
    }

    #[test]
    fn test_flags_refine_descriptor() {
        let cli = Cli::parse_from([
            "sharpgrep", "--target", "method", "--access", "private", "--name", "Spin", "-x",
            "Slower", "src",
        ]);
        let descriptor = cli.descriptor().unwrap();
        assert_eq!(descriptor.target, TargetKind::Method);
        assert_eq!(descriptor.access, AccessModifier::Private);
        assert_eq!(descriptor.name_contains, vec!["Spin".to_string()]);
        assert_eq!(descriptor.name_excludes, vec!["Slower".to_string()]);
        assert_eq!(cli.paths, vec![PathBuf::from("src")]);
    }

    #[test]
    fn test_text_line_prefers_full_name() {
        let report = MatchReport {
            path: "Cat.cs".to_string(),
            kind: sharpgrep::ir::node::SyntaxKind::FieldDeclaration,
            virtual_kind: sharpgrep::ir::virtual_node::VirtualNodeKind::Empty,
            identifier: Some("lives".to_string()),
            full_name: Some("Zoo.Cat.lives".to_string()),
            start_line: 4,
            start_column: 9,
            end_line: 4,
            end_column: 19,
        };
        assert_eq!(format_text(&report), "Cat.cs:4:9: FieldDeclaration Zoo.Cat.lives");
    }
}

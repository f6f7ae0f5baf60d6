use std::fs;
use std::path::{Path, PathBuf};

use indoc::indoc;
use tempfile::TempDir;

use sharpgrep::query::{QueryBuilder, QueryDescriptor, TargetKind};
use sharpgrep::search::{SearchMode, collect_source_files, search_paths};
use sharpgrep::virtual_nodes::VirtualNodeRegistry;

fn write(dir: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/Cat.cs",
        indoc! {r#"
            namespace Zoo
            {
                public class Cat
                {
                    public void Purr() { }
                }
            }
        "#},
    );
    write(
        dir.path(),
        "src/Animals/Dog.cs",
        indoc! {r#"
            namespace Zoo.Animals
            {
                public class Dog
                {
                    public void Bark() { }
                    private void Sleep() { }
                }
            }
        "#},
    );
    write(dir.path(), "obj/Debug/Generated.cs", "class Generated { void Hidden() { } }");
    write(dir.path(), "README.md", "not C#");
    dir
}

#[test]
fn test_discovery_skips_build_output_and_other_files() {
    let dir = project();
    let files = collect_source_files(&[dir.path().to_path_buf()]).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|path| path.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(names, vec!["src/Animals/Dog.cs", "src/Cat.cs"]);
}

#[test]
fn test_search_reports_matches_across_files() {
    let dir = project();
    let query = QueryBuilder::build(&QueryDescriptor {
        target: TargetKind::Method,
        ..Default::default()
    })
    .unwrap();

    let outcome = search_paths(
        &[dir.path().to_path_buf()],
        &query,
        VirtualNodeRegistry::standard(),
        SearchMode::All,
    )
    .unwrap();

    assert_eq!(outcome.files_searched, 2);
    assert!(outcome.failures.is_empty());
    let names: Vec<_> = outcome
        .reports
        .iter()
        .map(|report| report.full_name.clone().unwrap())
        .collect();
    assert_eq!(names, vec!["Zoo.Animals.Dog.Bark", "Zoo.Animals.Dog.Sleep", "Zoo.Cat.Purr"]);
    assert_eq!(outcome.reports[2].start_line, 5);
}

#[test]
fn test_unreadable_file_does_not_stop_the_search() {
    let dir = project();
    let broken = write(dir.path(), "src/Broken.cs", "");
    fs::write(&broken, [0xff, 0xfe, 0x00, 0xd8]).unwrap();
    let query = QueryBuilder::build(&QueryDescriptor {
        target: TargetKind::Class,
        ..Default::default()
    })
    .unwrap();

    let outcome = search_paths(
        &[dir.path().to_path_buf()],
        &query,
        VirtualNodeRegistry::standard(),
        SearchMode::All,
    )
    .unwrap();

    assert_eq!(outcome.files_searched, 3);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].path, broken);
    let classes: Vec<_> = outcome.reports.iter().filter_map(|r| r.identifier.clone()).collect();
    assert_eq!(classes, vec!["Dog", "Cat"]);
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let query = QueryBuilder::build(&QueryDescriptor::default()).unwrap();
    let result = search_paths(
        &[dir.path().join("nowhere")],
        &query,
        VirtualNodeRegistry::standard(),
        SearchMode::All,
    );
    assert!(result.is_err());
}

#[test]
fn test_innermost_mode_reports_one_match_per_file() {
    let dir = project();
    let cat = dir.path().join("src/Cat.cs");
    let span = sharpgrep::query::TextSpan::point(
        Some(cat.clone()),
        sharpgrep::ir::node::Position::at(4, 28),
    );
    let outcome = search_paths(
        &[cat],
        &QueryBuilder::from_span(span),
        VirtualNodeRegistry::standard(),
        SearchMode::Innermost,
    )
    .unwrap();

    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].label(), "MethodBody");
}

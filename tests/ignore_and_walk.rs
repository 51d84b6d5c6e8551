//! End-to-end: ignore rules and the directory walker composed together, the
//! way a host actually uses them.

use std::fs;
use std::sync::{Arc, Mutex};

use backdrift::{walk, CancellationToken, IgnoreRuleSet, ScanOptions};
use tempfile::TempDir;

fn layout() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::create_dir_all(dir.path().join("target/debug")).unwrap();
    fs::create_dir_all(dir.path().join("vendor/keep")).unwrap();
    fs::write(dir.path().join("src/main.rs"), b"fn main() {}").unwrap();
    fs::write(dir.path().join("src/lib.rs"), b"// lib").unwrap();
    fs::write(dir.path().join("target/debug/app"), b"binary").unwrap();
    fs::write(dir.path().join("notes.tmp"), b"scratch").unwrap();
    fs::write(dir.path().join("vendor/keep/important.log"), b"keep me").unwrap();
    dir
}

#[test]
fn last_match_wins_rescues_a_file_under_an_otherwise_excluded_tree() {
    let dir = layout();
    let root = dir.path().to_path_buf();
    let ignore = IgnoreRuleSet::from_lines(["/target", "*.tmp", "*.log", "!vendor/keep/*.log"]).unwrap();

    let emitted = Arc::new(Mutex::new(Vec::new()));
    let emitted2 = emitted.clone();
    let root2 = root.clone();
    let outcome = walk(&root, ignore, ScanOptions::default(), CancellationToken::new(), move |entry| {
        emitted2.lock().unwrap().push(entry.path.strip_prefix(&root2).unwrap().to_path_buf());
    })
    .unwrap();

    assert!(outcome.errors.is_empty());
    let mut names: Vec<String> = emitted.lock().unwrap().iter().map(|p| p.to_string_lossy().replace('\\', "/")).collect();
    names.sort();

    assert_eq!(names, vec!["src/lib.rs".to_string(), "src/main.rs".to_string(), "vendor/keep/important.log".to_string()]);
}

#[test]
fn a_bare_basename_rule_excluding_a_directory_can_be_rescued_by_a_negation() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    fs::write(dir.path().join("a"), b"top level").unwrap();
    fs::create_dir_all(dir.path().join("keep")).unwrap();
    fs::write(dir.path().join("keep/b"), b"rescued").unwrap();

    // "*" is a bare, slash-free pattern: it matches the basename of every
    // entry, including the "keep" directory itself, not just top-level
    // files. "!keep/**" only matches paths nested under "keep", never the
    // bare "keep" path, so it can only rescue what's inside, not the
    // directory's own ignored basename.
    let ignore = IgnoreRuleSet::from_lines(["*", "!keep/**"]).unwrap();

    let emitted = Arc::new(Mutex::new(Vec::new()));
    let emitted2 = emitted.clone();
    let root2 = root.clone();
    let outcome = walk(&root, ignore, ScanOptions::default(), CancellationToken::new(), move |entry| {
        emitted2.lock().unwrap().push(entry.path.strip_prefix(&root2).unwrap().to_path_buf());
    })
    .unwrap();

    assert!(outcome.errors.is_empty());
    let names: Vec<String> = emitted.lock().unwrap().iter().map(|p| p.to_string_lossy().replace('\\', "/")).collect();
    assert_eq!(names, vec!["keep/b".to_string()], "keep/b must be discovered even though the keep/ directory's own basename matches the bare \"*\" rule");
}

#[test]
fn size_filters_apply_after_ignore_rules() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("small.bin"), vec![0u8; 10]).unwrap();
    fs::write(dir.path().join("large.bin"), vec![0u8; 10_000]).unwrap();

    let mut options = ScanOptions::default();
    options.max_size = Some(1000);

    let emitted = Arc::new(Mutex::new(Vec::new()));
    let emitted2 = emitted.clone();
    let outcome = walk(dir.path(), IgnoreRuleSet::new(), options, CancellationToken::new(), move |entry| {
        emitted2.lock().unwrap().push(entry.path);
    })
    .unwrap();

    assert_eq!(outcome.stats.files_emitted, 1);
    assert_eq!(outcome.stats.files_ignored, 1);
    assert_eq!(emitted.lock().unwrap()[0].file_name().unwrap(), "small.bin");
}

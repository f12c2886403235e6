//! Edge case and error handling tests for rangefix


use harness::{TestTree, char_offset, char_offset_nth, foo_tree, run_rangefix};
use rangefix::{RangeMapBuilder, RangeMapSet};

/// A tree with one source under `src/` and its range map in `maps.jsonl`.
fn single_file_tree(path: &str, text: &str, describe: impl FnOnce(&mut RangeMapBuilder)) -> TestTree {
    let tree = TestTree::new();
    tree.add_file(&format!("src/{path}"), text);
    let mut builder = RangeMapBuilder::for_source(path, text);
    describe(&mut builder);
    let maps: RangeMapSet = [builder.build()].into_iter().collect();
    tree.add_range_maps("maps.jsonl", &maps);
    tree
}

fn apply(tree: &TestTree, extra: &[&str]) -> (String, String, bool) {
    let mut args = vec!["apply", "-i", "src", "-o", "out", "-r", "maps.jsonl"];
    args.extend_from_slice(extra);
    run_rangefix(tree.path(), &args)
}

// ============================================================================
// Text Encoding and Line Endings
// ============================================================================

#[test]
fn test_crlf_source_keeps_terminators() {
    let text = "package a;\r\n\r\nclass Foo {\r\n    int bar;\r\n    int get() { return bar; }\r\n}\r\n";
    let tree = single_file_tree("a/Foo.java", text, |b| {
        b.add_field_reference(char_offset_nth(text, "bar", 0), 3, "bar", "a/Foo");
        b.add_field_reference(char_offset_nth(text, "bar", 1), 3, "bar", "a/Foo");
    });
    tree.add_file("fields.srg", "FD: a/Foo/bar a/Foo/qux1\n");

    let (_stdout, stderr, success) = apply(&tree, &["-m", "fields.srg"]);
    assert!(success, "apply should succeed: {stderr}");
    assert_eq!(tree.read("out/a/Foo.java"), text.replace("bar", "qux1"));
}

#[test]
fn test_offsets_count_characters_not_bytes() {
    let text = "class Foo {\n    // naïve 😀 ünïcode\n    int bar = bar();\n}\n";
    let tree = single_file_tree("Foo.java", text, |b| {
        b.add_field_reference(char_offset_nth(text, "bar", 0), 3, "bar", "Foo");
        b.add_method_reference(char_offset_nth(text, "bar", 1), 3, "bar", "Foo", "bar", "()I");
    });
    tree.add_file(
        "members.srg",
        "FD: Foo/bar Foo/baz\nMD: Foo/bar ()I Foo/compute ()I\n",
    );

    let (_stdout, stderr, success) = apply(&tree, &["-m", "members.srg"]);
    assert!(success, "apply should succeed: {stderr}");
    assert_eq!(
        tree.read("out/Foo.java"),
        "class Foo {\n    // naïve 😀 ünïcode\n    int baz = compute();\n}\n"
    );
}

#[test]
fn test_latin1_input_is_written_back_as_latin1() {
    let bytes = b"class Foo {\n    // caf\xE9\n    int bar;\n}\n";
    let decoded: String = bytes.iter().map(|&b| char::from(b)).collect();
    let tree = TestTree::new();
    tree.add_bytes("src/Foo.java", bytes);
    let mut b = RangeMapBuilder::for_source("Foo.java", &decoded);
    b.add_field_reference(char_offset(&decoded, "bar"), 3, "bar", "Foo");
    let maps: RangeMapSet = [b.build()].into_iter().collect();
    tree.add_range_maps("maps.jsonl", &maps);
    tree.add_file("fields.srg", "FD: Foo/bar Foo/baz\n");

    let (_stdout, stderr, success) = run_rangefix(
        tree.path(),
        &["apply", "-i", "src@ISO-8859-1", "-o", "out", "-r", "maps.jsonl", "-m", "fields.srg"],
    );
    assert!(success, "apply should succeed: {stderr}");
    let written = std::fs::read(tree.join("out/Foo.java")).unwrap();
    assert_eq!(written, b"class Foo {\n    // caf\xE9\n    int baz;\n}\n".to_vec());
}

#[test]
fn test_unknown_encoding_is_rejected() {
    let tree = foo_tree();
    let (_stdout, stderr, success) = run_rangefix(
        tree.path(),
        &["apply", "-i", "src@klingon", "-o", "out", "-r", "maps.jsonl"],
    );
    assert!(!success);
    assert!(stderr.contains("unsupported encoding"), "{stderr}");
}

// ============================================================================
// Stale or Partial Inputs
// ============================================================================

#[test]
fn test_missing_source_is_skipped_with_warning() {
    let text = "class Foo { int bar; }";
    let tree = TestTree::new();
    tree.add_file("src/Foo.java", text);
    let mut foo = RangeMapBuilder::for_source("Foo.java", text);
    foo.add_field_reference(16, 3, "bar", "Foo");
    let gone = RangeMapBuilder::for_source("Gone.java", "class Gone {}");
    let maps: RangeMapSet = [foo.build(), gone.build()].into_iter().collect();
    tree.add_range_maps("maps.jsonl", &maps);
    tree.add_file("fields.srg", "FD: Foo/bar Foo/baz\n");

    let (stdout, stderr, success) = apply(&tree, &["-m", "fields.srg", "--json"]);
    assert!(success, "missing sources must not fail the run: {stderr}");
    assert!(stderr.contains("Gone.java not found"), "{stderr}");
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["missing"], 1);
    assert_eq!(report["rewritten"], 1);
    assert_eq!(tree.read("out/Foo.java"), "class Foo { int baz; }");
}

#[test]
fn test_hash_mismatch_warns_but_offsets_decide() {
    let original = "class Foo { int bar; }\n";
    let tree = single_file_tree("Foo.java", original, |b| {
        b.add_field_reference(16, 3, "bar", "Foo");
    });
    // Edited after the last recorded reference
    tree.add_file("src/Foo.java", "class Foo { int bar; }\n// trailing\n");
    tree.add_file("fields.srg", "FD: Foo/bar Foo/baz\n");

    let (_stdout, stderr, success) = apply(&tree, &["-m", "fields.srg"]);
    assert!(success, "apply should succeed: {stderr}");
    assert!(stderr.contains("does not match its range map"), "{stderr}");
    assert_eq!(tree.read("out/Foo.java"), "class Foo { int baz; }\n// trailing\n");
}

#[test]
fn test_empty_range_map_stream() {
    let tree = TestTree::new();
    tree.add_file("src/Foo.java", "class Foo {}");
    tree.add_file("maps.jsonl", "");

    let (stdout, stderr, success) = apply(&tree, &["--json"]);
    assert!(success, "empty stream is valid: {stderr}");
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["files"], 0);
    assert!(!tree.exists("out/Foo.java"));
}

#[test]
fn test_corrupt_range_map_stream() {
    let tree = TestTree::new();
    tree.add_file("src/Foo.java", "class Foo {}");
    tree.add_file("maps.jsonl", "{\"path\": \"Foo.java\", \"hash\": ");

    let (_stdout, stderr, success) = apply(&tree, &[]);
    assert!(!success);
    assert!(stderr.contains("invalid range map"), "{stderr}");
}

#[test]
fn test_malformed_mapping_file() {
    let tree = foo_tree();
    tree.add_file("bad.srg", "CL: com/example/Foo\n");

    let (_stdout, stderr, success) = apply(&tree, &["-m", "bad.srg"]);
    assert!(!success);
    assert!(stderr.contains("invalid mapping file"), "{stderr}");
    assert!(stderr.contains("line 1"), "{stderr}");
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_missing_output_is_configuration_error() {
    let tree = foo_tree();
    let (_stdout, stderr, success) =
        run_rangefix(tree.path(), &["apply", "-i", "src", "-r", "maps.jsonl"]);
    assert!(!success);
    assert!(
        stderr.contains("rangefix: configuration error: no output given"),
        "{stderr}"
    );
}

#[test]
fn test_corrupt_archive_input_fails() {
    let tree = foo_tree();
    tree.add_file("sources.zip", "PK");
    let (_stdout, stderr, success) = run_rangefix(
        tree.path(),
        &["apply", "-i", "sources.zip", "-o", "out", "-r", "maps.jsonl"],
    );
    assert!(!success);
    assert!(stderr.contains("sources.zip"), "{stderr}");
    assert!(!tree.exists("out"));
}

#[test]
fn test_progress_is_logged_with_verbose_only() {
    let tree = foo_tree();
    let (stdout, stderr, success) = apply(&tree, &[]);
    assert!(success, "{stderr}");
    assert!(!stdout.contains("Start processing"), "{stdout}");

    let (stdout, stderr, success) = apply(&tree, &["-v"]);
    assert!(success, "{stderr}");
    assert!(stdout.contains("Start processing com/example/Foo.java"), "{stdout}");
    assert!(stdout.contains("Finished processing com/example/Foo.java"), "{stdout}");
}

#[test]
fn test_remove_without_marker() {
    let tree = foo_tree();
    let (_stdout, stderr, success) = run_rangefix(
        tree.path(),
        &["remove", "-i", "src", "-o", "out", "-r", "maps.jsonl"],
    );
    assert!(!success);
    assert!(stderr.contains("no marker annotation given"), "{stderr}");
}

// ============================================================================
// Import Handling
// ============================================================================

const IMPORTS: &str = "package a;\n\nimport y.B;\nimport x.Unused;\nimport x.A;\n\nclass Foo {\n    A a;\n    B b;\n}\n";

fn imports_tree() -> TestTree {
    single_file_tree("a/Foo.java", IMPORTS, |b| {
        let class_start = char_offset(IMPORTS, "class Foo");
        b.add_class_declaration(class_start, IMPORTS.len() - 1 - class_start, "a/Foo");
        b.add_class_reference(char_offset(IMPORTS, "A a;"), 1, "A", "x/A", false);
        b.add_class_reference(char_offset(IMPORTS, "B b;"), 1, "B", "y/B", false);
    })
}

#[test]
fn test_unreferenced_imports_are_dropped() {
    let tree = imports_tree();
    let (_stdout, stderr, success) = apply(&tree, &[]);
    assert!(success, "apply should succeed: {stderr}");
    assert_eq!(
        tree.read("out/a/Foo.java"),
        "package a;\n\nimport y.B;\nimport x.A;\n\nclass Foo {\n    A a;\n    B b;\n}\n"
    );
}

#[test]
fn test_keep_imports() {
    let tree = imports_tree();
    let (_stdout, stderr, success) = apply(&tree, &["--keep-imports"]);
    assert!(success, "apply should succeed: {stderr}");
    assert_eq!(tree.read("out/a/Foo.java"), IMPORTS);
}

#[test]
fn test_sort_imports() {
    let tree = imports_tree();
    let (_stdout, stderr, success) = apply(&tree, &["--sort-imports"]);
    assert!(success, "apply should succeed: {stderr}");
    assert_eq!(
        tree.read("out/a/Foo.java"),
        "package a;\n\nimport x.A;\nimport y.B;\n\nclass Foo {\n    A a;\n    B b;\n}\n"
    );
}

#[test]
fn test_invalid_import_line_is_kept_and_reported() {
    let text = "package a;\n\nimport a.b.C\n    ;\n\nclass Foo { int bar; }\n";
    let tree = single_file_tree("a/Foo.java", text, |b| {
        b.add_field_reference(char_offset(text, "bar"), 3, "bar", "a/Foo");
    });
    tree.add_file("fields.srg", "FD: a/Foo/bar a/Foo/baz\n");

    let (stdout, stderr, success) = apply(&tree, &["-m", "fields.srg", "--json"]);
    assert!(success, "grammar problems are diagnostics, not failures: {stderr}");
    assert!(stderr.contains("Invalid import line 3"), "{stderr}");
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["diagnostics"], 1);
    assert_eq!(tree.read("out/a/Foo.java"), text.replace("bar", "baz"));
}

// ============================================================================
// Parallel Runs
// ============================================================================

#[test]
fn test_parallel_run_matches_sequential() {
    let tree = TestTree::new();
    let mut maps = RangeMapSet::new();
    let mut table = String::new();
    for i in 0..12 {
        let path = format!("p/C{i}.java");
        let text = format!("package p;\n\nclass C{i} {{\n    int bar;\n}}\n");
        tree.add_file(&format!("src/{path}"), &text);
        let mut b = RangeMapBuilder::for_source(path.as_str(), &text);
        b.add_field_reference(char_offset(&text, "bar"), 3, "bar", &format!("p/C{i}"));
        maps.insert(b.build());
        table.push_str(&format!("FD: p/C{i}/bar p/C{i}/field{i}\n"));
    }
    tree.add_range_maps("maps.jsonl", &maps);
    tree.add_file("fields.srg", &table);

    for (jobs, out) in [("1", "seq"), ("4", "par"), ("0", "auto")] {
        let (_stdout, stderr, success) = run_rangefix(
            tree.path(),
            &["apply", "-i", "src", "-o", out, "-r", "maps.jsonl", "-m", "fields.srg", "-j", jobs],
        );
        assert!(success, "apply with -j {jobs} should succeed: {stderr}");
    }
    for i in 0..12 {
        let seq = tree.read(&format!("seq/p/C{i}.java"));
        assert!(seq.contains(&format!("int field{i};")));
        assert_eq!(seq, tree.read(&format!("par/p/C{i}.java")));
        assert_eq!(seq, tree.read(&format!("auto/p/C{i}.java")));
    }
}

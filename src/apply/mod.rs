//! Rename engine
//!
//! Two passes per file. The first walks every code reference in document order,
//! checks the recorded text is still there and queues a replacement from the rename
//! tables. The second rewrites the import block of the spliced text so it imports
//! exactly what the renamed references need.

mod imports;

use std::collections::BTreeSet;

use crate::driver::{FileOutcome, FileOutput, FileRewriter, FileStats};
use crate::error::{Error, Result};
use crate::mapping::{MappingChain, ParamTable};
use crate::names::{
    detect_line_ending, innermost_name, internal_to_source, is_same_or_nested, package_of,
    path_for_class, simple_name, top_level_class_for_path,
};
use crate::range::{RangeEntry, RangeMap, Target};
use crate::session::EditSession;

use imports::{ImportContext, rewrite_imports};

/// Applies rename tables to files described by range maps.
#[derive(Debug, Default)]
pub struct RangeApplier {
    chain: MappingChain,
    params: ParamTable,
    keep_imports: bool,
    sort_imports: bool,
}

/// What the symbol pass learned about the file's own top-level class.
struct FileNames {
    new_top: String,
    new_package: Option<String>,
}

impl RangeApplier {
    pub fn new(chain: MappingChain, params: ParamTable) -> Self {
        Self {
            chain,
            params,
            ..Default::default()
        }
    }

    /// Keep imports no renamed reference needs instead of deleting them.
    pub fn keep_imports(mut self, keep: bool) -> Self {
        self.keep_imports = keep;
        self
    }

    /// Rewrite the final import block sorted and de-duplicated.
    pub fn sort_imports(mut self, sort: bool) -> Self {
        self.sort_imports = sort;
        self
    }

    pub fn chain(&self) -> &MappingChain {
        &self.chain
    }

    /// Mapped name of the file's top-level class, which must stay a top-level class.
    fn file_names(&self, path: &str, old_top: &str) -> Result<FileNames> {
        let new_top = self.chain.map_class(old_top);
        if new_top.is_empty() || new_top.ends_with('/') || simple_name(new_top).contains('$') {
            return Err(Error::InvalidClassMapping {
                file: path.to_string(),
                detail: format!("top-level class {old_top} mapped to {new_top:?}"),
            });
        }
        Ok(FileNames {
            new_top: new_top.to_string(),
            new_package: package_of(new_top).map(internal_to_source),
        })
    }

    fn class_replacement(
        &self,
        path: &str,
        entry: &RangeEntry,
        name: &str,
        qualified: bool,
        names: &FileNames,
        imports: &mut BTreeSet<String>,
    ) -> Result<String> {
        let mapped = self.chain.map_class(name);
        if mapped.is_empty() || mapped.ends_with(['/', '$']) {
            return Err(Error::InvalidClassMapping {
                file: path.to_string(),
                detail: format!("{entry} mapped to {mapped:?}"),
            });
        }

        if qualified && entry.text.contains('.') {
            let simple = simple_name(mapped);
            if !simple.contains('$') {
                return Ok(internal_to_source(mapped));
            }
            // Nested types keep the chain from their outermost class unless the
            // written reference already spelled out more than that
            let nested_chain = simple.replace('$', ".");
            let written = entry.text.split('.').count();
            if written > nested_chain.split('.').count() {
                return Ok(internal_to_source(mapped));
            }
            return Ok(nested_chain);
        }

        if !qualified {
            track_import(imports, &names.new_top, mapped);
        }
        Ok(innermost_name(mapped).to_string())
    }

    /// Replacement text for one reference, `None` to leave it alone.
    fn replacement(
        &self,
        path: &str,
        entry: &RangeEntry,
        names: &FileNames,
        imports: &mut BTreeSet<String>,
    ) -> Result<Option<String>> {
        let replacement = match &entry.target {
            Target::Package { .. } => names.new_package.clone(),
            Target::Class { name, qualified } => Some(self.class_replacement(
                path, entry, name, *qualified, names, imports,
            )?),
            Target::Field { owner, name } => self.chain.map_field(owner, name).map(str::to_string),
            Target::Method { owner, name, desc } => self.chain.map_method(owner, name, desc),
            Target::Parameter {
                owner,
                name,
                desc,
                index,
            } => self
                .params
                .lookup(owner, name, desc, *index)
                .map(str::to_string),
            Target::LocalVariable { .. }
            | Target::ClassLiteral { .. }
            | Target::FieldLiteral { .. }
            | Target::MethodLiteral { .. } => None,
        };
        Ok(replacement)
    }

    /// Rename one file. Returns the new relative path and text.
    pub fn apply_file(&self, map: &RangeMap, text: &str) -> Result<(String, String, FileStats)> {
        let path = map.path();
        if !map.matches_content(text) {
            tracing::warn!(
                "Content hash of {} does not match its range map, relying on per-reference checks",
                path
            );
        }

        let (old_top, extension) = top_level_class_for_path(path);
        let names = self.file_names(path, &old_top)?;
        let mut stats = FileStats::default();
        let mut session = EditSession::new(path, text);
        let mut pending = BTreeSet::new();

        for entry in map.entries() {
            session.verify(entry.start, entry.end(), &entry.text)?;
            let Some(new_text) = self.replacement(path, entry, &names, &mut pending)? else {
                continue;
            };
            if new_text == entry.text {
                continue;
            }
            tracing::debug!(
                "Rename {} Shift[{}] {} -> {}",
                entry,
                session.shift(),
                entry.text,
                new_text
            );
            session.replace(entry.start, entry.end(), new_text);
            stats.renames += 1;
        }

        let spliced = session.spliced();
        let ctx = ImportContext {
            chain: &self.chain,
            keep_imports: self.keep_imports,
            sort_imports: self.sort_imports,
            line_ending: detect_line_ending(text),
        };
        let rewrite = rewrite_imports(&spliced, pending, &ctx, &mut session);
        stats.imports_added = rewrite.added.len();
        stats.imports_removed = rewrite.removed.len();
        stats.diagnostics = session.diagnostics().len();

        let new_path = path_for_class(&names.new_top, extension.as_deref(), path);
        if new_path != path.replace('\\', "/") {
            tracing::debug!("Rename file {} -> {}", path, new_path);
        }
        Ok((new_path, rewrite.text, stats))
    }
}

impl FileRewriter for RangeApplier {
    fn rewrite(&self, map: &RangeMap, text: &str) -> Result<FileOutcome> {
        let (path, text, stats) = self.apply_file(map, text)?;
        Ok(FileOutcome {
            output: FileOutput::Write { path, text },
            stats,
        })
    }
}

/// Record that `reference` must be imported by the file whose top-level class is
/// `top_level`, unless it lives in that class or in the same package.
fn track_import(imports: &mut BTreeSet<String>, top_level: &str, reference: &str) {
    if is_same_or_nested(reference, top_level) {
        return;
    }
    if package_of(top_level) == package_of(reference) {
        return;
    }
    imports.insert(internal_to_source(reference));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingFile;
    use crate::range::RangeMapBuilder;
    use std::path::Path;

    fn applier(table: &str) -> RangeApplier {
        let mut chain = MappingChain::new();
        chain.push(MappingFile::parse(table, Path::new("t.srg")).unwrap());
        RangeApplier::new(chain, ParamTable::new())
    }

    const FOO: &str = "package com.example;\n\nimport com.example.util.Helper;\n\npublic class Foo {\n    private int bar;\n\n    int get() {\n        return this.bar + Helper.ONE;\n    }\n}\n";

    fn foo_map() -> RangeMap {
        let mut b = RangeMapBuilder::for_source("com/example/Foo.java", FOO);
        b.add_package_reference(8, 11, "com/example");
        b.add_class_reference(29, 23, "com.example.util.Helper", "com/example/util/Helper", true);
        b.add_class_declaration(55, 102, "com/example/Foo");
        b.add_class_reference(68, 3, "Foo", "com/example/Foo", false);
        b.add_field_declaration(78, 16, "bar", "I");
        b.add_field_reference(90, 3, "bar", "com/example/Foo");
        b.add_method_declaration(100, 55, "get", "()I");
        b.add_field_reference(132, 3, "bar", "com/example/Foo");
        b.add_class_reference(138, 6, "Helper", "com/example/util/Helper", false);
        b.build()
    }

    #[test]
    fn test_fixture_offsets() {
        for entry in foo_map().entries() {
            let found: String = FOO.chars().skip(entry.start).take(entry.length).collect();
            assert_eq!(found, entry.text, "{entry}");
        }
    }

    #[test]
    fn test_identity_mapping_is_a_no_op() {
        let applier = applier(
            "CL: com/example/Foo com/example/Foo\n\
             CL: com/example/util/Helper com/example/util/Helper\n\
             FD: com/example/Foo/bar com/example/Foo/bar\n",
        );
        let (path, text, stats) = applier.apply_file(&foo_map(), FOO).unwrap();
        assert_eq!(path, "com/example/Foo.java");
        assert_eq!(text, FOO);
        assert_eq!(stats.renames, 0);
    }

    #[test]
    fn test_same_length_field_rename() {
        let applier = applier("FD: com/example/Foo/bar com/example/Foo/baz\n");
        let (_, text, stats) = applier.apply_file(&foo_map(), FOO).unwrap();
        assert_eq!(text, FOO.replace("bar", "baz"));
        assert_eq!(stats.renames, 2);
    }

    #[test]
    fn test_longer_field_rename_shifts_later_references() {
        let applier = applier(
            "CL: com/example/util/Helper org/lib/Tools\n\
             FD: com/example/Foo/bar com/example/Foo/qux1\n",
        );
        let (_, text, _) = applier.apply_file(&foo_map(), FOO).unwrap();
        assert!(text.contains("private int qux1;"));
        assert!(text.contains("return this.qux1 + Tools.ONE;"));
        assert!(text.contains("\nimport org.lib.Tools;\n"));
        assert!(!text.contains("Helper"));
    }

    #[test]
    fn test_class_move_renames_file_and_package() {
        let applier = applier("CL: com/example/Foo net/moved/Bar\n");
        let (path, text, _) = applier.apply_file(&foo_map(), FOO).unwrap();
        assert_eq!(path, "net/moved/Bar.java");
        assert!(text.starts_with("package net.moved;\n"));
        assert!(text.contains("public class Bar {"));
        // The helper is no longer in the same package but was already imported
        assert_eq!(text.matches("import com.example.util.Helper;").count(), 1);
    }

    #[test]
    fn test_stale_range_map_fails() {
        let applier = applier("FD: com/example/Foo/bar com/example/Foo/baz\n");
        let changed = FOO.replacen("private int bar", "private int car", 1);
        let err = applier.apply_file(&foo_map(), &changed).unwrap_err();
        match err {
            Error::MappingConsistency {
                file,
                start,
                expected,
                actual,
                ..
            } => {
                assert_eq!(file, "com/example/Foo.java");
                assert_eq!(start, 90);
                assert_eq!(expected, "bar");
                assert_eq!(actual, "car");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_no_import_for_own_or_nested_class() {
        let source = "package a;\n\nclass Foo {\n    Foo.In x;\n    In y;\n    FooBar z;\n}\n";
        let mut b = RangeMapBuilder::for_source("a/Foo.java", source);
        b.add_class_declaration(12, 51, "a/Foo");
        b.add_class_reference(28, 3, "Foo", "a/Foo", false);
        b.add_class_reference(32, 2, "In", "a/Foo$In", true);
        b.add_class_reference(42, 2, "In", "a/Foo$In", false);
        b.add_class_reference(52, 6, "FooBar", "a/FooBar", false);
        let map = b.build();

        let applier = applier("CL: a/FooBar b/FooBar\n");
        let (_, text, stats) = applier.apply_file(&map, source).unwrap();
        assert_eq!(stats.imports_added, 1);
        assert!(text.starts_with("package a;\nimport b.FooBar;\n\n"));
        assert!(!text.contains("import a.Foo"));
    }

    #[test]
    fn test_qualified_nested_reference_keeps_outer_chain() {
        let source = "class Foo { a.Outer.In x; }";
        let mut b = RangeMapBuilder::for_source("Foo.java", source);
        b.add_class_reference(12, 10, "a.Outer.In", "a/Outer$In", true);
        let map = b.build();

        let applier = applier("CL: a/Outer$In b/Top$Nested\n");
        let (_, text, _) = applier.apply_file(&map, source).unwrap();
        assert_eq!(text, "class Foo { b.Top.Nested x; }");

        let source = "class Foo { Outer.In x; }";
        let mut b = RangeMapBuilder::for_source("Foo.java", source);
        b.add_class_reference(12, 8, "Outer.In", "a/Outer$In", true);
        let (_, text, _) = applier.apply_file(&b.build(), source).unwrap();
        assert_eq!(text, "class Foo { Top.Nested x; }");
    }

    #[test]
    fn test_constructor_and_parameter_renames() {
        let source = "class Foo { Foo(int p_1) { use(p_1); } }";
        let mut b = RangeMapBuilder::for_source("a/Foo.java", source);
        b.add_method_reference(12, 3, "Foo", "a/Foo", "<init>", "(I)V");
        b.add_parameter_reference(20, 3, "p_1", "a/Foo", "<init>", "(I)V", 0);
        b.add_parameter_reference(31, 3, "p_1", "a/Foo", "<init>", "(I)V", 0);
        let map = b.build();

        let mut chain = MappingChain::new();
        chain.push(MappingFile::parse("CL: a/Foo a/Renamed\n", Path::new("t.srg")).unwrap());
        let mut params = ParamTable::new();
        params
            .parse_into("a/Foo.<init>(I)V=|count\n", Path::new("t.exc"))
            .unwrap();
        let applier = RangeApplier::new(chain, params);

        let (path, text, _) = applier.apply_file(&map, source).unwrap();
        assert_eq!(path, "a/Renamed.java");
        assert_eq!(text, "class Foo { Renamed(int count) { use(count); } }");
    }

    #[test]
    fn test_top_level_class_mapped_to_nested_is_rejected() {
        let applier = applier("CL: a/Foo a/Outer$Foo\n");
        let map = RangeMapBuilder::for_source("a/Foo.java", "class Foo {}").build();
        let err = applier.apply_file(&map, "class Foo {}").unwrap_err();
        assert!(matches!(err, Error::InvalidClassMapping { .. }));
    }

    #[test]
    fn test_reference_inside_renamed_reference_fails() {
        let source = "int value;";
        let mut b = RangeMapBuilder::for_source("Foo.java", source);
        b.add_field_reference(4, 5, "value", "a/Foo");
        b.add_field_reference(6, 3, "lue", "a/Foo");
        let err = applier("FD: a/Foo/value a/Foo/number\n")
            .apply_file(&b.build(), source)
            .unwrap_err();
        assert!(matches!(err, Error::MappingConsistency { start: 6, .. }));
    }

    #[test]
    fn test_overlapping_unchanged_references_pass() {
        let source = "class Foo { a.Outer x; }";
        let mut b = RangeMapBuilder::for_source("Foo.java", source);
        b.add_class_reference(12, 7, "a.Outer", "a/Outer", true);
        b.add_class_reference(14, 5, "Outer", "a/Outer", true);
        let (_, text, stats) = RangeApplier::default()
            .apply_file(&b.build(), source)
            .unwrap();
        assert_eq!(text, source);
        assert_eq!(stats.renames, 0);
    }

    #[test]
    fn test_overlap_with_unchanged_outer_reference_is_renamed() {
        let source = "class Foo { a.Outer x; }";
        let mut b = RangeMapBuilder::for_source("Foo.java", source);
        b.add_class_reference(12, 7, "a.Outer", "a/Outer", true);
        b.add_field_reference(14, 5, "Outer", "a/Holder");
        let (_, text, _) = applier("FD: a/Holder/Outer a/Holder/Inner\n")
            .apply_file(&b.build(), source)
            .unwrap();
        assert_eq!(text, "class Foo { a.Inner x; }");
    }

    #[test]
    fn test_literals_are_checked_but_kept() {
        let source = "x = \"bar\";";
        let mut b = RangeMapBuilder::for_source("Foo.java", source);
        b.add_field_literal(5, 3, "bar", "a/Foo", "bar");
        let applier = applier("FD: a/Foo/bar a/Foo/baz\n");
        let map = b.build();
        let (_, text, _) = applier.apply_file(&map, source).unwrap();
        assert_eq!(text, source);
        assert!(applier.apply_file(&map, "x = \"car\";").is_err());
    }
}

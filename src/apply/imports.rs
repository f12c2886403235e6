//! Import block rewriting
//!
//! Runs after symbol substitution, over the already rewritten text, one line at a
//! time. Only one import grammar is understood:
//!
//! ```text
//! import [static] a.b.C[.*];   // optional trailing comment
//! ```
//!
//! Anything else starting with `import` is reported as an [`Error::ImportGrammar`]
//! diagnostic and left as it is. Static imports of a single member are reported the
//! same way; static wildcard imports follow the rules for plain imports of their
//! class. Block comments before an import and imports split over several lines are
//! not supported.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;
use crate::mapping::MappingChain;
use crate::names::internal_to_source;
use crate::session::EditSession;

static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^import\s+(?P<static>static\s+)?(?P<class>[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*(?:\.\*)?)\s*;\s*(?://.*)?$",
    )
    .expect("IMPORT_LINE regex is invalid")
});

/// Settings for one file's import pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImportContext<'a> {
    pub chain: &'a MappingChain,
    pub keep_imports: bool,
    pub sort_imports: bool,
    pub line_ending: &'a str,
}

/// Result of the import pass.
#[derive(Debug, Default)]
pub(crate) struct ImportRewrite {
    pub text: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// A recognized import line.
struct ImportLine<'a> {
    is_static: bool,
    /// Written class name, without `.*` or a static member.
    class: &'a str,
    /// Byte span of `class` within the line.
    span: (usize, usize),
    wildcard: bool,
}

fn parse_import(body: &str) -> Option<ImportLine<'_>> {
    let caps = IMPORT_LINE.captures(body)?;
    let is_static = caps.name("static").is_some();
    let group = caps.name("class")?;
    let written = group.as_str();

    let (class, wildcard) = match written.strip_suffix(".*") {
        Some(class) => (class, true),
        // A static import names a member; the class is everything before it
        None if is_static => (written.rsplit_once('.').map_or(written, |(class, _)| class), false),
        None => (written, false),
    };
    Some(ImportLine {
        is_static,
        class,
        span: (group.start(), group.start() + class.len()),
        wildcard,
    })
}

/// Whether a line is meant to be an import, valid or not.
fn looks_like_import(body: &str) -> bool {
    body.strip_prefix("import")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// Blank once a trailing `//` comment is ignored.
fn is_blank(body: &str) -> bool {
    let code = match body.find("//") {
        Some(idx) => &body[..idx],
        None => body,
    };
    code.trim().is_empty()
}

fn strip_terminator(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\n', '\r']);
    (body, &line[body.len()..])
}

/// Implicitly visible names are never imported.
fn is_implicit(name: &str) -> bool {
    name.strip_prefix("java.lang.")
        .is_some_and(|rest| !rest.contains('.'))
}

/// Current dotted name of a class written in an import.
fn resolve(chain: &MappingChain, written: &str) -> String {
    match chain.resolve_source_name(written) {
        Some(internal) => internal_to_source(chain.map_class(internal)),
        None => written.to_string(),
    }
}

fn splice(body: &str, span: (usize, usize), replacement: &str, terminator: &str) -> String {
    let mut line = String::with_capacity(body.len() + replacement.len() + terminator.len());
    line.push_str(&body[..span.0]);
    line.push_str(replacement);
    line.push_str(&body[span.1..]);
    line.push_str(terminator);
    line
}

/// Rewrite `text`'s imports so exactly the `pending` names are imported.
///
/// `text` is the spliced output of `session`; grammar problems land in the
/// session's diagnostics.
pub(crate) fn rewrite_imports(
    text: &str,
    mut pending: BTreeSet<String>,
    ctx: &ImportContext<'_>,
    session: &mut EditSession,
) -> ImportRewrite {
    let mut result = ImportRewrite::default();
    let mut out: Vec<String> = Vec::new();
    let mut package_insert: Option<usize> = None;
    let mut saw_imports = false;
    let mut inserted = false;

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if inserted {
            out.push(line.to_string());
            continue;
        }
        let (body, terminator) = strip_terminator(line);
        if is_blank(body) {
            out.push(line.to_string());
            continue;
        }

        if body.starts_with("package ") {
            out.push(line.to_string());
            package_insert = Some(out.len());
            continue;
        }

        if !looks_like_import(body) {
            if saw_imports {
                let at = out.len();
                insert_pending(&mut out, at, &mut pending, ctx, &mut result.added);
                inserted = true;
            }
            out.push(line.to_string());
            continue;
        }

        saw_imports = true;
        let import = match parse_import(body) {
            Some(import) if !import.is_static || import.wildcard => import,
            parsed => {
                let reason = if parsed.is_some() {
                    "static member imports are not supported"
                } else {
                    "unsupported syntax"
                };
                tracing::warn!(
                    "Invalid import line {} in {} ({}): {}",
                    idx + 1,
                    session.path(),
                    reason,
                    body
                );
                session.push_diagnostic(Error::ImportGrammar {
                    file: session.path().to_string(),
                    line: idx + 1,
                    text: body.to_string(),
                });
                out.push(line.to_string());
                continue;
            }
        };

        if import.wildcard && !import.is_static {
            let package = import.class;
            let satisfied: Vec<String> = pending
                .iter()
                .filter(|name| name.rsplit_once('.').is_some_and(|(pkg, _)| pkg == package))
                .cloned()
                .collect();
            if !satisfied.is_empty() {
                for name in &satisfied {
                    tracing::debug!("Import {} satisfied by {}.*", name, package);
                    pending.remove(name);
                }
                out.push(line.to_string());
                continue;
            }
        }

        let renamed = resolve(ctx.chain, import.class);
        if pending.remove(&renamed) {
            if renamed != import.class {
                tracing::debug!("Rename import {} -> {}", import.class, renamed);
                out.push(splice(body, import.span, &renamed, terminator));
            } else {
                out.push(line.to_string());
            }
        } else if ctx.keep_imports {
            out.push(line.to_string());
        } else {
            tracing::debug!("Remove import {}", body.trim());
            result.removed.push(import.class.to_string());
        }
    }

    if !inserted {
        let at = package_insert.unwrap_or(0);
        insert_pending(&mut out, at, &mut pending, ctx, &mut result.added);
    }

    if ctx.sort_imports {
        sort_import_block(&mut out, ctx.line_ending);
    }

    result.text = out.concat();
    result
}

/// Insert one `import X;` line per pending name at `at`, followed by a blank line.
fn insert_pending(
    out: &mut Vec<String>,
    at: usize,
    pending: &mut BTreeSet<String>,
    ctx: &ImportContext<'_>,
    added: &mut Vec<String>,
) {
    pending.retain(|name| !is_implicit(name));
    if pending.is_empty() {
        return;
    }

    tracing::debug!("Adding {} imports", pending.len());
    // The line before the block may be the last one and unterminated
    if at > 0 && !out[at - 1].ends_with('\n') {
        out[at - 1].push_str(ctx.line_ending);
    }

    let mut block = Vec::with_capacity(pending.len() + 1);
    for name in std::mem::take(pending) {
        tracing::debug!("        {}", name);
        block.push(format!("import {};{}", name, ctx.line_ending));
        added.push(name);
    }
    block.push(ctx.line_ending.to_string());
    out.splice(at..at, block);
}

/// Rewrite the import region as one block: plain imports, then static ones, each
/// sorted and without duplicates.
fn sort_import_block(out: &mut Vec<String>, line_ending: &str) {
    let mut first = None;
    let mut last = None;
    for (idx, line) in out.iter().enumerate() {
        let (body, _) = strip_terminator(line);
        if looks_like_import(body) {
            first.get_or_insert(idx);
            last = Some(idx);
        } else if !is_blank(body) && !body.starts_with("package ") && first.is_some() {
            break;
        }
    }
    let (Some(first), Some(last)) = (first, last) else {
        return;
    };

    let mut plain = BTreeSet::new();
    let mut statics = BTreeSet::new();
    let mut kept = Vec::new();
    for line in &out[first..=last] {
        let (body, _) = strip_terminator(line);
        match parse_import(body) {
            Some(import) if import.is_static => {
                statics.insert(body.trim_end().to_string());
            }
            Some(_) => {
                plain.insert(body.trim_end().to_string());
            }
            None if !is_blank(body) => kept.push(line.clone()),
            None => {}
        }
    }

    let mut block = kept;
    for import in plain.into_iter().chain(statics) {
        block.push(format!("{import}{line_ending}"));
    }
    out.splice(first..=last, block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingFile;
    use std::path::Path;

    fn chain(table: &str) -> MappingChain {
        let mut chain = MappingChain::new();
        chain.push(MappingFile::parse(table, Path::new("t.srg")).unwrap());
        chain
    }

    struct Outcome {
        text: String,
        added: Vec<String>,
        removed: Vec<String>,
        diagnostics: Vec<Error>,
    }

    fn run(text: &str, pending: &[&str], chain: &MappingChain, keep: bool, sort: bool) -> Outcome {
        let ctx = ImportContext {
            chain,
            keep_imports: keep,
            sort_imports: sort,
            line_ending: "\n",
        };
        let pending = pending.iter().map(|s| s.to_string()).collect();
        let mut session = EditSession::new("a/Foo.java", text);
        let rewrite = rewrite_imports(text, pending, &ctx, &mut session);
        let (_, diagnostics) = session.finish();
        Outcome {
            text: rewrite.text,
            added: rewrite.added,
            removed: rewrite.removed,
            diagnostics,
        }
    }

    #[test]
    fn test_parse_import_forms() {
        let plain = parse_import("import a.b.C;").unwrap();
        assert_eq!(plain.class, "a.b.C");
        assert!(!plain.is_static && !plain.wildcard);

        let wild = parse_import("import a.b.*; // all").unwrap();
        assert_eq!(wild.class, "a.b");
        assert!(wild.wildcard);

        let member = parse_import("import static a.b.C.run;").unwrap();
        assert_eq!(member.class, "a.b.C");
        assert_eq!(member.span, (14, 19));

        assert!(parse_import("import a.b.C").is_none());
        assert!(parse_import("import a.b.C; int x;").is_none());
        assert!(parse_import("import /* c */ a.b.C;").is_none());
    }

    #[test]
    fn test_renames_and_removes() {
        let chain = chain("CL: a/Old b/New\nCL: a/Gone a/Gone\n");
        let text = "package a;\n\nimport a.Old;\nimport a.Gone;\n\nclass Foo {}\n";
        let result = run(text, &["b.New"], &chain, false, false);
        assert_eq!(result.text, "package a;\n\nimport b.New;\n\nclass Foo {}\n");
        assert_eq!(result.removed, vec!["a.Gone"]);
        assert!(result.added.is_empty());
    }

    #[test]
    fn test_keep_imports_leaves_unreferenced_lines() {
        let chain = MappingChain::new();
        let text = "import x.Unused;\n\nclass Foo {}\n";
        let result = run(text, &[], &chain, true, false);
        assert_eq!(result.text, text);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_inserts_after_existing_imports() {
        let chain = MappingChain::new();
        let text = "package a;\n\nimport x.Y;\n\nclass Foo {}\n";
        let result = run(text, &["x.Y", "z.Q", "java.lang.String"], &chain, false, false);
        assert_eq!(
            result.text,
            "package a;\n\nimport x.Y;\n\nimport z.Q;\n\nclass Foo {}\n"
        );
        assert_eq!(result.added, vec!["z.Q"]);
    }

    #[test]
    fn test_inserts_after_package_without_imports() {
        let chain = MappingChain::new();
        let text = "package a;\nclass Foo {}\n";
        let result = run(text, &["z.Q", "y.P"], &chain, false, false);
        assert_eq!(result.text, "package a;\nimport y.P;\nimport z.Q;\n\nclass Foo {}\n");
    }

    #[test]
    fn test_inserts_at_file_start_without_package() {
        let chain = MappingChain::new();
        let result = run("class Foo {}", &["z.Q"], &chain, false, false);
        assert_eq!(result.text, "import z.Q;\n\nclass Foo {}");
    }

    #[test]
    fn test_nested_java_lang_names_are_imported() {
        let chain = MappingChain::new();
        let result = run("class Foo {}\n", &["java.lang.Thread.State"], &chain, false, false);
        assert_eq!(result.added, vec!["java.lang.Thread.State"]);
    }

    #[test]
    fn test_wildcard_satisfies_same_package_only() {
        let chain = MappingChain::new();
        let text = "import x.*;\nimport y.*;\n\nclass Foo {}\n";
        let result = run(text, &["x.A", "x.sub.B"], &chain, false, false);
        // y.* satisfies nothing and is removed, x.sub.B still needs its own line
        assert_eq!(
            result.text,
            "import x.*;\n\nimport x.sub.B;\n\nclass Foo {}\n"
        );
        assert_eq!(result.removed, vec!["y"]);
    }

    #[test]
    fn test_static_wildcards_follow_pending_names() {
        let chain = chain("CL: a/Util b/Helpers\n");
        let text = "import static a.Util.*;\nimport static c.Other.*;\n\nclass Foo {}\n";
        let result = run(text, &["b.Helpers"], &chain, false, false);
        assert_eq!(result.text, "import static b.Helpers.*;\n\nclass Foo {}\n");
        assert_eq!(result.removed, vec!["c.Other"]);
        assert!(result.added.is_empty());

        let kept = run(text, &[], &chain, true, false);
        assert_eq!(kept.text, text);
    }

    #[test]
    fn test_static_member_import_is_reported_and_kept() {
        let chain = chain("CL: a/Util b/Helpers\n");
        let text = "import static a.Util.run;\n\nclass Foo {}\n";
        let result = run(text, &[], &chain, false, false);
        assert_eq!(result.text, text);
        assert!(result.removed.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert!(matches!(
            result.diagnostics[0],
            Error::ImportGrammar { line: 1, .. }
        ));
    }

    #[test]
    fn test_invalid_import_is_reported_and_kept() {
        let chain = MappingChain::new();
        let text = "import a.b.C\n    ;\nclass Foo {}\n";
        let result = run(text, &[], &chain, false, false);
        assert_eq!(result.diagnostics.len(), 1);
        assert!(matches!(
            result.diagnostics[0],
            Error::ImportGrammar { line: 1, .. }
        ));
        assert!(result.text.starts_with("import a.b.C\n"));
    }

    #[test]
    fn test_license_header_before_imports() {
        let chain = MappingChain::new();
        let text = "/*\n * License\n */\npackage a;\n\nimport x.Y;\n\nclass Foo {}\n";
        let result = run(text, &["x.Y", "x.Z"], &chain, false, false);
        assert_eq!(
            result.text,
            "/*\n * License\n */\npackage a;\n\nimport x.Y;\n\nimport x.Z;\n\nclass Foo {}\n"
        );
    }

    #[test]
    fn test_sort_imports_orders_and_dedupes() {
        let chain = MappingChain::new();
        let text = "package a;\n\nimport static z.S.run;\nimport y.B;\nimport x.A;\nimport y.B;\n\nclass Foo {}\n";
        let result = run(text, &["y.B", "x.A"], &chain, true, true);
        assert_eq!(
            result.text,
            "package a;\n\nimport x.A;\nimport y.B;\nimport static z.S.run;\n\nclass Foo {}\n"
        );
    }

    #[test]
    fn test_crlf_terminators_for_new_lines() {
        let chain = MappingChain::new();
        let ctx = ImportContext {
            chain: &chain,
            keep_imports: false,
            sort_imports: false,
            line_ending: "\r\n",
        };
        let pending = ["z.Q".to_string()].into_iter().collect();
        let text = "package a;\r\n\r\nclass Foo {}\r\n";
        let mut session = EditSession::new("a/Foo.java", text);
        let result = rewrite_imports(text, pending, &ctx, &mut session);
        assert_eq!(
            result.text,
            "package a;\r\nimport z.Q;\r\n\r\n\r\nclass Foo {}\r\n"
        );
    }
}

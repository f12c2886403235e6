//! Range-map generation from extractor event files
//!
//! An extractor writes one `<source path>.events.jsonl` file per source, next to the
//! source under an input root, holding one [`BuilderEvent`] per line. Each is fed to
//! a [`RangeMapBuilder`] bound to the current source text, so the resulting map
//! carries that text's hash.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ignore::WalkBuilder;
use serde::Serialize;
use termcolor::{ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::InputSpec;
use crate::driver::{format_elapsed, format_number, serialize_elapsed};
use crate::error::{Error, Result};
use crate::io::{FolderSupplier, read_text};
use crate::range::{BuilderEvent, RangeMapBuilder, RangeMapSet};

pub const EVENTS_SUFFIX: &str = ".events.jsonl";

/// An event file and the source it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFile {
    /// Source path relative to its input root, `/`-separated
    pub source: String,
    pub path: PathBuf,
}

/// Every event file under `root`, sorted by source path.
pub fn discover(root: &Path) -> Vec<EventFile> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build();

    let mut found = Vec::new();
    for entry in walker.flatten() {
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if let Some(source) = relative.strip_suffix(EVENTS_SUFFIX) {
            found.push(EventFile {
                source: source.to_string(),
                path: path.to_path_buf(),
            });
        }
    }
    found.sort_by(|a, b| a.source.cmp(&b.source));
    found
}

/// Decode an event file. Blank lines between values are fine.
pub fn read_events(path: &Path) -> Result<Vec<BuilderEvent>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::Deserializer::from_reader(BufReader::new(file))
        .into_iter::<BuilderEvent>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::RangeMapFormat {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Totals for one `build` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Event files found
    pub sources: usize,
    pub built: usize,
    /// Maps taken unchanged from the cache
    pub reused: usize,
    /// Event files whose source text is missing
    pub missing: usize,
    pub overlaps: usize,
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,
}

/// Build range maps for every event file under the input roots.
///
/// When several roots hold events for the same source, the first root wins. Maps in
/// `cache` with the same path and content hash are reused without reading events.
pub fn build_range_maps(
    inputs: &[InputSpec],
    cache: Option<&RangeMapSet>,
) -> Result<(RangeMapSet, BuildReport)> {
    let started = Instant::now();
    let mut report = BuildReport::default();

    let mut sources: BTreeMap<String, (EventFile, FolderSupplier)> = BTreeMap::new();
    for input in inputs {
        let folder = FolderSupplier::new(&input.path).with_encoding(input.encoding);
        for event_file in discover(&input.path) {
            sources
                .entry(event_file.source.clone())
                .or_insert_with(|| (event_file, folder.clone()));
        }
    }
    report.sources = sources.len();

    let mut maps = RangeMapSet::new();
    for (source, (event_file, folder)) in sources {
        let text = match read_text(&folder, &source) {
            Ok(Some((text, _))) => text,
            Ok(None) => {
                tracing::warn!("Source {} for {} not found, skipping", source, event_file.path.display());
                report.missing += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", source, e);
                report.missing += 1;
                continue;
            }
        };

        let mut builder = RangeMapBuilder::for_source(source.as_str(), &text);
        if let Some(cached) = cache.and_then(|cache| cache.get(&source))
            && builder.reuse_cached(cached)
        {
            tracing::debug!("Reusing cached range map for {}", source);
            maps.insert(cached.clone());
            report.reused += 1;
            continue;
        }

        tracing::info!("Building range map for {}", source);
        builder.extend(read_events(&event_file.path)?);
        report.overlaps += builder.check_overlaps().len();
        maps.insert(builder.build());
        report.built += 1;
    }

    report.elapsed = started.elapsed();
    Ok((maps, report))
}

/// Print a build report to stdout with optional color.
pub fn print_build_report(report: &BuildReport, use_color: bool) -> io::Result<()> {
    let color_choice = if use_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(color_choice);

    let mut bold = ColorSpec::new();
    bold.set_bold(true);
    stdout.set_color(&bold)?;
    writeln!(stdout, "Range Maps")?;
    stdout.reset()?;
    writeln!(stdout, "──────────")?;
    writeln!(stdout, "Sources:      {}", format_number(report.sources))?;
    writeln!(stdout, "  built       {:>8}", format_number(report.built))?;
    writeln!(stdout, "  reused      {:>8}", format_number(report.reused))?;
    if report.missing > 0 {
        writeln!(stdout, "  missing     {:>8}", format_number(report.missing))?;
    }
    if report.overlaps > 0 {
        writeln!(stdout, "Overlaps:     {}", report.overlaps)?;
    }
    writeln!(stdout, "Elapsed:      {}", format_elapsed(report.elapsed))?;
    Ok(())
}

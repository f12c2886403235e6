//! Batch driver and run report
//!
//! Visits every range map in sorted path order, reads the matching source through
//! the input supplier, hands it to one engine and commits the result to the output
//! supplier. Results may be computed on a rayon pool but are always committed in
//! path order, and the first fatal error in that order stops the batch.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Serialize, Serializer};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::error::{Error, Result};
use crate::io::{Encoding, InputSupplier, OutputSupplier, read_text};
use crate::range::{RangeMap, RangeMapSet};

/// One edit engine, applied to a single file at a time.
pub trait FileRewriter: Sync {
    fn rewrite(&self, map: &RangeMap, text: &str) -> Result<FileOutcome>;
}

/// What happens to a file once an engine is done with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutput {
    /// Write `text` under `path`, which may differ from the input path.
    Write { path: String, text: String },
    Omit,
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub output: FileOutput,
    pub stats: FileStats,
}

/// Per-file edit counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub renames: usize,
    pub imports_added: usize,
    pub imports_removed: usize,
    pub excisions: usize,
    pub diagnostics: usize,
}

/// Totals for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Range maps visited
    pub files: usize,
    /// Files written to the output
    pub rewritten: usize,
    /// Written files whose path changed
    pub moved: usize,
    pub omitted: usize,
    /// Sources absent from every input or unreadable
    pub missing: usize,
    pub write_failures: usize,
    pub renames: usize,
    pub imports_added: usize,
    pub imports_removed: usize,
    pub excisions: usize,
    pub diagnostics: usize,
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,
}

pub(crate) fn serialize_elapsed<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_elapsed(*elapsed))
}

/// Elapsed time rounded to milliseconds, e.g. `1s 250ms`.
pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    humantime::format_duration(Duration::from_millis(millis)).to_string()
}

impl BatchReport {
    fn record(&mut self, stats: &FileStats) {
        self.renames += stats.renames;
        self.imports_added += stats.imports_added;
        self.imports_removed += stats.imports_removed;
        self.excisions += stats.excisions;
        self.diagnostics += stats.diagnostics;
    }
}

/// A computed, not yet committed, file result.
enum Processed {
    Missing,
    Done {
        outcome: FileOutcome,
        encoding: Encoding,
    },
}

/// Runs an engine over a set of range maps.
pub struct BatchDriver<'a> {
    input: &'a dyn InputSupplier,
    output: &'a dyn OutputSupplier,
    /// 1 runs sequentially, 0 uses rayon's global pool, anything else a dedicated pool.
    jobs: usize,
}

impl<'a> BatchDriver<'a> {
    pub fn new(input: &'a dyn InputSupplier, output: &'a dyn OutputSupplier) -> Self {
        Self {
            input,
            output,
            jobs: 1,
        }
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn run(&self, maps: &RangeMapSet, rewriter: &dyn FileRewriter) -> Result<BatchReport> {
        let started = Instant::now();
        let mut report = BatchReport::default();
        let maps: Vec<&RangeMap> = maps.iter().collect();

        if self.jobs == 1 {
            for map in &maps {
                let processed = self.process(map, rewriter);
                self.commit(map, processed, &mut report)?;
            }
        } else {
            let results = self.process_parallel(&maps, rewriter);
            for (map, processed) in maps.iter().zip(results) {
                self.commit(map, processed, &mut report)?;
            }
        }

        if let Err(e) = self.output.close() {
            tracing::error!("Failed to close output: {}", e);
            report.write_failures += 1;
        }
        report.elapsed = started.elapsed();
        Ok(report)
    }

    fn process_parallel(&self, maps: &[&RangeMap], rewriter: &dyn FileRewriter) -> Vec<Result<Processed>> {
        let compute = || {
            maps.par_iter()
                .map(|map| self.process(map, rewriter))
                .collect::<Vec<_>>()
        };
        if self.jobs == 0 {
            return compute();
        }
        match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
            Ok(pool) => pool.install(compute),
            Err(e) => {
                tracing::warn!("Could not build a pool of {} threads: {}", self.jobs, e);
                compute()
            }
        }
    }

    fn process(&self, map: &RangeMap, rewriter: &dyn FileRewriter) -> Result<Processed> {
        let path = map.path();
        tracing::info!("Start processing {}", path);
        let Some((text, encoding)) = read_text(self.input, path).map_err(|e| Error::io(path, e))? else {
            return Ok(Processed::Missing);
        };
        let outcome = rewriter.rewrite(map, &text)?;
        Ok(Processed::Done { outcome, encoding })
    }

    fn commit(&self, map: &RangeMap, processed: Result<Processed>, report: &mut BatchReport) -> Result<()> {
        let path = map.path();
        report.files += 1;
        let (outcome, encoding) = match processed {
            Ok(Processed::Done { outcome, encoding }) => (outcome, encoding),
            Ok(Processed::Missing) => {
                tracing::warn!("Source {} not found in any input, skipping", path);
                report.missing += 1;
                return Ok(());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path, e);
                report.missing += 1;
                return Ok(());
            }
        };

        report.record(&outcome.stats);
        match outcome.output {
            FileOutput::Omit => {
                tracing::info!("Omitting {}", path);
                report.omitted += 1;
            }
            FileOutput::Write { path: new_path, text } => {
                match self.output.write(&new_path, &encoding.encode(&text)) {
                    Ok(()) => {
                        report.rewritten += 1;
                        if new_path != path.replace('\\', "/") {
                            report.moved += 1;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to write {}: {}", new_path, e);
                        report.write_failures += 1;
                    }
                }
            }
        }
        tracing::info!("Finished processing {}", path);
        Ok(())
    }
}

/// Print a report to stdout with optional color.
pub fn print_report(report: &BatchReport, title: &str, use_color: bool) -> io::Result<()> {
    let color_choice = if use_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(color_choice);

    let mut bold = ColorSpec::new();
    bold.set_bold(true);
    stdout.set_color(&bold)?;
    writeln!(stdout, "{}", title)?;
    stdout.reset()?;
    writeln!(stdout, "{}", "─".repeat(title.chars().count()))?;

    writeln!(stdout, "Files:        {} total", format_number(report.files))?;
    let mut counts = vec![
        ("written", report.rewritten),
        ("moved", report.moved),
        ("omitted", report.omitted),
        ("missing", report.missing),
    ];
    counts.retain(|&(_, n)| n > 0);
    for (label, n) in counts {
        writeln!(stdout, "  {:<12}{:>8}", label, format_number(n))?;
    }
    writeln!(stdout)?;

    let mut label = ColorSpec::new();
    label.set_fg(Some(Color::Cyan));
    let edits = [
        ("Renames", report.renames),
        ("Imports +", report.imports_added),
        ("Imports -", report.imports_removed),
        ("Excisions", report.excisions),
    ];
    for (name, n) in edits.iter().filter(|(_, n)| *n > 0) {
        stdout.set_color(&label)?;
        write!(stdout, "{:<14}", name)?;
        stdout.reset()?;
        writeln!(stdout, "{:>8}", format_number(*n))?;
    }

    let mut warn = ColorSpec::new();
    warn.set_fg(Some(Color::Yellow));
    if report.diagnostics > 0 {
        stdout.set_color(&warn)?;
        writeln!(stdout, "Diagnostics:  {}", report.diagnostics)?;
        stdout.reset()?;
    }
    if report.write_failures > 0 {
        let mut red = ColorSpec::new();
        red.set_fg(Some(Color::Red)).set_bold(true);
        stdout.set_color(&red)?;
        writeln!(stdout, "Write failures: {}", report.write_failures)?;
        stdout.reset()?;
    }

    writeln!(stdout, "Elapsed:      {}", format_elapsed(report.elapsed))?;
    Ok(())
}

/// Format a number with thousand separators.
pub(crate) fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Print a report as JSON.
pub fn print_report_json(report: &BatchReport) -> io::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    println!("{}", json);
    Ok(())
}

//! CLI entry point for rangefix

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use rangefix::logging::{self, Verbosity};
use rangefix::{
    Batch, BatchReport, Error, InputSpec, Options, RangeMapSet, build_range_maps,
    print_build_report, print_report, print_report_json,
};

/// Color output mode
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and environment
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Determine whether to use color output based on mode and environment.
fn should_use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            // https://no-color.org/
            if std::env::var_os("NO_COLOR").is_some() {
                return false;
            }
            if std::env::var_os("FORCE_COLOR").is_some() {
                return true;
            }
            if std::env::var("TERM").map(|t| t == "dumb").unwrap_or(false) {
                return false;
            }
            std::io::stdout().is_terminal()
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rangefix")]
#[command(about = "Rename and prune source files using precomputed range maps")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Control color output: auto, always, never
    #[arg(long = "color", value_name = "WHEN", default_value = "auto", global = true)]
    color: ColorMode,

    /// Print the run report as JSON
    #[arg(long = "json", global = true)]
    json: bool,

    /// Log per-file progress (-v) or every edit (-vv); without it only warnings and
    /// errors are logged
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rename classes, members, parameters and packages
    Apply(ApplyArgs),
    /// Remove declarations carrying a marker annotation
    Remove(RemoveArgs),
    /// Build range maps from extractor event files
    Build(BuildArgs),
}

#[derive(clap::Args, Debug)]
struct SharedArgs {
    /// Source root (directory, .zip or .jar), optionally with its encoding
    /// (e.g. src@ISO-8859-1); repeatable, earlier roots win
    #[arg(short = 'i', long = "input", value_name = "PATH[@ENC]")]
    input: Vec<InputSpec>,

    /// Output directory, or a .zip/.jar archive to create
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Range map stream (repeatable, later streams win on duplicate paths)
    #[arg(short = 'r', long = "range", value_name = "FILE")]
    range: Vec<PathBuf>,

    /// Number of parallel workers
    /// (0 = auto-detect, 1 = sequential, N = use N workers)
    #[arg(short = 'j', long = "jobs", default_value = "1")]
    jobs: usize,
}

impl SharedArgs {
    fn into_options(self) -> Options {
        Options {
            inputs: self.input,
            output: self.output,
            range_maps: self.range,
            jobs: self.jobs,
            ..Default::default()
        }
    }
}

#[derive(clap::Args, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Rename table in SRG or TSRG format (repeatable, earlier tables win)
    #[arg(short = 'm', long = "map", value_name = "FILE")]
    map: Vec<PathBuf>,

    /// Parameter table in EXC format (repeatable)
    #[arg(long = "exc", value_name = "FILE")]
    exc: Vec<PathBuf>,

    /// Keep imports that no renamed reference needs
    #[arg(long = "keep-imports")]
    keep_imports: bool,

    /// Sort and de-duplicate the resulting import block
    #[arg(long = "sort-imports")]
    sort_imports: bool,
}

#[derive(clap::Args, Debug)]
struct RemoveArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Marker annotation, qualified or simple (repeatable)
    #[arg(long = "marker", value_name = "ANNOTATION")]
    marker: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    /// Source root holding sources and their .events.jsonl files (repeatable)
    #[arg(short = 'i', long = "input", value_name = "PATH[@ENC]")]
    input: Vec<InputSpec>,

    /// Range map stream to write
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Previous range map stream; maps whose source is unchanged are reused
    #[arg(long = "cache", value_name = "FILE")]
    cache: Option<PathBuf>,
}

fn main() {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| {
        eprintln!("rangefix: argument parsing error: {}", e);
        process::exit(1);
    });

    let use_color = should_use_color(args.color);
    logging::init_subscriber(
        Verbosity::from_flags(args.verbose, args.quiet),
        !use_color,
        args.json,
    );

    let result = match args.command {
        Command::Apply(apply) => {
            let options = Options {
                mappings: apply.map,
                params: apply.exc,
                keep_imports: apply.keep_imports,
                sort_imports: apply.sort_imports,
                ..apply.shared.into_options()
            };
            Batch::from_options(options)
                .and_then(|batch| batch.apply())
                .and_then(|report| finish("Rename Summary", &report, args.json, use_color))
        }
        Command::Remove(remove) => {
            let options = Options {
                markers: remove.marker,
                ..remove.shared.into_options()
            };
            Batch::from_options(options)
                .and_then(|batch| batch.remove())
                .and_then(|report| finish("Removal Summary", &report, args.json, use_color))
        }
        Command::Build(build) => run_build(build, args.json, use_color),
    };

    if let Err(e) = result {
        eprintln!("rangefix: {}", e);
        process::exit(1);
    }
}

/// Print the report; failed writes turn into a non-zero exit.
fn finish(title: &str, report: &BatchReport, json: bool, use_color: bool) -> rangefix::Result<()> {
    let printed = if json {
        print_report_json(report)
    } else {
        print_report(report, title, use_color)
    };
    printed.map_err(|e| Error::io("<stdout>", e))?;

    if report.write_failures > 0 {
        eprintln!(
            "rangefix: {} file(s) could not be written",
            report.write_failures
        );
        process::exit(1);
    }
    Ok(())
}

fn run_build(args: BuildArgs, json: bool, use_color: bool) -> rangefix::Result<()> {
    let Some(output) = args.output else {
        return Err(Error::Configuration("no output file given".to_string()));
    };
    if args.input.is_empty() {
        return Err(Error::Configuration("no input directory given".to_string()));
    }
    for input in &args.input {
        if !input.path.is_dir() {
            return Err(Error::Configuration(format!(
                "input {} does not exist or is not a directory",
                input.path.display()
            )));
        }
    }

    let cache = match &args.cache {
        Some(path) if path.exists() => Some(RangeMapSet::load(path)?),
        Some(path) => {
            tracing::info!("Cache {} does not exist yet", path.display());
            None
        }
        None => None,
    };

    let (maps, report) = build_range_maps(&args.input, cache.as_ref())?;
    maps.save(&output)?;

    let printed = if json {
        serde_json::to_string_pretty(&report)
            .map(|text| println!("{}", text))
            .map_err(std::io::Error::other)
    } else {
        print_build_report(&report, use_color)
    };
    printed.map_err(|e| Error::io("<stdout>", e))
}

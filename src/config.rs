//! Run configuration
//!
//! `Options` holds everything a run needs; `Batch::builder()` validates it up front
//! and loads the range maps, so a misconfigured run fails before any file is touched.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::apply::RangeApplier;
use crate::driver::{BatchDriver, BatchReport};
use crate::error::{Error, Result};
use crate::io::{ChainedInputSupplier, Encoding, OutputSupplier, create_output, is_archive, open_input};
use crate::mapping::{MappingChain, ParamTable};
use crate::range::RangeMapSet;
use crate::remove::{MarkerSet, RangeRemover};

/// A source root (directory or zip archive) and the encoding of the files under it,
/// written `PATH[@ENC]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub path: PathBuf,
    pub encoding: Encoding,
}

impl InputSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            encoding: Encoding::Utf8,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

impl FromStr for InputSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty input path".to_string());
        }
        match s.rsplit_once('@') {
            Some((path, encoding)) if !path.is_empty() => {
                Ok(InputSpec::new(path).with_encoding(encoding.parse()?))
            }
            _ => Ok(InputSpec::new(s)),
        }
    }
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Source roots, searched in order
    pub inputs: Vec<InputSpec>,
    /// Output directory, or a `.zip`/`.jar` archive
    pub output: Option<PathBuf>,
    /// Rename tables, first loaded wins
    pub mappings: Vec<PathBuf>,
    /// Parameter tables (EXC)
    pub params: Vec<PathBuf>,
    /// Range map streams
    pub range_maps: Vec<PathBuf>,
    pub keep_imports: bool,
    pub sort_imports: bool,
    /// Marker annotations for removal
    pub markers: Vec<String>,
    /// Worker threads (0 = auto-detect, 1 = sequential, N = use N workers)
    pub jobs: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: None,
            mappings: Vec::new(),
            params: Vec::new(),
            range_maps: Vec::new(),
            keep_imports: false,
            sort_imports: false,
            markers: Vec::new(),
            jobs: 1,
        }
    }
}

impl Options {
    /// Check the options without touching any file contents.
    pub fn validate(&self) -> Result<()> {
        let Some(output) = &self.output else {
            return Err(Error::Configuration("no output given".to_string()));
        };
        if is_archive(output) {
            if output.is_dir() {
                return Err(Error::Configuration(format!(
                    "output archive {} is a directory",
                    output.display()
                )));
            }
        } else if output.is_file() {
            return Err(Error::Configuration(format!(
                "output {} is a file, not a directory",
                output.display()
            )));
        }
        if self.range_maps.is_empty() {
            return Err(Error::Configuration("no range map given".to_string()));
        }
        if self.inputs.is_empty() {
            return Err(Error::Configuration("no input directory given".to_string()));
        }
        for input in &self.inputs {
            if is_archive(&input.path) {
                if !input.path.is_file() {
                    return Err(Error::Configuration(format!(
                        "input archive {} does not exist",
                        input.path.display()
                    )));
                }
            } else if !input.path.is_dir() {
                return Err(Error::Configuration(format!(
                    "input {} does not exist or is not a directory",
                    input.path.display()
                )));
            }
        }
        Ok(())
    }

    /// Every input root as one supplier, searched in order.
    pub fn input_supplier(&self) -> Result<ChainedInputSupplier> {
        let mut chain = ChainedInputSupplier::new();
        for input in &self.inputs {
            let supplier =
                open_input(&input.path, input.encoding).map_err(|e| Error::io(&input.path, e))?;
            chain.push_boxed(supplier);
        }
        Ok(chain)
    }
}

/// A validated run with its range maps loaded.
pub struct Batch {
    options: Options,
    input: ChainedInputSupplier,
    output: Box<dyn OutputSupplier>,
    range_maps: RangeMapSet,
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("options", &self.options)
            .field("input", &self.input)
            .field("range_maps", &self.range_maps.len())
            .finish()
    }
}

impl Batch {
    pub fn builder() -> BatchBuilder {
        BatchBuilder::default()
    }

    pub fn from_options(options: Options) -> Result<Self> {
        options.validate()?;
        let range_maps = RangeMapSet::load_all(&options.range_maps)?;
        tracing::info!(
            "Loaded {} range maps from {} streams",
            range_maps.len(),
            options.range_maps.len()
        );
        let input = options.input_supplier()?;
        let output = match &options.output {
            Some(output) => create_output(output).map_err(|e| Error::io(output, e))?,
            None => return Err(Error::Configuration("no output given".to_string())),
        };
        Ok(Self {
            input,
            output,
            range_maps,
            options,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn range_maps(&self) -> &RangeMapSet {
        &self.range_maps
    }

    fn driver(&self) -> BatchDriver<'_> {
        BatchDriver::new(&self.input, self.output.as_ref()).jobs(self.options.jobs)
    }

    /// Rename every file using the configured rename and parameter tables.
    pub fn apply(&self) -> Result<BatchReport> {
        let chain = MappingChain::load(&self.options.mappings)?;
        if chain.is_empty() {
            tracing::warn!("No rename tables given, only imports will be rewritten");
        }
        let mut params = ParamTable::new();
        for path in &self.options.params {
            params.load_into(path)?;
        }
        let applier = RangeApplier::new(chain, params)
            .keep_imports(self.options.keep_imports)
            .sort_imports(self.options.sort_imports);
        self.driver().run(&self.range_maps, &applier)
    }

    /// Prune every declaration carrying one of the configured markers.
    pub fn remove(&self) -> Result<BatchReport> {
        let markers = MarkerSet::new(&self.options.markers);
        if markers.is_empty() {
            return Err(Error::Configuration("no marker annotation given".to_string()));
        }
        self.driver().run(&self.range_maps, &RangeRemover::new(markers))
    }
}

/// Fluent construction of a `Batch`.
#[derive(Debug, Clone, Default)]
pub struct BatchBuilder {
    options: Options,
}

impl BatchBuilder {
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.inputs.push(InputSpec::new(path));
        self
    }

    pub fn input_with_encoding(mut self, path: impl Into<PathBuf>, encoding: Encoding) -> Self {
        self.options
            .inputs
            .push(InputSpec::new(path).with_encoding(encoding));
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.output = Some(path.into());
        self
    }

    pub fn mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.mappings.push(path.into());
        self
    }

    pub fn params(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.params.push(path.into());
        self
    }

    pub fn range_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.range_maps.push(path.into());
        self
    }

    pub fn keep_imports(mut self, keep: bool) -> Self {
        self.options.keep_imports = keep;
        self
    }

    pub fn sort_imports(mut self, sort: bool) -> Self {
        self.options.sort_imports = sort;
        self
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.options.markers.push(marker.into());
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.options.jobs = jobs;
        self
    }

    pub fn build(self) -> Result<Batch> {
        Batch::from_options(self.options)
    }
}

impl From<Options> for BatchBuilder {
    fn from(options: Options) -> Self {
        Self { options }
    }
}

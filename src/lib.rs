//! rangefix - Offset-precise batch renaming and pruning of source files driven by range maps

pub mod apply;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod io;
pub mod logging;
pub mod mapping;
pub mod names;
pub mod range;
pub mod remove;
pub mod session;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use apply::RangeApplier;
pub use config::{Batch, BatchBuilder, InputSpec, Options};
pub use driver::{
    BatchDriver, BatchReport, FileOutcome, FileOutput, FileRewriter, FileStats, print_report,
    print_report_json,
};
pub use error::{Error, Result};
pub use events::{BuildReport, build_range_maps, print_build_report};
pub use io::{
    ChainedInputSupplier, Encoding, FolderSupplier, InputSupplier, MemorySupplier, OutputSupplier,
    ZipInputSupplier, ZipOutputSupplier,
};
pub use mapping::{MappingChain, MappingFile, ParamTable};
pub use range::{BuilderEvent, RangeMap, RangeMapBuilder, RangeMapSet};
pub use remove::{MarkerSet, Pruned, RangeRemover};
pub use session::EditSession;

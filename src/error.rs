//! Error types shared by the range-map model, both edit engines and the batch driver.

use std::path::PathBuf;

/// Every failure a rangefix run can produce.
///
/// `MappingConsistency` and `InvalidClassMapping` abort the whole batch: they mean the
/// range maps were generated against different sources or mappings than the ones
/// supplied. `ImportGrammar` is only ever recorded as a diagnostic, the offending
/// line stays untouched. `Io` is file-scoped when it comes from a single source read.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required input was missing or invalid before any file was touched.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The buffer text at a recorded offset does not match the range map.
    #[error(
        "rename sanity check failed in {file}: expected '{expected}' at [{start},{end}] \
         (shifted {shift} [{shifted_start},{shifted_end}]) but found '{actual}'. \
         Regenerate the range map on the current sources and try again"
    )]
    MappingConsistency {
        file: String,
        start: usize,
        end: usize,
        shift: isize,
        shifted_start: isize,
        shifted_end: isize,
        expected: String,
        actual: String,
    },

    /// An import line outside the supported `import [static] a.b.C[.*];` grammar.
    #[error("invalid import line {line} in {file}: {text}")]
    ImportGrammar {
        file: String,
        line: usize,
        text: String,
    },

    /// A mapping turned a qualified reference into something that cannot be written back.
    #[error("invalid class mapping in {file}: {detail}")]
    InvalidClassMapping { file: String, detail: String },

    /// A persisted range-map stream could not be decoded.
    #[error("invalid range map {path}: {source}")]
    RangeMapFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A rename or parameter table line could not be parsed.
    #[error("invalid mapping file {path} line {line}: {detail}")]
    MappingFormat {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors that must stop the batch rather than skip a single file.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::ImportGrammar { .. } | Error::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

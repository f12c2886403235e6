//! Rename and parameter tables
//!
//! - `MappingFile`: one SRG or TSRG table with explicit `Option` lookups
//! - `MappingChain`: several tables in load order, the first match wins
//! - `ParamTable`: parameter names from EXC files

mod file;
mod params;

use std::collections::HashMap;
use std::path::Path;

pub use file::MappingFile;
pub use params::ParamTable;

use crate::error::Result;
use crate::names::{innermost_name, internal_to_source};

/// Rename tables in load order.
#[derive(Debug, Clone, Default)]
pub struct MappingChain {
    files: Vec<MappingFile>,
    /// Dotted source name of every original class to its internal name.
    source_index: HashMap<String, String>,
}

impl MappingChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut chain = MappingChain::new();
        for path in paths {
            chain.push(MappingFile::load(path.as_ref())?);
        }
        Ok(chain)
    }

    /// Append a table with lower precedence than every table already in the chain.
    pub fn push(&mut self, file: MappingFile) {
        for name in file.class_names() {
            self.source_index
                .entry(internal_to_source(name))
                .or_insert_with(|| name.to_string());
        }
        tracing::debug!(
            "Loaded {} classes from {}",
            file.class_count(),
            file.source().display()
        );
        self.files.push(file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// First table mapping the class, `None` if no table mentions it.
    pub fn class(&self, internal: &str) -> Option<&str> {
        self.files.iter().find_map(|file| file.class(internal))
    }

    /// Mapped class name, or the name itself when unmapped.
    pub fn map_class<'a>(&'a self, internal: &'a str) -> &'a str {
        self.class(internal).unwrap_or(internal)
    }

    /// First table that knows both the owner and the field.
    pub fn map_field(&self, owner: &str, name: &str) -> Option<&str> {
        self.files.iter().find_map(|file| file.field(owner, name))
    }

    /// Constructors take the innermost name of the mapped owner; other methods
    /// resolve through the owner's method table.
    pub fn map_method(&self, owner: &str, name: &str, desc: &str) -> Option<String> {
        if name == "<init>" {
            return Some(innermost_name(self.map_class(owner)).to_string());
        }
        self.files
            .iter()
            .find_map(|file| file.method(owner, name, desc))
            .map(str::to_string)
    }

    /// Internal name of an original class written in dotted source form
    /// (`a.Outer.Inner` to `a/Outer$Inner`).
    pub fn resolve_source_name(&self, dotted: &str) -> Option<&str> {
        self.source_index.get(dotted).map(String::as_str)
    }
}

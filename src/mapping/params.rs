//! Parameter name tables in EXC format
//!
//! Each line names one method and its parameters:
//!
//! ```text
//! com/example/Foo.run(ILjava/lang/String;)V=java/io/IOException|p_run_1,p_run_2
//! ```
//!
//! Lines without a `|` section and `-Access=` lines carry no parameter names.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodKey {
    owner: String,
    name: String,
    desc: String,
}

/// Parameter names by `(owner, method, descriptor)`, merged from any number of files.
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    methods: HashMap<MethodKey, Vec<String>>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut table = ParamTable::new();
        table.load_into(path)?;
        Ok(table)
    }

    /// Merge a file into this table. Methods already present keep their names.
    pub fn load_into(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.parse_into(&content, path)
    }

    pub fn parse_into(&mut self, content: &str, source: &Path) -> Result<()> {
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| Error::MappingFormat {
                path: source.to_path_buf(),
                line: idx + 1,
                detail: format!("missing '=' in '{line}'"),
            })?;
            if key.ends_with("-Access") {
                continue;
            }
            let Some((_, params)) = value.split_once('|') else {
                continue;
            };
            let Some(paren) = key.find('(') else {
                continue;
            };
            let (member, desc) = key.split_at(paren);
            let (owner, name) = member.rsplit_once('.').ok_or_else(|| Error::MappingFormat {
                path: source.to_path_buf(),
                line: idx + 1,
                detail: format!("method without owner in '{line}'"),
            })?;

            let names: Vec<String> = params.split(',').map(|p| p.trim().to_string()).collect();
            let key = MethodKey {
                owner: owner.to_string(),
                name: name.to_string(),
                desc: desc.to_string(),
            };
            match self.methods.entry(key) {
                Entry::Occupied(existing) => {
                    tracing::debug!(
                        "Parameter names for {}.{}{} already defined, keeping the first",
                        existing.key().owner,
                        existing.key().name,
                        existing.key().desc
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(names);
                }
            }
        }
        Ok(())
    }

    /// Replacement name for parameter `index` of a method, `None` when unknown.
    pub fn lookup(&self, owner: &str, method: &str, desc: &str, index: u32) -> Option<&str> {
        let key = MethodKey {
            owner: owner.to_string(),
            name: method.to_string(),
            desc: desc.to_string(),
        };
        self.methods
            .get(&key)?
            .get(index as usize)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

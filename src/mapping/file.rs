//! SRG and TSRG rename tables

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Renames declared for one class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ClassMapping {
    mapped: String,
    fields: HashMap<String, String>,
    /// Keyed by `(name, descriptor)`.
    methods: HashMap<(String, String), String>,
}

impl ClassMapping {
    fn new(mapped: impl Into<String>) -> Self {
        Self {
            mapped: mapped.into(),
            ..Default::default()
        }
    }

    /// Mapped internal name of the class.
    pub fn mapped(&self) -> &str {
        &self.mapped
    }

    /// `None` when the table has no entry, even if other members of the class are mapped.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn method(&self, name: &str, desc: &str) -> Option<&str> {
        self.methods
            .get(&(name.to_string(), desc.to_string()))
            .map(String::as_str)
    }
}

/// One loaded rename table.
#[derive(Debug, Clone, Default)]
pub struct MappingFile {
    source: PathBuf,
    classes: HashMap<String, ClassMapping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Srg,
    Tsrg,
}

impl MappingFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content, path)
    }

    /// Parse SRG (`CL: a/B c/D`) or TSRG v1 (`a/B c/D` with indented members),
    /// detected from the first significant line. `source` names the table in errors.
    pub fn parse(content: &str, source: &Path) -> Result<Self> {
        let mut file = MappingFile {
            source: source.to_path_buf(),
            ..Default::default()
        };

        let format = content
            .lines()
            .map(strip_comment)
            .find(|line| !line.trim().is_empty())
            .map(|line| {
                let line = line.trim_start();
                if ["PK:", "CL:", "FD:", "MD:"].iter().any(|tag| line.starts_with(tag)) {
                    Format::Srg
                } else {
                    Format::Tsrg
                }
            });

        match format {
            Some(Format::Srg) => file.parse_srg(content)?,
            Some(Format::Tsrg) => file.parse_tsrg(content)?,
            None => {}
        }
        Ok(file)
    }

    fn format_error(&self, line: usize, detail: impl Into<String>) -> Error {
        Error::MappingFormat {
            path: self.source.clone(),
            line,
            detail: detail.into(),
        }
    }

    fn class_entry(&mut self, original: &str, mapped: &str) -> &mut ClassMapping {
        self.classes
            .entry(original.to_string())
            .or_insert_with(|| ClassMapping::new(mapped))
    }

    fn parse_srg(&mut self, content: &str) -> Result<()> {
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                // Packages move with their classes
                ["PK:", _, _] => {}
                ["CL:", original, mapped] => {
                    let class = self.class_entry(original, mapped);
                    class.mapped = mapped.to_string();
                }
                // Plain SRG, or XSRG with field descriptors
                ["FD:", original, mapped] | ["FD:", original, _, mapped, _] => {
                    let (owner, name) = split_member(original)
                        .ok_or_else(|| self.format_error(line_no, "field without owner"))?;
                    let (mapped_owner, mapped_name) = split_member(mapped)
                        .ok_or_else(|| self.format_error(line_no, "field without owner"))?;
                    self.class_entry(owner, mapped_owner)
                        .fields
                        .insert(name.to_string(), mapped_name.to_string());
                }
                ["MD:", original, desc, mapped, _] => {
                    let (owner, name) = split_member(original)
                        .ok_or_else(|| self.format_error(line_no, "method without owner"))?;
                    let (mapped_owner, mapped_name) = split_member(mapped)
                        .ok_or_else(|| self.format_error(line_no, "method without owner"))?;
                    self.class_entry(owner, mapped_owner)
                        .methods
                        .insert((name.to_string(), desc.to_string()), mapped_name.to_string());
                }
                _ => return Err(self.format_error(line_no, format!("unrecognized SRG line '{line}'"))),
            }
        }
        Ok(())
    }

    fn parse_tsrg(&mut self, content: &str) -> Result<()> {
        let mut current: Option<String> = None;
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let stripped = strip_comment(raw);
            if stripped.trim().is_empty() {
                continue;
            }
            if line_no == 1 && stripped.starts_with("tsrg2") {
                return Err(self.format_error(line_no, "TSRG v2 tables are not supported"));
            }

            let indented = stripped.starts_with([' ', '\t']);
            let parts: Vec<&str> = stripped.split_whitespace().collect();
            if !indented {
                match parts.as_slice() {
                    // Package line: `a/b/ c/d/`
                    [original, _] if original.ends_with('/') => {
                        current = None;
                    }
                    [original, mapped] => {
                        let class = self.class_entry(original, mapped);
                        class.mapped = mapped.to_string();
                        current = Some(original.to_string());
                    }
                    _ => {
                        return Err(
                            self.format_error(line_no, format!("unrecognized class line '{}'", stripped.trim()))
                        );
                    }
                }
                continue;
            }

            let owner = current
                .clone()
                .ok_or_else(|| self.format_error(line_no, "member line before any class"))?;
            let class = self
                .classes
                .get_mut(&owner)
                .ok_or_else(|| Error::MappingFormat {
                    path: self.source.clone(),
                    line: line_no,
                    detail: "member line before any class".to_string(),
                })?;
            match parts.as_slice() {
                [name, mapped] => {
                    class.fields.insert(name.to_string(), mapped.to_string());
                }
                [name, desc, mapped] if desc.starts_with('(') => {
                    class
                        .methods
                        .insert((name.to_string(), desc.to_string()), mapped.to_string());
                }
                _ => {
                    return Err(
                        self.format_error(line_no, format!("unrecognized member line '{}'", stripped.trim()))
                    );
                }
            }
        }
        Ok(())
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Mapped name of a class, `None` when the table does not mention it.
    pub fn class(&self, internal: &str) -> Option<&str> {
        self.classes.get(internal).map(ClassMapping::mapped)
    }

    pub fn field(&self, owner: &str, name: &str) -> Option<&str> {
        self.classes.get(owner)?.field(name)
    }

    pub fn method(&self, owner: &str, name: &str, desc: &str) -> Option<&str> {
        self.classes.get(owner)?.method(name, desc)
    }

    /// Original internal names of every class in the table.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Split `a/B/name` into `("a/B", "name")`.
fn split_member(qualified: &str) -> Option<(&str, &str)> {
    let idx = qualified.rfind('/')?;
    Some((&qualified[..idx], &qualified[idx + 1..]))
}

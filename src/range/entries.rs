//! Leaf references, scope nodes and meta facts that make up a range map

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a declaration scope in the structural tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuralKind {
    Root,
    Package,
    Class,
    Interface,
    Enum,
    Record,
    Method,
    Field,
    Annotation,
}

impl StructuralKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StructuralKind::Root => "ROOT",
            StructuralKind::Package => "PACKAGE",
            StructuralKind::Class => "CLASS",
            StructuralKind::Interface => "INTERFACE",
            StructuralKind::Enum => "ENUM",
            StructuralKind::Record => "RECORD",
            StructuralKind::Method => "METHOD",
            StructuralKind::Field => "FIELD",
            StructuralKind::Annotation => "ANNOTATION",
        }
    }
}

/// The symbol a code reference points at.
///
/// Class names are internal names (`com/example/Outer$Inner`), descriptors are JVM
/// descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Package {
        name: String,
    },
    Class {
        name: String,
        /// Written fully qualified in source.
        qualified: bool,
    },
    Field {
        owner: String,
        name: String,
    },
    Method {
        owner: String,
        name: String,
        desc: String,
    },
    Parameter {
        owner: String,
        name: String,
        desc: String,
        index: u32,
    },
    LocalVariable {
        owner: String,
        name: String,
        desc: String,
        index: u32,
        #[serde(rename = "type")]
        var_type: String,
    },
    ClassLiteral {
        name: String,
    },
    FieldLiteral {
        owner: String,
        name: String,
    },
    MethodLiteral {
        owner: String,
        name: String,
        desc: String,
    },
}

impl Target {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Target::Package { .. } => "PACKAGE",
            Target::Class { .. } => "CLASS",
            Target::Field { .. } => "FIELD",
            Target::Method { .. } => "METHOD",
            Target::Parameter { .. } => "PARAMETER",
            Target::LocalVariable { .. } => "LOCAL_VARIABLE",
            Target::ClassLiteral { .. } => "CLASS_LITERAL",
            Target::FieldLiteral { .. } => "FIELD_LITERAL",
            Target::MethodLiteral { .. } => "METHOD_LITERAL",
        }
    }
}

/// One renamable code reference at a recorded position of the original buffer.
///
/// Offsets and lengths count characters (Unicode scalar values), not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEntry {
    pub start: usize,
    pub length: usize,
    /// Source text found at `start..start + length` when the map was built.
    pub text: String,
    #[serde(flatten)]
    pub target: Target,
}

impl RangeEntry {
    pub fn new(start: usize, length: usize, text: impl Into<String>, target: Target) -> Self {
        Self {
            start,
            length,
            text: text.into(),
            target,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

impl fmt::Display for RangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{},{},{}]",
            self.target.kind_name(),
            self.start,
            self.length,
            self.text
        )?;
        match &self.target {
            Target::Package { name } | Target::ClassLiteral { name } => write!(f, " {name}"),
            Target::Class { name, qualified } => {
                write!(f, " {name}{}", if *qualified { " (qualified)" } else { "" })
            }
            Target::Field { owner, name } | Target::FieldLiteral { owner, name } => {
                write!(f, " {owner}.{name}")
            }
            Target::Method { owner, name, desc } | Target::MethodLiteral { owner, name, desc } => {
                write!(f, " {owner}.{name}{desc}")
            }
            Target::Parameter {
                owner,
                name,
                desc,
                index,
            }
            | Target::LocalVariable {
                owner,
                name,
                desc,
                index,
                ..
            } => write!(f, " {owner}.{name}{desc}#{index}"),
        }
    }
}

/// Index of a scope node inside its range map's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// A declaration scope: class, method, field, annotation usage and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralEntry {
    pub kind: StructuralKind,
    pub start: usize,
    pub length: usize,
    pub name: Option<String>,
    /// Descriptor for methods and fields.
    pub descriptor: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) entries: Vec<RangeEntry>,
}

impl StructuralEntry {
    pub(crate) fn new(
        kind: StructuralKind,
        start: usize,
        length: usize,
        name: Option<String>,
        descriptor: Option<String>,
    ) -> Self {
        Self {
            kind,
            start,
            length,
            name,
            descriptor,
            parent: None,
            children: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn root(length: usize) -> Self {
        Self::new(StructuralKind::Root, 0, length, None, None)
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child scopes in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// References owned directly by this scope (not by a descendant).
    pub fn entries(&self) -> &[RangeEntry] {
        &self.entries
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

impl fmt::Display for StructuralEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{},{}]", self.kind.as_str(), self.start, self.length)?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        if let Some(desc) = &self.descriptor {
            write!(f, " {desc}")?;
        }
        Ok(())
    }
}

/// Fact about the file that is not tied to a text range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetaEntry {
    /// An accessor method proxying a target member under a naming prefix.
    MixinAccessor {
        owner: String,
        name: String,
        desc: String,
        target_owner: String,
        target_name: String,
        target_desc: String,
        prefix: String,
    },
}

//! Immutable per-file range maps and the path-keyed set the batch driver iterates

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::entries::{MetaEntry, NodeId, RangeEntry, StructuralEntry};
use super::json_types::{RangeMapRef, WireRangeMap};
use crate::error::{Error, Result};

/// Lower-case hex SHA-256 of a source text, the snapshot identity stored in range maps.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

/// Declarations and code references of one source file at recorded offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeMap {
    path: String,
    hash: String,
    /// Arena of scopes; index 0 is the synthetic root.
    nodes: Vec<StructuralEntry>,
    meta: Vec<MetaEntry>,
}

impl RangeMap {
    pub(crate) fn from_parts(
        path: String,
        hash: String,
        nodes: Vec<StructuralEntry>,
        meta: Vec<MetaEntry>,
    ) -> Self {
        Self {
            path,
            hash,
            nodes,
            meta,
        }
    }

    /// Relative path of the source file this map describes.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn root(&self) -> &StructuralEntry {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &StructuralEntry {
        &self.nodes[id.0]
    }

    /// Child scopes of `id` paired with their ids, in document order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &StructuralEntry)> {
        self.nodes[id.0]
            .children
            .iter()
            .map(move |&child| (child, &self.nodes[child.0]))
    }

    /// Every scope except the root, pre-order.
    pub fn structures(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut stack: Vec<NodeId> = self.root().children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// All code references of the file, flattened out of the tree in start order.
    ///
    /// The sort is stable, so entries sharing a start offset keep tree order.
    pub fn entries(&self) -> Vec<&RangeEntry> {
        let mut entries: Vec<&RangeEntry> =
            self.nodes.iter().flat_map(|node| node.entries.iter()).collect();
        entries.sort_by_key(|entry| entry.start);
        entries
    }

    pub fn entry_count(&self) -> usize {
        self.nodes.iter().map(|node| node.entries.len()).sum()
    }

    pub fn structure_count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn meta(&self) -> &[MetaEntry] {
        &self.meta
    }

    /// Whether this map was built against `text`. An empty hash is treated as unknown.
    pub fn matches_content(&self, text: &str) -> bool {
        self.hash.is_empty() || self.hash == content_hash(text)
    }
}

impl Serialize for RangeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        RangeMapRef::new(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RangeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        WireRangeMap::deserialize(deserializer).map(RangeMap::from)
    }
}

impl From<WireRangeMap> for RangeMap {
    fn from(wire: WireRangeMap) -> Self {
        let mut nodes = Vec::new();
        wire.root.into_arena(None, &mut nodes);
        RangeMap::from_parts(wire.path, wire.hash, nodes, wire.meta)
    }
}

/// Range maps keyed by relative path, iterated in sorted path order.
#[derive(Debug, Clone, Default)]
pub struct RangeMapSet {
    maps: BTreeMap<String, RangeMap>,
}

impl RangeMapSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a map, returning the one it replaced for the same path.
    pub fn insert(&mut self, map: RangeMap) -> Option<RangeMap> {
        self.maps.insert(map.path.clone(), map)
    }

    /// Merge another set in; maps from `other` win on duplicate paths.
    pub fn merge(&mut self, other: RangeMapSet) {
        for (path, map) in other.maps {
            if self.maps.insert(path.clone(), map).is_some() {
                tracing::warn!("Range map for {} defined more than once, using the last one", path);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&RangeMap> {
        self.maps.get(path)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Maps in sorted path order.
    pub fn iter(&self) -> impl Iterator<Item = &RangeMap> {
        self.maps.values()
    }

    /// Decode every range map in a stream of concatenated JSON values.
    ///
    /// `source` only names the stream in errors.
    pub fn read_from<R: Read>(reader: R, source: &Path) -> Result<Self> {
        let mut set = RangeMapSet::new();
        let stream = serde_json::Deserializer::from_reader(reader).into_iter::<RangeMap>();
        for map in stream {
            let map = map.map_err(|e| Error::RangeMapFormat {
                path: source.to_path_buf(),
                source: e,
            })?;
            if let Some(old) = set.insert(map) {
                tracing::warn!("Range map for {} repeated in {}", old.path, source.display());
            }
        }
        Ok(set)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::read_from(BufReader::new(file), path)
    }

    /// Load and merge several streams; later streams win on duplicate paths.
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut set = RangeMapSet::new();
        for path in paths {
            set.merge(Self::load(path.as_ref())?);
        }
        Ok(set)
    }

    /// Write one JSON document per line.
    pub fn write_to<W: Write>(&self, writer: W) -> std::io::Result<()> {
        let mut writer = BufWriter::new(writer);
        for map in self.maps.values() {
            serde_json::to_writer(&mut writer, map)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        self.write_to(file).map_err(|e| Error::io(path, e))
    }
}

impl FromIterator<RangeMap> for RangeMapSet {
    fn from_iter<I: IntoIterator<Item = RangeMap>>(iter: I) -> Self {
        let mut set = RangeMapSet::new();
        for map in iter {
            set.insert(map);
        }
        set
    }
}

//! Nested JSON form of a range map.
//!
//! The in-memory tree is an arena; on disk each scope carries its children inline,
//! which keeps the stream readable and independent of arena indices.

use serde::{Deserialize, Serialize};

use super::entries::{MetaEntry, NodeId, RangeEntry, StructuralEntry, StructuralKind};
use super::map::RangeMap;

#[derive(Serialize)]
pub(crate) struct RangeMapRef<'a> {
    path: &'a str,
    hash: &'a str,
    root: StructureRef<'a>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    meta: &'a [MetaEntry],
}

#[derive(Serialize)]
struct StructureRef<'a> {
    kind: StructuralKind,
    start: usize,
    length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    desc: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    entries: &'a [RangeEntry],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<StructureRef<'a>>,
}

impl<'a> RangeMapRef<'a> {
    pub(crate) fn new(map: &'a RangeMap) -> Self {
        Self {
            path: map.path(),
            hash: map.hash(),
            root: StructureRef::new(map, NodeId::ROOT),
            meta: map.meta(),
        }
    }
}

impl<'a> StructureRef<'a> {
    fn new(map: &'a RangeMap, id: NodeId) -> Self {
        let node = map.node(id);
        Self {
            kind: node.kind,
            start: node.start,
            length: node.length,
            name: node.name.as_deref(),
            desc: node.descriptor.as_deref(),
            entries: &node.entries,
            children: node
                .children
                .iter()
                .map(|&child| StructureRef::new(map, child))
                .collect(),
        }
    }
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

#[derive(Deserialize)]
pub(crate) struct WireRangeMap {
    pub(crate) path: String,
    #[serde(default)]
    pub(crate) hash: String,
    pub(crate) root: WireStructure,
    #[serde(default)]
    pub(crate) meta: Vec<MetaEntry>,
}

#[derive(Deserialize)]
pub(crate) struct WireStructure {
    kind: StructuralKind,
    start: usize,
    length: usize,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    entries: Vec<RangeEntry>,
    #[serde(default)]
    children: Vec<WireStructure>,
}

impl WireStructure {
    /// Flatten into `nodes`, returning the id of the pushed node.
    pub(crate) fn into_arena(self, parent: Option<NodeId>, nodes: &mut Vec<StructuralEntry>) -> NodeId {
        let id = NodeId(nodes.len());
        let mut node = StructuralEntry::new(self.kind, self.start, self.length, self.name, self.desc);
        node.parent = parent;
        node.entries = self.entries;
        nodes.push(node);

        let children: Vec<NodeId> = self
            .children
            .into_iter()
            .map(|child| child.into_arena(Some(id), nodes))
            .collect();
        nodes[id.0].children = children;
        id
    }
}

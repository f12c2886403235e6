//! Assembles positional extractor events into a nested range map.
//!
//! The extractor reports declarations (scope-open events) and code references
//! (leaf events) with absolute offsets, roughly in document order. The builder keeps
//! an explicit stack of open scopes: before anything is attached, scopes that end
//! before the new range does are closed. Records are never closed this way, since
//! parsers report record components that would otherwise pop them early.

use serde::{Deserialize, Serialize};

use super::entries::{MetaEntry, NodeId, RangeEntry, StructuralEntry, StructuralKind, Target};
use super::map::{RangeMap, content_hash};

/// One event from the extractor feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuilderEvent {
    Scope {
        #[serde(rename = "type")]
        kind: StructuralKind,
        start: usize,
        length: usize,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        desc: Option<String>,
    },
    Reference(RangeEntry),
    Meta(MetaEntry),
}

/// A pair of ranges that overlap where the tree says they should be disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub first: String,
    pub second: String,
}

/// Builds one file's [`RangeMap`].
#[derive(Debug)]
pub struct RangeMapBuilder {
    path: String,
    hash: String,
    nodes: Vec<StructuralEntry>,
    meta: Vec<MetaEntry>,
    stack: Vec<NodeId>,
}

impl RangeMapBuilder {
    /// Start a map for `path` whose root spans `file_length` characters.
    pub fn new(path: impl Into<String>, hash: impl Into<String>, file_length: usize) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            nodes: vec![StructuralEntry::root(file_length)],
            meta: Vec::new(),
            stack: vec![NodeId::ROOT],
        }
    }

    /// Start a map for a source text, deriving hash and length from it.
    pub fn for_source(path: impl Into<String>, text: &str) -> Self {
        Self::new(path, content_hash(text), text.chars().count())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a previously built map is still valid for this file.
    pub fn reuse_cached(&self, cache: &RangeMap) -> bool {
        cache.path() == self.path && !self.hash.is_empty() && cache.hash() == self.hash
    }

    /// Close every open scope that does not cover `start + length` and return the
    /// scope the new range belongs to.
    fn close_scopes(&mut self, start: usize, length: usize) -> NodeId {
        let new_end = start + length;
        while self.stack.len() > 1 {
            let top = self.stack[self.stack.len() - 1];
            let node = &self.nodes[top.0];
            if new_end > node.end() && node.kind != StructuralKind::Record {
                self.stack.pop();
            } else {
                break;
            }
        }
        self.stack.last().copied().unwrap_or(NodeId::ROOT)
    }

    /// Open a declaration scope and make it the innermost one.
    pub fn open_scope(
        &mut self,
        kind: StructuralKind,
        start: usize,
        length: usize,
        name: impl Into<String>,
        desc: Option<String>,
    ) -> NodeId {
        let parent = self.close_scopes(start, length);
        let id = NodeId(self.nodes.len());
        let mut node = StructuralEntry::new(kind, start, length, Some(name.into()), desc);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        self.stack.push(id);
        id
    }

    /// Attach a code reference to the innermost scope containing it.
    pub fn add_reference(&mut self, entry: RangeEntry) {
        let parent = self.close_scopes(entry.start, entry.length);
        self.nodes[parent.0].entries.push(entry);
    }

    pub fn add_meta(&mut self, entry: MetaEntry) {
        self.meta.push(entry);
    }

    pub fn apply(&mut self, event: BuilderEvent) {
        match event {
            BuilderEvent::Scope {
                kind,
                start,
                length,
                name,
                desc,
            } => {
                self.open_scope(kind, start, length, name, desc);
            }
            BuilderEvent::Reference(entry) => self.add_reference(entry),
            BuilderEvent::Meta(meta) => self.add_meta(meta),
        }
    }

    /// Feed a whole event stream.
    pub fn extend<I: IntoIterator<Item = BuilderEvent>>(&mut self, events: I) {
        for event in events {
            self.apply(event);
        }
    }

    // Declarations

    pub fn add_package_declaration(&mut self, start: usize, length: usize, name: &str) -> NodeId {
        self.open_scope(StructuralKind::Package, start, length, name, None)
    }

    pub fn add_class_declaration(&mut self, start: usize, length: usize, name: &str) -> NodeId {
        self.open_scope(StructuralKind::Class, start, length, name, None)
    }

    pub fn add_interface_declaration(&mut self, start: usize, length: usize, name: &str) -> NodeId {
        self.open_scope(StructuralKind::Interface, start, length, name, None)
    }

    pub fn add_enum_declaration(&mut self, start: usize, length: usize, name: &str) -> NodeId {
        self.open_scope(StructuralKind::Enum, start, length, name, None)
    }

    pub fn add_record_declaration(&mut self, start: usize, length: usize, name: &str) -> NodeId {
        self.open_scope(StructuralKind::Record, start, length, name, None)
    }

    pub fn add_annotation_declaration(&mut self, start: usize, length: usize, name: &str) -> NodeId {
        self.open_scope(StructuralKind::Annotation, start, length, name, None)
    }

    pub fn add_method_declaration(
        &mut self,
        start: usize,
        length: usize,
        name: &str,
        desc: &str,
    ) -> NodeId {
        self.open_scope(StructuralKind::Method, start, length, name, Some(desc.to_string()))
    }

    pub fn add_field_declaration(
        &mut self,
        start: usize,
        length: usize,
        name: &str,
        desc: &str,
    ) -> NodeId {
        self.open_scope(StructuralKind::Field, start, length, name, Some(desc.to_string()))
    }

    // References

    pub fn add_package_reference(&mut self, start: usize, length: usize, name: &str) {
        let target = Target::Package {
            name: name.to_string(),
        };
        self.add_reference(RangeEntry::new(start, length, name, target));
    }

    pub fn add_class_reference(
        &mut self,
        start: usize,
        length: usize,
        text: &str,
        internal: &str,
        qualified: bool,
    ) {
        let target = Target::Class {
            name: internal.to_string(),
            qualified,
        };
        self.add_reference(RangeEntry::new(start, length, text, target));
    }

    pub fn add_class_literal(&mut self, start: usize, length: usize, text: &str, internal: &str) {
        let target = Target::ClassLiteral {
            name: internal.to_string(),
        };
        self.add_reference(RangeEntry::new(start, length, text, target));
    }

    /// Field reference; the written text is the field name.
    pub fn add_field_reference(&mut self, start: usize, length: usize, text: &str, owner: &str) {
        let target = Target::Field {
            owner: owner.to_string(),
            name: text.to_string(),
        };
        self.add_reference(RangeEntry::new(start, length, text, target));
    }

    pub fn add_field_literal(
        &mut self,
        start: usize,
        length: usize,
        text: &str,
        owner: &str,
        name: &str,
    ) {
        let target = Target::FieldLiteral {
            owner: owner.to_string(),
            name: name.to_string(),
        };
        self.add_reference(RangeEntry::new(start, length, text, target));
    }

    pub fn add_method_reference(
        &mut self,
        start: usize,
        length: usize,
        text: &str,
        owner: &str,
        name: &str,
        desc: &str,
    ) {
        let target = Target::Method {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
        };
        self.add_reference(RangeEntry::new(start, length, text, target));
    }

    pub fn add_method_literal(
        &mut self,
        start: usize,
        length: usize,
        text: &str,
        owner: &str,
        name: &str,
        desc: &str,
    ) {
        let target = Target::MethodLiteral {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
        };
        self.add_reference(RangeEntry::new(start, length, text, target));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_parameter_reference(
        &mut self,
        start: usize,
        length: usize,
        text: &str,
        owner: &str,
        name: &str,
        desc: &str,
        index: u32,
    ) {
        let target = Target::Parameter {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
            index,
        };
        self.add_reference(RangeEntry::new(start, length, text, target));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_local_variable_reference(
        &mut self,
        start: usize,
        length: usize,
        text: &str,
        owner: &str,
        name: &str,
        desc: &str,
        index: u32,
        var_type: &str,
    ) {
        let target = Target::LocalVariable {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
            index,
            var_type: var_type.to_string(),
        };
        self.add_reference(RangeEntry::new(start, length, text, target));
    }

    // Meta

    #[allow(clippy::too_many_arguments)]
    pub fn add_mixin_accessor(
        &mut self,
        owner: &str,
        name: &str,
        desc: &str,
        target_owner: &str,
        target_name: &str,
        target_desc: &str,
        prefix: &str,
    ) {
        self.add_meta(MetaEntry::MixinAccessor {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
            target_owner: target_owner.to_string(),
            target_name: target_name.to_string(),
            target_desc: target_desc.to_string(),
            prefix: prefix.to_string(),
        });
    }

    /// Report sibling scopes and sibling references whose ranges overlap.
    ///
    /// Upstream parsers occasionally misorder events for unusual constructs; this is
    /// a best-effort detector and never fails the build.
    pub fn check_overlaps(&self) -> Vec<Overlap> {
        let mut overlaps = Vec::new();
        for node in &self.nodes {
            let mut children: Vec<&StructuralEntry> =
                node.children.iter().map(|id| &self.nodes[id.0]).collect();
            children.sort_by_key(|child| child.start);
            for pair in children.windows(2) {
                if pair[0].end() > pair[1].start {
                    overlaps.push(Overlap {
                        first: pair[0].to_string(),
                        second: pair[1].to_string(),
                    });
                }
            }

            let mut entries: Vec<&RangeEntry> = node.entries.iter().collect();
            entries.sort_by_key(|entry| entry.start);
            for pair in entries.windows(2) {
                if pair[0].end() > pair[1].start {
                    overlaps.push(Overlap {
                        first: pair[0].to_string(),
                        second: pair[1].to_string(),
                    });
                }
            }
        }

        for overlap in &overlaps {
            tracing::warn!("Overlap in {}: {}", self.path, overlap.first);
            tracing::warn!("         {}", overlap.second);
        }
        overlaps
    }

    pub fn build(self) -> RangeMap {
        RangeMap::from_parts(self.path, self.hash, self.nodes, self.meta)
    }
}

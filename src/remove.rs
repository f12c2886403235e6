//! Pruning engine
//!
//! Walks a file's scope tree pre-order and drops every declaration carrying one of
//! the marker annotations. A marker on the file or on a class or interface omits the
//! whole file; on other declarations only that declaration's lines go.

use crate::driver::{FileOutcome, FileOutput, FileRewriter, FileStats};
use crate::error::Result;
use crate::range::{NodeId, RangeMap, StructuralEntry, StructuralKind};
use crate::session::EditSession;

/// Annotation names that flag a declaration for removal, compared case-insensitively.
///
/// A marker without dots also matches the simple name of a qualified annotation.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    markers: Vec<String>,
}

impl MarkerSet {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().trim_start_matches('@').to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn matches(&self, annotation: &str) -> bool {
        let name = annotation.replace(['/', '$'], ".").to_lowercase();
        let simple = name.rsplit('.').next().unwrap_or(&name);
        self.markers
            .iter()
            .any(|marker| *marker == name || (!marker.contains('.') && marker == simple))
    }
}

/// Result of pruning one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pruned {
    /// The whole file goes away.
    Omit,
    Keep { text: String, excisions: usize },
}

/// Removes marked declarations from files described by range maps.
#[derive(Debug, Clone, Default)]
pub struct RangeRemover {
    markers: MarkerSet,
}

enum Walk {
    Continue,
    Omit,
}

impl RangeRemover {
    pub fn new(markers: MarkerSet) -> Self {
        Self { markers }
    }

    fn is_marked(&self, map: &RangeMap, id: NodeId) -> bool {
        map.children(id).any(|(_, child)| {
            child.kind == StructuralKind::Annotation && self.markers.matches(child.name())
        })
    }

    pub fn remove_file(&self, map: &RangeMap, text: &str) -> Result<Pruned> {
        if !map.matches_content(text) {
            tracing::warn!(
                "Content hash of {} does not match its range map",
                map.path()
            );
        }

        let mut session = EditSession::new(map.path(), text);
        if let Walk::Omit = self.visit(map, NodeId::ROOT, &mut session)? {
            return Ok(Pruned::Omit);
        }

        let excisions = session.edit_count();
        let (text, _) = session.finish();
        Ok(Pruned::Keep { text, excisions })
    }

    fn visit(&self, map: &RangeMap, id: NodeId, session: &mut EditSession) -> Result<Walk> {
        let node = map.node(id);
        if !self.is_marked(map, id) {
            let mut children: Vec<NodeId> = node.children().to_vec();
            children.sort_by_key(|&child| map.node(child).start);
            for child in children {
                if let Walk::Omit = self.visit(map, child, session)? {
                    return Ok(Walk::Omit);
                }
            }
            return Ok(Walk::Continue);
        }

        let walk = match node.kind {
            StructuralKind::Root | StructuralKind::Class | StructuralKind::Interface => {
                tracing::debug!("Remove {} from {}, omitting the file", node, map.path());
                Walk::Omit
            }
            StructuralKind::Enum
            | StructuralKind::Record
            | StructuralKind::Field
            | StructuralKind::Method
            | StructuralKind::Annotation => {
                excise(node, session)?;
                Walk::Continue
            }
            StructuralKind::Package => Walk::Continue,
        };
        Ok(walk)
    }
}

/// Queue removal of a declaration together with the line break before it. Methods
/// also take the rest of their last line.
///
/// A declaration reaching past the end of the buffer means the map was built for
/// another version of the file.
fn excise(node: &StructuralEntry, session: &mut EditSession) -> Result<()> {
    let chars = session.chars();
    if node.end() > chars.len() {
        return Err(session.mismatch(node.start, node.end(), &node.to_string()));
    }
    let floor = session.last_edit_end();
    let end = node.end();
    if end <= floor {
        tracing::debug!("Skip {}, already removed", node);
        return Ok(());
    }
    let start = node.start.max(floor);

    // Back to the previous line terminator, \r\n included
    let newline = chars[floor..start].iter().rposition(|&c| c == '\n').map(|idx| floor + idx);
    let cut_start = match newline {
        Some(idx) if idx > floor && chars[idx - 1] == '\r' => idx - 1,
        Some(idx) => idx,
        None => floor,
    };

    let mut cut_end = end;
    if node.kind == StructuralKind::Method {
        let line_end = chars[end.saturating_sub(1).max(start)..]
            .iter()
            .position(|&c| c == '\n')
            .map(|idx| end.saturating_sub(1).max(start) + idx);
        cut_end = match line_end {
            // One terminator per removed line: the one before the node is already gone
            Some(idx) if newline.is_some() => {
                if idx > end && chars[idx - 1] == '\r' {
                    idx - 1
                } else {
                    idx.max(end)
                }
            }
            Some(idx) => idx + 1,
            None => chars.len(),
        };
    }

    tracing::debug!(
        "Remove {} Shift[{}] [{},{})",
        node,
        session.shift(),
        cut_start,
        cut_end
    );
    session.remove(cut_start, cut_end);
    Ok(())
}

impl FileRewriter for RangeRemover {
    fn rewrite(&self, map: &RangeMap, text: &str) -> Result<FileOutcome> {
        let outcome = match self.remove_file(map, text)? {
            Pruned::Omit => FileOutcome {
                output: FileOutput::Omit,
                stats: FileStats::default(),
            },
            Pruned::Keep { text, excisions } => FileOutcome {
                output: FileOutput::Write {
                    path: map.path().to_string(),
                    text,
                },
                stats: FileStats {
                    excisions,
                    ..Default::default()
                },
            },
        };
        Ok(outcome)
    }
}

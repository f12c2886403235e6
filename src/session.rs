//! Per-file edit plumbing shared by the rename and pruning engines.
//!
//! Both engines read the original buffer at recorded offsets and describe their
//! changes as `(range, replacement)` edits in original coordinates. The session
//! keeps those edits ordered and non-overlapping, tracks the running shift the
//! edits add up to, and splices them all in one right-to-left pass at the end.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// One file's original text plus the edits queued against it.
#[derive(Debug)]
pub struct EditSession {
    path: String,
    original: Vec<char>,
    edits: Vec<Edit>,
    shift: isize,
    diagnostics: Vec<Error>,
}

impl EditSession {
    pub fn new(path: impl Into<String>, text: &str) -> Self {
        Self {
            path: path.into(),
            original: text.chars().collect(),
            edits: Vec::new(),
            shift: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Length of the original buffer in characters.
    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.original
    }

    /// Text of the original buffer at `start..end`, clamped to its length.
    pub fn text_at(&self, start: usize, end: usize) -> String {
        let end = end.min(self.original.len());
        let start = start.min(end);
        self.original[start..end].iter().collect()
    }

    /// Sum of `new_len - old_len` over every edit queued so far.
    pub fn shift(&self) -> isize {
        self.shift
    }

    /// End of the last queued edit in original coordinates, 0 when there is none.
    pub fn last_edit_end(&self) -> usize {
        self.edits.last().map_or(0, |edit| edit.end)
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    /// Check that the buffer still holds `expected` at `start..end`, as seen after
    /// every edit queued so far.
    ///
    /// A range starting inside an earlier edit no longer exists in the live buffer,
    /// so it fails the same way a text mismatch does.
    pub fn verify(&self, start: usize, end: usize, expected: &str) -> Result<()> {
        let actual = if start < self.last_edit_end() {
            self.live_text_at(start, end)
        } else {
            self.text_at(start, end)
        };
        if actual == expected && start >= self.last_edit_end() && end <= self.original.len() {
            return Ok(());
        }
        Err(self.consistency_error(start, end, expected, actual))
    }

    /// Consistency failure for `start..end`, reporting what the live buffer holds there.
    pub fn mismatch(&self, start: usize, end: usize, expected: &str) -> Error {
        let actual = self.live_text_at(start, end);
        self.consistency_error(start, end, expected, actual)
    }

    fn consistency_error(&self, start: usize, end: usize, expected: &str, actual: String) -> Error {
        Error::MappingConsistency {
            file: self.path.clone(),
            start,
            end,
            shift: self.shift,
            shifted_start: start as isize + self.shift,
            shifted_end: end as isize + self.shift,
            expected: expected.to_string(),
            actual,
        }
    }

    /// Text at `start..end` shifted into the live buffer, for error reports only.
    fn live_text_at(&self, start: usize, end: usize) -> String {
        let live = self.render();
        let from = (start as isize + self.shift).max(0) as usize;
        let to = (end as isize + self.shift).max(0) as usize;
        let to = to.min(live.len());
        let from = from.min(to);
        live[from..to].iter().collect()
    }

    /// Queue replacing `start..end` of the original text with `text`.
    ///
    /// Edits must arrive in document order and must not overlap.
    pub fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
        debug_assert!(start >= self.last_edit_end(), "edits out of order");
        debug_assert!(start <= end && end <= self.original.len());
        let text = text.into();
        self.shift += text.chars().count() as isize - (end - start) as isize;
        self.edits.push(Edit { start, end, text });
    }

    /// Queue deleting `start..end` of the original text.
    pub fn remove(&mut self, start: usize, end: usize) {
        self.replace(start, end, String::new());
    }

    /// Record a recoverable problem; it is logged by the caller and counted in the
    /// file's stats.
    pub fn push_diagnostic(&mut self, error: Error) {
        self.diagnostics.push(error);
    }

    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    fn render(&self) -> Vec<char> {
        let mut buffer = self.original.clone();
        for edit in self.edits.iter().rev() {
            buffer.splice(edit.start..edit.end, edit.text.chars());
        }
        buffer
    }

    /// The text with every queued edit applied, highest offset first. The session
    /// stays usable for diagnostics of later passes over that text.
    pub fn spliced(&self) -> String {
        self.render().into_iter().collect()
    }

    /// Apply every queued edit and return the new text with the diagnostics.
    pub fn finish(self) -> (String, Vec<Error>) {
        (self.spliced(), self.diagnostics)
    }
}

//! Source store: owns input buffers keyed by absolute path and answers
//! `(path, offset) -> (line, column)` lookups.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identifies one buffer owned by a [`SourceStore`] for the lifetime of a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathId(pub u32);

/// A span of source text, always within a single buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub path: PathId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(path: PathId, start: u32, end: u32) -> Self {
        Self { path, start, end }
    }

    /// A span carrying no useful location, for synthesized nodes.
    pub fn dummy() -> Self {
        Self {
            path: PathId(0),
            start: 0,
            end: 0,
        }
    }

    /// Merge two spans in the same buffer into one covering both.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(self.path, other.path, "merging spans from different buffers");
        Span {
            path: self.path,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Owns every input buffer loaded during one compilation and provides
/// line/column lookups against byte offsets, building the line-start index
/// lazily per buffer.
#[derive(Default)]
pub struct SourceStore {
    buffers: Vec<(PathBuf, String)>,
    by_path: HashMap<PathBuf, PathId>,
    line_starts: RefCell<HashMap<u32, Vec<usize>>>,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer under its absolute path. Idempotent: re-adding the
    /// same absolute path returns the existing id without re-copying bytes.
    pub fn add(&mut self, path: impl AsRef<Path>, text: impl Into<String>) -> PathId {
        let canonical = Self::canonical(path.as_ref());
        if let Some(&id) = self.by_path.get(&canonical) {
            return id;
        }
        let id = PathId(self.buffers.len() as u32);
        self.buffers.push((canonical.clone(), text.into()));
        self.by_path.insert(canonical, id);
        id
    }

    pub fn path(&self, id: PathId) -> &Path {
        &self.buffers[id.0 as usize].0
    }

    pub fn text(&self, id: PathId) -> &str {
        &self.buffers[id.0 as usize].1
    }

    pub fn lookup(&self, path: impl AsRef<Path>) -> Option<PathId> {
        self.by_path.get(&Self::canonical(path.as_ref())).copied()
    }

    /// 1-based line, 0-based byte-within-line column.
    pub fn position_of(&self, id: PathId, offset: u32) -> (usize, usize) {
        let mut cache = self.line_starts.borrow_mut();
        let starts = cache.entry(id.0).or_insert_with(|| Self::build_line_starts(self.text(id)));
        let offset = offset as usize;
        let line_idx = match starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = starts[line_idx];
        (line_idx + 1, offset.saturating_sub(line_start))
    }

    fn build_line_starts(text: &str) -> Vec<usize> {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        starts
    }

    /// Platform-agnostic canonical form: backslashes normalized to forward
    /// slashes for display and comparison. Does not touch the filesystem.
    pub fn canonical(path: &Path) -> PathBuf {
        let s = path.to_string_lossy().replace('\\', "/");
        PathBuf::from(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_on_absolute_path() {
        let mut store = SourceStore::new();
        let a = store.add("/a/b.scss", "x { y: 1; }");
        let b = store.add("/a/b.scss", "ignored second body");
        assert_eq!(a, b);
        assert_eq!(store.text(a), "x { y: 1; }");
    }

    #[test]
    fn position_of_tracks_lines() {
        let mut store = SourceStore::new();
        let id = store.add("/a.scss", "a {\n  b: 1;\n}\n");
        assert_eq!(store.position_of(id, 0), (1, 0));
        let offset = "a {\n  ".len() as u32;
        assert_eq!(store.position_of(id, offset), (2, 2));
    }

    #[test]
    fn canonical_normalizes_backslashes() {
        let p = SourceStore::canonical(Path::new("a\\b\\c.scss"));
        assert_eq!(p, PathBuf::from("a/b/c.scss"));
    }
}

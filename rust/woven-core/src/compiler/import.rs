//! Import resolution: the `_name`/`name.ext` partial cascade, explicit
//! include-path search roots, URL/`.css` passthrough detection, and
//! circular-import detection. File reading itself is left to the caller
//! (`lib.rs` owns the [`super::source::SourceStore`]); this module only
//! decides *which* file a written `@import` url refers to.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not find an import for {url:?}; tried {searched} candidate path(s)", searched = .searched.len())]
    NotFound { url: String, searched: Vec<PathBuf> },
    #[error("circular @import detected: {}", cycle_display(.cycle))]
    Circular { cycle: Vec<PathBuf> },
}

fn cycle_display(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub enum ResolvedImport {
    File { path: PathBuf, already_loaded: bool },
    /// A bare `.css` import, a URL, or `url(...)`-wrapped import: left in
    /// the output as a literal `@import` rather than inlined.
    Passthrough,
}

/// `true` for imports that CSS itself understands and Sass leaves alone:
/// `http://`, `https://`, `//`, a `url(...)` wrapper, a bare `.css`
/// extension, or a trailing media-query-looking tail (handled by the
/// parser keeping `media_queries` separate, not here).
pub fn is_passthrough_url(url: &str) -> bool {
    let trimmed = url.trim();
    trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("//")
        || trimmed.starts_with("url(")
        || trimmed.ends_with(".css")
}

/// The filename variants to try for a written import `name`, in the order
/// Sass tries them: the partial form first (`_name.scss`), then the bare
/// form, and — when `name` already carries an extension — only those two
/// exact spellings (no extension is invented).
fn candidate_filenames(name: &str) -> Vec<String> {
    let (dir, base) = match name.rfind('/') {
        Some(i) => (&name[..=i], &name[i + 1..]),
        None => ("", name),
    };
    if base.starts_with('_') {
        return vec![format!("{dir}{base}.scss"), format!("{dir}{base}.sass")];
    }
    let has_ext = base.ends_with(".scss") || base.ends_with(".sass") || base.ends_with(".css");
    if has_ext {
        vec![format!("{dir}_{base}"), format!("{dir}{base}")]
    } else {
        vec![
            format!("{dir}_{base}.scss"),
            format!("{dir}{base}.scss"),
            format!("{dir}_{base}.sass"),
            format!("{dir}{base}.sass"),
            format!("{dir}_{base}/_index.scss"),
            format!("{dir}{base}/_index.scss"),
        ]
    }
}

pub struct ImportResolver {
    include_paths: Vec<PathBuf>,
    active_stack: Vec<PathBuf>,
    imported: HashSet<PathBuf>,
    pub load_order: Vec<PathBuf>,
}

impl ImportResolver {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self {
            include_paths,
            active_stack: Vec::new(),
            imported: HashSet::new(),
            load_order: Vec::new(),
        }
    }

    /// Resolves a written `@import` url against `importer_dir` (searched
    /// first) and then each configured include path, in order.
    pub fn resolve(&mut self, url: &str, importer_dir: &Path) -> Result<ResolvedImport, ImportError> {
        if is_passthrough_url(url) {
            return Ok(ResolvedImport::Passthrough);
        }
        let mut searched = Vec::new();
        let roots = std::iter::once(importer_dir.to_path_buf()).chain(self.include_paths.iter().cloned());
        for root in roots {
            for candidate in candidate_filenames(url) {
                let full = root.join(&candidate);
                searched.push(full.clone());
                if full.is_file() {
                    let canonical = full.canonicalize().unwrap_or(full);
                    let already_loaded = self.imported.contains(&canonical);
                    if !already_loaded {
                        self.imported.insert(canonical.clone());
                        self.load_order.push(canonical.clone());
                    }
                    return Ok(ResolvedImport::File { path: canonical, already_loaded });
                }
            }
        }
        Err(ImportError::NotFound { url: url.to_string(), searched })
    }

    /// Marks `path` as currently being imported (push onto the active
    /// stack); fails if it's already on the stack, i.e. `a` imports `b`
    /// imports `a`.
    pub fn enter(&mut self, path: &Path) -> Result<(), ImportError> {
        if self.active_stack.iter().any(|p| p == path) {
            let mut cycle = self.active_stack.clone();
            cycle.push(path.to_path_buf());
            return Err(ImportError::Circular { cycle });
        }
        self.active_stack.push(path.to_path_buf());
        Ok(())
    }

    pub fn exit(&mut self) {
        self.active_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_detects_urls_and_css_extension() {
        assert!(is_passthrough_url("https://fonts.example.com/a.css"));
        assert!(is_passthrough_url("plain.css"));
        assert!(is_passthrough_url("url(foo)"));
        assert!(!is_passthrough_url("foo/bar"));
    }

    #[test]
    fn candidate_filenames_tries_partial_before_plain() {
        let cands = candidate_filenames("theme/base");
        assert_eq!(cands[0], "theme/_base.scss");
        assert_eq!(cands[1], "theme/base.scss");
    }

    #[test]
    fn candidate_filenames_respects_explicit_extension() {
        let cands = candidate_filenames("theme/base.scss");
        assert_eq!(cands, vec!["theme/_base.scss", "theme/base.scss"]);
    }

    #[test]
    fn already_underscored_name_is_not_doubled() {
        let cands = candidate_filenames("_base");
        assert_eq!(cands, vec!["_base.scss", "_base.sass"]);
    }

    #[test]
    fn enter_detects_cycles() {
        let mut r = ImportResolver::new(vec![]);
        let a = PathBuf::from("/proj/a.scss");
        r.enter(&a).unwrap();
        assert!(r.enter(&a).is_err());
    }

    #[test]
    fn resolve_dedups_by_canonical_path() {
        let dir = std::env::temp_dir().join("woven_import_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("_partial.scss"), "a { color: red; }").unwrap();
        let mut r = ImportResolver::new(vec![]);
        let first = r.resolve("partial", &dir).unwrap();
        let second = r.resolve("partial", &dir).unwrap();
        match (first, second) {
            (ResolvedImport::File { already_loaded: false, .. }, ResolvedImport::File { already_loaded: true, .. }) => {}
            _ => panic!("expected second resolve to be marked already-loaded"),
        }
    }
}

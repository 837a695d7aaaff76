//! Document source enumeration: which files under a root get indexed.

use search_core::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const ALLOWED_EXTENSIONS: &[&str] = &["htm", "html", "xml", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Text,
    Markup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub kind: DocKind,
}

/// Outcome of walking one source root.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Files with an allowed extension, in path order.
    pub accepted: Vec<SourceEntry>,
    /// Files skipped for their extension.
    pub ignored: Vec<PathBuf>,
    /// Entries below the root that could not be listed.
    pub unreadable: Vec<(PathBuf, String)>,
}

pub fn classify(path: &Path) -> Option<DocKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" => Some(DocKind::Text),
        e if ALLOWED_EXTENSIONS.contains(&e) => Some(DocKind::Markup),
        _ => None,
    }
}

/// Recursively list `root` (a file or a directory).
///
/// A missing or unlistable root is a [`Error::Traversal`]; problems further down the tree
/// are collected in [`Enumeration::unreadable`] and the walk continues.
pub fn enumerate(root: &Path) -> Result<Enumeration> {
    let meta = std::fs::metadata(root).map_err(|e| Error::Traversal { path: root.to_path_buf(), reason: e.to_string() })?;
    let mut out = Enumeration::default();
    if meta.is_file() {
        push_file(&mut out, root.to_path_buf());
        return Ok(out);
    }

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => push_file(&mut out, entry.into_path()),
            Ok(_) => {}
            Err(e) if e.depth() == 0 => {
                return Err(Error::Traversal { path: root.to_path_buf(), reason: e.to_string() });
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                tracing::warn!(path = %path.display(), error = %e, "cannot list entry");
                out.unreadable.push((path, e.to_string()));
            }
        }
    }
    Ok(out)
}

fn push_file(out: &mut Enumeration, path: PathBuf) {
    match classify(&path) {
        Some(kind) => out.accepted.push(SourceEntry { path, kind }),
        None => {
            tracing::debug!(path = %path.display(), "skipped: unsupported file type");
            out.ignored.push(path);
        }
    }
}

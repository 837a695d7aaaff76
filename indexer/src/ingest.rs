use scraper::Html;
use search_core::{Error, IndexWriter, NewDocument, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::source::{self, DocKind, SourceEntry};

/// Per-batch counts reported to the user.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub added: usize,
    /// Accepted files that could not be added.
    pub skipped: usize,
    /// Files ignored for their extension.
    pub ignored: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    fn fail(&mut self, path: &Path, err: &Error) {
        tracing::warn!(path = %path.display(), error = %err, "could not add document");
        self.skipped += 1;
        self.failures.push((path.to_path_buf(), err.to_string()));
    }
}

/// Document id: the file name without its extension.
pub fn doc_id_for(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Visible text of an HTML/XML document, without `script` and `style` bodies.
pub fn extract_text(raw: &str) -> String {
    let doc = Html::parse_document(raw);
    let mut out = String::with_capacity(raw.len() / 2);
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}

fn load(entry: &SourceEntry) -> Result<(NewDocument, String)> {
    let ingest_err = |reason: String| Error::DocumentIngest { path: entry.path.clone(), reason };
    let id = doc_id_for(&entry.path).ok_or_else(|| ingest_err("file name gives no document id".into()))?;
    let bytes = fs::read(&entry.path).map_err(|e| ingest_err(e.to_string()))?;
    let byte_len = bytes.len() as u64;
    let raw = String::from_utf8(bytes).map_err(|e| ingest_err(format!("not valid UTF-8: {e}")))?;
    let text = match entry.kind {
        DocKind::Text => raw,
        DocKind::Markup => extract_text(&raw),
    };
    let doc = NewDocument {
        external_id: id,
        path: entry.path.display().to_string(),
        filename: entry.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        byte_len,
    };
    Ok((doc, text))
}

/// Add every entry, one document at a time. A document that cannot be read or is a
/// duplicate is logged and counted as skipped; the batch always runs to the end.
pub fn ingest_batch(writer: &mut IndexWriter, entries: &[SourceEntry]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for entry in entries {
        let result = load(entry).and_then(|(doc, text)| {
            let id = doc.external_id.clone();
            writer.add_text(doc, &text).map(|terms| (id, terms))
        });
        match result {
            Ok((id, terms)) => {
                tracing::debug!(path = %entry.path.display(), doc = %id, terms, "added");
                summary.added += 1;
            }
            Err(e) => summary.fail(&entry.path, &e),
        }
    }
    summary
}

/// Walk `root` and add everything it yields. Only a traversal failure of `root` itself is
/// returned as an error.
pub fn index_path(writer: &mut IndexWriter, root: &Path) -> Result<BatchSummary> {
    let found = source::enumerate(root)?;
    let mut summary = ingest_batch(writer, &found.accepted);
    summary.ignored = found.ignored.len();
    for (path, reason) in found.unreadable {
        tracing::warn!(path = %path.display(), %reason, "skipped unreadable entry");
        summary.skipped += 1;
        summary.failures.push((path, reason));
    }
    tracing::info!(
        root = %root.display(),
        added = summary.added,
        skipped = summary.skipped,
        ignored = summary.ignored,
        "batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_ids_drop_the_extension() {
        assert_eq!(doc_id_for(Path::new("/x/CACM-1410.html")).as_deref(), Some("CACM-1410"));
        assert_eq!(doc_id_for(Path::new("b.txt")).as_deref(), Some("b"));
        assert_eq!(doc_id_for(Path::new("archive.tar.txt")).as_deref(), Some("archive.tar"));
    }

    #[test]
    fn markup_text_is_extracted() {
        let text = extract_text(
            "<html><head><title>Fast</title><style>p { color: red }</style></head>\
             <body><p>inverted<b>index</b></p><script>var hidden = 1;</script></body></html>",
        );
        let words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(words, vec!["Fast", "inverted", "index"]);
    }

    #[test]
    fn xml_text_is_extracted() {
        let text = extract_text("<?xml version=\"1.0\"?><doc><title>Posting</title><body>lists</body></doc>");
        assert!(text.contains("Posting"));
        assert!(text.contains("lists"));
        assert!(!text.contains("<title>"));
    }
}

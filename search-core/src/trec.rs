//! TREC run-file output: `<qid> Q0 <docno> <rank> <score> <system>` per line.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::search::Hit;

pub fn format_line(query_id: &str, doc_id: &str, rank: usize, score: f32, system_name: &str) -> String {
    format!("{query_id} Q0 {doc_id} {rank} {score} {system_name}")
}

pub struct RunWriter<W: Write> {
    out: W,
    system_name: String,
    lines: usize,
}

impl RunWriter<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed. Earlier runs are kept.
    pub fn append_to<P: AsRef<Path>>(path: P, system_name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::setup(path, e))?;
        Ok(Self::new(BufWriter::new(file), system_name))
    }
}

impl<W: Write> RunWriter<W> {
    pub fn new(out: W, system_name: impl Into<String>) -> Self {
        Self { out, system_name: system_name.into(), lines: 0 }
    }

    /// Write one line per hit, ranks starting at 1.
    pub fn write_hits(&mut self, query_id: &str, hits: &[Hit]) -> Result<()> {
        for (i, hit) in hits.iter().enumerate() {
            let line = format_line(query_id, &hit.external_id, i + 1, hit.score, &self.system_name);
            writeln!(self.out, "{line}")?;
            self.lines += 1;
        }
        Ok(())
    }

    pub fn lines_written(&self) -> usize { self.lines }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

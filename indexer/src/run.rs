use search_core::trec::RunWriter;
use search_core::{Error, IndexReader, QueryParser, Result, SearchConfig, Searcher};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct QueryFailure {
    pub query_id: usize,
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub queries: usize,
    pub answered: usize,
    pub lines_written: usize,
    pub failures: Vec<QueryFailure>,
}

/// Answer one query per input line. The query id is the 1-based line number, so a
/// query that fails still consumes its id. Failed queries, including lines that are not
/// valid UTF-8, are logged and skipped; only a failing read of `input` ends the run.
pub fn run_queries<R: BufRead, W: Write>(
    reader: &IndexReader,
    input: R,
    config: &SearchConfig,
    out: &mut RunWriter<W>,
) -> Result<RunSummary> {
    let parser = QueryParser::new(reader.analyzer());
    let searcher = Searcher::new(reader, config.similarity);
    let mut summary = RunSummary::default();
    for (i, raw) in input.split(b'\n').enumerate() {
        let mut raw = raw?;
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let query_id = i + 1;
        summary.queries += 1;

        let line = String::from_utf8_lossy(&raw).into_owned();
        let outcome = decode_line(raw)
            .and_then(|text| parser.parse(&text))
            .and_then(|q| searcher.search(&q, config.top_k));
        match outcome {
            Ok(top) => {
                out.write_hits(&query_id.to_string(), &top.hits)?;
                tracing::debug!(query_id, hits = top.hits.len(), total_hits = top.total_hits, "answered query");
                summary.answered += 1;
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(query_id, query = %line, error = %e, "query failed");
                summary.failures.push(QueryFailure { query_id, text: line, reason: e.to_string() });
            }
            Err(e) => return Err(e),
        }
    }
    summary.lines_written = out.lines_written();
    Ok(summary)
}

fn decode_line(raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw).map_err(|e| {
        let reason = format!("query is not valid UTF-8 ({})", e.utf8_error());
        Error::syntax(String::from_utf8_lossy(e.as_bytes()), reason)
    })
}

/// Open the committed index at `index_dir`, run every query in `queries`, and append the
/// results to the run file at `output`.
pub fn run_query_file(index_dir: &Path, queries: &Path, output: &Path, config: &SearchConfig) -> Result<RunSummary> {
    let reader = IndexReader::open(index_dir)?;
    let input = File::open(queries).map_err(|e| Error::setup(queries, e))?;
    let mut out = RunWriter::append_to(output, config.system_name.clone())?;
    let summary = run_queries(&reader, BufReader::new(input), config, &mut out)?;
    out.finish()?;
    tracing::info!(
        queries = summary.queries,
        answered = summary.answered,
        failed = summary.failures.len(),
        lines = summary.lines_written,
        output = %output.display(),
        "run finished"
    );
    Ok(summary)
}

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indexer::{index_path, run_query_file};
use search_core::{AnalyzerConfig, IndexConfig, IndexWriter, SearchConfig, Similarity};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a full-text index from a file tree and write TREC runs against it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index, or append to it, from one or more files or directories
    Build {
        /// Index directory
        #[arg(long, env = "SEARCH_INDEX")]
        index: PathBuf,
        /// Files or directories to add (.htm, .html, .xml, .txt)
        #[arg(long, required = true, num_args = 1..)]
        source: Vec<PathBuf>,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Run a query file (one query per line) and append the results to a run file
    Run {
        /// Index directory
        #[arg(long, env = "SEARCH_INDEX")]
        index: PathBuf,
        /// Query file
        #[arg(long)]
        queries: PathBuf,
        /// Run file to append to
        #[arg(long, default_value = "run.txt")]
        output: PathBuf,
        /// Hits per query
        #[arg(long, default_value_t = 100)]
        k: usize,
        /// tfidf (smoothed idf), tfidf-raw (ln(N/df)), bm25 or ql (Jelinek-Mercer)
        #[arg(long, env = "SEARCH_SIMILARITY", default_value = "tfidf")]
        similarity: Similarity,
        /// Last column of the run file; defaults to the similarity name
        #[arg(long)]
        system_name: Option<String>,
    },
}

/// Analysis options; only used when the index is created.
#[derive(Args)]
struct AnalysisArgs {
    /// Index stopwords too
    #[arg(long, default_value_t = false)]
    keep_stopwords: bool,
    /// Apply the English Snowball stemmer
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Store token positions in every posting
    #[arg(long, default_value_t = false)]
    positions: bool,
    /// Discard tokens longer than this
    #[arg(long, default_value_t = 255)]
    max_token_len: usize,
}

impl From<AnalysisArgs> for IndexConfig {
    fn from(a: AnalysisArgs) -> Self {
        IndexConfig {
            analyzer: AnalyzerConfig { remove_stopwords: !a.keep_stopwords, stem: a.stem, max_token_len: a.max_token_len },
            store_positions: a.positions,
        }
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { index, source, analysis } => build(index, source, analysis.into()),
        Commands::Run { index, queries, output, k, similarity, system_name } => {
            let config = SearchConfig {
                similarity,
                top_k: k,
                system_name: system_name.unwrap_or_else(|| similarity.name().to_string()),
            };
            let summary = run_query_file(&index, &queries, &output, &config)
                .with_context(|| format!("cannot run queries against {}", index.display()))?;
            for f in &summary.failures {
                eprintln!("query {} failed: {} ({:?})", f.query_id, f.reason, f.text);
            }
            eprintln!(
                "done: queries={} answered={} failed={} lines={} -> {}",
                summary.queries,
                summary.answered,
                summary.failures.len(),
                summary.lines_written,
                output.display()
            );
            Ok(())
        }
    }
}

fn build(index: PathBuf, sources: Vec<PathBuf>, config: IndexConfig) -> Result<()> {
    let mut writer = IndexWriter::open_or_create(&index, config)
        .with_context(|| format!("cannot create index at {}", index.display()))?;

    for source in &sources {
        match index_path(&mut writer, source) {
            Ok(summary) => {
                for (path, reason) in &summary.failures {
                    eprintln!("Could not add: {} ({reason})", path.display());
                }
                eprintln!(
                    "{}: {} documents added, {} skipped, {} ignored",
                    source.display(),
                    summary.added,
                    summary.skipped,
                    summary.ignored
                );
            }
            Err(e) => {
                tracing::error!(source = %source.display(), error = %e, "cannot index source");
                eprintln!("Error indexing {}: {e}", source.display());
            }
        }
    }

    let commit = writer.commit().with_context(|| format!("cannot commit index at {}", index.display()))?;
    eprintln!(
        "committed generation {}: {} documents ({} new), {} terms",
        commit.generation, commit.num_docs, commit.added, commit.num_terms
    );
    Ok(())
}

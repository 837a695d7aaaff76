//! On-disk layout of a committed index.
//!
//! ```text
//! <root>/CURRENT              {"generation": N}, replaced atomically on commit
//! <root>/write.lock           held by the single writer
//! <root>/gen-0000000N/meta.json
//! <root>/gen-0000000N/dictionary.bin
//! <root>/gen-0000000N/postings.bin
//! <root>/gen-0000000N/docs.bin
//! ```
//!
//! Every `.bin` file is a bincode payload followed by `SCR1` and a big-endian CRC32 of the
//! payload. A generation is written under `gen-N.tmp`, renamed into place, and only then
//! published through `CURRENT`, so readers see either the old or the new generation. The
//! generation replaced by a commit is removed by the commit after it.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::index::InvertedIndex;

pub const FORMAT_VERSION: u32 = 1;
const CRC_MAGIC: &[u8; 4] = b"SCR1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub generation: u64,
    pub num_docs: u32,
    pub num_terms: u32,
    pub total_tokens: u64,
    pub created_at: String,
    pub config: IndexConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct CurrentFile {
    generation: u64,
}

/// Dictionary entry: where a term's posting list lives inside `postings.bin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    pub df: u32,
    pub offset: u64,
    pub len: u64,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn current(&self) -> PathBuf { self.root.join("CURRENT") }
    pub fn lock(&self) -> PathBuf { self.root.join("write.lock") }
    pub fn generation(&self, generation: u64) -> PathBuf { self.root.join(format!("gen-{generation:08}")) }
    fn staging(&self, generation: u64) -> PathBuf { self.root.join(format!("gen-{generation:08}.tmp")) }
    fn current_staging(&self) -> PathBuf { self.root.join("CURRENT.tmp") }
}

pub(crate) fn meta_path(gen_dir: &Path) -> PathBuf { gen_dir.join("meta.json") }
pub(crate) fn dictionary_path(gen_dir: &Path) -> PathBuf { gen_dir.join("dictionary.bin") }
pub(crate) fn postings_path(gen_dir: &Path) -> PathBuf { gen_dir.join("postings.bin") }
pub(crate) fn docs_path(gen_dir: &Path) -> PathBuf { gen_dir.join("docs.bin") }

/// Write `payload` plus checksum footer and fsync it.
fn write_checked(path: &Path, payload: &[u8]) -> Result<()> {
    let crc = crc32fast::hash(payload);
    let mut f = File::create(path)?;
    f.write_all(payload)?;
    f.write_all(CRC_MAGIC)?;
    f.write_all(&crc.to_be_bytes())?;
    f.sync_all()?;
    Ok(())
}

/// Read a checksummed file and return its verified payload.
pub(crate) fn read_checked(path: &Path) -> Result<Vec<u8>> {
    let mut raw = fs::read(path).map_err(|e| Error::corrupt(path, e))?;
    let n = raw.len();
    if n < 8 || &raw[n - 8..n - 4] != CRC_MAGIC {
        return Err(Error::corrupt(path, "missing checksum footer"));
    }
    let stored = u32::from_be_bytes([raw[n - 4], raw[n - 3], raw[n - 2], raw[n - 1]]);
    raw.truncate(n - 8);
    let computed = crc32fast::hash(&raw);
    if computed != stored {
        return Err(Error::corrupt(
            path,
            format!("checksum mismatch: expected {stored:#010x}, got {computed:#010x}"),
        ));
    }
    Ok(raw)
}

/// Generation currently published through `CURRENT`, or `None` if nothing was ever committed.
pub fn current_generation(paths: &IndexPaths) -> Result<Option<u64>> {
    let path = paths.current();
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::corrupt(&path, e)),
    };
    let current: CurrentFile = serde_json::from_str(&text).map_err(|e| Error::corrupt(&path, e))?;
    Ok(Some(current.generation))
}

pub fn load_meta(gen_dir: &Path) -> Result<MetaFile> {
    let path = meta_path(gen_dir);
    let text = fs::read_to_string(&path).map_err(|e| Error::corrupt(&path, e))?;
    let meta: MetaFile = serde_json::from_str(&text).map_err(|e| Error::corrupt(&path, e))?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::corrupt(&path, format!("unsupported format version {}", meta.version)));
    }
    Ok(meta)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::corrupt(path, e))
}

/// Removes a half-written generation unless it was published.
struct StagedGeneration<'a> {
    paths: &'a IndexPaths,
    generation: u64,
    published: bool,
}

impl Drop for StagedGeneration<'_> {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        tracing::warn!(generation = self.generation, "rolling back incomplete commit");
        let _ = fs::remove_dir_all(self.paths.staging(self.generation));
        let _ = fs::remove_dir_all(self.paths.generation(self.generation));
        let _ = fs::remove_file(self.paths.current_staging());
    }
}

/// Write `index` as generation `generation` and publish it. On any error the previous
/// generation stays current and partial files are removed.
pub fn save_generation(paths: &IndexPaths, index: &InvertedIndex, config: &IndexConfig, generation: u64) -> Result<MetaFile> {
    fs::create_dir_all(&paths.root).map_err(|e| Error::setup(&paths.root, e))?;
    let mut staged = StagedGeneration { paths, generation, published: false };

    let staging = paths.staging(generation);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    // postings.bin is the concatenation of each term's encoded list
    let mut postings_bytes: Vec<u8> = Vec::new();
    let mut dictionary: Vec<TermEntry> = Vec::with_capacity(index.terms.len());
    for (term, list) in index.terms.iter().zip(&index.postings) {
        let encoded = bincode::serialize(list)?;
        dictionary.push(TermEntry {
            term: term.clone(),
            df: list.len() as u32,
            offset: postings_bytes.len() as u64,
            len: encoded.len() as u64,
        });
        postings_bytes.extend_from_slice(&encoded);
    }
    write_checked(&postings_path(&staging), &postings_bytes)?;
    write_checked(&dictionary_path(&staging), &bincode::serialize(&dictionary)?)?;
    write_checked(&docs_path(&staging), &bincode::serialize(&index.docs)?)?;

    let meta = MetaFile {
        version: FORMAT_VERSION,
        generation,
        num_docs: index.docs.len() as u32,
        num_terms: index.terms.len() as u32,
        total_tokens: index.total_tokens,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        config: config.clone(),
    };
    let json = serde_json::to_string_pretty(&meta).map_err(|e| Error::setup(&staging, e))?;
    let mut f = File::create(meta_path(&staging))?;
    f.write_all(json.as_bytes())?;
    f.sync_all()?;

    // leftovers of a crashed commit can never be current
    let target = paths.generation(generation);
    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    fs::rename(&staging, &target)?;

    let current = serde_json::to_string(&CurrentFile { generation }).map_err(|e| Error::setup(&paths.root, e))?;
    let mut f = OpenOptions::new().write(true).create(true).truncate(true).open(paths.current_staging())?;
    f.write_all(current.as_bytes())?;
    f.sync_all()?;
    fs::rename(paths.current_staging(), paths.current())?;
    staged.published = true;

    remove_stale_generations(paths, generation);
    Ok(meta)
}

/// Best-effort removal of superseded generations. The one that was live before `live` is
/// kept until the next commit, so a reader that resolved `CURRENT` just before the swap can
/// still finish opening it.
fn remove_stale_generations(paths: &IndexPaths, live: u64) {
    let Ok(entries) = fs::read_dir(&paths.root) else { return };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(suffix) = name.strip_prefix("gen-") else { continue };
        // unparsable suffixes are staging leftovers such as `gen-N.tmp`
        let retained = suffix.parse::<u64>().map_or(false, |g| g == live || g + 1 == live);
        if retained {
            continue;
        }
        if let Err(e) = fs::remove_dir_all(entry.path()) {
            tracing::warn!(dir = name, error = %e, "could not remove stale generation");
        }
    }
}

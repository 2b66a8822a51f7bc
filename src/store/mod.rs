//! Flat-file result store.
//!
//! Layout under a store root:
//!
//! ```text
//! results/
//!   {query}/
//!     {provider}/
//!       {query}.query.json        query descriptor, written once
//!       003__2017-Title-Author.json
//!     {db-name}/
//!       2017-Title-Author.json
//!       _index.json               id -> title
//! ```
//!
//! Records are pretty-printed JSON documents without the derived id. Each file is written
//! to a temporary sibling and renamed into place, so a failed write never leaves a
//! truncated record behind.

mod library;
pub mod text;

pub use library::Library;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Publication, ResultPage};

/// Name of the per-directory index file
pub const INDEX_FILE: &str = "_index.json";

/// Extension of record and descriptor files
const EXTENSION: &str = "json";

/// Suffix of query descriptor files
const DESCRIPTOR_SUFFIX: &str = ".query.json";

/// Errors raised by store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("No records found under {0}")]
    Empty(PathBuf),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of a save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Records written
    pub saved: usize,
    /// Records rejected by the validity gate
    pub skipped: usize,
    /// Valid records whose write failed
    pub errored: usize,
    /// The input had no records; nothing was touched
    pub nothing_to_save: bool,
}

impl SaveReport {
    fn nothing() -> Self {
        Self {
            nothing_to_save: true,
            ..Self::default()
        }
    }
}

impl std::fmt::Display for SaveReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nothing_to_save {
            return write!(f, "nothing to save");
        }
        write!(
            f,
            "{} saved, {} skipped, {} errored",
            self.saved, self.skipped, self.errored
        )
    }
}

/// Outcome of a load
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Records parsed, in path order
    pub publications: Vec<Publication>,
    /// Files that could not be read or parsed
    pub failures: Vec<(PathBuf, String)>,
}

/// Options for saving a result page
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Prefix file names with the zero-padded internal index
    pub include_index: bool,
}

/// Directory-backed publication store
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Create a store rooted at `root`; nothing is created until a save
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a sub-selector (query name, `query/provider`, db name)
    pub fn dir(&self, subselector: &str) -> PathBuf {
        self.root.join(subselector)
    }

    /// Load every record under `root/subselector`, recursively.
    ///
    /// Index and query-descriptor files are skipped. A file that fails to parse is
    /// recorded in [`LoadReport::failures`] and does not fail the load.
    pub fn load(&self, subselector: &str) -> Result<LoadReport, StoreError> {
        let dir = self.dir(subselector);
        let mut files = Vec::new();
        collect_record_files(&dir, &mut files)?;
        files.sort();

        tracing::info!("Analysing {} ({} record files)", dir.display(), files.len());

        let mut report = LoadReport::default();
        for file in files {
            match read_record(&file) {
                Ok(publication) => report.publications.push(publication),
                Err(e) => {
                    tracing::warn!(file = %file.display(), "Skipping unreadable record: {}", e);
                    report.failures.push((file, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Point lookup of `root/subselector/{slug}.json`; absence is `Ok(None)`
    pub fn load_by_name(
        &self,
        subselector: &str,
        slug: &str,
    ) -> Result<Option<Publication>, StoreError> {
        let path = record_path(&self.dir(subselector), slug);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "Record not found");
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    /// Persist every record plus an id -> title index under `root/subselector`.
    ///
    /// Records are normalized and written without the validity gate. A failed record
    /// write is counted; failing to create the directory or write the index is an error.
    pub fn save(
        &self,
        publications: &[Publication],
        subselector: &str,
    ) -> Result<SaveReport, StoreError> {
        let dir = self.dir(subselector);
        create_dir(&dir)?;

        let mut report = SaveReport::default();
        let mut index = BTreeMap::new();
        for publication in publications {
            let normalized = normalized(publication);
            match write_record(&dir, &normalized, false) {
                Ok(_) => {
                    index.insert(normalized.id(), normalized.title.clone());
                    report.saved += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %publication.id(), "Failed to save record: {}", e);
                    report.errored += 1;
                }
            }
        }

        write_json(&dir.join(INDEX_FILE), &index)?;
        tracing::info!("Saved {} records to {} ({})", report.saved, dir.display(), report);
        Ok(report)
    }

    /// Persist a page's valid records under `root/subselector`
    pub fn save_page(
        &self,
        page: &ResultPage,
        subselector: &str,
        options: SaveOptions,
    ) -> Result<SaveReport, StoreError> {
        save_page(page, &self.dir(subselector), options)
    }
}

/// Persist a page's records into `dir`.
///
/// An empty page touches nothing and reports `nothing_to_save`. Otherwise the directory
/// and the query descriptor (once) are created, then every record passing the validity
/// gate is normalized and written. Invalid records are skipped and failed writes are
/// counted; neither aborts the save.
pub fn save_page(
    page: &ResultPage,
    dir: &Path,
    options: SaveOptions,
) -> Result<SaveReport, StoreError> {
    let provider = page.query.provider();
    if page.is_empty() {
        tracing::info!(provider, "No items to save");
        return Ok(SaveReport::nothing());
    }

    tracing::info!(provider, "Files to be saved = {}", page.num_items());
    create_dir(dir)?;
    write_descriptor(page, dir)?;

    let mut report = SaveReport::default();
    for item in &page.items {
        if let Err(reason) = item.check_validity() {
            tracing::warn!(
                provider,
                id = %item.id(),
                "Skipping publication '{}': invalid {}",
                item.title,
                reason
            );
            report.skipped += 1;
            continue;
        }

        match write_record(dir, &normalized(item), options.include_index) {
            Ok(_) => report.saved += 1,
            Err(e) => {
                tracing::warn!(provider, id = %item.id(), "Failed to save record: {}", e);
                report.errored += 1;
            }
        }
    }

    tracing::info!(provider, "Finished: {} in {}", report, dir.display());
    Ok(report)
}

/// Copy of `publication` with title and abstract text-normalized
fn normalized(publication: &Publication) -> Publication {
    Publication {
        title: text::clean_text(&publication.title),
        r#abstract: text::clean_text(&publication.r#abstract),
        ..publication.clone()
    }
}

fn write_descriptor(page: &ResultPage, dir: &Path) -> Result<(), StoreError> {
    let path = dir.join(page.query.descriptor_file_name());
    if path.exists() {
        return Ok(());
    }
    write_json(&path, &page.query)
}

/// Write a record and return its path.
///
/// A record whose file name is already held by a record with another id is written
/// under `{stem}__{id}` instead, so neither overwrites the other.
fn write_record(
    dir: &Path,
    publication: &Publication,
    include_index: bool,
) -> Result<PathBuf, StoreError> {
    let stem = text::file_stem(publication, include_index);
    let mut path = record_path(dir, &stem);
    if held_by_other(&path, publication) {
        let fallback = record_path(
            dir,
            &format!("{}__{}", stem, text::slug_part(&publication.id())),
        );
        tracing::warn!(
            id = %publication.id(),
            "{} belongs to another record, saving as {}",
            path.display(),
            fallback.display()
        );
        path = fallback;
    }
    write_json(&path, publication)?;
    Ok(path)
}

fn record_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.{}", stem, EXTENSION))
}

/// `path` holds a readable record with an id other than `publication`'s
fn held_by_other(path: &Path, publication: &Publication) -> bool {
    path.is_file()
        && read_record(path).is_ok_and(|existing| existing.id() != publication.id())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

fn read_record(path: &Path) -> Result<Publication, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn create_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))
}

fn is_record_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".json") && name != INDEX_FILE && !name.ends_with(DESCRIPTOR_SUFFIX)
}

fn collect_record_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.is_dir() {
            collect_record_files(&path, files)?;
        } else if is_record_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

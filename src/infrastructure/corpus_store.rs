//! File-based review corpus
//!
//! One set of files per category inside the corpus directory:
//!
//! - `<category>_reviews.txt` canonical products, one JSON record per line
//!   (a legacy `<category>.txt` is read when the canonical file is absent)
//! - `<category>_backup.txt` snapshot taken before the first mutation of a run
//! - `<category>_actualized.txt` append-only audit log of each run's delta
//! - `<category>_log.txt` per-product review-count control log
//! - `<category>_urls.txt` optional seed list, one product URL per line
//!
//! A [`CategoryStore`] owns every handle for one category run and releases
//! them when dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use crate::domain::product::{Product, ReviewPlacement};
use crate::domain::review::Review;

const CANONICAL_SUFFIX: &str = "_reviews.txt";
const BACKUP_SUFFIX: &str = "_backup.txt";
const ACTUALIZED_SUFFIX: &str = "_actualized.txt";
const CONTROL_LOG_SUFFIX: &str = "_log.txt";
const SEED_SUFFIX: &str = "_urls.txt";
const LEGACY_SUFFIX: &str = ".txt";
const CATEGORY_TABLE: &str = "categories.txt";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record at {}:{line}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize product '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Backup must be taken before the first mutation of a run")]
    BackupMissing,

    #[error("Backup was already taken for this run")]
    BackupAlreadyTaken,
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// File naming inside the corpus directory
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    dir: PathBuf,
}

impl CorpusLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn canonical(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}{CANONICAL_SUFFIX}"))
    }

    pub fn legacy(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}{LEGACY_SUFFIX}"))
    }

    pub fn backup(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}{BACKUP_SUFFIX}"))
    }

    pub fn actualized(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}{ACTUALIZED_SUFFIX}"))
    }

    pub fn control_log(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}{CONTROL_LOG_SUFFIX}"))
    }

    pub fn seeds(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}{SEED_SUFFIX}"))
    }

    pub fn category_table(&self) -> PathBuf {
        self.dir.join(CATEGORY_TABLE)
    }

    /// Categories that have a seed file, a canonical store or a legacy store, sorted
    pub async fn known_categories(&self) -> StoreResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let mut categories = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(category) = category_of(&file_name) {
                if !categories.iter().any(|c: &String| c == category) {
                    categories.push(category.to_string());
                }
            }
        }
        categories.sort();
        Ok(categories)
    }

    /// Product URLs listed in the category's seed file (empty when absent)
    pub async fn read_seed_urls(&self, category: &str) -> StoreResult<Vec<String>> {
        let path = self.seeds(category);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(significant_lines(&content)
                .map(ToString::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// `(category, url)` rows of the category table used by discovery mode
    pub async fn read_category_table(&self) -> StoreResult<Vec<(String, String)>> {
        let path = self.category_table();
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        let mut rows = Vec::new();
        for line in significant_lines(&content) {
            match line.split_once(char::is_whitespace) {
                Some((name, url)) if !url.trim().is_empty() => {
                    rows.push((name.to_string(), url.trim().to_string()));
                }
                _ => warn!("[Store] Ignoring malformed category row '{}'", line),
            }
        }
        Ok(rows)
    }
}

fn significant_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// One line of the control log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLogEntry {
    pub product: String,
    pub claimed: u64,
    pub reachable: u64,
    pub stored: u64,
    pub new: u64,
}

impl ControlLogEntry {
    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\n",
            self.product, self.claimed, self.reachable, self.stored, self.new
        )
    }
}

/// The canonical corpus of one category plus its run-scoped log handles
pub struct CategoryStore {
    category: String,
    canonical_path: PathBuf,
    source_path: Option<PathBuf>,
    backup_path: PathBuf,
    products: Vec<Product>,
    index: HashMap<String, usize>,
    backup_taken: bool,
    dirty: bool,
    actualized: File,
    actualized_path: PathBuf,
    control_log: File,
    control_log_path: PathBuf,
}

impl CategoryStore {
    /// Load the category's canonical records and open its log files
    pub async fn open(layout: &CorpusLayout, category: &str) -> StoreResult<Self> {
        fs::create_dir_all(layout.dir())
            .await
            .map_err(|e| StoreError::io(layout.dir(), e))?;

        let canonical_path = layout.canonical(category);
        let legacy_path = layout.legacy(category);
        let source_path = if fs::try_exists(&canonical_path).await.unwrap_or(false) {
            Some(canonical_path.clone())
        } else if fs::try_exists(&legacy_path).await.unwrap_or(false) {
            info!(
                "[Store] Reading legacy corpus {} for category '{}'",
                legacy_path.display(),
                category
            );
            Some(legacy_path)
        } else {
            None
        };

        let mut products: Vec<Product> = Vec::new();
        let mut index = HashMap::new();
        if let Some(path) = &source_path {
            for product in read_records(path).await? {
                match index.get(&product.name) {
                    Some(&i) => {
                        warn!("[Store] Duplicate record for '{}' collapsed on load", product.name);
                        let existing: &mut Product = &mut products[i];
                        existing.merge_reviews(product.reviews, ReviewPlacement::ByDate);
                    }
                    None => {
                        index.insert(product.name.clone(), products.len());
                        products.push(product);
                    }
                }
            }
        }

        let actualized_path = layout.actualized(category);
        let control_log_path = layout.control_log(category);
        let actualized = open_append(&actualized_path).await?;
        let control_log = open_append(&control_log_path).await?;

        debug!(
            "[Store] Opened category '{}' with {} products",
            category,
            products.len()
        );

        Ok(Self {
            category: category.to_string(),
            canonical_path,
            source_path,
            backup_path: layout.backup(category),
            products,
            index,
            backup_taken: false,
            dirty: false,
            actualized,
            actualized_path,
            control_log,
            control_log_path,
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn get(&self, product_name: &str) -> Option<&Product> {
        self.index.get(product_name).map(|&i| &self.products[i])
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Snapshot the canonical file before any mutation of this run
    pub async fn backup(&mut self) -> StoreResult<()> {
        if self.backup_taken {
            return Err(StoreError::BackupAlreadyTaken);
        }

        match &self.source_path {
            Some(source) => {
                fs::copy(source, &self.backup_path)
                    .await
                    .map_err(|e| StoreError::io(&self.backup_path, e))?;
            }
            None => {
                fs::write(&self.backup_path, b"")
                    .await
                    .map_err(|e| StoreError::io(&self.backup_path, e))?;
            }
        }

        self.backup_taken = true;
        info!(
            "[Store] Backed up category '{}' to {}",
            self.category,
            self.backup_path.display()
        );
        Ok(())
    }

    /// Merge a product's fresh reviews in front of the stored ones.
    ///
    /// Returns how many reviews were actually added.
    pub fn upsert(&mut self, product: Product) -> StoreResult<usize> {
        self.merge(product, ReviewPlacement::Prepend).map(|added| added.len())
    }

    /// Merge a product into its record, creating it if absent, and return the
    /// reviews that were not stored before.
    pub fn merge(&mut self, product: Product, placement: ReviewPlacement) -> StoreResult<Vec<Review>> {
        if !self.backup_taken {
            return Err(StoreError::BackupMissing);
        }

        let added = match self.index.get(&product.name) {
            Some(&i) => {
                let existing = &mut self.products[i];
                if existing.url.is_empty() && !product.url.is_empty() {
                    existing.url = product.url;
                    self.dirty = true;
                }
                if existing.category.is_empty() && !product.category.is_empty() {
                    existing.category = product.category;
                    self.dirty = true;
                }
                let added = existing.merge_reviews(product.reviews, placement);
                self.dirty |= !added.is_empty();
                added
            }
            None => {
                let mut created = Product::new(product.name.clone(), product.category, product.url);
                let added = created.merge_reviews(product.reviews, placement);
                self.index.insert(product.name, self.products.len());
                self.products.push(created);
                self.dirty = true;
                added
            }
        };

        Ok(added)
    }

    /// Append the run's delta for one product to the audit log
    pub async fn append_actualized_log(&mut self, delta: &Product) -> StoreResult<()> {
        let mut line = serde_json::to_string(delta).map_err(|source| StoreError::Serialize {
            name: delta.name.clone(),
            source,
        })?;
        line.push('\n');
        append_line(&mut self.actualized, &self.actualized_path, &line).await
    }

    pub async fn append_control_log(&mut self, entry: &ControlLogEntry) -> StoreResult<()> {
        append_line(&mut self.control_log, &self.control_log_path, &entry.to_line()).await
    }

    /// Rewrite the canonical file if anything changed.
    ///
    /// Records are streamed to a temporary file which then replaces the
    /// canonical one, so a failed write leaves the previous file intact.
    pub async fn commit(&mut self) -> StoreResult<()> {
        if !self.dirty {
            debug!("[Store] Category '{}' unchanged, nothing to write", self.category);
            return Ok(());
        }

        let tmp_path = self.canonical_path.with_extension("txt.tmp");
        let file = File::create(&tmp_path)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);

        for product in &self.products {
            let mut line = serde_json::to_string(product).map_err(|source| StoreError::Serialize {
                name: product.name.clone(),
                source,
            })?;
            line.push('\n');
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| StoreError::io(&tmp_path, e))?;
        }
        writer.flush().await.map_err(|e| StoreError::io(&tmp_path, e))?;
        writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(writer);

        fs::rename(&tmp_path, &self.canonical_path)
            .await
            .map_err(|e| StoreError::io(&self.canonical_path, e))?;

        self.dirty = false;
        self.source_path = Some(self.canonical_path.clone());
        info!(
            "[Store] Wrote {} products to {}",
            self.products.len(),
            self.canonical_path.display()
        );
        Ok(())
    }
}

/// Category a corpus file belongs to, if it is a seed list or a store
fn category_of(file_name: &str) -> Option<&str> {
    if file_name == CATEGORY_TABLE
        || [BACKUP_SUFFIX, ACTUALIZED_SUFFIX, CONTROL_LOG_SUFFIX]
            .iter()
            .any(|suffix| file_name.ends_with(suffix))
    {
        return None;
    }
    file_name
        .strip_suffix(SEED_SUFFIX)
        .or_else(|| file_name.strip_suffix(CANONICAL_SUFFIX))
        .or_else(|| file_name.strip_suffix(LEGACY_SUFFIX))
        .filter(|c| !c.is_empty())
}

async fn read_records(path: &Path) -> StoreResult<Vec<Product>> {
    let file = File::open(path).await.map_err(|e| StoreError::io(path, e))?;
    let mut lines = BufReader::new(file).lines();
    let mut records = Vec::new();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.map_err(|e| StoreError::io(path, e))? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let product = serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: line_no,
            source,
        })?;
        records.push(product);
    }
    Ok(records)
}

async fn open_append(path: &Path) -> StoreResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

async fn append_line(file: &mut File, path: &Path, line: &str) -> StoreResult<()> {
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| StoreError::io(path, e))?;
    file.flush().await.map_err(|e| StoreError::io(path, e))
}

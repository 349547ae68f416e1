//! Audit trail storage backends.

use crate::error::TrailError;
use crate::row::AuditTrailRow;
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use trail_core::config::{StorageBackend, StorageConfig};
use trail_core::{Action, EntryId};

/// Trait for trail storage backends.
///
/// The writer only ever calls `insert` and `insert_batch`; the query side
/// exists for tools that browse the trail.
#[async_trait]
pub trait TrailStorage: Send + Sync {
    /// Store a single row.
    async fn insert(&self, row: AuditTrailRow) -> Result<(), TrailError>;

    /// Store rows as one atomic batch: either all of them are written or none.
    async fn insert_batch(&self, rows: Vec<AuditTrailRow>) -> Result<(), TrailError>;

    /// Query rows in insertion order.
    async fn query(&self, filter: TrailFilter) -> Result<Vec<AuditTrailRow>, TrailError>;

    /// Count rows matching a filter (ignores limit/offset).
    async fn count(&self, filter: TrailFilter) -> Result<usize, TrailError>;
}

/// Filter for querying trail rows.
#[derive(Debug, Clone, Default)]
pub struct TrailFilter {
    /// Filter by audit entry.
    pub entry_id: Option<EntryId>,
    /// Filter by user ID.
    pub user_id: Option<String>,
    /// Filter by record type name.
    pub model: Option<String>,
    /// Filter by normalized primary key.
    pub model_id: Option<String>,
    /// Filter by action.
    pub action: Option<Action>,
    /// Filter by field name.
    pub field: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl TrailFilter {
    /// History of one record.
    pub fn for_record(model: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            model_id: Some(model_id.into()),
            ..Default::default()
        }
    }

    /// Everything written under one entry.
    pub fn for_entry(entry_id: EntryId) -> Self {
        Self {
            entry_id: Some(entry_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, row: &AuditTrailRow) -> bool {
        if let Some(ref entry) = self.entry_id {
            if &row.entry_id != entry {
                return false;
            }
        }
        if let Some(ref user) = self.user_id {
            if row.user_id.as_ref() != Some(user) {
                return false;
            }
        }
        if let Some(ref model) = self.model {
            if &row.model != model {
                return false;
            }
        }
        if let Some(ref model_id) = self.model_id {
            if &row.model_id != model_id {
                return false;
            }
        }
        if let Some(action) = self.action {
            if row.action != action {
                return false;
            }
        }
        if let Some(ref field) = self.field {
            if &row.field != field {
                return false;
            }
        }
        true
    }

    /// Apply offset and limit to already-filtered rows.
    pub fn paginate(&self, rows: Vec<AuditTrailRow>) -> Vec<AuditTrailRow> {
        rows.into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Create a storage backend based on configuration.
///
/// The Postgres backend lives in `trail-adapter-pg` and must be constructed
/// there.
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn TrailStorage>, TrailError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageBackend::File => Ok(Arc::new(FileStorage::new(config.file_path())?)),
        StorageBackend::Null => Ok(Arc::new(NullStorage)),
        StorageBackend::Postgres => Err(TrailError::Initialization(
            "postgres storage is provided by trail-adapter-pg".to_string(),
        )),
    }
}

/// In-process storage, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rows: RwLock<Vec<AuditTrailRow>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored row.
    pub fn rows(&self) -> Vec<AuditTrailRow> {
        self.rows.read().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered(&self, filter: &TrailFilter) -> Result<Vec<AuditTrailRow>, TrailError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| TrailError::Query(format!("Failed to acquire read lock: {}", e)))?;
        Ok(rows.iter().filter(|r| filter.matches(r)).cloned().collect())
    }
}

#[async_trait]
impl TrailStorage for MemoryStorage {
    async fn insert(&self, row: AuditTrailRow) -> Result<(), TrailError> {
        self.insert_batch(vec![row]).await
    }

    async fn insert_batch(&self, rows: Vec<AuditTrailRow>) -> Result<(), TrailError> {
        let mut stored = self.rows.write().map_err(|e| {
            TrailError::Persistence(format!("Failed to acquire write lock: {}", e))
        })?;
        stored.extend(rows);
        Ok(())
    }

    async fn query(&self, filter: TrailFilter) -> Result<Vec<AuditTrailRow>, TrailError> {
        let rows = self.filtered(&filter)?;
        Ok(filter.paginate(rows))
    }

    async fn count(&self, filter: TrailFilter) -> Result<usize, TrailError> {
        Ok(self.filtered(&filter)?.len())
    }
}

/// File storage: one JSON object per line, appended.
pub struct FileStorage {
    path: PathBuf,
    // Serializes appends from concurrent writers within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create a file storage, creating the parent directory if needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, TrailError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row from the file, skipping lines that fail to parse.
    fn load(&self) -> Result<Vec<AuditTrailRow>, TrailError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut rows = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<AuditTrailRow>(line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse trail row on line {} of {}: {}",
                        line_num + 1,
                        self.path.display(),
                        e
                    );
                }
            }
        }

        Ok(rows)
    }

    fn filtered(&self, filter: &TrailFilter) -> Result<Vec<AuditTrailRow>, TrailError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }
}

#[async_trait]
impl TrailStorage for FileStorage {
    async fn insert(&self, row: AuditTrailRow) -> Result<(), TrailError> {
        self.insert_batch(vec![row]).await
    }

    async fn insert_batch(&self, rows: Vec<AuditTrailRow>) -> Result<(), TrailError> {
        if rows.is_empty() {
            return Ok(());
        }

        // Serialize everything before touching the file so a bad row writes nothing.
        let mut buffer = String::new();
        for row in &rows {
            buffer.push_str(&serde_json::to_string(row)?);
            buffer.push('\n');
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| TrailError::Persistence(format!("Failed to acquire file lock: {}", e)))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TrailError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(buffer.as_bytes())
            .map_err(|e| TrailError::Persistence(format!("{}: {}", self.path.display(), e)))?;

        Ok(())
    }

    async fn query(&self, filter: TrailFilter) -> Result<Vec<AuditTrailRow>, TrailError> {
        let rows = self.filtered(&filter)?;
        Ok(filter.paginate(rows))
    }

    async fn count(&self, filter: TrailFilter) -> Result<usize, TrailError> {
        Ok(self.filtered(&filter)?.len())
    }
}

/// Storage that discards every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStorage;

#[async_trait]
impl TrailStorage for NullStorage {
    async fn insert(&self, _row: AuditTrailRow) -> Result<(), TrailError> {
        Ok(())
    }

    async fn insert_batch(&self, _rows: Vec<AuditTrailRow>) -> Result<(), TrailError> {
        Ok(())
    }

    async fn query(&self, _filter: TrailFilter) -> Result<Vec<AuditTrailRow>, TrailError> {
        Ok(vec![])
    }

    async fn count(&self, _filter: TrailFilter) -> Result<usize, TrailError> {
        Ok(0)
    }
}

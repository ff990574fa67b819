//! Sharded JSON record database.
//!
//! Records live in `records-<SHARD>.json` files inside the store directory,
//! where the shard is the upper-cased first two characters of the case
//! identifier. `records-shards.json` lists the shards that exist. Shards are
//! loaded on first use and rewritten atomically through a temp file in the
//! same directory.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::RecordStore;
use crate::error::StoreError;
use crate::models::record::ParsedRecord;

const SHARD_INDEX: &str = "records-shards.json";

#[derive(Debug, Default)]
struct Shard {
    records: BTreeMap<String, Value>,
    dirty: bool,
}

/// Keyed JSON store with delayed writes inside a batch.
#[derive(Debug)]
pub struct JsonRecordStore {
    dir: PathBuf,
    shards: BTreeMap<String, Shard>,
    known: BTreeSet<String>,
    index_dirty: bool,
    in_batch: bool,
}

impl JsonRecordStore {
    /// Open (and create if needed) a store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let known = read_index(&dir)?;
        debug!("Opened store {} with {} shards", dir.display(), known.len());

        Ok(Self {
            dir,
            shards: BTreeMap::new(),
            known,
            index_dirty: false,
            in_batch: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The stored record for a case, if any.
    pub fn get(&mut self, case_id: &str) -> Result<Option<&Value>, StoreError> {
        let key = shard_key(case_id);
        if !self.known.contains(&key) {
            return Ok(None);
        }
        let shard = self.load_shard(&key)?;
        Ok(shard.records.get(case_id))
    }

    /// Every stored record, in shard then case order.
    pub fn records(&mut self) -> Result<Vec<&Value>, StoreError> {
        let keys: Vec<String> = self.known.iter().cloned().collect();
        for key in &keys {
            self.load_shard(key)?;
        }
        Ok(self
            .shards
            .values()
            .flat_map(|shard| shard.records.values())
            .collect())
    }

    pub fn len(&mut self) -> Result<usize, StoreError> {
        Ok(self.records()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Write every dirty shard and the shard index.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let mut written = 0;
        for (key, shard) in self.shards.iter_mut().filter(|(_, s)| s.dirty) {
            let records: Vec<&Value> = shard.records.values().collect();
            let content = serde_json::to_vec_pretty(&records)?;
            write_atomic(&self.dir, &shard_path(&self.dir, key), &content)?;
            shard.dirty = false;
            written += 1;
        }

        if self.index_dirty {
            let content = serde_json::to_vec_pretty(&self.known)?;
            write_atomic(&self.dir, &self.dir.join(SHARD_INDEX), &content)?;
            self.index_dirty = false;
        }

        if written > 0 {
            debug!("Flushed {} shards to {}", written, self.dir.display());
        }
        Ok(())
    }

    fn load_shard(&mut self, key: &str) -> Result<&mut Shard, StoreError> {
        if !self.shards.contains_key(key) {
            let path = shard_path(&self.dir, key);
            let mut shard = Shard::default();
            if path.exists() {
                let content = read_file(&path)?;
                let records: Vec<Value> = serde_json::from_str(&content)?;
                for record in records {
                    let case_id = record
                        .get("case_id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| StoreError::MissingKey(path.clone()))?;
                    shard.records.insert(case_id, record);
                }
                debug!("Loaded {} records from {}", shard.records.len(), path.display());
            }
            self.shards.insert(key.to_string(), shard);
        }
        self.shards
            .get_mut(key)
            .ok_or_else(|| StoreError::MissingKey(shard_path(&self.dir, key)))
    }
}

impl RecordStore for JsonRecordStore {
    fn upsert(&mut self, record: &ParsedRecord) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        let key = shard_key(&record.case_id);
        if self.known.insert(key.clone()) {
            self.index_dirty = true;
        }

        let shard = self.load_shard(&key)?;
        shard.records.insert(record.case_id.clone(), value);
        shard.dirty = true;

        if !self.in_batch {
            self.flush()?;
        }
        Ok(())
    }

    fn begin_batch(&mut self) -> Result<(), StoreError> {
        if self.in_batch {
            warn!("Batch already open on {}", self.dir.display());
        }
        self.in_batch = true;
        Ok(())
    }

    fn end_batch(&mut self) -> Result<(), StoreError> {
        self.in_batch = false;
        self.flush()
    }

    /// Forget unflushed shards; they reload from disk on next use.
    fn abort_batch(&mut self) -> Result<(), StoreError> {
        self.in_batch = false;
        let before = self.shards.len();
        self.shards.retain(|_, shard| !shard.dirty);
        if before > self.shards.len() {
            warn!(
                "Discarded {} unflushed shards in {}",
                before - self.shards.len(),
                self.dir.display()
            );
        }
        if self.index_dirty {
            self.known = read_index(&self.dir)?;
            self.index_dirty = false;
        }
        Ok(())
    }
}

impl Drop for JsonRecordStore {
    fn drop(&mut self) {
        let pending = self.index_dirty || self.shards.values().any(|s| s.dirty);
        if pending {
            info!("Flushing pending records to {}", self.dir.display());
            if let Err(e) = self.flush() {
                warn!("Failed to flush store on close: {}", e);
            }
        }
    }
}

fn shard_key(case_id: &str) -> String {
    let key: String = case_id.chars().take(2).collect::<String>().to_uppercase();
    if key.is_empty() {
        "_".to_string()
    } else {
        key
    }
}

fn shard_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("records-{key}.json"))
}

fn read_index(dir: &Path) -> Result<BTreeSet<String>, StoreError> {
    let path = dir.join(SHARD_INDEX);
    if !path.exists() {
        return Ok(BTreeSet::new());
    }
    let content = read_file(&path)?;
    Ok(serde_json::from_str(&content)?)
}

fn read_file(path: &Path) -> Result<String, StoreError> {
    std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(content).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

//! Collection registry: which source files went into which collection.
//!
//! The registry is a single JSON document mapping collection name to the
//! ordered list of ingested file names. It is loaded once and rewritten after
//! every mutation. A registry entry exists only for collections the store
//! accepted, and a delete is recorded only after the store confirmed it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{RagError, Result};
use crate::indexer::passages_from_table;
use crate::tabular::read_and_concatenate;
use crate::vectorstore::HybridStore;

type Entries = IndexMap<String, Vec<String>>;

/// Differences between the registry and the store's actual collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Registered but absent from the store.
    pub missing_in_store: Vec<String>,
    /// Present in the store but never registered.
    pub untracked_in_store: Vec<String>,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.missing_in_store.is_empty() && self.untracked_in_store.is_empty()
    }
}

/// Owns collection lifecycle and provenance.
///
/// All mutations hold one async lock for their whole load-mutate-persist
/// sequence, store calls included, so there is a single writer.
pub struct CollectionRegistry {
    path: PathBuf,
    store: Arc<dyn HybridStore>,
    state: Mutex<Entries>,
    default_batch_size: usize,
}

impl CollectionRegistry {
    /// Load the registry document at `path`; a missing file is an empty registry.
    pub async fn load(
        path: impl Into<PathBuf>,
        store: Arc<dyn HybridStore>,
        default_batch_size: usize,
    ) -> Result<Self> {
        let path = path.into();
        if default_batch_size == 0 {
            return Err(RagError::ConfigError("ingestion batch size must be greater than zero".into()));
        }
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Entries::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                RagError::ConfigError(format!("registry '{}' is not valid JSON: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(RagError::io(&path, e)),
        };
        debug!(path = %path.display(), collections = entries.len(), "loaded collection registry");
        Ok(Self { path, store, state: Mutex::new(entries), default_batch_size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &Entries) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| RagError::ConfigError(format!("failed to encode registry: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(|e| RagError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "failed to persist registry");
            RagError::io(&self.path, e)
        })
    }

    /// Create the store collection, then register it with no files.
    ///
    /// A store rejection (for example, the collection already exists) is
    /// returned unchanged and the registry is left untouched. If the registry
    /// cannot be written, the new store collection is deleted again before the
    /// write error is returned.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(RagError::InvalidInput("collection name must not be empty".into()));
        }
        let mut state = self.state.lock().await;
        self.store.create_collection(name).await?;

        let mut next = state.clone();
        if let Some(previous) = next.insert(name.to_string(), Vec::new()) {
            warn!(collection = name, files = previous.len(), "registry entry existed for a new store collection; reset");
        }
        if let Err(e) = self.persist(&next).await {
            if let Err(rollback) = self.store.delete_collection(name).await {
                error!(
                    collection = name,
                    error = %rollback,
                    "failed to drop store collection after registry write failed; run reconcile"
                );
            }
            return Err(e);
        }
        *state = next;
        info!(collection = name, "collection created");
        Ok(())
    }

    /// Ingest `input_files` into a registered collection.
    ///
    /// Files are read and concatenated (they must share the same columns),
    /// one passage per row is built from `text_field` plus `metadata_fields`,
    /// and the passages are written `chunk_size` at a time. The file names are
    /// then appended to the collection's entry. Returns the passage count.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnknownCollection`] without contacting the store if
    /// `name` is not registered.
    pub async fn add_data_to_collection<P: AsRef<Path>>(
        &self,
        name: &str,
        input_files: &[P],
        text_field: &str,
        metadata_fields: &[String],
        chunk_size: Option<usize>,
    ) -> Result<usize> {
        let mut state = self.state.lock().await;
        if !state.contains_key(name) {
            return Err(RagError::UnknownCollection(name.to_string()));
        }
        let batch_size = chunk_size.unwrap_or(self.default_batch_size);
        if batch_size == 0 {
            return Err(RagError::InvalidInput("chunk size must be greater than zero".into()));
        }

        let table = read_and_concatenate(input_files)?;
        let passages = passages_from_table(&table, text_field, metadata_fields)?;
        let written = self.store.add(name, &passages, batch_size).await?;

        let file_names: Vec<String> = input_files
            .iter()
            .map(|p| {
                let p = p.as_ref();
                p.file_name().map_or_else(|| p.display().to_string(), |n| n.to_string_lossy().into_owned())
            })
            .collect();
        let mut next = state.clone();
        if let Some(files) = next.get_mut(name) {
            files.extend(file_names);
        }
        // The passages are stored either way; keep memory in step with the store.
        let persisted = self.persist(&next).await;
        *state = next;
        persisted?;
        info!(collection = name, files = input_files.len(), passages = written, "data added to collection");
        Ok(written)
    }

    /// Delete the store collection, then forget it.
    ///
    /// Once the store confirmed the delete the entry is dropped from memory
    /// even if the registry cannot be written; the write error is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnknownCollection`] without contacting the store if
    /// `name` is not registered.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.contains_key(name) {
            return Err(RagError::UnknownCollection(name.to_string()));
        }
        self.store.delete_collection(name).await?;

        let mut next = state.clone();
        next.shift_remove(name);
        let persisted = self.persist(&next).await;
        *state = next;
        persisted?;
        info!(collection = name, "collection deleted");
        Ok(())
    }

    /// Registered collection names in creation order.
    pub async fn get_collections(&self) -> Vec<String> {
        self.state.lock().await.keys().cloned().collect()
    }

    /// Files ingested into `name`, in ingestion order.
    pub async fn get_collection_files(&self, name: &str) -> Result<Vec<String>> {
        self.state
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RagError::UnknownCollection(name.to_string()))
    }

    /// Compare the registry with the store's collection list. Nothing is changed.
    pub async fn reconcile(&self) -> Result<Reconciliation> {
        let state = self.state.lock().await;
        let in_store = self.store.list_collections().await?;
        let report = Reconciliation {
            missing_in_store: state.keys().filter(|name| !in_store.contains(name)).cloned().collect(),
            untracked_in_store: in_store.into_iter().filter(|name| !state.contains_key(name)).collect(),
        };
        if !report.is_consistent() {
            warn!(
                missing_in_store = ?report.missing_in_store,
                untracked_in_store = ?report.untracked_in_store,
                "registry and store have diverged"
            );
        }
        Ok(report)
    }
}

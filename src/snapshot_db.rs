use std::path::Path;

use bytemuck::{Pod, Zeroable};
use redb::{
    Database,
    ReadOnlyTable,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
    TableError,
};
use serde::Serialize;
use tracing::info;

use crate::{
    document_store::{DocId, DocumentRecord, DocumentStore},
    error::{Error, Result},
    keyword_index::KeywordIndex,
    snapshot::Snapshot,
    vector_index::VectorIndex,
};

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const DOCUMENTS: TableDefinition<u32, &[u8]> =
    TableDefinition::new("documents");
const VECTORS: TableDefinition<u32, &[u8]> = TableDefinition::new("vectors");
const VOCABULARY: TableDefinition<u32, &str> =
    TableDefinition::new("vocabulary");
const POSTINGS: TableDefinition<u32, &[u8]> = TableDefinition::new("postings");

const META_DIMENSION: &str = "dimension";
const META_DOCUMENTS: &str = "documents";
const META_BUILT_AT: &str = "built_at";

/// Counts describing a persisted snapshot, read without loading vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub documents: usize,
    pub dimension: usize,
    pub terms: usize,
    pub built_at: u64,
}

/// Persists a [`Snapshot`] in a single redb database.
///
/// Layout:
/// - `meta`: `dimension`, `documents` and `built_at` as decimal strings
/// - `documents`: id -> JSON-encoded [`DocumentRecord`]
/// - `vectors`: id -> native-endian f32 values
/// - `vocabulary`: position -> term
/// - `postings`: position -> native-endian u32 document ids
pub struct SnapshotDb {
    db: Database,
}

impl SnapshotDb {
    /// Open or create a snapshot database for writing.
    pub fn create(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(META)?;
        txn.open_table(DOCUMENTS)?;
        txn.open_table(VECTORS)?;
        txn.open_table(VOCABULARY)?;
        txn.open_table(POSTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Open an existing snapshot database. Never creates a file.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Snapshot(format!(
                "no snapshot at {}",
                path.display()
            )));
        }
        let db = Database::open(path)?;
        Ok(Self { db })
    }

    /// Replace the stored snapshot in one write transaction.
    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let dimension = snapshot.vectors().dimension().unwrap_or(0);

        let txn = self.db.begin_write()?;
        txn.delete_table(META)?;
        txn.delete_table(DOCUMENTS)?;
        txn.delete_table(VECTORS)?;
        txn.delete_table(VOCABULARY)?;
        txn.delete_table(POSTINGS)?;
        {
            let mut meta = txn.open_table(META)?;
            meta.insert(META_DIMENSION, dimension.to_string().as_str())?;
            meta.insert(META_DOCUMENTS, snapshot.len().to_string().as_str())?;
            meta.insert(
                META_BUILT_AT,
                snapshot.built_at().to_string().as_str(),
            )?;

            let mut documents = txn.open_table(DOCUMENTS)?;
            for record in snapshot.store().iter() {
                let bytes = serde_json::to_vec(record)?;
                documents.insert(record.id, bytes.as_slice())?;
            }

            let mut vectors = txn.open_table(VECTORS)?;
            for (id, row) in snapshot.vectors().iter() {
                let mut guard =
                    vectors.insert_reserve(id, std::mem::size_of_val(row))?;
                guard.as_mut().copy_from_slice(bytemuck::cast_slice(row));
            }

            let mut vocabulary = txn.open_table(VOCABULARY)?;
            let mut postings = txn.open_table(POSTINGS)?;
            for (position, (term, ids)) in
                snapshot.keywords().entries().enumerate()
            {
                let position = position as u32;
                vocabulary.insert(position, term)?;
                postings.insert(position, bytemuck::cast_slice::<u32, u8>(ids))?;
            }
        }
        txn.commit()?;

        info!(
            documents = snapshot.len(),
            dimension,
            terms = snapshot.keywords().len(),
            "saved snapshot"
        );
        Ok(())
    }

    /// Load and validate the stored snapshot.
    ///
    /// Every inconsistency between tables is reported as
    /// [`Error::Snapshot`]; nothing is repaired.
    pub fn read(&self) -> Result<Snapshot> {
        let txn = self.db.begin_read()?;
        let meta = open_table(&txn, META)?;
        let dimension = meta_usize(&meta, META_DIMENSION)?;
        let document_count = meta_usize(&meta, META_DOCUMENTS)?;
        let built_at = meta_value(&meta, META_BUILT_AT)?
            .parse::<u64>()
            .map_err(|e| Error::Snapshot(format!("invalid built_at: {e}")))?;

        let documents = open_table(&txn, DOCUMENTS)?;
        let stored = documents.len()? as usize;
        if stored != document_count {
            return Err(Error::Snapshot(format!(
                "expected {document_count} documents, found {stored}"
            )));
        }
        let mut records = Vec::with_capacity(stored);
        for entry in documents.iter()? {
            let (key, value) = entry?;
            let id = key.value();
            let record: DocumentRecord = serde_json::from_slice(value.value())
                .map_err(|e| Error::Snapshot(format!("document {id}: {e}")))?;
            if record.id != id {
                return Err(Error::Snapshot(format!(
                    "document stored under {id} carries id {}",
                    record.id
                )));
            }
            records.push(record);
        }
        let store = DocumentStore::from_records(records)?;

        let row_bytes =
            dimension.checked_mul(std::mem::size_of::<f32>()).ok_or_else(|| {
                Error::Snapshot(format!("dimension {dimension} is out of range"))
            })?;
        let vectors_table = open_table(&txn, VECTORS)?;
        let mut data: Vec<f32> = Vec::new();
        for (position, entry) in vectors_table.iter()?.enumerate() {
            let (key, value) = entry?;
            let id = key.value();
            if id as usize != position {
                return Err(Error::Snapshot(format!(
                    "vector ids are not contiguous: expected {position}, found {id}"
                )));
            }
            let bytes = value.value();
            if bytes.len() != row_bytes {
                return Err(Error::Snapshot(format!(
                    "vector {id} has {} bytes, expected dimension {dimension}",
                    bytes.len()
                )));
            }
            data.extend(decode::<f32>(bytes));
        }
        let vectors = VectorIndex::from_flat(dimension, data)?;
        if vectors.len() != document_count {
            return Err(Error::Snapshot(format!(
                "expected {document_count} vectors, found {}",
                vectors.len()
            )));
        }

        let vocabulary = open_table(&txn, VOCABULARY)?;
        let postings_table = open_table(&txn, POSTINGS)?;
        let mut terms = Vec::new();
        let mut postings: Vec<Vec<DocId>> = Vec::new();
        for (position, entry) in vocabulary.iter()?.enumerate() {
            let (key, value) = entry?;
            let position_key = key.value();
            if position_key as usize != position {
                return Err(Error::Snapshot(format!(
                    "vocabulary positions are not contiguous at {position_key}"
                )));
            }
            let term = value.value().to_string();
            let Some(ids) = postings_table.get(position_key)? else {
                return Err(Error::Snapshot(format!(
                    "missing postings for '{term}'"
                )));
            };
            let bytes = ids.value();
            if bytes.len() % std::mem::size_of::<u32>() != 0 {
                return Err(Error::Snapshot(format!(
                    "postings for '{term}' have a truncated id"
                )));
            }
            postings.push(decode::<u32>(bytes));
            terms.push(term);
        }
        if postings_table.len()? as usize != terms.len() {
            return Err(Error::Snapshot(format!(
                "{} vocabulary terms but {} posting lists",
                terms.len(),
                postings_table.len()?
            )));
        }
        let keywords = KeywordIndex::from_parts(terms, postings, document_count)?;

        let snapshot = Snapshot::new(store, vectors, keywords, built_at)?;
        info!(
            documents = snapshot.len(),
            dimension,
            terms = snapshot.keywords().len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    /// Read the stored counts without loading documents or vectors.
    pub fn summary(&self) -> Result<SnapshotSummary> {
        let txn = self.db.begin_read()?;
        let meta = open_table(&txn, META)?;
        let vocabulary = open_table(&txn, VOCABULARY)?;
        Ok(SnapshotSummary {
            documents: meta_usize(&meta, META_DOCUMENTS)?,
            dimension: meta_usize(&meta, META_DIMENSION)?,
            terms: vocabulary.len()? as usize,
            built_at: meta_value(&meta, META_BUILT_AT)?
                .parse()
                .map_err(|e| Error::Snapshot(format!("invalid built_at: {e}")))?,
        })
    }
}

impl std::fmt::Debug for SnapshotDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotDb").finish_non_exhaustive()
    }
}

/// Open a table for reading, treating a missing table as a malformed
/// snapshot.
fn open_table<K: redb::Key + 'static, V: redb::Value + 'static>(
    txn: &redb::ReadTransaction,
    definition: TableDefinition<K, V>,
) -> Result<ReadOnlyTable<K, V>> {
    match txn.open_table(definition) {
        Ok(table) => Ok(table),
        Err(TableError::TableDoesNotExist(name)) => {
            Err(Error::Snapshot(format!("missing table '{name}'")))
        }
        Err(e) => Err(e.into()),
    }
}

fn meta_value(
    table: &ReadOnlyTable<&'static str, &'static str>,
    key: &str,
) -> Result<String> {
    table
        .get(key)?
        .map(|v| v.value().to_string())
        .ok_or_else(|| Error::Snapshot(format!("missing meta key '{key}'")))
}

fn meta_usize(
    table: &ReadOnlyTable<&'static str, &'static str>,
    key: &str,
) -> Result<usize> {
    meta_value(table, key)?
        .parse()
        .map_err(|e| Error::Snapshot(format!("invalid {key}: {e}")))
}

/// Copy raw bytes into a typed buffer. redb values carry no alignment
/// guarantee, so the bytes are never reinterpreted in place.
fn decode<T: Pod>(bytes: &[u8]) -> Vec<T> {
    let len = bytes.len() / std::mem::size_of::<T>();
    let mut out = vec![<T as Zeroable>::zeroed(); len];
    bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(bytes);
    out
}

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense document identifier shared by every index in a snapshot.
pub type DocId = u32;

/// Payload returned verbatim to the caller. Never interpreted by ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaMetadata {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

/// An indexed question/answer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocId,
    /// Normalized text the embedding was produced from.
    pub text: String,
    pub metadata: QaMetadata,
}

/// Immutable records keyed by a contiguous, zero-based id.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    records: Vec<DocumentRecord>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from records that must carry ids `0..n` in order.
    pub fn from_records(records: Vec<DocumentRecord>) -> Result<Self> {
        for (position, record) in records.iter().enumerate() {
            if record.id as usize != position {
                return Err(Error::Snapshot(format!(
                    "document ids are not contiguous: expected {position}, found {}",
                    record.id
                )));
            }
        }
        Ok(Self { records })
    }

    /// Append a record and return the id assigned to it.
    pub fn insert(&mut self, text: String, metadata: QaMetadata) -> DocId {
        let id = self.records.len() as DocId;
        self.records.push(DocumentRecord { id, text, metadata });
        id
    }

    pub fn get(&self, id: DocId) -> Option<&DocumentRecord> {
        self.records.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.records.iter()
    }
}

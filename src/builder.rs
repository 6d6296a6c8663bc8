use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::{
    document_store::{DocId, DocumentStore, QaMetadata},
    error::{EmbedError, Error, Result},
    keyword_index::{DEFAULT_VOCABULARY, KeywordIndex},
    snapshot::Snapshot,
    text_util::normalize,
    vector_index::VectorIndex,
};

/// Maps normalized text to a fixed-dimension embedding.
///
/// Implementations must return vectors of the same length for every input.
/// Calls are blocking and are never retried.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError>;
}

/// Builds a complete [`Snapshot`] from a corpus in one pass.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    vocabulary: Vec<String>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_VOCABULARY)
    }
}

impl IndexBuilder {
    pub fn new<S: AsRef<str>>(vocabulary: &[S]) -> Self {
        Self {
            vocabulary: vocabulary
                .iter()
                .map(|t| t.as_ref().to_string())
                .collect(),
        }
    }

    /// Normalize, embed and index every `(text, metadata)` pair.
    ///
    /// Ids are assigned in corpus order. The first embedding fixes the
    /// dimension; any later vector of another length aborts the build, as
    /// does any embedder failure. Nothing is returned on failure.
    pub fn build(
        &self,
        corpus: &[(String, QaMetadata)],
        embedder: &dyn Embedder,
    ) -> Result<Snapshot> {
        let mut store = DocumentStore::new();
        let mut entries: Vec<(DocId, Vec<f32>)> =
            Vec::with_capacity(corpus.len());
        let mut dimension: Option<usize> = None;

        for (raw, metadata) in corpus {
            let text = normalize(raw);
            let vector = embedder.embed(&text)?;
            if vector.is_empty() {
                return Err(EmbedError::new(format!(
                    "embedder returned an empty vector for document {}",
                    store.len()
                ))
                .into());
            }
            match dimension {
                None => dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(Error::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
            }

            let id = store.insert(text, metadata.clone());
            entries.push((id, vector));
        }

        let vectors = VectorIndex::build(entries)?;
        let records: Vec<(DocId, String)> =
            store.iter().map(|r| (r.id, r.text.clone())).collect();
        let keywords =
            KeywordIndex::build(self.vocabulary.as_slice(), &records);

        info!(
            documents = store.len(),
            dimension = dimension.unwrap_or(0),
            terms = keywords.len(),
            "built snapshot"
        );

        Snapshot::new(store, vectors, keywords, unix_now())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

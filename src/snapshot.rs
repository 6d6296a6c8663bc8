use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    builder::Embedder,
    document_store::DocumentStore,
    error::{Error, Result},
    fusion::ScoringConfig,
    keyword_index::KeywordIndex,
    search::{self, Answer},
    vector_index::VectorIndex,
};

/// The document store and both indexes, built together and read-only
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    store: DocumentStore,
    vectors: VectorIndex,
    keywords: KeywordIndex,
    built_at: u64,
}

impl Snapshot {
    /// Assemble a snapshot, checking that the store and the vector index
    /// cover the same ids.
    pub fn new(
        store: DocumentStore,
        vectors: VectorIndex,
        keywords: KeywordIndex,
        built_at: u64,
    ) -> Result<Self> {
        if store.len() != vectors.len() {
            return Err(Error::Snapshot(format!(
                "{} documents but {} vectors",
                store.len(),
                vectors.len()
            )));
        }
        Ok(Self {
            store,
            vectors,
            keywords,
            built_at,
        })
    }

    /// A snapshot with no documents; every query against it is `NoMatch`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn vectors(&self) -> &VectorIndex {
        &self.vectors
    }

    pub fn keywords(&self) -> &KeywordIndex {
        &self.keywords
    }

    /// Build time in seconds since the Unix epoch.
    pub fn built_at(&self) -> u64 {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Shared query handle over the current snapshot.
///
/// Queries clone the current `Arc` and run without holding the lock, so a
/// concurrent [`Engine::replace`] never exposes a partially built index.
#[derive(Debug)]
pub struct Engine {
    current: RwLock<Arc<Snapshot>>,
    config: ScoringConfig,
}

impl Engine {
    pub fn new(snapshot: Snapshot, config: ScoringConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            config,
        }
    }

    /// The snapshot queries currently run against.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a rebuilt snapshot and return the previous one.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let mut current =
            self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(snapshot))
    }

    /// Answer `query` against the current snapshot.
    pub fn answer(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Answer> {
        let snapshot = self.snapshot();
        search::answer(&snapshot, embedder, query, top_k, threshold, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{
        builder::IndexBuilder,
        confidence::Tier,
        document_store::QaMetadata,
        error::EmbedError,
    };

    /// Every text embeds to the same point, so every document is an exact
    /// match for every query.
    struct ConstantEmbedder;

    impl Embedder for ConstantEmbedder {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
            Ok(vec![0.5, 0.5])
        }
    }

    fn build(n: usize) -> Snapshot {
        let corpus: Vec<(String, QaMetadata)> = (0..n)
            .map(|i| {
                (
                    format!("question {i}"),
                    QaMetadata {
                        question: format!("q{i}"),
                        answer: format!("a{i}"),
                        ..Default::default()
                    },
                )
            })
            .collect();
        IndexBuilder::default()
            .build(&corpus, &ConstantEmbedder)
            .unwrap()
    }

    #[test]
    fn new_rejects_mismatched_counts() {
        let built = build(2);
        let err = Snapshot::new(
            DocumentStore::new(),
            built.vectors().clone(),
            built.keywords().clone(),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Snapshot(_)));
    }

    #[test]
    fn empty_engine_answers_no_match() {
        let engine = Engine::new(Snapshot::empty(), ScoringConfig::default());
        let answer = engine.answer(&ConstantEmbedder, "anything", 3, 0.15).unwrap();
        assert_eq!(answer.tier, Tier::NoMatch);
        assert!(answer.candidates.is_empty());
    }

    #[test]
    fn replace_swaps_and_returns_previous() {
        let engine = Engine::new(build(1), ScoringConfig::default());
        let held = engine.snapshot();

        let previous = engine.replace(build(3));
        assert_eq!(previous.len(), 1);
        assert_eq!(held.len(), 1);
        assert_eq!(engine.snapshot().len(), 3);

        let answer = engine.answer(&ConstantEmbedder, "question", 5, 0.15).unwrap();
        assert_eq!(answer.candidates.len(), 3);
        assert_eq!(answer.tier, Tier::Direct);
    }

    #[test]
    fn queries_see_whole_snapshots_during_rebuilds() {
        let engine = Engine::new(build(2), ScoringConfig::default());

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let answer = engine
                            .answer(&ConstantEmbedder, "question", 10, 0.15)
                            .unwrap();
                        let n = answer.candidates.len();
                        assert!(n == 2 || n == 4, "saw {n} candidates");
                    }
                });
            }
            s.spawn(|| {
                for i in 0..20 {
                    engine.replace(build(if i % 2 == 0 { 4 } else { 2 }));
                }
            });
        });
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
        assert_send_sync::<Snapshot>();
    }
}

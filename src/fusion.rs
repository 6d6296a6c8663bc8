use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    confidence::DEFAULT_DIRECT_CUTOFF,
    document_store::DocId,
    error::Result,
    keyword_index::KeywordIndex,
    vector_index::{DEFAULT_DISTANCE_SCALE, VectorIndex, similarity},
};

pub const DEFAULT_KEYWORD_BONUS: f32 = 0.1;
pub const DEFAULT_RESCUE_FACTOR: f32 = 0.7;
pub const DEFAULT_POOL_FACTOR: usize = 2;

/// Tunable constants of the fusion and classification stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Added to a candidate once per vocabulary term shared with the query.
    pub keyword_bonus: f32,
    /// Top score above which the answer is direct rather than tentative.
    pub direct_cutoff: f32,
    /// Keyword-only candidates need a similarity above
    /// `rescue_factor * threshold`.
    pub rescue_factor: f32,
    /// Divisor in `exp(-distance / scale)`.
    pub distance_scale: f32,
    /// Keyword rescue stops once the pool holds `pool_factor * top_k`
    /// candidates.
    pub pool_factor: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            keyword_bonus: DEFAULT_KEYWORD_BONUS,
            direct_cutoff: DEFAULT_DIRECT_CUTOFF,
            rescue_factor: DEFAULT_RESCUE_FACTOR,
            distance_scale: DEFAULT_DISTANCE_SCALE,
            pool_factor: DEFAULT_POOL_FACTOR,
        }
    }
}

/// Which signal brought a candidate into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Returned by the nearest-neighbor search above the threshold.
    Vector,
    /// Added through a keyword match under the looser rescue floor.
    KeywordRescue,
}

/// A scored candidate for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: DocId,
    pub vector_similarity: f32,
    pub keyword_bonus: f32,
    pub combined_score: f32,
    pub origin: CandidateOrigin,
}

/// Fuses nearest-neighbor similarity with keyword bonuses.
pub struct FusionScorer<'a> {
    vectors: &'a VectorIndex,
    keywords: &'a KeywordIndex,
    config: ScoringConfig,
}

impl<'a> FusionScorer<'a> {
    pub fn new(
        vectors: &'a VectorIndex,
        keywords: &'a KeywordIndex,
        config: ScoringConfig,
    ) -> Self {
        Self {
            vectors,
            keywords,
            config,
        }
    }

    /// Rank documents for a query.
    ///
    /// 1. Nearest-neighbor search for `top_k` hits; hits with similarity
    ///    below `threshold` are dropped.
    /// 2. Every vocabulary term found in `normalized_query` adds the keyword
    ///    bonus to candidates containing it. Documents not yet in the pool
    ///    are scored on demand and admitted when their similarity exceeds
    ///    `rescue_factor * threshold`, while the pool is below
    ///    `pool_factor * top_k`.
    /// 3. Stable sort by combined score (vector hits win ties) and truncate
    ///    to `top_k`.
    pub fn rank(
        &self,
        query_vector: &[f32],
        normalized_query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RankedCandidate>> {
        let mut candidates =
            self.gather(query_vector, normalized_query, top_k, threshold)?;
        candidates.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        candidates.truncate(top_k);
        Ok(candidates)
    }

    /// Build the unsorted candidate pool in insertion order.
    fn gather(
        &self,
        query_vector: &[f32],
        normalized_query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RankedCandidate>> {
        self.vectors.check_query(query_vector)?;

        let mut candidates: Vec<RankedCandidate> = Vec::new();
        let mut positions: HashMap<DocId, usize> = HashMap::new();

        let hits = self.vectors.search(query_vector, top_k)?;
        let vector_hits = hits.len();
        for (id, distance) in hits {
            let sim = similarity(distance, self.config.distance_scale);
            if sim.is_nan() || sim < threshold {
                continue;
            }
            positions.insert(id, candidates.len());
            candidates.push(RankedCandidate {
                id,
                vector_similarity: sim,
                keyword_bonus: 0.0,
                combined_score: sim,
                origin: CandidateOrigin::Vector,
            });
        }
        let admitted = candidates.len();

        let pool_limit = self.config.pool_factor.saturating_mul(top_k);
        let rescue_floor = threshold * self.config.rescue_factor;
        let bonus = self.config.keyword_bonus;
        let mut rejected: HashSet<DocId> = HashSet::new();

        for found in self.keywords.matches(normalized_query) {
            for &id in found.postings {
                if let Some(&pos) = positions.get(&id) {
                    let candidate = &mut candidates[pos];
                    candidate.keyword_bonus += bonus;
                    candidate.combined_score += bonus;
                    continue;
                }
                if candidates.len() >= pool_limit || rejected.contains(&id) {
                    continue;
                }

                let Some(distance) = self.vectors.distance_to(id, query_vector)?
                else {
                    continue;
                };
                let sim = similarity(distance, self.config.distance_scale);
                if sim > rescue_floor {
                    positions.insert(id, candidates.len());
                    candidates.push(RankedCandidate {
                        id,
                        vector_similarity: sim,
                        keyword_bonus: bonus,
                        combined_score: sim + bonus,
                        origin: CandidateOrigin::KeywordRescue,
                    });
                } else {
                    rejected.insert(id);
                }
            }
        }

        debug!(
            vector_hits,
            admitted,
            rescued = candidates.len() - admitted,
            "fused candidate pool"
        );

        Ok(candidates)
    }
}

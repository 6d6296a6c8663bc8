use serde::Serialize;

use crate::{
    builder::Embedder,
    confidence::{Tier, classify_with_cutoff},
    document_store::{DocId, QaMetadata},
    error::{Error, Result},
    fusion::{CandidateOrigin, FusionScorer, ScoringConfig},
    snapshot::Snapshot,
    text_util::normalize,
};

/// Number of results returned when none is configured.
pub const DEFAULT_TOP_K: usize = 3;

/// Minimum similarity for a vector hit when none is configured.
pub const DEFAULT_THRESHOLD: f32 = 0.15;

/// Ranked, tiered result of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub query: String,
    pub tier: Tier,
    pub candidates: Vec<AnswerHit>,
}

impl Answer {
    pub fn best(&self) -> Option<&AnswerHit> {
        self.candidates.first()
    }
}

/// One ranked document with its scores and metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerHit {
    /// 1-based position in the result list.
    pub rank: usize,
    pub id: DocId,
    pub score: f32,
    pub confidence_percent: u32,
    pub vector_similarity: f32,
    pub keyword_bonus: f32,
    pub origin: CandidateOrigin,
    pub metadata: QaMetadata,
}

/// Relevance shown to users: `floor(score * 100)`, capped at 100.
pub fn confidence_percent(score: f32) -> u32 {
    (score * 100.0).floor().clamp(0.0, 100.0) as u32
}

/// Answer `query` against `snapshot`.
///
/// 1. Normalize the query and embed it once
/// 2. Fuse vector and keyword scores, keeping at most `top_k` candidates
/// 3. Classify the best fused score
pub fn answer(
    snapshot: &Snapshot,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
    threshold: f32,
    config: &ScoringConfig,
) -> Result<Answer> {
    let normalized = normalize(query);
    let query_vector = embedder.embed(&normalized)?;

    let ranked =
        FusionScorer::new(snapshot.vectors(), snapshot.keywords(), *config)
            .rank(&query_vector, &normalized, top_k, threshold)?;

    let tier = classify_with_cutoff(
        ranked.first().map(|c| c.combined_score),
        config.direct_cutoff,
    );

    let candidates = ranked
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let record = snapshot.store().get(c.id).ok_or_else(|| {
                Error::Snapshot(format!("ranked unknown document {}", c.id))
            })?;
            Ok(AnswerHit {
                rank: i + 1,
                id: c.id,
                score: c.combined_score,
                confidence_percent: confidence_percent(c.combined_score),
                vector_similarity: c.vector_similarity,
                keyword_bonus: c.keyword_bonus,
                origin: c.origin,
                metadata: record.metadata.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Answer {
        query: query.to_string(),
        tier,
        candidates,
    })
}

/// Render an answer for a terminal.
///
/// The best hit is shown in full, prefixed with a hedge when the answer is
/// tentative. Remaining hits are listed one per line.
pub fn render_human(answer: &Answer) -> String {
    let Some(best) = answer.best() else {
        return "No answer found for this question. Try rephrasing it.\n"
            .to_string();
    };

    let mut lines: Vec<String> = Vec::new();
    if answer.tier == Tier::Tentative {
        lines.push("Perhaps you meant:".to_string());
        lines.push(String::new());
    }

    let meta = &best.metadata;
    lines.push(format!("Question: {}", meta.question));
    lines.push(format!("Answer: {}", meta.answer));
    if !meta.media.is_empty() {
        lines.push(String::new());
        lines.push("Media:".to_string());
        lines.extend(meta.media.iter().map(|media| format!("- {media}")));
    }
    if !meta.links.is_empty() {
        lines.push(String::new());
        lines.push("More information:".to_string());
        lines.extend(meta.links.iter().map(|link| format!("- {link}")));
    }
    lines.push(String::new());
    lines.push(format!("Relevance: {}%", best.confidence_percent));

    if answer.candidates.len() > 1 {
        lines.push(String::new());
        lines.push("Other candidates:".to_string());
        for hit in &answer.candidates[1..] {
            lines.push(format!(
                "{:>3}. [{:.3}] {}",
                hit.rank, hit.score, hit.metadata.question
            ));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Print an answer for a terminal.
pub fn format_human(answer: &Answer) {
    print!("{}", render_human(answer));
}

/// Print an answer as JSON.
pub fn format_json(answer: &Answer) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(answer)?);
    Ok(())
}

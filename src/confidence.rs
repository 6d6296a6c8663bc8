use serde::{Deserialize, Serialize};

/// Best score above which a result is presented as a direct answer.
pub const DEFAULT_DIRECT_CUTOFF: f32 = 0.4;

/// How confidently a ranked result answers the query.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Nothing cleared the admission threshold.
    NoMatch,
    /// A candidate exists but its score is at or below the direct cutoff.
    Tentative,
    /// The best candidate scored above the direct cutoff.
    Direct,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::NoMatch => "no_match",
            Tier::Tentative => "tentative",
            Tier::Direct => "direct",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the top fused score with the default cutoff.
pub fn classify(top_score: Option<f32>) -> Tier {
    classify_with_cutoff(top_score, DEFAULT_DIRECT_CUTOFF)
}

/// Classify the top fused score against an explicit direct cutoff.
///
/// `None` means the ranked list was empty.
pub fn classify_with_cutoff(top_score: Option<f32>, direct_cutoff: f32) -> Tier {
    match top_score {
        None => Tier::NoMatch,
        Some(score) if score > direct_cutoff => Tier::Direct,
        Some(_) => Tier::Tentative,
    }
}

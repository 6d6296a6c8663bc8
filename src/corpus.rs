use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    builder::Embedder,
    document_store::QaMetadata,
    error::{EmbedError, Error, Result},
    text_util::normalize,
};

/// One question/answer record as stored in a corpus file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    /// Precomputed embedding of [`QaPair::document_text`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl QaPair {
    /// Text the record is embedded and keyword-indexed from.
    pub fn document_text(&self) -> String {
        format!("Question: {}\nAnswer: {}", self.question, self.answer)
    }

    pub fn metadata(&self) -> QaMetadata {
        QaMetadata {
            question: self.question.clone(),
            answer: self.answer.clone(),
            media: self.media.clone(),
            links: self.links.clone(),
        }
    }

    fn label(&self, index: usize) -> String {
        match &self.id {
            Some(id) => format!("'{id}'"),
            None => format!("#{index}"),
        }
    }
}

/// Load a corpus from a JSON array of [`QaPair`] objects.
pub fn load_corpus(path: &Path) -> Result<Vec<QaPair>> {
    let content = std::fs::read_to_string(path)?;
    parse_corpus(&content)
}

/// Parse and validate a JSON corpus.
pub fn parse_corpus(json: &str) -> Result<Vec<QaPair>> {
    let pairs: Vec<QaPair> = serde_json::from_str(json)
        .map_err(|e| Error::InvalidCorpus(e.to_string()))?;

    for (index, pair) in pairs.iter().enumerate() {
        if pair.question.trim().is_empty() && pair.answer.trim().is_empty() {
            return Err(Error::InvalidCorpus(format!(
                "record {} has neither a question nor an answer",
                pair.label(index)
            )));
        }
    }
    Ok(pairs)
}

/// `(text, metadata)` inputs for [`crate::builder::IndexBuilder::build`].
pub fn build_inputs(pairs: &[QaPair]) -> Vec<(String, QaMetadata)> {
    pairs
        .iter()
        .map(|p| (p.document_text(), p.metadata()))
        .collect()
}

/// Embedder backed by vectors precomputed for every corpus record.
///
/// Keys are normalized document texts, matching what the index builder
/// passes to [`Embedder::embed`].
#[derive(Debug, Clone, Default)]
pub struct LookupEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl LookupEmbedder {
    /// Collect the embeddings carried by `pairs`.
    ///
    /// Every record must carry one. Two records with the same text must
    /// carry the same vector.
    pub fn from_corpus(pairs: &[QaPair]) -> Result<Self> {
        let mut vectors = HashMap::with_capacity(pairs.len());
        for (index, pair) in pairs.iter().enumerate() {
            let Some(vector) = &pair.embedding else {
                return Err(Error::InvalidCorpus(format!(
                    "record {} has no embedding",
                    pair.label(index)
                )));
            };
            let text = normalize(&pair.document_text());
            match vectors.get(&text) {
                Some(existing) if existing != vector => {
                    return Err(Error::InvalidCorpus(format!(
                        "record {} repeats an earlier text with a different embedding",
                        pair.label(index)
                    )));
                }
                Some(_) => {}
                None => {
                    vectors.insert(text, vector.clone());
                }
            }
        }
        Ok(Self { vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl Embedder for LookupEmbedder {
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
        self.vectors.get(text).cloned().ok_or_else(|| {
            EmbedError::new(format!("no precomputed embedding for '{text}'"))
        })
    }
}

/// Embedder that returns one precomputed query vector for any text.
#[derive(Debug, Clone)]
pub struct FixedEmbedder {
    vector: Vec<f32>,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
        Ok(self.vector.clone())
    }
}

/// Read a query embedding stored as a JSON array of numbers.
pub fn read_embedding(path: &Path) -> Result<Vec<f32>> {
    let content = std::fs::read_to_string(path)?;
    let vector: Vec<f32> = serde_json::from_str(&content)?;
    if vector.is_empty() {
        return Err(EmbedError::new(format!(
            "embedding file {} is empty",
            path.display()
        ))
        .into());
    }
    Ok(vector)
}

/// Load a keyword vocabulary with one term per line.
pub fn load_vocabulary(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_vocabulary(&content))
}

/// Terms from `content`, skipping blank lines and `#` comments.
pub fn parse_vocabulary(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

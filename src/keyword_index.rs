use rayon::prelude::*;

use crate::{
    document_store::DocId,
    error::{Error, Result},
    text_util::fold_case,
};

/// Salient 3ds Max terms in Russian and English.
///
/// Several Russian entries are stems (`панел`, `настрой`, `клавиш`, `сохран`)
/// so that substring containment matches their inflected forms.
pub const DEFAULT_VOCABULARY: &[&str] = &[
    "сетка",
    "grid",
    "рендер",
    "rendering",
    "слой",
    "layer",
    "панел",
    "panel",
    "настрой",
    "setting",
    "язык",
    "language",
    "клавиш",
    "keyboard",
    "импорт",
    "import",
    "проект",
    "project",
    "сохран",
    "save",
    "интерфейс",
    "interface",
];

/// One vocabulary term found in a query, with its posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatch<'a> {
    pub term: &'a str,
    /// Ids whose text contains `term`, ascending.
    pub postings: &'a [DocId],
}

/// Fixed vocabulary of terms mapped to the documents containing them.
///
/// Containment is plain substring containment over case-folded text, so a
/// term can match inside a longer word.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    terms: Vec<String>,
    postings: Vec<Vec<DocId>>,
}

impl KeywordIndex {
    /// Build postings for `vocabulary` over `(id, normalized_text)` records.
    pub fn build<S: AsRef<str>>(
        vocabulary: &[S],
        records: &[(DocId, String)],
    ) -> Self {
        let terms = clean_vocabulary(vocabulary);
        let folded: Vec<(DocId, String)> = records
            .iter()
            .map(|(id, text)| (*id, fold_case(text)))
            .collect();

        let postings = terms
            .par_iter()
            .map(|term| {
                let mut ids: Vec<DocId> = folded
                    .iter()
                    .filter(|(_, text)| text.contains(term.as_str()))
                    .map(|(id, _)| *id)
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            })
            .collect();

        Self { terms, postings }
    }

    /// Reassemble an index from persisted terms and postings.
    ///
    /// Every posting id must be below `document_count`.
    pub fn from_parts(
        terms: Vec<String>,
        postings: Vec<Vec<DocId>>,
        document_count: usize,
    ) -> Result<Self> {
        if terms.len() != postings.len() {
            return Err(Error::Snapshot(format!(
                "{} vocabulary terms but {} posting lists",
                terms.len(),
                postings.len()
            )));
        }
        for (term, ids) in terms.iter().zip(&postings) {
            if let Some(&bad) = ids.iter().find(|&&id| id as usize >= document_count) {
                return Err(Error::Snapshot(format!(
                    "posting for '{term}' references missing document {bad}"
                )));
            }
            if ids.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::Snapshot(format!(
                    "posting for '{term}' is not strictly ascending"
                )));
            }
        }
        Ok(Self { terms, postings })
    }

    /// Terms contained in `normalized_query`, in vocabulary order.
    pub fn matches(&self, normalized_query: &str) -> Vec<KeywordMatch<'_>> {
        let query = fold_case(normalized_query);
        self.terms
            .iter()
            .zip(&self.postings)
            .filter(|(term, _)| query.contains(term.as_str()))
            .map(|(term, ids)| KeywordMatch {
                term,
                postings: ids,
            })
            .collect()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn postings(&self, term: &str) -> Option<&[DocId]> {
        self.terms
            .iter()
            .position(|t| t == term)
            .map(|i| self.postings[i].as_slice())
    }

    /// `(term, postings)` pairs in vocabulary order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[DocId])> {
        self.terms
            .iter()
            .map(String::as_str)
            .zip(self.postings.iter().map(Vec::as_slice))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Case-fold, trim and de-duplicate terms, keeping first occurrences.
fn clean_vocabulary<S: AsRef<str>>(vocabulary: &[S]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::with_capacity(vocabulary.len());
    for raw in vocabulary {
        let term = fold_case(raw.as_ref().trim());
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(texts: &[&str]) -> Vec<(DocId, String)> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| (i as DocId, t.to_string()))
            .collect()
    }

    #[test]
    fn builds_postings_by_substring() {
        let idx = KeywordIndex::build(
            &["grid", "layer"],
            &records(&["Show the Grid", "Layer manager", "gridlines and layers"]),
        );
        assert_eq!(idx.postings("grid"), Some(&[0, 2][..]));
        assert_eq!(idx.postings("layer"), Some(&[1, 2][..]));
    }

    #[test]
    fn matches_returns_terms_in_vocabulary_order() {
        let idx = KeywordIndex::build(
            &["save", "project"],
            &records(&["save the project"]),
        );
        let found = idx.matches("How do I PROJECT and Save?");
        let terms: Vec<&str> = found.iter().map(|m| m.term).collect();
        assert_eq!(terms, vec!["save", "project"]);
    }

    #[test]
    fn term_matches_inside_longer_word() {
        let idx = KeywordIndex::build(&["панел"], &records(&["Командная панель"]));
        let found = idx.matches("где панели?");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].postings, &[0]);
    }

    #[test]
    fn vocabulary_is_cleaned() {
        let idx = KeywordIndex::build(&[" Grid ", "grid", "", "LAYER"], &[]);
        assert_eq!(idx.terms(), &["grid".to_string(), "layer".to_string()]);
        assert_eq!(idx.postings("grid"), Some(&[][..]));
    }

    #[test]
    fn empty_vocabulary_never_matches() {
        let idx = KeywordIndex::build::<&str>(&[], &records(&["grid"]));
        assert!(idx.is_empty());
        assert!(idx.matches("grid").is_empty());
    }

    #[test]
    fn non_matching_query_is_empty() {
        let idx = KeywordIndex::build(DEFAULT_VOCABULARY, &records(&["grid"]));
        assert!(idx.matches("camera animation").is_empty());
        assert_eq!(idx.len(), DEFAULT_VOCABULARY.len());
    }

    #[test]
    fn from_parts_validates_postings() {
        assert!(
            KeywordIndex::from_parts(vec!["a".into()], vec![vec![0, 3]], 2)
                .is_err()
        );
        assert!(
            KeywordIndex::from_parts(vec!["a".into()], vec![vec![1, 0]], 2)
                .is_err()
        );
        assert!(KeywordIndex::from_parts(vec!["a".into()], vec![], 2).is_err());
        let idx =
            KeywordIndex::from_parts(vec!["a".into()], vec![vec![0, 1]], 2)
                .unwrap();
        assert_eq!(idx.entries().count(), 1);
    }
}

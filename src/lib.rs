//! qasearch - hybrid vector and keyword retrieval for Q&A assistants.
//!
//! Question/answer records are embedded once and indexed twice: in an exact
//! nearest-neighbor index under squared Euclidean distance, and in a small
//! keyword index over a fixed vocabulary of salient terms. A query is
//! embedded, matched against both, and the fused candidates are classified
//! into a confidence tier that drives how the answer is phrased.
//!
//! # Quick start
//!
//! ```
//! use qasearch::{
//!     Embedder, Engine, IndexBuilder, confidence::Tier,
//!     document_store::QaMetadata, error::EmbedError, fusion::ScoringConfig,
//! };
//!
//! struct Toy;
//!
//! impl Embedder for Toy {
//!     fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
//!         Ok(vec![text.len() as f32 / 10.0])
//!     }
//! }
//!
//! let corpus = vec![(
//!     "How do I show the grid?".to_string(),
//!     QaMetadata {
//!         question: "How do I show the grid?".into(),
//!         answer: "Press G.".into(),
//!         ..Default::default()
//!     },
//! )];
//!
//! let snapshot = IndexBuilder::default().build(&corpus, &Toy).unwrap();
//! let engine = Engine::new(snapshot, ScoringConfig::default());
//!
//! let answer = engine
//!     .answer(&Toy, "How do I show the grid?", 3, 0.15)
//!     .unwrap();
//! assert_eq!(answer.tier, Tier::Direct);
//! assert_eq!(answer.candidates[0].metadata.answer, "Press G.");
//! ```

pub mod builder;
pub mod confidence;
pub mod config_db;
pub mod corpus;
pub mod data_dir;
pub mod document_store;
pub mod error;
pub mod fusion;
pub mod keyword_index;
pub mod search;
pub mod snapshot;
pub mod snapshot_db;
pub mod text_util;
pub mod vector_index;

pub use builder::{Embedder, IndexBuilder};
pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use search::{Answer, AnswerHit};
pub use snapshot::{Engine, Snapshot};
pub use snapshot_db::SnapshotDb;

use rayon::prelude::*;

use crate::{
    document_store::DocId,
    error::{Error, Result},
};

/// Distance scale used by [`similarity`] unless configured otherwise.
pub const DEFAULT_DISTANCE_SCALE: f32 = 10.0;

/// Map a squared Euclidean distance to a similarity in `(0, 1]`.
///
/// Strictly decreasing in `distance`; a distance of zero maps to exactly 1.0.
pub fn similarity(distance: f32, scale: f32) -> f32 {
    (-distance / scale).exp()
}

/// Squared Euclidean distance between two vectors of equal length.
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Exact (flat) nearest-neighbor index over one vector per document.
///
/// Vectors are stored row-major in a single buffer: row `id` occupies
/// `data[id * dimension..(id + 1) * dimension]`.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from `(id, vector)` entries.
    ///
    /// Ids must be `0..n` in order and every vector must have the dimension
    /// of the first one.
    pub fn build(entries: Vec<(DocId, Vec<f32>)>) -> Result<Self> {
        let Some(dimension) = entries.first().map(|(_, v)| v.len()) else {
            return Ok(Self::default());
        };

        let mut data = Vec::with_capacity(entries.len() * dimension);
        for (position, (id, vector)) in entries.into_iter().enumerate() {
            if id as usize != position {
                return Err(Error::Snapshot(format!(
                    "vector ids are not contiguous: expected {position}, found {id}"
                )));
            }
            if vector.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            check_finite(&vector)?;
            data.extend_from_slice(&vector);
        }

        Ok(Self { dimension, data })
    }

    /// Build from an already flattened row-major buffer.
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            if !data.is_empty() {
                return Err(Error::Snapshot(
                    "vector data present with zero dimension".to_string(),
                ));
            }
            return Ok(Self::default());
        }
        if data.len() % dimension != 0 {
            return Err(Error::Snapshot(format!(
                "vector buffer of {} floats is not a multiple of dimension {dimension}",
                data.len()
            )));
        }
        if let Some(position) = data.iter().position(|x| !x.is_finite()) {
            return Err(Error::Snapshot(format!(
                "vector {} holds a non-finite value",
                position / dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Dimension of stored vectors, or `None` for an empty index.
    pub fn dimension(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.dimension)
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reconstruct the stored vector for `id`.
    pub fn vector(&self, id: DocId) -> Option<&[f32]> {
        if (id as usize) >= self.len() {
            return None;
        }
        let start = id as usize * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Iterate `(id, vector)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &[f32])> {
        self.data
            .chunks_exact(self.dimension.max(1))
            .enumerate()
            .map(|(i, row)| (i as DocId, row))
    }

    /// Squared distance between `query` and the stored vector for `id`.
    ///
    /// Returns `None` when `id` is not in the index.
    pub fn distance_to(&self, id: DocId, query: &[f32]) -> Result<Option<f32>> {
        self.check_query(query)?;
        Ok(self.vector(id).map(|row| squared_distance(row, query)))
    }

    /// The `k` nearest neighbors of `query`, nearest first.
    ///
    /// Equal distances are ordered by ascending id. An empty index yields
    /// an empty result for any query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(DocId, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_query(query)?;

        let mut scored: Vec<(DocId, f32)> = self
            .data
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, row)| (i as DocId, squared_distance(row, query)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Fail unless `query` has the index dimension and only finite values.
    ///
    /// Any query fits an empty index.
    pub fn check_query(&self, query: &[f32]) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        check_finite(query)
    }
}

fn check_finite(vector: &[f32]) -> Result<()> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(position) => Err(Error::NonFiniteVector { position }),
        None => Ok(()),
    }
}

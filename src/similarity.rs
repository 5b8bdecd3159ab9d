//! Dense pairwise cosine similarity, stored at half precision.
//!
//! The matrix is N x N over the catalog order and carries the movie id of every
//! row so that a loaded matrix can be checked against the catalog it is served with.
//! Memory grows with N², which is fine for catalogs in the low thousands.

use crate::progress::{self, ProgressCallback};
use half::f16;
use log::info;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

const F16_BYTES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    ids: Vec<i64>,
    scores: Vec<f16>,
}

impl SimilarityMatrix {
    /// Computes cosine similarity for every pair of `vectors`. `ids[i]` labels row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `ids` and `vectors` differ in length.
    pub fn compute(
        ids: Vec<i64>,
        vectors: &[Vec<f32>],
        progress: Option<ProgressCallback>,
    ) -> Self {
        assert_eq!(
            ids.len(),
            vectors.len(),
            "every similarity row needs a movie id"
        );

        let n = vectors.len();
        let started = Instant::now();
        let norms: Vec<f32> = vectors.iter().map(|v| dot(v, v).sqrt()).collect();
        let done = AtomicUsize::new(0);
        progress::report(progress.as_ref(), 0, n);

        let rows: Vec<Vec<f16>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let row = (0..n)
                    .map(|j| f16::from_f32(cosine(vectors, &norms, i, j)))
                    .collect();
                let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress::report(progress.as_ref(), completed, n);
                row
            })
            .collect();

        info!(
            "Computed {}x{} similarity matrix in {:.2?}",
            n,
            n,
            started.elapsed()
        );

        Self {
            ids,
            scores: rows.into_iter().flatten().collect(),
        }
    }

    /// Reassembles a matrix from stored rows, validating their shape.
    pub fn from_rows(ids: Vec<i64>, rows: Vec<Vec<f16>>) -> Result<Self, String> {
        let n = ids.len();
        if rows.len() != n {
            return Err(format!(
                "similarity matrix has {} rows for {} movie ids",
                rows.len(),
                n
            ));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != n) {
            return Err(format!(
                "similarity row {} has {} entries, expected {}",
                i,
                row.len(),
                n
            ));
        }
        if let Some(i) = rows.iter().position(|row| row.iter().any(|s| !s.is_finite())) {
            return Err(format!("similarity row {} contains non-finite scores", i));
        }

        Ok(Self {
            ids,
            scores: rows.into_iter().flatten().collect(),
        })
    }

    /// Unvalidated matrix, for exercising readers against bad scores.
    #[cfg(test)]
    pub(crate) fn from_raw(ids: Vec<i64>, scores: Vec<f16>) -> Self {
        Self { ids, scores }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn row(&self, i: usize) -> &[f16] {
        let n = self.len();
        &self.scores[i * n..(i + 1) * n]
    }

    /// Row `i`, or `None` when the matrix has no such row.
    pub fn try_row(&self, i: usize) -> Option<&[f16]> {
        let n = self.len();
        self.scores.get(i * n..(i + 1) * n)
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.row(i)[j].to_f32()
    }

    /// Row `i` as little-endian half floats.
    pub fn row_bytes(&self, i: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len() * F16_BYTES);
        for score in self.row(i) {
            bytes.extend_from_slice(&score.to_le_bytes());
        }
        bytes
    }
}

pub fn decode_row(bytes: &[u8]) -> Result<Vec<f16>, String> {
    if bytes.len() % F16_BYTES != 0 {
        return Err(format!(
            "similarity row blob has odd length {}",
            bytes.len()
        ));
    }
    let row: Vec<f16> = bytes
        .chunks_exact(F16_BYTES)
        .map(|pair| f16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    if let Some(j) = row.iter().position(|s| !s.is_finite()) {
        return Err(format!("similarity row entry {} is not a finite score", j));
    }
    Ok(row)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine(vectors: &[Vec<f32>], norms: &[f32], i: usize, j: usize) -> f32 {
    let denom = norms[i] * norms[j];
    if denom == 0.0 {
        return 0.0;
    }
    if i == j {
        return 1.0;
    }
    (dot(&vectors[i], &vectors[j]) / denom).clamp(0.0, 1.0)
}

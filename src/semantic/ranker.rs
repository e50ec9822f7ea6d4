//! Cosine similarity ranking over all notes of a run.
//!
//! No index structure: every source is compared against every candidate.
//! A vault holds hundreds to a few thousand notes, which keeps the
//! quadratic pass well under the time spent waiting on the model server.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::note::NoteId;

/// One entry of a note's related list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Related {
    pub id: NoteId,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(a, b)| a * b).sum()
}

fn is_zero(v: &[f32]) -> bool {
    l2_norm(v) < f32::EPSILON
}

/// Cosine similarity between two vectors. Zero-norm vectors (and vectors
/// of different lengths) have similarity 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    (dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Related notes of `source`: at most `k` entries scoring at least
/// `min_score`, best first. The source itself is never included, and
/// neither are zero vectors, which have no direction to compare.
pub fn rank(
    vectors: &BTreeMap<NoteId, Vec<f32>>,
    source: &NoteId,
    k: usize,
    min_score: f32,
) -> Vec<Related> {
    let source_vector = match vectors.get(source) {
        Some(vector) => vector,
        None => return Vec::new(),
    };
    if k == 0 || is_zero(source_vector) {
        return Vec::new();
    }

    let mut results: Vec<Related> = vectors
        .iter()
        .filter(|(id, _)| *id != source)
        .filter(|(_, vector)| vector.len() == source_vector.len() && !is_zero(vector))
        .filter_map(|(id, vector)| {
            let score = cosine_similarity(source_vector, vector);
            // NaN fails the comparison too
            (score >= min_score).then(|| Related {
                id: id.clone(),
                score,
            })
        })
        .collect();

    // Sort by score descending, ids ascending on ties
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    results.truncate(k);
    results
}

/// `rank` for every note of the run.
pub fn rank_all(
    vectors: &BTreeMap<NoteId, Vec<f32>>,
    k: usize,
    min_score: f32,
) -> BTreeMap<NoteId, Vec<Related>> {
    vectors
        .keys()
        .map(|id| (id.clone(), rank(vectors, id, k, min_score)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors(items: &[(&str, Vec<f32>)]) -> BTreeMap<NoteId, Vec<f32>> {
        items
            .iter()
            .map(|(id, v)| (NoteId::from(*id), v.clone()))
            .collect()
    }

    fn ids(related: &[Related]) -> Vec<&str> {
        related.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_cosine_symmetry() {
        let pairs = [
            (vec![1.0, 2.0, 3.0], vec![-0.5, 4.0, 0.25]),
            (vec![0.1, 0.0, -7.0], vec![3.0, 3.0, 3.0]),
            (vec![1e-3, 2e-3, 0.0], vec![5.0, -1.0, 2.0]),
        ];
        for (a, b) in pairs {
            assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        }
    }

    #[test]
    fn test_cosine_self_is_one() {
        for v in [vec![1.0, 0.0, 0.0], vec![0.3, -2.0, 9.5], vec![1e-3, 1e-3, 1e-3]] {
            assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cosine_range_and_zero_norm() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_excludes_self_and_orders() {
        let v = vectors(&[
            ("a.md", vec![1.0, 0.0, 0.0]),
            ("b.md", vec![0.9, 0.1, 0.0]),
            ("c.md", vec![0.5, 0.5, 0.0]),
            ("d.md", vec![0.0, 0.0, 1.0]),
        ]);
        let related = rank(&v, &NoteId::from("a.md"), 10, 0.0);
        assert_eq!(ids(&related), vec!["b.md", "c.md", "d.md"]);
        assert!(related.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_rank_respects_k_and_threshold() {
        let v = vectors(&[
            ("a.md", vec![1.0, 0.0]),
            ("b.md", vec![1.0, 0.1]),
            ("c.md", vec![1.0, 0.2]),
            ("d.md", vec![1.0, 0.3]),
            ("e.md", vec![0.0, 1.0]),
        ]);
        let source = NoteId::from("a.md");

        let top2 = rank(&v, &source, 2, -1.0);
        assert_eq!(ids(&top2), vec!["b.md", "c.md"]);

        let strict = rank(&v, &source, 10, 0.5);
        assert!(strict.iter().all(|r| r.score >= 0.5));
        assert!(!ids(&strict).contains(&"e.md"));
        assert!(!ids(&strict).contains(&"a.md"));

        assert!(rank(&v, &source, 0, -1.0).is_empty());
    }

    #[test]
    fn test_rank_never_pads() {
        let v = vectors(&[("a.md", vec![1.0, 0.0]), ("b.md", vec![0.0, 1.0])]);
        assert!(rank(&v, &NoteId::from("a.md"), 3, 0.5).is_empty());
    }

    #[test]
    fn test_ties_broken_by_id() {
        let v = vectors(&[
            ("src.md", vec![1.0, 0.0]),
            ("zeta.md", vec![2.0, 0.0]),
            ("alpha.md", vec![3.0, 0.0]),
            ("Mid.md", vec![1.0, 0.0]),
        ]);
        let related = rank(&v, &NoteId::from("src.md"), 3, 0.0);
        assert_eq!(ids(&related), vec!["Mid.md", "alpha.md", "zeta.md"]);

        for _ in 0..5 {
            assert_eq!(rank(&v, &NoteId::from("src.md"), 3, 0.0), related);
        }
    }

    #[test]
    fn test_zero_norm_excluded() {
        let v = vectors(&[
            ("a.md", vec![1.0, 0.0]),
            ("zero.md", vec![0.0, 0.0]),
        ]);
        assert!(rank(&v, &NoteId::from("a.md"), 5, -1.0).is_empty());
        assert!(rank(&v, &NoteId::from("zero.md"), 5, -1.0).is_empty());
    }

    #[test]
    fn test_rank_scores_are_cosine_similarity() {
        let v = vectors(&[
            ("a.md", vec![0.3, -2.0, 9.5]),
            ("b.md", vec![1.0, 2.0, 3.0]),
            ("c.md", vec![-0.5, 4.0, 0.25]),
        ]);
        let source = NoteId::from("a.md");
        for related in rank(&v, &source, 5, -1.0) {
            assert_eq!(related.score, cosine_similarity(&v[&source], &v[&related.id]));
        }
    }

    #[test]
    fn test_unknown_source() {
        let v = vectors(&[("a.md", vec![1.0, 0.0])]);
        assert!(rank(&v, &NoteId::from("missing.md"), 5, 0.0).is_empty());
    }

    #[test]
    fn test_rank_all_matches_rank_and_is_asymmetric() {
        let v = vectors(&[
            ("a.md", vec![1.0, 0.0]),
            ("b.md", vec![0.9, 0.45]),
            ("c.md", vec![0.8, 0.6]),
        ]);
        let all = rank_all(&v, 1, 0.0);
        for id in v.keys() {
            assert_eq!(all[id], rank(&v, id, 1, 0.0));
        }
        // a picks b, c picks b, b picks c (b is closer to c than to a)
        assert_eq!(ids(&all[&NoteId::from("a.md")]), vec!["b.md"]);
        assert_eq!(ids(&all[&NoteId::from("c.md")]), vec!["b.md"]);
        assert_eq!(ids(&all[&NoteId::from("b.md")]), vec!["c.md"]);
    }
}

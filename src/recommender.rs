use crate::catalog::Catalog;
use crate::config::ServeConfig;
use crate::error::{ArtifactError, ArtifactResult, RecommendError};
use crate::similarity::SimilarityMatrix;
use crate::store;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use log::debug;

pub const DEFAULT_TOP_K: usize = 5;
const MAX_SUGGESTIONS: usize = 5;
const MIN_SUGGESTION_SCORE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub movie_id: i64,
    pub title: String,
    pub score: f32,
}

/// Every other movie in `title`'s similarity row, best first.
///
/// Ties keep catalog order. The queried movie itself is never returned. A matrix whose
/// row for `title` is missing or belongs to another movie yields `Misaligned`.
pub fn rank_similar(
    title: &str,
    catalog: &Catalog,
    matrix: &SimilarityMatrix,
    k: usize,
) -> Result<Vec<Recommendation>, RecommendError> {
    let index = catalog
        .position_of(title)
        .ok_or_else(|| RecommendError::NotFound {
            title: title.to_string(),
            suggestions: suggest_titles(title, catalog, MAX_SUGGESTIONS),
        })?;

    let row = matrix
        .try_row(index)
        .filter(|_| matrix.len() == catalog.len())
        .filter(|_| catalog.get(index).map(|m| m.movie_id) == matrix.ids().get(index).copied())
        .ok_or_else(|| RecommendError::Misaligned {
            title: title.to_string(),
        })?;

    let mut ranked: Vec<(usize, f32)> = row
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != index)
        .map(|(j, score)| (j, score.to_f32()))
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);

    Ok(ranked
        .into_iter()
        .filter_map(|(j, score)| {
            catalog.get(j).map(|movie| Recommendation {
                movie_id: movie.movie_id,
                title: movie.title.clone(),
                score,
            })
        })
        .collect())
}

/// Titles of the `k` movies most similar to `title`.
pub fn recommend(
    title: &str,
    catalog: &Catalog,
    matrix: &SimilarityMatrix,
    k: usize,
) -> Result<Vec<String>, RecommendError> {
    Ok(rank_similar(title, catalog, matrix, k)?
        .into_iter()
        .map(|r| r.title)
        .collect())
}

/// Catalog titles that fuzzily resemble `query`, best first.
pub fn suggest_titles(query: &str, catalog: &Catalog, limit: usize) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let perfect = perfect_score(&matcher, &needle);

    let mut scored: Vec<(f64, &str)> = catalog
        .titles()
        .filter_map(|title| {
            let candidate = title.to_lowercase();
            let forward = matcher.fuzzy_match(&candidate, &needle).unwrap_or(0);
            let reverse = matcher.fuzzy_match(&needle, &candidate).unwrap_or(0);
            let score = normalize_score(forward.max(reverse), &candidate, &needle, perfect);
            (score >= MIN_SUGGESTION_SCORE).then_some((score, title))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(limit);
    debug!("Suggestions for '{}': {:?}", query, scored);
    scored.into_iter().map(|(_, t)| t.to_string()).collect()
}

fn perfect_score(matcher: &SkimMatcherV2, query: &str) -> i64 {
    matcher
        .fuzzy_match(query, query)
        .unwrap_or((query.len().max(1) as i64) * 10)
        .max(1)
}

fn normalize_score(score: i64, candidate: &str, query: &str, perfect_score: i64) -> f64 {
    if score <= 0 || perfect_score <= 0 {
        return 0.0;
    }

    let base = (score as f64 / perfect_score as f64).min(1.0);
    let candidate_len = candidate.chars().count();
    let query_len = query.chars().count();
    if candidate_len == 0 || query_len == 0 {
        return 0.0;
    }
    let len_ratio = (candidate_len.min(query_len) as f64) / (candidate_len.max(query_len) as f64);
    (base * len_ratio).min(1.0)
}

/// Catalog and similarity matrix loaded once and shared read-only for the life of the process.
#[derive(Debug, Clone)]
pub struct Recommender {
    catalog: Catalog,
    matrix: SimilarityMatrix,
}

impl Recommender {
    /// Pairs a catalog with its matrix. Row `i` must belong to catalog movie `i`.
    pub fn new(catalog: Catalog, matrix: SimilarityMatrix) -> ArtifactResult<Self> {
        if catalog.movie_ids() != matrix.ids() {
            return Err(ArtifactError::Corrupt(format!(
                "{} catalog movies do not match {} similarity rows",
                catalog.len(),
                matrix.len()
            )));
        }
        Ok(Self { catalog, matrix })
    }

    pub fn load(config: &ServeConfig) -> ArtifactResult<Self> {
        let (catalog, matrix) = store::load_artifacts(&config.artifact_path)?;
        Self::new(catalog, matrix)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn matrix(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    pub fn recommend(&self, title: &str, k: usize) -> Result<Vec<String>, RecommendError> {
        recommend(title, &self.catalog, &self.matrix, k)
    }

    pub fn rank_similar(&self, title: &str, k: usize) -> Result<Vec<Recommendation>, RecommendError> {
        rank_similar(title, &self.catalog, &self.matrix, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Movie;
    use half::f16;

    fn fixture() -> (Catalog, SimilarityMatrix) {
        let titles = ["Avatar", "Aliens", "Titanic", "Terminator", "Abyss", "Toy Story", "Up"];
        let movies = titles
            .iter()
            .enumerate()
            .map(|(i, t)| Movie {
                movie_id: 100 + i as i64,
                title: t.to_string(),
                profile: String::new(),
            })
            .collect();
        let catalog = Catalog::new(movies).unwrap();

        // Titanic and Abyss tie against Avatar; Titanic comes first in catalog order.
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.5, 0.5, 0.0],
            vec![0.8, 0.0, 0.2],
            vec![0.5, 0.5, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0],
        ];
        let matrix = SimilarityMatrix::compute(catalog.movie_ids(), &vectors, None);
        (catalog, matrix)
    }

    #[test]
    fn returns_k_titles_without_the_query() {
        let (catalog, matrix) = fixture();
        let recs = recommend("Avatar", &catalog, &matrix, DEFAULT_TOP_K).unwrap();
        assert_eq!(recs.len(), 5);
        assert!(!recs.contains(&"Avatar".to_string()));
    }

    #[test]
    fn ranks_by_score_then_catalog_order() {
        let (catalog, matrix) = fixture();
        let recs = recommend("Avatar", &catalog, &matrix, DEFAULT_TOP_K).unwrap();
        assert_eq!(recs, vec!["Aliens", "Terminator", "Titanic", "Abyss", "Toy Story"]);
    }

    #[test]
    fn scores_are_descending() {
        let (catalog, matrix) = fixture();
        let ranked = rank_similar("Up", &catalog, &matrix, 10).unwrap();
        assert_eq!(ranked.len(), 6);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(ranked.iter().all(|r| r.title != "Up"));
    }

    #[test]
    fn query_is_excluded_even_when_identical_vectors_exist() {
        let (catalog, matrix) = fixture();
        let recs = recommend("Titanic", &catalog, &matrix, 1).unwrap();
        assert_eq!(recs, vec!["Abyss"]);
    }

    #[test]
    fn unknown_title_is_not_found() {
        let (catalog, matrix) = fixture();
        let err = recommend("NonExistentMovie123", &catalog, &matrix, 5).unwrap_err();
        match err {
            RecommendError::NotFound { title, .. } => assert_eq!(title, "NonExistentMovie123"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn not_found_offers_close_titles() {
        let (catalog, matrix) = fixture();
        let err = recommend("avatr", &catalog, &matrix, 5).unwrap_err();
        match err {
            RecommendError::NotFound { suggestions, .. } => {
                assert_eq!(suggestions.first().map(String::as_str), Some("Avatar"))
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn zero_k_is_an_empty_list_not_an_error() {
        let (catalog, matrix) = fixture();
        assert_eq!(recommend("Avatar", &catalog, &matrix, 0).unwrap(), Vec::<String>::new());
    }

    fn catalog_of(n: usize) -> Catalog {
        let movies = (0..n)
            .map(|i| Movie {
                movie_id: i as i64 + 1,
                title: format!("M{}", i),
                profile: String::new(),
            })
            .collect();
        Catalog::new(movies).unwrap()
    }

    #[test]
    fn short_matrix_is_an_error_not_a_panic() {
        let catalog = catalog_of(4);
        let matrix = SimilarityMatrix::compute(vec![1, 2], &[vec![1.0], vec![1.0]], None);

        assert!(matches!(
            Recommender::new(catalog.clone(), matrix.clone()),
            Err(ArtifactError::Corrupt(_))
        ));
        assert_eq!(
            recommend("M3", &catalog, &matrix, 5),
            Err(RecommendError::Misaligned {
                title: "M3".to_string()
            })
        );
        assert!(matches!(
            recommend("M0", &catalog, &matrix, 5),
            Err(RecommendError::Misaligned { .. })
        ));
    }

    #[test]
    fn matrix_for_other_movies_is_rejected() {
        let catalog = catalog_of(2);
        let matrix = SimilarityMatrix::compute(vec![7, 8], &[vec![1.0], vec![1.0]], None);
        assert!(Recommender::new(catalog.clone(), matrix.clone()).is_err());
        assert!(matches!(
            recommend("M1", &catalog, &matrix, 5),
            Err(RecommendError::Misaligned { .. })
        ));
    }

    #[test]
    fn aligned_pair_builds_a_recommender() {
        let (catalog, matrix) = fixture();
        let recommender = Recommender::new(catalog, matrix).unwrap();
        assert_eq!(recommender.recommend("Up", 1).unwrap(), vec!["Titanic"]);
    }

    #[test]
    fn nan_scores_rank_without_panicking() {
        let catalog = catalog_of(40);
        let ids = catalog.movie_ids();
        let rows = (0..40)
            .map(|i| {
                (0..40)
                    .map(|j| if (i + j) % 3 == 0 { f16::NAN } else { f16::from_f32(j as f32 / 40.0) })
                    .collect()
            })
            .collect::<Vec<Vec<f16>>>();
        let matrix = SimilarityMatrix::from_raw(ids, rows.into_iter().flatten().collect());
        let ranked = rank_similar("M1", &catalog, &matrix, 5).unwrap();
        assert_eq!(ranked.len(), 5);
    }
}

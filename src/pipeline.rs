//! Offline build: CSV tables in, catalog and similarity artifacts out.

use crate::catalog::Catalog;
use crate::config::BuildConfig;
use crate::error::{BuildError, BuildResult};
use crate::ingest::{self, IngestReport};
use crate::profile::{build_profiles, ProfileReport, RawMovie};
use crate::progress;
use crate::similarity::SimilarityMatrix;
use crate::store::{self, BuildInfo};
use crate::vectorizer::{TfidfVectorizer, VectorSpace};
use log::info;
use std::path::Path;

/// Result of running the in-memory stages over joined rows.
#[derive(Debug, Clone)]
pub struct BuiltModel {
    pub catalog: Catalog,
    pub space: VectorSpace,
    pub matrix: SimilarityMatrix,
    pub profiles: ProfileReport,
    pub duplicate_titles_dropped: usize,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub ingest: IngestReport,
    pub profiles: ProfileReport,
    pub duplicate_titles_dropped: usize,
    pub catalog_size: usize,
    pub vocabulary_size: usize,
}

/// Normalizes, profiles, vectorizes and scores `rows`. Row order becomes catalog order.
pub fn build_model(rows: &[RawMovie], config: &BuildConfig) -> BuildResult<BuiltModel> {
    let (movies, profile_report) = build_profiles(rows, &config.profile);
    let (catalog, duplicate_titles_dropped) =
        Catalog::with_policy(movies, config.duplicate_titles)?;

    if catalog.is_empty() {
        return Err(BuildError::EmptyCatalog);
    }

    let profiles = catalog.profiles();
    let space = TfidfVectorizer::new(config.max_features)
        .with_stop_words(config.stop_words.clone())
        .fit(&profiles);
    let vectors = space.encode_all(&profiles);
    let matrix = SimilarityMatrix::compute(
        catalog.movie_ids(),
        &vectors,
        Some(progress::logging_progress("Similarity", "rows")),
    );

    Ok(BuiltModel {
        catalog,
        space,
        matrix,
        profiles: profile_report,
        duplicate_titles_dropped,
    })
}

/// Runs the whole build and replaces the artifacts at `config.artifact_path`.
pub fn run_build(movies_csv: &Path, credits_csv: &Path, config: &BuildConfig) -> BuildResult<BuildReport> {
    info!(
        "Building artifacts from {} and {}",
        movies_csv.display(),
        credits_csv.display()
    );

    let (rows, ingest_report) = ingest::load_joined(movies_csv, credits_csv)?;
    let model = build_model(&rows, config)?;

    let build_info = BuildInfo::now(
        model.catalog.len(),
        model.space.dimension(),
        config.max_features,
    );
    store::write_artifacts(&config.artifact_path, &model.catalog, &model.matrix, &build_info)?;

    Ok(BuildReport {
        ingest: ingest_report,
        profiles: model.profiles,
        duplicate_titles_dropped: model.duplicate_titles_dropped,
        catalog_size: model.catalog.len(),
        vocabulary_size: model.space.dimension(),
    })
}

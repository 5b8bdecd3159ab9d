use std::path::PathBuf;

/// Failures that stop the offline build.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} must contain a '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("Catalog is empty after filtering; nothing to build")]
    EmptyCatalog,

    #[error("Catalog contains duplicate titles: {}", .0.join(", "))]
    DuplicateTitles(Vec<String>),

    #[error("Similarity matrix rows are not aligned with the catalog")]
    Misaligned,

    #[error("Failed to write artifacts: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to replace artifacts at {path}: {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The artifacts cannot be served. Always fatal for the serving process.
#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    #[error("Data unavailable: artifact file {0} does not exist")]
    Missing(PathBuf),

    #[error("Data unavailable: failed to read artifacts: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Data unavailable: {0}")]
    Corrupt(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecommendError {
    #[error("Movie not found in catalog: {title}")]
    NotFound {
        title: String,
        suggestions: Vec<String>,
    },

    #[error("Similarity row for '{title}' does not match the catalog")]
    Misaligned { title: String },
}

pub type BuildResult<T> = Result<T, BuildError>;
pub type ArtifactResult<T> = Result<T, ArtifactError>;

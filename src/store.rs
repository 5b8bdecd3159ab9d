use crate::catalog::{Catalog, Movie};
use crate::error::{ArtifactError, ArtifactResult, BuildError, BuildResult};
use crate::similarity::{decode_row, SimilarityMatrix};
use chrono::Utc;
use log::info;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use std::fs;
use std::path::{Path, PathBuf};

/// Summary of a build, stored next to the artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub built_at: String,
    pub item_count: usize,
    pub vocabulary_size: usize,
    pub max_features: usize,
}

impl BuildInfo {
    pub fn now(item_count: usize, vocabulary_size: usize, max_features: usize) -> Self {
        Self {
            built_at: Utc::now().to_rfc3339(),
            item_count,
            vocabulary_size,
            max_features,
        }
    }
}

struct ArtifactWriteSession<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> ArtifactWriteSession<'conn> {
    fn insert_movie(&mut self, position: usize, movie: &Movie) -> rusqlite::Result<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO catalog (position, movie_id, title, profile) VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![
            position as i64,
            movie.movie_id,
            movie.title,
            movie.profile
        ])?;
        Ok(())
    }

    fn insert_row(&mut self, position: usize, movie_id: i64, scores: &[u8]) -> rusqlite::Result<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO similarity (position, movie_id, scores) VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute(params![position as i64, movie_id, scores])?;
        Ok(())
    }

    fn insert_info(&mut self, key: &str, value: &str) -> rusqlite::Result<()> {
        let mut stmt = self
            .tx
            .prepare_cached("INSERT INTO build_info (key, value) VALUES (?1, ?2)")?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    fn commit(self) -> rusqlite::Result<()> {
        self.tx.commit()
    }
}

fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE catalog (
            position INTEGER PRIMARY KEY,
            movie_id INTEGER NOT NULL UNIQUE,
            title TEXT NOT NULL,
            profile TEXT NOT NULL
        );
        CREATE TABLE similarity (
            position INTEGER PRIMARY KEY,
            movie_id INTEGER NOT NULL,
            scores BLOB NOT NULL
        );
        CREATE TABLE build_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE INDEX idx_catalog_title ON catalog(title);",
    )
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes catalog, similarity matrix and build info, then swaps them in over `path`.
///
/// Everything goes to a staging file first, so readers never see one artifact
/// without the other.
pub fn write_artifacts(
    path: &Path,
    catalog: &Catalog,
    matrix: &SimilarityMatrix,
    build_info: &BuildInfo,
) -> BuildResult<()> {
    if catalog.movie_ids() != matrix.ids() {
        return Err(BuildError::Misaligned);
    }

    let staging = staging_path(path);
    if staging.exists() {
        fs::remove_file(&staging).map_err(|source| BuildError::Publish {
            path: staging.clone(),
            source,
        })?;
    }

    {
        let mut conn = Connection::open(&staging)?;
        create_tables(&conn)?;
        let mut session = ArtifactWriteSession {
            tx: conn.transaction()?,
        };

        for (position, movie) in catalog.movies().iter().enumerate() {
            session.insert_movie(position, movie)?;
            session.insert_row(position, movie.movie_id, &matrix.row_bytes(position))?;
        }

        session.insert_info("built_at", &build_info.built_at)?;
        session.insert_info("item_count", &build_info.item_count.to_string())?;
        session.insert_info("vocabulary_size", &build_info.vocabulary_size.to_string())?;
        session.insert_info("max_features", &build_info.max_features.to_string())?;
        session.commit()?;
    }

    fs::rename(&staging, path).map_err(|source| BuildError::Publish {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Wrote {} catalog rows and {}x{} similarity matrix to {}",
        catalog.len(),
        matrix.len(),
        matrix.len(),
        path.display()
    );
    Ok(())
}

fn open_read_only(path: &Path) -> ArtifactResult<Connection> {
    if !path.is_file() {
        return Err(ArtifactError::Missing(path.to_path_buf()));
    }
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

fn read_catalog(conn: &Connection) -> ArtifactResult<Catalog> {
    let mut stmt =
        conn.prepare("SELECT position, movie_id, title, profile FROM catalog ORDER BY position")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            Movie {
                movie_id: row.get(1)?,
                title: row.get(2)?,
                profile: row.get(3)?,
            },
        ))
    })?;

    let mut movies = Vec::new();
    for (expected, row) in rows.enumerate() {
        let (position, movie) = row?;
        if position != expected as i64 {
            return Err(ArtifactError::Corrupt(format!(
                "catalog position {} found where {} was expected",
                position, expected
            )));
        }
        movies.push(movie);
    }

    Catalog::new(movies).map_err(|e| ArtifactError::Corrupt(e.to_string()))
}

fn read_matrix(conn: &Connection, catalog: &Catalog) -> ArtifactResult<SimilarityMatrix> {
    let mut stmt =
        conn.prepare("SELECT position, movie_id, scores FROM similarity ORDER BY position")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, Vec<u8>>(2)?,
        ))
    })?;

    let mut ids = Vec::with_capacity(catalog.len());
    let mut scores = Vec::with_capacity(catalog.len());
    for (expected, row) in rows.enumerate() {
        let (position, movie_id, blob) = row?;
        let movie = catalog.get(expected).ok_or_else(|| {
            ArtifactError::Corrupt(format!(
                "similarity matrix has more rows than the catalog ({})",
                catalog.len()
            ))
        })?;
        if position != expected as i64 || movie_id != movie.movie_id {
            return Err(ArtifactError::Corrupt(format!(
                "similarity row {} (movie {}) is not aligned with catalog row {} (movie {})",
                position, movie_id, expected, movie.movie_id
            )));
        }
        ids.push(movie_id);
        scores.push(decode_row(&blob).map_err(ArtifactError::Corrupt)?);
    }

    if ids.len() != catalog.len() {
        return Err(ArtifactError::Corrupt(format!(
            "similarity matrix has {} rows for {} catalog movies",
            ids.len(),
            catalog.len()
        )));
    }

    SimilarityMatrix::from_rows(ids, scores).map_err(ArtifactError::Corrupt)
}

/// Loads both artifacts and verifies they describe the same movies in the same order.
pub fn load_artifacts(path: &Path) -> ArtifactResult<(Catalog, SimilarityMatrix)> {
    let conn = open_read_only(path)?;
    let catalog = read_catalog(&conn)?;
    let matrix = read_matrix(&conn, &catalog)?;

    if catalog.is_empty() {
        return Err(ArtifactError::Corrupt("catalog is empty".to_string()));
    }

    info!(
        "Loaded {} movies and {}x{} similarity matrix from {}",
        catalog.len(),
        matrix.len(),
        matrix.len(),
        path.display()
    );
    Ok((catalog, matrix))
}

pub fn read_build_info(path: &Path) -> ArtifactResult<BuildInfo> {
    let conn = open_read_only(path)?;
    let value = |key: &str| -> ArtifactResult<String> {
        conn.query_row(
            "SELECT value FROM build_info WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| ArtifactError::Corrupt(format!("build_info is missing '{}'", key)))
    };
    let number = |key: &str| -> ArtifactResult<usize> {
        let raw = value(key)?;
        raw.parse()
            .map_err(|_| ArtifactError::Corrupt(format!("build_info '{}' is not a number: {}", key, raw)))
    };

    Ok(BuildInfo {
        built_at: value("built_at")?,
        item_count: number("item_count")?,
        vocabulary_size: number("vocabulary_size")?,
        max_features: number("max_features")?,
    })
}

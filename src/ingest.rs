use crate::error::{BuildError, BuildResult};
use crate::profile::RawMovie;
use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReport {
    pub processed: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Counts for one movies/credits join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub movies: TableReport,
    pub credits: TableReport,
    pub joined: usize,
    pub without_credits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MovieRow {
    id: i64,
    title: String,
    overview: String,
    genres: String,
    keywords: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CreditRow {
    cast: String,
    crew: String,
}

/// Column positions resolved from a header row, matched case-insensitively.
struct Columns {
    path: PathBuf,
    positions: HashMap<&'static str, usize>,
}

impl Columns {
    fn resolve(path: &Path, headers: &StringRecord, wanted: &[&'static str]) -> BuildResult<Self> {
        let mut positions = HashMap::with_capacity(wanted.len());
        for &column in wanted {
            let index = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column))
                .ok_or_else(|| BuildError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })?;
            positions.insert(column, index);
        }
        Ok(Self {
            path: path.to_path_buf(),
            positions,
        })
    }

    fn text<'r>(&self, record: &'r StringRecord, column: &'static str) -> &'r str {
        self.positions
            .get(column)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
    }

    fn id(&self, record: &StringRecord, column: &'static str) -> Result<i64, String> {
        let raw = self.text(record, column).trim();
        raw.parse::<i64>()
            .map_err(|_| format!("Invalid {} '{}' in {}", column, raw, self.path.display()))
    }
}

fn open_reader(path: &Path) -> BuildResult<csv::Reader<File>> {
    let file = File::open(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

/// Reads every record, handing well-formed ones to `accept`. Bad lines are counted and skipped.
fn read_table<F>(
    path: &Path,
    wanted: &[&'static str],
    mut accept: F,
) -> BuildResult<TableReport>
where
    F: FnMut(&Columns, &StringRecord) -> Result<(), String>,
{
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| BuildError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let columns = Columns::resolve(path, &headers, wanted)?;

    let mut report = TableReport::default();
    let mut record = StringRecord::new();
    let mut line_index = 0usize;

    loop {
        let display_line = line_index + 2;
        match reader.read_record(&mut record) {
            Ok(true) => {
                report.processed += 1;
                match accept(&columns, &record) {
                    Ok(()) => report.loaded += 1,
                    Err(e) => {
                        report.skipped += 1;
                        report.errors.push(format!("Line {}: {}", display_line, e));
                    }
                }
            }
            Ok(false) => break,
            Err(e) => {
                report.processed += 1;
                report.skipped += 1;
                report.errors.push(format!("Line {}: {}", display_line, e));
            }
        }
        line_index += 1;
    }

    if report.skipped > 0 {
        warn!(
            "Skipped {} of {} rows in {}",
            report.skipped,
            report.processed,
            path.display()
        );
    }

    Ok(report)
}

fn load_movies(path: &Path) -> BuildResult<(Vec<MovieRow>, TableReport)> {
    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let report = read_table(
        path,
        &["id", "title", "overview", "genres", "keywords"],
        |columns, record| {
            let id = columns.id(record, "id")?;
            let title = columns.text(record, "title");
            if title.trim().is_empty() {
                return Err(format!("Empty title for movie {}", id));
            }
            if !seen.insert(id) {
                return Err(format!("Duplicate movie id {}", id));
            }
            rows.push(MovieRow {
                id,
                title: title.to_string(),
                overview: columns.text(record, "overview").to_string(),
                genres: columns.text(record, "genres").to_string(),
                keywords: columns.text(record, "keywords").to_string(),
            });
            Ok(())
        },
    )?;
    Ok((rows, report))
}

fn load_credits(path: &Path) -> BuildResult<(HashMap<i64, CreditRow>, TableReport)> {
    let mut credits = HashMap::new();
    let report = read_table(path, &["movie_id", "cast", "crew"], |columns, record| {
        let movie_id = columns.id(record, "movie_id")?;
        if credits.contains_key(&movie_id) {
            return Err(format!("Duplicate credits for movie {}", movie_id));
        }
        credits.insert(
            movie_id,
            CreditRow {
                cast: columns.text(record, "cast").to_string(),
                crew: columns.text(record, "crew").to_string(),
            },
        );
        Ok(())
    })?;
    Ok((credits, report))
}

/// Loads both tables and inner-joins them on `movies.id == credits.movie_id`.
///
/// Output keeps the movies table's row order and takes the title from the movies table.
pub fn load_joined(movies_csv: &Path, credits_csv: &Path) -> BuildResult<(Vec<RawMovie>, IngestReport)> {
    let (movies, movies_report) = load_movies(movies_csv)?;
    let (mut credits, credits_report) = load_credits(credits_csv)?;

    let mut joined = Vec::with_capacity(movies.len());
    let mut without_credits = 0usize;

    for movie in movies {
        match credits.remove(&movie.id) {
            Some(credit) => joined.push(RawMovie {
                movie_id: movie.id,
                title: movie.title,
                overview: movie.overview,
                genres: movie.genres,
                keywords: movie.keywords,
                cast: credit.cast,
                crew: credit.crew,
            }),
            None => {
                log::debug!("Movie {} ({}) has no credits row", movie.id, movie.title);
                without_credits += 1;
            }
        }
    }

    info!(
        "Joined {} movies with credits ({} movie rows, {} credit rows, {} without credits)",
        joined.len(),
        movies_report.loaded,
        credits_report.loaded,
        without_credits
    );

    let report = IngestReport {
        movies: movies_report,
        credits: credits_report,
        joined: joined.len(),
        without_credits,
    };
    Ok((joined, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn joins_on_id_in_movies_order() {
        let dir = tempfile::tempdir().unwrap();
        let movies = write_csv(
            dir.path(),
            "movies.csv",
            "budget,genres,id,keywords,overview,title\n\
             1,[],3,[],Third overview,Third\n\
             1,[],1,[],First overview,First\n\
             1,[],2,[],No credits,Orphan\n",
        );
        let credits = write_csv(
            dir.path(),
            "credits.csv",
            "movie_id,title,cast,crew\n\
             1,First (credits),[],[]\n\
             3,Third,[],[]\n",
        );

        let (rows, report) = load_joined(&movies, &credits).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.movie_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(rows[1].title, "First");
        assert_eq!(report.joined, 2);
        assert_eq!(report.without_credits, 1);
    }

    #[test]
    fn bad_ids_are_skipped_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let movies = write_csv(
            dir.path(),
            "movies.csv",
            "id,title,overview,genres,keywords\n\
             abc,Broken,text,[],[]\n\
             7,Fine,text,[],[]\n",
        );
        let credits = write_csv(dir.path(), "credits.csv", "movie_id,cast,crew\n7,[],[]\n");

        let (rows, report) = load_joined(&movies, &credits).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(report.movies.skipped, 1);
        assert!(report.movies.errors[0].starts_with("Line 2:"));
    }

    #[test]
    fn missing_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let movies = write_csv(dir.path(), "movies.csv", "id,title,genres,keywords\n1,A,[],[]\n");
        let credits = write_csv(dir.path(), "credits.csv", "movie_id,cast,crew\n1,[],[]\n");

        match load_joined(&movies, &credits) {
            Err(BuildError::MissingColumn { column, .. }) => assert_eq!(column, "overview"),
            other => panic!("expected missing column, got {:?}", other.map(|(r, _)| r.len())),
        }
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.csv");
        assert!(matches!(
            load_joined(&absent, &absent),
            Err(BuildError::Io { .. })
        ));
    }

    #[test]
    fn repeated_movie_ids_are_skipped_not_counted_as_missing_credits() {
        let dir = tempfile::tempdir().unwrap();
        let movies = write_csv(
            dir.path(),
            "movies.csv",
            "id,title,overview,genres,keywords\n\
             5,Heat,text,[],[]\n\
             5,Heat (re-release),text,[],[]\n",
        );
        let credits = write_csv(dir.path(), "credits.csv", "movie_id,cast,crew\n5,[],[]\n");

        let (rows, report) = load_joined(&movies, &credits).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Heat");
        assert_eq!(report.without_credits, 0);
        assert_eq!(report.movies.skipped, 1);
        assert_eq!(report.movies.errors, vec!["Line 3: Duplicate movie id 5".to_string()]);
    }

    #[test]
    fn blank_titles_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let movies = write_csv(
            dir.path(),
            "movies.csv",
            "id,overview,genres,keywords,title\n\
             1,text,[],[],\"  \"\n\
             2,text,[],[]\n\
             3,text,[],[],Kept\n",
        );
        let credits = write_csv(
            dir.path(),
            "credits.csv",
            "movie_id,cast,crew\n1,[],[]\n2,[],[]\n3,[],[]\n",
        );

        let (rows, report) = load_joined(&movies, &credits).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Kept");
        assert_eq!(report.movies.skipped, 2);
        assert!(report.movies.errors[0].starts_with("Line 2: Empty title"));
        assert!(report.movies.errors[1].starts_with("Line 3: Empty title"));
    }
}

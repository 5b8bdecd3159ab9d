use crate::catalog::Movie;
use crate::normalizer::{collapse_all, extract_names, extract_role, extract_top_k_names};
use log::{debug, info};

/// One joined movies/credits row with its attribute columns still unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMovie {
    pub movie_id: i64,
    pub title: String,
    pub overview: String,
    pub genres: String,
    pub keywords: String,
    pub cast: String,
    pub crew: String,
}

#[derive(Debug, Clone)]
pub struct ProfileOptions {
    pub top_cast: usize,
    pub director_role: String,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            top_cast: 3,
            director_role: "Director".to_string(),
        }
    }
}

/// Flat token lists for one movie. Attribute tokens are already collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieTokens {
    pub overview: Vec<String>,
    pub genres: Vec<String>,
    pub keywords: Vec<String>,
    pub cast: Vec<String>,
    pub director: Vec<String>,
}

impl MovieTokens {
    pub fn from_raw(raw: &RawMovie, options: &ProfileOptions) -> Self {
        let director: Vec<String> = extract_role(&raw.crew, &options.director_role)
            .into_iter()
            .collect();

        Self {
            overview: raw.overview.split_whitespace().map(str::to_string).collect(),
            genres: collapse_all(&extract_names(&raw.genres)),
            keywords: collapse_all(&extract_names(&raw.keywords)),
            cast: collapse_all(&extract_top_k_names(&raw.cast, options.top_cast)),
            director: collapse_all(&director),
        }
    }

    /// Overview words, genres, keywords, cast, director; space-joined and lowercased.
    pub fn profile(&self) -> String {
        let tokens: Vec<&str> = self
            .overview
            .iter()
            .chain(&self.genres)
            .chain(&self.keywords)
            .chain(&self.cast)
            .chain(&self.director)
            .map(String::as_str)
            .collect();
        tokens.join(" ").to_lowercase()
    }
}

pub fn has_narrative(raw: &RawMovie) -> bool {
    !raw.overview.trim().is_empty()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileReport {
    pub built: usize,
    pub missing_narrative: usize,
}

/// Builds one profile per movie, dropping movies without an overview.
pub fn build_profiles(raw: &[RawMovie], options: &ProfileOptions) -> (Vec<Movie>, ProfileReport) {
    let mut report = ProfileReport::default();
    let mut movies = Vec::with_capacity(raw.len());

    for row in raw {
        if !has_narrative(row) {
            debug!(
                "Dropping movie {} ({}): empty overview",
                row.movie_id, row.title
            );
            report.missing_narrative += 1;
            continue;
        }

        let profile = MovieTokens::from_raw(row, options).profile();
        movies.push(Movie {
            movie_id: row.movie_id,
            title: row.title.clone(),
            profile,
        });
    }

    report.built = movies.len();
    info!(
        "Built {} movie profiles ({} dropped for missing overview)",
        report.built, report.missing_narrative
    );
    (movies, report)
}

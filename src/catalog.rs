use crate::error::{BuildError, BuildResult};
use log::warn;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub movie_id: i64,
    pub title: String,
    pub profile: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateTitlePolicy {
    /// Fail the build when two movies share a title.
    #[default]
    Reject,
    /// Keep the first movie with a given title and drop the rest before vectorizing.
    KeepFirst,
}

impl FromStr for DuplicateTitlePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "keep-first" | "keep_first" => Ok(Self::KeepFirst),
            other => Err(format!(
                "unknown duplicate title policy '{}' (expected 'reject' or 'keep-first')",
                other
            )),
        }
    }
}

/// Ordered movie table. A movie's position is its row and column in the similarity matrix.
#[derive(Debug, Clone)]
pub struct Catalog {
    movies: Vec<Movie>,
    positions: HashMap<String, usize>,
}

impl Catalog {
    /// Builds a catalog whose titles are unique.
    pub fn new(movies: Vec<Movie>) -> BuildResult<Self> {
        let mut positions = HashMap::with_capacity(movies.len());
        let mut duplicates = Vec::new();

        for (index, movie) in movies.iter().enumerate() {
            if positions.insert(movie.title.clone(), index).is_some()
                && !duplicates.contains(&movie.title)
            {
                duplicates.push(movie.title.clone());
            }
        }

        if !duplicates.is_empty() {
            return Err(BuildError::DuplicateTitles(duplicates));
        }

        Ok(Self { movies, positions })
    }

    /// Applies `policy` and returns the catalog plus the number of movies dropped.
    pub fn with_policy(movies: Vec<Movie>, policy: DuplicateTitlePolicy) -> BuildResult<(Self, usize)> {
        match policy {
            DuplicateTitlePolicy::Reject => Ok((Self::new(movies)?, 0)),
            DuplicateTitlePolicy::KeepFirst => {
                let before = movies.len();
                let mut seen = std::collections::HashSet::with_capacity(before);
                let kept: Vec<Movie> = movies
                    .into_iter()
                    .filter(|movie| {
                        let first = seen.insert(movie.title.clone());
                        if !first {
                            warn!(
                                "Dropping movie {} ({}): duplicate title",
                                movie.movie_id, movie.title
                            );
                        }
                        first
                    })
                    .collect();
                let dropped = before - kept.len();
                Ok((Self::new(kept)?, dropped))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn get(&self, position: usize) -> Option<&Movie> {
        self.movies.get(position)
    }

    pub fn position_of(&self, title: &str) -> Option<usize> {
        self.positions.get(title).copied()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.movies.iter().map(|m| m.title.as_str())
    }

    pub fn movie_ids(&self) -> Vec<i64> {
        self.movies.iter().map(|m| m.movie_id).collect()
    }

    pub fn profiles(&self) -> Vec<&str> {
        self.movies.iter().map(|m| m.profile.as_str()).collect()
    }
}

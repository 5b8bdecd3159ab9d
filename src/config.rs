use crate::catalog::DuplicateTitlePolicy;
use crate::profile::ProfileOptions;
use crate::recommender::DEFAULT_TOP_K;
use crate::stopwords::StopWords;
use crate::vectorizer::DEFAULT_MAX_FEATURES;
use log::warn;
use std::path::PathBuf;

pub const DEFAULT_ARTIFACT_PATH: &str = "cinematch.db";

pub const ENV_MAX_FEATURES: &str = "CINEMATCH_MAX_FEATURES";
pub const ENV_TOP_CAST: &str = "CINEMATCH_TOP_CAST";
pub const ENV_TOP_K: &str = "CINEMATCH_TOP_K";
pub const ENV_ARTIFACTS: &str = "CINEMATCH_ARTIFACTS";
pub const ENV_DUPLICATE_TITLES: &str = "CINEMATCH_DUPLICATE_TITLES";
pub const ENV_STOP_WORDS: &str = "CINEMATCH_STOP_WORDS";

fn env_count(key: &str, default: usize) -> usize {
    parse_count(std::env::var(key).ok().as_deref(), default)
}

fn parse_count(value: Option<&str>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// `english` (the default) or `none`.
fn parse_stop_words(value: Option<&str>) -> StopWords {
    match value.map(str::trim) {
        None | Some("") | Some("english") => StopWords::english(),
        Some("none") => StopWords::none(),
        Some(other) => {
            warn!("Ignoring {}: unknown stop word list '{}'", ENV_STOP_WORDS, other);
            StopWords::english()
        }
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Settings for the offline build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub max_features: usize,
    pub stop_words: StopWords,
    pub profile: ProfileOptions,
    pub duplicate_titles: DuplicateTitlePolicy,
    pub artifact_path: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_features: DEFAULT_MAX_FEATURES,
            stop_words: StopWords::english(),
            profile: ProfileOptions::default(),
            duplicate_titles: DuplicateTitlePolicy::default(),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
        }
    }
}

impl BuildConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let duplicate_titles = match std::env::var(ENV_DUPLICATE_TITLES) {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Ignoring {}: {}", ENV_DUPLICATE_TITLES, e);
                defaults.duplicate_titles
            }),
            Err(_) => defaults.duplicate_titles,
        };

        Self {
            max_features: env_count(ENV_MAX_FEATURES, defaults.max_features),
            stop_words: parse_stop_words(std::env::var(ENV_STOP_WORDS).ok().as_deref()),
            profile: ProfileOptions {
                top_cast: env_count(ENV_TOP_CAST, defaults.profile.top_cast),
                ..defaults.profile
            },
            duplicate_titles,
            artifact_path: env_path(ENV_ARTIFACTS, DEFAULT_ARTIFACT_PATH),
        }
    }
}

/// Settings for the serving side.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub artifact_path: PathBuf,
    pub top_k: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ServeConfig {
    pub fn from_env() -> Self {
        Self {
            artifact_path: env_path(ENV_ARTIFACTS, DEFAULT_ARTIFACT_PATH),
            top_k: env_count(ENV_TOP_K, DEFAULT_TOP_K),
        }
    }
}

use crate::stopwords::StopWords;
use log::info;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_MAX_FEATURES: usize = 5000;
const MIN_TOKEN_LEN: usize = 2;

/// Fits a TF-IDF weighting over a corpus of profiles.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
    stop_words: StopWords,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FEATURES)
    }
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features,
            stop_words: StopWords::english(),
        }
    }

    pub fn with_stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = stop_words;
        self
    }

    /// Learns the vocabulary and idf weights in one pass over `documents`.
    ///
    /// The vocabulary keeps the `max_features` terms with the highest corpus-wide count
    /// (ties broken by term), indexed in lexicographic order. Idf is smoothed:
    /// `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit<S: AsRef<str>>(&self, documents: &[S]) -> VectorSpace {
        let mut term_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let mut seen: HashSet<String> = HashSet::new();
            for token in self.tokens(doc.as_ref()) {
                *term_freq.entry(token.clone()).or_insert(0) += 1;
                seen.insert(token);
            }
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let n_docs = documents.len() as f32;
        let idf: Vec<f32> = terms
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f32;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();

        info!(
            "Fitted TF-IDF over {} profiles: {} terms (cap {})",
            documents.len(),
            terms.len(),
            self.max_features
        );

        VectorSpace {
            vocabulary,
            terms,
            idf,
            stop_words: self.stop_words.clone(),
        }
    }

    fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        tokenize(text).filter(move |t| !self.stop_words.contains(t))
    }
}

/// A fitted, frozen term space. Every vector in one build must come from the same space.
#[derive(Debug, Clone)]
pub struct VectorSpace {
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f32>,
    stop_words: StopWords,
}

impl VectorSpace {
    pub fn dimension(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.index_of(term).map(|idx| self.idf[idx])
    }

    /// Dense, L2-normalized tf-idf vector. All zeros when no token is in the vocabulary.
    pub fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension()];
        for token in tokenize(text) {
            if self.stop_words.contains(&token) {
                continue;
            }
            if let Some(&idx) = self.vocabulary.get(&token) {
                vector[idx] += 1.0;
            }
        }

        for (value, weight) in vector.iter_mut().zip(&self.idf) {
            *value *= weight;
        }

        normalize_vector(&mut vector);
        vector
    }

    pub fn encode_all<S: AsRef<str> + Sync>(&self, documents: &[S]) -> Vec<Vec<f32>> {
        documents
            .par_iter()
            .map(|doc| self.encode(doc.as_ref()))
            .collect()
    }
}

/// Lowercased runs of alphanumeric or `_` characters, at least two characters long.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
}

fn normalize_vector(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCS: [&str; 3] = [
        "marine soldier on an alien planet jamescameron",
        "alien hunts the crew of a spaceship ridleyscott",
        "a toy cowboy feels replaced toys",
    ];

    #[test]
    fn tokenizer_drops_single_characters_and_punctuation() {
        let tokens: Vec<String> = tokenize("In the 22nd century, a Marine's job").collect();
        assert_eq!(tokens, vec!["in", "the", "22nd", "century", "marine", "job"]);
    }

    #[test]
    fn stop_words_never_enter_the_vocabulary() {
        let space = TfidfVectorizer::default().fit(&DOCS);
        assert!(space.index_of("the").is_none());
        assert!(space.index_of("on").is_none());
        assert!(space.index_of("alien").is_some());
    }

    #[test]
    fn vocabulary_is_capped_by_corpus_frequency() {
        let space = TfidfVectorizer::new(1).fit(&DOCS);
        assert_eq!(space.terms(), &["alien".to_string()]);
        assert_eq!(space.dimension(), 1);
    }

    #[test]
    fn rarer_terms_weigh_more() {
        let space = TfidfVectorizer::default().fit(&DOCS);
        let common = space.idf("alien").unwrap();
        let rare = space.idf("jamescameron").unwrap();
        assert!(rare > common);
        assert!((common - ((4.0f32 / 3.0).ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn vectors_are_unit_length_and_non_negative() {
        let space = TfidfVectorizer::default().fit(&DOCS);
        for vector in space.encode_all(&DOCS) {
            let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
            assert!(vector.iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn unknown_text_encodes_to_zero() {
        let space = TfidfVectorizer::default().fit(&DOCS);
        assert!(space.encode("the of and").iter().all(|v| *v == 0.0));
        assert!(space.encode("").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn fitting_is_deterministic() {
        let a = TfidfVectorizer::default().fit(&DOCS);
        let b = TfidfVectorizer::default().fit(&DOCS);
        assert_eq!(a.terms(), b.terms());
        assert_eq!(a.encode_all(&DOCS), b.encode_all(&DOCS));
    }

    #[test]
    fn without_stop_words_every_token_counts() {
        let docs = ["the cat", "the dog", "a cat"];
        let space = TfidfVectorizer::new(10)
            .with_stop_words(StopWords::none())
            .fit(&docs);
        assert_eq!(space.terms(), &["cat", "dog", "the"]);

        // n = 3: "cat" and "the" appear in two documents, "dog" in one.
        let shared = (4.0f32 / 3.0).ln() + 1.0;
        let single = 2.0f32.ln() + 1.0;
        assert!((space.idf("cat").unwrap() - shared).abs() < 1e-6);
        assert!((space.idf("the").unwrap() - shared).abs() < 1e-6);
        assert!((space.idf("dog").unwrap() - single).abs() < 1e-6);
        assert!(space.idf("a").is_none());

        let v = space.encode("the dog");
        let norm = (shared * shared + single * single).sqrt();
        assert_eq!(v[0], 0.0);
        assert!((v[1] - single / norm).abs() < 1e-6);
        assert!((v[2] - shared / norm).abs() < 1e-6);
    }
}

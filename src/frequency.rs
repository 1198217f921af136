//! Word and character frequency tables backing the plausibility scorer.
//!
//! The model is immutable after construction and shared by reference (or
//! `Arc`) across every scorer and attacker. Bigram storage is restricted to
//! the highest-frequency first words at build time; full bigram tables for a
//! web-scale corpus cost hundreds of megabytes for little ranking benefit.

use rustc_hash::FxHashMap;

/// Default cap on the number of distinct first words kept in the bigram table.
pub const DEFAULT_BIGRAM_FIRST_WORD_CAP: usize = 5000;

/// Immutable frequency tables: word unigrams/bigrams, character trigrams and
/// quadgrams, and a misspelling -> correction map.
#[derive(Clone, Debug, Default)]
pub struct FrequencyModel {
    unigrams: FxHashMap<String, u64>,
    total_unigrams: u64,
    bigrams: FxHashMap<String, FxHashMap<String, u64>>,
    trigrams: FxHashMap<String, u64>,
    total_trigrams: u64,
    quadgrams: FxHashMap<String, u64>,
    total_quadgrams: u64,
    corrections: FxHashMap<String, String>,
}

impl FrequencyModel {
    pub fn builder() -> FrequencyModelBuilder {
        FrequencyModelBuilder::default()
    }

    /// Count for a (lowercase) word, 0 if absent.
    pub fn unigram_count(&self, word: &str) -> u64 {
        self.unigrams.get(word).copied().unwrap_or(0)
    }

    pub fn total_unigram_count(&self) -> u64 {
        self.total_unigrams
    }

    pub fn vocabulary_size(&self) -> usize {
        self.unigrams.len()
    }

    /// Count of the word pair `(prev, curr)`, 0 if absent. Only a bounded
    /// high-frequency subset of `prev` has bigram data at all.
    pub fn bigram_count(&self, prev: &str, curr: &str) -> u64 {
        self.bigrams
            .get(prev)
            .and_then(|m| m.get(curr))
            .copied()
            .unwrap_or(0)
    }

    /// Count for an (uppercase) character n-gram of the given order (3 or 4).
    pub fn char_ngram_count(&self, ngram: &str, order: usize) -> u64 {
        let table = match order {
            3 => &self.trigrams,
            4 => &self.quadgrams,
            _ => return 0,
        };
        table.get(ngram).copied().unwrap_or(0)
    }

    pub fn total_char_ngram_count(&self, order: usize) -> u64 {
        match order {
            3 => self.total_trigrams,
            4 => self.total_quadgrams,
            _ => 0,
        }
    }

    /// Correction for a known misspelling, if one is on record.
    pub fn correction_for(&self, misspelled: &str) -> Option<&str> {
        self.corrections.get(misspelled).map(String::as_str)
    }
}

/// Accumulates raw counts and applies the bigram first-word restriction on
/// `build()`.
#[derive(Clone, Debug)]
pub struct FrequencyModelBuilder {
    unigrams: FxHashMap<String, u64>,
    bigrams: FxHashMap<String, FxHashMap<String, u64>>,
    trigrams: FxHashMap<String, u64>,
    quadgrams: FxHashMap<String, u64>,
    corrections: FxHashMap<String, String>,
    bigram_first_word_cap: usize,
}

impl Default for FrequencyModelBuilder {
    fn default() -> Self {
        Self {
            unigrams: FxHashMap::default(),
            bigrams: FxHashMap::default(),
            trigrams: FxHashMap::default(),
            quadgrams: FxHashMap::default(),
            corrections: FxHashMap::default(),
            bigram_first_word_cap: DEFAULT_BIGRAM_FIRST_WORD_CAP,
        }
    }
}

impl FrequencyModelBuilder {
    pub fn add_unigram(&mut self, word: &str, count: u64) -> &mut Self {
        *self.unigrams.entry(word.to_lowercase()).or_insert(0) += count;
        self
    }

    pub fn add_bigram(&mut self, prev: &str, curr: &str, count: u64) -> &mut Self {
        *self
            .bigrams
            .entry(prev.to_lowercase())
            .or_default()
            .entry(curr.to_lowercase())
            .or_insert(0) += count;
        self
    }

    pub fn add_char_ngram(&mut self, ngram: &str, count: u64) -> &mut Self {
        let upper = ngram.to_uppercase();
        let table = match upper.chars().count() {
            3 => &mut self.trigrams,
            4 => &mut self.quadgrams,
            _ => return self,
        };
        *table.entry(upper).or_insert(0) += count;
        self
    }

    pub fn add_correction(&mut self, misspelled: &str, correct: &str) -> &mut Self {
        self.corrections
            .insert(misspelled.to_lowercase(), correct.to_lowercase());
        self
    }

    /// Cap on distinct first words retained in the bigram table.
    pub fn bigram_first_word_cap(&mut self, cap: usize) -> &mut Self {
        self.bigram_first_word_cap = cap;
        self
    }

    pub fn build(&self) -> FrequencyModel {
        let total_unigrams = self.unigrams.values().sum();
        let total_trigrams = self.trigrams.values().sum();
        let total_quadgrams = self.quadgrams.values().sum();

        // Keep bigram rows only for the top-N first words by unigram count.
        let mut ranked: Vec<(&String, u64)> =
            self.unigrams.iter().map(|(w, &c)| (w, c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.bigram_first_word_cap);
        let top: FxHashMap<&String, ()> = ranked.into_iter().map(|(w, _)| (w, ())).collect();

        let bigrams = self
            .bigrams
            .iter()
            .filter(|(prev, _)| top.contains_key(prev))
            .map(|(prev, row)| (prev.clone(), row.clone()))
            .collect();

        FrequencyModel {
            unigrams: self.unigrams.clone(),
            total_unigrams,
            bigrams,
            trigrams: self.trigrams.clone(),
            total_trigrams,
            quadgrams: self.quadgrams.clone(),
            total_quadgrams,
            corrections: self.corrections.clone(),
        }
    }
}

/// Parse `word \t count` lines (unigram and char-n-gram table format).
/// Malformed lines are skipped. N-gram entries may also be space-separated.
pub fn parse_counts(text: &str) -> impl Iterator<Item = (&str, u64)> {
    text.lines().filter_map(|line| {
        let mut parts = line.split(['\t', ' ']).filter(|p| !p.is_empty());
        let key = parts.next()?;
        let count = parts.next()?.trim().parse::<u64>().ok()?;
        Some((key, count))
    })
}

/// Parse `prev curr \t count` bigram lines.
pub fn parse_bigram_counts(text: &str) -> impl Iterator<Item = (&str, &str, u64)> {
    text.lines().filter_map(|line| {
        let (words, count) = line.split_once('\t')?;
        let count = count.trim().parse::<u64>().ok()?;
        let mut pair = words.split_whitespace();
        let prev = pair.next()?;
        let curr = pair.next()?;
        if pair.next().is_some() {
            return None;
        }
        Some((prev, curr, count))
    })
}

/// Parse `correct: wrong1, wrong2, ...` misspelling lines.
pub fn parse_corrections(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.lines().flat_map(|line| {
        let (correct, wrongs) = line.split_once(':').unwrap_or(("", ""));
        let correct = correct.trim();
        wrongs
            .split(',')
            .map(|w| w.trim())
            .filter(|w| !w.is_empty() && !correct.is_empty())
            .map(move |wrong| (wrong, correct))
            .collect::<Vec<_>>()
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_boundary() {
        let mut b = FrequencyModel::builder();
        b.add_unigram("the", 100)
            .add_unigram("cat", 10)
            .add_bigram("the", "cat", 5)
            .add_char_ngram("THE", 7)
            .add_char_ngram("THEQ", 3)
            .add_correction("teh", "the");
        let model = b.build();

        assert_eq!(model.unigram_count("the"), 100);
        assert_eq!(model.unigram_count("missing"), 0);
        assert_eq!(model.total_unigram_count(), 110);
        assert_eq!(model.vocabulary_size(), 2);
        assert_eq!(model.bigram_count("the", "cat"), 5);
        assert_eq!(model.bigram_count("cat", "the"), 0);
        assert_eq!(model.char_ngram_count("THE", 3), 7);
        assert_eq!(model.char_ngram_count("THEQ", 4), 3);
        assert_eq!(model.total_char_ngram_count(3), 7);
        assert_eq!(model.total_char_ngram_count(5), 0);
        assert_eq!(model.correction_for("teh"), Some("the"));
        assert_eq!(model.correction_for("the"), None);
    }

    #[test]
    fn test_bigram_first_word_cap() {
        let mut b = FrequencyModel::builder();
        b.add_unigram("common", 1000)
            .add_unigram("rare", 1)
            .add_bigram("common", "rare", 4)
            .add_bigram("rare", "common", 4)
            .bigram_first_word_cap(1);
        let model = b.build();

        // Only the most frequent first word keeps its bigram row.
        assert_eq!(model.bigram_count("common", "rare"), 4);
        assert_eq!(model.bigram_count("rare", "common"), 0);
    }

    #[test]
    fn test_parse_counts() {
        let rows: Vec<_> = parse_counts("the\t600\ncat 50\nbad line\n").collect();
        assert_eq!(rows, vec![("the", 600), ("cat", 50)]);
    }

    #[test]
    fn test_parse_bigram_counts() {
        let rows: Vec<_> = parse_bigram_counts("the cat\t42\nmalformed\t1\n").collect();
        assert_eq!(rows, vec![("the", "cat", 42)]);
    }

    #[test]
    fn test_parse_corrections() {
        let rows: Vec<_> = parse_corrections("the: teh, hte\n").collect();
        assert_eq!(rows, vec![("teh", "the"), ("hte", "the")]);
    }
}

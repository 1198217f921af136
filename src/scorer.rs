//! English-plausibility scoring.
//!
//! The scorer answers one question: "does this text look like English?"
//! It blends three signals over word tokens (smoothed unigram/bigram
//! fluency, inverse-frequency content density, dictionary coverage) and
//! falls back to character n-gram statistics when the text carries no
//! usable word boundaries. Unspaced input is first run through a
//! Viterbi-style segmentation over the unigram table.
//!
//! All normalization constants are empirically tuned against the shipped
//! frequency tables; they live in [`ScorerConfig`] so callers can re-fit
//! them for a different corpus. Scoring is a pure function of the text and
//! the immutable [`FrequencyModel`]; it never fails, degenerate input
//! scores 0.

use crate::frequency::FrequencyModel;
use crate::shift::ShiftCipher;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::debug;

/// Valid 1-2 letter words admitted during segmentation and coverage
/// checks. Without this closed list the segmenter happily tiles garbage
/// out of single-letter dictionary entries.
pub const SHORT_WORD_ALLOWLIST: &[&str] = &[
    "a", "i", "am", "an", "as", "at", "be", "by", "do", "go", "he", "hi", "if", "in", "is", "it",
    "me", "my", "no", "of", "oh", "ok", "on", "or", "so", "to", "up", "us", "we",
];

/// Tuning knobs for the plausibility model. Every value here is an
/// empirical fit, not a law; the defaults match the shipped web-corpus
/// tables.
#[derive(Clone, Debug)]
pub struct ScorerConfig {
    /// Longest candidate word considered during segmentation.
    pub segment_max_word_len: usize,
    /// Unspaced text shorter than this is scored as a single token.
    pub segment_min_text_len: usize,
    /// Linear mapping of average word log10-probability into [0, 1].
    pub word_logprob_range: (f64, f64),
    /// Log10 decades subtracted when backing off from bigram to unigram.
    pub backoff_penalty: f64,
    /// IDF normalization ceiling for the content-density score.
    pub idf_ceiling: f64,
    /// Additive bonus when every token is a valid dictionary word.
    pub full_coverage_bonus: f64,
    /// Additive bonus when coverage exceeds `partial_coverage_floor`.
    pub partial_coverage_bonus: f64,
    pub partial_coverage_floor: f64,
    /// Bonuses are scaled down below this average token length, which
    /// suppresses accidental tilings of very short words.
    pub short_avg_len_floor: f64,
    /// Blend weight of the fluency score.
    pub prob_weight: f64,
    /// Blend weight of the content-density score.
    pub content_weight: f64,
    /// Linear mapping of average char-n-gram log10-likelihood into [0, 1].
    pub ngram_logprob_range: (f64, f64),
    /// Fast-score threshold above which `shift_potential` pays for a full
    /// segmentation-based analysis of a rotation.
    pub shift_potential_threshold: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            segment_max_word_len: 20,
            segment_min_text_len: 6,
            word_logprob_range: (-7.0, -2.0),
            backoff_penalty: 1.0,
            idf_ceiling: 5.0,
            full_coverage_bonus: 0.15,
            partial_coverage_bonus: 0.05,
            partial_coverage_floor: 0.8,
            short_avg_len_floor: 3.0,
            prob_weight: 0.4,
            content_weight: 0.6,
            ngram_logprob_range: (-15.0, -5.0),
            shift_potential_threshold: 0.45,
        }
    }
}

/// Outcome of a full analysis.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// Plausibility in [0, 1].
    pub score: f64,
    /// Sum of token log10-probabilities (word path only).
    pub log_prob: f64,
    pub avg_log_prob: f64,
    /// Whether the text was segmented before word scoring.
    pub segmented: bool,
    /// The text as scored: segmented rendering for unspaced input,
    /// otherwise the input itself.
    pub preview: String,
    /// Human-readable scoring steps.
    pub trace: Vec<String>,
}

impl Analysis {
    fn degenerate(text: &str) -> Self {
        Self {
            score: 0.0,
            log_prob: f64::NEG_INFINITY,
            avg_log_prob: f64::NEG_INFINITY,
            segmented: false,
            preview: text.to_string(),
            trace: vec!["degenerate input".to_string()],
        }
    }
}

#[derive(Clone)]
pub struct Scorer {
    model: Arc<FrequencyModel>,
    config: ScorerConfig,
    short_words: FxHashSet<&'static str>,
}

impl Scorer {
    pub fn new(model: Arc<FrequencyModel>) -> Self {
        Self::with_config(model, ScorerConfig::default())
    }

    pub fn with_config(model: Arc<FrequencyModel>, config: ScorerConfig) -> Self {
        Self {
            model,
            config,
            short_words: SHORT_WORD_ALLOWLIST.iter().copied().collect(),
        }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<FrequencyModel> {
        &self.model
    }

    /// Convenience over [`Scorer::analyze`].
    pub fn score(&self, text: &str) -> f64 {
        self.analyze(text).score
    }

    /// Full plausibility analysis. Unspaced input is segmented first; if no
    /// segmentation exists the character-n-gram fallback is used.
    pub fn analyze(&self, text: &str) -> Analysis {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Analysis::degenerate(text);
        }

        let unspaced = !trimmed.contains(char::is_whitespace);
        if unspaced && trimmed.chars().count() >= self.config.segment_min_text_len {
            if let Some((segmented, _)) = self.segment(trimmed) {
                let mut analysis = self.score_words(&segmented);
                analysis.segmented = true;
                analysis.preview = segmented;
                analysis
                    .trace
                    .insert(0, "segmented before word scoring".to_string());
                // Segmenting never reduces the score: floor at what the
                // same string would earn on the n-gram fallback, so a
                // segmentable text cannot rank below an unsegmentable
                // rival riding that path.
                let floor = self.char_ngram_score(trimmed);
                if floor > analysis.score {
                    analysis
                        .trace
                        .push(format!("raised to n-gram floor {floor:.3}"));
                    analysis.score = floor;
                }
                return analysis;
            }
            debug!(len = trimmed.len(), "segmentation failed, using char n-gram fallback");
            let score = self.char_ngram_score(trimmed);
            return Analysis {
                score,
                log_prob: 0.0,
                avg_log_prob: 0.0,
                segmented: false,
                preview: trimmed.to_string(),
                trace: vec!["fallback to character n-grams".to_string()],
            };
        }

        self.score_words(trimmed)
    }

    /// Viterbi segmentation of unspaced text into dictionary words.
    /// Returns the spaced rendering and its total log10-probability, or
    /// `None` when no complete tiling of valid words exists.
    pub fn segment(&self, text: &str) -> Option<(String, f64)> {
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        let n = chars.len();
        if n == 0 {
            return None;
        }
        let total = self.model.total_unigram_count();
        if total == 0 {
            return None;
        }

        // best[i] = best log prob of chars[..i]; back[i] = matching split.
        let mut best = vec![f64::NEG_INFINITY; n + 1];
        let mut back = vec![0usize; n + 1];
        best[0] = 0.0;

        for i in 1..=n {
            let lo = i.saturating_sub(self.config.segment_max_word_len);
            for j in lo..i {
                if best[j] == f64::NEG_INFINITY {
                    continue;
                }
                let word: String = chars[j..i].iter().collect();
                if !self.is_valid_word(&word) {
                    continue;
                }
                let count = self.model.unigram_count(&word);
                let transition = best[j] + (count as f64 / total as f64).log10();
                if transition > best[i] {
                    best[i] = transition;
                    back[i] = j;
                }
            }
        }

        if best[n] == f64::NEG_INFINITY {
            return None;
        }

        let mut words = Vec::new();
        let mut i = n;
        while i > 0 {
            let j = back[i];
            words.push(chars[j..i].iter().collect::<String>());
            i = j;
        }
        words.reverse();
        Some((words.join(" "), best[n]))
    }

    /// Word-level score: Laplace-smoothed unigram for the first token,
    /// bigram with unigram backoff for the rest, blended with content
    /// density and the dictionary-coverage bonus.
    fn score_words(&self, text: &str) -> Analysis {
        let tokens = clean_tokenize(text);
        if tokens.is_empty() {
            return Analysis::degenerate(text);
        }

        let total = self.model.total_unigram_count();
        let vocab = self.model.vocabulary_size() as f64;
        if total == 0 {
            return Analysis::degenerate(text);
        }
        let total = total as f64;

        let mut trace = Vec::with_capacity(tokens.len() + 2);
        let mut log_prob = 0.0;

        let smoothed = |word: &str| -> f64 {
            (self.model.unigram_count(word) as f64 + 1.0) / (total + vocab)
        };

        let p_first = smoothed(&tokens[0]);
        log_prob += p_first.log10();
        trace.push(format!("P({})={:.2e}", tokens[0], p_first));

        for pair in tokens.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let pair_count = self.model.bigram_count(prev, curr);
            if pair_count > 0 {
                let prev_count = self.model.unigram_count(prev).max(1);
                let p = pair_count as f64 / prev_count as f64;
                log_prob += p.log10();
                trace.push(format!("P({curr}|{prev})={p:.2e}"));
            } else {
                let p = smoothed(curr);
                log_prob += p.log10() - self.config.backoff_penalty;
                trace.push(format!("backoff P({curr})={p:.2e}"));
            }
        }

        let avg_log_prob = log_prob / tokens.len() as f64;
        let (lo, hi) = self.config.word_logprob_range;
        let prob_score = ((avg_log_prob - lo) / (hi - lo)).clamp(0.0, 1.0);

        // Content density: average IDF over known tokens, unknown tokens
        // contribute 0. Rewards specific vocabulary over function words.
        let idf_sum: f64 = tokens
            .iter()
            .map(|w| {
                let count = self.model.unigram_count(w);
                if count > 0 {
                    -(count as f64 / total).log10()
                } else {
                    0.0
                }
            })
            .sum();
        let content_score =
            (idf_sum / tokens.len() as f64 / self.config.idf_ceiling).clamp(0.0, 1.0);

        let valid = tokens
            .iter()
            .filter(|w| self.is_valid_word(w.as_str()))
            .count();
        let coverage = valid as f64 / tokens.len() as f64;
        let avg_len = tokens.iter().map(|w| w.chars().count()).sum::<usize>() as f64
            / tokens.len() as f64;
        let mut bonus = if coverage >= 1.0 {
            self.config.full_coverage_bonus
        } else if coverage > self.config.partial_coverage_floor {
            self.config.partial_coverage_bonus
        } else {
            0.0
        };
        if avg_len < self.config.short_avg_len_floor {
            bonus *= avg_len / self.config.short_avg_len_floor;
        }

        let score = (self.config.prob_weight * prob_score
            + self.config.content_weight * content_score
            + bonus)
            .clamp(0.0, 1.0);
        trace.push(format!(
            "prob={prob_score:.3} content={content_score:.3} coverage={coverage:.2} bonus={bonus:.3}"
        ));

        Analysis {
            score,
            log_prob,
            avg_log_prob,
            segmented: false,
            preview: text.to_string(),
            trace,
        }
    }

    /// Character-n-gram log-likelihood score with add-one smoothing,
    /// quadgrams preferred, trigrams when no quadgram table is loaded.
    pub fn char_ngram_score(&self, text: &str) -> f64 {
        let clean: Vec<char> = text
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();

        let order = if self.model.total_char_ngram_count(4) > 0 { 4 } else { 3 };
        if clean.len() < order {
            return 0.0;
        }

        let total = self.model.total_char_ngram_count(order) as f64;
        let space = 26f64.powi(order as i32);
        let mut sum = 0.0;
        let windows = clean.len() - order + 1;
        for w in clean.windows(order) {
            let gram: String = w.iter().collect();
            let count = self.model.char_ngram_count(&gram, order) as f64;
            sum += ((count + 1.0) / (total + space)).log10();
        }

        let avg = sum / windows as f64;
        let (lo, hi) = self.config.ngram_logprob_range;
        ((avg - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    /// Best achievable plausibility over all 26 rotations of the input.
    ///
    /// Used when the text under inspection is still shift-enciphered (the
    /// transposition layer of a layered attack): plain English scoring
    /// would misrank it. The cheap n-gram score acts as a filter so the
    /// expensive segmentation-based analysis only runs on rotations that
    /// already look promising.
    pub fn shift_potential(&self, text: &str) -> f64 {
        let mut best: f64 = 0.0;
        for shift in 0..26u8 {
            let rotated = ShiftCipher::decrypt(text, shift);
            let fast = self.char_ngram_score(&rotated);
            best = best.max(fast);
            if fast > self.config.shift_potential_threshold {
                best = best.max(self.analyze(&rotated).score);
            }
        }
        best
    }

    /// Replace tokens that are unknown to the dictionary but present in the
    /// misspelling map. `None` when nothing changed.
    pub fn autocorrect(&self, text: &str) -> Option<String> {
        let mut changed = false;
        let corrected: Vec<String> = text
            .split_whitespace()
            .map(|token| {
                let clean = token.to_lowercase();
                if self.model.unigram_count(&clean) == 0 {
                    if let Some(fix) = self.model.correction_for(&clean) {
                        changed = true;
                        return fix.to_string();
                    }
                }
                token.to_string()
            })
            .collect();
        changed.then(|| corrected.join(" "))
    }

    /// Admissibility rule shared by segmentation and coverage: the word is
    /// in the unigram table and is either 3+ letters or on the short-word
    /// allow-list.
    fn is_valid_word(&self, word: &str) -> bool {
        if self.model.unigram_count(word) == 0 {
            return false;
        }
        word.chars().count() >= 3 || self.short_words.contains(word)
    }
}

/// Lower-case, strip punctuation, split on whitespace.
fn clean_tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::fixture;

    #[test]
    fn test_empty_and_degenerate_input() {
        let scorer = fixture::scorer();
        assert_eq!(scorer.score(""), 0.0);
        assert_eq!(scorer.score("   "), 0.0);
        assert_eq!(scorer.score("!!! ... ---"), 0.0);
    }

    #[test]
    fn test_english_beats_scrambled_letters() {
        let scorer = fixture::scorer();
        let english = scorer.score("the quick brown fox");
        // Same letters, shuffled in place.
        let scrambled = scorer.score("qciu kthe nworb xof");
        println!("english={english:.4} scrambled={scrambled:.4}");
        assert!(english > scrambled);
        assert!(english > 0.5);
    }

    #[test]
    fn test_bigram_backoff_penalizes_incoherent_sequences() {
        let scorer = fixture::scorer();
        // Both use dictionary words; only the first is a seen word sequence.
        let coherent = scorer.analyze("the quick brown fox");
        let shuffled = scorer.analyze("fox the brown quick");
        println!(
            "coherent={:.4} shuffled={:.4}",
            coherent.score, shuffled.score
        );
        assert!(coherent.avg_log_prob > shuffled.avg_log_prob);
    }

    #[test]
    fn test_segmentation_of_unspaced_text() {
        let scorer = fixture::scorer();
        let analysis = scorer.analyze("helloworld");
        assert!(analysis.segmented);
        assert_eq!(analysis.preview, "hello world");

        let analysis = scorer.analyze("mynameisjames");
        assert!(analysis.segmented);
        assert_eq!(analysis.preview, "my name is james");
        assert!(analysis.score > 0.5);
    }

    #[test]
    fn test_segmentation_does_not_lose_to_fallback() {
        let scorer = fixture::scorer();
        let segmented = scorer.analyze("thequickbrownfox");
        assert!(segmented.segmented);
        assert_eq!(segmented.preview, "the quick brown fox");
        assert!(segmented.score >= scorer.char_ngram_score("thequickbrownfox"));
    }

    #[test]
    fn test_segmented_text_outranks_fallback_riders() {
        let scorer = fixture::scorer();
        let real = scorer.analyze("thequickbrownfox");
        // Same letters reversed: no word tiling exists, so this one is
        // scored on the n-gram fallback path.
        let rival = scorer.analyze("xofnworbkciuqeht");
        println!("real={:.4} rival={:.4}", real.score, rival.score);
        assert!(real.segmented);
        assert!(!rival.segmented);
        assert!(real.score >= rival.score);
    }

    #[test]
    fn test_fallback_on_unsegmentable_text() {
        let scorer = fixture::scorer();
        let analysis = scorer.analyze("zxqjvkwpbfgh");
        assert!(!analysis.segmented);
        // Unsegmentable junk may still pick up a weak n-gram score, but it
        // must stay well below real text.
        assert!(analysis.score < scorer.score("mynameisjames"));
    }

    #[test]
    fn test_char_ngram_score_separates_english_from_junk() {
        let scorer = fixture::scorer();
        let english = scorer.char_ngram_score("MYNAMEISJAMES");
        let junk = scorer.char_ngram_score("QZXWJKVQPZXWJ");
        println!("english={english:.4} junk={junk:.4}");
        assert!(english > junk + 0.2);
    }

    #[test]
    fn test_shift_potential_spots_rotated_english() {
        let scorer = fixture::scorer();
        let shifted = ShiftCipher::encrypt("mynameisjames", 7);
        let potential = scorer.shift_potential(&shifted);
        let junk_potential = scorer.shift_potential("qqqqqqqqqqqqq");
        println!("potential={potential:.4} junk={junk_potential:.4}");
        assert!(potential > junk_potential);
        assert!(potential > 0.5);
    }

    #[test]
    fn test_autocorrect_uses_misspelling_map() {
        let scorer = fixture::scorer();
        assert_eq!(
            scorer.autocorrect("teh quick brown fox").as_deref(),
            Some("the quick brown fox")
        );
        assert_eq!(scorer.autocorrect("the quick brown fox"), None);
    }

    #[test]
    fn test_coverage_bonus_scaled_for_short_tokens() {
        let scorer = fixture::scorer();
        // All-allowlist tiling of two-letter words should not collect the
        // full coverage bonus.
        let tiling = scorer.analyze("an an an an");
        let sentence = scorer.analyze("defend the east wall");
        assert!(sentence.score > tiling.score);
    }
}

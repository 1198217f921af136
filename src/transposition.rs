//! Columnar transposition cipher and its permutation-search attacker.
//!
//! Keys normalize to a column-order permutation before use. The attacker
//! brute-forces every permutation for every key length in `2..=K`; the
//! search space grows factorially, so `K` is a configured trade-off
//! between completeness and runtime, and candidate scoring fans out over
//! a worker pool.

use crate::attack::{rank_candidates, AttackContext, Candidate, Confidence};
use crate::frequency::FrequencyModel;
use crate::scorer::Scorer;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A transposition key as supplied by a caller: a bare column count, a
/// keyword ranked alphabetically, or an explicit column-order permutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum KeySpec {
    /// `Width(k)` reads columns in natural order `0..k`.
    Width(usize),
    /// Column order is the alphabetical rank of the keyword's letters,
    /// ties broken by position. Case-insensitive.
    Keyword(String),
    /// Explicit column read order; must be a permutation of `0..k`.
    Permutation(Vec<usize>),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("transposition key is empty")]
    EmptyKey,
    #[error("column order {perm:?} is not a permutation of 0..{len}")]
    InvalidPermutation { len: usize, perm: Vec<usize> },
}

impl KeySpec {
    /// Normalize to a canonical column-order permutation.
    pub fn to_permutation(&self) -> Result<Vec<usize>, KeyError> {
        match self {
            KeySpec::Width(0) => Err(KeyError::EmptyKey),
            KeySpec::Width(k) => Ok((0..*k).collect()),
            KeySpec::Keyword(word) => {
                let mut letters: Vec<(usize, char)> = word
                    .chars()
                    .flat_map(char::to_lowercase)
                    .enumerate()
                    .collect();
                if letters.is_empty() {
                    return Err(KeyError::EmptyKey);
                }
                // Stable sort keeps original position order for ties.
                letters.sort_by_key(|&(_, c)| c);
                Ok(letters.into_iter().map(|(i, _)| i).collect())
            }
            KeySpec::Permutation(perm) => {
                if perm.is_empty() {
                    return Err(KeyError::EmptyKey);
                }
                let mut seen = vec![false; perm.len()];
                for &col in perm {
                    if col >= perm.len() || seen[col] {
                        return Err(KeyError::InvalidPermutation {
                            len: perm.len(),
                            perm: perm.clone(),
                        });
                    }
                    seen[col] = true;
                }
                Ok(perm.clone())
            }
        }
    }
}

pub struct TranspositionCipher;

impl TranspositionCipher {
    /// Write the text into `k` columns round-robin, then read columns in
    /// key order. Spaces and punctuation are shuffled like any character.
    pub fn encrypt(text: &str, key: &KeySpec) -> Result<String, KeyError> {
        let perm = key.to_permutation()?;
        let chars: Vec<char> = text.chars().collect();
        Ok(Self::encrypt_perm(&chars, &perm))
    }

    /// Exact inverse of [`TranspositionCipher::encrypt`] for the same key,
    /// reconstructing the uneven column lengths of a non-rectangular grid.
    pub fn decrypt(text: &str, key: &KeySpec) -> Result<String, KeyError> {
        let perm = key.to_permutation()?;
        let chars: Vec<char> = text.chars().collect();
        Ok(Self::decrypt_perm(&chars, &perm))
    }

    pub(crate) fn encrypt_perm(chars: &[char], perm: &[usize]) -> String {
        let k = perm.len();
        let mut grid: Vec<Vec<char>> = vec![Vec::with_capacity(chars.len() / k + 1); k];
        for (i, &c) in chars.iter().enumerate() {
            grid[i % k].push(c);
        }
        perm.iter().flat_map(|&col| grid[col].iter()).collect()
    }

    pub(crate) fn decrypt_perm(chars: &[char], perm: &[usize]) -> String {
        let k = perm.len();
        let n = chars.len();
        let rows = n.div_ceil(k);
        // The first `full` natural columns hold `rows` characters, the
        // rest one fewer.
        let full = k - (rows * k - n);

        let mut columns: Vec<&[char]> = vec![&[]; k];
        let mut cursor = 0;
        for &col in perm {
            let len = if col < full { rows } else { rows.saturating_sub(1) };
            columns[col] = &chars[cursor..cursor + len];
            cursor += len;
        }

        let mut out = String::with_capacity(n);
        for r in 0..rows {
            for column in &columns {
                if r < column.len() {
                    out.push(column[r]);
                }
            }
        }
        out
    }
}

/// How the attacker scores a decrypted candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoringMode {
    /// The candidate should already read as English.
    Plaintext,
    /// The candidate is still shift-enciphered (nested inside a layered
    /// attack); score its best rotation instead of the raw text.
    ShiftPotential,
}

#[derive(Clone, Debug)]
pub struct TranspositionConfig {
    /// Largest key length searched; `K!` permutations at the top length.
    pub max_key_len: usize,
    /// Ranked candidates retained for display. Truncation happens after
    /// the full key space has been scored.
    pub display_limit: usize,
    /// Leader score needed before the report can claim confidence.
    pub high_confidence_score: f64,
    /// Lead over the runner-up needed for high (vs medium) confidence.
    pub high_confidence_margin: f64,
    /// Minimum score before opportunistic autocorrection is attempted.
    pub autocorrect_threshold: f64,
    /// Transposition candidates the layered attacker follows up on.
    pub lookahead: usize,
}

impl Default for TranspositionConfig {
    fn default() -> Self {
        Self {
            max_key_len: 7,
            display_limit: 100,
            high_confidence_score: 0.85,
            high_confidence_margin: 0.10,
            autocorrect_threshold: 0.5,
            lookahead: 5,
        }
    }
}

/// Ranked result of a transposition search.
#[derive(Clone, Debug, Serialize)]
pub struct TranspositionAttack {
    /// Best-first, truncated to `display_limit`.
    pub candidates: Vec<Candidate<Vec<usize>>>,
    /// Candidates actually scored (the whole space unless cancelled).
    pub evaluated: usize,
    pub cancelled: bool,
    /// Label for the leader, from score and margin over the runner-up.
    pub confidence: Confidence,
}

pub struct TranspositionAttacker {
    scorer: Scorer,
    config: TranspositionConfig,
}

impl TranspositionAttacker {
    pub fn new(model: Arc<FrequencyModel>) -> Self {
        Self::with_scorer(Scorer::new(model))
    }

    pub fn with_scorer(scorer: Scorer) -> Self {
        Self {
            scorer,
            config: TranspositionConfig::default(),
        }
    }

    pub fn with_config(scorer: Scorer, config: TranspositionConfig) -> Self {
        Self { scorer, config }
    }

    pub fn config(&self) -> &TranspositionConfig {
        &self.config
    }

    /// Score every column-order permutation for every key length in
    /// `2..=max_key_len`. Evaluations are pure and run in parallel; the
    /// final ranking is deterministic (ties keep enumeration order:
    /// ascending key length, lexicographic permutation).
    pub fn attack(
        &self,
        ciphertext: &str,
        mode: ScoringMode,
        ctx: AttackContext<'_>,
    ) -> TranspositionAttack {
        let chars: Vec<char> = ciphertext.chars().collect();

        let mut keys: Vec<Vec<usize>> = Vec::new();
        for k in 2..=self.config.max_key_len {
            keys.extend(permutations_lex(k));
        }
        debug!(space = keys.len(), ?mode, "transposition search");
        ctx.progress.stage("transposition");

        let evaluated = AtomicUsize::new(0);
        let best_bits = AtomicU64::new(0f64.to_bits());

        let scored: Vec<Option<Candidate<Vec<usize>>>> = keys
            .into_par_iter()
            .map(|perm| {
                if ctx.cancel.is_cancelled() {
                    return None;
                }
                let plaintext = TranspositionCipher::decrypt_perm(&chars, &perm);
                let candidate = self.score_candidate(perm, plaintext, mode);

                let done = evaluated.fetch_add(1, Ordering::Relaxed) + 1;
                atomic_max_f64(&best_bits, candidate.score);
                if done % 512 == 0 {
                    ctx.progress
                        .progress(done, f64::from_bits(best_bits.load(Ordering::Relaxed)));
                }
                Some(candidate)
            })
            .collect();

        let cancelled = ctx.cancel.is_cancelled();
        let mut candidates: Vec<Candidate<Vec<usize>>> =
            scored.into_iter().flatten().collect();
        let evaluated = candidates.len();
        rank_candidates(&mut candidates);

        let confidence = self.label(&candidates);
        ctx.progress
            .progress(evaluated, candidates.first().map_or(0.0, |c| c.score));
        candidates.truncate(self.config.display_limit);

        TranspositionAttack {
            candidates,
            evaluated,
            cancelled,
            confidence,
        }
    }

    fn score_candidate(
        &self,
        perm: Vec<usize>,
        plaintext: String,
        mode: ScoringMode,
    ) -> Candidate<Vec<usize>> {
        match mode {
            ScoringMode::Plaintext => {
                let analysis = self.scorer.analyze(&plaintext);
                let corrected = if analysis.score > self.config.autocorrect_threshold {
                    self.scorer.autocorrect(&analysis.preview)
                } else {
                    None
                };
                Candidate {
                    key: perm,
                    plaintext,
                    score: analysis.score,
                    trace: analysis.trace,
                    preview: analysis.segmented.then_some(analysis.preview),
                    corrected,
                }
            }
            ScoringMode::ShiftPotential => {
                let score = self.scorer.shift_potential(&plaintext);
                Candidate {
                    key: perm,
                    plaintext,
                    score,
                    trace: vec![format!("best rotation potential {score:.3}")],
                    preview: None,
                    corrected: None,
                }
            }
        }
    }

    fn label(&self, ranked: &[Candidate<Vec<usize>>]) -> Confidence {
        let Some(top) = ranked.first() else {
            return Confidence::Low;
        };
        if top.score < self.config.high_confidence_score {
            return Confidence::Low;
        }
        let margin = top.score - ranked.get(1).map_or(0.0, |c| c.score);
        if margin >= self.config.high_confidence_margin {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }
}

/// All permutations of `0..k` in lexicographic order.
fn permutations_lex(k: usize) -> Vec<Vec<usize>> {
    fn rec(current: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if current.len() == used.len() {
            out.push(current.clone());
            return;
        }
        for col in 0..used.len() {
            if !used[col] {
                used[col] = true;
                current.push(col);
                rec(current, used, out);
                current.pop();
                used[col] = false;
            }
        }
    }

    let mut out = Vec::new();
    rec(&mut Vec::with_capacity(k), &mut vec![false; k], &mut out);
    out
}

/// Lock-free running maximum for non-negative scores.
fn atomic_max_f64(bits: &AtomicU64, value: f64) {
    let mut current = bits.load(Ordering::Relaxed);
    while value > f64::from_bits(current) {
        match bits.compare_exchange_weak(
            current,
            value.to_bits(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::CancelToken;
    use crate::frequency::fixture;
    use crate::shift::ShiftCipher;

    #[test]
    fn test_keyword_normalization() {
        assert_eq!(
            KeySpec::Keyword("ZEBRA".into()).to_permutation().unwrap(),
            vec![4, 2, 1, 3, 0]
        );
        assert_eq!(
            KeySpec::Keyword("BRAVE".into()).to_permutation().unwrap(),
            vec![2, 0, 4, 1, 3]
        );
        // Repeated letters rank by position.
        assert_eq!(
            KeySpec::Keyword("ABBA".into()).to_permutation().unwrap(),
            vec![0, 3, 1, 2]
        );
        assert_eq!(
            KeySpec::Keyword("brave".into()).to_permutation().unwrap(),
            KeySpec::Keyword("BRAVE".into()).to_permutation().unwrap()
        );
    }

    #[test]
    fn test_width_and_permutation_normalization() {
        assert_eq!(
            KeySpec::Width(4).to_permutation().unwrap(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(KeySpec::Width(0).to_permutation(), Err(KeyError::EmptyKey));
        assert_eq!(
            KeySpec::Permutation(vec![]).to_permutation(),
            Err(KeyError::EmptyKey)
        );
        assert!(matches!(
            KeySpec::Permutation(vec![0, 0, 1]).to_permutation(),
            Err(KeyError::InvalidPermutation { .. })
        ));
        assert!(matches!(
            KeySpec::Permutation(vec![1, 3]).to_permutation(),
            Err(KeyError::InvalidPermutation { .. })
        ));
    }

    #[test]
    fn test_round_trip_uneven_grid() {
        let key = KeySpec::Keyword("ZEBRA".into());
        for text in [
            "defend the east wall of the castle",
            "short",
            "punctuation, spaces & ALL pass through!",
            "ab",
            "",
        ] {
            let ciphertext = TranspositionCipher::encrypt(text, &key).unwrap();
            assert_eq!(
                TranspositionCipher::decrypt(&ciphertext, &key).unwrap(),
                text
            );
        }
    }

    #[test]
    fn test_round_trip_all_key_forms() {
        let text = "the quick brown fox jumps over the lazy dog";
        for key in [
            KeySpec::Width(5),
            KeySpec::Keyword("SECRET".into()),
            KeySpec::Permutation(vec![2, 0, 1]),
        ] {
            let ciphertext = TranspositionCipher::encrypt(text, &key).unwrap();
            assert_eq!(
                TranspositionCipher::decrypt(&ciphertext, &key).unwrap(),
                text
            );
        }
    }

    #[test]
    fn test_key_longer_than_text_round_trips() {
        let key = KeySpec::Keyword("LONGKEYWORD".into());
        let ciphertext = TranspositionCipher::encrypt("tiny", &key).unwrap();
        assert_eq!(TranspositionCipher::decrypt(&ciphertext, &key).unwrap(), "tiny");
    }

    #[test]
    fn test_attack_recovers_explicit_permutation() {
        let attacker = TranspositionAttacker::with_scorer(fixture::scorer());
        let plaintext = "defend the east wall of the castle";
        let key = KeySpec::Permutation(vec![2, 0, 1]);
        let ciphertext = TranspositionCipher::encrypt(plaintext, &key).unwrap();

        let attack = attacker.attack(&ciphertext, ScoringMode::Plaintext, AttackContext::default());
        assert!(!attack.cancelled);
        // 2! + 3! + 4! + 5! + 6! + 7! over the full space.
        assert_eq!(attack.evaluated, 2 + 6 + 24 + 120 + 720 + 5040);

        let top = &attack.candidates[0];
        println!("top: key={:?} score={:.4} '{}'", top.key, top.score, top.plaintext);
        assert_eq!(top.plaintext, plaintext);
        assert_eq!(top.key, vec![2, 0, 1]);
    }

    #[test]
    fn test_shift_potential_mode_keeps_true_key_in_lookahead() {
        let attacker = TranspositionAttacker::with_scorer(fixture::scorer());
        let shifted = ShiftCipher::encrypt("mynameisjames", 7);
        let key = KeySpec::Keyword("BRAVE".into());
        let ciphertext = TranspositionCipher::encrypt(&shifted, &key).unwrap();

        let attack = attacker.attack(
            &ciphertext,
            ScoringMode::ShiftPotential,
            AttackContext::default(),
        );
        let lookahead = attacker.config().lookahead;
        let hit = attack
            .candidates
            .iter()
            .take(lookahead)
            .any(|c| c.plaintext == shifted);
        for c in attack.candidates.iter().take(lookahead) {
            println!("key={:?} score={:.4} '{}'", c.key, c.score, c.plaintext);
        }
        assert!(hit, "true transposition key fell outside the lookahead window");
    }

    #[test]
    fn test_display_truncation_after_full_scan() {
        let attacker = TranspositionAttacker::with_config(
            fixture::scorer(),
            TranspositionConfig {
                max_key_len: 5,
                ..TranspositionConfig::default()
            },
        );
        let attack = attacker.attack(
            "defend the east wall of the castle",
            ScoringMode::Plaintext,
            AttackContext::default(),
        );
        assert_eq!(attack.evaluated, 2 + 6 + 24 + 120);
        assert_eq!(attack.candidates.len(), 100);
    }

    #[test]
    fn test_cancellation_returns_partial_report() {
        let attacker = TranspositionAttacker::with_scorer(fixture::scorer());
        let token = CancelToken::new();
        token.cancel();
        let ctx = AttackContext::new(&token, &crate::attack::NullProgress);

        let attack = attacker.attack("defend the east wall", ScoringMode::Plaintext, ctx);
        assert!(attack.cancelled);
        assert_eq!(attack.evaluated, 0);
        assert!(attack.candidates.is_empty());
        assert_eq!(attack.confidence, Confidence::Low);
    }
}

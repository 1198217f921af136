//! Shared attack plumbing: ranked candidates, confidence labels,
//! cancellation and progress reporting.
//!
//! Every attacker in this crate evaluates candidates as pure functions of
//! immutable inputs and reports through these types, so front ends render
//! one shape regardless of which cipher was attacked.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One decryption hypothesis: a key, the text it produces, and how
/// English-like that text looks.
#[derive(Clone, Debug, Serialize)]
pub struct Candidate<K> {
    pub key: K,
    pub plaintext: String,
    /// Plausibility in `[0, 1]`.
    pub score: f64,
    /// Human-readable scoring steps (per-token probabilities, fallbacks).
    pub trace: Vec<String>,
    /// Segmented preview when the scorer had to insert word boundaries.
    pub preview: Option<String>,
    /// Autocorrected rendering, when misspelling lookup changed anything.
    pub corrected: Option<String>,
}

/// Confidence label for the leading candidate of a ranked report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Confidence {
    /// Leader clears the score threshold and the runner-up by a clear margin.
    High,
    /// Leader clears the score threshold but the margin is thin.
    Medium,
    Low,
}

/// Sorts candidates by score descending, stable in enumeration order so
/// equal scores rank reproducibly.
pub fn rank_candidates<K>(candidates: &mut [Candidate<K>]) {
    // sort_by is stable; NaN cannot occur (scores are clamped to [0,1]).
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

/// Cooperative cancellation flag shared between a caller and a running
/// attack. Cancellation stops candidate enumeration promptly; candidates
/// already scored are still ranked and returned.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Observer for long-running searches. Implementations must be cheap and
/// thread-safe; the transposition search calls them from worker threads.
pub trait ProgressSink: Sync {
    /// A named stage of a (possibly layered) attack has begun.
    fn stage(&self, _name: &str) {}

    /// `evaluated` candidates scored so far; `best` is the current top score.
    fn progress(&self, _evaluated: usize, _best: f64) {}
}

/// Discards all progress events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// Cancellation plus progress, bundled so attack signatures stay short.
#[derive(Clone, Copy)]
pub struct AttackContext<'a> {
    pub cancel: &'a CancelToken,
    pub progress: &'a dyn ProgressSink,
}

impl<'a> AttackContext<'a> {
    pub fn new(cancel: &'a CancelToken, progress: &'a dyn ProgressSink) -> Self {
        Self { cancel, progress }
    }
}

impl Default for AttackContext<'static> {
    fn default() -> Self {
        static TOKEN: std::sync::OnceLock<CancelToken> = std::sync::OnceLock::new();
        Self {
            cancel: TOKEN.get_or_init(CancelToken::new),
            progress: &NullProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(key: u8, score: f64) -> Candidate<u8> {
        Candidate {
            key,
            plaintext: String::new(),
            score,
            trace: Vec::new(),
            preview: None,
            corrected: None,
        }
    }

    #[test]
    fn test_ranking_is_stable_on_ties() {
        let mut cands = vec![candidate(0, 0.5), candidate(1, 0.9), candidate(2, 0.5)];
        rank_candidates(&mut cands);
        let keys: Vec<u8> = cands.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec![1, 0, 2]);
    }

    #[test]
    fn test_candidate_serializes_for_front_ends() {
        let mut cand = candidate(7, 0.25);
        cand.plaintext = "wkh".to_string();
        let json = serde_json::to_value(&cand).unwrap();
        assert_eq!(json["key"], 7);
        assert_eq!(json["plaintext"], "wkh");
        assert_eq!(json["preview"], serde_json::Value::Null);
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}

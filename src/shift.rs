//! Mono-alphabetic shift cipher and its exhaustive attacker.
//!
//! The key space has 26 elements, so the attacker simply decrypts under
//! every shift, scores each result, and ranks. No pruning is worth the
//! code.

use crate::attack::{rank_candidates, Candidate};
use crate::frequency::FrequencyModel;
use crate::scorer::Scorer;
use serde::Serialize;
use std::sync::Arc;

pub struct ShiftCipher;

impl ShiftCipher {
    /// Rotate alphabetic characters forward by `shift` within their case;
    /// everything else passes through unchanged.
    pub fn encrypt(text: &str, shift: u8) -> String {
        Self::rotate(text, shift % 26)
    }

    /// Exact inverse of [`ShiftCipher::encrypt`] for the same shift.
    pub fn decrypt(text: &str, shift: u8) -> String {
        Self::rotate(text, (26 - shift % 26) % 26)
    }

    fn rotate(text: &str, by: u8) -> String {
        text.chars()
            .map(|c| match c {
                'a'..='z' => (b'a' + (c as u8 - b'a' + by) % 26) as char,
                'A'..='Z' => (b'A' + (c as u8 - b'A' + by) % 26) as char,
                _ => c,
            })
            .collect()
    }
}

/// Ranked result of a shift attack: all 26 shifts, best first.
#[derive(Clone, Debug, Serialize)]
pub struct ShiftAttack {
    pub candidates: Vec<Candidate<u8>>,
}

impl ShiftAttack {
    pub fn best(&self) -> &Candidate<u8> {
        // 26 candidates are always produced.
        &self.candidates[0]
    }
}

pub struct ShiftAttacker {
    scorer: Scorer,
}

impl ShiftAttacker {
    pub fn new(model: Arc<FrequencyModel>) -> Self {
        Self::with_scorer(Scorer::new(model))
    }

    pub fn with_scorer(scorer: Scorer) -> Self {
        Self { scorer }
    }

    /// Decrypt under every shift, score, and rank descending. Ties keep
    /// ascending shift order so results are reproducible.
    pub fn attack(&self, ciphertext: &str) -> ShiftAttack {
        let mut candidates: Vec<Candidate<u8>> = (0..26u8)
            .map(|shift| {
                let plaintext = ShiftCipher::decrypt(ciphertext, shift);
                let analysis = self.scorer.analyze(&plaintext);
                Candidate {
                    key: shift,
                    plaintext,
                    score: analysis.score,
                    trace: analysis.trace,
                    preview: analysis.segmented.then_some(analysis.preview),
                    corrected: None,
                }
            })
            .collect();
        rank_candidates(&mut candidates);
        ShiftAttack { candidates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::fixture;

    #[test]
    fn test_round_trip_preserves_non_alphabetics() {
        let plaintext = "The quick brown fox: 42 jumps, over the LAZY dog!";
        for shift in 0..26 {
            let ciphertext = ShiftCipher::encrypt(plaintext, shift);
            assert_eq!(ShiftCipher::decrypt(&ciphertext, shift), plaintext);
        }
    }

    #[test]
    fn test_shift_is_mod_26() {
        assert_eq!(
            ShiftCipher::encrypt("attack", 33),
            ShiftCipher::encrypt("attack", 7)
        );
        assert_eq!(ShiftCipher::encrypt("attack", 0), "attack");
        assert_eq!(ShiftCipher::encrypt("attack", 26), "attack");
    }

    #[test]
    fn test_case_preserved() {
        assert_eq!(ShiftCipher::encrypt("AbZ", 1), "BcA");
    }

    #[test]
    fn test_attack_recovers_key_on_spaced_text() {
        let attacker = ShiftAttacker::with_scorer(fixture::scorer());
        let plaintext = "the quick brown fox jumps over the lazy dog";
        let ciphertext = ShiftCipher::encrypt(plaintext, 7);

        let attack = attacker.attack(&ciphertext);
        assert_eq!(attack.candidates.len(), 26);
        let top = attack.best();
        println!("top: key={} score={:.4} '{}'", top.key, top.score, top.plaintext);
        assert_eq!(top.key, 7);
        assert_eq!(top.plaintext, plaintext);
    }

    #[test]
    fn test_attack_recovers_key_on_unspaced_text() {
        let attacker = ShiftAttacker::with_scorer(fixture::scorer());
        let ciphertext = ShiftCipher::encrypt("mynameisjames", 7);

        let attack = attacker.attack(&ciphertext);
        let top = attack.best();
        println!("top: key={} score={:.4} '{}'", top.key, top.score, top.plaintext);
        assert_eq!(top.key, 7);
        assert_eq!(top.plaintext, "mynameisjames");
        assert_eq!(top.preview.as_deref(), Some("my name is james"));
    }
}

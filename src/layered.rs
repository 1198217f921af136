//! Layered encryption pipeline and the attack that peels it in reverse.
//!
//! Encryption composes shift, then columnar transposition, then the
//! modular public-key cipher. The attack factorizes the outer layer,
//! searches transposition keys with shift-potential scoring (the
//! intermediate text is still shift-enciphered, plain English scoring
//! would misrank it), then runs the shift attacker over the top few
//! transposition candidates rather than trusting the single best one:
//! ranking noise routinely puts the true transposition key at rank 2-5,
//! and committing early compounds a near miss into total failure.

use crate::attack::{AttackContext, Candidate};
use crate::frequency::FrequencyModel;
use crate::modular::{FactorizationAttacker, ModularCipher, PublicKey, RecoveredKey};
use crate::scorer::Scorer;
use crate::shift::{ShiftAttacker, ShiftCipher};
use crate::transposition::{
    KeyError, KeySpec, ScoringMode, TranspositionAttacker, TranspositionCipher,
};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// The attack stage that defeated a layered attack, when one did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Stage {
    Factorization,
    Transposition,
    Shift,
}

/// Everything a front end needs to narrate a layered attack: per-stage
/// artifacts, the winning path, and which stage failed if any.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LayeredReport {
    /// Private key material recovered by factorization.
    pub recovered: Option<RecoveredKey>,
    /// Outer-layer decryption: still transposed, still shifted.
    pub modular_plaintext: Option<String>,
    /// Winning transposition candidate (text still shifted).
    pub transposition_key: Option<Vec<usize>>,
    pub transposition_text: Option<String>,
    pub transposition_score: f64,
    /// Paths actually explored by the nested search.
    pub paths_explored: usize,
    pub shift_key: Option<u8>,
    pub final_plaintext: Option<String>,
    pub final_score: f64,
    pub failed_stage: Option<Stage>,
    pub success: bool,
}

pub struct LayeredCipher;

impl LayeredCipher {
    /// Shift, then transposition, then modular exponentiation, strictly in
    /// that order. The output is the outermost layer's integer blocks.
    pub fn encrypt(
        plaintext: &str,
        shift: u8,
        transposition_key: &KeySpec,
        public: &PublicKey,
    ) -> Result<Vec<u64>, KeyError> {
        let shifted = ShiftCipher::encrypt(plaintext, shift);
        let transposed = TranspositionCipher::encrypt(&shifted, transposition_key)?;
        Ok(ModularCipher::encrypt(&transposed, public))
    }
}

pub struct LayeredAttacker {
    factorization: FactorizationAttacker,
    transposition: TranspositionAttacker,
    shift: ShiftAttacker,
    lookahead: usize,
}

impl LayeredAttacker {
    pub fn new(model: Arc<FrequencyModel>) -> Self {
        Self::with_scorer(Scorer::new(model))
    }

    pub fn with_scorer(scorer: Scorer) -> Self {
        Self::with_parts(
            FactorizationAttacker::new(),
            TranspositionAttacker::with_scorer(scorer.clone()),
            ShiftAttacker::with_scorer(scorer),
        )
    }

    pub fn with_parts(
        factorization: FactorizationAttacker,
        transposition: TranspositionAttacker,
        shift: ShiftAttacker,
    ) -> Self {
        let lookahead = transposition.config().lookahead;
        Self {
            factorization,
            transposition,
            shift,
            lookahead,
        }
    }

    /// Peel the three layers in reverse. Each stage's artifacts are
    /// recorded in the report even when a later stage fails, so callers
    /// can say exactly which layer defeated the attack.
    pub fn attack(
        &self,
        blocks: &[u64],
        public: &PublicKey,
        rng: &mut impl Rng,
        ctx: AttackContext<'_>,
    ) -> LayeredReport {
        let mut report = LayeredReport::default();

        ctx.progress.stage("factorization");
        info!(n = public.n, "layered attack: factorizing outer layer");
        let recovered = match self.factorization.attack(public, rng) {
            Ok(recovered) => recovered,
            Err(err) => {
                info!(%err, "factorization failed");
                report.failed_stage = Some(Stage::Factorization);
                return report;
            }
        };
        let transposed = ModularCipher::decrypt(blocks, &recovered.private);
        report.recovered = Some(recovered);
        report.modular_plaintext = Some(transposed.clone());

        info!("layered attack: searching transposition keys");
        let search = self
            .transposition
            .attack(&transposed, ScoringMode::ShiftPotential, ctx);
        if search.candidates.is_empty() {
            report.failed_stage = Some(Stage::Transposition);
            return report;
        }

        // Nested best path: run the full shift attack on each of the top
        // candidates and keep the path whose plaintext scores best.
        ctx.progress.stage("shift");
        let mut best: Option<(Candidate<Vec<usize>>, Candidate<u8>)> = None;
        let top_paths = &search.candidates[..self.lookahead.min(search.candidates.len())];
        report.paths_explored = top_paths.len();
        for path in top_paths {
            let shift_attack = self.shift.attack(&path.plaintext);
            let leader = shift_attack.best().clone();
            if best
                .as_ref()
                .map_or(true, |(_, incumbent)| leader.score > incumbent.score)
            {
                best = Some((path.clone(), leader));
            }
        }

        match best {
            Some((transposition, shift)) => {
                info!(
                    score = shift.score,
                    "layered attack: best path selected"
                );
                report.transposition_key = Some(transposition.key.clone());
                report.transposition_text = Some(transposition.plaintext.clone());
                report.transposition_score = transposition.score;
                report.shift_key = Some(shift.key);
                report.final_score = shift.score;
                report.final_plaintext = Some(shift.plaintext);
                report.success = true;
            }
            None => {
                report.failed_stage = Some(Stage::Shift);
            }
        }
        report
    }
}

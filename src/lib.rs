//! Triple Lock: classical-cipher cryptanalysis toolkit
//!
//! Three textbook ciphers (mono-alphabetic shift, columnar transposition,
//! modular-exponentiation public key) with automated attackers that
//! recover keys from ciphertext alone, driven by a statistical
//! English-plausibility model. A layered mode chains all three ciphers
//! and attacks them jointly, peeling layers in reverse with lookahead
//! across ambiguous intermediate rankings.
//!
//! Keys are deliberately undersized for demonstration; nothing here is a
//! production cryptography library.

pub mod attack;
pub mod frequency;
pub mod layered;
pub mod modular;
pub mod scorer;
pub mod shift;
pub mod transposition;

pub use attack::{AttackContext, CancelToken, Candidate, Confidence, NullProgress, ProgressSink};
pub use frequency::{FrequencyModel, FrequencyModelBuilder};
pub use layered::{LayeredAttacker, LayeredCipher, LayeredReport, Stage};
pub use modular::{
    generate_keypair, FactorizationAttacker, KeyPair, ModularCipher, PrivateKey, PublicKey,
};
pub use scorer::{Scorer, ScorerConfig};
pub use shift::{ShiftAttacker, ShiftCipher};
pub use transposition::{
    KeySpec, ScoringMode, TranspositionAttacker, TranspositionCipher, TranspositionConfig,
};

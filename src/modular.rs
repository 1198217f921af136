//! Textbook modular-exponentiation public-key cipher and its
//! factorization attacker.
//!
//! Moduli are `u64` with `u128` intermediates: keys here are deliberately
//! undersized demonstration keys, and the attacker's declared capability
//! ceiling is 64 bits anyway (trial division to 32 bits, Pollard's rho to
//! 64, explicit refusal beyond). There is no padding scheme and no
//! side-channel hardening; this is a cryptanalysis exercise, not a
//! production cipher.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Miller-Rabin rounds used by key generation; 40 rounds bound the
/// false-positive probability below 4^-40.
pub const DEFAULT_MILLER_RABIN_ROUNDS: u32 = 40;

/// Standard public exponent tried first during key generation.
pub const DEFAULT_PUBLIC_EXPONENT: u64 = 65537;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub e: u64,
    pub n: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKey {
    pub d: u64,
    pub n: u64,
}

/// A generated key pair, with the factors and totient kept for
/// inspection. Owned by the caller; the crate holds no session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
    pub p: u64,
    pub q: u64,
    pub phi: u64,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KeygenError {
    /// Supported modulus sizes are 16..=64 bits.
    #[error("unsupported modulus size: {bits} bits (supported: 16..=64)")]
    UnsupportedKeySize { bits: u32 },
}

/// Generate a key pair with a modulus of roughly `bits` bits.
///
/// Primes are drawn as random odd candidates of exactly `bits / 2` bits
/// and tested with Miller-Rabin. The public exponent is 65537 unless it
/// shares a factor with `phi`, in which case a random coprime exponent is
/// drawn instead.
pub fn generate_keypair(bits: u32, rng: &mut impl Rng) -> Result<KeyPair, KeygenError> {
    if !(16..=64).contains(&bits) {
        return Err(KeygenError::UnsupportedKeySize { bits });
    }

    let p_bits = bits / 2;
    let q_bits = bits - p_bits;
    let p = generate_prime(p_bits, rng);
    let mut q = generate_prime(q_bits, rng);
    while q == p {
        q = generate_prime(q_bits, rng);
    }

    let n = p * q;
    let phi = (p - 1) * (q - 1);

    let mut e = DEFAULT_PUBLIC_EXPONENT;
    while gcd(e, phi) != 1 {
        e = rng.gen_range(3..phi);
    }
    // gcd(e, phi) == 1 guarantees the inverse exists.
    let d = mod_inverse(e, phi).unwrap_or(0);
    debug_assert_eq!(mul_mod(e, d, phi), 1 % phi);

    Ok(KeyPair {
        public: PublicKey { e, n },
        private: PrivateKey { d, n },
        p,
        q,
        phi,
    })
}

/// Random probably-prime number of exactly `bits` bits.
fn generate_prime(bits: u32, rng: &mut impl Rng) -> u64 {
    loop {
        let mut candidate = rng.gen::<u64>();
        if bits < 64 {
            candidate &= (1u64 << bits) - 1;
        }
        // Force exact bit length and oddness.
        candidate |= (1u64 << (bits - 1)) | 1;
        if is_probable_prime(candidate, DEFAULT_MILLER_RABIN_ROUNDS, rng) {
            return candidate;
        }
    }
}

/// Miller-Rabin probabilistic primality test.
pub fn is_probable_prime(n: u64, rounds: u32, rng: &mut impl Rng) -> bool {
    if n == 2 || n == 3 {
        return true;
    }
    if n < 2 || n % 2 == 0 {
        return false;
    }

    // n - 1 = 2^r * d with d odd.
    let mut d = n - 1;
    let mut r = 0u32;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }

    'witness: for _ in 0..rounds {
        let a = rng.gen_range(2..n - 1);
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 0..r - 1 {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Modular inverse of `a` mod `m` via the extended Euclidean algorithm.
/// `None` when `gcd(a, m) != 1`.
pub fn mod_inverse(a: u64, m: u64) -> Option<u64> {
    if m == 0 {
        return None;
    }
    let (mut old_r, mut r) = (a as i128, m as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let quotient = old_r / r;
        (old_r, r) = (r, old_r - quotient * r);
        (old_s, s) = (s, old_s - quotient * s);
    }
    if old_r != 1 {
        return None;
    }
    Some(old_s.rem_euclid(m as i128) as u64)
}

pub fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    (a as u128 * b as u128 % m as u128) as u64
}

pub fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    if m == 1 {
        return 0;
    }
    let mut result = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

fn bit_length(n: u64) -> u32 {
    64 - n.leading_zeros()
}

pub struct ModularCipher;

impl ModularCipher {
    /// Bytes per plaintext block: one less than the modulus byte width so
    /// every block integer is strictly below `n`. Never less than 1.
    fn block_size(n: u64) -> usize {
        let key_bytes = (bit_length(n) as usize + 7) / 8;
        key_bytes.saturating_sub(1).max(1)
    }

    /// Chunk the UTF-8 bytes of `plaintext` into blocks, interpret each as
    /// a big-endian integer and raise it to `e` mod `n`.
    pub fn encrypt(plaintext: &str, key: &PublicKey) -> Vec<u64> {
        let block_size = Self::block_size(key.n);
        plaintext
            .as_bytes()
            .chunks(block_size)
            .map(|block| {
                let value = block.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
                pow_mod(value, key.e, key.n)
            })
            .collect()
    }

    /// Reverse of [`ModularCipher::encrypt`] via the private exponent.
    ///
    /// Each recovered integer is re-expanded to its minimal big-endian
    /// byte width, so plaintext blocks with leading zero bytes come back
    /// shortened. Textbook block coding has no padding to preserve them;
    /// this is a documented limitation, not a bug. Blocks that cannot be
    /// valid ciphertext (`c >= n`) are skipped rather than aborting the
    /// whole message.
    pub fn decrypt(blocks: &[u64], key: &PrivateKey) -> String {
        let mut bytes = Vec::with_capacity(blocks.len() * Self::block_size(key.n));
        for &block in blocks {
            if block >= key.n {
                debug!(block, n = key.n, "skipping malformed ciphertext block");
                continue;
            }
            let value = pow_mod(block, key.d, key.n);
            let width = ((bit_length(value) as usize + 7) / 8).max(1);
            bytes.extend_from_slice(&value.to_be_bytes()[8 - width..]);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FactorError {
    /// Factoring beyond 64 bits needs general-number-field-sieve class
    /// machinery; refusing is a capability boundary, not a missing
    /// feature.
    #[error("modulus of {bits} bits exceeds the 64-bit factorization ceiling")]
    ModulusTooLarge { bits: u32 },
    #[error("no factor found after {attempts} Pollard rho attempts")]
    NoFactorFound { attempts: u32 },
    #[error("public exponent is not invertible modulo phi")]
    NotInvertible,
}

/// Private key material recovered from a public key by factorization.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RecoveredKey {
    pub p: u64,
    pub q: u64,
    pub phi: u64,
    pub d: u64,
    pub private: PrivateKey,
}

#[derive(Clone, Debug)]
pub struct FactorizationAttacker {
    /// Restarts with fresh parameters when Pollard's rho degenerates.
    pub rho_retries: u32,
    /// Iteration budget per rho attempt.
    pub rho_max_iterations: u64,
}

impl Default for FactorizationAttacker {
    fn default() -> Self {
        Self {
            rho_retries: 16,
            rho_max_iterations: 1 << 22,
        }
    }
}

impl FactorizationAttacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared strategy ceiling. Moduli in this crate are `u64` and can
    /// never exceed it; callers sizing keys from external material check
    /// here before narrowing.
    pub fn check_capability(bits: u32) -> Result<(), FactorError> {
        if bits > 64 {
            return Err(FactorError::ModulusTooLarge { bits });
        }
        Ok(())
    }

    /// Recover the private key from a public key by factoring `n`.
    ///
    /// Strategy by modulus size: trial division up to `sqrt(n)` for at
    /// most 32 bits, Pollard's rho for at most 64 bits. The derivation of
    /// `d` is exactly the keygen derivation, and `d` is unique modulo
    /// `phi`, so a successful attack reproduces the generated key.
    pub fn attack(&self, key: &PublicKey, rng: &mut impl Rng) -> Result<RecoveredKey, FactorError> {
        let bits = bit_length(key.n);
        let p = if bits <= 32 {
            debug!(n = key.n, bits, "factorizing by trial division");
            self.trial_division(key.n)?
        } else {
            debug!(n = key.n, bits, "factorizing by Pollard's rho");
            self.pollard_rho(key.n, rng)?
        };

        let q = key.n / p;
        let phi = (p - 1) * (q - 1);
        let d = mod_inverse(key.e, phi).ok_or(FactorError::NotInvertible)?;
        debug!(p, q, d, "factorization succeeded");

        Ok(RecoveredKey {
            p,
            q,
            phi,
            d,
            private: PrivateKey { d, n: key.n },
        })
    }

    fn trial_division(&self, n: u64) -> Result<u64, FactorError> {
        if n % 2 == 0 {
            return Ok(2);
        }
        let mut i = 3u64;
        while i.saturating_mul(i) <= n {
            if n % i == 0 {
                return Ok(i);
            }
            i += 2;
        }
        // n prime (or 1): no non-trivial factor exists.
        Err(FactorError::NoFactorFound { attempts: 0 })
    }

    /// Iterative Pollard's rho with bounded restarts. The recursive
    /// retry-on-degenerate-cycle formulation risks unbounded depth;
    /// restarting in a loop with fresh `x`/`c` is equivalent and bounded.
    fn pollard_rho(&self, n: u64, rng: &mut impl Rng) -> Result<u64, FactorError> {
        if n % 2 == 0 {
            return Ok(2);
        }

        for _ in 0..self.rho_retries {
            let mut x = rng.gen_range(2..n);
            let mut y = x;
            let c = rng.gen_range(1..n);

            let step = |v: u64| (mul_mod(v, v, n) + c) % n;
            let mut iterations = 0u64;
            loop {
                x = step(x);
                y = step(step(y));
                let g = gcd(x.abs_diff(y), n);
                if g == n {
                    break; // degenerate cycle, restart with new parameters
                }
                if g > 1 {
                    return Ok(g);
                }
                iterations += 1;
                if iterations >= self.rho_max_iterations {
                    break;
                }
            }
        }
        Err(FactorError::NoFactorFound {
            attempts: self.rho_retries,
        })
    }
}

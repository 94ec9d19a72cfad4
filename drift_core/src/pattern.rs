//! The "PATTERN" Encoder - order-independent combination keys.
//!
//! An unordered multiset of 2 to 5 tokens is reduced to a stable lookup key:
//! tokens are sorted, joined with a unit separator, hashed with FNV-1a 64 and
//! prefixed with the token count so that different arities never alias.

use crate::error::DriftError;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Smallest accepted combination.
pub const MIN_ARITY: usize = 2;

/// Largest accepted combination.
pub const MAX_ARITY: usize = 5;

/// Joins sorted tokens; keeps "ab"+"c" apart from "a"+"bc".
const TOKEN_SEPARATOR: u8 = 0x1f;

/// A deterministic FNV-1a 64-bit hasher.
///
/// Output is stable across processes; keys are persisted in snapshots.
#[derive(Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// Canonical, order-independent key for a token multiset.
///
/// Format: `pattern_<count>_<16 hex digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternKey(String);

impl PatternKey {
    /// Encodes a token multiset.
    ///
    /// Fails with [`DriftError::InvalidArity`] unless `2 <= len <= 5`.
    pub fn encode<S: AsRef<str>>(tokens: &[S]) -> Result<Self, DriftError> {
        let count = tokens.len();
        if !(MIN_ARITY..=MAX_ARITY).contains(&count) {
            return Err(DriftError::InvalidArity { given: count });
        }

        let mut sorted: Vec<&str> = tokens.iter().map(|t| t.as_ref()).collect();
        sorted.sort_unstable();

        let mut hasher = FnvHasher::new();
        for (i, token) in sorted.iter().enumerate() {
            if i > 0 {
                hasher.write_u8(TOKEN_SEPARATOR);
            }
            hasher.write(token.as_bytes());
        }

        Ok(Self(format!("pattern_{}_{:016x}", count, hasher.finish())))
    }

    /// Token count embedded in the key.
    pub fn arity(&self) -> Option<usize> {
        self.0.split('_').nth(1)?.parse().ok()
    }

    /// Returns the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatternKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_permutation_invariance() {
        let a = PatternKey::encode(&["▲", "⊗", "≈"]).unwrap();
        let b = PatternKey::encode(&["≈", "▲", "⊗"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.arity(), Some(3));
        assert!(a.as_str().starts_with("pattern_3_"));
    }

    #[test]
    fn test_multiplicity_matters() {
        let single = PatternKey::encode(&["▲", "⊗"]).unwrap();
        let doubled = PatternKey::encode(&["▲", "▲", "⊗"]).unwrap();
        let other = PatternKey::encode(&["▲", "▲", "⊗", "⊗"]).unwrap();
        assert_ne!(single, doubled);
        assert_ne!(doubled, other);
    }

    #[test]
    fn test_separator_prevents_concatenation_alias() {
        let a = PatternKey::encode(&["ab", "c"]).unwrap();
        let b = PatternKey::encode(&["a", "bc"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_arity() {
        assert!(matches!(
            PatternKey::encode(&["▲"]),
            Err(DriftError::InvalidArity { given: 1 })
        ));
        assert!(matches!(
            PatternKey::encode(&["a", "b", "c", "d", "e", "f"]),
            Err(DriftError::InvalidArity { given: 6 })
        ));
        let empty: [&str; 0] = [];
        assert!(PatternKey::encode(&empty).is_err());
    }

    #[test]
    fn test_fnv_reference_vector() {
        // FNV-1a 64 of "a"
        let mut hasher = FnvHasher::new();
        hasher.write(b"a");
        assert_eq!(hasher.finish(), 0xaf63dc4c8601ec8c);
    }

    proptest! {
        #[test]
        fn prop_key_ignores_order(
            tokens in proptest::collection::vec("[a-e]{1,3}", 2..=5),
            seed in any::<u64>(),
        ) {
            use rand::seq::SliceRandom;
            use rand::SeedableRng;

            let mut shuffled = tokens.clone();
            let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
            shuffled.shuffle(&mut rng);

            prop_assert_eq!(
                PatternKey::encode(&tokens).unwrap(),
                PatternKey::encode(&shuffled).unwrap()
            );
        }

        #[test]
        fn prop_distinct_multisets_differ(
            a in proptest::collection::vec("[a-e]{1,3}", 2..=5),
            b in proptest::collection::vec("[a-e]{1,3}", 2..=5),
        ) {
            let mut sa = a.clone();
            let mut sb = b.clone();
            sa.sort();
            sb.sort();
            prop_assume!(sa != sb);
            prop_assert_ne!(PatternKey::encode(&a).unwrap(), PatternKey::encode(&b).unwrap());
        }
    }
}

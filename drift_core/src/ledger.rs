//! Resource ledger: time-salt and identity fragments.

use crate::error::DriftError;
use serde::{Deserialize, Serialize};

/// Signed change to both counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDelta {
    pub time_salt: i64,
    pub fragments: i64,
}

impl ResourceDelta {
    pub fn new(time_salt: i64, fragments: i64) -> Self {
        Self {
            time_salt,
            fragments,
        }
    }

    /// Component-wise sum.
    pub fn combine(self, other: ResourceDelta) -> Self {
        Self {
            time_salt: self.time_salt + other.time_salt,
            fragments: self.fragments + other.fragments,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.time_salt == 0 && self.fragments == 0
    }
}

/// The two non-negative counters owned by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    pub time_salt: u64,
    pub identity_fragments: u64,
}

fn adjusted(resource: &'static str, available: u64, delta: i64) -> Result<u64, DriftError> {
    if delta >= 0 {
        Ok(available.saturating_add(delta as u64))
    } else {
        let required = delta.unsigned_abs();
        available
            .checked_sub(required)
            .ok_or(DriftError::InsufficientResource {
                resource,
                required,
                available,
            })
    }
}

impl ResourceLedger {
    pub fn new(time_salt: u64, identity_fragments: u64) -> Self {
        Self {
            time_salt,
            identity_fragments,
        }
    }

    /// Applies a delta to both counters, or to neither.
    ///
    /// A debit larger than the balance fails with
    /// [`DriftError::InsufficientResource`] and leaves the ledger untouched.
    pub fn apply(&mut self, delta: ResourceDelta) -> Result<(), DriftError> {
        let time_salt = adjusted("time_salt", self.time_salt, delta.time_salt)?;
        let identity_fragments =
            adjusted("identity_fragments", self.identity_fragments, delta.fragments)?;

        self.time_salt = time_salt;
        self.identity_fragments = identity_fragments;
        Ok(())
    }

    /// Credits both counters. Credits cannot fail.
    pub fn credit(&mut self, time_salt: u64, fragments: u64) {
        self.time_salt = self.time_salt.saturating_add(time_salt);
        self.identity_fragments = self.identity_fragments.saturating_add(fragments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_from_zero() {
        let mut ledger = ResourceLedger::default();
        ledger.credit(3, 2);
        assert_eq!(ledger, ResourceLedger::new(3, 2));
    }

    #[test]
    fn test_debit_is_all_or_nothing() {
        let mut ledger = ResourceLedger::new(10, 1);

        let err = ledger.apply(ResourceDelta::new(-5, -2)).unwrap_err();
        assert!(matches!(
            err,
            DriftError::InsufficientResource {
                resource: "identity_fragments",
                required: 2,
                available: 1
            }
        ));
        // time_salt would have been affordable but must not move
        assert_eq!(ledger, ResourceLedger::new(10, 1));

        ledger.apply(ResourceDelta::new(-10, 4)).unwrap();
        assert_eq!(ledger, ResourceLedger::new(0, 5));
    }

    #[test]
    fn test_delta_combine() {
        let total = ResourceDelta::new(2, 1).combine(ResourceDelta::new(-1, 3));
        assert_eq!(total, ResourceDelta::new(1, 4));
        assert!(ResourceDelta::default().is_zero());
    }
}

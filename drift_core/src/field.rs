//! The "ENTROPY" Field - bounded scalar state with a random-walk update.
//!
//! The field is a small vector of clamped scalars: one global flux, one
//! resonance per zone, one harmonic per symbol, a signed temporal distortion
//! and a volatility. `tick` perturbs every scalar independently and clamps;
//! lifecycle operations nudge the flux through [`EntropyField::apply_shift`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Range of every unit scalar.
pub const UNIT_RANGE: RangeInclusive<f64> = 0.0..=1.0;

/// Range of the temporal distortion.
pub const SIGNED_RANGE: RangeInclusive<f64> = -1.0..=1.0;

/// Flux value restored by a memory wipe.
pub const FLUX_MIDPOINT: f64 = 0.5;

/// Per-tick perturbation magnitudes (uniform in `[-m, m]`).
#[derive(Debug, Clone, Copy)]
pub struct TickMagnitudes {
    pub global_flux: f64,
    pub zone_resonance: f64,
    pub symbol_harmonic: f64,
    pub temporal_distortion: f64,
    pub volatility: f64,
}

impl Default for TickMagnitudes {
    fn default() -> Self {
        Self {
            global_flux: 0.05,
            zone_resonance: 0.02,
            symbol_harmonic: 0.03,
            temporal_distortion: 0.01,
            volatility: 0.1,
        }
    }
}

/// How a lifecycle operation moves the global flux.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FluxShift {
    /// Multiply (fork: 1.05, collapse: 0.95)
    Scale(f64),
    /// Replace (memory wipe: 0.5)
    Set(f64),
    /// Add a signed offset
    Offset(f64),
}

/// The process-wide entropy field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyField {
    /// Global flux in [0, 1]
    pub global_flux: f64,

    /// Per-zone resonance in [0, 1]
    pub zone_resonance: BTreeMap<String, f64>,

    /// Per-symbol harmonic in [0, 1]
    pub symbol_harmonic: BTreeMap<String, f64>,

    /// Temporal distortion in [-1, 1]
    pub temporal_distortion: f64,

    /// Volatility in [0, 1]
    pub volatility: f64,
}

fn clamp_to(value: f64, range: &RangeInclusive<f64>) -> f64 {
    if value.is_nan() {
        return *range.start();
    }
    value.clamp(*range.start(), *range.end())
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, magnitude: f64) -> f64 {
    if magnitude <= 0.0 {
        0.0
    } else {
        rng.gen_range(-magnitude..=magnitude)
    }
}

impl EntropyField {
    /// Seeds a new field.
    ///
    /// Flux starts in [0.3, 0.7], zones and symbols anywhere in [0, 1],
    /// volatility in [0.1, 0.9] and temporal distortion at 0.
    pub fn initialize<Z, S, R>(zones: &[Z], symbols: &[S], rng: &mut R) -> Self
    where
        Z: AsRef<str>,
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let global_flux = rng.gen_range(0.3..=0.7);
        let zone_resonance = zones
            .iter()
            .map(|z| (z.as_ref().to_string(), rng.gen_range(0.0..=1.0)))
            .collect();
        let symbol_harmonic = symbols
            .iter()
            .map(|s| (s.as_ref().to_string(), rng.gen_range(0.0..=1.0)))
            .collect();
        let volatility = rng.gen_range(0.1..=0.9);

        Self {
            global_flux,
            zone_resonance,
            symbol_harmonic,
            temporal_distortion: 0.0,
            volatility,
        }
    }

    /// One bounded random-walk step over every scalar.
    ///
    /// The next state is built in full before it replaces the current one.
    pub fn tick<R: Rng + ?Sized>(&mut self, magnitudes: &TickMagnitudes, rng: &mut R) {
        let global_flux = clamp_to(
            self.global_flux + jitter(rng, magnitudes.global_flux),
            &UNIT_RANGE,
        );
        let zone_resonance = self
            .zone_resonance
            .iter()
            .map(|(zone, value)| {
                let next = value + jitter(rng, magnitudes.zone_resonance);
                (zone.clone(), clamp_to(next, &UNIT_RANGE))
            })
            .collect();
        let symbol_harmonic = self
            .symbol_harmonic
            .iter()
            .map(|(symbol, value)| {
                let next = value + jitter(rng, magnitudes.symbol_harmonic);
                (symbol.clone(), clamp_to(next, &UNIT_RANGE))
            })
            .collect();
        let temporal_distortion = clamp_to(
            self.temporal_distortion + jitter(rng, magnitudes.temporal_distortion),
            &SIGNED_RANGE,
        );
        let volatility = clamp_to(
            self.volatility + jitter(rng, magnitudes.volatility),
            &UNIT_RANGE,
        );

        *self = Self {
            global_flux,
            zone_resonance,
            symbol_harmonic,
            temporal_distortion,
            volatility,
        };
    }

    /// Moves the global flux, always followed by a clamp.
    pub fn apply_shift(&mut self, shift: FluxShift) {
        let next = match shift {
            FluxShift::Scale(factor) => self.global_flux * factor,
            FluxShift::Set(value) => value,
            FluxShift::Offset(delta) => self.global_flux + delta,
        };
        self.global_flux = clamp_to(next, &UNIT_RANGE);
    }

    /// Harmonic of a symbol, 0.5 when the symbol is not tracked.
    pub fn harmonic(&self, symbol: &str) -> f64 {
        self.symbol_harmonic.get(symbol).copied().unwrap_or(0.5)
    }

    /// Returns a description of the first out-of-range scalar, if any.
    pub fn bounds_violation(&self) -> Option<String> {
        let unit = |v: f64| UNIT_RANGE.contains(&v);

        if !unit(self.global_flux) {
            return Some(format!("global_flux {} outside [0, 1]", self.global_flux));
        }
        if !SIGNED_RANGE.contains(&self.temporal_distortion) {
            return Some(format!(
                "temporal_distortion {} outside [-1, 1]",
                self.temporal_distortion
            ));
        }
        if !unit(self.volatility) {
            return Some(format!("volatility {} outside [0, 1]", self.volatility));
        }
        if let Some((zone, v)) = self.zone_resonance.iter().find(|(_, v)| !unit(**v)) {
            return Some(format!("zone_resonance[{}] {} outside [0, 1]", zone, v));
        }
        if let Some((symbol, v)) = self.symbol_harmonic.iter().find(|(_, v)| !unit(**v)) {
            return Some(format!("symbol_harmonic[{}] {} outside [0, 1]", symbol, v));
        }
        None
    }

    /// True when every scalar is inside its declared range.
    pub fn is_within_bounds(&self) -> bool {
        self.bounds_violation().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn seeded_field(seed: u64) -> (EntropyField, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let field = EntropyField::initialize(&["void_nexus", "crystal_sanctum"], &["▲", "⊗", "≈"], &mut rng);
        (field, rng)
    }

    #[test]
    fn test_initialize_ranges() {
        let (field, _) = seeded_field(42);

        assert!((0.3..=0.7).contains(&field.global_flux));
        assert!((0.1..=0.9).contains(&field.volatility));
        assert_eq!(field.temporal_distortion, 0.0);
        assert_eq!(field.zone_resonance.len(), 2);
        assert_eq!(field.symbol_harmonic.len(), 3);
        assert!(field.is_within_bounds());
    }

    #[test]
    fn test_tick_keeps_keys_and_bounds() {
        let (mut field, mut rng) = seeded_field(7);

        for _ in 0..10_000 {
            field.tick(&TickMagnitudes::default(), &mut rng);
            assert!(field.is_within_bounds(), "{:?}", field.bounds_violation());
        }
        assert_eq!(field.zone_resonance.len(), 2);
        assert_eq!(field.symbol_harmonic.len(), 3);
    }

    #[test]
    fn test_tick_clamps_oversized_perturbation() {
        let (mut field, mut rng) = seeded_field(3);
        let wild = TickMagnitudes {
            global_flux: 50.0,
            zone_resonance: 50.0,
            symbol_harmonic: 50.0,
            temporal_distortion: 50.0,
            volatility: 50.0,
        };

        for _ in 0..1_000 {
            field.tick(&wild, &mut rng);
            assert!(field.is_within_bounds());
        }
    }

    #[test]
    fn test_apply_shift() {
        let (mut field, _) = seeded_field(1);

        field.apply_shift(FluxShift::Set(0.6));
        field.apply_shift(FluxShift::Scale(1.05));
        assert_relative_eq!(field.global_flux, 0.63, epsilon = 1e-12);

        field.apply_shift(FluxShift::Scale(0.95));
        assert_relative_eq!(field.global_flux, 0.5985, epsilon = 1e-12);

        field.apply_shift(FluxShift::Set(0.99));
        field.apply_shift(FluxShift::Scale(1.05));
        assert_eq!(field.global_flux, 1.0);

        field.apply_shift(FluxShift::Offset(-3.0));
        assert_eq!(field.global_flux, 0.0);

        field.apply_shift(FluxShift::Set(FLUX_MIDPOINT));
        assert_eq!(field.global_flux, 0.5);
    }

    #[test]
    fn test_bounds_violation_reports_field() {
        let (mut field, _) = seeded_field(9);
        field.temporal_distortion = -1.5;
        assert!(field.bounds_violation().unwrap().contains("temporal_distortion"));
    }

    proptest! {
        #[test]
        fn prop_shift_always_clamped(factor in -10.0f64..10.0, start in 0.0f64..=1.0) {
            let (mut field, _) = seeded_field(11);
            field.apply_shift(FluxShift::Set(start));
            field.apply_shift(FluxShift::Scale(factor));
            prop_assert!(UNIT_RANGE.contains(&field.global_flux));
        }
    }
}

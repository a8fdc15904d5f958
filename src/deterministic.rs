//! Deterministic test-vector generation.
//!
//! Every client of the parity protocol feeds its engine the same input, so the
//! generator below must produce the same sequence bit for bit everywhere:
//!
//! ```text
//! state = state * 1664525 + 1013904223   (mod 2^32)
//! value = state / 0xFFFFFFFF             (then rounded to 6 decimals)
//! ```
//!
//! The divisor is pinned to `2^32 - 1`. Dividing by `2^32` instead shifts every
//! value by roughly `1e-10`, enough to break bit-for-bit agreement between
//! clients.

use serde::Serialize;
use serde_json::Value;

/// LCG multiplier.
pub const LCG_MULTIPLIER: u32 = 1_664_525;
/// LCG increment.
pub const LCG_INCREMENT: u32 = 1_013_904_223;
/// Canonical normalization divisor (`0xFFFFFFFF`).
pub const LCG_NORMALIZER: f64 = u32::MAX as f64;
/// Seed used for the fixed benchmark input.
pub const DEFAULT_SEED: u32 = 123;

/// 32-bit linear congruential generator shared by input generation and the
/// bundled engine's weight initialization.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advance the state and return it.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state
    }

    /// Next value in `[0, 1]`, normalized by `0xFFFFFFFF`.
    pub fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u32()) / LCG_NORMALIZER
    }
}

/// Round to 6 decimal digits, half away from zero.
pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// A reproducible input vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeterministicVector {
    seed: u32,
    values: Vec<f64>,
}

impl DeterministicVector {
    /// Generate `length` values from `seed`, rounded to 6 decimals as they
    /// are when serialized for the engine.
    pub fn generate(seed: u32, length: usize) -> Self {
        Self::generate_with_rounding(seed, length, true)
    }

    /// Generate `length` values, optionally skipping the 6-decimal rounding.
    pub fn generate_with_rounding(seed: u32, length: usize, round: bool) -> Self {
        let mut lcg = Lcg::new(seed);
        let values = (0..length)
            .map(|_| {
                let v = lcg.next_unit();
                if round { round6(v) } else { v }
            })
            .collect();
        Self { seed, values }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Wire form consumed by the engine: one row holding the whole vector.
    pub fn to_wire(&self) -> Value {
        Value::from(vec![self.values.clone()])
    }

    /// Wire form for 2-D inputs: `values.len() / width` rows of `width`.
    ///
    /// A trailing partial row is kept so no value is dropped.
    pub fn to_wire_rows(&self, width: usize) -> Value {
        if width == 0 {
            return self.to_wire();
        }
        let rows: Vec<Vec<f64>> = self.values.chunks(width).map(<[f64]>::to_vec).collect();
        Value::from(rows)
    }
}

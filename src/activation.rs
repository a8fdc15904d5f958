//! Activation kinds used by network topologies.
//!
//! The wire names are the lowercase tags the engine contract expects
//! (`"linear"`, `"relu"`, `"softmax"`, ...). Each kind can also be applied to
//! f32 values so the bundled engine shares one definition with the harness.

use serde::{Deserialize, Serialize};

/// Activation tag attached to every layer of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Identity: f(x) = x.
    Linear,
    /// Rectified Linear Unit: f(x) = max(0, x).
    Relu,
    /// Sigmoid: f(x) = 1 / (1 + exp(-x)).
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
    /// Numerically stable softmax across the whole layer:
    ///
    /// ```text
    /// Softmax(x_i) = exp(x_i - max(x)) / sum_j exp(x_j - max(x))
    /// ```
    Softmax,
}

impl Activation {
    /// Lowercase wire name of this activation.
    pub fn name(self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
        }
    }

    /// Get activation by wire name (case-insensitive).
    pub fn get_by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Some(Activation::Linear),
            "relu" => Some(Activation::Relu),
            "sigmoid" => Some(Activation::Sigmoid),
            "tanh" => Some(Activation::Tanh),
            "softmax" => Some(Activation::Softmax),
            _ => None,
        }
    }

    /// Whether the activation couples all values of a layer.
    pub fn is_vector_wide(self) -> bool {
        matches!(self, Activation::Softmax)
    }

    /// Apply the activation function to a single value.
    ///
    /// Softmax has no scalar form; it is treated as identity here and must be
    /// applied through [`Activation::apply_in_place`].
    pub fn apply_single(self, x: f32) -> f32 {
        match self {
            Activation::Linear | Activation::Softmax => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }

    /// Apply the activation function to a slice of values in place.
    pub fn apply_in_place(self, values: &mut [f32]) {
        match self {
            Activation::Softmax => {
                if values.is_empty() {
                    return;
                }
                let max_val = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                let mut sum = 0.0f32;

                for val in values.iter_mut() {
                    *val = (*val - max_val).exp();
                    sum += *val;
                }

                for val in values.iter_mut() {
                    *val /= sum;
                }
            }
            Activation::Linear => {}
            _ => {
                for val in values.iter_mut() {
                    *val = self.apply_single(*val);
                }
            }
        }
    }

    /// Numeric id used by the accelerated dense-layer shader.
    ///
    /// Softmax maps to linear: the shader emits logits and the host normalizes.
    pub(crate) fn shader_id(self) -> u32 {
        match self {
            Activation::Linear | Activation::Softmax => 0,
            Activation::Relu => 1,
            Activation::Sigmoid => 2,
            Activation::Tanh => 3,
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

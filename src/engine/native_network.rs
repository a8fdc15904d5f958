//! Bundled dense-network engine.
//!
//! A small multilayer perceptron with two execution paths: a scalar f32
//! reference path on the host and an optional wgpu compute path. Both paths
//! read the same weights, accumulate in the same order and normalize softmax
//! heads on the host, so their outputs are expected to agree to within float
//! rounding of the device.

use crate::activation::Activation;
use crate::deterministic::Lcg;
use crate::engine::gpu::{AcceleratorOptions, GpuAccelerator};
use crate::engine::{ACCELERATED_FEATURE, EngineHandle, NetworkEngine, SET_ACCELERATED_METHOD};
use crate::errors::{EngineError, EngineResult};
use crate::topology::LayerShape;
use crate::utils::flatten_numbers_f32;
use log::{debug, info, warn};
use serde_json::{Value, json};

/// Seed used for weight initialization when none is configured.
pub const DEFAULT_WEIGHT_SEED: u32 = 1;

/// One fully connected layer, weights stored row-major (`output_size x input_size`).
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    pub input_size: usize,
    pub output_size: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Glorot-uniform weights drawn from an LCG seeded with `seed`, zero bias.
    pub fn glorot(input_size: usize, output_size: usize, activation: Activation, seed: u32) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        let mut lcg = Lcg::new(seed);
        let weights = (0..input_size * output_size)
            .map(|_| ((2.0 * lcg.next_unit() - 1.0) * limit) as f32)
            .collect();
        Self {
            input_size,
            output_size,
            weights,
            bias: vec![0.0; output_size],
            activation,
        }
    }

    /// Reference forward pass.
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut output: Vec<f32> = self
            .weights
            .chunks_exact(self.input_size)
            .zip(&self.bias)
            .map(|(row, &bias)| {
                let mut sum = bias;
                for (x, w) in input.iter().zip(row) {
                    sum += x * w;
                }
                sum
            })
            .collect();
        self.activation.apply_in_place(&mut output);
        output
    }

    fn perturb(&mut self, amplitude: f32, lcg: &mut Lcg) {
        for value in self.weights.iter_mut().chain(self.bias.iter_mut()) {
            *value += amplitude * (2.0 * lcg.next_unit() as f32 - 1.0);
        }
    }
}

/// Factory for [`NativeNetwork`] handles.
#[derive(Debug, Clone)]
pub struct NativeEngine {
    weight_seed: u32,
    options: AcceleratorOptions,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self {
            weight_seed: DEFAULT_WEIGHT_SEED,
            options: AcceleratorOptions::default(),
        }
    }
}

impl NativeEngine {
    pub fn new(options: AcceleratorOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_weight_seed(mut self, seed: u32) -> Self {
        self.weight_seed = seed;
        self
    }

    pub fn options(&self) -> &AcceleratorOptions {
        &self.options
    }

    /// Build a concrete network; [`NetworkEngine::create`] boxes this.
    pub fn build(
        &self,
        layers: &Value,
        activations: &Value,
        trainable: &Value,
    ) -> EngineResult<NativeNetwork> {
        let shapes: Vec<LayerShape> = serde_json::from_value(layers.clone())
            .map_err(|e| EngineError::invalid_wire("layers", e.to_string()))?;
        let names: Vec<String> = serde_json::from_value(activations.clone())
            .map_err(|e| EngineError::invalid_wire("activations", e.to_string()))?;
        let trainable: Vec<bool> = serde_json::from_value(trainable.clone())
            .map_err(|e| EngineError::invalid_wire("trainable", e.to_string()))?;

        if shapes.len() < 2 {
            return Err(EngineError::invalid_wire(
                "layers",
                format!("need at least 2 layers, got {}", shapes.len()),
            ));
        }
        if names.len() != shapes.len() || trainable.len() != shapes.len() {
            return Err(EngineError::invalid_wire(
                "activations",
                format!(
                    "expected {} activations and trainable flags, got {} and {}",
                    shapes.len(),
                    names.len(),
                    trainable.len()
                ),
            ));
        }
        if let Some(index) = shapes.iter().position(|s| s.size() == 0) {
            return Err(EngineError::invalid_wire(
                "layers",
                format!("layer {index} has zero size"),
            ));
        }

        let activations = names
            .iter()
            .map(|name| {
                Activation::get_by_name(name).ok_or_else(|| {
                    EngineError::invalid_wire("activations", format!("unknown activation '{name}'"))
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let dense = shapes
            .windows(2)
            .zip(&activations[1..])
            .enumerate()
            .map(|(index, (pair, &activation))| {
                DenseLayer::glorot(
                    pair[0].size(),
                    pair[1].size(),
                    activation,
                    self.weight_seed.wrapping_add(index as u32),
                )
            })
            .collect();

        debug!(
            "Built native network with {} dense layers (input {})",
            shapes.len() - 1,
            shapes[0].size()
        );

        Ok(NativeNetwork {
            input_activation: activations[0],
            layers: dense,
            trainable: trainable[1..].to_vec(),
            options: self.options.clone(),
            accelerated: false,
            accelerator: None,
            last_output: None,
        })
    }
}

impl NetworkEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn create(
        &self,
        layers: &Value,
        activations: &Value,
        trainable: &Value,
    ) -> EngineResult<Box<dyn EngineHandle>> {
        Ok(Box::new(self.build(layers, activations, trainable)?))
    }
}

/// A live network with an optional accelerated backend.
#[derive(Debug)]
pub struct NativeNetwork {
    input_activation: Activation,
    layers: Vec<DenseLayer>,
    /// One flag per dense layer; frozen layers are skipped by perturbation.
    trainable: Vec<bool>,
    options: AcceleratorOptions,
    accelerated: bool,
    accelerator: Option<GpuAccelerator>,
    last_output: Option<Vec<f32>>,
}

impl NativeNetwork {
    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.input_size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.output_size)
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Whether the accelerated flag is set.
    pub fn accelerated_requested(&self) -> bool {
        self.accelerated
    }

    /// Whether forward passes currently run on the device.
    pub fn accelerated_active(&self) -> bool {
        self.accelerated && self.accelerator.is_some()
    }

    /// Forward pass on an already flattened input.
    pub fn predict(&self, input: &[f32]) -> EngineResult<Vec<f32>> {
        if input.len() != self.input_size() {
            return Err(EngineError::InputSizeMismatch {
                expected: self.input_size(),
                actual: input.len(),
            });
        }
        let mut x = input.to_vec();
        self.input_activation.apply_in_place(&mut x);

        match (&self.accelerator, self.accelerated) {
            (Some(accelerator), true) => {
                let mut output = accelerator.run(&x)?;
                if let Some(last) = self.layers.last() {
                    if last.activation.is_vector_wide() {
                        last.activation.apply_in_place(&mut output);
                    }
                }
                Ok(output)
            }
            _ => Ok(self.layers.iter().fold(x, |acc, layer| layer.forward(&acc))),
        }
    }

    fn toggle_from_object(&mut self, field: &str, payload: &Value) -> EngineResult<()> {
        match payload.get(ACCELERATED_FEATURE).and_then(Value::as_bool) {
            Some(enabled) => self.set_accelerated(enabled),
            None => Err(EngineError::invalid_wire(
                field,
                format!("expected an object with a boolean '{ACCELERATED_FEATURE}'"),
            )),
        }
    }
}

fn bool_arg(args: &Value) -> Option<bool> {
    match args {
        Value::Bool(b) => Some(*b),
        Value::Array(items) => items.first().and_then(Value::as_bool),
        _ => None,
    }
}

impl EngineHandle for NativeNetwork {
    fn forward(&mut self, input: &Value) -> EngineResult<()> {
        let values = flatten_numbers_f32(input);
        let output = self.predict(&values)?;
        self.last_output = Some(output);
        Ok(())
    }

    fn extract_output(&mut self) -> EngineResult<Value> {
        let output = self.last_output.as_ref().ok_or(EngineError::OutputNotReady)?;
        let row: Vec<f64> = output.iter().map(|&v| f64::from(v)).collect();
        Ok(json!([row]))
    }

    fn perturb_weights(&mut self, amplitude: f64, seed: u32) -> EngineResult<()> {
        let mut lcg = Lcg::new(seed);
        let amplitude = amplitude as f32;
        for (layer, &trainable) in self.layers.iter_mut().zip(&self.trainable) {
            if trainable {
                layer.perturb(amplitude, &mut lcg);
            }
        }
        if let Some(accelerator) = &self.accelerator {
            accelerator.upload_weights(&self.layers);
        }
        Ok(())
    }

    fn initialize_accelerated_backend(&mut self) -> EngineResult<Value> {
        if let Some(accelerator) = &self.accelerator {
            return Ok(accelerator.descriptor());
        }
        match GpuAccelerator::new(&self.options, &self.layers)? {
            Some(accelerator) => {
                let descriptor = accelerator.descriptor();
                info!("Accelerated backend initialized: {descriptor}");
                self.accelerator = Some(accelerator);
                Ok(descriptor)
            }
            None => {
                warn!("No compute-capable adapter available");
                Ok(Value::from("unavailable"))
            }
        }
    }

    fn cleanup_accelerated_backend(&mut self) -> EngineResult<()> {
        if self.accelerator.take().is_some() {
            debug!("Accelerated backend released");
        }
        Ok(())
    }

    fn set_accelerated(&mut self, enabled: bool) -> EngineResult<()> {
        self.accelerated = enabled;
        Ok(())
    }

    fn enable_feature(&mut self, feature: &str) -> EngineResult<()> {
        if feature == ACCELERATED_FEATURE {
            self.set_accelerated(true)
        } else {
            Err(EngineError::unsupported(format!("feature:{feature}")))
        }
    }

    fn configure(&mut self, config: &Value) -> EngineResult<()> {
        self.toggle_from_object("config", config)
    }

    fn set_options(&mut self, options: &Value) -> EngineResult<()> {
        self.toggle_from_object("options", options)
    }

    fn set_field(&mut self, field: &str, value: &Value) -> EngineResult<()> {
        match (field, value.as_bool()) {
            (ACCELERATED_FEATURE, Some(enabled)) => self.set_accelerated(enabled),
            (ACCELERATED_FEATURE, None) => Err(EngineError::invalid_wire(field, "expected a boolean")),
            _ => Err(EngineError::unsupported(format!("field:{field}"))),
        }
    }

    fn call(&mut self, method: &str, args: &Value) -> EngineResult<Value> {
        match method {
            SET_ACCELERATED_METHOD => {
                let enabled = bool_arg(args)
                    .ok_or_else(|| EngineError::invalid_wire(method, "expected a boolean argument"))?;
                self.set_accelerated(enabled)?;
                Ok(Value::Null)
            }
            "InitializeAcceleratedBackend" => self.initialize_accelerated_backend(),
            "CleanupAcceleratedBackend" => {
                self.cleanup_accelerated_backend()?;
                Ok(Value::Null)
            }
            "Forward" => {
                self.forward(args)?;
                Ok(Value::Null)
            }
            "ExtractOutput" => self.extract_output(),
            "PerturbWeights" => {
                let amplitude = args.get(0).and_then(Value::as_f64);
                let seed = args.get(1).and_then(Value::as_u64);
                match (amplitude, seed) {
                    (Some(amplitude), Some(seed)) => {
                        self.perturb_weights(amplitude, seed as u32)?;
                        Ok(Value::Null)
                    }
                    _ => Err(EngineError::invalid_wire(method, "expected [amplitude, seed]")),
                }
            }
            _ => Err(EngineError::unsupported(format!("call:{method}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{CaseShape, build_topology};

    fn small_network() -> NativeNetwork {
        let wire = build_topology(&CaseShape::new("t", vec![4, 3, 2]))
            .unwrap()
            .to_wire();
        NativeEngine::default()
            .build(&wire.layers, &wire.activations, &wire.trainable)
            .unwrap()
    }

    #[test]
    fn test_dense_layer_forward() {
        let layer = DenseLayer {
            input_size: 2,
            output_size: 2,
            weights: vec![1.0, 2.0, -1.0, 0.5],
            bias: vec![0.5, 0.0],
            activation: Activation::Relu,
        };
        assert_eq!(layer.forward(&[1.0, 1.0]), vec![3.5, 0.0]);
    }

    #[test]
    fn test_glorot_is_deterministic_and_bounded() {
        let a = DenseLayer::glorot(10, 5, Activation::Relu, 7);
        let b = DenseLayer::glorot(10, 5, Activation::Relu, 7);
        assert_eq!(a, b);
        let limit = (6.0f32 / 15.0).sqrt();
        assert!(a.weights.iter().all(|w| w.abs() <= limit));
        assert!(a.bias.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_output_is_probability_distribution() {
        let mut net = small_network();
        net.forward(&json!([[0.1, 0.2, 0.3, 0.4]])).unwrap();
        let out = crate::utils::flatten_numbers(&net.extract_output().unwrap());
        assert_eq!(out.len(), 2);
        assert!((out.iter().sum::<f64>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_extract_before_forward_fails() {
        let mut net = small_network();
        assert!(matches!(net.extract_output(), Err(EngineError::OutputNotReady)));
    }

    #[test]
    fn test_input_size_is_checked() {
        let mut net = small_network();
        let err = net.forward(&json!([[1.0, 2.0]])).unwrap_err();
        assert!(matches!(err, EngineError::InputSizeMismatch { expected: 4, actual: 2 }));
    }

    #[test]
    fn test_perturb_changes_weights_deterministically() {
        let mut a = small_network();
        let mut b = small_network();
        let before = a.layers()[0].weights.clone();
        a.perturb_weights(0.1, 42).unwrap();
        b.perturb_weights(0.1, 42).unwrap();
        assert_ne!(a.layers()[0].weights, before);
        assert_eq!(a.layers(), b.layers());
    }

    #[test]
    fn test_frozen_layers_are_not_perturbed() {
        let wire = build_topology(&CaseShape::new("t", vec![4, 3, 2]))
            .unwrap()
            .to_wire();
        let mut net = NativeEngine::default()
            .build(&wire.layers, &wire.activations, &json!([true, false, true]))
            .unwrap();
        let frozen = net.layers()[0].clone();
        net.perturb_weights(0.5, 3).unwrap();
        assert_eq!(net.layers()[0], frozen);
    }

    #[test]
    fn test_toggle_entry_points_share_one_flag() {
        let mut net = small_network();
        net.enable_feature(ACCELERATED_FEATURE).unwrap();
        assert!(net.accelerated_requested());
        net.configure(&json!({ "accelerated_backend": false })).unwrap();
        assert!(!net.accelerated_requested());
        net.set_field(ACCELERATED_FEATURE, &json!(true)).unwrap();
        assert!(net.accelerated_requested());
        net.call(SET_ACCELERATED_METHOD, &json!([false])).unwrap();
        assert!(!net.accelerated_requested());
        assert!(net.enable_feature("turbo").unwrap_err().is_unsupported());
        assert!(net.call("Nope", &Value::Null).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_flag_without_accelerator_uses_reference_path() {
        let mut net = small_network();
        let input = json!([[0.5, 0.5, 0.5, 0.5]]);
        net.forward(&input).unwrap();
        let reference = net.extract_output().unwrap();
        net.set_accelerated(true).unwrap();
        assert!(!net.accelerated_active());
        net.forward(&input).unwrap();
        assert_eq!(net.extract_output().unwrap(), reference);
    }

    #[test]
    fn test_rejects_mismatched_payloads() {
        let engine = NativeEngine::default();
        let layers = json!([{"Width": 2, "Height": 1}, {"Width": 1, "Height": 1}]);
        let err = engine
            .build(&layers, &json!(["linear"]), &json!([true, true]))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidWire { .. }));
        let err = engine
            .build(&layers, &json!(["linear", "gelu"]), &json!([true, true]))
            .unwrap_err();
        assert!(err.to_string().contains("gelu"));
    }
}

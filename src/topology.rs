//! Topology construction from compact case shapes.
//!
//! A [`CaseShape`] names a benchmark case and lists its layer widths. The
//! topology derived from it is what the engine's `create` call consumes: one
//! layer shape, one activation tag and one trainability flag per layer.

use crate::activation::Activation;
use crate::errors::{TopologyError, TopologyResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bytes per parameter (weights and biases are 4-byte floats).
pub const BYTES_PER_PARAMETER: u64 = 4;

/// Layout of the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InputLayout {
    /// A single flat row; height 1.
    #[default]
    Flat,
    /// A 2-D image input; `width * height` must equal the first layer width.
    Image { width: usize, height: usize },
}

/// Identifies a benchmark case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseShape {
    pub id: String,
    /// First entry is the input width, last entry the output width.
    pub layer_widths: Vec<usize>,
    #[serde(default)]
    pub input_layout: InputLayout,
}

impl CaseShape {
    pub fn new(id: impl Into<String>, layer_widths: Vec<usize>) -> Self {
        Self {
            id: id.into(),
            layer_widths,
            input_layout: InputLayout::Flat,
        }
    }

    /// Case whose input is a `width x height` image.
    pub fn image(id: impl Into<String>, width: usize, height: usize, rest: &[usize]) -> Self {
        let mut layer_widths = vec![width.saturating_mul(height)];
        layer_widths.extend_from_slice(rest);
        Self {
            id: id.into(),
            layer_widths,
            input_layout: InputLayout::Image { width, height },
        }
    }

    /// Declared input width (0 for an empty shape).
    pub fn input_width(&self) -> usize {
        self.layer_widths.first().copied().unwrap_or(0)
    }

    /// Declared output width (0 for an empty shape).
    pub fn output_width(&self) -> usize {
        self.layer_widths.last().copied().unwrap_or(0)
    }

    /// Human-readable shape, e.g. `784 → 64 → 10`.
    pub fn description(&self) -> String {
        self.layer_widths
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(" → ")
    }

    fn size_overflow(&self) -> TopologyError {
        TopologyError::SizeOverflow {
            case_id: self.id.clone(),
        }
    }

    /// Number of weights plus biases of the dense stack.
    pub fn parameter_count(&self) -> TopologyResult<u64> {
        let mut total: u64 = 0;
        for pair in self.layer_widths.windows(2) {
            total = (pair[0] as u64)
                .checked_mul(pair[1] as u64)
                .and_then(|weights| weights.checked_add(pair[1] as u64))
                .and_then(|layer| total.checked_add(layer))
                .ok_or_else(|| self.size_overflow())?;
        }
        Ok(total)
    }

    /// Estimated parameter storage in bytes (4-byte floats).
    pub fn estimated_parameter_bytes(&self) -> TopologyResult<u64> {
        self.parameter_count()?
            .checked_mul(BYTES_PER_PARAMETER)
            .ok_or_else(|| self.size_overflow())
    }

    /// Estimated parameter storage in MiB.
    pub fn estimated_megabytes(&self) -> TopologyResult<f64> {
        Ok(self.estimated_parameter_bytes()? as f64 / (1024.0 * 1024.0))
    }
}

/// Shape of one layer on the wire (`{"Width": w, "Height": h}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerShape {
    #[serde(rename = "Width")]
    pub width: usize,
    #[serde(rename = "Height")]
    pub height: usize,
}

impl LayerShape {
    /// Number of values the layer holds.
    pub fn size(&self) -> usize {
        self.width * self.height
    }
}

/// Derived engine-facing topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkTopology {
    pub layers: Vec<LayerShape>,
    pub activations: Vec<Activation>,
    pub trainable: Vec<bool>,
}

/// The three JSON payloads passed to `NetworkEngine::create`.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyWire {
    pub layers: Value,
    pub activations: Value,
    pub trainable: Value,
}

impl NetworkTopology {
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Activation of the output layer.
    pub fn output_activation(&self) -> Option<Activation> {
        self.activations.last().copied()
    }

    /// Serialize to the engine's JSON payloads.
    pub fn to_wire(&self) -> TopologyWire {
        TopologyWire {
            layers: serde_json::to_value(&self.layers).unwrap_or(Value::Null),
            activations: Value::from(
                self.activations
                    .iter()
                    .map(|a| a.name())
                    .collect::<Vec<_>>(),
            ),
            trainable: Value::from(self.trainable.clone()),
        }
    }
}

/// Build the topology for a case.
///
/// Activations are positional: the first layer is `linear`, interior layers
/// `relu`, the last layer `softmax`. Every layer is trainable.
pub fn build_topology(shape: &CaseShape) -> TopologyResult<NetworkTopology> {
    let n = shape.layer_widths.len();
    if n < 2 {
        return Err(TopologyError::TooFewLayers {
            case_id: shape.id.clone(),
            layers: n,
        });
    }
    if let Some(index) = shape.layer_widths.iter().position(|&w| w == 0) {
        return Err(TopologyError::ZeroWidthLayer {
            case_id: shape.id.clone(),
            index,
        });
    }

    let input = match shape.input_layout {
        InputLayout::Flat => LayerShape {
            width: shape.layer_widths[0],
            height: 1,
        },
        InputLayout::Image { width, height } => {
            let pixels = width
                .checked_mul(height)
                .ok_or_else(|| shape.size_overflow())?;
            if pixels != shape.layer_widths[0] {
                return Err(TopologyError::ImageInputMismatch {
                    case_id: shape.id.clone(),
                    width,
                    height,
                    declared: shape.layer_widths[0],
                });
            }
            LayerShape { width, height }
        }
    };
    shape.estimated_parameter_bytes()?;

    let mut layers = Vec::with_capacity(n);
    layers.push(input);
    layers.extend(
        shape.layer_widths[1..]
            .iter()
            .map(|&width| LayerShape { width, height: 1 }),
    );

    let activations = (0..n)
        .map(|i| match i {
            0 => Activation::Linear,
            i if i == n - 1 => Activation::Softmax,
            _ => Activation::Relu,
        })
        .collect();

    Ok(NetworkTopology {
        layers,
        activations,
        trainable: vec![true; n],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_three_layer_topology() {
        let topo = build_topology(&CaseShape::new("S1", vec![784, 64, 10])).unwrap();
        assert_eq!(topo.len(), 3);
        assert_eq!(
            topo.activations,
            vec![Activation::Linear, Activation::Relu, Activation::Softmax]
        );
        assert_eq!(topo.trainable, vec![true, true, true]);
        assert!(topo.layers.iter().all(|l| l.height == 1));
        assert_eq!(topo.layers[1].width, 64);
    }

    #[test]
    fn test_two_layer_topology_has_no_relu() {
        let topo = build_topology(&CaseShape::new("T", vec![4, 2])).unwrap();
        assert_eq!(topo.activations, vec![Activation::Linear, Activation::Softmax]);
    }

    #[test]
    fn test_lengths_always_agree() {
        for n in 2..8 {
            let shape = CaseShape::new("N", vec![3; n]);
            let topo = build_topology(&shape).unwrap();
            assert_eq!(topo.layers.len(), n);
            assert_eq!(topo.activations.len(), n);
            assert_eq!(topo.trainable.len(), n);
        }
    }

    #[test]
    fn test_rejects_single_layer() {
        let err = build_topology(&CaseShape::new("bad", vec![784])).unwrap_err();
        assert!(matches!(err, TopologyError::TooFewLayers { layers: 1, .. }));
        let err = build_topology(&CaseShape::new("empty", vec![])).unwrap_err();
        assert!(matches!(err, TopologyError::TooFewLayers { layers: 0, .. }));
    }

    #[test]
    fn test_rejects_zero_width() {
        let err = build_topology(&CaseShape::new("z", vec![4, 0, 2])).unwrap_err();
        assert_eq!(
            err,
            TopologyError::ZeroWidthLayer {
                case_id: "z".to_string(),
                index: 1
            }
        );
    }

    #[test]
    fn test_image_input_layer() {
        let shape = CaseShape::image("img", 28, 28, &[256, 10]);
        let topo = build_topology(&shape).unwrap();
        assert_eq!(topo.layers[0], LayerShape { width: 28, height: 28 });
        assert_eq!(shape.input_width(), 784);

        let mut broken = shape.clone();
        broken.layer_widths[0] = 100;
        assert!(matches!(
            build_topology(&broken),
            Err(TopologyError::ImageInputMismatch { .. })
        ));
    }

    #[test]
    fn test_wire_payloads() {
        let topo = build_topology(&CaseShape::new("S", vec![3, 2])).unwrap();
        let wire = topo.to_wire();
        assert_eq!(
            wire.layers,
            json!([{"Width": 3, "Height": 1}, {"Width": 2, "Height": 1}])
        );
        assert_eq!(wire.activations, json!(["linear", "softmax"]));
        assert_eq!(wire.trainable, json!([true, true]));
    }

    #[test]
    fn test_parameter_estimate_for_s1() {
        let shape = CaseShape::new("S1", vec![784, 64, 10]);
        assert_eq!(
            shape.estimated_parameter_bytes().unwrap(),
            784 * 64 * 4 + 64 * 4 + 64 * 10 * 4 + 10 * 4
        );
        assert!((shape.estimated_megabytes().unwrap() - 0.19).abs() < 0.005);
        assert_eq!(shape.description(), "784 → 64 → 10");
    }

    #[test]
    fn test_oversized_shapes_are_rejected() {
        let wide = CaseShape::new("wide", vec![usize::MAX, usize::MAX, 2]);
        assert_eq!(
            wide.parameter_count(),
            Err(TopologyError::SizeOverflow {
                case_id: "wide".to_string()
            })
        );
        assert!(matches!(
            build_topology(&wide),
            Err(TopologyError::SizeOverflow { .. })
        ));

        let mut image = CaseShape::image("img", usize::MAX, 2, &[2]);
        assert_eq!(image.input_width(), usize::MAX);
        image.layer_widths[0] = 4;
        assert!(matches!(
            build_topology(&image),
            Err(TopologyError::SizeOverflow { .. })
        ));
    }
}

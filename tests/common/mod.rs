//! Scripted engine shared by the integration tests.
#![allow(dead_code)]

use parity_bench::engine::{EngineHandle, NetworkEngine, SET_ACCELERATED_METHOD};
use parity_bench::errors::{EngineError, EngineResult};
use parity_bench::topology::LayerShape;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;

/// What the backend initializer does.
#[derive(Debug, Clone)]
pub enum InitBehavior {
    Absent,
    Respond(Value),
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct Script {
    pub init: InitBehavior,
    /// Expose `set_accelerated`.
    pub setter: bool,
    /// Expose `call("SetAcceleratedBackend", ..)`.
    pub call_toggle: bool,
    /// Creation fails for networks with this input width.
    pub fail_create_for_input: Option<usize>,
    /// Every forward pass fails once the accelerated flag is set.
    pub fail_accelerated_forward: bool,
    /// Shift moved from the last output to the first while accelerated.
    pub accelerated_drift: f64,
    /// Factor applied to every output value.
    pub output_scale: f64,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            init: InitBehavior::Absent,
            setter: true,
            call_toggle: false,
            fail_create_for_input: None,
            fail_accelerated_forward: false,
            accelerated_drift: 0.0,
            output_scale: 1.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub creates: usize,
    pub forwards: usize,
    pub cleanups: usize,
    pub perturbs: usize,
    pub accelerated: bool,
}

pub struct ScriptedEngine {
    pub script: Script,
    pub stats: Rc<RefCell<Stats>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            stats: Rc::new(RefCell::new(Stats::default())),
        }
    }

    pub fn forwards(&self) -> usize {
        self.stats.borrow().forwards
    }
}

impl NetworkEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create(
        &self,
        layers: &Value,
        _activations: &Value,
        _trainable: &Value,
    ) -> EngineResult<Box<dyn EngineHandle>> {
        let shapes: Vec<LayerShape> = serde_json::from_value(layers.clone())
            .map_err(|e| EngineError::invalid_wire("layers", e.to_string()))?;
        let input_size = shapes.first().map_or(0, LayerShape::size);
        let output_size = shapes.last().map_or(0, LayerShape::size);

        if self.script.fail_create_for_input == Some(input_size) {
            return Err(EngineError::ForwardFailed {
                message: "scripted create failure".to_string(),
            });
        }

        self.stats.borrow_mut().creates += 1;
        Ok(Box::new(ScriptedHandle {
            script: self.script.clone(),
            stats: Rc::clone(&self.stats),
            input_size,
            output_size,
            accelerated: false,
            output: None,
        }))
    }
}

pub struct ScriptedHandle {
    script: Script,
    stats: Rc<RefCell<Stats>>,
    input_size: usize,
    output_size: usize,
    accelerated: bool,
    output: Option<Vec<f64>>,
}

impl ScriptedHandle {
    fn set_flag(&mut self, enabled: bool) {
        self.accelerated = enabled;
        self.stats.borrow_mut().accelerated = enabled;
    }
}

impl EngineHandle for ScriptedHandle {
    fn forward(&mut self, input: &Value) -> EngineResult<()> {
        self.stats.borrow_mut().forwards += 1;

        let actual = parity_bench::utils::flatten_numbers(input).len();
        if actual != self.input_size {
            return Err(EngineError::InputSizeMismatch {
                expected: self.input_size,
                actual,
            });
        }
        if self.accelerated && self.script.fail_accelerated_forward {
            return Err(EngineError::AcceleratorExecution {
                message: "scripted device loss".to_string(),
            });
        }

        let n = self.output_size;
        let total = (n * (n + 1) / 2) as f64;
        let scale = self.script.output_scale;
        let mut output: Vec<f64> = (1..=n).map(|i| scale * i as f64 / total).collect();
        if self.accelerated && n > 1 {
            output[0] += self.script.accelerated_drift;
            output[n - 1] -= self.script.accelerated_drift;
        }
        self.output = Some(output);
        Ok(())
    }

    fn extract_output(&mut self) -> EngineResult<Value> {
        let output = self.output.as_ref().ok_or(EngineError::OutputNotReady)?;
        Ok(json!([output]))
    }

    fn perturb_weights(&mut self, _amplitude: f64, _seed: u32) -> EngineResult<()> {
        self.stats.borrow_mut().perturbs += 1;
        Ok(())
    }

    fn initialize_accelerated_backend(&mut self) -> EngineResult<Value> {
        match &self.script.init {
            InitBehavior::Absent => Err(EngineError::unsupported("initialize_accelerated_backend")),
            InitBehavior::Respond(value) => Ok(value.clone()),
            InitBehavior::Fail(message) => Err(EngineError::AcceleratorInit {
                message: message.clone(),
            }),
        }
    }

    fn cleanup_accelerated_backend(&mut self) -> EngineResult<()> {
        self.stats.borrow_mut().cleanups += 1;
        Ok(())
    }

    fn set_accelerated(&mut self, enabled: bool) -> EngineResult<()> {
        if !self.script.setter {
            return Err(EngineError::unsupported("set_accelerated"));
        }
        self.set_flag(enabled);
        Ok(())
    }

    fn call(&mut self, method: &str, args: &Value) -> EngineResult<Value> {
        if self.script.call_toggle && method == SET_ACCELERATED_METHOD {
            let enabled = args.get(0).and_then(Value::as_bool).unwrap_or(false);
            self.set_flag(enabled);
            return Ok(Value::Null);
        }
        Err(EngineError::unsupported(format!("call:{method}")))
    }
}

/// Wire payloads for a plain dense stack.
pub fn wire_for(widths: &[usize]) -> parity_bench::topology::TopologyWire {
    parity_bench::build_topology(&parity_bench::CaseShape::new("t", widths.to_vec()))
        .expect("valid test topology")
        .to_wire()
}

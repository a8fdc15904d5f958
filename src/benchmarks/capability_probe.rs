//! Best-effort switch of a network handle onto its accelerated backend.
//!
//! Engines expose the accelerator toggle through different entry points, or
//! none at all. The prober walks a fixed list of toggle strategies, then calls
//! the backend initializer and classifies its response. Nothing here fails the
//! case: an absent or broken accelerator ends in `Unavailable` or `Error` and
//! the caller keeps timing the reference path.

use crate::engine::{ACCELERATED_FEATURE, EngineHandle, SET_ACCELERATED_METHOD};
use crate::errors::EngineResult;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Instant;

/// Progress of one probe.
///
/// `Unprobed -> FlagAttempted -> InitAttempted -> {Enabled | Unavailable | Error}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProbeState {
    Unprobed,
    FlagAttempted,
    InitAttempted,
    Enabled { warmed_up: bool },
    Unavailable,
    Error { diagnostic: String },
}

impl ProbeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProbeState::Enabled { .. } | ProbeState::Unavailable | ProbeState::Error { .. }
        )
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ProbeState::Enabled { .. })
    }
}

/// Outcome of probing one handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityProbeResult {
    /// Time spent in the backend initializer (0 when it is absent).
    pub elapsed_ms: f64,
    pub adapter_descriptor: String,
    pub enabled: bool,
    pub state: ProbeState,
    /// Name of the toggle strategy that succeeded, if any.
    pub toggle_strategy: Option<&'static str>,
}

/// A named way to turn the accelerator flag on.
pub type ToggleFn = fn(&mut dyn EngineHandle) -> EngineResult<()>;

fn toggle_setter(handle: &mut dyn EngineHandle) -> EngineResult<()> {
    handle.set_accelerated(true)
}

fn toggle_feature(handle: &mut dyn EngineHandle) -> EngineResult<()> {
    handle.enable_feature(ACCELERATED_FEATURE)
}

fn toggle_configure(handle: &mut dyn EngineHandle) -> EngineResult<()> {
    handle.configure(&json!({ ACCELERATED_FEATURE: true }))
}

fn toggle_options(handle: &mut dyn EngineHandle) -> EngineResult<()> {
    handle.set_options(&json!({ ACCELERATED_FEATURE: true }))
}

fn toggle_field(handle: &mut dyn EngineHandle) -> EngineResult<()> {
    handle.set_field(ACCELERATED_FEATURE, &Value::Bool(true))
}

fn toggle_call(handle: &mut dyn EngineHandle) -> EngineResult<()> {
    handle.call(SET_ACCELERATED_METHOD, &json!([true])).map(|_| ())
}

/// Toggle strategies in preference order.
pub const TOGGLE_STRATEGIES: &[(&str, ToggleFn)] = &[
    ("set_accelerated", toggle_setter),
    ("enable_feature", toggle_feature),
    ("configure", toggle_configure),
    ("set_options", toggle_options),
    ("set_field", toggle_field),
    ("call", toggle_call),
];

/// Heuristic verdict on a backend-initializer response.
///
/// Not enabled: null, `false`, zero, empty containers, and text that is empty,
/// `{}`, `unavailable`, or mentions `not supported`, `unsupported` or `error`
/// (case-insensitive). Containers are judged by their compact JSON text.
pub fn classify_init_response(response: &Value) -> bool {
    match response {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => classify_text(s),
        Value::Array(items) if items.is_empty() => false,
        Value::Object(map) if map.is_empty() => false,
        other => classify_text(&other.to_string()),
    }
}

fn classify_text(text: &str) -> bool {
    let lowered = text.trim().to_ascii_lowercase();
    !(lowered.is_empty()
        || lowered == "{}"
        || lowered == "unavailable"
        || lowered.contains("not supported")
        || lowered.contains("unsupported")
        || lowered.contains("error"))
}

fn describe_response(response: &Value) -> String {
    match response {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Runs the probe protocol against a handle.
#[derive(Debug, Clone)]
pub struct CapabilityProber {
    strategies: &'static [(&'static str, ToggleFn)],
}

impl Default for CapabilityProber {
    fn default() -> Self {
        Self {
            strategies: TOGGLE_STRATEGIES,
        }
    }
}

impl CapabilityProber {
    pub fn with_strategies(strategies: &'static [(&'static str, ToggleFn)]) -> Self {
        Self { strategies }
    }

    /// Probe `handle` once, warming it up with `input` when enabled.
    pub fn probe(&self, handle: &mut dyn EngineHandle, input: &Value) -> CapabilityProbeResult {
        let mut state = ProbeState::Unprobed;

        let toggle_strategy = self.try_toggles(handle);
        advance(&mut state, ProbeState::FlagAttempted);

        let start = Instant::now();
        let init = handle.initialize_accelerated_backend();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        advance(&mut state, ProbeState::InitAttempted);

        let (enabled, adapter_descriptor, terminal) = match init {
            Ok(response) => {
                let enabled = classify_init_response(&response);
                let terminal = if enabled {
                    ProbeState::Enabled { warmed_up: false }
                } else {
                    ProbeState::Unavailable
                };
                (enabled, describe_response(&response), terminal)
            }
            Err(e) if e.is_unsupported() => {
                let enabled = toggle_strategy.is_some();
                let terminal = if enabled {
                    ProbeState::Enabled { warmed_up: false }
                } else {
                    ProbeState::Unavailable
                };
                (enabled, String::new(), terminal)
            }
            Err(e) => {
                warn!("Accelerated backend initialization failed: {e}");
                (
                    false,
                    format!("error:{e}"),
                    ProbeState::Error {
                        diagnostic: e.to_string(),
                    },
                )
            }
        };
        advance(&mut state, terminal);

        if enabled {
            let warmed_up = match handle.forward(input).and_then(|_| handle.extract_output()) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Accelerated warm-up failed: {e}");
                    false
                }
            };
            state = ProbeState::Enabled { warmed_up };
        } else if let Err(e) = handle.set_accelerated(false) {
            debug!("Could not reset accelerated flag: {e}");
        }

        info!(
            "Probe finished: {:?} in {:.2} ms (adapter: {})",
            state,
            elapsed_ms,
            if adapter_descriptor.is_empty() { "-" } else { adapter_descriptor.as_str() }
        );

        CapabilityProbeResult {
            elapsed_ms,
            adapter_descriptor,
            enabled,
            state,
            toggle_strategy,
        }
    }

    fn try_toggles(&self, handle: &mut dyn EngineHandle) -> Option<&'static str> {
        for (name, toggle) in self.strategies {
            match toggle(handle) {
                Ok(()) => {
                    debug!("Accelerated flag set via {name}");
                    return Some(*name);
                }
                Err(e) if e.is_unsupported() => {}
                Err(e) => debug!("Toggle strategy {name} failed: {e}"),
            }
        }
        None
    }
}

fn advance(state: &mut ProbeState, next: ProbeState) {
    debug!("Probe state {:?} -> {:?}", state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_enabled_responses() {
        for response in [
            json!({}),
            json!(""),
            json!("{}"),
            json!("unavailable"),
            json!("Unavailable"),
            json!("WebGPU not supported"),
            json!("UNSUPPORTED adapter"),
            json!("Error: no device"),
            json!({"error": "adapter lost"}),
            Value::Null,
            json!(false),
            json!([]),
        ] {
            assert!(!classify_init_response(&response), "{response}");
        }
    }

    #[test]
    fn test_classify_enabled_responses() {
        for response in [
            json!({"adapter": "Mock GPU", "backend": "Vulkan"}),
            json!("ok"),
            json!(true),
            json!([1]),
        ] {
            assert!(classify_init_response(&response), "{response}");
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ProbeState::Unprobed.is_terminal());
        assert!(!ProbeState::InitAttempted.is_terminal());
        assert!(ProbeState::Unavailable.is_terminal());
        assert!(ProbeState::Enabled { warmed_up: true }.is_enabled());
    }

    #[test]
    fn test_strategy_order() {
        let names: Vec<_> = TOGGLE_STRATEGIES.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["set_accelerated", "enable_feature", "configure", "set_options", "set_field", "call"]
        );
    }
}

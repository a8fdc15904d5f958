//! Bundled engine through the generic handle contract.

mod common;

use common::wire_for;
use parity_bench::benchmarks::{classify_init_response, diff_stats, timed_forward};
use parity_bench::engine::{EngineHandle, NativeEngine, NetworkEngine};
use parity_bench::errors::EngineError;
use parity_bench::{DEFAULT_SEED, DeterministicVector};
use serde_json::json;

fn create(engine: &NativeEngine, widths: &[usize]) -> Box<dyn EngineHandle> {
    let wire = wire_for(widths);
    engine
        .create(&wire.layers, &wire.activations, &wire.trainable)
        .expect("network creation should succeed")
}

#[test]
fn test_same_engine_builds_identical_networks() {
    let engine = NativeEngine::default();
    let input = DeterministicVector::generate(DEFAULT_SEED, 32).to_wire();

    let mut a = create(&engine, &[32, 16, 4]);
    let mut b = create(&engine, &[32, 16, 4]);
    let ra = timed_forward(a.as_mut(), &input).unwrap();
    let rb = timed_forward(b.as_mut(), &input).unwrap();

    assert_eq!(ra.flat_output, rb.flat_output);
    assert_eq!(ra.flat_output.len(), 4);
}

#[test]
fn test_weight_seed_changes_outputs() {
    let input = DeterministicVector::generate(DEFAULT_SEED, 32).to_wire();
    let mut a = create(&NativeEngine::default(), &[32, 16, 4]);
    let mut b = create(&NativeEngine::default().with_weight_seed(99), &[32, 16, 4]);

    let ra = timed_forward(a.as_mut(), &input).unwrap();
    let rb = timed_forward(b.as_mut(), &input).unwrap();

    assert_ne!(ra.flat_output, rb.flat_output);
}

#[test]
fn test_perturbation_via_named_call_matches_direct_call() {
    let engine = NativeEngine::default();
    let input = DeterministicVector::generate(DEFAULT_SEED, 8).to_wire();

    let mut direct = create(&engine, &[8, 5, 3]);
    let mut named = create(&engine, &[8, 5, 3]);
    direct.perturb_weights(0.1, 42).unwrap();
    named.call("PerturbWeights", &json!([0.1, 42])).unwrap();

    let rd = timed_forward(direct.as_mut(), &input).unwrap();
    let rn = timed_forward(named.as_mut(), &input).unwrap();
    assert_eq!(rd.flat_output, rn.flat_output);
}

#[test]
fn test_repeated_forward_is_stable() {
    let engine = NativeEngine::default();
    let input = DeterministicVector::generate(7, 10).to_wire();
    let mut handle = create(&engine, &[10, 6, 6, 2]);

    let first = timed_forward(handle.as_mut(), &input).unwrap();
    let second = timed_forward(handle.as_mut(), &input).unwrap();

    assert_eq!(first.flat_output, second.flat_output);
    assert!(first.elapsed_ms >= 0.0);
}

#[test]
fn test_wrong_input_size_is_reported() {
    let engine = NativeEngine::default();
    let mut handle = create(&engine, &[10, 2]);

    let err = handle.forward(&json!([[1.0, 2.0, 3.0]])).unwrap_err();

    assert!(matches!(
        err,
        EngineError::InputSizeMismatch { expected: 10, actual: 3 }
    ));
}

#[test]
fn test_accelerated_backend_agrees_with_reference_when_present() {
    let engine = NativeEngine::default();
    let input = DeterministicVector::generate(DEFAULT_SEED, 64).to_wire();
    let mut handle = create(&engine, &[64, 32, 32, 10]);
    handle.perturb_weights(0.1, 42).unwrap();

    let reference = timed_forward(handle.as_mut(), &input).unwrap();

    handle.set_accelerated(true).unwrap();
    let response = match handle.initialize_accelerated_backend() {
        Ok(response) => response,
        Err(EngineError::AcceleratorInit { .. }) => return,
        Err(e) => panic!("unexpected initialization error: {e}"),
    };
    if !classify_init_response(&response) {
        assert_eq!(response, json!("unavailable"));
        return;
    }
    assert!(response.get("adapter").is_some());

    let accelerated = timed_forward(handle.as_mut(), &input).unwrap();
    let diff = diff_stats(&reference.flat_output, &accelerated.flat_output);
    assert!(diff.max_abs_diff < 1e-4, "max diff {}", diff.max_abs_diff);

    handle.cleanup_accelerated_backend().unwrap();
    let after_cleanup = timed_forward(handle.as_mut(), &input).unwrap();
    assert_eq!(after_cleanup.flat_output, reference.flat_output);
}

//! End-to-end recorder and shot-loop checks through the public API.

use std::collections::BTreeMap;

use qop_core::{NoiseKind, NoisySimulator, OpKind, SimulatorError};

fn no_noise() -> BTreeMap<String, f64> {
    BTreeMap::new()
}

fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_constructor_rejects_oversized_register() {
    let err = NoisySimulator::new(31, &no_noise(), vec![]);
    assert!(matches!(
        err,
        Err(SimulatorError::QubitCountExceeded { .. })
    ));
}

#[test]
fn test_constructor_rejects_unknown_noise_token() {
    let err = NoisySimulator::new(2, &table(&[("thermal", 0.1)]), vec![]);
    match err {
        Err(SimulatorError::UnknownNoise(s)) => assert_eq!(s, "thermal"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_gate_dependent_noise_fires_only_for_its_gate() {
    let mut gate_noise = BTreeMap::new();
    gate_noise.insert(
        "CNOT".to_string(),
        table(&[("twoqubit_depolarizing", 0.3)]),
    );
    let mut sim =
        NoisySimulator::new_gate_dependent(2, &no_noise(), &gate_noise, vec![]).unwrap();

    sim.hadamard(0, &[], false).unwrap();
    assert_eq!(sim.opcodes().len(), 1);

    sim.cnot(0, 1, &[], false).unwrap();
    assert_eq!(sim.opcodes().len(), 3);
    assert_eq!(
        sim.opcodes()[2].op,
        OpKind::Noise(NoiseKind::TwoQubitDepolarizing)
    );
    assert_eq!(sim.opcodes()[2].qubits, vec![0, 1]);

    // The noise-free record never sees inserted channels.
    assert_eq!(sim.original_opcodes().len(), 2);
    assert!(sim
        .original_opcodes()
        .iter()
        .all(|op| matches!(op.op, OpKind::Gate(_))));
}

#[test]
fn test_gate_specific_crosstalk_end_to_end() {
    let mut error_1q = BTreeMap::new();
    error_1q.insert(("X".to_string(), 0), table(&[("bitflip", 0.2)]));
    let mut error_2q = BTreeMap::new();
    error_2q.insert(
        ("X".to_string(), (0, 1)),
        table(&[("twoqubit_depolarizing", 0.1)]),
    );
    let mut sim =
        NoisySimulator::new_gate_specific(3, &no_noise(), &error_1q, &error_2q, vec![]).unwrap();

    // X on qubit 0: its own 1q entry, then the crosstalk pair onto qubit 1.
    sim.x(0, &[], false).unwrap();
    let ops = sim.opcodes();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[1].op, OpKind::Noise(NoiseKind::BitFlip));
    assert_eq!(ops[1].qubits, vec![0]);
    assert_eq!(ops[2].op, OpKind::Noise(NoiseKind::TwoQubitDepolarizing));
    assert_eq!(ops[2].qubits, vec![0, 1]);

    // X on qubit 2 has no entries at all.
    sim.x(2, &[], false).unwrap();
    assert_eq!(sim.opcodes().len(), 4);

    // The stream still replays.
    sim.seed(9);
    sim.execute_once().unwrap();
    let norm: f64 = sim.state().iter().map(|a| a.norm_sqr()).sum();
    assert!((norm - 1.0).abs() <= 1e-9);
}

#[test]
fn test_gate_specific_policy_rejects_toffoli() {
    let mut sim = NoisySimulator::new_gate_specific(
        3,
        &no_noise(),
        &BTreeMap::new(),
        &BTreeMap::new(),
        vec![],
    )
    .unwrap();
    let err = sim.toffoli(0, 1, 2, &[], false);
    assert_eq!(err, Err(SimulatorError::UnsupportedNoiseArity(3)));
    // The failed recording left nothing behind.
    assert!(sim.opcodes().is_empty());
    assert!(sim.original_opcodes().is_empty());
}

#[test]
fn test_partial_measurement_plan_projects_bell_state() {
    let mut sim = NoisySimulator::new(2, &no_noise(), vec![]).unwrap();
    sim.hadamard(0, &[], false).unwrap();
    sim.cnot(0, 1, &[], false).unwrap();
    sim.seed(21);
    let shots = 4000;
    let histogram = sim.measure_shots(&[1], shots).unwrap();

    let zeros = histogram.get(&0).copied().unwrap_or(0);
    let ones = histogram.get(&1).copied().unwrap_or(0);
    assert_eq!(zeros + ones, shots);
    // 50/50 within 5 sigma.
    let sigma = (shots as f64 * 0.25).sqrt();
    assert!((zeros as f64 - shots as f64 / 2.0).abs() <= 5.0 * sigma);
}

#[test]
fn test_identical_seeds_reproduce_noisy_readout_histograms() {
    let build = || {
        let mut sim = NoisySimulator::new(
            2,
            &table(&[("depolarizing", 0.05), ("bitflip", 0.02)]),
            vec![[0.03, 0.01], [0.02, 0.04]],
        )
        .unwrap();
        sim.hadamard(0, &[], false).unwrap();
        sim.cnot(0, 1, &[], false).unwrap();
        sim.rz(1, 0.3, &[], false).unwrap();
        sim
    };
    let mut a = build();
    let mut b = build();
    a.seed(1234);
    b.seed(1234);
    assert_eq!(
        a.measure_shots_all(1000).unwrap(),
        b.measure_shots_all(1000).unwrap()
    );
}

#[test]
fn test_generic_loader_accepts_named_gates() {
    let mut sim = NoisySimulator::new(3, &no_noise(), vec![]).unwrap();
    let program: &[(&str, &[usize], &[f64])] = &[
        ("HADAMARD", &[0], &[]),
        ("SX", &[1], &[]),
        ("S", &[2], &[]),
        ("T", &[2], &[]),
        ("RX", &[0], &[0.3]),
        ("RY", &[1], &[0.5]),
        ("RZ", &[2], &[0.7]),
        ("U1", &[0], &[0.2]),
        ("U2", &[1], &[0.1, 0.4]),
        ("U3", &[2], &[0.3, 0.6, 0.9]),
        ("RPHI90", &[0], &[0.5]),
        ("RPHI180", &[1], &[1.0]),
        ("RPHI", &[2], &[0.4, 0.8]),
        ("CZ", &[0, 1], &[]),
        ("SWAP", &[1, 2], &[]),
        ("ISWAP", &[0, 2], &[]),
        ("XY", &[0, 1], &[0.6]),
        ("CNOT", &[1, 2], &[]),
        ("XX", &[0, 1], &[0.2]),
        ("YY", &[1, 2], &[0.3]),
        ("ZZ", &[0, 2], &[0.4]),
        ("PHASE2Q", &[0, 1], &[0.1, 0.2, 0.3]),
        ("TOFFOLI", &[0, 1, 2], &[]),
        ("CSWAP", &[0, 1, 2], &[]),
        ("IDENTITY", &[1], &[]),
    ];
    for (token, qubits, params) in program {
        sim.load_opcode(token, qubits, params, false, &[]).unwrap();
    }
    sim.execute_once().unwrap();
    let norm: f64 = sim.state().iter().map(|a| a.norm_sqr()).sum();
    assert!((norm - 1.0).abs() <= 1e-9);
}

#[test]
fn test_arity_and_parameter_validation_at_recording() {
    let mut sim = NoisySimulator::new(2, &no_noise(), vec![]).unwrap();
    assert!(matches!(
        sim.load_opcode("CNOT", &[0], &[], false, &[]),
        Err(SimulatorError::ArityMismatch { .. })
    ));
    assert!(matches!(
        sim.load_opcode("RX", &[0], &[0.1, 0.2], false, &[]),
        Err(SimulatorError::ParameterCount { .. })
    ));
    assert!(matches!(
        sim.load_opcode("UU15", &[0, 1], &[0.0; 3], false, &[]),
        Err(SimulatorError::ParameterCount { .. })
    ));
    assert!(sim.opcodes().is_empty());
}

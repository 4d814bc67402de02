//! The noisy simulator: records a gate program as an opcode stream with
//! noise opcodes interleaved, then replays it shot by shot.
//!
//! Recording never touches the state vector; replay (`execute_once`) resets
//! to |0...0> and walks the noisy stream in insertion order. Each shot is one
//! replay followed by cumulative-probability sampling and optional per-qubit
//! readout flips.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use crate::channels;
use crate::error::{Result, SimulatorError};
use crate::gates;
use crate::noise_model::{NoiseModel, NoisePolicy};
use crate::opcode::{GateKind, NoiseKind, OpKind, Opcode};
use crate::state::StateVector;

/// Packs the bits named by `plan` (in order, starting at bit 0) out of a
/// full-register basis index.
fn pack_measured_bits(plan: &[usize], index: usize) -> usize {
    plan.iter()
        .enumerate()
        .fold(0, |acc, (pos, &q)| acc | (((index >> q) & 1) << pos))
}

#[derive(Debug)]
pub struct NoisySimulator {
    num_qubits: usize,
    state: StateVector,
    model: NoiseModel,
    policy: NoisePolicy,
    /// What actually executes: gates with noise opcodes interleaved.
    opcodes: Vec<Opcode>,
    /// The recorded program without inserted noise.
    original_opcodes: Vec<Opcode>,
    measure_qubits: Vec<usize>,
    rng: StdRng,
}

impl NoisySimulator {
    // ==========================================================================
    // Construction
    // ==========================================================================

    fn build(
        n_qubit: usize,
        model: NoiseModel,
        policy: NoisePolicy,
        measurement_error: Vec<[f64; 2]>,
    ) -> Result<Self> {
        let state = StateVector::init_n_qubit(n_qubit)?;
        if !measurement_error.is_empty() && measurement_error.len() != n_qubit {
            return Err(SimulatorError::MeasurementErrorLength {
                expected: n_qubit,
                got: measurement_error.len(),
            });
        }
        let mut model = model;
        model.set_readout_error(measurement_error)?;
        Ok(NoisySimulator {
            num_qubits: n_qubit,
            state,
            model,
            policy,
            opcodes: Vec::new(),
            original_opcodes: Vec::new(),
            measure_qubits: Vec::new(),
            rng: StdRng::from_entropy(),
        })
    }

    /// Simulator with global noise: every channel in `noise_description`
    /// fires after every recorded gate.
    pub fn new(
        n_qubit: usize,
        noise_description: &BTreeMap<String, f64>,
        measurement_error: Vec<[f64; 2]>,
    ) -> Result<Self> {
        let mut model = NoiseModel::new();
        model.load_global(noise_description)?;
        Self::build(n_qubit, model, NoisePolicy::Global, measurement_error)
    }

    /// Simulator with global plus per-gate-kind noise.
    pub fn new_gate_dependent(
        n_qubit: usize,
        noise_description: &BTreeMap<String, f64>,
        gate_noise_description: &BTreeMap<String, BTreeMap<String, f64>>,
        measurement_error: Vec<[f64; 2]>,
    ) -> Result<Self> {
        let mut model = NoiseModel::new();
        model.load_global(noise_description)?;
        model.load_gate_dependent(gate_noise_description)?;
        Self::build(n_qubit, model, NoisePolicy::GateDependent, measurement_error)
    }

    /// Simulator with global plus gate-and-qubit-specific noise, including
    /// crosstalk entries keyed by (gate, (acting qubit, partner)).
    pub fn new_gate_specific(
        n_qubit: usize,
        noise_description: &BTreeMap<String, f64>,
        gate_error_1q: &BTreeMap<(String, usize), BTreeMap<String, f64>>,
        gate_error_2q: &BTreeMap<(String, (usize, usize)), BTreeMap<String, f64>>,
        measurement_error: Vec<[f64; 2]>,
    ) -> Result<Self> {
        let mut model = NoiseModel::new();
        model.load_global(noise_description)?;
        model.load_gate_error_1q(gate_error_1q)?;
        model.load_gate_error_2q(gate_error_2q)?;
        Self::build(n_qubit, model, NoisePolicy::GateSpecific, measurement_error)
    }

    /// Reseeds the simulator's random source. Fixing the seed before a shot
    /// loop makes the histogram reproducible bit for bit.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Amplitudes after the most recent `execute_once`.
    pub fn state(&self) -> &Array1<Complex64> {
        &self.state.amplitudes
    }

    /// The executing stream, noise opcodes included.
    pub fn opcodes(&self) -> &[Opcode] {
        &self.opcodes
    }

    /// The recorded program without inserted noise.
    pub fn original_opcodes(&self) -> &[Opcode] {
        &self.original_opcodes
    }

    // ==========================================================================
    // Recording
    // ==========================================================================

    /// Validates one gate call, then appends it to both streams and its noise
    /// opcodes to the noisy stream. On error neither stream changes.
    fn record(
        &mut self,
        kind: GateKind,
        qubits: Vec<usize>,
        parameters: Vec<f64>,
        dagger: bool,
        controller: &[usize],
    ) -> Result<()> {
        if qubits.len() != kind.qubit_count() {
            return Err(SimulatorError::ArityMismatch {
                gate: kind.token(),
                expected: kind.qubit_count(),
                got: qubits.len(),
            });
        }
        if parameters.len() != kind.parameter_count() {
            return Err(SimulatorError::ParameterCount {
                gate: kind.token(),
                expected: kind.parameter_count(),
                got: parameters.len(),
            });
        }
        for (i, &q) in qubits.iter().enumerate() {
            if q >= self.num_qubits {
                return Err(SimulatorError::InvalidQubit {
                    qubit: q,
                    total: self.num_qubits,
                });
            }
            if qubits[..i].contains(&q) {
                return Err(SimulatorError::ControlOverlap);
            }
        }
        for &c in controller {
            if c >= self.num_qubits {
                return Err(SimulatorError::InvalidQubit {
                    qubit: c,
                    total: self.num_qubits,
                });
            }
            if qubits.contains(&c) {
                return Err(SimulatorError::ControlOverlap);
            }
        }

        let mut noise_ops = Vec::new();
        self.model
            .insert_error(self.policy, kind, &qubits, &mut noise_ops)?;

        let op = Opcode::gate(kind, qubits, parameters, dagger, controller.to_vec());
        self.original_opcodes.push(op.clone());
        self.opcodes.push(op);
        self.opcodes.append(&mut noise_ops);
        Ok(())
    }

    /// Records a gate by its name token; the generic entry point for drivers
    /// that carry gates as strings.
    pub fn load_opcode(
        &mut self,
        opstr: &str,
        qubits: &[usize],
        parameters: &[f64],
        dagger: bool,
        global_controller: &[usize],
    ) -> Result<()> {
        let kind = GateKind::from_token(opstr)?;
        self.record(
            kind,
            qubits.to_vec(),
            parameters.to_vec(),
            dagger,
            global_controller,
        )
    }

    pub fn identity(&mut self, qn: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Identity, vec![qn], vec![], dagger, controller)
    }

    pub fn hadamard(&mut self, qn: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Hadamard, vec![qn], vec![], dagger, controller)
    }

    /// Records a raw 2x2 unitary, flattened row-major into 8 parameters.
    pub fn u22(
        &mut self,
        qn: usize,
        unitary: &Array2<Complex64>,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        let mut parameters = Vec::with_capacity(8);
        for r in 0..2 {
            for c in 0..2 {
                parameters.push(unitary[[r, c]].re);
                parameters.push(unitary[[r, c]].im);
            }
        }
        self.record(GateKind::U22, vec![qn], parameters, dagger, controller)
    }

    pub fn x(&mut self, qn: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::X, vec![qn], vec![], dagger, controller)
    }

    pub fn y(&mut self, qn: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Y, vec![qn], vec![], dagger, controller)
    }

    pub fn z(&mut self, qn: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Z, vec![qn], vec![], dagger, controller)
    }

    pub fn sx(&mut self, qn: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Sx, vec![qn], vec![], dagger, controller)
    }

    pub fn s(&mut self, qn: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::S, vec![qn], vec![], dagger, controller)
    }

    pub fn t(&mut self, qn: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::T, vec![qn], vec![], dagger, controller)
    }

    pub fn cz(&mut self, qn1: usize, qn2: usize, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Cz, vec![qn1, qn2], vec![], dagger, controller)
    }

    pub fn swap(
        &mut self,
        qn1: usize,
        qn2: usize,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Swap, vec![qn1, qn2], vec![], dagger, controller)
    }

    pub fn iswap(
        &mut self,
        qn1: usize,
        qn2: usize,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Iswap, vec![qn1, qn2], vec![], dagger, controller)
    }

    pub fn xy(
        &mut self,
        qn1: usize,
        qn2: usize,
        theta: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Xy, vec![qn1, qn2], vec![theta], dagger, controller)
    }

    pub fn cnot(
        &mut self,
        controller_qubit: usize,
        target: usize,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(
            GateKind::Cnot,
            vec![controller_qubit, target],
            vec![],
            dagger,
            controller,
        )
    }

    pub fn rx(&mut self, qn: usize, theta: f64, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Rx, vec![qn], vec![theta], dagger, controller)
    }

    pub fn ry(&mut self, qn: usize, theta: f64, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Ry, vec![qn], vec![theta], dagger, controller)
    }

    pub fn rz(&mut self, qn: usize, theta: f64, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::Rz, vec![qn], vec![theta], dagger, controller)
    }

    pub fn u1(&mut self, qn: usize, lambda: f64, controller: &[usize], dagger: bool) -> Result<()> {
        self.record(GateKind::U1, vec![qn], vec![lambda], dagger, controller)
    }

    pub fn u2(
        &mut self,
        qn: usize,
        phi: f64,
        lambda: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::U2, vec![qn], vec![phi, lambda], dagger, controller)
    }

    pub fn u3(
        &mut self,
        qn: usize,
        theta: f64,
        phi: f64,
        lambda: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(
            GateKind::U3,
            vec![qn],
            vec![theta, phi, lambda],
            dagger,
            controller,
        )
    }

    pub fn rphi90(
        &mut self,
        qn: usize,
        phi: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Rphi90, vec![qn], vec![phi], dagger, controller)
    }

    pub fn rphi180(
        &mut self,
        qn: usize,
        phi: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Rphi180, vec![qn], vec![phi], dagger, controller)
    }

    pub fn rphi(
        &mut self,
        qn: usize,
        theta: f64,
        phi: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Rphi, vec![qn], vec![theta, phi], dagger, controller)
    }

    pub fn toffoli(
        &mut self,
        qn1: usize,
        qn2: usize,
        target: usize,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(
            GateKind::Toffoli,
            vec![qn1, qn2, target],
            vec![],
            dagger,
            controller,
        )
    }

    pub fn cswap(
        &mut self,
        controller_qubit: usize,
        target1: usize,
        target2: usize,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(
            GateKind::Cswap,
            vec![controller_qubit, target1, target2],
            vec![],
            dagger,
            controller,
        )
    }

    pub fn zz(
        &mut self,
        qn1: usize,
        qn2: usize,
        theta: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Zz, vec![qn1, qn2], vec![theta], dagger, controller)
    }

    pub fn xx(
        &mut self,
        qn1: usize,
        qn2: usize,
        theta: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Xx, vec![qn1, qn2], vec![theta], dagger, controller)
    }

    pub fn yy(
        &mut self,
        qn1: usize,
        qn2: usize,
        theta: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(GateKind::Yy, vec![qn1, qn2], vec![theta], dagger, controller)
    }

    pub fn phase2q(
        &mut self,
        qn1: usize,
        qn2: usize,
        theta1: f64,
        theta2: f64,
        thetazz: f64,
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(
            GateKind::Phase2q,
            vec![qn1, qn2],
            vec![theta1, theta2, thetazz],
            dagger,
            controller,
        )
    }

    pub fn uu15(
        &mut self,
        qn1: usize,
        qn2: usize,
        parameters: &[f64],
        controller: &[usize],
        dagger: bool,
    ) -> Result<()> {
        self.record(
            GateKind::Uu15,
            vec![qn1, qn2],
            parameters.to_vec(),
            dagger,
            controller,
        )
    }

    // ==========================================================================
    // Replay and measurement
    // ==========================================================================

    /// Resets to |0...0> and replays the noisy stream in insertion order.
    pub fn execute_once(&mut self) -> Result<()> {
        self.state.reset_zero();
        let Self {
            state,
            rng,
            opcodes,
            ..
        } = self;
        for opcode in opcodes.iter() {
            match opcode.op {
                OpKind::Gate(kind) => gates::apply(
                    state,
                    kind,
                    &opcode.qubits,
                    &opcode.parameters,
                    &opcode.global_controller,
                    opcode.dagger,
                )?,
                OpKind::Noise(kind) => {
                    let p = opcode.parameters[0];
                    match kind {
                        NoiseKind::TwoQubitDepolarizing => {
                            if opcode.qubits.len() != 2 {
                                return Err(SimulatorError::UnsupportedNoiseArity(
                                    opcode.qubits.len(),
                                ));
                            }
                            channels::twoqubit_depolarizing(
                                state,
                                opcode.qubits[0],
                                opcode.qubits[1],
                                p,
                                rng,
                            )?;
                        }
                        // A multi-qubit noise opcode applies the 1-qubit
                        // channel to each listed qubit independently.
                        NoiseKind::Depolarizing => {
                            for &q in &opcode.qubits {
                                channels::depolarizing(state, q, p, rng)?;
                            }
                        }
                        NoiseKind::Damping => {
                            for &q in &opcode.qubits {
                                channels::amplitude_damping(state, q, p, rng)?;
                            }
                        }
                        NoiseKind::BitFlip => {
                            for &q in &opcode.qubits {
                                channels::bitflip(state, q, p, rng)?;
                            }
                        }
                        NoiseKind::PhaseFlip => {
                            for &q in &opcode.qubits {
                                channels::phaseflip(state, q, p, rng)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_measure_list(&self, measure_list: &[usize]) -> Result<()> {
        for (i, &q) in measure_list.iter().enumerate() {
            if q >= self.num_qubits || measure_list[..i].contains(&q) {
                return Err(SimulatorError::InvalidMeasureQubit(q));
            }
        }
        Ok(())
    }

    /// Sets the measurement plan without executing anything.
    pub fn measure(&mut self, measure_list: &[usize]) -> Result<()> {
        self.check_measure_list(measure_list)?;
        self.measure_qubits = measure_list.to_vec();
        Ok(())
    }

    /// Samples one basis index by cumulative-probability inversion.
    fn sample_basis_index(&mut self) -> Result<usize> {
        let mut r: f64 = self.rng.gen();
        for i in 0..self.state.dimension() {
            let p = self.state.probability(i);
            if r < p {
                return Ok(i);
            }
            r -= p;
        }
        Err(SimulatorError::SamplerExhausted)
    }

    /// Flips each bit of the sampled outcome independently per the readout
    /// table. A no-op when the table is empty.
    fn apply_readout_error(&mut self, mut index: usize) -> usize {
        let Self { model, rng, .. } = self;
        let table = model.readout_error();
        for (i, entry) in table.iter().enumerate() {
            // A zero-rate entry must not consume a draw, so that an all-zero
            // table replays the exact same stream as a disabled one.
            if entry[0] == 0.0 && entry[1] == 0.0 {
                continue;
            }
            let r: f64 = rng.gen();
            let bit = 1usize << i;
            if index & bit != 0 {
                if r < entry[1] {
                    index -= bit;
                }
            } else if r < entry[0] {
                index += bit;
            }
        }
        index
    }

    /// Runs the shot loop over an explicit measurement plan. Each shot
    /// replays the circuit, samples an outcome, applies readout error, and
    /// packs the planned bits into the histogram key.
    pub fn measure_shots(
        &mut self,
        measure_list: &[usize],
        shots: usize,
    ) -> Result<FxHashMap<usize, usize>> {
        self.measure(measure_list)?;
        let mut histogram = FxHashMap::default();
        for _ in 0..shots {
            self.execute_once()?;
            let sampled = self.sample_basis_index()?;
            let observed = self.apply_readout_error(sampled);
            let packed = pack_measured_bits(&self.measure_qubits, observed);
            *histogram.entry(packed).or_insert(0) += 1;
        }
        Ok(histogram)
    }

    /// Shot loop over the full register.
    pub fn measure_shots_all(&mut self, shots: usize) -> Result<FxHashMap<usize, usize>> {
        let all: Vec<usize> = (0..self.num_qubits).collect();
        self.measure_shots(&all, shots)
    }

    /// Exact outcome distribution over the current measurement plan, computed
    /// from the amplitudes of the latest `execute_once` (no sampling, no
    /// readout error). An empty plan means the full register.
    pub fn probabilities(&self) -> Result<Vec<f64>> {
        let full: Vec<usize>;
        let plan: &[usize] = if self.measure_qubits.is_empty() {
            full = (0..self.num_qubits).collect();
            &full
        } else {
            &self.measure_qubits
        };
        let mut probs = vec![0.0; 1 << plan.len()];
        for i in 0..self.state.dimension() {
            probs[pack_measured_bits(plan, i)] += self.state.probability(i);
        }
        Ok(probs)
    }
}

/// Human-readable top-outcomes view of a shot histogram.
pub fn summarize_counts(counts: &FxHashMap<usize, usize>, num_bits: usize) -> String {
    let shots: usize = counts.values().sum();
    let mut outcomes: Vec<(usize, usize)> = counts.iter().map(|(&k, &v)| (k, v)).collect();
    outcomes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut s = format!("{} shots over {} bit(s)\n", shots, num_bits);
    for (state, count) in outcomes.iter().take(5) {
        let bits: String = (0..num_bits)
            .rev()
            .map(|i| if (state >> i) & 1 == 1 { '1' } else { '0' })
            .collect();
        let pct = 100.0 * *count as f64 / shots.max(1) as f64;
        s.push_str(&format!("  |{}>: {} ({:.2}%)\n", bits, count, pct));
    }
    s
}

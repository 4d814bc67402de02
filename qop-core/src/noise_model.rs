//! Noise configuration and the three insertion policies.
//!
//! The recorder asks the model for noise opcodes immediately after each gate.
//! Every policy starts with the global block; the gate-dependent and
//! gate-and-qubit-specific policies add their own blocks after it. All maps
//! are ordered, so a fixed configuration always yields the same opcode
//! sequence.

use std::collections::BTreeMap;

use crate::error::{Result, SimulatorError};
use crate::opcode::{GateKind, NoiseKind, Opcode};

/// Per-noise-type probability table, keyed by noise kind.
pub type NoiseTable = BTreeMap<NoiseKind, f64>;

/// Which insertion strategy the simulator runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoisePolicy {
    /// Global channels after every gate.
    #[default]
    Global,
    /// Global, then per-gate-kind channels.
    GateDependent,
    /// Global, then per-(gate, qubit) and per-(gate, qubit-pair) channels,
    /// including crosstalk entries for 1-qubit gates.
    GateSpecific,
}

/// Immutable-after-construction noise description.
#[derive(Debug, Clone, Default)]
pub struct NoiseModel {
    global: NoiseTable,
    gate_dependent: BTreeMap<GateKind, NoiseTable>,
    gate_error_1q: BTreeMap<(GateKind, usize), NoiseTable>,
    gate_error_2q: BTreeMap<(GateKind, (usize, usize)), NoiseTable>,
    readout_error: Vec<[f64; 2]>,
}

fn check_probability(p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) || p.is_nan() {
        return Err(SimulatorError::InvalidProbability(p));
    }
    Ok(())
}

fn parse_noise_table(desc: &BTreeMap<String, f64>) -> Result<NoiseTable> {
    let mut table = NoiseTable::new();
    for (token, &p) in desc {
        check_probability(p)?;
        table.insert(NoiseKind::from_token(token)?, p);
    }
    Ok(table)
}

impl NoiseModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the global per-noise-type table from string tokens.
    pub fn load_global(&mut self, desc: &BTreeMap<String, f64>) -> Result<()> {
        self.global = parse_noise_table(desc)?;
        Ok(())
    }

    /// Loads the per-gate-kind table from string tokens.
    pub fn load_gate_dependent(
        &mut self,
        desc: &BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Result<()> {
        for (gate_token, noise_desc) in desc {
            let gate = GateKind::from_token(gate_token)?;
            self.gate_dependent.insert(gate, parse_noise_table(noise_desc)?);
        }
        Ok(())
    }

    /// Loads per-(gate, qubit) entries. Also accepts 2-qubit gate kinds so a
    /// two-qubit gate can carry local error on each of its qubits.
    pub fn load_gate_error_1q(
        &mut self,
        desc: &BTreeMap<(String, usize), BTreeMap<String, f64>>,
    ) -> Result<()> {
        for ((gate_token, qubit), noise_desc) in desc {
            let gate = GateKind::from_token(gate_token)?;
            self.gate_error_1q
                .insert((gate, *qubit), parse_noise_table(noise_desc)?);
        }
        Ok(())
    }

    /// Loads per-(gate, qubit-pair) entries. For a 1-qubit gate kind the pair
    /// reads (acting qubit, crosstalk partner).
    pub fn load_gate_error_2q(
        &mut self,
        desc: &BTreeMap<(String, (usize, usize)), BTreeMap<String, f64>>,
    ) -> Result<()> {
        for ((gate_token, pair), noise_desc) in desc {
            let gate = GateKind::from_token(gate_token)?;
            if gate.qubit_count() > 2 {
                return Err(SimulatorError::UnsupportedNoiseArity(gate.qubit_count()));
            }
            self.gate_error_2q
                .insert((gate, *pair), parse_noise_table(noise_desc)?);
        }
        Ok(())
    }

    /// Installs the per-qubit readout flip table; an empty table disables
    /// readout error.
    pub fn set_readout_error(&mut self, table: Vec<[f64; 2]>) -> Result<()> {
        for entry in &table {
            check_probability(entry[0])?;
            check_probability(entry[1])?;
        }
        self.readout_error = table;
        Ok(())
    }

    pub fn readout_error(&self) -> &[[f64; 2]] {
        &self.readout_error
    }

    fn push_table(qubits: &[usize], table: &NoiseTable, out: &mut Vec<Opcode>) {
        for (&kind, &p) in table {
            out.push(Opcode::noise(kind, qubits.to_vec(), p));
        }
    }

    /// Appends the noise opcodes the policy dictates for one recorded gate.
    ///
    /// Order: global block first; then, for GateSpecific, the arity-2 block
    /// before the arity-1 blocks on a 2-qubit gate, and the arity-1 block
    /// before the crosstalk pairs on a 1-qubit gate.
    pub fn insert_error(
        &self,
        policy: NoisePolicy,
        gate: GateKind,
        qubits: &[usize],
        out: &mut Vec<Opcode>,
    ) -> Result<()> {
        Self::push_table(qubits, &self.global, out);

        match policy {
            NoisePolicy::Global => {}
            NoisePolicy::GateDependent => {
                if let Some(table) = self.gate_dependent.get(&gate) {
                    Self::push_table(qubits, table, out);
                }
            }
            NoisePolicy::GateSpecific => match qubits.len() {
                1 => {
                    let q = qubits[0];
                    if let Some(table) = self.gate_error_1q.get(&(gate, q)) {
                        Self::push_table(&[q], table, out);
                    }
                    // Crosstalk: any pair entry whose first qubit is the
                    // acting qubit fires on (q, partner).
                    for ((_, (_, partner)), table) in self
                        .gate_error_2q
                        .range((gate, (q, 0))..=(gate, (q, usize::MAX)))
                    {
                        Self::push_table(&[q, *partner], table, out);
                    }
                }
                2 => {
                    let (q1, q2) = (qubits[0], qubits[1]);
                    if let Some(table) = self.gate_error_2q.get(&(gate, (q1, q2))) {
                        Self::push_table(&[q1, q2], table, out);
                    }
                    if let Some(table) = self.gate_error_1q.get(&(gate, q1)) {
                        Self::push_table(&[q1], table, out);
                    }
                    if let Some(table) = self.gate_error_1q.get(&(gate, q2)) {
                        Self::push_table(&[q2], table, out);
                    }
                }
                n => return Err(SimulatorError::UnsupportedNoiseArity(n)),
            },
        }
        Ok(())
    }
}

pub mod channels; // Stochastic noise channels (Pauli + amplitude damping)
pub mod error;
pub mod gates; // Gate catalogue and replay dispatch
pub mod noise_model; // Noise configuration + insertion policies
pub mod opcode; // Tagged opcode stream elements
pub mod ops; // Amplitude kernel over the dense state vector
pub mod simulator; // Recorder, replay loop, shot-based measurement
pub mod state;

pub use error::{Result, SimulatorError};
pub use noise_model::{NoiseModel, NoisePolicy, NoiseTable};
pub use opcode::{GateKind, NoiseKind, OpKind, Opcode};
pub use simulator::{summarize_counts, NoisySimulator};
pub use state::{StateVector, MAX_QUBIT_NUM};

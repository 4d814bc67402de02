//! Stochastic noise channels over the dense state vector.
//!
//! Each channel consumes exactly one uniform draw from the caller's RNG to
//! pick a branch, then applies the branch unitarily (Pauli channels) or as a
//! Kraus step with renormalization (amplitude damping).

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{Result, SimulatorError};
use crate::ops::{apply_x, apply_y, apply_z};
use crate::state::StateVector;

/// Tolerance for the Kraus branch-probability sum check.
const KRAUS_SUM_EPS: f64 = 1e-10;

fn check_probability(p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) || p.is_nan() {
        return Err(SimulatorError::InvalidProbability(p));
    }
    Ok(())
}

/// Symmetric single-qubit depolarizing: X, Y or Z, each with probability p/3.
pub fn depolarizing(state: &mut StateVector, qubit: usize, p: f64, rng: &mut StdRng) -> Result<()> {
    state.check_qubit(qubit)?;
    check_probability(p)?;
    let r: f64 = rng.gen();
    if r >= p {
        return Ok(());
    }
    if r < p / 3.0 {
        apply_x(state, qubit)
    } else if r < p / 3.0 * 2.0 {
        apply_y(state, qubit)
    } else {
        apply_z(state, qubit)
    }
}

pub fn bitflip(state: &mut StateVector, qubit: usize, p: f64, rng: &mut StdRng) -> Result<()> {
    state.check_qubit(qubit)?;
    check_probability(p)?;
    let r: f64 = rng.gen();
    if r < p {
        apply_x(state, qubit)?;
    }
    Ok(())
}

pub fn phaseflip(state: &mut StateVector, qubit: usize, p: f64, rng: &mut StdRng) -> Result<()> {
    state.check_qubit(qubit)?;
    check_probability(p)?;
    let r: f64 = rng.gen();
    if r < p {
        apply_z(state, qubit)?;
    }
    Ok(())
}

/// Two-qubit depolarizing: one of the 15 non-identity Pauli pairs, selected
/// uniformly by re-scaling the branch draw.
pub fn twoqubit_depolarizing(
    state: &mut StateVector,
    q1: usize,
    q2: usize,
    p: f64,
    rng: &mut StdRng,
) -> Result<()> {
    state.check_qubit(q1)?;
    state.check_qubit(q2)?;
    check_probability(p)?;
    let r: f64 = rng.gen();
    if r >= p {
        return Ok(());
    }

    // Pauli pair index: low two bits act on q1, high two on q2, 0..3 = I,X,Y,Z.
    let depol_case = (15.0 * r / p) as usize + 1;
    match depol_case % 4 {
        0 => {}
        1 => apply_x(state, q1)?,
        2 => apply_y(state, q1)?,
        3 => apply_z(state, q1)?,
        _ => unreachable!(),
    }
    match depol_case / 4 {
        0 => {}
        1 => apply_x(state, q2)?,
        2 => apply_y(state, q2)?,
        3 => apply_z(state, q2)?,
        _ => unreachable!(),
    }
    Ok(())
}

/// Amplitude damping with decay probability `p`.
///
/// Kraus pair: `E0 = diag(1, sqrt(1-p))`, `E1 = sqrt(p) |0><1|`. The decay
/// branch fires with `p1 = p * sum_{bit=1} |amp|^2`; both branches leave a
/// renormalized state.
pub fn amplitude_damping(
    state: &mut StateVector,
    qubit: usize,
    p: f64,
    rng: &mut StdRng,
) -> Result<()> {
    state.check_qubit(qubit)?;
    check_probability(p)?;

    let bit = 1usize << qubit;
    let mut excited = 0.0;
    let mut ground = 0.0;
    for i in 0..state.dimension() {
        if i & bit != 0 {
            excited += state.probability(i);
        } else {
            ground += state.probability(i);
        }
    }
    let p1 = p * excited;
    let p0 = ground + (1.0 - p) * excited;
    let sum = p0 + p1;
    if (sum - 1.0).abs() > KRAUS_SUM_EPS {
        return Err(SimulatorError::KrausNormalization { sum });
    }

    let r: f64 = rng.gen();
    if r < p1 {
        // E1: the qubit decays; every |1> amplitude moves to its |0> sibling.
        for k in 0..state.dimension() >> 1 {
            let low = k & (bit - 1);
            let i0 = ((k >> qubit) << (qubit + 1)) | low;
            let i1 = i0 | bit;
            state.amplitudes[i0] = state.amplitudes[i1];
            state.amplitudes[i1] = num_complex::Complex64::new(0.0, 0.0);
        }
    } else {
        // E0: no decay; the |1> amplitudes shrink.
        let scale = (1.0 - p).sqrt();
        for i in 0..state.dimension() {
            if i & bit != 0 {
                state.amplitudes[i] *= scale;
            }
        }
    }
    state.normalize();
    Ok(())
}

/// Collapses `qubit` to |0>, folding each |1> amplitude's weight into its
/// |0> sibling (phase of the |1> branch is discarded).
pub fn reset(state: &mut StateVector, qubit: usize) -> Result<()> {
    state.check_qubit(qubit)?;
    let bit = 1usize << qubit;
    for k in 0..state.dimension() >> 1 {
        let low = k & (bit - 1);
        let i0 = ((k >> qubit) << (qubit + 1)) | low;
        let i1 = i0 | bit;
        let weight = state.probability(i0) + state.probability(i1);
        state.amplitudes[i0] = num_complex::Complex64::new(weight.sqrt(), 0.0);
        state.amplitudes[i1] = num_complex::Complex64::new(0.0, 0.0);
    }
    state.normalize();
    Ok(())
}

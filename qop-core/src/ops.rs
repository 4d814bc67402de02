//! Amplitude kernel: in-place unitary application on the dense state vector.
//!
//! Basis indices use the little-endian convention: bit `q` of an index is the
//! value of qubit `q`. A 1-qubit update walks disjoint index pairs
//! `(i0, i1 = i0 | 1<<q)`; a 2-qubit update walks disjoint groups of four.
//! A control mask restricts either update to the subspace where every
//! controller qubit reads |1>.

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{Result, SimulatorError};
use crate::state::StateVector;

/// Builds the bit mask for a controller set, validating indices against the
/// register and disjointness against the target qubits.
fn control_mask(state: &StateVector, controls: &[usize], targets: &[usize]) -> Result<usize> {
    let mut mask = 0usize;
    for &c in controls {
        state.check_qubit(c)?;
        if targets.contains(&c) {
            return Err(SimulatorError::ControlOverlap);
        }
        mask |= 1 << c;
    }
    Ok(mask)
}

/// Applies a 2x2 unitary to `qubit`, restricted by `controls`.
///
/// With `dagger` set, the conjugate transpose is applied instead.
pub fn apply_unitary_1q(
    state: &mut StateVector,
    qubit: usize,
    gate: &Array2<Complex64>,
    controls: &[usize],
    dagger: bool,
) -> Result<()> {
    state.check_qubit(qubit)?;
    let cmask = control_mask(state, controls, &[qubit])?;

    let (u00, u01, u10, u11) = if dagger {
        (
            gate[[0, 0]].conj(),
            gate[[1, 0]].conj(),
            gate[[0, 1]].conj(),
            gate[[1, 1]].conj(),
        )
    } else {
        (gate[[0, 0]], gate[[0, 1]], gate[[1, 0]], gate[[1, 1]])
    };

    let bit = 1usize << qubit;
    // Enumerate pair bases by re-inserting a 0 at the target bit position.
    for k in 0..state.dimension() >> 1 {
        let low = k & (bit - 1);
        let i0 = ((k >> qubit) << (qubit + 1)) | low;
        if i0 & cmask != cmask {
            continue;
        }
        let i1 = i0 | bit;

        let alpha = state.amplitudes[i0];
        let beta = state.amplitudes[i1];
        state.amplitudes[i0] = u00 * alpha + u01 * beta;
        state.amplitudes[i1] = u10 * alpha + u11 * beta;
    }
    Ok(())
}

/// Applies a 4x4 unitary to the ordered pair `(q1, q2)`, restricted by
/// `controls`.
///
/// The 4-vector handed to the matrix is ordered by `(bit_q2, bit_q1)` as
/// `00, 01, 10, 11`, i.e. `q2` is the high bit of the matrix index.
pub fn apply_unitary_2q(
    state: &mut StateVector,
    q1: usize,
    q2: usize,
    gate: &Array2<Complex64>,
    controls: &[usize],
    dagger: bool,
) -> Result<()> {
    state.check_qubit(q1)?;
    state.check_qubit(q2)?;
    if q1 == q2 {
        return Err(SimulatorError::ControlOverlap);
    }
    let cmask = control_mask(state, controls, &[q1, q2])?;

    let mut u = [[Complex64::new(0.0, 0.0); 4]; 4];
    for r in 0..4 {
        for c in 0..4 {
            u[r][c] = if dagger {
                gate[[c, r]].conj()
            } else {
                gate[[r, c]]
            };
        }
    }

    let bit1 = 1usize << q1;
    let bit2 = 1usize << q2;
    let (p1, p2) = if q1 < q2 { (q1, q2) } else { (q2, q1) };

    for k in 0..state.dimension() >> 2 {
        // Re-insert 0s at the two target bit positions, lowest first.
        let low = k & ((1 << p1) - 1);
        let k1 = ((k >> p1) << (p1 + 1)) | low;
        let low2 = k1 & ((1 << p2) - 1);
        let base = ((k1 >> p2) << (p2 + 1)) | low2;
        if base & cmask != cmask {
            continue;
        }

        let idx = [base, base | bit1, base | bit2, base | bit1 | bit2];
        let src = [
            state.amplitudes[idx[0]],
            state.amplitudes[idx[1]],
            state.amplitudes[idx[2]],
            state.amplitudes[idx[3]],
        ];

        for r in 0..4 {
            let mut acc = Complex64::new(0.0, 0.0);
            for c in 0..4 {
                acc += u[r][c] * src[c];
            }
            state.amplitudes[idx[r]] = acc;
        }
    }
    Ok(())
}

/// Pauli X on `qubit`: swaps each |0>/|1> amplitude pair.
pub fn apply_x(state: &mut StateVector, qubit: usize) -> Result<()> {
    state.check_qubit(qubit)?;
    let bit = 1usize << qubit;
    for k in 0..state.dimension() >> 1 {
        let low = k & (bit - 1);
        let i0 = ((k >> qubit) << (qubit + 1)) | low;
        let i1 = i0 | bit;
        state.amplitudes.swap(i0, i1);
    }
    Ok(())
}

/// Pauli Y on `qubit`: swap with +-i phases.
pub fn apply_y(state: &mut StateVector, qubit: usize) -> Result<()> {
    state.check_qubit(qubit)?;
    let bit = 1usize << qubit;
    let i_pos = Complex64::new(0.0, 1.0);
    let i_neg = Complex64::new(0.0, -1.0);
    for k in 0..state.dimension() >> 1 {
        let low = k & (bit - 1);
        let i0 = ((k >> qubit) << (qubit + 1)) | low;
        let i1 = i0 | bit;
        let alpha = state.amplitudes[i0];
        state.amplitudes[i0] = i_neg * state.amplitudes[i1];
        state.amplitudes[i1] = i_pos * alpha;
    }
    Ok(())
}

/// Pauli Z on `qubit`: negates every |1> amplitude.
pub fn apply_z(state: &mut StateVector, qubit: usize) -> Result<()> {
    state.check_qubit(qubit)?;
    let bit = 1usize << qubit;
    for i in 0..state.dimension() {
        if i & bit != 0 {
            state.amplitudes[i] = -state.amplitudes[i];
        }
    }
    Ok(())
}

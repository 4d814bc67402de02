//! Gate catalogue: named matrix constructors and the replay-side dispatch
//! onto the amplitude kernel.
//!
//! Two-qubit matrices are written in the kernel's basis: the matrix index is
//! `(bit_q2 << 1) | bit_q1`, so the second qubit argument is the high bit.
//! Rotation gates use half-angle conventions (`Rx(theta) = exp(-i theta X/2)`
//! and so on); `U1/U2/U3` follow OpenQASM.

use ndarray::{array, Array2};
use num_complex::Complex64;

use crate::error::{Result, SimulatorError};
use crate::opcode::GateKind;
use crate::ops::{apply_unitary_1q, apply_unitary_2q};
use crate::state::StateVector;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn expi(theta: f64) -> Complex64 {
    Complex64::new(0.0, theta).exp()
}

// =============================================================================
// 2x2 constructors
// =============================================================================

pub fn hadamard() -> Array2<Complex64> {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    array![[c(h, 0.0), c(h, 0.0)], [c(h, 0.0), c(-h, 0.0)]]
}

pub fn pauli_x() -> Array2<Complex64> {
    array![[ZERO, ONE], [ONE, ZERO]]
}

pub fn pauli_y() -> Array2<Complex64> {
    array![[ZERO, c(0.0, -1.0)], [c(0.0, 1.0), ZERO]]
}

pub fn pauli_z() -> Array2<Complex64> {
    array![[ONE, ZERO], [ZERO, c(-1.0, 0.0)]]
}

/// Square root of X.
pub fn sx() -> Array2<Complex64> {
    array![
        [c(0.5, 0.5), c(0.5, -0.5)],
        [c(0.5, -0.5), c(0.5, 0.5)]
    ]
}

pub fn s_gate() -> Array2<Complex64> {
    array![[ONE, ZERO], [ZERO, c(0.0, 1.0)]]
}

pub fn t_gate() -> Array2<Complex64> {
    array![[ONE, ZERO], [ZERO, expi(std::f64::consts::FRAC_PI_4)]]
}

pub fn rx(theta: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    array![[c(co, 0.0), c(0.0, -s)], [c(0.0, -s), c(co, 0.0)]]
}

pub fn ry(theta: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    array![[c(co, 0.0), c(-s, 0.0)], [c(s, 0.0), c(co, 0.0)]]
}

pub fn rz(theta: f64) -> Array2<Complex64> {
    array![[expi(-theta / 2.0), ZERO], [ZERO, expi(theta / 2.0)]]
}

pub fn u1(lambda: f64) -> Array2<Complex64> {
    array![[ONE, ZERO], [ZERO, expi(lambda)]]
}

pub fn u2(phi: f64, lambda: f64) -> Array2<Complex64> {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    array![
        [c(h, 0.0), -expi(lambda) * h],
        [expi(phi) * h, expi(phi + lambda) * h]
    ]
}

pub fn u3(theta: f64, phi: f64, lambda: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    array![
        [c(co, 0.0), -expi(lambda) * s],
        [expi(phi) * s, expi(phi + lambda) * co]
    ]
}

/// Rotation by `theta` around the axis `cos(phi) X + sin(phi) Y`.
pub fn rphi(theta: f64, phi: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    let mi = c(0.0, -1.0);
    array![
        [c(co, 0.0), mi * expi(-phi) * s],
        [mi * expi(phi) * s, c(co, 0.0)]
    ]
}

/// Raw 2x2 unitary from 8 flattened (re, im) parameters, row-major.
pub fn u22_from_params(p: &[f64]) -> Array2<Complex64> {
    array![
        [c(p[0], p[1]), c(p[2], p[3])],
        [c(p[4], p[5]), c(p[6], p[7])]
    ]
}

// =============================================================================
// 4x4 constructors
// =============================================================================

pub fn cz() -> Array2<Complex64> {
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, ONE, ZERO, ZERO],
        [ZERO, ZERO, ONE, ZERO],
        [ZERO, ZERO, ZERO, c(-1.0, 0.0)]
    ]
}

pub fn swap() -> Array2<Complex64> {
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, ZERO, ONE, ZERO],
        [ZERO, ONE, ZERO, ZERO],
        [ZERO, ZERO, ZERO, ONE]
    ]
}

pub fn iswap() -> Array2<Complex64> {
    let i = c(0.0, 1.0);
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, ZERO, i, ZERO],
        [ZERO, i, ZERO, ZERO],
        [ZERO, ZERO, ZERO, ONE]
    ]
}

/// `exp(-i theta (XX + YY) / 2)`: rotates within the |01>/|10> subspace.
pub fn xy(theta: f64) -> Array2<Complex64> {
    let (s, co) = theta.sin_cos();
    let mis = c(0.0, -s);
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, c(co, 0.0), mis, ZERO],
        [ZERO, mis, c(co, 0.0), ZERO],
        [ZERO, ZERO, ZERO, ONE]
    ]
}

/// First qubit argument is the control (the low bit of the matrix index).
pub fn cnot() -> Array2<Complex64> {
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, ZERO, ZERO, ONE],
        [ZERO, ZERO, ONE, ZERO],
        [ZERO, ONE, ZERO, ZERO]
    ]
}

/// `exp(-i theta/2 XX)`.
pub fn xx(theta: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    let d = c(co, 0.0);
    let o = c(0.0, -s);
    array![
        [d, ZERO, ZERO, o],
        [ZERO, d, o, ZERO],
        [ZERO, o, d, ZERO],
        [o, ZERO, ZERO, d]
    ]
}

/// `exp(-i theta/2 YY)`.
pub fn yy(theta: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    let d = c(co, 0.0);
    let o_neg = c(0.0, -s);
    let o_pos = c(0.0, s);
    array![
        [d, ZERO, ZERO, o_pos],
        [ZERO, d, o_neg, ZERO],
        [ZERO, o_neg, d, ZERO],
        [o_pos, ZERO, ZERO, d]
    ]
}

/// `exp(-i theta/2 ZZ)`.
pub fn zz(theta: f64) -> Array2<Complex64> {
    let minus = expi(-theta / 2.0);
    let plus = expi(theta / 2.0);
    array![
        [minus, ZERO, ZERO, ZERO],
        [ZERO, plus, ZERO, ZERO],
        [ZERO, ZERO, plus, ZERO],
        [ZERO, ZERO, ZERO, minus]
    ]
}

/// Independent phases on each qubit plus a ZZ coupling phase.
pub fn phase2q(theta1: f64, theta2: f64, thetazz: f64) -> Array2<Complex64> {
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, expi(theta1), ZERO, ZERO],
        [ZERO, ZERO, expi(theta2), ZERO],
        [ZERO, ZERO, ZERO, expi(theta1 + theta2 + thetazz)]
    ]
}

// =============================================================================
// Replay dispatch
// =============================================================================

fn check_shape(kind: GateKind, qubits: &[usize], params: &[f64]) -> Result<()> {
    if qubits.len() != kind.qubit_count() {
        return Err(SimulatorError::ArityMismatch {
            gate: kind.token(),
            expected: kind.qubit_count(),
            got: qubits.len(),
        });
    }
    if params.len() != kind.parameter_count() {
        return Err(SimulatorError::ParameterCount {
            gate: kind.token(),
            expected: kind.parameter_count(),
            got: params.len(),
        });
    }
    Ok(())
}

/// Applies one catalogue gate to the state through the amplitude kernel.
pub fn apply(
    state: &mut StateVector,
    kind: GateKind,
    qubits: &[usize],
    params: &[f64],
    controls: &[usize],
    dagger: bool,
) -> Result<()> {
    check_shape(kind, qubits, params)?;

    match kind {
        GateKind::Identity => state.check_qubit(qubits[0]),
        GateKind::Hadamard => apply_unitary_1q(state, qubits[0], &hadamard(), controls, dagger),
        GateKind::U22 => {
            apply_unitary_1q(state, qubits[0], &u22_from_params(params), controls, dagger)
        }
        GateKind::X => apply_unitary_1q(state, qubits[0], &pauli_x(), controls, dagger),
        GateKind::Y => apply_unitary_1q(state, qubits[0], &pauli_y(), controls, dagger),
        GateKind::Z => apply_unitary_1q(state, qubits[0], &pauli_z(), controls, dagger),
        GateKind::Sx => apply_unitary_1q(state, qubits[0], &sx(), controls, dagger),
        GateKind::S => apply_unitary_1q(state, qubits[0], &s_gate(), controls, dagger),
        GateKind::T => apply_unitary_1q(state, qubits[0], &t_gate(), controls, dagger),
        GateKind::Rx => apply_unitary_1q(state, qubits[0], &rx(params[0]), controls, dagger),
        GateKind::Ry => apply_unitary_1q(state, qubits[0], &ry(params[0]), controls, dagger),
        GateKind::Rz => apply_unitary_1q(state, qubits[0], &rz(params[0]), controls, dagger),
        GateKind::U1 => apply_unitary_1q(state, qubits[0], &u1(params[0]), controls, dagger),
        GateKind::U2 => {
            apply_unitary_1q(state, qubits[0], &u2(params[0], params[1]), controls, dagger)
        }
        GateKind::U3 => apply_unitary_1q(
            state,
            qubits[0],
            &u3(params[0], params[1], params[2]),
            controls,
            dagger,
        ),
        GateKind::Rphi90 => apply_unitary_1q(
            state,
            qubits[0],
            &rphi(std::f64::consts::FRAC_PI_2, params[0]),
            controls,
            dagger,
        ),
        GateKind::Rphi180 => apply_unitary_1q(
            state,
            qubits[0],
            &rphi(std::f64::consts::PI, params[0]),
            controls,
            dagger,
        ),
        GateKind::Rphi => {
            apply_unitary_1q(state, qubits[0], &rphi(params[0], params[1]), controls, dagger)
        }
        GateKind::Cz => apply_unitary_2q(state, qubits[0], qubits[1], &cz(), controls, dagger),
        GateKind::Swap => apply_unitary_2q(state, qubits[0], qubits[1], &swap(), controls, dagger),
        GateKind::Iswap => {
            apply_unitary_2q(state, qubits[0], qubits[1], &iswap(), controls, dagger)
        }
        GateKind::Xy => {
            apply_unitary_2q(state, qubits[0], qubits[1], &xy(params[0]), controls, dagger)
        }
        GateKind::Cnot => apply_unitary_2q(state, qubits[0], qubits[1], &cnot(), controls, dagger),
        GateKind::Xx => {
            apply_unitary_2q(state, qubits[0], qubits[1], &xx(params[0]), controls, dagger)
        }
        GateKind::Yy => {
            apply_unitary_2q(state, qubits[0], qubits[1], &yy(params[0]), controls, dagger)
        }
        GateKind::Zz => {
            apply_unitary_2q(state, qubits[0], qubits[1], &zz(params[0]), controls, dagger)
        }
        GateKind::Phase2q => apply_unitary_2q(
            state,
            qubits[0],
            qubits[1],
            &phase2q(params[0], params[1], params[2]),
            controls,
            dagger,
        ),
        GateKind::Toffoli => {
            // The two controls fold into the kernel's control mask.
            let mut merged = controls.to_vec();
            merged.push(qubits[0]);
            merged.push(qubits[1]);
            apply_unitary_1q(state, qubits[2], &pauli_x(), &merged, dagger)
        }
        GateKind::Cswap => {
            let mut merged = controls.to_vec();
            merged.push(qubits[0]);
            apply_unitary_2q(state, qubits[1], qubits[2], &swap(), &merged, dagger)
        }
        GateKind::Uu15 => apply_uu15(state, qubits[0], qubits[1], params, controls, dagger),
    }
}

/// Generic 15-parameter two-qubit unitary, applied as KAK layers:
/// U3 on each qubit (params 0-5), an XX/YY/ZZ core (params 6-8), then U3 on
/// each qubit again (params 9-14).
fn apply_uu15(
    state: &mut StateVector,
    q1: usize,
    q2: usize,
    p: &[f64],
    controls: &[usize],
    dagger: bool,
) -> Result<()> {
    let pre1 = u3(p[0], p[1], p[2]);
    let pre2 = u3(p[3], p[4], p[5]);
    let core_xx = xx(p[6]);
    let core_yy = yy(p[7]);
    let core_zz = zz(p[8]);
    let post1 = u3(p[9], p[10], p[11]);
    let post2 = u3(p[12], p[13], p[14]);

    if !dagger {
        apply_unitary_1q(state, q1, &pre1, controls, false)?;
        apply_unitary_1q(state, q2, &pre2, controls, false)?;
        apply_unitary_2q(state, q1, q2, &core_xx, controls, false)?;
        apply_unitary_2q(state, q1, q2, &core_yy, controls, false)?;
        apply_unitary_2q(state, q1, q2, &core_zz, controls, false)?;
        apply_unitary_1q(state, q1, &post1, controls, false)?;
        apply_unitary_1q(state, q2, &post2, controls, false)?;
    } else {
        apply_unitary_1q(state, q2, &post2, controls, true)?;
        apply_unitary_1q(state, q1, &post1, controls, true)?;
        apply_unitary_2q(state, q1, q2, &core_zz, controls, true)?;
        apply_unitary_2q(state, q1, q2, &core_yy, controls, true)?;
        apply_unitary_2q(state, q1, q2, &core_xx, controls, true)?;
        apply_unitary_1q(state, q2, &pre2, controls, true)?;
        apply_unitary_1q(state, q1, &pre1, controls, true)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unitary(m: &Array2<Complex64>) -> bool {
        let n = m.nrows();
        for r in 0..n {
            for s in 0..n {
                let mut acc = Complex64::new(0.0, 0.0);
                for k in 0..n {
                    acc += m[[k, r]].conj() * m[[k, s]];
                }
                let expected = if r == s { 1.0 } else { 0.0 };
                if (acc - Complex64::new(expected, 0.0)).norm() > 1e-9 {
                    return false;
                }
            }
        }
        true
    }

    #[test]
    fn test_catalogue_matrices_are_unitary() {
        for m in [
            hadamard(),
            pauli_x(),
            pauli_y(),
            pauli_z(),
            sx(),
            s_gate(),
            t_gate(),
            rx(0.7),
            ry(1.3),
            rz(-0.4),
            u1(0.9),
            u2(0.3, 1.1),
            u3(0.5, 1.7, -2.0),
            rphi(0.8, 2.1),
        ] {
            assert!(is_unitary(&m));
        }
        for m in [
            cz(),
            swap(),
            iswap(),
            xy(0.6),
            cnot(),
            xx(1.2),
            yy(0.4),
            zz(-1.5),
            phase2q(0.3, 0.7, 1.9),
        ] {
            assert!(is_unitary(&m));
        }
    }

    #[test]
    fn test_sx_squares_to_x() {
        let sx = sx();
        let sq = sx.dot(&sx);
        let x = pauli_x();
        for r in 0..2 {
            for cix in 0..2 {
                assert!((sq[[r, cix]] - x[[r, cix]]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_u3_reduces_to_ry_and_rz() {
        // U3(theta, 0, 0) == Ry(theta)
        let a = u3(0.9, 0.0, 0.0);
        let b = ry(0.9);
        for r in 0..2 {
            for cix in 0..2 {
                assert!((a[[r, cix]] - b[[r, cix]]).norm() < 1e-12);
            }
        }
        // U1(lambda) == Rz(lambda) up to global phase exp(i lambda / 2)
        let a = u1(0.7);
        let b = rz(0.7);
        let phase = expi(0.7 / 2.0);
        for r in 0..2 {
            for cix in 0..2 {
                assert!((a[[r, cix]] - phase * b[[r, cix]]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_rphi_axis_endpoints() {
        // phi = 0 rotates around X, phi = pi/2 around Y.
        let a = rphi(0.8, 0.0);
        let b = rx(0.8);
        for r in 0..2 {
            for cix in 0..2 {
                assert!((a[[r, cix]] - b[[r, cix]]).norm() < 1e-12);
            }
        }
        let a = rphi(0.8, std::f64::consts::FRAC_PI_2);
        let b = ry(0.8);
        for r in 0..2 {
            for cix in 0..2 {
                assert!((a[[r, cix]] - b[[r, cix]]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_cnot_flips_target_on_control() {
        // q1 = control in |1>, q2 = target.
        let mut state = StateVector::init_n_qubit(2).unwrap();
        apply(&mut state, GateKind::X, &[0], &[], &[], false).unwrap();
        apply(&mut state, GateKind::Cnot, &[0, 1], &[], &[], false).unwrap();
        assert!((state.probability(0b11) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_toffoli_truth_table() {
        let mut state = StateVector::init_n_qubit(3).unwrap();
        apply(&mut state, GateKind::X, &[0], &[], &[], false).unwrap();
        apply(&mut state, GateKind::X, &[1], &[], &[], false).unwrap();
        apply(&mut state, GateKind::Toffoli, &[0, 1, 2], &[], &[], false).unwrap();
        assert!((state.probability(0b111) - 1.0).abs() < 1e-12);

        // One control low: target untouched.
        let mut state = StateVector::init_n_qubit(3).unwrap();
        apply(&mut state, GateKind::X, &[0], &[], &[], false).unwrap();
        apply(&mut state, GateKind::Toffoli, &[0, 1, 2], &[], &[], false).unwrap();
        assert!((state.probability(0b001) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cswap_swaps_targets_under_control() {
        let mut state = StateVector::init_n_qubit(3).unwrap();
        apply(&mut state, GateKind::X, &[0], &[], &[], false).unwrap();
        apply(&mut state, GateKind::X, &[1], &[], &[], false).unwrap();
        apply(&mut state, GateKind::Cswap, &[0, 1, 2], &[], &[], false).unwrap();
        assert!((state.probability(0b101) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_uu15_dagger_roundtrip() {
        let p: Vec<f64> = (0..15).map(|i| 0.1 * (i as f64) - 0.6).collect();
        let mut state = StateVector::init_n_qubit(2).unwrap();
        apply(&mut state, GateKind::Hadamard, &[0], &[], &[], false).unwrap();
        let reference = state.clone();
        apply(&mut state, GateKind::Uu15, &[0, 1], &p, &[], false).unwrap();
        apply(&mut state, GateKind::Uu15, &[0, 1], &p, &[], true).unwrap();
        for i in 0..state.dimension() {
            assert!((state.amplitudes[i] - reference.amplitudes[i]).norm() < 1e-9);
        }
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let mut state = StateVector::init_n_qubit(2).unwrap();
        let err = apply(&mut state, GateKind::Cnot, &[0], &[], &[], false);
        assert!(matches!(err, Err(SimulatorError::ArityMismatch { .. })));
        let err = apply(&mut state, GateKind::Rx, &[0], &[], &[], false);
        assert!(matches!(err, Err(SimulatorError::ParameterCount { .. })));
    }
}

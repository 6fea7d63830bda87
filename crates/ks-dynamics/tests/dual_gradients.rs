//! Forward-mode derivatives of the keyed arm dynamics through dual numbers.

use ks_core::units::{kg, m, mps2};
use ks_dynamics::{DependentCoordinates, PartitionedModel, SensitivityOutput, dynamics_sensitivity};
use ks_model::{KeyParams, MARKER_FINGERTIP, PianoArm, RigidBodyModel};
use ks_solver::{HolonomicConstraintSolver, NewtonConfig};
use nalgebra::DVector;
use num_dual::Dual64;

const SHOULDER: f64 = -0.3;
const ELBOW: f64 = -1.0;
const QDOT_U: f64 = 0.4;
const TAU: [f64; 2] = [0.3, 0.2];

fn keyed_arm() -> PianoArm {
    let arm = PianoArm::new("arm", m(0.3), m(0.25), kg(2.0), kg(0.5), mps2(9.81)).unwrap();
    let tip = RigidBodyModel::<f64>::marker_position(
        &arm,
        MARKER_FINGERTIP,
        &DVector::from_vec(vec![SHOULDER, ELBOW]),
    )
    .unwrap();
    arm.with_key(KeyParams {
        contact_x: m(tip.x),
        top_y: m(tip.y),
        mass: kg(0.05),
    })
    .unwrap()
}

fn tight_solver() -> HolonomicConstraintSolver {
    HolonomicConstraintSolver::new(NewtonConfig {
        abs_tol: 1e-14,
        ..NewtonConfig::default()
    })
}

fn system<T: ks_core::Real>() -> PartitionedModel<T, PianoArm>
where
    PianoArm: RigidBodyModel<T>,
{
    PartitionedModel::with_default_partition(keyed_arm(), tight_solver()).unwrap()
}

fn dual(v: &[f64]) -> DVector<Dual64> {
    DVector::from_iterator(v.len(), v.iter().map(|&x| Dual64::from(x)))
}

fn assert_close(ad: f64, fd: f64) {
    let scale = ad.abs().max(1.0);
    assert!((ad - fd).abs() < 1e-6 * scale, "dual {ad} vs central difference {fd}");
}

#[test]
fn implicit_dependent_derivatives_match_converged_differences() {
    let fd_system = system::<f64>();
    let seed = DVector::from_vec(vec![ELBOW, 0.0]);
    let q_u = DVector::from_vec(vec![SHOULDER]);
    let qdot_u = DVector::from_vec(vec![QDOT_U]);
    let tau = DVector::from_vec(TAU.to_vec());

    let dual_system = system::<Dual64>();
    let dual_seed = dual(&[ELBOW, 0.0]);
    let dual_q_u = DVector::from_vec(vec![Dual64::new(SHOULDER, 1.0)]);
    let dual_qdot_u = dual(&[QDOT_U]);
    let dual_tau = dual(&TAU);

    let qddot_u = dual_system
        .forward_dynamics_implicit(&dual_q_u, &dual_qdot_u, Some(&dual_seed), &dual_tau)
        .unwrap();
    let lambda = dual_system
        .multipliers_implicit(&dual_q_u, &dual_qdot_u, Some(&dual_seed), &dual_tau)
        .unwrap();

    let fd_qddot = dynamics_sensitivity(
        &fd_system,
        SensitivityOutput::Acceleration,
        &q_u,
        &qdot_u,
        DependentCoordinates::Implicit(Some(&seed)),
        &tau,
        1e-6,
    )
    .unwrap();
    let fd_lambda = dynamics_sensitivity(
        &fd_system,
        SensitivityOutput::Multipliers,
        &q_u,
        &qdot_u,
        DependentCoordinates::Implicit(Some(&seed)),
        &tau,
        1e-6,
    )
    .unwrap();

    assert_eq!(qddot_u.len(), 1);
    assert_eq!(lambda.len(), 2);
    assert!(qddot_u[0].eps.abs() > 1e-3, "derivative should not vanish");
    assert_close(qddot_u[0].eps, fd_qddot.wrt_q_u[(0, 0)]);
    for (i, l) in lambda.iter().enumerate() {
        assert_close(l.eps, fd_lambda.wrt_q_u[(i, 0)]);
    }

    // The real parts are the plain f64 evaluation.
    let plain = fd_system
        .forward_dynamics_implicit(&q_u, &qdot_u, Some(&seed), &tau)
        .unwrap();
    assert!((qddot_u[0].re - plain[0]).abs() < 1e-12);
}

#[test]
fn explicit_dependent_derivative_with_respect_to_velocity() {
    let fd_system = system::<f64>();
    let q_u = DVector::from_vec(vec![SHOULDER]);
    let q_v = DVector::from_vec(vec![ELBOW, 0.0]);
    let qdot_u = DVector::from_vec(vec![QDOT_U]);
    let tau = DVector::from_vec(TAU.to_vec());

    let dual_system = system::<Dual64>();
    let qddot_u = dual_system
        .forward_dynamics_explicit(
            &dual(&[SHOULDER]),
            &dual(&[ELBOW, 0.0]),
            &DVector::from_vec(vec![Dual64::new(QDOT_U, 1.0)]),
            &dual(&TAU),
        )
        .unwrap();

    let fd = dynamics_sensitivity(
        &fd_system,
        SensitivityOutput::Acceleration,
        &q_u,
        &qdot_u,
        DependentCoordinates::Explicit(&q_v),
        &tau,
        1e-6,
    )
    .unwrap();
    assert_close(qddot_u[0].eps, fd.wrt_qdot_u[(0, 0)]);
}

//! Dependent-coordinate solves on the reference models.

use ks_core::units::{kg, m, mps2};
use ks_model::{KeyParams, PianoArm, PointMassPair, RigidBodyModel};
use ks_solver::{HolonomicConstraintSolver, NewtonConfig, SolverError};
use nalgebra::DVector;
use proptest::prelude::*;

fn keyed_arm() -> PianoArm {
    PianoArm::new("arm", m(0.3), m(0.25), kg(2.0), kg(0.5), mps2(9.81))
        .unwrap()
        .with_key(KeyParams {
            contact_x: m(0.35),
            top_y: m(-0.30),
            mass: kg(0.05),
        })
        .unwrap()
}

#[test]
fn arm_lands_on_key() {
    let arm = keyed_arm();
    let partition = RigidBodyModel::<f64>::default_partition(&arm).unwrap();
    let solver = HolonomicConstraintSolver::default();

    let u = DVector::from_vec(vec![-0.3]);
    let seed = DVector::from_vec(vec![-1.0, 0.0]);
    let v = solver.solve(&arm, &partition, &u, Some(&seed)).unwrap();

    let q = partition.expand(&u, &v);
    let g = RigidBodyModel::<f64>::constraint_residual(&arm, &q).unwrap();
    assert!(g.norm() < 1e-10);
    assert!((v[0] + 1.0144).abs() < 1e-3, "elbow = {}", v[0]);
    assert!((v[1] - 0.0305).abs() < 1e-3, "key = {}", v[1]);
}

#[test]
fn iteration_cap_is_an_error() {
    let arm = keyed_arm();
    let partition = RigidBodyModel::<f64>::default_partition(&arm).unwrap();
    let solver = HolonomicConstraintSolver::new(NewtonConfig {
        max_iterations: 1,
        ..NewtonConfig::default()
    });

    let u = DVector::from_vec(vec![-0.3]);
    let seed = DVector::from_vec(vec![-0.2, 0.3]);
    let err = solver.solve(&arm, &partition, &u, Some(&seed)).unwrap_err();
    assert!(matches!(err, SolverError::ConvergenceFailed { .. }), "{err}");
}

#[test]
fn solve_is_deterministic() {
    let arm = keyed_arm();
    let partition = RigidBodyModel::<f64>::default_partition(&arm).unwrap();
    let solver = HolonomicConstraintSolver::default();
    let u = DVector::from_vec(vec![-0.25]);
    let seed = DVector::from_vec(vec![-1.0, 0.0]);
    let a = solver.solve(&arm, &partition, &u, Some(&seed)).unwrap();
    let b = solver.solve(&arm, &partition, &u, Some(&seed)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn wrong_seed_length_is_a_model_error() {
    let arm = keyed_arm();
    let partition = RigidBodyModel::<f64>::default_partition(&arm).unwrap();
    let solver = HolonomicConstraintSolver::default();
    let u = DVector::from_vec(vec![-0.3]);
    let seed = DVector::from_vec(vec![-1.0]);
    assert!(matches!(
        solver.solve(&arm, &partition, &u, Some(&seed)),
        Err(SolverError::Model(_))
    ));
}

proptest! {
    #[test]
    fn pair_solutions_satisfy_constraint(x2 in -0.9_f64..0.9) {
        let pair = PointMassPair::new("pair", kg(1.0), kg(1.0), m(1.0), mps2(9.81)).unwrap();
        let partition = RigidBodyModel::<f64>::default_partition(&pair).unwrap();
        let solver = HolonomicConstraintSolver::default();

        let u = DVector::from_vec(vec![0.0, 0.0, x2]);
        let seed = DVector::from_vec(vec![-0.5]);
        let v = solver.solve(&pair, &partition, &u, Some(&seed)).unwrap();
        let g = RigidBodyModel::<f64>::constraint_residual(&pair, &partition.expand(&u, &v)).unwrap();
        prop_assert!(g.norm() < 1e-10);
        prop_assert!(v[0] < 0.0);
    }
}

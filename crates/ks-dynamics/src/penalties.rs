//! Marker and constraint terms evaluated on a partitioned model.

use crate::error::{DynamicsError, DynamicsResult};
use crate::forward::stack;
use crate::system::PartitionedModel;
use ks_core::Real;
use ks_model::RigidBodyModel;
use nalgebra::{DVector, Vector3};
use rayon::prelude::*;

fn pick_axes<T: Real>(p: &Vector3<T>, axes: &[usize]) -> DynamicsResult<DVector<T>> {
    if let Some(a) = axes.iter().find(|&&a| a > 2) {
        return Err(DynamicsError::configuration(format!("marker axis {a} out of range")));
    }
    Ok(DVector::from_iterator(axes.len(), axes.iter().map(|&a| p[a])))
}

fn check_marker<T: Real, M: RigidBodyModel<T>>(
    system: &PartitionedModel<T, M>,
    marker: usize,
) -> DynamicsResult<()> {
    let nb = system.model().nb_markers();
    if marker >= nb {
        return Err(DynamicsError::configuration(format!(
            "marker {marker} out of range for '{}' ({nb} markers)",
            system.model().name()
        )));
    }
    Ok(())
}

/// Position of `marker` along `axes`, with `v` solved from `q_u`.
pub fn track_marker<T: Real, M: RigidBodyModel<T>>(
    system: &PartitionedModel<T, M>,
    marker: usize,
    axes: &[usize],
    q_u: &DVector<T>,
    seed: Option<&DVector<T>>,
) -> DynamicsResult<DVector<T>> {
    check_marker(system, marker)?;
    let q = system.compute_q_from_u(q_u, seed)?;
    let p = system.model().marker_position(marker, &q)?;
    pick_axes(&p, axes)
}

/// `second − first` along `axes`, with `v` solved from `q_u` and the
/// solver's default seed.
pub fn superimpose_markers<T: Real, M: RigidBodyModel<T>>(
    system: &PartitionedModel<T, M>,
    first: usize,
    second: usize,
    axes: &[usize],
    q_u: &DVector<T>,
) -> DynamicsResult<DVector<T>> {
    check_marker(system, first)?;
    check_marker(system, second)?;
    let q = system.compute_q_from_u(q_u, None)?;
    let model = system.model();
    let diff = model.marker_position(second, &q)? - model.marker_position(first, &q)?;
    pick_axes(&diff, axes)
}

/// `g(expand(q_u, q_v))` at the end of a phase whose `v` is an algebraic state.
pub fn holonomic_constraint_end<T: Real, M: RigidBodyModel<T>>(
    system: &PartitionedModel<T, M>,
    q_u: &DVector<T>,
    q_v: &DVector<T>,
) -> DynamicsResult<DVector<T>> {
    let q = system.compute_q(q_u, q_v)?;
    Ok(system.model().constraint_residual(&q)?)
}

/// `g` at the node start followed by every intermediate collocation point,
/// stacked in order.
pub fn holonomic_constraint_nodes<T: Real, M: RigidBodyModel<T>>(
    system: &PartitionedModel<T, M>,
    nodes: &[(DVector<T>, DVector<T>)],
) -> DynamicsResult<DVector<T>> {
    let residuals = nodes
        .par_iter()
        .map(|(q_u, q_v)| holonomic_constraint_end(system, q_u, q_v))
        .collect::<DynamicsResult<Vec<_>>>()?;
    let parts: Vec<&DVector<T>> = residuals.iter().collect();
    Ok(stack(&parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_core::units::{kg, m, mps2};
    use ks_model::{KeyParams, MARKER_FINGERTIP, MARKER_KEY, PianoArm};
    use ks_solver::HolonomicConstraintSolver;

    fn keyed_arm() -> PartitionedModel<f64, PianoArm> {
        let arm = PianoArm::new("arm", m(0.3), m(0.25), kg(2.0), kg(0.5), mps2(9.81))
            .unwrap()
            .with_key(KeyParams {
                contact_x: m(0.35),
                top_y: m(-0.30),
                mass: kg(0.05),
            })
            .unwrap();
        let solver = HolonomicConstraintSolver::default()
            .with_default_seed(DVector::from_vec(vec![-1.0, 0.0]));
        PartitionedModel::with_default_partition(arm, solver).unwrap()
    }

    #[test]
    fn fingertip_sits_on_key_contact() {
        let system = keyed_arm();
        let q_u = DVector::from_vec(vec![-0.3]);
        let x = track_marker(&system, MARKER_FINGERTIP, &[0], &q_u, None).unwrap();
        assert!((x[0] - 0.35).abs() < 1e-9);
    }

    #[test]
    fn fingertip_and_key_coincide() {
        let system = keyed_arm();
        let q_u = DVector::from_vec(vec![-0.3]);
        let d = superimpose_markers(&system, MARKER_FINGERTIP, MARKER_KEY, &[0, 1], &q_u).unwrap();
        assert!(d.norm() < 1e-9);
    }

    #[test]
    fn marker_and_axis_bounds() {
        let system = keyed_arm();
        let q_u = DVector::from_vec(vec![-0.3]);
        assert!(track_marker(&system, 7, &[0], &q_u, None).is_err());
        assert!(track_marker(&system, MARKER_KEY, &[3], &q_u, None).is_err());
    }

    #[test]
    fn node_constraints_stack_in_order() {
        let system = keyed_arm();
        let on = system.compute_v(&DVector::from_vec(vec![-0.3]), None).unwrap();
        let nodes = vec![
            (DVector::from_vec(vec![-0.3]), on.clone()),
            (DVector::from_vec(vec![-0.3]), DVector::from_vec(vec![on[0], on[1] + 0.01])),
        ];
        let g = holonomic_constraint_nodes(&system, &nodes).unwrap();
        assert_eq!(g.len(), 4);
        assert!(g.rows(0, 2).norm() < 1e-9);
        // Pushing the key 1 cm further raises the key-height residual by 1 cm.
        assert!((g[3] - 0.01).abs() < 1e-9);
    }
}

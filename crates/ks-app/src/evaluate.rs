//! Evaluate a compiled scenario: accelerations, multipliers and junction
//! residuals at every phase boundary.

use ks_core::{Id, PhasePair};
use ks_dynamics::{
    holonomic_constraint_end, DependentCoordinates, DynamicsVariant, GeneralizedForceField,
    InequalityTerm,
};
use ks_model::RigidBodyModel;
use ks_phase::{
    dependent_seed_continuity, ControlType, PhaseBoundary, PhaseSide, PhaseTransitionEngine,
};
use nalgebra::DVector;
use rayon::prelude::*;
use serde::Serialize;

use crate::build::{PhaseRuntime, ScenarioRuntime, ScenarioSystem};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub phases: Vec<PhaseReport>,
    pub junctions: Vec<JunctionReport>,
    pub seed_continuity: Vec<SeedContinuityReport>,
    pub max_junction_residual: f64,
    pub policies_satisfied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub id: String,
    pub name: String,
    pub state: String,
    pub dynamics: String,
    pub nodes: Vec<NodeReport>,
    pub policies: Vec<PolicyReport>,
}

/// Kinematics and dynamics at one phase boundary.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub label: String,
    pub q: Vec<f64>,
    pub qdot: Vec<f64>,
    pub qddot: Vec<f64>,
    /// Constraint reactions; empty for unconstrained phases.
    pub lambda: Vec<f64>,
    /// `‖g(q)‖` at the node.
    pub constraint_residual: f64,
    pub markers: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyReport {
    pub node: String,
    pub policy: String,
    pub terms: Vec<TermReport>,
    pub satisfied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermReport {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    pub violation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JunctionReport {
    pub pre: String,
    pub post: String,
    pub evaluator: String,
    pub residual: Vec<f64>,
    pub norm: f64,
}

/// Seed continuity over the interval spanned by one phase.
#[derive(Debug, Clone, Serialize)]
pub struct SeedContinuityReport {
    pub phase: String,
    pub control: String,
    pub residual: Vec<f64>,
    pub norm: f64,
}

/// Evaluate every phase boundary and junction of a compiled scenario.
pub fn evaluate_scenario(runtime: &ScenarioRuntime) -> AppResult<ScenarioReport> {
    let phases = runtime
        .phases
        .par_iter()
        .map(|phase| evaluate_phase(runtime, phase))
        .collect::<AppResult<Vec<_>>>()?;

    let engine = PhaseTransitionEngine::default();
    let junctions = runtime
        .transitions
        .iter()
        .map(|t| -> AppResult<JunctionReport> {
            let pre = &runtime.phases[t.pre];
            let post = &runtime.phases[t.post];
            let pair = PhasePair::new(Id::from_index(t.pre as u32), Id::from_index(t.post as u32));
            let junction = engine.junction(pair, pre.state, post.state, t.evaluator)?;
            let pre_side = PhaseSide::new(pre.state, runtime.system(&pre.model_id)?, &pre.end)?;
            let post_side = PhaseSide::new(post.state, runtime.system(&post.model_id)?, &post.start)?;
            let residual = engine.evaluate(&junction, &pre_side, &post_side)?;
            Ok(JunctionReport {
                pre: pre.id.clone(),
                post: post.id.clone(),
                evaluator: format!("{:?}", junction.transition),
                norm: residual.norm(),
                residual: residual.as_slice().to_vec(),
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let mut seed_continuity = Vec::new();
    for phase in &runtime.phases {
        if let Some(report) = evaluate_seed_continuity(runtime, phase)? {
            seed_continuity.push(report);
        }
    }

    let max_junction_residual = junctions.iter().map(|j| j.norm).fold(0.0, f64::max);
    let policies_satisfied = phases
        .iter()
        .flat_map(|p| &p.policies)
        .all(|p| p.satisfied);

    tracing::info!(
        scenario = %runtime.name,
        phases = phases.len(),
        junctions = junctions.len(),
        max_junction_residual,
        policies_satisfied,
        "scenario evaluated"
    );

    Ok(ScenarioReport {
        name: runtime.name.clone(),
        phases,
        junctions,
        seed_continuity,
        max_junction_residual,
        policies_satisfied,
    })
}

/// Pretty-printed JSON form of a report.
pub fn report_to_json(report: &ScenarioReport) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn evaluate_phase(runtime: &ScenarioRuntime, phase: &PhaseRuntime) -> AppResult<PhaseReport> {
    let system = runtime.system(&phase.model_id)?;
    let force: Option<&dyn GeneralizedForceField<f64>> = match &phase.force_id {
        Some(id) if phase.dynamics == DynamicsVariant::ExplicitDependentWithForce => {
            Some(runtime.force(id)?)
        }
        _ => None,
    };

    let mut nodes = Vec::with_capacity(2);
    let mut policies = Vec::new();
    for (label, boundary) in [("start", &phase.start), ("end", &phase.end)] {
        let (node, lambda) = evaluate_node(system, phase, label, boundary, force)?;
        for (_, policy) in runtime.policies.iter().filter(|(id, _)| *id == phase.id) {
            let terms = policy.terms(&lambda)?;
            policies.push(PolicyReport {
                node: label.to_string(),
                policy: format!("{policy:?}"),
                satisfied: terms.iter().all(InequalityTerm::is_satisfied),
                terms: terms
                    .iter()
                    .map(|t| TermReport {
                        value: t.value,
                        lower: t.lower,
                        upper: t.upper,
                        violation: t.violation(),
                    })
                    .collect(),
            });
        }
        nodes.push(node);
    }

    tracing::debug!(phase = %phase.id, state = %phase.state, "phase evaluated");

    Ok(PhaseReport {
        id: phase.id.clone(),
        name: phase.name.clone(),
        state: phase.state.to_string(),
        dynamics: format!("{:?}", phase.dynamics),
        nodes,
        policies,
    })
}

fn evaluate_node(
    system: &ScenarioSystem,
    phase: &PhaseRuntime,
    label: &str,
    boundary: &PhaseBoundary<f64>,
    force: Option<&dyn GeneralizedForceField<f64>>,
) -> AppResult<(NodeReport, DVector<f64>)> {
    // Shape checks against the built system.
    PhaseSide::new(phase.state, system, boundary)?;
    let model = system.model();
    let actuated = RigidBodyModel::<f64>::actuated_dofs(model).len();
    let tau = boundary
        .tau()
        .cloned()
        .unwrap_or_else(|| DVector::zeros(actuated));

    let (q, qdot, qddot, lambda, residual) = match boundary {
        PhaseBoundary::Full(b) => {
            let qddot = system.forward_dynamics_full(&b.q, &b.qdot, &tau)?;
            let residual = model.constraint_residual(&b.q)?.norm();
            (b.q.clone(), b.qdot.clone(), qddot, DVector::zeros(0), residual)
        }
        PhaseBoundary::Holonomic(b) => {
            let dependent = match (&b.q_v, phase.dynamics.needs_explicit_dependent()) {
                (Some(q_v), true) => DependentCoordinates::Explicit(q_v),
                _ => DependentCoordinates::Implicit(b.q_v_init.as_ref()),
            };
            let q = system.resolve_q(&b.q_u, dependent)?;
            let acc = system.accelerations(&q, &b.qdot_u, &tau, force)?;
            let lambda = system.multipliers_from(&acc)?;
            let residual = match dependent {
                DependentCoordinates::Explicit(q_v) => {
                    holonomic_constraint_end(system, &b.q_u, q_v)?.norm()
                }
                DependentCoordinates::Implicit(_) => model.constraint_residual(&q)?.norm(),
            };
            (q, acc.kinematics.qdot, acc.qddot, lambda, residual)
        }
    };

    let markers = (0..RigidBodyModel::<f64>::nb_markers(model))
        .map(|i| -> AppResult<[f64; 3]> {
            let p = model.marker_position(i, &q)?;
            Ok([p.x, p.y, p.z])
        })
        .collect::<AppResult<Vec<_>>>()?;

    let node = NodeReport {
        label: label.to_string(),
        q: q.as_slice().to_vec(),
        qdot: qdot.as_slice().to_vec(),
        qddot: qddot.as_slice().to_vec(),
        lambda: lambda.as_slice().to_vec(),
        constraint_residual: residual,
        markers,
    };
    Ok((node, lambda))
}

/// Seed continuity of an implicit-dependent phase whose boundaries carry
/// the seed control: `v` solved at the end from the start seed against the
/// end seed.
fn evaluate_seed_continuity(
    runtime: &ScenarioRuntime,
    phase: &PhaseRuntime,
) -> AppResult<Option<SeedContinuityReport>> {
    if !phase.state.is_holonomic()
        || phase.state.explicit_dependent()
        || phase.control == ControlType::None
    {
        return Ok(None);
    }
    let (PhaseBoundary::Holonomic(start), PhaseBoundary::Holonomic(end)) = (&phase.start, &phase.end)
    else {
        return Ok(None);
    };
    let (Some(seed), Some(next_seed)) = (&start.q_v_init, &end.q_v_init) else {
        return Ok(None);
    };

    let system = runtime.system(&phase.model_id)?;
    let residual = dependent_seed_continuity(system, phase.control, &end.q_u, seed, next_seed)
        .map_err(|e| AppError::Transition(format!("{}: {e}", phase.id)))?;
    Ok(Some(SeedContinuityReport {
        phase: phase.id.clone(),
        control: phase.control.to_string(),
        norm: residual.norm(),
        residual: residual.as_slice().to_vec(),
    }))
}

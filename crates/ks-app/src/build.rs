//! Compile a validated scenario into partitioned models and phase records.

use std::collections::HashMap;

use ks_core::units::{kg, m, mps2};
use ks_core::Real;
use ks_dynamics::{DynamicsVariant, KeySpring, MultiplierPolicy, PartitionedModel};
use ks_model::{
    CoordinatePartition, KeyParams, ModelResult, PianoArm, PointMassPair, RigidBodyModel,
};
use ks_phase::{
    ControlType, FullBoundary, HolonomicBoundary, PhaseBoundary, PhaseState, PhaseTransition,
};
use ks_project::schema::{
    BoundaryDef, ControlTypeDef, DynamicsVariantDef, ForceDef, ForceKindDef, ModelDef,
    ModelKindDef, MultiplierPolicyDef, PhaseStateDef, Project, SolverDef, TransitionKindDef,
};
use ks_solver::{HolonomicConstraintSolver, NewtonConfig};
use nalgebra::{DMatrix, DVector, Vector3};

use crate::error::{AppError, AppResult};

/// One of the reference models, chosen by the scenario.
#[derive(Clone, Debug)]
pub enum ModelInstance {
    Pair(PointMassPair),
    Arm(PianoArm),
}

macro_rules! dispatch {
    ($self:ident, $m:ident => $body:expr) => {
        match $self {
            ModelInstance::Pair($m) => $body,
            ModelInstance::Arm($m) => $body,
        }
    };
}

impl<T: Real> RigidBodyModel<T> for ModelInstance {
    fn name(&self) -> &str {
        dispatch!(self, model => RigidBodyModel::<T>::name(model))
    }

    fn nb_q(&self) -> usize {
        dispatch!(self, model => RigidBodyModel::<T>::nb_q(model))
    }

    fn nb_constraints(&self) -> usize {
        dispatch!(self, model => RigidBodyModel::<T>::nb_constraints(model))
    }

    fn nb_markers(&self) -> usize {
        dispatch!(self, model => RigidBodyModel::<T>::nb_markers(model))
    }

    fn dof_names(&self) -> Vec<String> {
        dispatch!(self, model => RigidBodyModel::<T>::dof_names(model))
    }

    fn actuated_dofs(&self) -> Vec<usize> {
        dispatch!(self, model => RigidBodyModel::<T>::actuated_dofs(model))
    }

    fn default_partition(&self) -> ModelResult<CoordinatePartition> {
        dispatch!(self, model => RigidBodyModel::<T>::default_partition(model))
    }

    fn mass_matrix(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
        dispatch!(self, model => model.mass_matrix(q))
    }

    fn nonlinear_effects(&self, q: &DVector<T>, qdot: &DVector<T>) -> ModelResult<DVector<T>> {
        dispatch!(self, model => model.nonlinear_effects(q, qdot))
    }

    fn constraint_residual(&self, q: &DVector<T>) -> ModelResult<DVector<T>> {
        dispatch!(self, model => model.constraint_residual(q))
    }

    fn constraint_jacobian(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
        dispatch!(self, model => model.constraint_jacobian(q))
    }

    fn constraint_bias(&self, q: &DVector<T>, qdot: &DVector<T>) -> ModelResult<DVector<T>> {
        dispatch!(self, model => model.constraint_bias(q, qdot))
    }

    fn marker_position(&self, index: usize, q: &DVector<T>) -> ModelResult<Vector3<T>> {
        dispatch!(self, model => model.marker_position(index, q))
    }
}

pub type ScenarioSystem = PartitionedModel<f64, ModelInstance>;

/// A phase with its boundary records in kernel types.
#[derive(Clone, Debug)]
pub struct PhaseRuntime {
    pub id: String,
    pub name: String,
    pub model_id: String,
    pub state: PhaseState,
    pub dynamics: DynamicsVariant,
    pub control: ControlType,
    pub force_id: Option<String>,
    pub start: PhaseBoundary<f64>,
    pub end: PhaseBoundary<f64>,
}

/// A junction between two phases, by phase index.
#[derive(Clone, Copy, Debug)]
pub struct TransitionRuntime {
    pub pre: usize,
    pub post: usize,
    /// Explicit evaluator; the state pair picks one when `None`.
    pub evaluator: Option<PhaseTransition>,
}

/// Everything needed to evaluate a scenario.
pub struct ScenarioRuntime {
    pub name: String,
    pub systems: HashMap<String, ScenarioSystem>,
    pub forces: HashMap<String, KeySpring>,
    pub phases: Vec<PhaseRuntime>,
    pub transitions: Vec<TransitionRuntime>,
    pub policies: Vec<(String, MultiplierPolicy)>,
}

impl ScenarioRuntime {
    pub fn system(&self, model_id: &str) -> AppResult<&ScenarioSystem> {
        self.systems.get(model_id).ok_or_else(|| AppError::NotFound {
            what: "Model",
            id: model_id.to_string(),
        })
    }

    pub fn phase_index(&self, id: &str) -> AppResult<usize> {
        self.phases
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound {
                what: "Phase",
                id: id.to_string(),
            })
    }

    pub fn force(&self, id: &str) -> AppResult<&KeySpring> {
        self.forces.get(id).ok_or_else(|| AppError::NotFound {
            what: "Force",
            id: id.to_string(),
        })
    }
}

pub fn build_model(def: &ModelDef) -> AppResult<ModelInstance> {
    let model = match &def.kind {
        ModelKindDef::PointMassPair {
            mass_1_kg,
            mass_2_kg,
            length_m,
            gravity_mps2,
        } => ModelInstance::Pair(PointMassPair::new(
            def.name.clone(),
            kg(*mass_1_kg),
            kg(*mass_2_kg),
            m(*length_m),
            mps2(*gravity_mps2),
        )?),
        ModelKindDef::PianoArm {
            upper_arm_m,
            forearm_m,
            elbow_mass_kg,
            hand_mass_kg,
            gravity_mps2,
            key,
        } => {
            let arm = PianoArm::new(
                def.name.clone(),
                m(*upper_arm_m),
                m(*forearm_m),
                kg(*elbow_mass_kg),
                kg(*hand_mass_kg),
                mps2(*gravity_mps2),
            )?;
            match key {
                Some(key) => ModelInstance::Arm(arm.with_key(KeyParams {
                    contact_x: m(key.contact_x_m),
                    top_y: m(key.top_y_m),
                    mass: kg(key.mass_kg),
                })?),
                None => ModelInstance::Arm(arm),
            }
        }
    };
    Ok(model)
}

pub fn build_solver(def: &SolverDef, seed: Option<&[f64]>) -> HolonomicConstraintSolver {
    let solver = HolonomicConstraintSolver::new(NewtonConfig {
        max_iterations: def.max_iterations,
        abs_tol: def.abs_tol,
        rel_tol: def.rel_tol,
        line_search_beta: def.line_search_beta,
        max_line_search_iters: def.max_line_search_iters,
    });
    match seed {
        Some(seed) => solver.with_default_seed(DVector::from_column_slice(seed)),
        None => solver,
    }
}

pub fn build_system(solver: &SolverDef, def: &ModelDef) -> AppResult<ScenarioSystem> {
    let model = build_model(def)?;
    let partition_def = ks_project::partition_of(def);
    let partition = CoordinatePartition::new(
        def.kind.nb_q(),
        partition_def.independent,
        partition_def.dependent,
    )?;
    let solver = build_solver(solver, def.dependent_seed.as_deref());
    Ok(PartitionedModel::new(model, partition, solver)?)
}

pub fn build_force(def: &ForceDef) -> AppResult<KeySpring> {
    match def.kind {
        ForceKindDef::KeySpring {
            coordinate,
            stiffness_n_per_m,
            rest_position_m,
            preload_n,
        } => Ok(KeySpring::new(
            def.id.clone(),
            coordinate,
            stiffness_n_per_m,
            rest_position_m,
            preload_n,
        )?),
    }
}

pub fn phase_state(def: PhaseStateDef) -> PhaseState {
    match def {
        PhaseStateDef::FullCoordinate => PhaseState::FullCoordinate,
        PhaseStateDef::HolonomicReduced { explicit_dependent } => {
            PhaseState::HolonomicReduced { explicit_dependent }
        }
        PhaseStateDef::PostImpact { explicit_dependent } => {
            PhaseState::PostImpact { explicit_dependent }
        }
    }
}

pub fn dynamics_variant(def: DynamicsVariantDef) -> DynamicsVariant {
    match def {
        DynamicsVariantDef::ImplicitDependent => DynamicsVariant::ImplicitDependent,
        DynamicsVariantDef::ExplicitDependent => DynamicsVariant::ExplicitDependent,
        DynamicsVariantDef::ExplicitDependentWithForce => {
            DynamicsVariant::ExplicitDependentWithForce
        }
        DynamicsVariantDef::FullCoordinate => DynamicsVariant::FullCoordinate,
    }
}

pub fn control_type(def: ControlTypeDef) -> ControlType {
    match def {
        ControlTypeDef::Constant => ControlType::Constant,
        ControlTypeDef::ConstantWithLastNode => ControlType::ConstantWithLastNode,
        ControlTypeDef::LinearContinuous => ControlType::LinearContinuous,
        ControlTypeDef::None => ControlType::None,
    }
}

pub fn multiplier_policy(def: &MultiplierPolicyDef) -> MultiplierPolicy {
    match def {
        MultiplierPolicyDef::PullOnly { rows, bound } => MultiplierPolicy::PullOnly {
            rows: rows.clone(),
            bound: *bound,
        },
        MultiplierPolicyDef::RelaxedFrictionCone { normal, tangential } => {
            MultiplierPolicy::RelaxedFrictionCone {
                normal: *normal,
                tangential: *tangential,
            }
        }
    }
}

pub fn transition_kind(def: TransitionKindDef) -> PhaseTransition {
    match def {
        TransitionKindDef::Continuous { include_tau } => PhaseTransition::Continuous { include_tau },
        TransitionKindDef::FullToHolonomic {
            excluded_trailing,
            include_tau,
        } => PhaseTransition::FullToHolonomic {
            excluded_trailing,
            include_tau,
        },
        TransitionKindDef::HolonomicToFull {
            excluded_trailing,
            include_tau,
        } => PhaseTransition::HolonomicToFull {
            excluded_trailing,
            include_tau,
        },
        TransitionKindDef::Impact {
            appended,
            include_tau,
        } => PhaseTransition::Impact {
            appended,
            include_tau,
        },
    }
}

fn vector(values: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(values)
}

pub fn boundary(def: &BoundaryDef) -> PhaseBoundary<f64> {
    match def {
        BoundaryDef::Full { q, qdot, tau } => PhaseBoundary::Full(FullBoundary {
            q: vector(q),
            qdot: vector(qdot),
            tau: tau.as_deref().map(vector),
        }),
        BoundaryDef::Holonomic {
            q_u,
            qdot_u,
            q_v,
            q_v_init,
            tau,
        } => PhaseBoundary::Holonomic(HolonomicBoundary {
            q_u: vector(q_u),
            qdot_u: vector(qdot_u),
            q_v: q_v.as_deref().map(vector),
            q_v_init: q_v_init.as_deref().map(vector),
            tau: tau.as_deref().map(vector),
        }),
    }
}

/// Validate and compile a scenario.
pub fn compile_scenario(project: &Project) -> AppResult<ScenarioRuntime> {
    crate::project_service::validate_project(project)?;

    let systems = project
        .models
        .iter()
        .map(|def| -> AppResult<(String, ScenarioSystem)> {
            Ok((def.id.clone(), build_system(&project.solver, def)?))
        })
        .collect::<AppResult<HashMap<_, _>>>()?;

    let forces = project
        .forces
        .iter()
        .map(|def| -> AppResult<(String, KeySpring)> { Ok((def.id.clone(), build_force(def)?)) })
        .collect::<AppResult<HashMap<_, _>>>()?;

    let phases: Vec<PhaseRuntime> = project
        .phases
        .iter()
        .map(|def| PhaseRuntime {
            id: def.id.clone(),
            name: def.name.clone(),
            model_id: def.model_id.clone(),
            state: phase_state(def.state),
            dynamics: dynamics_variant(def.dynamics),
            control: control_type(def.control_type),
            force_id: def.force_id.clone(),
            start: boundary(&def.start),
            end: boundary(&def.end),
        })
        .collect();

    let index_of = |id: &str| {
        phases
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound {
                what: "Phase",
                id: id.to_string(),
            })
    };
    let transitions = project
        .transitions
        .iter()
        .map(|t| -> AppResult<TransitionRuntime> {
            Ok(TransitionRuntime {
                pre: index_of(&t.pre_phase_id)?,
                post: index_of(&t.post_phase_id)?,
                evaluator: t.evaluator.map(transition_kind),
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let policies = project
        .multiplier_bounds
        .iter()
        .map(|b| (b.phase_id.clone(), multiplier_policy(&b.policy)))
        .collect();

    tracing::info!(
        scenario = %project.name,
        models = systems.len(),
        phases = project.phases.len(),
        "scenario compiled"
    );

    Ok(ScenarioRuntime {
        name: project.name.clone(),
        systems,
        forces,
        phases,
        transitions,
        policies,
    })
}

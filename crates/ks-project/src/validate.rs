//! Scenario validation logic.

use crate::schema::{
    BoundaryDef, ControlTypeDef, DynamicsVariantDef, ForceDef, ForceKindDef, ModelDef, ModelKindDef,
    MultiplierPolicyDef, PartitionDef, PhaseDef, PhaseStateDef, Project, SolverDef,
    TransitionKindDef,
};
use std::collections::{HashMap, HashSet};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    validate_solver(&project.solver)?;

    let mut models = HashMap::new();
    for model in &project.models {
        if models.insert(model.id.as_str(), model).is_some() {
            return Err(ValidationError::DuplicateId {
                id: model.id.clone(),
                context: "models".to_string(),
            });
        }
        validate_model(model)?;
    }

    let mut forces = HashMap::new();
    for force in &project.forces {
        if forces.insert(force.id.as_str(), force).is_some() {
            return Err(ValidationError::DuplicateId {
                id: force.id.clone(),
                context: "forces".to_string(),
            });
        }
        validate_force(force)?;
    }

    let mut phases = HashMap::new();
    for phase in &project.phases {
        if phases.insert(phase.id.as_str(), phase).is_some() {
            return Err(ValidationError::DuplicateId {
                id: phase.id.clone(),
                context: "phases".to_string(),
            });
        }
        let model = models.get(phase.model_id.as_str()).ok_or_else(|| {
            ValidationError::MissingReference {
                id: phase.model_id.clone(),
                context: format!("phase '{}' model_id", phase.name),
            }
        })?;
        validate_phase(phase, model, &forces)?;
    }

    let mut pairs = HashSet::new();
    for transition in &project.transitions {
        let context = format!(
            "transition {} -> {}",
            transition.pre_phase_id, transition.post_phase_id
        );
        let pre = lookup_phase(&phases, &transition.pre_phase_id, &context)?;
        let post = lookup_phase(&phases, &transition.post_phase_id, &context)?;
        if pre.id == post.id {
            return Err(ValidationError::InvalidValue {
                field: context,
                value: pre.id.clone(),
                reason: "a phase cannot transition into itself".to_string(),
            });
        }
        if !pairs.insert((pre.id.as_str(), post.id.as_str())) {
            return Err(ValidationError::DuplicateId {
                id: format!("{} -> {}", pre.id, post.id),
                context: "transitions".to_string(),
            });
        }
        validate_transition_kind(transition.evaluator, pre, post, &context)?;
    }

    for bound in &project.multiplier_bounds {
        let context = format!("multiplier bound on phase '{}'", bound.phase_id);
        let phase = lookup_phase(&phases, &bound.phase_id, &context)?;
        if !phase.state.is_holonomic() {
            return Err(ValidationError::InvalidValue {
                field: context,
                value: "full_coordinate".to_string(),
                reason: "multipliers only exist in holonomic phases".to_string(),
            });
        }
        // The phase lookup above guarantees the model exists.
        let nb_multipliers = models
            .get(phase.model_id.as_str())
            .map(|m| partition_of(m).dependent.len())
            .unwrap_or(0);
        validate_policy(&bound.policy, nb_multipliers, &context)?;
    }

    Ok(())
}

fn lookup_phase<'a>(
    phases: &HashMap<&str, &'a PhaseDef>,
    id: &str,
    context: &str,
) -> Result<&'a PhaseDef, ValidationError> {
    phases
        .get(id)
        .copied()
        .ok_or_else(|| ValidationError::MissingReference {
            id: id.to_string(),
            context: context.to_string(),
        })
}

fn validate_solver(solver: &SolverDef) -> Result<(), ValidationError> {
    if solver.max_iterations == 0 {
        return Err(invalid(
            "solver max_iterations",
            solver.max_iterations,
            "must be at least 1",
        ));
    }
    positive("solver abs_tol", solver.abs_tol)?;
    if !solver.rel_tol.is_finite() || solver.rel_tol < 0.0 {
        return Err(invalid(
            "solver rel_tol",
            solver.rel_tol,
            "must be non-negative and finite",
        ));
    }
    if !(solver.line_search_beta > 0.0 && solver.line_search_beta < 1.0) {
        return Err(invalid(
            "solver line_search_beta",
            solver.line_search_beta,
            "must lie in (0, 1)",
        ));
    }
    Ok(())
}

fn validate_model(model: &ModelDef) -> Result<(), ValidationError> {
    let name = &model.name;
    match &model.kind {
        ModelKindDef::PointMassPair {
            mass_1_kg,
            mass_2_kg,
            length_m,
            gravity_mps2,
        } => {
            positive(&format!("model '{name}' mass_1_kg"), *mass_1_kg)?;
            positive(&format!("model '{name}' mass_2_kg"), *mass_2_kg)?;
            positive(&format!("model '{name}' length_m"), *length_m)?;
            finite(&format!("model '{name}' gravity_mps2"), *gravity_mps2)?;
        }
        ModelKindDef::PianoArm {
            upper_arm_m,
            forearm_m,
            elbow_mass_kg,
            hand_mass_kg,
            gravity_mps2,
            key,
        } => {
            positive(&format!("model '{name}' upper_arm_m"), *upper_arm_m)?;
            positive(&format!("model '{name}' forearm_m"), *forearm_m)?;
            positive(&format!("model '{name}' elbow_mass_kg"), *elbow_mass_kg)?;
            positive(&format!("model '{name}' hand_mass_kg"), *hand_mass_kg)?;
            finite(&format!("model '{name}' gravity_mps2"), *gravity_mps2)?;
            if let Some(key) = key {
                finite(&format!("model '{name}' key contact_x_m"), key.contact_x_m)?;
                finite(&format!("model '{name}' key top_y_m"), key.top_y_m)?;
                positive(&format!("model '{name}' key mass_kg"), key.mass_kg)?;
            }
        }
    }

    let partition = partition_of(model);
    validate_partition(&partition, &model.kind, name)?;

    if let Some(seed) = &model.dependent_seed {
        if seed.len() != partition.dependent.len() {
            return Err(invalid(
                &format!("model '{name}' dependent_seed"),
                format!("{} entries", seed.len()),
                &format!("expected {}", partition.dependent.len()),
            ));
        }
        finite_all(&format!("model '{name}' dependent_seed"), seed)?;
    }
    Ok(())
}

/// Partition a model is built with: its override, or the kind's default.
pub fn partition_of(model: &ModelDef) -> PartitionDef {
    model
        .partition
        .clone()
        .unwrap_or_else(|| model.kind.default_partition())
}

fn validate_partition(
    partition: &PartitionDef,
    kind: &ModelKindDef,
    name: &str,
) -> Result<(), ValidationError> {
    let nb_q = kind.nb_q();
    let field = format!("model '{name}' partition");
    let mut seen = HashSet::new();
    for &i in partition.independent.iter().chain(&partition.dependent) {
        if i >= nb_q {
            return Err(invalid(&field, i, &format!("index out of range 0..{nb_q}")));
        }
        if !seen.insert(i) {
            return Err(invalid(&field, i, "coordinate listed twice"));
        }
    }
    if seen.len() != nb_q {
        return Err(invalid(
            &field,
            format!("{} coordinates", seen.len()),
            &format!("must cover all {nb_q} coordinates"),
        ));
    }
    if partition.dependent.len() != kind.nb_constraints() {
        return Err(invalid(
            &field,
            format!("{} dependent", partition.dependent.len()),
            &format!("model has {} constraint equations", kind.nb_constraints()),
        ));
    }
    Ok(())
}

fn validate_force(force: &ForceDef) -> Result<(), ValidationError> {
    match &force.kind {
        ForceKindDef::KeySpring {
            stiffness_n_per_m,
            rest_position_m,
            preload_n,
            ..
        } => {
            let id = &force.id;
            if !stiffness_n_per_m.is_finite() || *stiffness_n_per_m < 0.0 {
                return Err(invalid(
                    &format!("force '{id}' stiffness_n_per_m"),
                    stiffness_n_per_m,
                    "must be non-negative and finite",
                ));
            }
            finite(&format!("force '{id}' rest_position_m"), *rest_position_m)?;
            finite(&format!("force '{id}' preload_n"), *preload_n)?;
        }
    }
    Ok(())
}

fn validate_phase(
    phase: &PhaseDef,
    model: &ModelDef,
    forces: &HashMap<&str, &ForceDef>,
) -> Result<(), ValidationError> {
    let name = &phase.name;
    let partition = partition_of(model);

    match phase.state {
        PhaseStateDef::FullCoordinate => {
            if model.kind.nb_constraints() > 0 {
                return Err(invalid(
                    &format!("phase '{name}' state"),
                    "full_coordinate",
                    &format!("model '{}' is constrained", model.id),
                ));
            }
            if phase.dynamics != DynamicsVariantDef::FullCoordinate {
                return Err(invalid(
                    &format!("phase '{name}' dynamics"),
                    format!("{:?}", phase.dynamics),
                    "full-coordinate phases use full_coordinate dynamics",
                ));
            }
        }
        state => {
            let explicit = matches!(
                phase.dynamics,
                DynamicsVariantDef::ExplicitDependent | DynamicsVariantDef::ExplicitDependentWithForce
            );
            if phase.dynamics == DynamicsVariantDef::FullCoordinate
                || explicit != state.explicit_dependent()
            {
                return Err(invalid(
                    &format!("phase '{name}' dynamics"),
                    format!("{:?}", phase.dynamics),
                    "does not match the phase state",
                ));
            }
        }
    }

    match (&phase.force_id, phase.dynamics) {
        (Some(force_id), DynamicsVariantDef::ExplicitDependentWithForce) => {
            let force = forces.get(force_id.as_str()).ok_or_else(|| {
                ValidationError::MissingReference {
                    id: force_id.clone(),
                    context: format!("phase '{name}' force_id"),
                }
            })?;
            let ForceKindDef::KeySpring { coordinate, .. } = force.kind;
            if coordinate >= model.kind.nb_q() {
                return Err(invalid(
                    &format!("force '{force_id}' coordinate"),
                    coordinate,
                    &format!("model '{}' has {} coordinates", model.id, model.kind.nb_q()),
                ));
            }
        }
        (None, DynamicsVariantDef::ExplicitDependentWithForce) => {
            return Err(ValidationError::MissingReference {
                id: String::new(),
                context: format!("phase '{name}' force_id"),
            });
        }
        (Some(force_id), _) => {
            return Err(invalid(
                &format!("phase '{name}' force_id"),
                force_id,
                "only explicit_dependent_with_force dynamics take a force",
            ));
        }
        (None, _) => {}
    }

    for (which, boundary) in [("start", &phase.start), ("end", &phase.end)] {
        validate_boundary(phase, which, boundary, model, &partition)?;
    }
    Ok(())
}

fn validate_boundary(
    phase: &PhaseDef,
    which: &str,
    boundary: &BoundaryDef,
    model: &ModelDef,
    partition: &PartitionDef,
) -> Result<(), ValidationError> {
    let field = |name: &str| format!("phase '{}' {which} {name}", phase.name);
    let nb_q = model.kind.nb_q();

    match (phase.state, boundary) {
        (PhaseStateDef::FullCoordinate, BoundaryDef::Full { q, qdot, .. }) => {
            expect_len(&field("q"), q, nb_q)?;
            expect_len(&field("qdot"), qdot, nb_q)?;
        }
        (
            state,
            BoundaryDef::Holonomic {
                q_u,
                qdot_u,
                q_v,
                q_v_init,
                ..
            },
        ) if state.is_holonomic() => {
            let n_u = partition.independent.len();
            expect_len(&field("q_u"), q_u, n_u)?;
            expect_len(&field("qdot_u"), qdot_u, n_u)?;
            match q_v {
                Some(q_v) => expect_len(&field("q_v"), q_v, partition.dependent.len())?,
                None if state.explicit_dependent() => {
                    return Err(invalid(
                        &field("q_v"),
                        "missing",
                        "explicit-dependent phases carry q_v",
                    ));
                }
                None => {}
            }
            if let Some(seed) = q_v_init {
                if state.explicit_dependent() {
                    return Err(invalid(
                        &field("q_v_init"),
                        "given",
                        "explicit-dependent phases track q_v instead of a seed control",
                    ));
                }
                if phase.control_type == ControlTypeDef::None {
                    return Err(invalid(
                        &field("q_v_init"),
                        "given",
                        "a seed control needs a phase with controls",
                    ));
                }
                expect_len(&field("q_v_init"), seed, partition.dependent.len())?;
                finite_all(&field("q_v_init"), seed)?;
            }
        }
        _ => {
            return Err(invalid(
                &field("boundary"),
                format!("{:?}", phase.state),
                "boundary type does not match the phase state",
            ));
        }
    }

    if let Some(tau) = boundary.tau() {
        let actuated = model.kind.nb_actuated();
        if tau.len() != actuated && tau.len() != nb_q {
            return Err(invalid(
                &field("tau"),
                format!("{} entries", tau.len()),
                &format!("expected {actuated} (actuated) or {nb_q}"),
            ));
        }
        finite_all(&field("tau"), tau)?;
    }
    Ok(())
}

fn validate_transition_kind(
    evaluator: Option<TransitionKindDef>,
    pre: &PhaseDef,
    post: &PhaseDef,
    context: &str,
) -> Result<(), ValidationError> {
    let (pre_holo, post_holo) = (pre.state.is_holonomic(), post.state.is_holonomic());
    let Some(kind) = evaluator else {
        let holonomic_into_impact = matches!(pre.state, PhaseStateDef::HolonomicReduced { .. })
            && matches!(post.state, PhaseStateDef::PostImpact { .. });
        if holonomic_into_impact {
            return Err(ValidationError::Unsupported {
                feature: context.to_string(),
                reason: "no default evaluator from a holonomic phase into a post-impact phase; \
                         give one explicitly"
                    .to_string(),
            });
        }
        return Ok(());
    };

    let ok = match kind {
        TransitionKindDef::Continuous { .. } => pre_holo == post_holo,
        TransitionKindDef::FullToHolonomic { .. } | TransitionKindDef::Impact { .. } => {
            !pre_holo && post_holo
        }
        TransitionKindDef::HolonomicToFull { .. } => pre_holo && !post_holo,
    };
    if !ok {
        return Err(invalid(
            &format!("{context} evaluator"),
            format!("{kind:?}"),
            "cannot connect these phase states",
        ));
    }
    Ok(())
}

fn validate_policy(
    policy: &MultiplierPolicyDef,
    nb_multipliers: usize,
    context: &str,
) -> Result<(), ValidationError> {
    let rows: Vec<usize> = match policy {
        MultiplierPolicyDef::PullOnly { rows, bound } => {
            finite(&format!("{context} bound"), *bound)?;
            rows.clone()
        }
        MultiplierPolicyDef::RelaxedFrictionCone { normal, tangential } => {
            if normal == tangential {
                return Err(invalid(
                    &format!("{context} tangential"),
                    tangential,
                    "must differ from the normal row",
                ));
            }
            vec![*normal, *tangential]
        }
    };
    for row in rows {
        if row >= nb_multipliers {
            return Err(invalid(
                &format!("{context} row"),
                row,
                &format!("phase has {nb_multipliers} multipliers"),
            ));
        }
    }
    Ok(())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: &str, v: f64) -> Result<(), ValidationError> {
    if !v.is_finite() || v <= 0.0 {
        return Err(invalid(field, v, "must be positive and finite"));
    }
    Ok(())
}

fn finite(field: &str, v: f64) -> Result<(), ValidationError> {
    if !v.is_finite() {
        return Err(invalid(field, v, "must be finite"));
    }
    Ok(())
}

fn finite_all(field: &str, values: &[f64]) -> Result<(), ValidationError> {
    values.iter().try_for_each(|&v| finite(field, v))
}

fn expect_len(field: &str, values: &[f64], expected: usize) -> Result<(), ValidationError> {
    if values.len() != expected {
        return Err(invalid(
            field,
            format!("{} entries", values.len()),
            &format!("expected {expected}"),
        ));
    }
    finite_all(field, values)
}

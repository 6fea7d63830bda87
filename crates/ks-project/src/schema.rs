//! Scenario schema definitions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub solver: SolverDef,
    #[serde(default)]
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub forces: Vec<ForceDef>,
    #[serde(default)]
    pub phases: Vec<PhaseDef>,
    #[serde(default)]
    pub transitions: Vec<TransitionDef>,
    #[serde(default)]
    pub multiplier_bounds: Vec<MultiplierBoundDef>,
}

/// Newton settings for the dependent-coordinate solve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverDef {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_abs_tol")]
    pub abs_tol: f64,
    #[serde(default)]
    pub rel_tol: f64,
    #[serde(default = "default_line_search_beta")]
    pub line_search_beta: f64,
    #[serde(default = "default_max_line_search_iters")]
    pub max_line_search_iters: usize,
}

impl Default for SolverDef {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            abs_tol: default_abs_tol(),
            rel_tol: 0.0,
            line_search_beta: default_line_search_beta(),
            max_line_search_iters: default_max_line_search_iters(),
        }
    }
}

fn default_max_iterations() -> usize {
    50
}

fn default_abs_tol() -> f64 {
    1e-10
}

fn default_line_search_beta() -> f64 {
    0.5
}

fn default_max_line_search_iters() -> usize {
    20
}

fn default_gravity() -> f64 {
    9.81
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDef {
    pub id: String,
    pub name: String,
    pub kind: ModelKindDef,
    /// Overrides the model's own independent/dependent split.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<PartitionDef>,
    /// Starting guess for the dependent coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_seed: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ModelKindDef {
    PointMassPair {
        mass_1_kg: f64,
        mass_2_kg: f64,
        length_m: f64,
        #[serde(default = "default_gravity")]
        gravity_mps2: f64,
    },
    PianoArm {
        upper_arm_m: f64,
        forearm_m: f64,
        elbow_mass_kg: f64,
        hand_mass_kg: f64,
        #[serde(default = "default_gravity")]
        gravity_mps2: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<KeyDef>,
    },
}

impl ModelKindDef {
    /// Number of generalized coordinates of the built model.
    pub fn nb_q(&self) -> usize {
        match self {
            Self::PointMassPair { .. } => 4,
            Self::PianoArm { key: None, .. } => 2,
            Self::PianoArm { key: Some(_), .. } => 3,
        }
    }

    pub fn nb_constraints(&self) -> usize {
        match self {
            Self::PointMassPair { .. } => 1,
            Self::PianoArm { key: None, .. } => 0,
            Self::PianoArm { key: Some(_), .. } => 2,
        }
    }

    /// Number of entries of an actuated-subset `tau`.
    pub fn nb_actuated(&self) -> usize {
        match self {
            Self::PointMassPair { .. } => 4,
            Self::PianoArm { .. } => 2,
        }
    }

    /// Partition used when a model gives none.
    pub fn default_partition(&self) -> PartitionDef {
        match self {
            Self::PointMassPair { .. } => PartitionDef {
                independent: vec![0, 1, 2],
                dependent: vec![3],
            },
            Self::PianoArm { key: None, .. } => PartitionDef {
                independent: vec![0, 1],
                dependent: vec![],
            },
            Self::PianoArm { key: Some(_), .. } => PartitionDef {
                independent: vec![0],
                dependent: vec![1, 2],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyDef {
    pub contact_x_m: f64,
    pub top_y_m: f64,
    pub mass_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartitionDef {
    pub independent: Vec<usize>,
    #[serde(default)]
    pub dependent: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForceDef {
    pub id: String,
    pub kind: ForceKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ForceKindDef {
    KeySpring {
        coordinate: usize,
        stiffness_n_per_m: f64,
        #[serde(default)]
        rest_position_m: f64,
        #[serde(default)]
        preload_n: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseDef {
    pub id: String,
    pub name: String,
    pub model_id: String,
    pub state: PhaseStateDef,
    pub dynamics: DynamicsVariantDef,
    #[serde(default)]
    pub control_type: ControlTypeDef,
    /// External force field, for dynamics with an external force.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_id: Option<String>,
    pub start: BoundaryDef,
    pub end: BoundaryDef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PhaseStateDef {
    FullCoordinate,
    HolonomicReduced {
        #[serde(default)]
        explicit_dependent: bool,
    },
    PostImpact {
        #[serde(default)]
        explicit_dependent: bool,
    },
}

impl PhaseStateDef {
    pub fn is_holonomic(self) -> bool {
        !matches!(self, Self::FullCoordinate)
    }

    pub fn explicit_dependent(self) -> bool {
        match self {
            Self::FullCoordinate => false,
            Self::HolonomicReduced { explicit_dependent }
            | Self::PostImpact { explicit_dependent } => explicit_dependent,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DynamicsVariantDef {
    ImplicitDependent,
    ExplicitDependent,
    ExplicitDependentWithForce,
    FullCoordinate,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlTypeDef {
    #[default]
    Constant,
    ConstantWithLastNode,
    LinearContinuous,
    None,
}

/// Boundary values of a phase at its first or last node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BoundaryDef {
    Full {
        q: Vec<f64>,
        qdot: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tau: Option<Vec<f64>>,
    },
    Holonomic {
        q_u: Vec<f64>,
        qdot_u: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        q_v: Option<Vec<f64>>,
        /// Seed control for `v` at this node (implicit-dependent phases).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        q_v_init: Option<Vec<f64>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tau: Option<Vec<f64>>,
    },
}

impl BoundaryDef {
    pub fn tau(&self) -> Option<&[f64]> {
        match self {
            Self::Full { tau, .. } | Self::Holonomic { tau, .. } => tau.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionDef {
    pub pre_phase_id: String,
    pub post_phase_id: String,
    /// Evaluator override; selected from the phase states when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<TransitionKindDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TransitionKindDef {
    Continuous {
        #[serde(default = "default_true")]
        include_tau: bool,
    },
    FullToHolonomic {
        #[serde(default)]
        excluded_trailing: usize,
        #[serde(default)]
        include_tau: bool,
    },
    HolonomicToFull {
        #[serde(default = "default_one")]
        excluded_trailing: usize,
        #[serde(default = "default_true")]
        include_tau: bool,
    },
    Impact {
        #[serde(default = "default_one")]
        appended: usize,
        #[serde(default = "default_true")]
        include_tau: bool,
    },
}

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiplierBoundDef {
    pub phase_id: String,
    pub policy: MultiplierPolicyDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MultiplierPolicyDef {
    PullOnly { rows: Vec<usize>, bound: f64 },
    RelaxedFrictionCone { normal: usize, tangential: usize },
}

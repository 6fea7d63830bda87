//! Application service layer for keystrike.
//!
//! Loads and validates scenario files, builds the partitioned models they
//! describe and evaluates every phase boundary and junction into a
//! serialisable report.

pub mod build;
pub mod error;
pub mod evaluate;
pub mod project_service;

pub use build::{
    build_force, build_model, build_solver, build_system, compile_scenario, ModelInstance,
    PhaseRuntime, ScenarioRuntime, ScenarioSystem, TransitionRuntime,
};
pub use error::{AppError, AppResult};
pub use evaluate::{
    evaluate_scenario, report_to_json, JunctionReport, NodeReport, PhaseReport, PolicyReport,
    ScenarioReport, SeedContinuityReport, TermReport,
};
pub use project_service::{
    get_model, get_phase, list_models, list_phases, load_project, validate_project, ModelSummary,
    PhaseSummary,
};

/// Load, compile and evaluate a scenario file in one call.
pub fn evaluate_file(path: &std::path::Path) -> AppResult<ScenarioReport> {
    let project = load_project(path)?;
    let runtime = compile_scenario(&project)?;
    evaluate_scenario(&runtime)
}

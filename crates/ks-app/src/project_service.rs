//! Scenario loading, validation, and introspection.

use ks_project::schema::{ModelDef, PhaseDef, Project};
use std::path::Path;

use crate::error::{AppError, AppResult};

/// Summary of a model for listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    pub nb_q: usize,
    pub nb_constraints: usize,
    pub independent: Vec<usize>,
    pub dependent: Vec<usize>,
}

/// Summary of a phase for listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PhaseSummary {
    pub id: String,
    pub name: String,
    pub model_id: String,
    pub state: String,
    pub dynamics: String,
}

/// Load a scenario (YAML or JSON by extension), migrated and validated.
pub fn load_project(path: &Path) -> AppResult<Project> {
    if !path.exists() {
        return Err(AppError::ProjectFileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    Ok(ks_project::load(path)?)
}

pub fn validate_project(project: &Project) -> AppResult<()> {
    ks_project::validate_project(project).map_err(|e| AppError::Validation(e.to_string()))
}

pub fn list_models(project: &Project) -> Vec<ModelSummary> {
    project
        .models
        .iter()
        .map(|model| {
            let partition = ks_project::partition_of(model);
            ModelSummary {
                id: model.id.clone(),
                name: model.name.clone(),
                nb_q: model.kind.nb_q(),
                nb_constraints: model.kind.nb_constraints(),
                independent: partition.independent,
                dependent: partition.dependent,
            }
        })
        .collect()
}

pub fn list_phases(project: &Project) -> Vec<PhaseSummary> {
    project
        .phases
        .iter()
        .map(|phase| PhaseSummary {
            id: phase.id.clone(),
            name: phase.name.clone(),
            model_id: phase.model_id.clone(),
            state: crate::build::phase_state(phase.state).to_string(),
            dynamics: format!("{:?}", crate::build::dynamics_variant(phase.dynamics)),
        })
        .collect()
}

pub fn get_model<'a>(project: &'a Project, id: &str) -> AppResult<&'a ModelDef> {
    project
        .models
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| AppError::NotFound {
            what: "Model",
            id: id.to_string(),
        })
}

pub fn get_phase<'a>(project: &'a Project, id: &str) -> AppResult<&'a PhaseDef> {
    project
        .phases
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| AppError::NotFound {
            what: "Phase",
            id: id.to_string(),
        })
}

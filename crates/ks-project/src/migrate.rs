//! Scenario version migration.

use crate::ProjectError;
use crate::schema::{Project, TransitionDef};

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut project: Project) -> Result<Project, ProjectError> {
    while project.version < LATEST_VERSION {
        project = migrate_one_version(project)?;
    }
    Ok(project)
}

fn migrate_one_version(project: Project) -> Result<Project, ProjectError> {
    match project.version {
        0 => migrate_v0_to_v1(project),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 0 chained phases implicitly in file order; version 1 lists the
/// junctions explicitly.
fn migrate_v0_to_v1(mut project: Project) -> Result<Project, ProjectError> {
    if project.transitions.is_empty() {
        project.transitions = project
            .phases
            .windows(2)
            .map(|pair| TransitionDef {
                pre_phase_id: pair[0].id.clone(),
                post_phase_id: pair[1].id.clone(),
                evaluator: None,
            })
            .collect();
    }
    project.version = 1;
    Ok(project)
}

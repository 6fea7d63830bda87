//! Smoke tests for the ks-app service layer on the bundled scenarios.

use std::path::PathBuf;

use ks_app::{
    compile_scenario, evaluate_file, evaluate_scenario, list_models, list_phases, load_project,
    AppError,
};
use ks_project::schema::BoundaryDef;

fn scenario(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop(); // crates
    path.pop(); // repo root
    path.push("scenarios");
    path.push(name);
    path
}

#[test]
fn lists_models_and_phases() {
    let project = load_project(&scenario("piano_press.yaml")).unwrap();

    let models = list_models(&project);
    assert_eq!(models.len(), 2);
    let keyed = models.iter().find(|m| m.id == "keyed_arm").unwrap();
    assert_eq!((keyed.nb_q, keyed.nb_constraints), (3, 2));
    assert_eq!(keyed.dependent, vec![1, 2]);

    let phases = list_phases(&project);
    let states: Vec<_> = phases.iter().map(|p| p.state.as_str()).collect();
    assert_eq!(states, vec!["full", "post-impact", "holonomic", "full"]);
}

#[test]
fn free_pair_has_no_reaction_at_rest() {
    let report = evaluate_file(&scenario("pair_pendulum.yaml")).unwrap();
    let start = &report.phases[0].nodes[0];

    // Both masses fall together; the rod carries no load.
    assert_eq!(start.lambda.len(), 1);
    assert!(start.lambda[0].abs() < 1e-9, "lambda = {:?}", start.lambda);
    let expected = [0.0, -9.81, 0.0, -9.81];
    for (a, b) in start.qddot.iter().zip(expected) {
        assert!((a - b).abs() < 1e-9, "qddot = {:?}", start.qddot);
    }
    assert!((start.q[3] + 2.0).abs() < 1e-9);
    assert!(start.constraint_residual < 1e-9);
}

#[test]
fn pair_junction_is_continuous() {
    let report = evaluate_file(&scenario("pair_pendulum.yaml")).unwrap();
    assert_eq!(report.junctions.len(), 1);
    assert!(report.max_junction_residual < 1e-12);

    // The swing phase carries its seed control; the hold phase does not.
    assert_eq!(report.seed_continuity.len(), 1);
    let seed = &report.seed_continuity[0];
    assert_eq!(seed.phase, "swing");
    assert_eq!(seed.control, "constant-with-last-node");
    assert!(seed.norm < 1e-9, "{:?}", seed.residual);
}

#[test]
fn inconsistent_end_seed_shows_in_the_residual() {
    let mut project = load_project(&scenario("pair_pendulum.yaml")).unwrap();
    if let BoundaryDef::Holonomic { q_v_init, .. } = &mut project.phases[0].end {
        *q_v_init = Some(vec![-1.5]);
    }
    let report = evaluate_scenario(&compile_scenario(&project).unwrap()).unwrap();
    let seed = &report.seed_continuity[0];
    assert!((seed.residual[0] + 0.1).abs() < 1e-9, "{:?}", seed.residual);
}

#[test]
fn piano_scenario_evaluates_every_junction() {
    let project = load_project(&scenario("piano_press.yaml")).unwrap();
    let runtime = compile_scenario(&project).unwrap();
    let report = evaluate_scenario(&runtime).unwrap();

    assert_eq!(report.phases.len(), 4);
    assert_eq!(report.junctions.len(), 3);

    let impact = &report.junctions[0];
    assert!(impact.evaluator.starts_with("Impact"));
    // The pre-impact configuration lands on the key: q block vanishes.
    assert!(impact.residual[..3].iter().all(|r| r.abs() < 1e-5), "{:?}", impact.residual);

    let press_release = &report.junctions[1];
    assert!(press_release.norm < 1e-12);

    assert!(report.junctions[2].evaluator.starts_with("HolonomicToFull"));

    // Every holonomic phase tracks q_v explicitly, so no seed control.
    assert!(report.seed_continuity.is_empty());
}

#[test]
fn piano_phases_report_reactions_only_on_the_key() {
    let report = evaluate_file(&scenario("piano_press.yaml")).unwrap();

    let approach = &report.phases[0];
    assert!(approach.nodes.iter().all(|n| n.lambda.is_empty()));
    assert!(approach.policies.is_empty());

    let press = &report.phases[1];
    for node in &press.nodes {
        assert_eq!(node.lambda.len(), 2);
        assert_eq!(node.markers.len(), 3);
        assert!(node.lambda.iter().all(|l| l.is_finite()));
    }
    assert!(press.nodes[0].constraint_residual < 1e-5);
    // Two policies, two nodes each.
    assert_eq!(press.policies.len(), 4);
}

#[test]
fn missing_file_is_a_read_error() {
    let err = load_project(&scenario("does_not_exist.yaml")).unwrap_err();
    assert!(matches!(err, AppError::ProjectFileRead { .. }));
}

#[test]
fn invalid_scenario_is_rejected_before_build() {
    let mut project = load_project(&scenario("piano_press.yaml")).unwrap();
    project.phases[3].model_id = "keyed_arm".to_string();
    assert!(matches!(
        compile_scenario(&project),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn report_serializes_to_json() {
    let report = evaluate_file(&scenario("pair_pendulum.yaml")).unwrap();
    let json = ks_app::report_to_json(&report).unwrap();
    assert!(json.contains("\"junctions\""));
    assert!(json.contains("\"swing\""));
}

use ks_project::schema::*;
use ks_project::{load, load_json, load_yaml, save_json, save_yaml, validate_project};

fn keyed_arm() -> ModelDef {
    ModelDef {
        id: "keyed".to_string(),
        name: "Keyed arm".to_string(),
        kind: ModelKindDef::PianoArm {
            upper_arm_m: 0.3,
            forearm_m: 0.25,
            elbow_mass_kg: 2.0,
            hand_mass_kg: 0.5,
            gravity_mps2: 9.81,
            key: Some(KeyDef {
                contact_x_m: 0.35,
                top_y_m: -0.33,
                mass_kg: 0.05,
            }),
        },
        partition: None,
        dependent_seed: Some(vec![-1.0, 0.0]),
    }
}

fn press_phase(id: &str) -> PhaseDef {
    let boundary = BoundaryDef::Holonomic {
        q_u: vec![-0.3],
        qdot_u: vec![0.0],
        q_v: Some(vec![-1.0, 0.0]),
        q_v_init: None,
        tau: Some(vec![0.1, 0.2]),
    };
    PhaseDef {
        id: id.to_string(),
        name: id.to_string(),
        model_id: "keyed".to_string(),
        state: PhaseStateDef::HolonomicReduced {
            explicit_dependent: true,
        },
        dynamics: DynamicsVariantDef::ExplicitDependent,
        control_type: ControlTypeDef::LinearContinuous,
        force_id: None,
        start: boundary.clone(),
        end: boundary,
    }
}

fn project() -> Project {
    Project {
        version: 1,
        name: "Press".to_string(),
        solver: SolverDef::default(),
        models: vec![keyed_arm()],
        forces: vec![],
        phases: vec![press_phase("a"), press_phase("b")],
        transitions: vec![TransitionDef {
            pre_phase_id: "a".to_string(),
            post_phase_id: "b".to_string(),
            evaluator: Some(TransitionKindDef::Continuous { include_tau: false }),
        }],
        multiplier_bounds: vec![MultiplierBoundDef {
            phase_id: "a".to_string(),
            policy: MultiplierPolicyDef::PullOnly {
                rows: vec![1],
                bound: 0.0,
            },
        }],
    }
}

#[test]
fn roundtrip_yaml_empty_project() {
    let project = Project {
        version: 1,
        name: "Empty Project".to_string(),
        solver: SolverDef::default(),
        models: vec![],
        forces: vec![],
        phases: vec![],
        transitions: vec![],
        multiplier_bounds: vec![],
    };

    validate_project(&project).unwrap();

    let path = std::env::temp_dir().join("ks_project_roundtrip_empty.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_yaml_press_project() {
    let project = project();
    validate_project(&project).unwrap();

    let path = std::env::temp_dir().join("ks_project_roundtrip_press.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_json_press_project() {
    let project = project();

    let path = std::env::temp_dir().join("ks_project_roundtrip_press.json");
    save_json(&path, &project).unwrap();
    assert_eq!(load_json(&path).unwrap(), project);
    assert_eq!(load(&path).unwrap(), project);
}

#[test]
fn solver_section_defaults_when_omitted() {
    let yaml = "version: 1\nname: bare\n";
    let project: Project = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(project.solver, SolverDef::default());
    assert_eq!(project.solver.max_iterations, 50);
    assert!(project.models.is_empty());
}

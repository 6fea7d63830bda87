use clap::{Parser, Subcommand};
use ks_app::{AppResult, ScenarioReport, project_service};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ks-cli")]
#[command(about = "Keystrike CLI - constrained multibody phase evaluation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate scenario file syntax and structure
    Validate {
        /// Path to the scenario YAML or JSON file
        scenario_path: PathBuf,
    },
    /// List models and phases in a scenario
    Inspect {
        /// Path to the scenario YAML or JSON file
        scenario_path: PathBuf,
    },
    /// Evaluate dynamics, multipliers and junction residuals
    Evaluate {
        /// Path to the scenario YAML or JSON file
        scenario_path: PathBuf,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
        /// Write the JSON report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Inspect { scenario_path } => cmd_inspect(&scenario_path),
        Commands::Evaluate {
            scenario_path,
            json,
            output,
        } => cmd_evaluate(&scenario_path, json, output.as_deref()),
    }
}

fn cmd_validate(scenario_path: &Path) -> AppResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let project = project_service::load_project(scenario_path)?;
    project_service::validate_project(&project)?;
    println!("✓ Scenario is valid (format version {})", ks_project::LATEST_VERSION);
    Ok(())
}

fn cmd_inspect(scenario_path: &Path) -> AppResult<()> {
    let project = project_service::load_project(scenario_path)?;
    println!("Scenario: {}", project.name);

    println!("Models:");
    for model in project_service::list_models(&project) {
        println!(
            "  {} - {} ({} coordinates, {} constraints, u = {:?}, v = {:?})",
            model.id,
            model.name,
            model.nb_q,
            model.nb_constraints,
            model.independent,
            model.dependent
        );
    }

    println!("Phases:");
    for phase in project_service::list_phases(&project) {
        println!(
            "  {} - {} [{}] on {} ({})",
            phase.id, phase.name, phase.state, phase.model_id, phase.dynamics
        );
    }

    if !project.transitions.is_empty() {
        println!("Transitions:");
        for t in &project.transitions {
            let evaluator = t
                .evaluator
                .map(|e| format!("{e:?}"))
                .unwrap_or_else(|| "default".to_string());
            println!("  {} -> {} ({})", t.pre_phase_id, t.post_phase_id, evaluator);
        }
    }
    Ok(())
}

fn cmd_evaluate(scenario_path: &Path, json: bool, output: Option<&Path>) -> AppResult<()> {
    let start = Instant::now();
    let report = ks_app::evaluate_file(scenario_path)?;
    let elapsed = start.elapsed();

    if let Some(path) = output {
        std::fs::write(path, ks_app::report_to_json(&report)?)?;
        println!("Report written to {}", path.display());
    } else if json {
        println!("{}", ks_app::report_to_json(&report)?);
    } else {
        print_summary(&report);
    }
    tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "evaluation finished");
    Ok(())
}

fn print_summary(report: &ScenarioReport) {
    println!("Scenario: {}", report.name);
    for phase in &report.phases {
        println!("  Phase {} [{}, {}]", phase.id, phase.state, phase.dynamics);
        for node in &phase.nodes {
            println!(
                "    {:<5} qddot = {:?}  lambda = {:?}  |g| = {:.3e}",
                node.label, node.qddot, node.lambda, node.constraint_residual
            );
        }
        for policy in &phase.policies {
            let mark = if policy.satisfied { "✓" } else { "✗" };
            println!("    {mark} {} at {}", policy.policy, policy.node);
        }
    }
    for junction in &report.junctions {
        println!(
            "  Junction {} -> {} ({}): |r| = {:.3e}",
            junction.pre, junction.post, junction.evaluator, junction.norm
        );
    }
    for seed in &report.seed_continuity {
        println!(
            "  Seed continuity in {} ({}): |r| = {:.3e}",
            seed.phase, seed.control, seed.norm
        );
    }
    println!(
        "Max junction residual: {:.3e}; multiplier policies {}",
        report.max_junction_residual,
        if report.policies_satisfied {
            "satisfied"
        } else {
            "violated"
        }
    );
}

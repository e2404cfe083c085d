//! Four-contact stance demo
//!
//! Distributes a swaying body load over four feet once per control tick:
//! - friction pyramid and normal-force limits per foot
//! - warm-started active set carried from tick to tick
//! - previous command held when a tick fails to converge

use clap::Parser;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wbqp_solver::{QpSolution, SimpleActiveSetQpSolver};
use wbqp_types::{QpError, SolverParams};

const FEET: usize = 4;
const FRICTION_COEFFICIENT: f64 = 0.5;
const BODY_WEIGHT: f64 = 300.0;
const FORCE_REGULARIZATION: f64 = 1e-2;

#[derive(Parser, Debug)]
#[command(name = "stance-forces")]
#[command(about = "Distribute a swaying body load over four feet", long_about = None)]
struct Args {
    /// Number of control ticks to simulate
    #[arg(long, default_value_t = 200)]
    ticks: usize,

    /// JSON file with solver parameters
    #[arg(long)]
    params: Option<std::path::PathBuf>,

    /// Maximum normal force of the weakest foot
    #[arg(long, default_value_t = 60.0)]
    weak_foot_limit: f64,

    /// Print every tick's forces
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    ticks: usize,
    converged_ticks: usize,
    held_ticks: usize,
    total_iterations: usize,
    max_iterations_in_a_tick: usize,
    max_tracking_error: f64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize summary: {}", e),
        },
        Err(e) => {
            eprintln!("Demo failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_params(args: &Args) -> Result<SolverParams, QpError> {
    let params = match &args.params {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| QpError::ConfigError(format!("reading {}: {}", path.display(), e)))?;
            SolverParams::from_json_str(&text)?
        }
        None => SolverParams {
            use_warm_start: true,
            ..SolverParams::default()
        },
    };
    if !params.use_warm_start {
        tracing::info!("Warm start disabled, every tick starts from an empty active set");
    }
    Ok(params)
}

fn run(args: &Args) -> Result<RunSummary, QpError> {
    let params = load_params(args)?;
    tracing::info!("Solver parameters: {:?}", params);

    let mut solver = SimpleActiveSetQpSolver::with_params(params)?;
    let mut solution = QpSolution::new();
    let mut command: DVector<f64> = DVector::zeros(3 * FEET);
    let mut summary = RunSummary {
        ticks: args.ticks,
        ..RunSummary::default()
    };

    let mut limits = [BODY_WEIGHT; FEET];
    limits[0] = args.weak_foot_limit;
    let stance = Stance::new(limits);

    for tick in 0..args.ticks {
        let wrench = desired_force(tick);
        stance.load_into(&mut solver, &wrench)?;
        solver.solve_into(&mut solution)?;

        summary.total_iterations += solution.iterations;
        summary.max_iterations_in_a_tick = summary.max_iterations_in_a_tick.max(solution.iterations);

        if solution.is_converged() {
            summary.converged_ticks += 1;
            command.copy_from_slice(&solution.x);
        } else {
            summary.held_ticks += 1;
            tracing::warn!("Tick {}: {:?}, holding previous command", tick, solution.status);
        }

        let error = stance.tracking_error(&command, &wrench);
        summary.max_tracking_error = summary.max_tracking_error.max(error);

        if args.verbose {
            let normals: Vec<String> = (0..FEET).map(|foot| format!("{:7.2}", command[3 * foot + 2])).collect();
            println!(
                "tick {:4}  iters {:2}  fz [{}]  error {:.3e}",
                tick,
                solution.iterations,
                normals.join(" "),
                error
            );
        }
    }

    Ok(summary)
}

/// Net force the body needs, swaying in a slow figure eight
fn desired_force(tick: usize) -> DVector<f64> {
    let t = tick as f64 * 0.02;
    DVector::from_vec(vec![
        0.3 * BODY_WEIGHT * t.sin(),
        0.2 * BODY_WEIGHT * (2.0 * t).sin(),
        BODY_WEIGHT * (1.0 + 0.1 * (3.0 * t).cos()),
    ])
}

struct Stance {
    grasp: DMatrix<f64>,
    cost_quadratic: DMatrix<f64>,
    friction: DMatrix<f64>,
    friction_rhs: DVector<f64>,
    lower_bounds: DVector<f64>,
    upper_bounds: DVector<f64>,
}

impl Stance {
    fn new(normal_limits: [f64; FEET]) -> Self {
        let n = 3 * FEET;
        let grasp = grasp_matrix();
        let cost_quadratic = 2.0 * (grasp.transpose() * &grasp + DMatrix::identity(n, n) * FORCE_REGULARIZATION);

        let mut friction = DMatrix::zeros(4 * FEET, n);
        let mut row = 0;
        for foot in 0..FEET {
            for tangent in [3 * foot, 3 * foot + 1] {
                for sign in [1.0, -1.0] {
                    friction[(row, tangent)] = sign;
                    friction[(row, 3 * foot + 2)] = -FRICTION_COEFFICIENT;
                    row += 1;
                }
            }
        }

        let mut lower_bounds = DVector::from_element(n, f64::NEG_INFINITY);
        let mut upper_bounds = DVector::from_element(n, f64::INFINITY);
        for foot in 0..FEET {
            lower_bounds[3 * foot + 2] = 0.0;
            upper_bounds[3 * foot + 2] = normal_limits[foot];
        }

        Stance {
            grasp,
            cost_quadratic,
            friction_rhs: DVector::zeros(4 * FEET),
            friction,
            lower_bounds,
            upper_bounds,
        }
    }

    /// Tracking cost |G f - w|^2 + r |f|^2 for this tick's wrench
    fn load_into(&self, solver: &mut SimpleActiveSetQpSolver, wrench: &DVector<f64>) -> Result<(), QpError> {
        let cost_linear = -2.0 * self.grasp.transpose() * wrench;
        solver.set_quadratic_cost_function(&self.cost_quadratic, &cost_linear, wrench.norm_squared())?;
        solver.set_linear_inequality_constraints(&self.friction, &self.friction_rhs)?;
        solver.set_lower_bounds(&self.lower_bounds)?;
        solver.set_upper_bounds(&self.upper_bounds)?;
        Ok(())
    }

    fn tracking_error(&self, forces: &DVector<f64>, wrench: &DVector<f64>) -> f64 {
        (&self.grasp * forces - wrench).norm()
    }
}

/// Sums the per-foot forces into the net body force
fn grasp_matrix() -> DMatrix<f64> {
    let mut grasp = DMatrix::zeros(3, 3 * FEET);
    for foot in 0..FEET {
        for axis in 0..3 {
            grasp[(axis, 3 * foot + axis)] = 1.0;
        }
    }
    grasp
}

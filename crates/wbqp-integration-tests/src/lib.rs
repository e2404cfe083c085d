//! Shared fixtures for the cross-crate scenarios: a two-contact force
//! distribution problem that varies per control tick, and a KKT checker that
//! works for any backend's solution.

use nalgebra::{DMatrix, DVector};
use wbqp_solver::{QpProblem, QpSolution};

/// Friction coefficient of the linearized friction pyramid
pub const FRICTION_COEFFICIENT: f64 = 0.3;
/// Normal force limits per contact
pub const MAX_NORMAL_FORCE: [f64; 2] = [40.0, 200.0];
const FORCE_REGULARIZATION: f64 = 1e-2;

/// Desired net force at a given tick, swaying sideways over time
pub fn desired_wrench(tick: usize) -> DVector<f64> {
    let t = tick as f64 * 0.05;
    DVector::from_vec(vec![30.0 * t.sin(), 20.0 * t.cos(), 100.0])
}

/// Distribute `wrench` over two point contacts.
///
/// Variables are `[fx0, fy0, fz0, fx1, fy1, fz1]`. The cost is
/// `|G f - w|^2 + r |f|^2` with `G = [I I]`, the friction pyramid gives four
/// inequality rows per contact, and the normal forces are bounded by
/// `0 <= fz <= MAX_NORMAL_FORCE`.
pub fn contact_force_problem(wrench: &DVector<f64>) -> QpProblem {
    let mut grasp = DMatrix::zeros(3, 6);
    for contact in 0..2 {
        for axis in 0..3 {
            grasp[(axis, 3 * contact + axis)] = 1.0;
        }
    }

    let cost_quadratic = 2.0 * (grasp.transpose() * &grasp + DMatrix::identity(6, 6) * FORCE_REGULARIZATION);
    let cost_linear = -2.0 * grasp.transpose() * wrench;
    let cost_offset = wrench.norm_squared();

    let mut friction = DMatrix::zeros(8, 6);
    let mut row = 0;
    for contact in 0..2 {
        let normal = 3 * contact + 2;
        for tangent in [3 * contact, 3 * contact + 1] {
            for sign in [1.0, -1.0] {
                friction[(row, tangent)] = sign;
                friction[(row, normal)] = -FRICTION_COEFFICIENT;
                row += 1;
            }
        }
    }

    let mut lower = DVector::from_element(6, f64::NEG_INFINITY);
    let mut upper = DVector::from_element(6, f64::INFINITY);
    for contact in 0..2 {
        lower[3 * contact + 2] = 0.0;
        upper[3 * contact + 2] = MAX_NORMAL_FORCE[contact];
    }

    QpProblem::new(cost_quadratic, cost_linear, cost_offset)
        .with_inequality_constraints(friction, DVector::zeros(8))
        .with_lower_bounds(lower)
        .with_upper_bounds(upper)
}

/// Worst violation of each KKT condition at a solution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KktResiduals {
    pub stationarity: f64,
    pub primal_infeasibility: f64,
    pub dual_infeasibility: f64,
    pub complementarity: f64,
}

impl KktResiduals {
    pub fn max(&self) -> f64 {
        self.stationarity
            .max(self.primal_infeasibility)
            .max(self.dual_infeasibility)
            .max(self.complementarity)
    }
}

/// Evaluate the KKT conditions of `problem` at `solution`, using the
/// multiplier convention `Q x + q + A' λ_eq + C' λ_in - λ_lb + λ_ub = 0`
pub fn kkt_residuals(problem: &QpProblem, solution: &QpSolution) -> KktResiduals {
    let n = problem.num_vars();
    let x = DVector::from_column_slice(&solution.x);
    let symmetric = (&problem.cost_quadratic + problem.cost_quadratic.transpose()) * 0.5;

    let mut gradient = &symmetric * &x + &problem.cost_linear;
    if problem.equality_matrix.nrows() > 0 {
        gradient += problem.equality_matrix.transpose() * DVector::from_column_slice(&solution.equality_multipliers);
    }
    if problem.inequality_matrix.nrows() > 0 {
        gradient +=
            problem.inequality_matrix.transpose() * DVector::from_column_slice(&solution.inequality_multipliers);
    }
    for i in 0..problem.lower_bounds.len() {
        gradient[i] -= solution.lower_bound_multipliers[i];
    }
    for i in 0..problem.upper_bounds.len() {
        gradient[i] += solution.upper_bound_multipliers[i];
    }

    let mut primal: f64 = 0.0;
    let mut dual: f64 = 0.0;
    let mut complementarity: f64 = 0.0;

    if problem.equality_matrix.nrows() > 0 {
        let residual = &problem.equality_matrix * &x - &problem.equality_vector;
        primal = primal.max(residual.amax());
    }

    if problem.inequality_matrix.nrows() > 0 {
        let slack = &problem.inequality_vector - &problem.inequality_matrix * &x;
        for (i, &multiplier) in solution.inequality_multipliers.iter().enumerate() {
            primal = primal.max(-slack[i]);
            dual = dual.max(-multiplier);
            complementarity = complementarity.max((multiplier * slack[i]).abs());
        }
    }

    for i in 0..problem.lower_bounds.len() {
        let multiplier = solution.lower_bound_multipliers[i];
        dual = dual.max(-multiplier);
        if problem.lower_bounds[i].is_finite() {
            let slack = x[i] - problem.lower_bounds[i];
            primal = primal.max(-slack);
            complementarity = complementarity.max((multiplier * slack).abs());
        }
    }

    for i in 0..problem.upper_bounds.len() {
        let multiplier = solution.upper_bound_multipliers[i];
        dual = dual.max(-multiplier);
        if problem.upper_bounds[i].is_finite() {
            let slack = problem.upper_bounds[i] - x[i];
            primal = primal.max(-slack);
            complementarity = complementarity.max((multiplier * slack).abs());
        }
    }

    KktResiduals {
        stationarity: if n > 0 { gradient.amax() } else { 0.0 },
        primal_infeasibility: primal,
        dual_infeasibility: dual,
        complementarity,
    }
}

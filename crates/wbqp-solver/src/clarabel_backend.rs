use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use nalgebra::{DMatrix, DVector};

use wbqp_linalg::symmetrize_into;
use wbqp_types::Result;

use crate::{QpProblem, QpSolution, QpSolverBackend, QpStatus};

const SPARSITY_THRESHOLD: f64 = 1e-12;

/// Interior-point reference backend built on Clarabel.
///
/// Much slower per solve than [`SimpleActiveSetQpSolver`](crate::SimpleActiveSetQpSolver)
/// but convergent on every feasible convex problem, so it serves as the
/// ground truth in tests and benchmarks.
pub struct ClarabelQpSolver {
    verbose: bool,
    max_iter: u32,
    tol_gap_abs: f64,
    tol_gap_rel: f64,
}

impl ClarabelQpSolver {
    pub fn new() -> Self {
        ClarabelQpSolver {
            verbose: false,
            max_iter: 200,
            tol_gap_abs: 1e-10,
            tol_gap_rel: 1e-10,
        }
    }

    pub fn with_params(max_iter: u32, tolerance: f64) -> Self {
        ClarabelQpSolver {
            verbose: false,
            max_iter,
            tol_gap_abs: tolerance,
            tol_gap_rel: tolerance,
        }
    }
}

impl Default for ClarabelQpSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl QpSolverBackend for ClarabelQpSolver {
    fn solve_qp(&mut self, problem: &QpProblem) -> Result<QpSolution> {
        problem.validate()?;

        let n = problem.num_vars();
        let number_of_equalities = problem.equality_matrix.nrows();
        let number_of_inequalities = problem.inequality_matrix.nrows();

        let mut symmetric_cost = DMatrix::zeros(n, n);
        symmetrize_into(&problem.cost_quadratic, &mut symmetric_cost);
        let p_csc = to_clarabel_csc_upper(&symmetric_cost);

        // Clarabel form: A x + s = b with s in the cone.
        // Rows are stacked as [equalities | inequalities | finite lower | finite upper].
        let finite_lower: Vec<usize> = finite_indices(&problem.lower_bounds);
        let finite_upper: Vec<usize> = finite_indices(&problem.upper_bounds);
        let number_of_rows =
            number_of_equalities + number_of_inequalities + finite_lower.len() + finite_upper.len();

        let mut a = DMatrix::zeros(number_of_rows, n);
        let mut b = Vec::with_capacity(number_of_rows);

        if number_of_equalities > 0 {
            a.rows_mut(0, number_of_equalities).copy_from(&problem.equality_matrix);
        }
        b.extend(problem.equality_vector.iter());

        if number_of_inequalities > 0 {
            a.rows_mut(number_of_equalities, number_of_inequalities)
                .copy_from(&problem.inequality_matrix);
        }
        b.extend(problem.inequality_vector.iter());

        let mut row = number_of_equalities + number_of_inequalities;
        for &i in &finite_lower {
            // x_i >= lb_i  ->  -x_i + s = -lb_i
            a[(row, i)] = -1.0;
            b.push(-problem.lower_bounds[i]);
            row += 1;
        }
        for &i in &finite_upper {
            a[(row, i)] = 1.0;
            b.push(problem.upper_bounds[i]);
            row += 1;
        }

        let mut cones = Vec::new();
        if number_of_equalities > 0 {
            cones.push(SupportedConeT::ZeroConeT(number_of_equalities));
        }
        let number_of_nonnegative_rows = number_of_rows - number_of_equalities;
        if number_of_nonnegative_rows > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(number_of_nonnegative_rows));
        }

        let a_csc = to_clarabel_csc(&a);

        let mut settings = DefaultSettings::default();
        settings.verbose = self.verbose;
        settings.max_iter = self.max_iter;
        settings.tol_gap_abs = self.tol_gap_abs;
        settings.tol_gap_rel = self.tol_gap_rel;

        let mut solver = DefaultSolver::new(&p_csc, problem.cost_linear.as_slice(), &a_csc, &b, &cones, settings);
        solver.solve();

        let status = match solver.solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => QpStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => QpStatus::PrimalInfeasible,
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => QpStatus::DualInfeasible,
            SolverStatus::MaxIterations => QpStatus::MaxIterations,
            _ => QpStatus::Unsolved,
        };

        // z >= 0 on the nonnegative cone matches the active-set sign convention
        let z = &solver.solution.z;
        let equality_multipliers = z[..number_of_equalities].to_vec();
        let inequality_multipliers =
            z[number_of_equalities..number_of_equalities + number_of_inequalities].to_vec();

        let mut lower_bound_multipliers = vec![0.0; problem.lower_bounds.len()];
        let mut upper_bound_multipliers = vec![0.0; problem.upper_bounds.len()];
        let mut row = number_of_equalities + number_of_inequalities;
        for &i in &finite_lower {
            lower_bound_multipliers[i] = z[row];
            row += 1;
        }
        for &i in &finite_upper {
            upper_bound_multipliers[i] = z[row];
            row += 1;
        }

        let x = solver.solution.x.clone();
        let objective = problem.objective(&DVector::from_column_slice(&x));

        tracing::debug!(
            "Clarabel finished with {:?} after {} iterations",
            solver.solution.status,
            solver.info.iterations
        );

        Ok(QpSolution {
            x,
            equality_multipliers,
            inequality_multipliers,
            lower_bound_multipliers,
            upper_bound_multipliers,
            status,
            objective,
            iterations: solver.info.iterations as usize,
        })
    }
}

fn finite_indices(bounds: &DVector<f64>) -> Vec<usize> {
    bounds
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, _)| i)
        .collect()
}

/// Convert DMatrix to Clarabel CSC format (upper triangle only for P)
fn to_clarabel_csc_upper(mat: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = vec![0];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for col in 0..mat.ncols() {
        for row in 0..=col {
            let val = mat[(row, col)];
            if val.abs() > SPARSITY_THRESHOLD {
                rowval.push(row);
                nzval.push(val);
            }
        }
        colptr.push(nzval.len());
    }

    CscMatrix {
        m: mat.nrows(),
        n: mat.ncols(),
        colptr,
        rowval,
        nzval,
    }
}

fn to_clarabel_csc(mat: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = vec![0];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for col in 0..mat.ncols() {
        for row in 0..mat.nrows() {
            let val = mat[(row, col)];
            if val.abs() > SPARSITY_THRESHOLD {
                rowval.push(row);
                nzval.push(val);
            }
        }
        colptr.push(nzval.len());
    }

    CscMatrix {
        m: mat.nrows(),
        n: mat.ncols(),
        colptr,
        rowval,
        nzval,
    }
}

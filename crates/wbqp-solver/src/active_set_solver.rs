use nalgebra::{DMatrix, DVector};

use wbqp_linalg::{
    contains_nan, copy_matrix_into, copy_vector_into, reshape_matrix, reshape_vector,
    symmetrize_into, validate_psd, with_cholesky,
};
use wbqp_types::{ProblemDimensions, QpError, Result, SolverParams};

use crate::active_set::ActiveSet;
use crate::backend::{QpSolution, QpSolverBackend, QpStatus};
use crate::qp_problem::QpProblem;

/// Active-set QP solver for the per-tick whole-body control problem:
///
/// ```text
///     minimize     0.5 x' Q x + q' x + c
///     subject to   A x  = b
///                  C x <= d
///                  lb <= x <= ub
/// ```
///
/// `Q` must be positive definite and is inverted once per solve. Each active-set guess is solved in closed
/// form through the Schur complement `J Q^-1 J'` of the stacked equality
/// Jacobian `J` (the problem's equalities plus promoted inequality and bound rows),
/// which is small when few constraints are active. Constraints are added and
/// removed in damped batches: only violations within a fraction of the worst
/// one are added, and only multipliers within a fraction of the most negative
/// one are released. This trades iterations for resistance to cycling between
/// two alternately binding constraints.
///
/// The method is fast when it converges but has no convergence guarantee for
/// degenerate problems. Hitting the revision cap is reported as an all-NaN
/// `x` with status [`QpStatus::MaxIterations`], never as an error.
///
/// All scratch matrices are owned by the solver and resized in place, so
/// repeated solves of same-shaped problems do not allocate (see
/// [`solve_into`](Self::solve_into)). One instance must not be shared between
/// threads mid-solve, which `&mut self` already enforces.
pub struct SimpleActiveSetQpSolver {
    params: SolverParams,

    quadratic_cost: DMatrix<f64>,
    linear_cost: DVector<f64>,
    cost_offset: f64,

    equality_matrix: DMatrix<f64>,
    equality_vector: DVector<f64>,
    inequality_matrix: DMatrix<f64>,
    inequality_vector: DVector<f64>,
    lower_bounds: DVector<f64>,
    upper_bounds: DVector<f64>,

    active_set: ActiveSet,
    previous_dimensions: Option<ProblemDimensions>,
    workspace: Workspace,
}

struct Workspace {
    q_inverse: DMatrix<f64>,
    q_inverse_linear_cost: DVector<f64>,
    factorization: DMatrix<f64>,

    /// Stacked Jacobian of the promoted equality system, transposed (n x m)
    jacobian_transpose: DMatrix<f64>,
    constraint_rhs: DVector<f64>,
    q_inverse_jacobian_transpose: DMatrix<f64>,
    schur_complement: DMatrix<f64>,
    augmented_multipliers: DVector<f64>,

    solution: DVector<f64>,
    equality_multipliers: DVector<f64>,
    inequality_multipliers: DVector<f64>,
    lower_bound_multipliers: DVector<f64>,
    upper_bound_multipliers: DVector<f64>,

    inequality_violations: DVector<f64>,
    lower_bound_violations: DVector<f64>,
    upper_bound_violations: DVector<f64>,

    changes: ActiveSetChanges,
}

impl Workspace {
    fn new() -> Self {
        Workspace {
            q_inverse: DMatrix::zeros(0, 0),
            q_inverse_linear_cost: DVector::zeros(0),
            factorization: DMatrix::zeros(0, 0),
            jacobian_transpose: DMatrix::zeros(0, 0),
            constraint_rhs: DVector::zeros(0),
            q_inverse_jacobian_transpose: DMatrix::zeros(0, 0),
            schur_complement: DMatrix::zeros(0, 0),
            augmented_multipliers: DVector::zeros(0),
            solution: DVector::zeros(0),
            equality_multipliers: DVector::zeros(0),
            inequality_multipliers: DVector::zeros(0),
            lower_bound_multipliers: DVector::zeros(0),
            upper_bound_multipliers: DVector::zeros(0),
            inequality_violations: DVector::zeros(0),
            lower_bound_violations: DVector::zeros(0),
            upper_bound_violations: DVector::zeros(0),
            changes: ActiveSetChanges::default(),
        }
    }
}

#[derive(Debug, Default)]
struct ActiveSetChanges {
    inequalities_to_add: Vec<usize>,
    inequalities_to_remove: Vec<usize>,
    lower_bounds_to_add: Vec<usize>,
    lower_bounds_to_remove: Vec<usize>,
    upper_bounds_to_add: Vec<usize>,
    upper_bounds_to_remove: Vec<usize>,
}

impl ActiveSetChanges {
    fn clear(&mut self) {
        self.inequalities_to_add.clear();
        self.inequalities_to_remove.clear();
        self.lower_bounds_to_add.clear();
        self.lower_bounds_to_remove.clear();
        self.upper_bounds_to_add.clear();
        self.upper_bounds_to_remove.clear();
    }

    fn is_empty(&self) -> bool {
        self.inequalities_to_add.is_empty()
            && self.inequalities_to_remove.is_empty()
            && self.lower_bounds_to_add.is_empty()
            && self.lower_bounds_to_remove.is_empty()
            && self.upper_bounds_to_add.is_empty()
            && self.upper_bounds_to_remove.is_empty()
    }
}

impl SimpleActiveSetQpSolver {
    pub fn new() -> Self {
        SimpleActiveSetQpSolver {
            params: SolverParams::default(),
            quadratic_cost: DMatrix::zeros(0, 0),
            linear_cost: DVector::zeros(0),
            cost_offset: 0.0,
            equality_matrix: DMatrix::zeros(0, 0),
            equality_vector: DVector::zeros(0),
            inequality_matrix: DMatrix::zeros(0, 0),
            inequality_vector: DVector::zeros(0),
            lower_bounds: DVector::zeros(0),
            upper_bounds: DVector::zeros(0),
            active_set: ActiveSet::new(),
            previous_dimensions: None,
            workspace: Workspace::new(),
        }
    }

    pub fn with_params(params: SolverParams) -> Result<Self> {
        params.validate()?;
        let mut solver = Self::new();
        solver.params = params;
        Ok(solver)
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn set_convergence_threshold(&mut self, convergence_threshold: f64) -> Result<()> {
        self.update_params(|params| params.convergence_threshold = convergence_threshold)
    }

    pub fn set_convergence_threshold_for_lagrange_multipliers(&mut self, threshold: f64) -> Result<()> {
        self.update_params(|params| params.convergence_threshold_for_lagrange_multipliers = threshold)
    }

    pub fn set_max_number_of_iterations(&mut self, max_number_of_iterations: usize) -> Result<()> {
        self.update_params(|params| params.max_number_of_iterations = max_number_of_iterations)
    }

    pub fn set_use_warm_start(&mut self, use_warm_start: bool) {
        self.params.use_warm_start = use_warm_start;
    }

    /// Set the damping fractions used when adding and removing constraints
    pub fn set_violation_fractions(&mut self, to_add: f64, to_remove: f64) -> Result<()> {
        self.update_params(|params| {
            params.violation_fraction_to_add = to_add;
            params.violation_fraction_to_remove = to_remove;
        })
    }

    /// Apply `change` to a copy of the parameters and keep it only if it validates
    fn update_params(&mut self, change: impl FnOnce(&mut SolverParams)) -> Result<()> {
        let mut params = self.params.clone();
        change(&mut params);
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Drop the stored problem. Call before loading a problem with a
    /// different number of variables so stale constraints do not linger.
    pub fn clear(&mut self) {
        self.quadratic_cost.resize_mut(0, 0, 0.0);
        self.linear_cost.resize_vertically_mut(0, 0.0);
        self.cost_offset = 0.0;
        self.equality_matrix.resize_mut(0, 0, 0.0);
        self.equality_vector.resize_vertically_mut(0, 0.0);
        self.inequality_matrix.resize_mut(0, 0, 0.0);
        self.inequality_vector.resize_vertically_mut(0, 0.0);
        self.lower_bounds.resize_vertically_mut(0, 0.0);
        self.upper_bounds.resize_vertically_mut(0, 0.0);
    }

    /// Set the cost `0.5 x' Q x + q' x + c`. `Q` is stored as `(Q + Q') / 2`.
    pub fn set_quadratic_cost_function(
        &mut self,
        cost_quadratic: &DMatrix<f64>,
        cost_linear: &DVector<f64>,
        cost_offset: f64,
    ) -> Result<()> {
        if cost_quadratic.nrows() != cost_quadratic.ncols() {
            return Err(QpError::DimensionMismatch(format!(
                "Q must be square, got {}x{}",
                cost_quadratic.nrows(),
                cost_quadratic.ncols()
            )));
        }
        if cost_linear.len() != cost_quadratic.nrows() {
            return Err(QpError::dimension("q length", cost_quadratic.nrows(), cost_linear.len()));
        }

        symmetrize_into(cost_quadratic, &mut self.quadratic_cost);
        copy_vector_into(cost_linear, &mut self.linear_cost);
        self.cost_offset = cost_offset;
        Ok(())
    }

    /// Set `A x = b`. Must be called after the cost so `n` is known.
    pub fn set_linear_equality_constraints(&mut self, a: &DMatrix<f64>, b: &DVector<f64>) -> Result<()> {
        self.check_constraint_shape("A", a, "b", b)?;
        copy_matrix_into(a, &mut self.equality_matrix);
        copy_vector_into(b, &mut self.equality_vector);
        Ok(())
    }

    /// Set `C x <= d`. Must be called after the cost so `n` is known.
    pub fn set_linear_inequality_constraints(&mut self, c: &DMatrix<f64>, d: &DVector<f64>) -> Result<()> {
        self.check_constraint_shape("C", c, "d", d)?;
        copy_matrix_into(c, &mut self.inequality_matrix);
        copy_vector_into(d, &mut self.inequality_vector);
        Ok(())
    }

    /// Set per-variable lower bounds; `-inf` entries leave a variable unbounded below
    pub fn set_lower_bounds(&mut self, lower_bounds: &DVector<f64>) -> Result<()> {
        if lower_bounds.len() != self.num_vars() {
            return Err(QpError::dimension("lower bounds length", self.num_vars(), lower_bounds.len()));
        }
        copy_vector_into(lower_bounds, &mut self.lower_bounds);
        Ok(())
    }

    /// Set per-variable upper bounds; `+inf` entries leave a variable unbounded above
    pub fn set_upper_bounds(&mut self, upper_bounds: &DVector<f64>) -> Result<()> {
        if upper_bounds.len() != self.num_vars() {
            return Err(QpError::dimension("upper bounds length", self.num_vars(), upper_bounds.len()));
        }
        copy_vector_into(upper_bounds, &mut self.upper_bounds);
        Ok(())
    }

    /// Replace the stored problem with `problem` in one call
    pub fn load_problem(&mut self, problem: &QpProblem) -> Result<()> {
        problem.validate()?;

        self.set_quadratic_cost_function(&problem.cost_quadratic, &problem.cost_linear, problem.cost_offset)?;
        self.set_linear_equality_constraints(&problem.equality_matrix, &problem.equality_vector)?;
        self.set_linear_inequality_constraints(&problem.inequality_matrix, &problem.inequality_vector)?;

        if problem.lower_bounds.is_empty() {
            self.lower_bounds.resize_vertically_mut(0, 0.0);
        } else {
            self.set_lower_bounds(&problem.lower_bounds)?;
        }
        if problem.upper_bounds.is_empty() {
            self.upper_bounds.resize_vertically_mut(0, 0.0);
        } else {
            self.set_upper_bounds(&problem.upper_bounds)?;
        }

        Ok(())
    }

    pub fn reset_active_constraints(&mut self) {
        self.active_set.clear();
    }

    /// Active set reached by the last solve (or seeded for the next one)
    pub fn active_set(&self) -> &ActiveSet {
        &self.active_set
    }

    pub fn num_vars(&self) -> usize {
        self.quadratic_cost.nrows()
    }

    pub fn dimensions(&self) -> ProblemDimensions {
        ProblemDimensions {
            variables: self.num_vars(),
            equality_constraints: self.equality_matrix.nrows(),
            inequality_constraints: self.inequality_matrix.nrows(),
            lower_bounds: self.lower_bounds.len(),
            upper_bounds: self.upper_bounds.len(),
        }
    }

    /// Evaluate `0.5 x' Q x + q' x + c` for any `x` of the right length
    pub fn objective_cost(&self, x: &DVector<f64>) -> Result<f64> {
        if x.len() != self.num_vars() {
            return Err(QpError::dimension("x length", self.num_vars(), x.len()));
        }
        Ok(self.evaluate_objective(x))
    }

    /// Solve the stored problem, allocating a fresh [`QpSolution`]
    pub fn solve(&mut self) -> Result<QpSolution> {
        let mut solution = QpSolution::new();
        self.solve_into(&mut solution)?;
        Ok(solution)
    }

    /// Solve the stored problem into a caller-owned solution, reusing its buffers
    pub fn solve_into(&mut self, solution: &mut QpSolution) -> Result<()> {
        let dimensions = self.validate_problem()?;

        let warm_start = self.params.use_warm_start && self.previous_dimensions == Some(dimensions);
        self.previous_dimensions = Some(dimensions);
        if warm_start {
            self.drop_unbounded_active_bounds();
            tracing::trace!(
                "Warm starting with {} active constraints",
                self.active_set.len()
            );
        } else {
            self.active_set.clear();
        }

        self.compute_q_inverse()?;
        self.solve_equality_constrained_subproblem();

        if warm_start && !self.active_set.is_empty() && contains_nan(&self.workspace.solution) {
            tracing::debug!(
                "Seeded active set is rank deficient for this problem, restarting cold ({})",
                dimensions
            );
            self.active_set.clear();
            self.solve_equality_constrained_subproblem();
        }

        let mut iterations = 0;
        let mut converged = true;

        if !dimensions.is_equality_only() {
            converged = false;
            for _ in 0..self.params.max_number_of_iterations {
                let active_set_was_modified = self.modify_active_set_and_try_again();
                iterations += 1;

                if !active_set_was_modified {
                    converged = true;
                    break;
                }
            }
        }

        let status = if !converged {
            tracing::warn!(
                "Active set did not settle within {} iterations ({})",
                self.params.max_number_of_iterations,
                dimensions
            );
            self.workspace.solution.fill(f64::NAN);
            QpStatus::MaxIterations
        } else if contains_nan(&self.workspace.solution) {
            QpStatus::SingularActiveSet
        } else {
            QpStatus::Optimal
        };

        if status != QpStatus::Optimal {
            // Do not seed the next tick from an active set that failed
            self.active_set.clear();
        }

        self.write_solution(solution, status, iterations);

        tracing::debug!(
            "QP solve finished: {:?} after {} iterations ({}, {} active)",
            status,
            iterations,
            dimensions,
            self.active_set.len()
        );

        Ok(())
    }

    fn check_constraint_shape(
        &self,
        matrix_name: &str,
        matrix: &DMatrix<f64>,
        vector_name: &str,
        vector: &DVector<f64>,
    ) -> Result<()> {
        if matrix.nrows() != vector.len() {
            return Err(QpError::DimensionMismatch(format!(
                "{} has {} rows but {} has length {}",
                matrix_name,
                matrix.nrows(),
                vector_name,
                vector.len()
            )));
        }
        if matrix.nrows() > 0 && matrix.ncols() != self.num_vars() {
            return Err(QpError::dimension(
                &format!("{} columns", matrix_name),
                self.num_vars(),
                matrix.ncols(),
            ));
        }
        Ok(())
    }

    /// Re-check the stored problem as a whole, since setters only see one
    /// family at a time and `n` may have changed since a family was set.
    fn validate_problem(&self) -> Result<ProblemDimensions> {
        let n = self.num_vars();

        if self.linear_cost.len() != n {
            return Err(QpError::dimension("q length", n, self.linear_cost.len()));
        }
        if self.equality_matrix.nrows() > 0 && self.equality_matrix.ncols() != n {
            return Err(QpError::dimension("A columns", n, self.equality_matrix.ncols()));
        }
        if self.inequality_matrix.nrows() > 0 && self.inequality_matrix.ncols() != n {
            return Err(QpError::dimension("C columns", n, self.inequality_matrix.ncols()));
        }
        if !self.lower_bounds.is_empty() && self.lower_bounds.len() != n {
            return Err(QpError::dimension("lower bounds length", n, self.lower_bounds.len()));
        }
        if !self.upper_bounds.is_empty() && self.upper_bounds.len() != n {
            return Err(QpError::dimension("upper bounds length", n, self.upper_bounds.len()));
        }

        let finite_data = self.quadratic_cost.iter().all(|v| v.is_finite())
            && self.linear_cost.iter().all(|v| v.is_finite())
            && self.equality_matrix.iter().all(|v| v.is_finite())
            && self.equality_vector.iter().all(|v| v.is_finite())
            && self.inequality_matrix.iter().all(|v| v.is_finite())
            && self.inequality_vector.iter().all(|v| v.is_finite());
        if !finite_data {
            return Err(QpError::IllSpecifiedProblem(
                "cost and constraint data must be finite".to_string(),
            ));
        }

        if self.lower_bounds.iter().chain(self.upper_bounds.iter()).any(|v| v.is_nan()) {
            return Err(QpError::IllSpecifiedProblem("bounds must not be NaN".to_string()));
        }

        if !self.lower_bounds.is_empty() && !self.upper_bounds.is_empty() {
            for i in 0..n {
                if self.lower_bounds[i] > self.upper_bounds[i] {
                    return Err(QpError::IllSpecifiedProblem(format!(
                        "lower bound {} exceeds upper bound {} for variable {}",
                        self.lower_bounds[i], self.upper_bounds[i], i
                    )));
                }
            }
        }

        Ok(self.dimensions())
    }

    /// Bounds that were active last tick may have been relaxed to `±inf`
    fn drop_unbounded_active_bounds(&mut self) {
        let lower_bounds = &self.lower_bounds;
        let upper_bounds = &self.upper_bounds;
        self.active_set.retain_lower_bounds(|i| lower_bounds[i].is_finite());
        self.active_set.retain_upper_bounds(|i| upper_bounds[i].is_finite());
    }

    fn compute_q_inverse(&mut self) -> Result<()> {
        let n = self.num_vars();
        let ws = &mut self.workspace;

        copy_matrix_into(&self.quadratic_cost, &mut ws.factorization);
        reshape_matrix(&mut ws.q_inverse, n, n);
        ws.q_inverse.fill_with_identity();

        let q_inverse = &mut ws.q_inverse;
        if with_cholesky(&mut ws.factorization, |chol| chol.solve_mut(q_inverse)).is_none() {
            let reason = if validate_psd(&self.quadratic_cost, 1e-12) {
                "is singular"
            } else {
                "is indefinite"
            };
            tracing::debug!("Rejecting cost matrix Q: {}", reason);
            return Err(QpError::IllSpecifiedProblem(format!(
                "quadratic cost matrix Q {}, it must be positive definite",
                reason
            )));
        }

        reshape_vector(&mut ws.q_inverse_linear_cost, self.linear_cost.len());
        ws.q_inverse_linear_cost.gemv(1.0, &ws.q_inverse, &self.linear_cost, 0.0);
        Ok(())
    }

    /// Solve the QP with the problem's equalities and every active constraint
    /// held as an equality, writing `x` and the multipliers into the workspace.
    /// A rank-deficient promoted system leaves `x` filled with NaN.
    fn solve_equality_constrained_subproblem(&mut self) {
        let n = self.num_vars();
        let number_of_equalities = self.equality_matrix.nrows();
        let active_inequalities = self.active_set.inequality_indices();
        let active_lower_bounds = self.active_set.lower_bound_indices();
        let active_upper_bounds = self.active_set.upper_bound_indices();
        let number_of_augmented_equalities = number_of_equalities
            + active_inequalities.len()
            + active_lower_bounds.len()
            + active_upper_bounds.len();

        let ws = &mut self.workspace;
        reshape_vector(&mut ws.equality_multipliers, number_of_equalities);
        reshape_vector(&mut ws.inequality_multipliers, self.inequality_matrix.nrows());
        reshape_vector(&mut ws.lower_bound_multipliers, self.lower_bounds.len());
        reshape_vector(&mut ws.upper_bound_multipliers, self.upper_bounds.len());

        // x = -Q^-1 q for the unconstrained part
        copy_vector_into(&ws.q_inverse_linear_cost, &mut ws.solution);
        ws.solution.neg_mut();

        if number_of_augmented_equalities == 0 {
            return;
        }

        reshape_matrix(&mut ws.jacobian_transpose, n, number_of_augmented_equalities);
        reshape_vector(&mut ws.constraint_rhs, number_of_augmented_equalities);

        for row in 0..number_of_equalities {
            for col in 0..n {
                ws.jacobian_transpose[(col, row)] = self.equality_matrix[(row, col)];
            }
            ws.constraint_rhs[row] = self.equality_vector[row];
        }

        let mut row = number_of_equalities;
        for &index in active_inequalities {
            for col in 0..n {
                ws.jacobian_transpose[(col, row)] = self.inequality_matrix[(index, col)];
            }
            ws.constraint_rhs[row] = self.inequality_vector[index];
            row += 1;
        }

        // x_i >= lb_i is held as -x_i = -lb_i so its multiplier is non-negative when binding
        for &index in active_lower_bounds {
            ws.jacobian_transpose[(index, row)] = -1.0;
            ws.constraint_rhs[row] = -self.lower_bounds[index];
            row += 1;
        }

        for &index in active_upper_bounds {
            ws.jacobian_transpose[(index, row)] = 1.0;
            ws.constraint_rhs[row] = self.upper_bounds[index];
            row += 1;
        }

        // Schur complement J Q^-1 J'
        reshape_matrix(&mut ws.q_inverse_jacobian_transpose, n, number_of_augmented_equalities);
        ws.q_inverse_jacobian_transpose
            .gemm(1.0, &ws.q_inverse, &ws.jacobian_transpose, 0.0);
        reshape_matrix(
            &mut ws.schur_complement,
            number_of_augmented_equalities,
            number_of_augmented_equalities,
        );
        ws.schur_complement
            .gemm_tr(1.0, &ws.jacobian_transpose, &ws.q_inverse_jacobian_transpose, 0.0);

        // (J Q^-1 J') λ = -(J Q^-1 q + d)
        reshape_vector(&mut ws.augmented_multipliers, number_of_augmented_equalities);
        ws.augmented_multipliers
            .gemv_tr(-1.0, &ws.jacobian_transpose, &ws.q_inverse_linear_cost, 0.0);
        ws.augmented_multipliers -= &ws.constraint_rhs;

        let multipliers = &mut ws.augmented_multipliers;
        if with_cholesky(&mut ws.schur_complement, |chol| chol.solve_mut(multipliers)).is_none() {
            tracing::warn!(
                "Promoted equality system with {} rows is rank deficient",
                number_of_augmented_equalities
            );
            ws.solution.fill(f64::NAN);
            return;
        }

        // x = Q^-1 (-q - J' λ)
        ws.solution
            .gemv(-1.0, &ws.q_inverse_jacobian_transpose, &ws.augmented_multipliers, 1.0);

        for i in 0..number_of_equalities {
            ws.equality_multipliers[i] = ws.augmented_multipliers[i];
        }

        let mut row = number_of_equalities;
        for &index in active_inequalities {
            ws.inequality_multipliers[index] = ws.augmented_multipliers[row];
            row += 1;
        }
        for &index in active_lower_bounds {
            ws.lower_bound_multipliers[index] = ws.augmented_multipliers[row];
            row += 1;
        }
        for &index in active_upper_bounds {
            ws.upper_bound_multipliers[index] = ws.augmented_multipliers[row];
            row += 1;
        }
    }

    /// One damped active-set revision. Returns false when nothing changed,
    /// i.e. the current workspace solution is the answer.
    fn modify_active_set_and_try_again(&mut self) -> bool {
        if contains_nan(&self.workspace.solution) {
            return false;
        }

        let fraction_to_add = self.params.violation_fraction_to_add;
        let fraction_to_remove = self.params.violation_fraction_to_remove;
        let violation_threshold = self.params.convergence_threshold;
        let multiplier_threshold = self.params.convergence_threshold_for_lagrange_multipliers;

        let active = &self.active_set;
        let ws = &mut self.workspace;
        let number_of_inequalities = self.inequality_matrix.nrows();
        let number_of_lower_bounds = self.lower_bounds.len();
        let number_of_upper_bounds = self.upper_bounds.len();

        // Violations of inactive constraints, positive means violated
        let mut max_violation = f64::NEG_INFINITY;

        reshape_vector(&mut ws.inequality_violations, number_of_inequalities);
        if number_of_inequalities > 0 {
            ws.inequality_violations
                .gemv(1.0, &self.inequality_matrix, &ws.solution, 0.0);
            ws.inequality_violations -= &self.inequality_vector;
            for i in 0..number_of_inequalities {
                if !active.contains_inequality(i) {
                    max_violation = max_violation.max(ws.inequality_violations[i]);
                }
            }
        }

        reshape_vector(&mut ws.lower_bound_violations, number_of_lower_bounds);
        for i in 0..number_of_lower_bounds {
            ws.lower_bound_violations[i] = self.lower_bounds[i] - ws.solution[i];
            if !active.contains_lower_bound(i) && !active.contains_upper_bound(i) {
                max_violation = max_violation.max(ws.lower_bound_violations[i]);
            }
        }

        reshape_vector(&mut ws.upper_bound_violations, number_of_upper_bounds);
        for i in 0..number_of_upper_bounds {
            ws.upper_bound_violations[i] = ws.solution[i] - self.upper_bounds[i];
            if !active.contains_upper_bound(i) && !active.contains_lower_bound(i) {
                max_violation = max_violation.max(ws.upper_bound_violations[i]);
            }
        }

        let changes = &mut ws.changes;
        changes.clear();

        if max_violation.is_finite() {
            let min_violation_to_add = (1.0 - fraction_to_add) * max_violation + violation_threshold;

            for i in 0..number_of_inequalities {
                if !active.contains_inequality(i) && ws.inequality_violations[i] > min_violation_to_add {
                    changes.inequalities_to_add.push(i);
                }
            }
            for i in 0..number_of_lower_bounds {
                if !active.contains_lower_bound(i)
                    && !active.contains_upper_bound(i)
                    && ws.lower_bound_violations[i] > min_violation_to_add
                {
                    changes.lower_bounds_to_add.push(i);
                }
            }
            for i in 0..number_of_upper_bounds {
                if !active.contains_upper_bound(i)
                    && !active.contains_lower_bound(i)
                    && ws.upper_bound_violations[i] > min_violation_to_add
                {
                    changes.upper_bounds_to_add.push(i);
                }
            }
        }

        // Multipliers of active constraints, negative means the constraint is pulling
        let mut min_multiplier = f64::INFINITY;
        for &i in active.inequality_indices() {
            min_multiplier = min_multiplier.min(ws.inequality_multipliers[i]);
        }
        for &i in active.lower_bound_indices() {
            min_multiplier = min_multiplier.min(ws.lower_bound_multipliers[i]);
        }
        for &i in active.upper_bound_indices() {
            min_multiplier = min_multiplier.min(ws.upper_bound_multipliers[i]);
        }

        if min_multiplier.is_finite() {
            let max_multiplier_to_remove = -(1.0 - fraction_to_remove) * min_multiplier - multiplier_threshold;

            for &i in active.inequality_indices() {
                if ws.inequality_multipliers[i] < max_multiplier_to_remove {
                    changes.inequalities_to_remove.push(i);
                }
            }
            for &i in active.lower_bound_indices() {
                if ws.lower_bound_multipliers[i] < max_multiplier_to_remove {
                    changes.lower_bounds_to_remove.push(i);
                }
            }
            for &i in active.upper_bound_indices() {
                if ws.upper_bound_multipliers[i] < max_multiplier_to_remove {
                    changes.upper_bounds_to_remove.push(i);
                }
            }
        }

        tracing::trace!(
            "Active-set check: worst violation {:e}, most negative multiplier {:e}",
            max_violation,
            min_multiplier
        );

        if changes.is_empty() {
            return false;
        }

        tracing::debug!(
            "Active set change: inequalities +{:?} -{:?}, lower bounds +{:?} -{:?}, upper bounds +{:?} -{:?}",
            changes.inequalities_to_add,
            changes.inequalities_to_remove,
            changes.lower_bounds_to_add,
            changes.lower_bounds_to_remove,
            changes.upper_bounds_to_add,
            changes.upper_bounds_to_remove
        );

        let active = &mut self.active_set;
        for &i in &changes.inequalities_to_add {
            active.add_inequality(i);
        }
        for &i in &changes.inequalities_to_remove {
            active.remove_inequality(i);
        }
        for &i in &changes.lower_bounds_to_add {
            active.add_lower_bound(i);
        }
        for &i in &changes.lower_bounds_to_remove {
            active.remove_lower_bound(i);
        }
        for &i in &changes.upper_bounds_to_add {
            active.add_upper_bound(i);
        }
        for &i in &changes.upper_bounds_to_remove {
            active.remove_upper_bound(i);
        }

        self.solve_equality_constrained_subproblem();
        true
    }

    fn evaluate_objective(&self, x: &DVector<f64>) -> f64 {
        let n = self.num_vars();
        let mut quadratic = 0.0;
        for j in 0..n {
            for i in 0..n {
                quadratic += x[i] * self.quadratic_cost[(i, j)] * x[j];
            }
        }
        0.5 * quadratic + self.linear_cost.dot(x) + self.cost_offset
    }

    fn write_solution(&self, solution: &mut QpSolution, status: QpStatus, iterations: usize) {
        let ws = &self.workspace;

        fill_from(&mut solution.x, &ws.solution);
        fill_from(&mut solution.equality_multipliers, &ws.equality_multipliers);
        fill_from(&mut solution.inequality_multipliers, &ws.inequality_multipliers);
        fill_from(&mut solution.lower_bound_multipliers, &ws.lower_bound_multipliers);
        fill_from(&mut solution.upper_bound_multipliers, &ws.upper_bound_multipliers);

        solution.status = status;
        solution.iterations = iterations;
        solution.objective = self.evaluate_objective(&ws.solution);
    }
}

fn fill_from(target: &mut Vec<f64>, source: &DVector<f64>) {
    target.clear();
    target.extend_from_slice(source.as_slice());
}

impl Default for SimpleActiveSetQpSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl QpSolverBackend for SimpleActiveSetQpSolver {
    fn solve_qp(&mut self, problem: &QpProblem) -> Result<QpSolution> {
        self.load_problem(problem)?;
        self.solve()
    }
}

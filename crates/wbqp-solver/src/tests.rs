// Solver behaviour on small hand-checked problems

#[cfg(test)]
mod tests {
    use crate::*;
    use nalgebra::{DMatrix, DVector};
    use proptest::prelude::*;
    use wbqp_types::{QpError, SolverParams};

    fn vector(values: &[f64]) -> DVector<f64> {
        DVector::from_vec(values.to_vec())
    }

    fn box_problem_solver() -> SimpleActiveSetQpSolver {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(2, 2), &vector(&[-4.0, -4.0]), 0.0)
            .unwrap();
        solver.set_upper_bounds(&vector(&[1.0, 1.0])).unwrap();
        solver
    }

    #[test]
    fn test_box_constrained_least_squares() {
        let mut solver = box_problem_solver();
        let solution = solver.solve().unwrap();

        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.x[0] - 1.0).abs() < 1e-10, "x[0] = {}", solution.x[0]);
        assert!((solution.x[1] - 1.0).abs() < 1e-10, "x[1] = {}", solution.x[1]);
        assert!(solution.upper_bound_multipliers[0] > 0.0);
        assert!(solution.upper_bound_multipliers[1] > 0.0);
        assert!((solution.upper_bound_multipliers[0] - 3.0).abs() < 1e-10);
        assert!(solution.lower_bound_multipliers.is_empty());
        assert_eq!(solver.active_set().upper_bound_indices(), &[0, 1]);
    }

    #[test]
    fn test_single_equality() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(2, 2), &DVector::zeros(2), 0.0)
            .unwrap();
        solver
            .set_linear_equality_constraints(&DMatrix::from_row_slice(1, 2, &[1.0, 1.0]), &vector(&[2.0]))
            .unwrap();

        let solution = solver.solve().unwrap();

        assert_eq!(solution.status, QpStatus::Optimal);
        assert_eq!(solution.iterations, 0);
        assert!((solution.x[0] - 1.0).abs() < 1e-10);
        assert!((solution.x[1] - 1.0).abs() < 1e-10);
        assert!((solution.equality_multipliers[0] + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_slack_inequality_stays_inactive() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(2, 2), &DVector::zeros(2), 0.0)
            .unwrap();
        solver
            .set_linear_inequality_constraints(&DMatrix::from_row_slice(1, 2, &[1.0, 1.0]), &vector(&[1.0]))
            .unwrap();

        let solution = solver.solve().unwrap();

        assert_eq!(solution.status, QpStatus::Optimal);
        assert_eq!(solution.x, vec![0.0, 0.0]);
        assert_eq!(solution.inequality_multipliers, vec![0.0]);
        assert_eq!(solution.iterations, 1);
        assert!(solver.active_set().is_empty());
    }

    #[test]
    fn test_unconstrained_matches_closed_form() {
        let q_matrix = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0]);
        let q = vector(&[1.0, -2.0, 0.5]);

        let mut solver = SimpleActiveSetQpSolver::new();
        solver.set_quadratic_cost_function(&q_matrix, &q, 0.0).unwrap();
        let solution = solver.solve().unwrap();

        let expected = -q_matrix.clone().try_inverse().unwrap() * &q;
        for i in 0..3 {
            assert!((solution.x[i] - expected[i]).abs() < 1e-10);
        }
        assert_eq!(solution.iterations, 0);
    }

    #[test]
    fn test_asymmetric_cost_is_symmetrized() {
        // Upper and lower off-diagonals differ but average to the same Q
        let asymmetric = DMatrix::from_row_slice(2, 2, &[2.0, 1.5, -0.5, 2.0]);
        let symmetric = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 2.0]);
        let q = vector(&[1.0, -1.0]);

        let mut solver = SimpleActiveSetQpSolver::new();
        solver.set_quadratic_cost_function(&asymmetric, &q, 0.0).unwrap();
        let from_asymmetric = solver.solve().unwrap();

        solver.set_quadratic_cost_function(&symmetric, &q, 0.0).unwrap();
        let from_symmetric = solver.solve().unwrap();

        assert_eq!(from_asymmetric.x, from_symmetric.x);
    }

    #[test]
    fn test_equality_solution_is_stationary() {
        let q_matrix = DMatrix::from_row_slice(3, 3, &[2.0, 0.5, 0.0, 0.5, 1.0, 0.0, 0.0, 0.0, 3.0]);
        let q = vector(&[1.0, -1.0, 2.0]);
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 1.0, 1.0, -1.0, 0.0]);
        let b = vector(&[1.0, 0.5]);

        let mut solver = SimpleActiveSetQpSolver::new();
        solver.set_quadratic_cost_function(&q_matrix, &q, 0.0).unwrap();
        solver.set_linear_equality_constraints(&a, &b).unwrap();
        let solution = solver.solve().unwrap();

        let x = DVector::from_vec(solution.x.clone());
        let lambda = DVector::from_vec(solution.equality_multipliers.clone());

        assert!((&a * &x - &b).amax() < 1e-10);
        // Q x + q + A' λ = 0
        let gradient = &q_matrix * &x + &q + a.transpose() * &lambda;
        assert!(gradient.amax() < 1e-10, "gradient = {}", gradient);
    }

    #[test]
    fn test_mixed_constraints_reach_kkt_point() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(3, 3), &vector(&[-2.0, 1.0, -3.0]), 0.0)
            .unwrap();
        solver
            .set_linear_inequality_constraints(&DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 0.0]), &vector(&[1.0]))
            .unwrap();
        solver
            .set_lower_bounds(&vector(&[f64::NEG_INFINITY, 0.0, f64::NEG_INFINITY]))
            .unwrap();
        solver
            .set_upper_bounds(&vector(&[f64::INFINITY, f64::INFINITY, 2.0]))
            .unwrap();

        let solution = solver.solve().unwrap();
        assert_eq!(solution.status, QpStatus::Optimal);

        let expected = [1.0, 0.0, 2.0];
        for i in 0..3 {
            assert!((solution.x[i] - expected[i]).abs() < 1e-10, "x = {:?}", solution.x);
        }

        assert!((solution.inequality_multipliers[0] - 1.0).abs() < 1e-10);
        assert!((solution.lower_bound_multipliers[1] - 2.0).abs() < 1e-10);
        assert!((solution.upper_bound_multipliers[2] - 1.0).abs() < 1e-10);
        assert_eq!(solution.lower_bound_multipliers[0], 0.0);
        assert_eq!(solution.upper_bound_multipliers[0], 0.0);
    }

    #[test]
    fn test_solve_is_idempotent() {
        let mut solver = box_problem_solver();

        let first = solver.solve().unwrap();
        let second = solver.solve().unwrap();

        assert_eq!(first, second);
        for (a, b) in first.x.iter().zip(second.x.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_warm_start_reaches_cold_solution() {
        let lower = vector(&[-1.0, -1.0]);
        let upper = vector(&[1.0, 1.0]);
        let target_cost = vector(&[-4.0, -4.0]);

        let mut cold = SimpleActiveSetQpSolver::new();
        cold.set_quadratic_cost_function(&DMatrix::identity(2, 2), &target_cost, 0.0)
            .unwrap();
        cold.set_lower_bounds(&lower).unwrap();
        cold.set_upper_bounds(&upper).unwrap();
        let cold_solution = cold.solve().unwrap();

        let mut warm = SimpleActiveSetQpSolver::new();
        warm.set_use_warm_start(true);
        warm.set_quadratic_cost_function(&DMatrix::identity(2, 2), &vector(&[-4.0, 4.0]), 0.0)
            .unwrap();
        warm.set_lower_bounds(&lower).unwrap();
        warm.set_upper_bounds(&upper).unwrap();
        let unrelated = warm.solve().unwrap();
        assert!((unrelated.x[1] + 1.0).abs() < 1e-10);
        assert_eq!(warm.active_set().lower_bound_indices(), &[1]);

        warm.set_quadratic_cost_function(&DMatrix::identity(2, 2), &target_cost, 0.0)
            .unwrap();
        let warm_solution = warm.solve().unwrap();

        assert_eq!(warm_solution.status, QpStatus::Optimal);
        for i in 0..2 {
            assert!((warm_solution.x[i] - cold_solution.x[i]).abs() < 1e-10);
        }
        assert!(warm.active_set().lower_bound_indices().is_empty());
    }

    #[test]
    fn test_warm_start_is_dropped_when_shape_changes() {
        let mut solver = box_problem_solver();
        solver.set_use_warm_start(true);
        solver.solve().unwrap();
        assert_eq!(solver.active_set().len(), 2);

        solver.clear();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(3, 3), &DVector::zeros(3), 0.0)
            .unwrap();
        solver.set_upper_bounds(&vector(&[1.0, 1.0, 1.0])).unwrap();
        let solution = solver.solve().unwrap();

        assert_eq!(solution.x, vec![0.0, 0.0, 0.0]);
        assert!(solver.active_set().is_empty());
    }

    fn assert_matches_cold(warm: &QpSolution, solver: &mut SimpleActiveSetQpSolver) {
        solver.reset_active_constraints();
        let cold_solution = solver.solve().unwrap();

        assert_eq!(warm.status, QpStatus::Optimal);
        assert_eq!(cold_solution.status, QpStatus::Optimal);
        for i in 0..warm.x.len() {
            assert!(
                (warm.x[i] - cold_solution.x[i]).abs() < 1e-12,
                "warm {:?} vs cold {:?}",
                warm.x,
                cold_solution.x
            );
        }
    }

    #[test]
    fn test_warm_start_after_bound_is_relaxed_to_infinity() {
        let mut solver = box_problem_solver();
        solver.set_use_warm_start(true);
        solver.solve().unwrap();
        assert_eq!(solver.active_set().upper_bound_indices(), &[0, 1]);

        solver.set_upper_bounds(&vector(&[1.0, f64::INFINITY])).unwrap();
        let solution = solver.solve().unwrap();

        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.x[0] - 1.0).abs() < 1e-12);
        assert!((solution.x[1] - 4.0).abs() < 1e-12);
        assert_eq!(solution.upper_bound_multipliers[1], 0.0);
        assert_eq!(solver.active_set().upper_bound_indices(), &[0]);
        assert_matches_cold(&solution, &mut solver);
    }

    #[test]
    fn test_warm_start_after_bound_values_move() {
        let mut solver = box_problem_solver();
        solver.set_use_warm_start(true);
        solver.solve().unwrap();

        solver.set_upper_bounds(&vector(&[2.0, 0.5])).unwrap();
        let solution = solver.solve().unwrap();

        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.x[0] - 2.0).abs() < 1e-12);
        assert!((solution.x[1] - 0.5).abs() < 1e-12);
        assert!((solution.upper_bound_multipliers[0] - 2.0).abs() < 1e-12);
        assert!((solution.upper_bound_multipliers[1] - 3.5).abs() < 1e-12);
        assert_matches_cold(&solution, &mut solver);
    }

    #[test]
    fn test_warm_start_from_dependent_seed_restarts_cold() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver.set_use_warm_start(true);
        solver
            .set_quadratic_cost_function(&DMatrix::identity(2, 2), &vector(&[-4.0, -4.0]), 0.0)
            .unwrap();
        solver
            .set_linear_inequality_constraints(&DMatrix::from_row_slice(1, 2, &[1.0, 1.0]), &vector(&[1.0]))
            .unwrap();
        solver.set_upper_bounds(&vector(&[0.25, f64::INFINITY])).unwrap();

        let first = solver.solve().unwrap();
        assert_eq!(first.status, QpStatus::Optimal);
        assert!((first.x[0] - 0.25).abs() < 1e-12);
        assert!((first.x[1] - 0.75).abs() < 1e-12);
        assert!((first.inequality_multipliers[0] - 3.25).abs() < 1e-12);
        assert!((first.upper_bound_multipliers[0] - 0.5).abs() < 1e-12);
        assert_eq!(solver.active_set().inequality_indices(), &[0]);
        assert_eq!(solver.active_set().upper_bound_indices(), &[0]);

        // The carried rows are now both x_0 = const, so the seed is rank deficient
        solver
            .set_linear_inequality_constraints(&DMatrix::from_row_slice(1, 2, &[1.0, 0.0]), &vector(&[3.9]))
            .unwrap();
        solver.set_upper_bounds(&vector(&[1.0, f64::INFINITY])).unwrap();
        let second = solver.solve().unwrap();

        assert_eq!(second.status, QpStatus::Optimal);
        assert!((second.x[0] - 1.0).abs() < 1e-12);
        assert!((second.x[1] - 4.0).abs() < 1e-12);
        assert!(solver.active_set().inequality_indices().is_empty());
        assert_eq!(solver.active_set().upper_bound_indices(), &[0]);
        assert_matches_cold(&second, &mut solver);
    }

    #[test]
    fn test_reset_active_constraints() {
        let mut solver = box_problem_solver();
        solver.set_use_warm_start(true);
        solver.solve().unwrap();
        assert!(!solver.active_set().is_empty());

        solver.reset_active_constraints();
        assert!(solver.active_set().is_empty());
    }

    #[test]
    fn test_lower_bound_above_upper_bound() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(1, 1), &DVector::zeros(1), 0.0)
            .unwrap();
        solver.set_lower_bounds(&vector(&[1.0])).unwrap();
        solver.set_upper_bounds(&vector(&[0.0])).unwrap();

        assert!(matches!(solver.solve(), Err(QpError::IllSpecifiedProblem(_))));
    }

    #[test]
    fn test_singular_cost_is_rejected() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]), &DVector::zeros(2), 0.0)
            .unwrap();

        assert!(matches!(solver.solve(), Err(QpError::IllSpecifiedProblem(_))));
    }

    #[test]
    fn test_indefinite_cost_is_rejected() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::from_diagonal(&vector(&[1.0, -1.0])), &DVector::zeros(2), 0.0)
            .unwrap();

        match solver.solve() {
            Err(QpError::IllSpecifiedProblem(message)) => assert!(message.contains("indefinite"), "{}", message),
            other => panic!("expected IllSpecifiedProblem, got {:?}", other),
        }

        solver
            .set_quadratic_cost_function(&DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]), &DVector::zeros(2), 0.0)
            .unwrap();
        match solver.solve() {
            Err(QpError::IllSpecifiedProblem(message)) => assert!(message.contains("singular"), "{}", message),
            other => panic!("expected IllSpecifiedProblem, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_cost_is_rejected() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(2, 2), &vector(&[f64::NAN, 0.0]), 0.0)
            .unwrap();

        assert!(matches!(solver.solve(), Err(QpError::IllSpecifiedProblem(_))));
    }

    #[test]
    fn test_iteration_cap_returns_nan() {
        let mut solver = box_problem_solver();
        solver.set_max_number_of_iterations(1).unwrap();

        let solution = solver.solve().unwrap();

        assert_eq!(solution.status, QpStatus::MaxIterations);
        assert_eq!(solution.iterations, 1);
        assert!(solution.x.iter().all(|v| v.is_nan()));
        assert!(!solution.is_converged());
    }

    #[test]
    fn test_dependent_active_rows_signal_singular_set() {
        // Two copies of the same violated row become active together
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(2, 2), &vector(&[-4.0, -4.0]), 0.0)
            .unwrap();
        solver
            .set_linear_inequality_constraints(
                &DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]),
                &vector(&[1.0, 1.0]),
            )
            .unwrap();

        let solution = solver.solve().unwrap();

        assert_eq!(solution.status, QpStatus::SingularActiveSet);
        assert!(solution.x.iter().all(|v| v.is_nan()));
        assert!(solver.active_set().is_empty());
    }

    #[test]
    fn test_setter_dimension_errors() {
        let mut solver = SimpleActiveSetQpSolver::new();

        let not_square = DMatrix::zeros(2, 3);
        assert!(matches!(
            solver.set_quadratic_cost_function(&not_square, &DVector::zeros(2), 0.0),
            Err(QpError::DimensionMismatch(_))
        ));
        assert!(matches!(
            solver.set_quadratic_cost_function(&DMatrix::identity(2, 2), &DVector::zeros(3), 0.0),
            Err(QpError::DimensionMismatch(_))
        ));

        solver
            .set_quadratic_cost_function(&DMatrix::identity(2, 2), &DVector::zeros(2), 0.0)
            .unwrap();

        assert!(matches!(
            solver.set_linear_equality_constraints(&DMatrix::zeros(1, 3), &DVector::zeros(1)),
            Err(QpError::DimensionMismatch(_))
        ));
        assert!(matches!(
            solver.set_linear_equality_constraints(&DMatrix::zeros(2, 2), &DVector::zeros(1)),
            Err(QpError::DimensionMismatch(_))
        ));
        assert!(matches!(
            solver.set_linear_inequality_constraints(&DMatrix::zeros(1, 1), &DVector::zeros(1)),
            Err(QpError::DimensionMismatch(_))
        ));
        assert!(matches!(
            solver.set_lower_bounds(&DVector::zeros(3)),
            Err(QpError::DimensionMismatch(_))
        ));
        assert!(matches!(
            solver.set_upper_bounds(&DVector::zeros(1)),
            Err(QpError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_stale_constraints_after_resize() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&DMatrix::identity(2, 2), &DVector::zeros(2), 0.0)
            .unwrap();
        solver
            .set_linear_equality_constraints(&DMatrix::from_row_slice(1, 2, &[1.0, 1.0]), &vector(&[2.0]))
            .unwrap();

        solver
            .set_quadratic_cost_function(&DMatrix::identity(3, 3), &DVector::zeros(3), 0.0)
            .unwrap();

        assert!(matches!(solver.solve(), Err(QpError::DimensionMismatch(_))));
    }

    #[test]
    fn test_clear_leaves_empty_problem() {
        let mut solver = box_problem_solver();
        solver.clear();

        assert_eq!(solver.num_vars(), 0);
        assert_eq!(solver.dimensions(), wbqp_types::ProblemDimensions::default());

        let solution = solver.solve().unwrap();
        assert!(solution.x.is_empty());
        assert_eq!(solution.status, QpStatus::Optimal);
    }

    #[test]
    fn test_solve_into_reuses_buffers() {
        let mut solver = box_problem_solver();
        let mut solution = QpSolution::new();

        solver.solve_into(&mut solution).unwrap();
        let x_buffer = solution.x.as_ptr();
        let multiplier_buffer = solution.upper_bound_multipliers.as_ptr();

        solver.solve_into(&mut solution).unwrap();

        assert_eq!(solution.x.as_ptr(), x_buffer);
        assert_eq!(solution.upper_bound_multipliers.as_ptr(), multiplier_buffer);
        assert!((solution.x[0] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_objective_cost() {
        let mut solver = SimpleActiveSetQpSolver::new();
        solver
            .set_quadratic_cost_function(&(DMatrix::identity(2, 2) * 2.0), &vector(&[1.0, -1.0]), 3.0)
            .unwrap();

        // 0.5 * (2 + 8) + (1 - 2) + 3
        let value = solver.objective_cost(&vector(&[1.0, 2.0])).unwrap();
        assert!((value - 7.0).abs() < 1e-12);

        assert!(matches!(
            solver.objective_cost(&vector(&[1.0])),
            Err(QpError::DimensionMismatch(_))
        ));

        let solution = solver.solve().unwrap();
        let at_solution = solver.objective_cost(&DVector::from_vec(solution.x.clone())).unwrap();
        assert_eq!(solution.objective, at_solution);
    }

    #[test]
    fn test_params_configuration() {
        let params = SolverParams {
            max_number_of_iterations: 25,
            use_warm_start: true,
            ..SolverParams::default()
        };
        let solver = SimpleActiveSetQpSolver::with_params(params.clone()).unwrap();
        assert_eq!(solver.params(), &params);

        let invalid = SolverParams {
            max_number_of_iterations: 0,
            ..SolverParams::default()
        };
        assert!(matches!(
            SimpleActiveSetQpSolver::with_params(invalid),
            Err(QpError::ConfigError(_))
        ));
    }

    #[test]
    fn test_violation_fractions() {
        let mut solver = SimpleActiveSetQpSolver::new();

        solver.set_violation_fractions(1.0, 1.0).unwrap();
        assert_eq!(solver.params().violation_fraction_to_add, 1.0);

        assert!(matches!(
            solver.set_violation_fractions(0.0, 0.5),
            Err(QpError::ConfigError(_))
        ));
        assert_eq!(solver.params().violation_fraction_to_add, 1.0);
        assert_eq!(solver.params().violation_fraction_to_remove, 1.0);
    }

    #[test]
    fn test_numeric_setters_reject_invalid_values() {
        let mut solver = SimpleActiveSetQpSolver::new();
        let defaults = solver.params().clone();

        assert!(matches!(solver.set_convergence_threshold(-1e-6), Err(QpError::ConfigError(_))));
        assert!(matches!(
            solver.set_convergence_threshold_for_lagrange_multipliers(f64::NAN),
            Err(QpError::ConfigError(_))
        ));
        assert!(matches!(solver.set_max_number_of_iterations(0), Err(QpError::ConfigError(_))));
        assert_eq!(solver.params(), &defaults);

        solver.set_convergence_threshold(1e-8).unwrap();
        solver.set_convergence_threshold_for_lagrange_multipliers(0.0).unwrap();
        solver.set_max_number_of_iterations(3).unwrap();
        assert_eq!(solver.params().convergence_threshold, 1e-8);
        assert_eq!(solver.params().convergence_threshold_for_lagrange_multipliers, 0.0);
        assert_eq!(solver.params().max_number_of_iterations, 3);
    }

    #[test]
    fn test_backends_agree_through_trait() {
        let problem = QpProblem::new(DMatrix::identity(2, 2), vector(&[-4.0, -4.0]), 0.0)
            .with_upper_bounds(vector(&[1.0, 1.0]));

        let mut backends: Vec<Box<dyn QpSolverBackend>> = vec![
            Box::new(SimpleActiveSetQpSolver::new()),
            Box::new(ClarabelQpSolver::new()),
        ];

        for backend in backends.iter_mut() {
            let solution = backend.solve_qp(&problem).unwrap();
            assert_eq!(solution.status, QpStatus::Optimal);
            assert!((solution.x[0] - 1.0).abs() < 1e-6);
            assert!((solution.x[1] - 1.0).abs() < 1e-6);
            assert!((solution.objective - problem.objective(&vector(&[1.0, 1.0]))).abs() < 1e-5);
        }
    }

    #[test]
    fn test_zero_row_constraints_with_other_width() {
        let problem = QpProblem::new(DMatrix::identity(2, 2), vector(&[-4.0, -4.0]), 0.0)
            .with_equality_constraints(DMatrix::zeros(0, 5), DVector::zeros(0))
            .with_upper_bounds(vector(&[1.0, 1.0]));
        problem.validate().unwrap();

        let mut backends: Vec<Box<dyn QpSolverBackend>> = vec![
            Box::new(SimpleActiveSetQpSolver::new()),
            Box::new(ClarabelQpSolver::new()),
        ];
        for backend in backends.iter_mut() {
            let solution = backend.solve_qp(&problem).unwrap();
            assert_eq!(solution.status, QpStatus::Optimal);
            assert!(solution.equality_multipliers.is_empty());
            assert!((solution.x[0] - 1.0).abs() < 1e-6);
            assert!((solution.x[1] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_problem_clears_bounds() {
        let mut solver = box_problem_solver();

        let unbounded = QpProblem::new(DMatrix::identity(2, 2), vector(&[-4.0, -4.0]), 0.0);
        solver.load_problem(&unbounded).unwrap();
        let solution = solver.solve().unwrap();

        assert_eq!(solver.dimensions().upper_bounds, 0);
        assert!((solution.x[0] - 4.0).abs() < 1e-10);
        assert!(solution.upper_bound_multipliers.is_empty());
    }

    proptest! {
        #[test]
        fn prop_diagonal_box_problem_is_clipped(
            n in 1usize..7,
            diagonal in proptest::collection::vec(0.5f64..5.0, 6),
            linear in proptest::collection::vec(-10.0f64..10.0, 6),
            half_width in proptest::collection::vec(0.1f64..3.0, 6),
        ) {
            let q_matrix = DMatrix::from_diagonal(&DVector::from_vec(diagonal[..n].to_vec()));
            let q = DVector::from_vec(linear[..n].to_vec());
            let ub = DVector::from_vec(half_width[..n].to_vec());
            let lb = -ub.clone();

            let mut solver = SimpleActiveSetQpSolver::new();
            solver.set_max_number_of_iterations(20).unwrap();
            solver.set_quadratic_cost_function(&q_matrix, &q, 0.0).unwrap();
            solver.set_lower_bounds(&lb).unwrap();
            solver.set_upper_bounds(&ub).unwrap();
            let solution = solver.solve().unwrap();

            prop_assert_eq!(solution.status, QpStatus::Optimal);
            for i in 0..n {
                let expected = (-q[i] / q_matrix[(i, i)]).clamp(lb[i], ub[i]);
                prop_assert!((solution.x[i] - expected).abs() < 1e-9);
                prop_assert!(solution.lower_bound_multipliers[i] >= -1e-10);
                prop_assert!(solution.upper_bound_multipliers[i] >= -1e-10);
            }
        }
    }
}

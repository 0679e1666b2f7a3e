//! Adapter to the external NLP solver
//!
//! The NLP is solved by an augmented Lagrangian (method of multipliers) outer
//! loop around `optimization_engine`'s PANOC. Each outer iteration minimises
//!
//! ```text
//! L(u) = J(u) + y^T r(u) + c/2 |r(u)|^2,    r(u) = g(u) - g_lo
//! ```
//!
//! over the variable box, then updates the multipliers `y` and, if the
//! violation did not shrink enough, the penalty `c`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, log, trace, Level};
use optimization_engine::{
    constraints::Rectangle,
    core::ExitStatus,
    panoc::{PANOCCache, PANOCOptimizer},
    Optimizer,
    Problem,
    SolverError
};
use serde::Serialize;
use std::time::{Duration, Instant};

// Internal
use super::{Nlp, SolverParams, VarLayout};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Bound on the magnitude of each Lagrange multiplier.
const MULTIPLIER_BOUND: f64 = 1.0e12;

/// Largest penalty the outer loop will grow to.
const MAX_PENALTY: f64 = 1.0e9;

/// The penalty is kept if the violation shrinks at least by this factor.
const SUFFICIENT_DECREASE: f64 = 0.1;

/// Factor applied to the inner tolerance after each outer iteration.
const INNER_TOL_UPDATE: f64 = 0.1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Invokes the external solver on a posed NLP.
#[derive(Debug, Clone)]
pub struct SolverAdapter {
    params: SolverParams
}

/// The result of a solve.
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,

    /// The variable vector at termination, whatever the status.
    pub vars: Vec<f64>,

    /// Layout of `vars`
    pub layout: VarLayout,

    /// Cost at `vars`
    pub cost: f64,

    /// Largest absolute equality constraint violation at `vars`
    pub max_violation: f64,

    pub outer_iterations: usize,
    pub inner_iterations: usize,
    pub solve_time: Duration
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Termination status of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    /// Converged to the requested tolerances
    Success,

    /// Iteration limit reached
    MaxIterations,

    /// Wall-clock budget exhausted
    TimeExceeded,

    /// A non-finite value was produced
    NumericalFailure
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SolverAdapter {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    /// Solve the NLP starting from its initial guess.
    ///
    /// The solver is not retried, a non-success status is returned along with
    /// the last iterate for the caller to act on. The budget is checked
    /// before every inner solve, so an exhausted budget returns the current
    /// iterate without calling into the solver.
    pub fn solve(&self, nlp: &Nlp) -> Solution {
        let p = &self.params;
        let layout = nlp.layout;
        let n = layout.num_vars();
        let n1 = layout.num_constraints();
        let budget = p.max_duration();
        let start = Instant::now();

        let bounds = Rectangle::new(
            Some(&nlp.var_lower[..]),
            Some(&nlp.var_upper[..])
        );
        let mut panoc_cache = PANOCCache::new(n, p.epsilon_tol, p.lbfgs_memory);

        let mut u = nlp.initial_guess.clone();
        let mut y = vec![0.0; n1];
        let mut res = vec![0.0; n1];
        let mut penalty = p.initial_penalty;
        let mut inner_tol = p.initial_inner_tol;

        nlp.constraint_residual(&u, &mut res);
        let mut prev_violation = max_abs(&res);

        let mut status = SolveStatus::MaxIterations;
        let mut outer_iterations = 0;
        let mut inner_iterations = 0;

        for _ in 0..p.max_outer_iterations {
            let elapsed = start.elapsed();
            if elapsed >= budget {
                status = SolveStatus::TimeExceeded;
                break
            }
            outer_iterations += 1;

            let inner = self.solve_inner(
                nlp,
                &bounds,
                &mut panoc_cache,
                &mut u,
                &y,
                penalty,
                inner_tol,
                budget - elapsed
            );

            let inner = match inner {
                Ok(s) => s,
                Err(e) => {
                    debug!("Inner solver returned an error: {:?}", e);
                    status = SolveStatus::NumericalFailure;
                    break
                }
            };
            inner_iterations += inner.iterations();

            nlp.constraint_residual(&u, &mut res);
            let violation = max_abs(&res);

            trace!(
                "Outer iteration {}: {:?} after {} inner, violation {:.3e}, penalty {:.1e}",
                outer_iterations,
                inner.exit_status(),
                inner.iterations(),
                violation,
                penalty
            );

            match inner.exit_status() {
                ExitStatus::NotConvergedOutOfTime => {
                    status = SolveStatus::TimeExceeded;
                    break
                },
                ExitStatus::Converged
                    if violation <= p.delta_tol && inner_tol <= p.epsilon_tol =>
                {
                    status = SolveStatus::Success;
                    break
                },
                _ => ()
            }

            // ---- OUTER UPDATE ----

            for (yi, ri) in y.iter_mut().zip(res.iter()) {
                *yi = (*yi + penalty * ri).max(-MULTIPLIER_BOUND).min(MULTIPLIER_BOUND);
            }
            if violation > SUFFICIENT_DECREASE * prev_violation {
                penalty = (penalty * p.penalty_update_factor).min(MAX_PENALTY);
            }
            prev_violation = violation;
            inner_tol = (inner_tol * INNER_TOL_UPDATE).max(p.epsilon_tol);
        }

        let solve_time = start.elapsed();
        let cost = nlp.eval.cost(&u);
        let max_violation = nlp.max_violation(&u);

        if !cost.is_finite() || u.iter().any(|x| !x.is_finite()) {
            status = SolveStatus::NumericalFailure;
        }

        let level = if p.verbose { Level::Info } else { Level::Debug };
        log!(
            level,
            "Solve {:?} in {:.3} ms: cost {:.4}, max violation {:.3e}, {} outer / {} inner iterations",
            status,
            solve_time.as_secs_f64() * 1e3,
            cost,
            max_violation,
            outer_iterations,
            inner_iterations
        );

        if p.verbose && status != SolveStatus::Success {
            info!(
                "    Solver budget {:?}, final penalty {:.1e}, sparse Jacobian: {}",
                budget, penalty, p.sparse_jacobian
            );
        }

        Solution {
            status,
            vars: u,
            layout,
            cost,
            max_violation,
            outer_iterations,
            inner_iterations,
            solve_time
        }
    }

    /// Minimise the augmented Lagrangian for fixed multipliers and penalty,
    /// warm started from `u`.
    #[allow(clippy::too_many_arguments)]
    fn solve_inner(
        &self,
        nlp: &Nlp,
        bounds: &Rectangle,
        cache: &mut PANOCCache,
        u: &mut [f64],
        y: &[f64],
        penalty: f64,
        tolerance: f64,
        remaining: Duration
    ) -> Result<optimization_engine::core::SolverStatus, SolverError> {
        let eval = &nlp.eval;
        let n1 = nlp.layout.num_constraints();
        let sparse = self.params.sparse_jacobian;

        let cost = |u: &[f64], c: &mut f64| -> Result<(), SolverError> {
            let mut r = vec![0.0; n1];
            nlp.constraint_residual(u, &mut r);

            *c = eval.cost(u)
                + r.iter()
                    .zip(y.iter())
                    .map(|(ri, yi)| yi * ri + 0.5 * penalty * ri * ri)
                    .sum::<f64>();
            Ok(())
        };

        let grad = |u: &[f64], g: &mut [f64]| -> Result<(), SolverError> {
            // Multiplier estimate y + c r weights the constraint gradients
            let mut d = vec![0.0; n1];
            nlp.constraint_residual(u, &mut d);
            for (di, yi) in d.iter_mut().zip(y.iter()) {
                *di = yi + penalty * *di;
            }

            let mut jtd = vec![0.0; g.len()];
            if sparse {
                eval.jac_trans_sparse(u, &d, &mut jtd)
            }
            else {
                eval.jac_trans_dense(u, &d, &mut jtd)
            }

            eval.cost_gradient(u, g);
            for (gi, ji) in g.iter_mut().zip(jtd.iter()) {
                *gi += ji;
            }
            Ok(())
        };

        let problem = Problem::new(bounds, grad, cost);
        let mut panoc = PANOCOptimizer::new(problem, cache)
            .with_tolerance(tolerance)
            .with_max_iter(self.params.max_inner_iterations)
            .with_max_duration(remaining);

        panoc.solve(u)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

//! Construction and evaluation of the horizon NLP
//!
//! The problem is:
//!
//! ```text
//! minimise    J(z)
//! subject to  z_lo <= z <= z_hi
//!             g(z) = g_lo
//! ```
//!
//! where `z` is laid out by `VarLayout`, `J` is the tracking and actuation
//! cost and `g` holds the anchor pins and the dynamics defects.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use num_dual::{Dual64, DualNum};

// Internal
use super::{
    ActuatorVar, BicycleModel, CostWeights, Params, ReferencePath, StateVar,
    VarLayout, VehicleState, NUM_ACTUATORS, NUM_STATES, UNBOUNDED
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of variables a single dynamics step depends on.
pub const STEP_VARS: usize = 2 * NUM_STATES + NUM_ACTUATORS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Builds a fresh NLP each cycle from the immutable controller parameters.
#[derive(Debug, Clone, Copy)]
pub struct ProblemBuilder {
    layout: VarLayout,
    model: BicycleModel,
    weights: CostWeights,
    dt_s: f64,
    ref_speed: f64,
    max_steer_rad: f64,
    max_throttle: f64
}

/// A fully posed NLP, ready to hand to the solver.
#[derive(Debug, Clone)]
pub struct Nlp {
    pub layout: VarLayout,

    /// Starting point of the optimisation
    pub initial_guess: Vec<f64>,

    /// Variable lower bounds
    pub var_lower: Vec<f64>,

    /// Variable upper bounds
    pub var_upper: Vec<f64>,

    /// Constraint lower bounds
    pub cons_lower: Vec<f64>,

    /// Constraint upper bounds, equal to the lower bounds for every row
    pub cons_upper: Vec<f64>,

    pub eval: NlpEval
}

/// Evaluator for the cost and constraints of one cycle's NLP.
///
/// Holds only immutable per-cycle values. All expressions are generic over
/// `DualNum` so the same code provides values and derivatives.
#[derive(Debug, Clone, Copy)]
pub struct NlpEval {
    layout: VarLayout,
    path: ReferencePath,
    model: BicycleModel,
    weights: CostWeights,
    dt_s: f64,
    ref_speed: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProblemBuilder {
    pub fn new(params: &Params) -> Self {
        Self {
            layout: VarLayout::new(params.horizon),
            model: BicycleModel {
                lf_m: params.lf_m,
                steer_convention: params.steer_convention
            },
            weights: params.weights,
            dt_s: params.dt_s,
            ref_speed: params.ref_speed,
            max_steer_rad: params.max_steer_rad,
            max_throttle: params.max_throttle
        }
    }

    /// Pose the NLP for a horizon starting at `anchor` and tracking `path`.
    pub fn build(&self, anchor: &VehicleState, path: &ReferencePath) -> Nlp {
        let l = self.layout;
        let n = l.num_vars();
        let m = l.num_constraints();

        // ---- INITIAL GUESS ----

        let mut initial_guess = vec![0.0; n];
        l.set_state(&mut initial_guess, 0, anchor);

        // ---- VARIABLE BOUNDS ----

        let mut var_lower = vec![-UNBOUNDED; n];
        let mut var_upper = vec![UNBOUNDED; n];

        for t in 0..l.num_actuations() {
            let i = l.actuator(ActuatorVar::Steer, t);
            var_lower[i] = -self.max_steer_rad;
            var_upper[i] = self.max_steer_rad;

            let i = l.actuator(ActuatorVar::Throttle, t);
            var_lower[i] = -self.max_throttle;
            var_upper[i] = self.max_throttle;
        }

        // ---- CONSTRAINT BOUNDS ----

        // Dynamics defects must vanish, the first step is pinned to the anchor
        let mut cons_lower = vec![0.0; m];
        for (var, value) in StateVar::ALL.iter().zip(anchor.to_array().iter()) {
            cons_lower[l.constraint_row(*var, 0)] = *value;
        }
        let cons_upper = cons_lower.clone();

        Nlp {
            layout: l,
            initial_guess,
            var_lower,
            var_upper,
            cons_lower,
            cons_upper,
            eval: NlpEval {
                layout: l,
                path: *path,
                model: self.model,
                weights: self.weights,
                dt_s: self.dt_s,
                ref_speed: self.ref_speed
            }
        }
    }
}

impl Nlp {
    /// Equality constraint residual `g(u) - g_lo`, the quantity the solver
    /// drives to zero.
    pub fn constraint_residual(&self, u: &[f64], res: &mut [f64]) {
        self.eval.constraints(u, res);
        for (r, lo) in res.iter_mut().zip(self.cons_lower.iter()) {
            *r -= *lo;
        }
    }

    /// Largest absolute constraint violation at `u`.
    pub fn max_violation(&self, u: &[f64]) -> f64 {
        let mut res = vec![0.0; self.layout.num_constraints()];
        self.constraint_residual(u, &mut res);
        res.iter().fold(0.0, |m, r| m.max(r.abs()))
    }
}

impl NlpEval {

    // ---- GENERIC EXPRESSIONS ----

    /// The cost function.
    pub fn cost_generic<D: DualNum<f64> + Copy>(&self, vars: &[D]) -> D {
        let l = &self.layout;
        let w = &self.weights;
        let mut cost = D::from(0.0);

        // Tracking errors and speed
        for t in 0..l.horizon() {
            let cte = vars[l.state(StateVar::Cte, t)];
            let epsi = vars[l.state(StateVar::Epsi, t)];
            let dv = vars[l.state(StateVar::V, t)] - self.ref_speed;

            cost += sq(cte) * w.cte + sq(epsi) * w.epsi + sq(dv) * w.speed;
        }

        // Actuator use
        for t in 0..l.num_actuations() {
            let steer = vars[l.actuator(ActuatorVar::Steer, t)];
            let throttle = vars[l.actuator(ActuatorVar::Throttle, t)];

            cost += sq(steer) * w.steer + sq(throttle) * w.throttle;
        }

        // Actuator rates
        for t in 0..l.num_actuations().saturating_sub(1) {
            let d_steer = vars[l.actuator(ActuatorVar::Steer, t + 1)]
                - vars[l.actuator(ActuatorVar::Steer, t)];
            let d_throttle = vars[l.actuator(ActuatorVar::Throttle, t + 1)]
                - vars[l.actuator(ActuatorVar::Throttle, t)];

            cost += sq(d_steer) * w.steer_rate + sq(d_throttle) * w.throttle_rate;
        }

        cost
    }

    /// Dynamics defects of one step from the step's local variables, ordered
    /// as in `VarLayout::step_vars`.
    pub fn step_defects<D: DualNum<f64> + Copy>(
        &self,
        local: &[D; STEP_VARS]
    ) -> [D; NUM_STATES] {
        let mut prev = [local[0]; NUM_STATES];
        let mut next = [local[0]; NUM_STATES];
        prev.copy_from_slice(&local[0..NUM_STATES]);
        next.copy_from_slice(&local[NUM_STATES + NUM_ACTUATORS..]);

        let steer = local[NUM_STATES];
        let throttle = local[NUM_STATES + 1];

        let predicted = self.model.predict(
            &VehicleState::from_array(prev),
            steer,
            throttle,
            &self.path,
            self.dt_s
        ).to_array();

        let mut defects = next;
        for (d, p) in defects.iter_mut().zip(predicted.iter()) {
            *d = *d - *p;
        }
        defects
    }

    /// All constraint rows.
    pub fn constraints_generic<D: DualNum<f64> + Copy>(&self, vars: &[D], g: &mut [D]) {
        let l = &self.layout;

        // Anchor pins
        for var in StateVar::ALL.iter() {
            g[l.constraint_row(*var, 0)] = vars[l.state(*var, 0)];
        }

        // Dynamics
        for t in 1..l.horizon() {
            let local = l.step_vars(t).map(|i| vars[i]);
            let defects = self.step_defects(&local);

            for (var, d) in StateVar::ALL.iter().zip(defects.iter()) {
                g[l.constraint_row(*var, t)] = *d;
            }
        }
    }

    // ---- VALUES ----

    pub fn cost(&self, u: &[f64]) -> f64 {
        self.cost_generic(u)
    }

    pub fn constraints(&self, u: &[f64], g: &mut [f64]) {
        self.constraints_generic(u, g)
    }

    // ---- DERIVATIVES ----

    /// Gradient of the cost, seeding one variable at a time.
    pub fn cost_gradient(&self, u: &[f64], grad: &mut [f64]) {
        let mut duals: Vec<Dual64> = u.iter().map(|x| Dual64::from(*x)).collect();

        for (j, g) in grad.iter_mut().enumerate() {
            duals[j].eps = 1.0;
            *g = self.cost_generic(&duals).eps;
            duals[j].eps = 0.0;
        }
    }

    /// Constraint Jacobian transpose product `J(u)^T d`, evaluating every
    /// constraint row for every seeded variable.
    pub fn jac_trans_dense(&self, u: &[f64], d: &[f64], res: &mut [f64]) {
        let mut duals: Vec<Dual64> = u.iter().map(|x| Dual64::from(*x)).collect();
        let mut g = vec![Dual64::from(0.0); self.layout.num_constraints()];

        for (j, r) in res.iter_mut().enumerate() {
            duals[j].eps = 1.0;
            self.constraints_generic(&duals, &mut g);
            *r = g.iter().zip(d.iter()).map(|(gk, dk)| gk.eps * dk).sum();
            duals[j].eps = 0.0;
        }
    }

    /// Constraint Jacobian transpose product `J(u)^T d`, seeding only the
    /// variables each dynamics step depends on.
    pub fn jac_trans_sparse(&self, u: &[f64], d: &[f64], res: &mut [f64]) {
        let l = &self.layout;

        res.iter_mut().for_each(|r| *r = 0.0);

        // Anchor pins have unit derivative in their own variable
        for var in StateVar::ALL.iter() {
            res[l.state(*var, 0)] += d[l.constraint_row(*var, 0)];
        }

        for t in 1..l.horizon() {
            let idx = l.step_vars(t);
            let mut local = idx.map(|i| Dual64::from(u[i]));

            for k in 0..STEP_VARS {
                local[k].eps = 1.0;
                let defects = self.step_defects(&local);
                local[k].eps = 0.0;

                res[idx[k]] += StateVar::ALL
                    .iter()
                    .zip(defects.iter())
                    .map(|(var, dfc)| dfc.eps * d[l.constraint_row(*var, t)])
                    .sum::<f64>();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn sq<D: DualNum<f64> + Copy>(x: D) -> D {
    x * x
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn test_path() -> ReferencePath {
        ReferencePath::from_coeffs([0.8, -0.05, 0.002, -0.0001])
    }

    fn test_nlp() -> Nlp {
        let params = Params::default();
        let path = test_path();
        let anchor = VehicleState::anchor(25.0, &path);
        ProblemBuilder::new(&params).build(&anchor, &path)
    }

    /// A non-trivial point in the variable space.
    fn test_point(nlp: &Nlp) -> Vec<f64> {
        (0..nlp.layout.num_vars())
            .map(|i| 0.3 * ((i as f64) * 0.7).sin() + 0.01 * i as f64)
            .collect()
    }

    #[test]
    fn test_initial_guess_and_bounds() {
        let params = Params::default();
        let nlp = test_nlp();
        let l = nlp.layout;
        let anchor = VehicleState::anchor(25.0, &test_path());

        assert_eq!(nlp.initial_guess.len(), l.num_vars());
        assert_eq!(l.state_at(&nlp.initial_guess, 0), anchor);
        for t in 1..l.horizon() {
            assert_eq!(l.state_at(&nlp.initial_guess, t), VehicleState::default());
        }

        for t in 0..l.num_actuations() {
            let i = l.actuator(ActuatorVar::Steer, t);
            assert_eq!(nlp.var_lower[i], -params.max_steer_rad);
            assert_eq!(nlp.var_upper[i], params.max_steer_rad);
            let i = l.actuator(ActuatorVar::Throttle, t);
            assert_eq!(nlp.var_lower[i], -1.0);
            assert_eq!(nlp.var_upper[i], 1.0);
        }
        assert_eq!(nlp.var_upper[l.state(StateVar::X, 3)], UNBOUNDED);

        assert_eq!(nlp.cons_lower, nlp.cons_upper);
        assert_eq!(nlp.cons_lower[l.constraint_row(StateVar::V, 0)], 25.0);
        assert_eq!(nlp.cons_lower[l.constraint_row(StateVar::Cte, 0)], 0.8);
        assert_eq!(nlp.cons_lower[l.constraint_row(StateVar::V, 1)], 0.0);
    }

    #[test]
    fn test_cost_terms() {
        let nlp = test_nlp();
        let l = nlp.layout;
        let w = CostWeights::default();

        // All zero except one speed, one steer pair and one cte
        let mut u = vec![0.0; l.num_vars()];
        for t in 0..l.horizon() {
            u[l.state(StateVar::V, t)] = 70.0;
        }
        u[l.state(StateVar::Cte, 2)] = 0.5;
        u[l.actuator(ActuatorVar::Steer, 3)] = 0.1;

        let expected = w.cte * 0.25
            + w.steer * 0.01
            + 2.0 * w.steer_rate * 0.01;

        assert_relative_eq!(nlp.eval.cost(&u), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_constraints_zero_on_rollout() {
        let params = Params::default();
        let nlp = test_nlp();
        let l = nlp.layout;
        let model = BicycleModel {
            lf_m: params.lf_m,
            steer_convention: params.steer_convention
        };

        // Roll out arbitrary in-bound actuation from the anchor
        let mut u = nlp.initial_guess.clone();
        for t in 0..l.num_actuations() {
            u[l.actuator(ActuatorVar::Steer, t)] = 0.2 * (t as f64 * 0.5).sin();
            u[l.actuator(ActuatorVar::Throttle, t)] = 0.5 - 0.1 * t as f64;
        }
        for t in 1..l.horizon() {
            let prev = l.state_at(&u, t - 1);
            let next = model.predict(
                &prev,
                u[l.actuator(ActuatorVar::Steer, t - 1)],
                u[l.actuator(ActuatorVar::Throttle, t - 1)],
                &test_path(),
                params.dt_s
            );
            l.set_state(&mut u, t, &next);
        }

        assert!(nlp.max_violation(&u) < 1e-12);

        // Any perturbation of a later state shows up in its own row only
        u[l.state(StateVar::Psi, 4)] += 0.1;
        let mut res = vec![0.0; l.num_constraints()];
        nlp.constraint_residual(&u, &mut res);
        assert_relative_eq!(res[l.constraint_row(StateVar::Psi, 4)], 0.1, epsilon = 1e-12);
        assert!(res[l.constraint_row(StateVar::Psi, 5)].abs() > 0.0);
    }

    #[test]
    fn test_anchor_pins() {
        let nlp = test_nlp();
        let mut res = vec![0.0; nlp.layout.num_constraints()];

        nlp.constraint_residual(&nlp.initial_guess, &mut res);
        for var in StateVar::ALL.iter() {
            assert_eq!(res[nlp.layout.constraint_row(*var, 0)], 0.0);
        }
    }

    #[test]
    fn test_gradient_finite_difference() {
        let nlp = test_nlp();
        let u = test_point(&nlp);
        let mut grad = vec![0.0; u.len()];
        nlp.eval.cost_gradient(&u, &mut grad);

        let h = 1e-6;
        for j in 0..u.len() {
            let mut up = u.clone();
            let mut dn = u.clone();
            up[j] += h;
            dn[j] -= h;
            let fd = (nlp.eval.cost(&up) - nlp.eval.cost(&dn)) / (2.0 * h);

            assert_relative_eq!(grad[j], fd, epsilon = 1e-3, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_jacobian_dense_sparse_agree() {
        let nlp = test_nlp();
        let u = test_point(&nlp);
        let d: Vec<f64> = (0..nlp.layout.num_constraints())
            .map(|k| 1.0 - 0.05 * k as f64)
            .collect();

        let mut dense = vec![0.0; u.len()];
        let mut sparse = vec![1.0; u.len()];
        nlp.eval.jac_trans_dense(&u, &d, &mut dense);
        nlp.eval.jac_trans_sparse(&u, &d, &mut sparse);

        for (a, b) in dense.iter().zip(sparse.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_jacobian_finite_difference() {
        let nlp = test_nlp();
        let u = test_point(&nlp);
        let m = nlp.layout.num_constraints();
        let d: Vec<f64> = (0..m).map(|k| ((k as f64) * 0.3).cos()).collect();

        let mut jtd = vec![0.0; u.len()];
        nlp.eval.jac_trans_sparse(&u, &d, &mut jtd);

        let h = 1e-6;
        let mut g_up = vec![0.0; m];
        let mut g_dn = vec![0.0; m];
        for j in 0..u.len() {
            let mut up = u.clone();
            let mut dn = u.clone();
            up[j] += h;
            dn[j] -= h;
            nlp.eval.constraints(&up, &mut g_up);
            nlp.eval.constraints(&dn, &mut g_dn);

            let fd: f64 = (0..m).map(|k| (g_up[k] - g_dn[k]) / (2.0 * h) * d[k]).sum();
            assert_relative_eq!(jtd[j], fd, epsilon = 1e-5, max_relative = 1e-5);
        }
    }
}

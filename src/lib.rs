//! An implementation of the Spectral Projected Gradient (SPG) method for
//! minimization subject to box constraints.
//!
//! This crate minimizes a differentiable objective over a box
//! `lower <= x <= upper` following the nonmonotone spectral projected gradient
//! method of Birgin, Martínez & Raydan, "Nonmonotone spectral projected
//! gradient methods on convex sets", SIAM J. Optim. 10 (2000).
//!
//! # Features
//! - Barzilai-Borwein (spectral) step lengths, safeguarded into
//!   `[1e-10, 1e10]`.
//! - Nonmonotone Armijo line search against the largest of the last `m`
//!   accepted values, with safeguarded quadratic backtracking.
//! - Per-coordinate bounds, each side optional and possibly infinite.
//! - Convergence measured by the projected-gradient norm `‖P(x - g) - x‖₂`.
//! - Iteration and evaluation budgets reported as explicit termination
//!   statuses, never as errors.
//! - Preallocated [`SpgWorkspace`] for allocation-free repeated solves.
//!
//! ## Defaults
//! - `tolerance = 1e-5`, `max_iterations = 100`, `max_evaluations = 1000`,
//!   `memory = 10`, initial point projected, silent.
//!
//! # Example
//!
//! Minimize `x1² + (x2 - 2)²` with the second variable bounded below by 5.
//!
//! ```
//! use spgbox::{Spg, SpgStatus};
//! use ndarray::{array, Array1};
//!
//! let f = |x: &Array1<f64>| x[0].powi(2) + (x[1] - 2.0).powi(2);
//! let g = |x: &Array1<f64>, g: &mut Array1<f64>| {
//!     g[0] = 2.0 * x[0];
//!     g[1] = 2.0 * (x[1] - 2.0);
//! };
//!
//! let mut x = array![0.5, 0.5];
//! let solution = Spg::new(f, g)
//!     .with_lower_bounds(array![f64::NEG_INFINITY, 5.0])
//!     .run(&mut x)
//!     .expect("bounds match the problem size");
//!
//! assert_eq!(solution.status, SpgStatus::Converged);
//! assert!(x[0].abs() < 1e-6);
//! assert!((x[1] - 5.0).abs() < 1e-6);
//! assert!((solution.final_value - 9.0).abs() < 1e-6);
//! ```

pub mod bounds;
mod line_search;
pub mod workspace;

pub use bounds::BoxBounds;
pub use workspace::{DEFAULT_MEMORY, NonmonotoneHistory, SpgWorkspace};

use line_search::{
    LineSearchOutcome, curvature_pair, initial_spectral_step, nonmonotone_line_search,
    spectral_step,
};
use ndarray::Array1;
use std::fmt;

/// An objective function together with its gradient.
///
/// Implementations must not keep references to the vectors they are given.
/// A panic inside either method propagates out of the solve unchanged.
pub trait Objective {
    /// Value of the objective at `x`.
    fn value(&mut self, x: &Array1<f64>) -> f64;

    /// Writes the gradient at `x` into `grad` (same length as `x`).
    fn gradient(&mut self, x: &Array1<f64>, grad: &mut Array1<f64>);
}

impl<T: Objective + ?Sized> Objective for &mut T {
    fn value(&mut self, x: &Array1<f64>) -> f64 {
        (**self).value(x)
    }

    fn gradient(&mut self, x: &Array1<f64>, grad: &mut Array1<f64>) {
        (**self).gradient(x, grad)
    }
}

/// Adapts a pair of closures to [`Objective`].
pub struct FnObjective<F, G> {
    value: F,
    gradient: G,
}

impl<F, G> FnObjective<F, G>
where
    F: FnMut(&Array1<f64>) -> f64,
    G: FnMut(&Array1<f64>, &mut Array1<f64>),
{
    pub fn new(value: F, gradient: G) -> Self {
        Self { value, gradient }
    }
}

impl<F, G> Objective for FnObjective<F, G>
where
    F: FnMut(&Array1<f64>) -> f64,
    G: FnMut(&Array1<f64>, &mut Array1<f64>),
{
    fn value(&mut self, x: &Array1<f64>) -> f64 {
        (self.value)(x)
    }

    fn gradient(&mut self, x: &Array1<f64>, grad: &mut Array1<f64>) {
        (self.gradient)(x, grad)
    }
}

/// How much progress information is sent to the `log` facade.
///
/// Purely observational: results are identical at every level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    #[default]
    Silent,
    /// One `info` line per iteration plus a termination summary.
    Iterations,
    /// Additionally one `debug` line per line-search trial.
    LineSearch,
}

impl From<u8> for Verbosity {
    /// Maps the numeric levels 0, 1 and 2; larger values saturate.
    fn from(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Iterations,
            _ => Verbosity::LineSearch,
        }
    }
}

/// Solver options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpgConfig {
    /// Convergence threshold on the projected-gradient norm.
    pub tolerance: f64,
    /// Iteration budget.
    pub max_iterations: usize,
    /// Budget of objective evaluations, the initial one included.
    pub max_evaluations: usize,
    /// Number of accepted values the nonmonotone test looks back on.
    pub memory: usize,
    /// Project the starting point onto the box before iterating. Disable
    /// only when the start is known to be feasible.
    pub project_initial_point: bool,
    pub verbosity: Verbosity,
}

impl Default for SpgConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: 100,
            max_evaluations: 1000,
            memory: DEFAULT_MEMORY,
            project_initial_point: true,
            verbosity: Verbosity::Silent,
        }
    }
}

/// Configuration errors, detected before the objective is first evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpgError {
    #[error("Length of {what} is {found}, but the problem has {expected} variables.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Lower bound {lower} exceeds upper bound {upper} at index {index}.")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },
    #[error(
        "Workspace holds {found_vars} variables and {found_memory} history slots, but the solve needs {expected_vars} and {expected_memory}."
    )]
    WorkspaceMismatch {
        expected_vars: usize,
        expected_memory: usize,
        found_vars: usize,
        found_memory: usize,
    },
    #[error("Invalid option `{name}`: {reason}.")]
    InvalidOption {
        name: &'static str,
        reason: &'static str,
    },
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpgStatus {
    /// The projected-gradient norm dropped to the tolerance.
    Converged,
    MaxIterations,
    MaxEvaluations,
}

impl SpgStatus {
    /// Numeric exit code: 0 converged, 1 iteration budget, 2 evaluation budget.
    pub fn code(self) -> u8 {
        match self {
            SpgStatus::Converged => 0,
            SpgStatus::MaxIterations => 1,
            SpgStatus::MaxEvaluations => 2,
        }
    }
}

impl fmt::Display for SpgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            SpgStatus::Converged => "Convergence achieved.",
            SpgStatus::MaxIterations => "Maximum number of iterations achieved.",
            SpgStatus::MaxEvaluations => "Maximum number of function evaluations achieved.",
        };
        f.write_str(message)
    }
}

/// Snapshot of a finished solve.
///
/// On any status other than [`SpgStatus::Converged`] this is the last
/// accepted iterate, which is not a stationary point.
#[derive(Debug, Clone, PartialEq)]
pub struct SpgSolution {
    /// Best point found.
    pub final_point: Array1<f64>,
    /// Objective value at `final_point`.
    pub final_value: f64,
    /// `‖P(x - g) - x‖₂` at `final_point`.
    pub projected_gradient_norm: f64,
    pub iterations: usize,
    /// Objective evaluations, the initial one included.
    pub func_evals: usize,
    /// Gradient evaluations: one at the start and one per iteration.
    pub grad_evals: usize,
    pub status: SpgStatus,
}

impl SpgSolution {
    pub fn converged(&self) -> bool {
        self.status == SpgStatus::Converged
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub(crate) iterations: usize,
    pub(crate) func_evals: usize,
    pub(crate) grad_evals: usize,
}

/// Configuration and bounds shared by the driver and the line search.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpgCore {
    pub(crate) config: SpgConfig,
    pub(crate) bounds: Option<BoxBounds>,
}

/// A configurable SPG solver.
pub struct Spg<O> {
    core: SpgCore,
    objective: O,
}

impl SpgCore {
    pub(crate) fn project_in_place(&self, x: &mut Array1<f64>) {
        if let Some(bounds) = &self.bounds {
            bounds.project_in_place(x);
        }
    }

    pub(crate) fn projected_gradient_norm(&self, x: &Array1<f64>, g: &Array1<f64>) -> f64 {
        if let Some(bounds) = &self.bounds {
            bounds.projected_gradient_norm(x, g)
        } else {
            g.dot(g).sqrt()
        }
    }

    fn check(&self, n: usize, ws: &SpgWorkspace) -> Result<(), SpgError> {
        let cfg = &self.config;
        if !(cfg.tolerance >= 0.0) {
            return Err(SpgError::InvalidOption {
                name: "tolerance",
                reason: "must be a nonnegative number",
            });
        }
        if cfg.memory == 0 {
            return Err(SpgError::InvalidOption {
                name: "memory",
                reason: "at least one accepted value must be remembered",
            });
        }
        if cfg.max_evaluations == 0 {
            return Err(SpgError::InvalidOption {
                name: "max_evaluations",
                reason: "the starting point needs one evaluation",
            });
        }
        if let Some(bounds) = &self.bounds {
            bounds.validate()?;
            if bounds.len() != n {
                return Err(SpgError::DimensionMismatch {
                    what: "bounds",
                    expected: n,
                    found: bounds.len(),
                });
            }
        }
        if ws.num_vars() != n || ws.memory() != cfg.memory {
            return Err(SpgError::WorkspaceMismatch {
                expected_vars: n,
                expected_memory: cfg.memory,
                found_vars: ws.num_vars(),
                found_memory: ws.memory(),
            });
        }
        Ok(())
    }

    fn run<O>(
        &self,
        objective: &mut O,
        x: &mut Array1<f64>,
        ws: &mut SpgWorkspace,
    ) -> Result<SpgSolution, SpgError>
    where
        O: Objective + ?Sized,
    {
        self.check(x.len(), ws)?;
        let cfg = &self.config;
        let mut counters = Counters::default();

        if cfg.project_initial_point {
            self.project_in_place(x);
        }
        let mut f_k = objective.value(x);
        counters.func_evals += 1;
        objective.gradient(x, &mut ws.g);
        counters.grad_evals += 1;
        ws.history.reset(f_k);
        let mut pg_norm = self.projected_gradient_norm(x, &ws.g);
        let mut lambda = initial_spectral_step(pg_norm);

        let status = loop {
            if cfg.verbosity >= Verbosity::Iterations {
                log::info!(
                    "[SPG] iter {:>5}: f = {:.6e}, ||pg|| = {:.3e}, λ = {:.3e}, fe = {}",
                    counters.iterations,
                    f_k,
                    pg_norm,
                    lambda,
                    counters.func_evals
                );
            }
            if pg_norm <= cfg.tolerance {
                break SpgStatus::Converged;
            }
            if counters.iterations >= cfg.max_iterations {
                break SpgStatus::MaxIterations;
            }
            if counters.func_evals >= cfg.max_evaluations {
                break SpgStatus::MaxEvaluations;
            }

            match nonmonotone_line_search(self, objective, x, f_k, lambda, ws, &mut counters) {
                LineSearchOutcome::BudgetExhausted { trials } => {
                    if cfg.verbosity >= Verbosity::LineSearch {
                        log::debug!("[SPG] No step accepted in {} trials.", trials);
                    }
                    break SpgStatus::MaxEvaluations;
                }
                LineSearchOutcome::Accepted {
                    value,
                    alpha,
                    trials,
                } => {
                    if cfg.verbosity >= Verbosity::LineSearch {
                        log::debug!("[SPG] Accepted α = {:.3e} after {} trials.", alpha, trials);
                    }
                    objective.gradient(&ws.xn, &mut ws.gn);
                    counters.grad_evals += 1;
                    let (sts, sty) = curvature_pair(x, &ws.xn, &ws.g, &ws.gn);
                    lambda = spectral_step(sts, sty);

                    x.assign(&ws.xn);
                    std::mem::swap(&mut ws.g, &mut ws.gn);
                    f_k = value;
                    ws.history.push(f_k);
                    pg_norm = self.projected_gradient_norm(x, &ws.g);
                    counters.iterations += 1;
                }
            }
        };

        if cfg.verbosity >= Verbosity::Iterations {
            log::info!(
                "[SPG] {} f = {:.6e}, ||pg|| = {:.3e}, iters = {}, fe = {}, ge = {}",
                status,
                f_k,
                pg_norm,
                counters.iterations,
                counters.func_evals,
                counters.grad_evals
            );
        }

        Ok(SpgSolution {
            final_point: x.clone(),
            final_value: f_k,
            projected_gradient_norm: pg_norm,
            iterations: counters.iterations,
            func_evals: counters.func_evals,
            grad_evals: counters.grad_evals,
            status,
        })
    }
}

impl<F, G> Spg<FnObjective<F, G>>
where
    F: FnMut(&Array1<f64>) -> f64,
    G: FnMut(&Array1<f64>, &mut Array1<f64>),
{
    /// Creates a solver from an objective closure and a gradient closure.
    ///
    /// # Arguments
    /// * `value` - Returns the objective at the given point.
    /// * `gradient` - Writes the gradient at the given point into its second
    ///   argument.
    pub fn new(value: F, gradient: G) -> Self {
        Self::from_objective(FnObjective::new(value, gradient))
    }
}

impl<O> Spg<O> {
    /// Creates a solver for any [`Objective`] implementation.
    pub fn from_objective(objective: O) -> Self {
        Self {
            core: SpgCore::default(),
            objective,
        }
    }

    /// Replaces every option at once.
    pub fn with_config(mut self, config: SpgConfig) -> Self {
        self.core.config = config;
        self
    }

    /// Sets the projected-gradient convergence threshold (default: 1e-5).
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.core.config.tolerance = tolerance;
        self
    }

    /// Sets the maximum number of iterations (default: 100).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.core.config.max_iterations = max_iterations;
        self
    }

    /// Sets the maximum number of objective evaluations (default: 1000).
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.core.config.max_evaluations = max_evaluations;
        self
    }

    /// Sets the nonmonotone history length (default: 10). A value of 1
    /// makes the line search monotone.
    pub fn with_memory(mut self, memory: usize) -> Self {
        self.core.config.memory = memory;
        self
    }

    /// Chooses whether the starting point is projected onto the box
    /// (default: true).
    pub fn with_project_initial_point(mut self, project: bool) -> Self {
        self.core.config.project_initial_point = project;
        self
    }

    /// Sets the logging level; accepts a [`Verbosity`] or a numeric level.
    pub fn with_verbosity(mut self, verbosity: impl Into<Verbosity>) -> Self {
        self.core.config.verbosity = verbosity.into();
        self
    }

    /// Provides lower and upper bounds for every coordinate. The box is
    /// checked when the solve starts.
    pub fn with_bounds(mut self, lower: Array1<f64>, upper: Array1<f64>) -> Self {
        self.core.bounds = Some(BoxBounds::from_parts(lower, upper));
        self
    }

    /// Provides lower bounds, keeping any upper bounds already set.
    pub fn with_lower_bounds(mut self, lower: Array1<f64>) -> Self {
        let upper = match self.core.bounds.take() {
            Some(bounds) => bounds.into_parts().1,
            None => Array1::from_elem(lower.len(), f64::INFINITY),
        };
        self.core.bounds = Some(BoxBounds::from_parts(lower, upper));
        self
    }

    /// Provides upper bounds, keeping any lower bounds already set.
    pub fn with_upper_bounds(mut self, upper: Array1<f64>) -> Self {
        let lower = match self.core.bounds.take() {
            Some(bounds) => bounds.into_parts().0,
            None => Array1::from_elem(upper.len(), f64::NEG_INFINITY),
        };
        self.core.bounds = Some(BoxBounds::from_parts(lower, upper));
        self
    }

    /// Uses an already validated box.
    pub fn with_box(mut self, bounds: BoxBounds) -> Self {
        self.core.bounds = Some(bounds);
        self
    }

    pub fn config(&self) -> &SpgConfig {
        &self.core.config
    }

    pub fn bounds(&self) -> Option<&BoxBounds> {
        self.core.bounds.as_ref()
    }
}

impl<O: Objective> Spg<O> {
    /// Minimizes starting from `x`, which is overwritten with the final
    /// point. Allocates a fresh workspace.
    pub fn run(&mut self, x: &mut Array1<f64>) -> Result<SpgSolution, SpgError> {
        let mut ws = SpgWorkspace::with_memory(x.len(), self.core.config.memory);
        self.run_with_workspace(x, &mut ws)
    }

    /// Minimizes starting from `x` using caller-owned buffers.
    ///
    /// The workspace must have been built for `x.len()` variables and the
    /// configured memory; a mismatch is reported before any evaluation and
    /// leaves `x` untouched.
    pub fn run_with_workspace(
        &mut self,
        x: &mut Array1<f64>,
        ws: &mut SpgWorkspace,
    ) -> Result<SpgSolution, SpgError> {
        self.core.run(&mut self.objective, x, ws)
    }

    /// Minimizes starting from a copy of `x0`, leaving it unchanged.
    pub fn solve(&mut self, x0: &Array1<f64>) -> Result<SpgSolution, SpgError> {
        let mut x = x0.clone();
        self.run(&mut x)
    }
}

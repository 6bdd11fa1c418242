//! Spectral step estimation and the nonmonotone projected line search.
//!
//! One call to [`nonmonotone_line_search`] performs the whole step of an SPG
//! iteration: it builds the projected direction `d = P(x - λg) - x`, then
//! backtracks along `x + αd` until the trial value is below the largest of
//! the last `m` accepted values by a sufficient-decrease margin.

use crate::workspace::SpgWorkspace;
use crate::{Counters, Objective, SpgCore, Verbosity};
use ndarray::{Array1, Zip};

/// Sufficient-decrease constant of the nonmonotone acceptance test.
pub(crate) const GAMMA: f64 = 1e-4;
/// Safeguard interval for the interpolated step, `[SIGMA1, SIGMA2 * α]`.
pub(crate) const SIGMA1: f64 = 0.1;
pub(crate) const SIGMA2: f64 = 0.9;
pub(crate) const LAMBDA_MIN: f64 = 1e-10;
pub(crate) const LAMBDA_MAX: f64 = 1e10;

/// Barzilai-Borwein step `sᵀs / sᵀy`, clamped into `[LAMBDA_MIN, LAMBDA_MAX]`.
///
/// Nonpositive curvature, or a quotient that is not finite, yields
/// `LAMBDA_MAX`.
pub(crate) fn spectral_step(sts: f64, sty: f64) -> f64 {
    if !(sty > 0.0) {
        return LAMBDA_MAX;
    }
    let lambda = sts / sty;
    if !lambda.is_finite() {
        return LAMBDA_MAX;
    }
    lambda.clamp(LAMBDA_MIN, LAMBDA_MAX)
}

/// Step used before any curvature information exists: the inverse of the
/// projected-gradient norm at the starting point.
pub(crate) fn initial_spectral_step(pg_norm: f64) -> f64 {
    if pg_norm > 0.0 && pg_norm.is_finite() {
        (1.0 / pg_norm).clamp(LAMBDA_MIN, LAMBDA_MAX)
    } else {
        1.0
    }
}

/// Computes `(sᵀs, sᵀy)` for `s = x_new - x_old`, `y = g_new - g_old`
/// without materializing either difference.
pub(crate) fn curvature_pair(
    x_old: &Array1<f64>,
    x_new: &Array1<f64>,
    g_old: &Array1<f64>,
    g_new: &Array1<f64>,
) -> (f64, f64) {
    let mut sts = 0.0;
    let mut sty = 0.0;
    for i in 0..x_old.len() {
        let s = x_new[i] - x_old[i];
        let y = g_new[i] - g_old[i];
        sts += s * s;
        sty += s * y;
    }
    (sts, sty)
}

/// Next trial factor after `alpha` was rejected with value `f_trial`.
///
/// Small factors are halved. Otherwise the minimizer of the quadratic
/// interpolating `f`, the directional derivative `gtd` and `f_trial` is
/// used if it falls inside `[SIGMA1, SIGMA2 * alpha]`; anything else halves.
/// The result is always at most `0.9 * alpha`.
pub(crate) fn backtrack(alpha: f64, f_current: f64, f_trial: f64, gtd: f64) -> f64 {
    if alpha <= SIGMA1 {
        return alpha / 2.0;
    }
    let atemp = -gtd * alpha * alpha / (2.0 * (f_trial - f_current - alpha * gtd));
    if !atemp.is_finite() || atemp < SIGMA1 || atemp > SIGMA2 * alpha {
        alpha / 2.0
    } else {
        atemp
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LineSearchOutcome {
    /// `ws.xn` holds the accepted point; its objective value is `value`.
    Accepted { value: f64, alpha: f64, trials: usize },
    /// The evaluation budget ran out before any trial was accepted.
    BudgetExhausted { trials: usize },
}

/// Runs one nonmonotone projected line search from `x`.
///
/// Reads the current gradient from `ws.g` and the reference value from
/// `ws.history`. While searching, `ws.gn` stores the direction and `ws.xn`
/// the trial point. Every objective call is counted in `counters` and none
/// is made once `counters.func_evals` reaches the configured budget.
pub(crate) fn nonmonotone_line_search<O>(
    core: &SpgCore,
    objective: &mut O,
    x: &Array1<f64>,
    f_current: f64,
    lambda: f64,
    ws: &mut SpgWorkspace,
    counters: &mut Counters,
) -> LineSearchOutcome
where
    O: Objective + ?Sized,
{
    let max_evaluations = core.config.max_evaluations;
    let verbosity = core.config.verbosity;

    // d = P(x - λg) - x, kept in ws.gn until a point is accepted.
    Zip::from(&mut ws.gn)
        .and(x)
        .and(&ws.g)
        .for_each(|d, &xi, &gi| *d = xi - lambda * gi);
    core.project_in_place(&mut ws.gn);
    Zip::from(&mut ws.gn).and(x).for_each(|d, &xi| *d -= xi);

    let gtd = ws.g.dot(&ws.gn);
    if gtd >= 0.0 {
        log::warn!(
            "[SPG] Non-descent direction (gᵀd = {:.2e} >= 0); searching anyway.",
            gtd
        );
    }
    let fmax = ws.history.max();

    let mut alpha: f64 = 1.0;
    let mut trials = 0usize;
    loop {
        if counters.func_evals >= max_evaluations {
            if verbosity >= Verbosity::LineSearch {
                log::debug!(
                    "[SPG LS] Evaluation budget exhausted after {} trials (α = {:.3e}).",
                    trials,
                    alpha
                );
            }
            return LineSearchOutcome::BudgetExhausted { trials };
        }

        Zip::from(&mut ws.xn)
            .and(x)
            .and(&ws.gn)
            .for_each(|t, &xi, &di| *t = xi + alpha * di);
        let f_trial = objective.value(&ws.xn);
        counters.func_evals += 1;
        trials += 1;

        let threshold = fmax + GAMMA * alpha * gtd;
        if verbosity >= Verbosity::LineSearch {
            log::debug!(
                "[SPG LS] trial {}: α = {:.3e}, f = {:.6e}, threshold = {:.6e}",
                trials,
                alpha,
                f_trial,
                threshold
            );
        }
        if f_trial <= threshold {
            return LineSearchOutcome::Accepted {
                value: f_trial,
                alpha,
                trials,
            };
        }

        alpha = backtrack(alpha, f_current, f_trial, gtd);
    }
}

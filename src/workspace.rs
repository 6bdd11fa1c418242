//! Reusable working storage for a solve.

use ndarray::Array1;
use std::collections::VecDeque;

/// Default number of accepted objective values remembered by the
/// nonmonotone acceptance test.
pub const DEFAULT_MEMORY: usize = 10;

/// Ring buffer of the last `cap` accepted objective values.
///
/// Storage is reserved up front, so pushing never reallocates.
#[derive(Debug, Clone)]
pub struct NonmonotoneHistory {
    buf: VecDeque<f64>,
    cap: usize,
}

impl NonmonotoneHistory {
    /// `cap` is raised to 1 if zero.
    pub fn new(cap: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(cap.max(1)),
            cap: cap.max(1),
        }
    }

    /// Forgets everything and seeds the window with `f`.
    pub fn reset(&mut self, f: f64) {
        self.buf.clear();
        self.buf.push_back(f);
    }

    /// Records an accepted value, evicting the oldest once full.
    pub fn push(&mut self, f: f64) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(f);
    }

    /// Largest remembered value, or `-inf` when empty.
    pub fn max(&self) -> f64 {
        self.buf.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    fn set_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        while self.buf.len() > self.cap {
            self.buf.pop_front();
        }
        self.buf.reserve(self.cap - self.buf.len());
    }
}

/// Auxiliary buffers for the SPG iteration.
///
/// Holds the current gradient, the trial point, the trial gradient (which
/// doubles as the search direction while backtracking) and the nonmonotone
/// history. Construct one per problem size and hand it to
/// [`Spg::run_with_workspace`](crate::Spg::run_with_workspace) to solve
/// repeatedly without allocating. A solve borrows it mutably, so one
/// workspace can never serve two overlapping solves.
#[derive(Debug, Clone)]
pub struct SpgWorkspace {
    pub(crate) g: Array1<f64>,
    pub(crate) xn: Array1<f64>,
    pub(crate) gn: Array1<f64>,
    pub(crate) history: NonmonotoneHistory,
}

impl SpgWorkspace {
    /// Buffers for `n` variables with the default history length.
    pub fn new(n: usize) -> Self {
        Self::with_memory(n, DEFAULT_MEMORY)
    }

    /// Buffers for `n` variables remembering `m` accepted values.
    pub fn with_memory(n: usize, m: usize) -> Self {
        Self {
            g: Array1::zeros(n),
            xn: Array1::zeros(n),
            gn: Array1::zeros(n),
            history: NonmonotoneHistory::new(m),
        }
    }

    /// Reallocates for a different problem size or history length.
    /// A no-op when both already match.
    pub fn resize(&mut self, n: usize, m: usize) {
        if self.g.len() != n {
            self.g = Array1::zeros(n);
            self.xn = Array1::zeros(n);
            self.gn = Array1::zeros(n);
        }
        if self.history.capacity() != m.max(1) {
            self.history.set_cap(m);
        }
    }

    /// Number of variables the buffers are sized for.
    pub fn num_vars(&self) -> usize {
        self.g.len()
    }

    /// History length the workspace was built with.
    pub fn memory(&self) -> usize {
        self.history.capacity()
    }

    /// The gradient at the last accepted point of the most recent solve.
    pub fn gradient(&self) -> &Array1<f64> {
        &self.g
    }

    pub fn history(&self) -> &NonmonotoneHistory {
        &self.history
    }
}

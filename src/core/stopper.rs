//! Stopping policies consulted by [`optimize`](crate::optimization::optimize)
//! after every step.
//!
//! A stopper is a stateful predicate: it may keep counters, best scores or a
//! clock across calls, so every optimization run needs its own instance.

use std::fmt;
use std::time::{Duration, Instant};

use crate::objective::Evaluation;

/// Decides whether the optimization of `P` should halt.
pub trait Stopper<P: ?Sized> {
    /// Called once per completed step with the latest evaluation.
    fn should_stop(&mut self, process: &P, evaluation: &Evaluation) -> bool;

    fn name(&self) -> &str {
        "Stopper"
    }
}

impl<P: ?Sized, F> Stopper<P> for F
where
    F: FnMut(&P, &Evaluation) -> bool,
{
    fn should_stop(&mut self, process: &P, evaluation: &Evaluation) -> bool {
        self(process, evaluation)
    }
}

/// Stops after a fixed number of steps.
///
/// Returns `false` for the first `num_iterations` calls and `true` from then
/// on, whatever the evaluation. With `num_iterations = 0` the very first call
/// stops, so at least one step always runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumIterations {
    num_iterations: usize,
    calls: usize,
}

impl NumIterations {
    pub fn new(num_iterations: usize) -> Self {
        Self {
            num_iterations,
            calls: 0,
        }
    }

    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }
}

impl<P: ?Sized> Stopper<P> for NumIterations {
    fn should_stop(&mut self, _process: &P, _evaluation: &Evaluation) -> bool {
        if self.calls < self.num_iterations {
            self.calls += 1;
            false
        } else {
            true
        }
    }

    fn name(&self) -> &str {
        "NumIterations"
    }
}

impl fmt::Display for NumIterations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NumIterations({})", self.num_iterations)
    }
}

/// Stops once the best score has not improved by more than `min_delta`
/// for `patience` consecutive calls.
#[derive(Debug, Clone)]
pub struct Plateau {
    patience: usize,
    min_delta: f64,
    best: Option<f64>,
    stale: usize,
}

impl Plateau {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            best: None,
            stale: 0,
        }
    }
}

impl<P: ?Sized> Stopper<P> for Plateau {
    fn should_stop(&mut self, _process: &P, evaluation: &Evaluation) -> bool {
        let score = evaluation.item();
        match self.best {
            Some(best) if score <= best + self.min_delta => self.stale += 1,
            _ => {
                self.best = Some(score);
                self.stale = 0;
            }
        }
        self.stale >= self.patience.max(1)
    }

    fn name(&self) -> &str {
        "Plateau"
    }
}

impl fmt::Display for Plateau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plateau({}, {})", self.patience, self.min_delta)
    }
}

/// Stops once the L2 norm of the score gradient drops below `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientNorm {
    threshold: f64,
}

impl GradientNorm {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl<P: ?Sized> Stopper<P> for GradientNorm {
    fn should_stop(&mut self, _process: &P, evaluation: &Evaluation) -> bool {
        evaluation.gradient().norm() < self.threshold
    }

    fn name(&self) -> &str {
        "GradientNorm"
    }
}

impl fmt::Display for GradientNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GradientNorm({})", self.threshold)
    }
}

/// Wall-clock budget, measured from construction.
#[derive(Debug, Clone)]
pub struct TimeLimit {
    limit: Duration,
    start: Instant,
}

impl TimeLimit {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            start: Instant::now(),
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl<P: ?Sized> Stopper<P> for TimeLimit {
    fn should_stop(&mut self, _process: &P, _evaluation: &Evaluation) -> bool {
        self.start.elapsed() >= self.limit
    }

    fn name(&self) -> &str {
        "TimeLimit"
    }
}

impl fmt::Display for TimeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeLimit({:?})", self.limit)
    }
}

/// Stops as soon as any member stops.
///
/// Every member is consulted on every call, so counters inside the members
/// advance together even after one of them has fired.
pub struct AnyOf<'a, P: ?Sized> {
    stoppers: Vec<Box<dyn Stopper<P> + Send + 'a>>,
}

impl<'a, P: ?Sized> AnyOf<'a, P> {
    pub fn new() -> Self {
        Self {
            stoppers: Vec::new(),
        }
    }

    pub fn with<S>(mut self, stopper: S) -> Self
    where
        S: Stopper<P> + Send + 'a,
    {
        self.stoppers.push(Box::new(stopper));
        self
    }

    pub fn push(&mut self, stopper: Box<dyn Stopper<P> + Send + 'a>) {
        self.stoppers.push(stopper);
    }

    pub fn len(&self) -> usize {
        self.stoppers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stoppers.is_empty()
    }
}

impl<P: ?Sized> Default for AnyOf<'_, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ?Sized> Stopper<P> for AnyOf<'_, P> {
    fn should_stop(&mut self, process: &P, evaluation: &Evaluation) -> bool {
        self.stoppers
            .iter_mut()
            .fold(false, |stop, s| s.should_stop(process, evaluation) || stop)
    }

    fn name(&self) -> &str {
        "AnyOf"
    }
}

impl<P: ?Sized> fmt::Debug for AnyOf<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .stoppers
            .iter()
            .map(|s| s.name())
            .collect::<Vec<&str>>()
            .join(", ");
        f.debug_struct("AnyOf").field("stoppers", &names).finish()
    }
}

/// Records every score it sees, then defers to the wrapped stopper.
#[derive(Debug, Clone)]
pub struct Recorder<S> {
    inner: S,
    scores: Vec<f64>,
}

impl<S> Recorder<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            scores: Vec::new(),
        }
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn into_scores(self) -> Vec<f64> {
        self.scores
    }
}

impl<P: ?Sized, S: Stopper<P>> Stopper<P> for Recorder<S> {
    fn should_stop(&mut self, process: &P, evaluation: &Evaluation) -> bool {
        self.scores.push(evaluation.item());
        self.inner.should_stop(process, evaluation)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

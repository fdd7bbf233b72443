//! The single-step gradient-ascent engine.

use std::fmt;

use tracing::trace;

use crate::error::Result;
use crate::objective::{Evaluation, Objective};
use crate::optimization::Process;
use crate::optimizer::Optimizer;
use crate::tensor::{Candidate, Tensor};
use crate::transform::{Identity, Transform};

/// Owns one optimization run: the candidate input, the objective it is scored
/// with, the optimizer bound to it, and the transform applied before scoring.
///
/// The candidate itself is never handed out; [`Mei::get_mei`] returns a
/// finalized copy.
pub struct Mei<O, Opt, T = Identity> {
    objective: O,
    candidate: Candidate,
    optimizer: Opt,
    transform: T,
    initial_shape: Vec<usize>,
}

impl<O, Opt> Mei<O, Opt, Identity>
where
    O: Objective,
    Opt: Optimizer,
{
    /// Starts a run from `initial_guess`, which gets gradient tracking enabled.
    pub fn new(objective: O, initial_guess: Tensor, optimizer: Opt) -> Self {
        let initial_shape = initial_guess.shape().to_vec();
        let mut candidate = Candidate::new(initial_guess);
        candidate.enable_grad();
        Self {
            objective,
            candidate,
            optimizer,
            transform: Identity,
            initial_shape,
        }
    }
}

impl<O, Opt, T> Mei<O, Opt, T>
where
    O: Objective,
    Opt: Optimizer,
    T: Transform,
{
    /// Replaces the transform applied to the candidate before scoring.
    pub fn with_transform<U: Transform>(self, transform: U) -> Mei<O, Opt, U> {
        Mei {
            objective: self.objective,
            candidate: self.candidate,
            optimizer: self.optimizer,
            transform,
            initial_shape: self.initial_shape,
        }
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    pub fn optimizer(&self) -> &Opt {
        &self.optimizer
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// One gradient-ascent step; returns the (non-negated) evaluation.
    ///
    /// Exactly one forward pass, one backward pass and one optimizer update.
    /// Errors from the objective, transform or optimizer are returned as-is.
    pub fn step(&mut self, iteration: usize) -> Result<Evaluation> {
        self.optimizer.zero_grad(&mut self.candidate);

        let transformed = self.transform.forward(self.candidate.value(), iteration)?;
        let evaluation = self.objective.evaluate(&transformed)?;

        // Descending the negated score ascends the score.
        let negated = -evaluation.clone();
        negated.backward(&self.transform, iteration, &mut self.candidate)?;
        self.optimizer.step(&mut self.candidate)?;

        trace!(iteration, score = evaluation.item(), "mei step");
        Ok(evaluation)
    }

    /// Finalized copy of the candidate: detached, batch axis squeezed.
    pub fn get_mei(&self) -> Tensor {
        self.candidate.finalize()
    }
}

impl<O, Opt, T> Process for Mei<O, Opt, T>
where
    O: Objective,
    Opt: Optimizer,
    T: Transform,
{
    fn step(&mut self, iteration: usize) -> Result<Evaluation> {
        Mei::step(self, iteration)
    }

    fn get_mei(&self) -> Tensor {
        Mei::get_mei(self)
    }
}

impl<O: Objective, Opt, T> fmt::Display for Mei<O, Opt, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mei({}, {:?})", self.objective.name(), self.initial_shape)
    }
}

impl<O: Objective, Opt: Optimizer, T: Transform> fmt::Debug for Mei<O, Opt, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mei")
            .field("objective", &self.objective.name())
            .field("optimizer", &self.optimizer.name())
            .field("transform", &self.transform.name())
            .field("shape", &self.initial_shape)
            .finish()
    }
}

//! Scoring functions and their evaluations.
//!
//! An [`Objective`] maps a (transformed) input to a scalar score together with
//! the gradient of that score with respect to the input. How the objective is
//! built from a trained model (output selection, ensembling) is up to the caller.

use std::ops::Neg;

use crate::error::Result;
use crate::tensor::{Candidate, Tensor};
use crate::transform::Transform;

/// Scalar score for one input, plus `d score / d input`.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    value: f64,
    gradient: Tensor,
}

impl Evaluation {
    pub fn new(value: f64, gradient: Tensor) -> Self {
        Self { value, gradient }
    }

    /// Plain numeric value of the score.
    #[inline]
    pub fn item(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn gradient(&self) -> &Tensor {
        &self.gradient
    }

    /// Pulls the gradient back through `transform` (which was applied to the
    /// candidate at `iteration`) and accumulates it into `candidate`.
    pub fn backward<T>(&self, transform: &T, iteration: usize, candidate: &mut Candidate) -> Result<()>
    where
        T: Transform + ?Sized,
    {
        let grad = transform.backward(candidate.value(), iteration, &self.gradient)?;
        candidate.accumulate_grad(&grad)
    }
}

impl Neg for Evaluation {
    type Output = Evaluation;

    fn neg(mut self) -> Evaluation {
        self.value = -self.value;
        self.gradient.scale(-1.0);
        self
    }
}

/// A differentiable scoring function with a single scalar output.
pub trait Objective {
    fn evaluate(&self, input: &Tensor) -> Result<Evaluation>;

    fn name(&self) -> &str {
        "objective"
    }
}

impl<F> Objective for F
where
    F: Fn(&Tensor) -> Result<Evaluation>,
{
    fn evaluate(&self, input: &Tensor) -> Result<Evaluation> {
        self(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Identity;

    #[test]
    fn negation_flips_value_and_gradient() {
        let e = Evaluation::new(2.5, Tensor::from_vec(&[2], vec![1.0, -3.0]).unwrap());
        let n = -e;
        assert_eq!(n.item(), -2.5);
        assert_eq!(n.gradient().data(), &[-1.0, 3.0]);
    }

    #[test]
    fn closures_are_objectives() {
        let sum = |x: &Tensor| -> Result<Evaluation> {
            let value = x.data().iter().map(|v| *v as f64).sum();
            Ok(Evaluation::new(value, Tensor::filled(x.shape(), 1.0)))
        };
        let e = sum.evaluate(&Tensor::filled(&[4], 0.5)).unwrap();
        assert_eq!(e.item(), 2.0);
        assert_eq!(sum.name(), "objective");
    }

    #[test]
    fn backward_accumulates_into_candidate() {
        let mut candidate = Candidate::new(Tensor::zeros(&[3]));
        candidate.enable_grad();

        let e = Evaluation::new(1.0, Tensor::filled(&[3], 2.0));
        e.backward(&Identity, 0, &mut candidate).unwrap();
        e.backward(&Identity, 1, &mut candidate).unwrap();

        assert_eq!(candidate.grad().unwrap().data(), &[4.0, 4.0, 4.0]);
    }
}

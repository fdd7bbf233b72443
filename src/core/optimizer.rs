//! Update rules that move the candidate along its accumulated gradient.
//!
//! Optimizers minimize: the engine feeds them the gradient of the *negated*
//! score, so descending it ascends the score.

use crate::error::Result;
use crate::tensor::{Candidate, Tensor};

pub trait Optimizer {
    /// Clears the gradient accumulated on `candidate`.
    fn zero_grad(&mut self, candidate: &mut Candidate);

    /// Applies one update using the candidate's current gradient.
    /// Candidates without a gradient are left unchanged.
    fn step(&mut self, candidate: &mut Candidate) -> Result<()>;

    fn name(&self) -> &str;
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn zero_grad(&mut self, candidate: &mut Candidate) {
        (**self).zero_grad(candidate)
    }

    fn step(&mut self, candidate: &mut Candidate) -> Result<()> {
        (**self).step(candidate)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Stochastic gradient descent with optional heavy-ball momentum.
#[derive(Debug, Clone)]
pub struct Sgd {
    lr: f32,
    momentum: f32,
    velocity: Option<Tensor>,
}

impl Sgd {
    pub fn new(lr: f32) -> Self {
        Self::with_momentum(lr, 0.0)
    }

    pub fn with_momentum(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocity: None,
        }
    }

    pub fn lr(&self) -> f32 {
        self.lr
    }
}

impl Optimizer for Sgd {
    fn zero_grad(&mut self, candidate: &mut Candidate) {
        candidate.zero_grad();
    }

    fn step(&mut self, candidate: &mut Candidate) -> Result<()> {
        let Some(grad) = candidate.grad().cloned() else {
            return Ok(());
        };

        let update = if self.momentum == 0.0 {
            grad
        } else {
            let velocity = match self.velocity.take() {
                Some(mut v) => {
                    v.scale(self.momentum);
                    v.add_assign(&grad)?;
                    v
                }
                None => grad,
            };
            self.velocity = Some(velocity.clone());
            velocity
        };

        candidate.value_mut().axpy(-self.lr, &update)
    }

    fn name(&self) -> &str {
        "Sgd"
    }
}

/// Adam (Kingma & Ba) with bias correction.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    t: i32,
    m: Option<Tensor>,
    v: Option<Tensor>,
}

impl Adam {
    pub fn new(lr: f32) -> Self {
        Self::with_params(lr, 0.9, 0.999, 1e-8)
    }

    pub fn with_params(lr: f32, beta1: f32, beta2: f32, eps: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            eps,
            t: 0,
            m: None,
            v: None,
        }
    }
}

impl Optimizer for Adam {
    fn zero_grad(&mut self, candidate: &mut Candidate) {
        candidate.zero_grad();
    }

    fn step(&mut self, candidate: &mut Candidate) -> Result<()> {
        let Some(grad) = candidate.grad() else {
            return Ok(());
        };
        candidate.value().ensure_same_shape(grad)?;

        let m = self.m.get_or_insert_with(|| Tensor::zeros(grad.shape()));
        let v = self.v.get_or_insert_with(|| Tensor::zeros(grad.shape()));
        self.t += 1;

        let (b1, b2) = (self.beta1, self.beta2);
        for ((m, v), g) in m.data_mut().iter_mut().zip(v.data_mut()).zip(grad.data()) {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
        }

        let bc1 = 1.0 - b1.powi(self.t);
        let bc2 = 1.0 - b2.powi(self.t);
        let step = self.lr / bc1;

        for ((x, m), v) in candidate
            .value_mut()
            .data_mut()
            .iter_mut()
            .zip(m.data())
            .zip(v.data())
        {
            *x -= step * m / ((v / bc2).sqrt() + self.eps);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Adam"
    }
}

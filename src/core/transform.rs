//! Per-iteration input transforms applied before scoring.

use crate::error::Result;
use crate::prng::Prng;
use crate::tensor::Tensor;

/// Differentiable preprocessing of the candidate.
///
/// `forward` may depend on the iteration index (jitter or blur schedules).
/// `backward` receives the same input and iteration and returns the gradient
/// with respect to the input, given the gradient with respect to the output.
pub trait Transform {
    fn forward(&mut self, input: &Tensor, iteration: usize) -> Result<Tensor>;

    fn backward(&self, input: &Tensor, iteration: usize, grad_output: &Tensor) -> Result<Tensor>;

    fn name(&self) -> &str;
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn forward(&mut self, input: &Tensor, iteration: usize) -> Result<Tensor> {
        (**self).forward(input, iteration)
    }

    fn backward(&self, input: &Tensor, iteration: usize, grad_output: &Tensor) -> Result<Tensor> {
        (**self).backward(input, iteration, grad_output)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Leaves the input untouched and ignores the iteration index.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn forward(&mut self, input: &Tensor, _iteration: usize) -> Result<Tensor> {
        Ok(input.clone())
    }

    fn backward(&self, _input: &Tensor, _iteration: usize, grad_output: &Tensor) -> Result<Tensor> {
        Ok(grad_output.clone())
    }

    fn name(&self) -> &str {
        "Identity"
    }
}

/// Random circular shift of the last two axes, re-drawn every iteration.
#[derive(Debug, Clone)]
pub struct Jitter {
    max_shift: usize,
    rng: Prng,
    // (iteration, dy, dx) drawn by the last forward pass.
    last: Option<(usize, isize, isize)>,
}

impl Jitter {
    pub fn new(max_shift: usize, seed: u64) -> Self {
        Self {
            max_shift,
            rng: Prng::new(seed),
            last: None,
        }
    }

    pub fn max_shift(&self) -> usize {
        self.max_shift
    }

    fn shift_for(&self, iteration: usize) -> (isize, isize) {
        match self.last {
            Some((it, dy, dx)) if it == iteration => (dy, dx),
            _ => (0, 0),
        }
    }
}

impl Transform for Jitter {
    fn forward(&mut self, input: &Tensor, iteration: usize) -> Result<Tensor> {
        let dy = self.rng.gen_offset(self.max_shift);
        let dx = self.rng.gen_offset(self.max_shift);
        self.last = Some((iteration, dy, dx));
        Ok(input.roll2d(dy, dx))
    }

    fn backward(&self, input: &Tensor, iteration: usize, grad_output: &Tensor) -> Result<Tensor> {
        input.ensure_same_shape(grad_output)?;
        let (dy, dx) = self.shift_for(iteration);
        Ok(grad_output.roll2d(-dy, -dx))
    }

    fn name(&self) -> &str {
        "Jitter"
    }
}

/// Applies `first`, then `second`.
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
    // Output of `first` from the last forward pass, needed to pull back through `second`.
    intermediate: Option<(usize, Tensor)>,
}

impl<A, B> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            intermediate: None,
        }
    }
}

impl<A: Transform, B: Transform> Transform for Chain<A, B> {
    fn forward(&mut self, input: &Tensor, iteration: usize) -> Result<Tensor> {
        let mid = self.first.forward(input, iteration)?;
        let out = self.second.forward(&mid, iteration)?;
        self.intermediate = Some((iteration, mid));
        Ok(out)
    }

    fn backward(&self, input: &Tensor, iteration: usize, grad_output: &Tensor) -> Result<Tensor> {
        let grad_mid = match &self.intermediate {
            Some((it, mid)) if *it == iteration => {
                self.second.backward(mid, iteration, grad_output)?
            }
            _ => self.second.backward(input, iteration, grad_output)?,
        };
        self.first.backward(input, iteration, &grad_mid)
    }

    fn name(&self) -> &str {
        "Chain"
    }
}

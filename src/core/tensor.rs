#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense row-major `f32` array with an explicit shape.
///
/// All tensors live in host memory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawTensor"))]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

// Deserialized form, checked by `Tensor::from_vec` before use.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawTensor> for Tensor {
    type Error = Error;

    fn try_from(raw: RawTensor) -> Result<Self> {
        Tensor::from_vec(&raw.shape, raw.data)
    }
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: &[usize], value: f32) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![value; len],
        }
    }

    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let len: usize = shape.iter().product();
        if len != data.len() {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                found: vec![data.len()],
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drops a leading dimension of extent 1 (the batch axis), if there is one.
    pub fn squeeze(mut self) -> Self {
        if self.shape.len() > 1 && self.shape[0] == 1 {
            self.shape.remove(0);
        }
        self
    }

    pub fn ensure_same_shape(&self, other: &Tensor) -> Result<()> {
        if self.shape != other.shape {
            return Err(Error::ShapeMismatch {
                expected: self.shape.clone(),
                found: other.shape.clone(),
            });
        }
        Ok(())
    }

    pub fn dot(&self, other: &Tensor) -> Result<f64> {
        self.ensure_same_shape(other)?;
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| *a as f64 * *b as f64)
            .sum())
    }

    /// Euclidean norm over all elements.
    pub fn norm(&self) -> f64 {
        self.data
            .iter()
            .map(|v| (*v as f64) * (*v as f64))
            .sum::<f64>()
            .sqrt()
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|v| f(*v)).collect(),
        }
    }

    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    pub fn add_assign(&mut self, other: &Tensor) -> Result<()> {
        self.axpy(1.0, other)
    }

    /// `self += alpha * other`
    pub fn axpy(&mut self, alpha: f32, other: &Tensor) -> Result<()> {
        self.ensure_same_shape(other)?;
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += alpha * *b;
        }
        Ok(())
    }

    /// Circular shift of the last two axes by `(dy, dx)`.
    ///
    /// Tensors with fewer than two axes are shifted along their only axis by `dx`.
    pub fn roll2d(&self, dy: isize, dx: isize) -> Tensor {
        let (rows, cols) = match self.shape.len() {
            0 => return self.clone(),
            1 => (1, self.shape[0]),
            n => (self.shape[n - 2], self.shape[n - 1]),
        };
        let plane = rows * cols;
        if plane == 0 {
            return self.clone();
        }
        let dy = if self.shape.len() == 1 { 0 } else { dy };

        let mut out = vec![0.0; self.data.len()];
        for (p, src) in self.data.chunks(plane).enumerate() {
            let dst = &mut out[p * plane..(p + 1) * plane];
            for r in 0..rows {
                let tr = (r as isize + dy).rem_euclid(rows as isize) as usize;
                for c in 0..cols {
                    let tc = (c as isize + dx).rem_euclid(cols as isize) as usize;
                    dst[tr * cols + tc] = src[r * cols + c];
                }
            }
        }
        Tensor {
            shape: self.shape.clone(),
            data: out,
        }
    }
}

/// The input under optimization, together with its accumulated gradient.
#[derive(Debug, Clone)]
pub struct Candidate {
    value: Tensor,
    grad: Option<Tensor>,
    requires_grad: bool,
}

impl Candidate {
    pub fn new(value: Tensor) -> Self {
        Self {
            value,
            grad: None,
            requires_grad: false,
        }
    }

    pub fn enable_grad(&mut self) {
        self.requires_grad = true;
    }

    #[inline]
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    #[inline]
    pub fn value(&self) -> &Tensor {
        &self.value
    }

    #[inline]
    pub fn value_mut(&mut self) -> &mut Tensor {
        &mut self.value
    }

    #[inline]
    pub fn grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    pub fn zero_grad(&mut self) {
        if let Some(grad) = &mut self.grad {
            grad.data_mut().fill(0.0);
        }
    }

    /// Adds `grad` to the stored gradient. No-op while gradient tracking is off.
    pub fn accumulate_grad(&mut self, grad: &Tensor) -> Result<()> {
        if !self.requires_grad {
            return Ok(());
        }
        self.value.ensure_same_shape(grad)?;
        match &mut self.grad {
            Some(acc) => acc.add_assign(grad)?,
            None => self.grad = Some(grad.clone()),
        }
        Ok(())
    }

    /// Copy of the current value with no gradient attached.
    pub fn detach(&self) -> Tensor {
        self.value.clone()
    }

    /// Detached, batch-squeezed copy of the candidate.
    pub fn finalize(&self) -> Tensor {
        self.detach().squeeze()
    }
}

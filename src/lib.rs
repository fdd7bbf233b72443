//! # featurevis
//!
//! Most Exciting Input (MEI) generation by gradient ascent.
//!
//! Given a differentiable scoring function (typically one simulated neuron's
//! predicted response) and an initial guess, the engine repeatedly transforms
//! the candidate, scores it, pulls the gradient of the negated score back to
//! the candidate and lets an optimizer update it, until a stopping policy fires.
//!
//! ## Quick Start
//!
//! ```
//! use featurevis::prelude::*;
//!
//! // Score peaks when every pixel equals 0.5.
//! let objective = |x: &Tensor| -> featurevis::Result<Evaluation> {
//!     let diff = x.map(|v| v - 0.5);
//!     let value = -diff.data().iter().map(|d| (*d as f64).powi(2)).sum::<f64>();
//!     Ok(Evaluation::new(value, diff.map(|d| -2.0 * d)))
//! };
//!
//! let mut mei = Mei::new(objective, Tensor::zeros(&[1, 4, 4]), Sgd::new(0.1));
//! let (score, input) = optimize(&mut mei, &mut NumIterations::new(100)).unwrap();
//!
//! assert_eq!(input.shape(), &[4, 4]);
//! assert!(score > -1e-3);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): JSON method configs and serializable results
//! - `parallel`: run independent MEI generations on a rayon pool
//!
//! ## Modules
//!
//! - [`mei`]: the single-step engine
//! - [`optimization`]: the driver loop
//! - [`stopper`]: stopping policies
//! - [`objective`], [`transform`], [`optimizer`]: the pluggable collaborators
//! - [`method`]: config-driven generation across seeds

pub mod error;

#[path = "core/tensor.rs"]
pub mod tensor;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/objective.rs"]
pub mod objective;

#[path = "core/transform.rs"]
pub mod transform;

#[path = "core/optimizer.rs"]
pub mod optimizer;

#[path = "core/stopper.rs"]
pub mod stopper;

#[path = "core/mei.rs"]
pub mod mei;

#[path = "core/optimization.rs"]
pub mod optimization;

#[path = "core/method.rs"]
pub mod method;

pub use error::{Error, Result};

/// Prelude module for convenient imports.
///
/// ```
/// use featurevis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::mei::Mei;
    pub use crate::method::{generate_mei, generate_meis, MeiResult, MethodConfig};
    pub use crate::objective::{Evaluation, Objective};
    pub use crate::optimization::{optimize, Process};
    pub use crate::optimizer::{Adam, Optimizer, Sgd};
    pub use crate::stopper::{AnyOf, GradientNorm, NumIterations, Plateau, Stopper, TimeLimit};
    pub use crate::tensor::{Candidate, Tensor};
    pub use crate::transform::{Chain, Identity, Jitter, Transform};
}

//! Config-driven MEI generation.
//!
//! A [`MethodConfig`] pins down everything about one gradient-ascent method
//! except the objective and the seed: input shape, initial guess distribution,
//! optimizer, transform and stopping rules. [`generate_mei`] builds a fresh
//! engine and fresh stoppers for every run.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

use tracing::info;

use crate::error::{Error, Result};
use crate::mei::Mei;
use crate::objective::{Evaluation, Objective};
use crate::optimization::optimize;
use crate::optimizer::{Adam, Optimizer, Sgd};
use crate::prng::Prng;
use crate::stopper::{AnyOf, GradientNorm, NumIterations, Plateau, Recorder, TimeLimit};
use crate::tensor::Tensor;
use crate::transform::{Identity, Jitter, Transform};

// Decorrelates the jitter stream from the initial-guess stream.
const JITTER_SEED_SALT: u64 = 0xA5A5_5A5A_DEAD_BEEF;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum InitialGuess {
    Zeros,
    Gaussian { std: f32 },
    Uniform { low: f32, high: f32 },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum OptimizerConfig {
    Sgd {
        lr: f32,
        #[cfg_attr(feature = "serde", serde(default))]
        momentum: f32,
    },
    Adam {
        lr: f32,
        #[cfg_attr(feature = "serde", serde(default = "default_beta1"))]
        beta1: f32,
        #[cfg_attr(feature = "serde", serde(default = "default_beta2"))]
        beta2: f32,
        #[cfg_attr(feature = "serde", serde(default = "default_eps"))]
        eps: f32,
    },
}

#[cfg(feature = "serde")]
fn default_beta1() -> f32 {
    0.9
}

#[cfg(feature = "serde")]
fn default_beta2() -> f32 {
    0.999
}

#[cfg(feature = "serde")]
fn default_eps() -> f32 {
    1e-8
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum TransformConfig {
    Identity,
    Jitter { max_shift: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlateauConfig {
    pub patience: usize,
    pub min_delta: f64,
}

/// Stopping rules; the run ends as soon as any configured rule fires.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StopperConfig {
    pub num_iterations: usize,
    pub time_limit_ms: Option<u64>,
    pub plateau: Option<PlateauConfig>,
    pub min_gradient_norm: Option<f64>,
}

impl Default for StopperConfig {
    fn default() -> Self {
        Self {
            num_iterations: 100,
            time_limit_ms: None,
            plateau: None,
            min_gradient_norm: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MethodConfig {
    pub input_shape: Vec<usize>,
    pub initial: InitialGuess,
    pub optimizer: OptimizerConfig,
    pub transform: TransformConfig,
    pub stopper: StopperConfig,
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            input_shape: vec![1, 16, 16],
            initial: InitialGuess::Gaussian { std: 0.1 },
            optimizer: OptimizerConfig::Sgd {
                lr: 0.1,
                momentum: 0.0,
            },
            transform: TransformConfig::Identity,
            stopper: StopperConfig::default(),
        }
    }
}

impl MethodConfig {
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "serde")]
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_shape.is_empty() || self.input_shape.contains(&0) {
            return Err(Error::InvalidConfig(format!(
                "input_shape must be non-empty with positive extents, got {:?}",
                self.input_shape
            )));
        }
        match self.initial {
            InitialGuess::Gaussian { std } if !(std > 0.0) => {
                return Err(Error::InvalidConfig(format!("std must be > 0, got {}", std)));
            }
            InitialGuess::Uniform { low, high } if !(low < high) => {
                return Err(Error::InvalidConfig(format!(
                    "uniform range must satisfy low < high, got [{}, {})",
                    low, high
                )));
            }
            _ => {}
        }
        if let TransformConfig::Jitter { max_shift } = self.transform {
            let limit = self.input_shape.iter().rev().take(2).copied().max().unwrap_or(0);
            if max_shift > limit {
                return Err(Error::InvalidConfig(format!(
                    "jitter max_shift must not exceed the spatial extents {:?}, got {}",
                    &self.input_shape[self.input_shape.len().saturating_sub(2)..],
                    max_shift
                )));
            }
        }
        let lr = match self.optimizer {
            OptimizerConfig::Sgd { lr, .. } | OptimizerConfig::Adam { lr, .. } => lr,
        };
        if !(lr > 0.0) {
            return Err(Error::InvalidConfig(format!("lr must be > 0, got {}", lr)));
        }
        Ok(())
    }

    fn initial_guess(&self, rng: &mut Prng) -> Tensor {
        let mut t = Tensor::zeros(&self.input_shape);
        match self.initial {
            InitialGuess::Zeros => {}
            InitialGuess::Gaussian { std } => {
                t.data_mut().iter_mut().for_each(|v| *v = std * rng.next_normal());
            }
            InitialGuess::Uniform { low, high } => {
                t.data_mut()
                    .iter_mut()
                    .for_each(|v| *v = rng.gen_range_f32(low, high));
            }
        }
        t
    }

    fn build_optimizer(&self) -> Box<dyn Optimizer + Send> {
        match self.optimizer {
            OptimizerConfig::Sgd { lr, momentum } => Box::new(Sgd::with_momentum(lr, momentum)),
            OptimizerConfig::Adam {
                lr,
                beta1,
                beta2,
                eps,
            } => Box::new(Adam::with_params(lr, beta1, beta2, eps)),
        }
    }

    fn build_transform(&self, seed: u64) -> Box<dyn Transform + Send> {
        match self.transform {
            TransformConfig::Identity => Box::new(Identity),
            TransformConfig::Jitter { max_shift } => {
                Box::new(Jitter::new(max_shift, seed ^ JITTER_SEED_SALT))
            }
        }
    }

    fn build_stopper<'a, P: 'a>(&self) -> AnyOf<'a, P> {
        let cfg = &self.stopper;
        let mut stopper = AnyOf::new().with(NumIterations::new(cfg.num_iterations));
        if let Some(ms) = cfg.time_limit_ms {
            stopper = stopper.with(TimeLimit::new(Duration::from_millis(ms)));
        }
        if let Some(p) = cfg.plateau {
            stopper = stopper.with(Plateau::new(p.patience, p.min_delta));
        }
        if let Some(threshold) = cfg.min_gradient_norm {
            stopper = stopper.with(GradientNorm::new(threshold));
        }
        stopper
    }
}

/// Outcome of one MEI generation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeiResult {
    pub seed: u64,
    /// Score of the final step.
    pub score: f64,
    pub mei: Tensor,
    /// Score after every step, in order.
    pub output: Vec<f64>,
}

// Lets the engine own a borrowed objective.
struct Borrowed<'a, O: ?Sized>(&'a O);

impl<O: Objective + ?Sized> Objective for Borrowed<'_, O> {
    fn evaluate(&self, input: &Tensor) -> Result<Evaluation> {
        self.0.evaluate(input)
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

/// Runs one optimization of `objective` under `config`, seeded by `seed`.
pub fn generate_mei<O>(objective: &O, config: &MethodConfig, seed: u64) -> Result<MeiResult>
where
    O: Objective + ?Sized,
{
    config.validate()?;

    let mut rng = Prng::new(seed);
    let initial = config.initial_guess(&mut rng);
    let mut mei = Mei::new(Borrowed(objective), initial, config.build_optimizer())
        .with_transform(config.build_transform(seed));
    let mut stopper = Recorder::new(config.build_stopper());

    let (score, tensor) = optimize(&mut mei, &mut stopper)?;
    let output = stopper.into_scores();
    info!(seed, score, steps = output.len(), "generated MEI");

    Ok(MeiResult {
        seed,
        score,
        mei: tensor,
        output,
    })
}

/// One independent run per seed. Runs in parallel with the `parallel` feature.
pub fn generate_meis<O>(objective: &O, config: &MethodConfig, seeds: &[u64]) -> Result<Vec<MeiResult>>
where
    O: Objective + Sync + ?Sized,
{
    #[cfg(feature = "parallel")]
    use rayon::prelude::*;

    #[cfg(feature = "parallel")]
    let seeds = seeds.par_iter();
    #[cfg(not(feature = "parallel"))]
    let seeds = seeds.iter();

    seeds
        .map(|&seed| generate_mei(objective, config, seed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Negative squared distance to `target`, maximized at `x == target`.
    struct Peak {
        target: f32,
    }

    impl Objective for Peak {
        fn evaluate(&self, input: &Tensor) -> Result<Evaluation> {
            let diff = input.map(|v| v - self.target);
            let value = -diff.data().iter().map(|d| (*d as f64).powi(2)).sum::<f64>();
            Ok(Evaluation::new(value, diff.map(|d| -2.0 * d)))
        }
    }

    fn config(num_iterations: usize) -> MethodConfig {
        MethodConfig {
            input_shape: vec![1, 4, 4],
            stopper: StopperConfig {
                num_iterations,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        MethodConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = MethodConfig::default();
        cfg.input_shape = vec![1, 0, 4];
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let mut cfg = MethodConfig::default();
        cfg.optimizer = OptimizerConfig::Sgd {
            lr: 0.0,
            momentum: 0.0,
        };
        assert!(cfg.validate().is_err());

        let mut cfg = MethodConfig::default();
        cfg.initial = InitialGuess::Gaussian { std: -1.0 };
        assert!(cfg.validate().is_err());

        let mut cfg = MethodConfig::default();
        cfg.initial = InitialGuess::Uniform {
            low: 1.0,
            high: 1.0,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn generate_mei_climbs_towards_peak() {
        let result = generate_mei(&Peak { target: 0.5 }, &config(200), 1).unwrap();

        assert_eq!(result.mei.shape(), &[4, 4]);
        assert_eq!(result.output.len(), 201);
        assert_eq!(result.score, *result.output.last().unwrap());
        assert!(result.output[0] < result.score);
        for v in result.mei.data() {
            assert!((v - 0.5).abs() < 1e-3, "got {}", v);
        }
    }

    #[test]
    fn zero_iterations_takes_one_step() {
        let result = generate_mei(&Peak { target: 0.5 }, &config(0), 3).unwrap();
        assert_eq!(result.output.len(), 1);
    }

    #[test]
    fn same_seed_same_result() {
        let cfg = MethodConfig {
            transform: TransformConfig::Jitter { max_shift: 1 },
            ..config(20)
        };
        let peak = Peak { target: 1.0 };
        let a = generate_mei(&peak, &cfg, 42).unwrap();
        let b = generate_mei(&peak, &cfg, 42).unwrap();
        assert_eq!(a, b);

        let c = generate_mei(&peak, &cfg, 43).unwrap();
        assert_ne!(a.mei, c.mei);
    }

    #[test]
    fn plateau_stops_early() {
        let mut cfg = config(10_000);
        cfg.stopper.plateau = Some(PlateauConfig {
            patience: 3,
            min_delta: 1e-6,
        });
        let result = generate_mei(&Peak { target: 0.0 }, &cfg, 5).unwrap();
        assert!(result.output.len() < 10_000);
    }

    #[test]
    fn adam_config_runs() {
        let cfg = MethodConfig {
            optimizer: OptimizerConfig::Adam {
                lr: 0.05,
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8,
            },
            ..config(300)
        };
        let result = generate_mei(&Peak { target: -0.25 }, &cfg, 9).unwrap();
        assert!(result.score > result.output[0]);
    }

    #[test]
    fn generate_meis_runs_one_per_seed() {
        let results = generate_meis(&Peak { target: 0.2 }, &config(5), &[1, 2, 3]).unwrap();
        let seeds: Vec<u64> = results.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![1, 2, 3]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_from_json_fills_defaults() {
        let cfg = MethodConfig::from_json_str(
            r#"{
                "input_shape": [1, 8, 8],
                "optimizer": { "kind": "adam", "lr": 0.01 },
                "transform": { "kind": "jitter", "max_shift": 2 },
                "stopper": { "num_iterations": 50, "time_limit_ms": 1000 }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.input_shape, vec![1, 8, 8]);
        assert_eq!(cfg.initial, InitialGuess::Gaussian { std: 0.1 });
        assert_eq!(
            cfg.optimizer,
            OptimizerConfig::Adam {
                lr: 0.01,
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8
            }
        );
        assert_eq!(cfg.transform, TransformConfig::Jitter { max_shift: 2 });
        assert_eq!(cfg.stopper.num_iterations, 50);
        assert_eq!(cfg.stopper.time_limit_ms, Some(1000));
        assert_eq!(cfg.stopper.plateau, None);
    }

    #[test]
    fn jitter_larger_than_the_input_is_rejected() {
        let mut config = MethodConfig {
            input_shape: vec![1, 4, 6],
            transform: TransformConfig::Jitter { max_shift: 6 },
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.transform = TransformConfig::Jitter { max_shift: 7 };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.transform = TransformConfig::Jitter {
            max_shift: usize::MAX,
        };
        let peak = Peak { target: 0.0 };
        let err = generate_mei(&peak, &config, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn oversized_jitter_in_json_is_rejected() {
        let err = MethodConfig::from_json_str(
            r#"{ "transform": { "kind": "jitter", "max_shift": 18446744073709551615 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn invalid_json_config_is_rejected() {
        let err = MethodConfig::from_json_str(r#"{ "input_shape": [] }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = MethodConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}

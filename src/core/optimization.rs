//! Drives a [`Process`] until its stopper says enough.

use tracing::debug;

use crate::error::Result;
use crate::objective::Evaluation;
use crate::stopper::Stopper;
use crate::tensor::Tensor;

/// Something that can be stepped and finalized into an MEI.
pub trait Process {
    fn step(&mut self, iteration: usize) -> Result<Evaluation>;

    fn get_mei(&self) -> Tensor;
}

/// Steps `process` with iteration indices `0, 1, 2, ...`, consulting `stopper`
/// after every step, and returns the last score together with the finalized MEI.
///
/// The stopper is never consulted before the first step, so at least one step
/// always runs. A stopper that never fires loops forever. Errors from
/// `process.step` end the run immediately and are returned unchanged.
pub fn optimize<P, S>(process: &mut P, stopper: &mut S) -> Result<(f64, Tensor)>
where
    P: Process + ?Sized,
    S: Stopper<P> + ?Sized,
{
    let mut iteration = 0;
    let evaluation = loop {
        let evaluation = process.step(iteration)?;
        if stopper.should_stop(process, &evaluation) {
            break evaluation;
        }
        iteration += 1;
    };

    let score = evaluation.item();
    debug!(steps = iteration + 1, score, stopper = stopper.name(), "optimization finished");
    Ok((score, process.get_mei()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::stopper::NumIterations;

    /// Returns a fixed evaluation and records the iteration of every step.
    #[derive(Default)]
    struct FakeProcess {
        steps: Vec<usize>,
        fail_at: Option<usize>,
    }

    impl Process for FakeProcess {
        fn step(&mut self, iteration: usize) -> Result<Evaluation> {
            if self.fail_at == Some(iteration) {
                return Err(Error::InvalidConfig("non-finite gradient".into()));
            }
            self.steps.push(iteration);
            Ok(Evaluation::new(0.75, Tensor::zeros(&[1])))
        }

        fn get_mei(&self) -> Tensor {
            Tensor::filled(&[2], 9.0)
        }
    }

    // get_mei takes &self, so count through a wrapper that tracks calls.
    struct CountingProcess {
        inner: FakeProcess,
        mei_calls: std::cell::Cell<usize>,
    }

    impl Process for CountingProcess {
        fn step(&mut self, iteration: usize) -> Result<Evaluation> {
            assert_eq!(self.mei_calls.get(), 0, "get_mei called before loop ended");
            self.inner.step(iteration)
        }

        fn get_mei(&self) -> Tensor {
            self.mei_calls.set(self.mei_calls.get() + 1);
            self.inner.get_mei()
        }
    }

    /// Replays a fixed script of decisions and records what it was shown.
    struct ScriptedStopper {
        script: Vec<bool>,
        seen: Vec<(Vec<usize>, f64)>,
    }

    impl Stopper<FakeProcess> for ScriptedStopper {
        fn should_stop(&mut self, process: &FakeProcess, evaluation: &Evaluation) -> bool {
            self.seen.push((process.steps.clone(), evaluation.item()));
            self.script[self.seen.len() - 1]
        }
    }

    fn script(num_false: usize) -> ScriptedStopper {
        let mut script = vec![false; num_false];
        script.push(true);
        ScriptedStopper {
            script,
            seen: Vec::new(),
        }
    }

    #[test]
    fn steps_with_increasing_indices() {
        for n in [0, 1, 100] {
            let mut process = FakeProcess::default();
            let mut stopper = script(n);
            optimize(&mut process, &mut stopper).unwrap();
            assert_eq!(process.steps, (0..=n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn stopper_is_consulted_once_per_step() {
        for n in [0, 1, 100] {
            let mut process = FakeProcess::default();
            let mut stopper = script(n);
            optimize(&mut process, &mut stopper).unwrap();

            assert_eq!(stopper.seen.len(), n + 1);
            // Each consultation happens right after the matching step.
            for (i, (steps, score)) in stopper.seen.iter().enumerate() {
                assert_eq!(steps.len(), i + 1);
                assert_eq!(*score, 0.75);
            }
        }
    }

    #[test]
    fn get_mei_is_called_once_after_loop() {
        let mut process = CountingProcess {
            inner: FakeProcess::default(),
            mei_calls: std::cell::Cell::new(0),
        };
        let mut stopper = NumIterations::new(3);
        optimize(&mut process, &mut stopper).unwrap();
        assert_eq!(process.mei_calls.get(), 1);
        assert_eq!(process.inner.steps, vec![0, 1, 2, 3]);
    }

    #[test]
    fn returns_last_score_and_mei() {
        let mut process = FakeProcess::default();
        let (score, mei) = optimize(&mut process, &mut NumIterations::new(0)).unwrap();
        assert_eq!(score, 0.75);
        assert_eq!(mei, Tensor::filled(&[2], 9.0));
        assert_eq!(process.steps, vec![0]);
    }

    #[test]
    fn step_errors_end_the_run() {
        let mut process = FakeProcess {
            fail_at: Some(2),
            ..Default::default()
        };
        let err = optimize(&mut process, &mut NumIterations::new(10)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(process.steps, vec![0, 1]);
    }
}

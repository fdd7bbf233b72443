// Minimal seeded PRNG for initial guesses and jitter offsets.
//
// Not cryptographically secure. Same seed, same MEI.

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
    spare_normal: Option<f32>,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // xorshift gets stuck at zero.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self {
            state: seed,
            spare_normal: None,
        }
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn next_f32_01(&mut self) -> f32 {
        let x = self.next_u32() >> 8;
        (x as f32) / ((1u32 << 24) as f32)
    }

    #[inline]
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32_01()
    }

    /// Uniform integer in `[-max, max]`, with `max` clamped to `isize::MAX / 2`.
    pub fn gen_offset(&mut self, max: usize) -> isize {
        if max == 0 {
            return 0;
        }
        let max = max.min(isize::MAX as usize / 2) as u64;
        let span = 2 * max + 1;
        (self.next_u64() % span) as isize - max as isize
    }

    /// Standard normal sample (Box-Muller, caching the second value).
    pub fn next_normal(&mut self) -> f32 {
        if let Some(z) = self.spare_normal.take() {
            return z;
        }
        // Keep u1 away from 0 so ln() stays finite.
        let u1 = (self.next_f32_01() as f64).max(f64::MIN_POSITIVE);
        let u2 = self.next_f32_01() as f64;
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.spare_normal = Some((radius * theta.sin()) as f32);
        (radius * theta.cos()) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Prng::new(7);
        let mut b = Prng::new(7);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn offsets_stay_in_range() {
        let mut rng = Prng::new(3);
        for _ in 0..1000 {
            let o = rng.gen_offset(2);
            assert!((-2..=2).contains(&o));
        }
        assert_eq!(rng.gen_offset(0), 0);
    }

    #[test]
    fn huge_offsets_do_not_overflow() {
        let mut rng = Prng::new(5);
        let bound = (isize::MAX / 2) as usize;
        for _ in 0..100 {
            let o = rng.gen_offset(usize::MAX);
            assert!(o.unsigned_abs() <= bound);
        }
    }

    #[test]
    fn normal_samples_are_roughly_standard() {
        let mut rng = Prng::new(11);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.next_normal() as f64).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.1, "var {}", var);
    }
}

use std::fmt;
use std::time::Duration;

use ndarray::{ArrayD, IxDyn};
use rand::Rng;

/// Uniform random inputs in `[-1, 1)` for each shape.
pub fn random_inputs<R: Rng>(shapes: &[Vec<usize>], rng: &mut R) -> Vec<ArrayD<f32>> {
    shapes
        .iter()
        .map(|shape| ArrayD::from_shape_fn(IxDyn(shape), |_| rng.gen_range(-1.0..1.0)))
        .collect()
}

/// Latency summary over timed iterations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchReport {
    pub iterations: usize,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl BenchReport {
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        let min = *samples.iter().min()?;
        let max = *samples.iter().max()?;
        let total: Duration = samples.iter().sum();
        Some(Self {
            iterations: samples.len(),
            mean: mean(total, samples.len()),
            min,
            max,
        })
    }
}

fn mean(total: Duration, count: usize) -> Duration {
    let nanos = total.as_nanos() / count.max(1) as u128;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} iterations: mean {:.3} ms, min {:.3} ms, max {:.3} ms",
            self.iterations,
            self.mean.as_secs_f64() * 1e3,
            self.min.as_secs_f64() * 1e3,
            self.max.as_secs_f64() * 1e3,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_inputs_match_shapes_and_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let inputs = random_inputs(&[vec![1, 3, 4], vec![2]], &mut rng);
        assert_eq!(inputs[0].shape(), &[1, 3, 4]);
        assert_eq!(inputs[1].shape(), &[2]);
        assert!(inputs
            .iter()
            .flat_map(|t| t.iter())
            .all(|&v| (-1.0..1.0).contains(&v)));
    }

    #[test]
    fn report_summarizes_samples() {
        let samples = [
            Duration::from_millis(4),
            Duration::from_millis(2),
            Duration::from_millis(6),
        ];
        let report = BenchReport::from_samples(&samples).unwrap();
        assert_eq!(report.iterations, 3);
        assert_eq!(report.mean, Duration::from_millis(4));
        assert_eq!(report.min, Duration::from_millis(2));
        assert_eq!(report.max, Duration::from_millis(6));
        assert_eq!(
            report.to_string(),
            "3 iterations: mean 4.000 ms, min 2.000 ms, max 6.000 ms"
        );
    }

    #[test]
    fn mean_handles_counts_beyond_u32() {
        let count = u32::MAX as usize + 1;
        assert_eq!(mean(Duration::from_secs(1 << 32), count), Duration::from_secs(1));
        assert_eq!(mean(Duration::from_millis(9), 3), Duration::from_millis(3));
    }

    #[test]
    fn no_samples_no_report() {
        assert_eq!(BenchReport::from_samples(&[]), None);
    }
}

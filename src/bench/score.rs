//! Timing result sets and score derivation.

use std::time::Duration;

/// Elapsed-time samples recorded for one benchmark, immutable once the run
/// completes. Percentiles are order-independent: a sorted copy is taken on
/// every query.
#[derive(Debug, Clone, Default)]
pub struct Scores {
    samples: Vec<Duration>,
}

impl Scores {
    pub fn new() -> Scores {
        Scores::default()
    }

    pub fn from_samples(samples: Vec<Duration>) -> Scores {
        Scores { samples }
    }

    pub fn record(&mut self, sample: Duration) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The `p`-th percentile sample, `1 ..= 100`.
    ///
    /// Tie-break for even sample counts is lower-of-middle-pair: the sorted
    /// sample at index `ceil(n * p / 100) - 1`.
    pub fn percentile(&self, p: u32) -> Option<Duration> {
        debug_assert!((1..=100).contains(&p));
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let rank = (self.samples.len() * p as usize).div_ceil(100);
        Some(sorted[rank.max(1) - 1])
    }

    pub fn median(&self) -> Option<Duration> {
        self.percentile(50)
    }

    /// Normalized throughput: `task_size_mb` divided by the median elapsed
    /// time, in MB/s.
    pub fn score(&self, task_size_mb: f64) -> Option<f64> {
        let median = self.median()?;
        if median.is_zero() {
            return None;
        }
        Some(task_size_mb / median.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Scores {
        Scores::from_samples(values.iter().map(|&s| Duration::from_secs(s)).collect())
    }

    #[test]
    fn test_score_is_size_over_median() {
        let scores = secs(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        // Lower-of-middle-pair for ten samples is the 5th (5 seconds).
        assert_eq!(scores.median(), Some(Duration::from_secs(5)));
        assert_eq!(scores.score(2.75), Some(2.75 / 5.0));
    }

    #[test]
    fn test_sample_order_does_not_matter() {
        let shuffled = secs(&[9, 2, 7, 4, 10, 6, 3, 8, 5, 1]);
        let ordered = secs(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(shuffled.median(), ordered.median());
        assert_eq!(shuffled.score(2.75), ordered.score(2.75));
    }

    #[test]
    fn test_odd_sample_count_takes_exact_middle() {
        let scores = secs(&[3, 1, 2]);
        assert_eq!(scores.median(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_percentile_bounds() {
        let scores = secs(&[1, 2, 3, 4]);
        assert_eq!(scores.percentile(1), Some(Duration::from_secs(1)));
        assert_eq!(scores.percentile(100), Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_empty_scores_are_undefined() {
        let scores = Scores::new();
        assert_eq!(scores.median(), None);
        assert_eq!(scores.score(2.75), None);
    }
}

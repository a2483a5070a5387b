/// Rounds to three decimal places.
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Distribution summary over one sample of durations (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Summary {
    /// Samples are rounded to milliseconds first; every metric is rounded again.
    /// Returns `None` for an empty sample.
    pub fn from_durations(durations: &[f64]) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = durations.iter().copied().map(round3).collect();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Some(Self {
            count,
            min: round3(sorted[0]),
            max: round3(sorted[count - 1]),
            mean: round3(sum / count as f64),
            median: round3(median(&sorted)),
            p90: round3(percentile(&sorted, 90.0)),
            p95: round3(percentile(&sorted, 95.0)),
            p99: round3(percentile(&sorted, 99.0)),
        })
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Nearest-rank percentile over a sorted, non-empty sample.
///
/// `index = p/100 * n`. A whole index selects `sorted[index - 1]`; a fractional index above 1
/// averages `sorted[floor - 1]` and `sorted[floor]`; anything below 1 selects the first element.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let index = (p / 100.0) * n as f64;
    if index == index.trunc() {
        let i = (index as usize).clamp(1, n);
        sorted[i - 1]
    } else if index > 1.0 {
        let i = (index.trunc() as usize).min(n - 1);
        (sorted[i - 1] + sorted[i]) / 2.0
    } else {
        sorted[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sample_has_no_summary() {
        assert_eq!(Summary::from_durations(&[]), None);
    }

    #[test]
    fn single_sample_is_every_metric() {
        let s = match Summary::from_durations(&[0.12345]) {
            Some(s) => s,
            None => panic!("expected a summary"),
        };
        assert_eq!(s.count, 1);
        for v in [s.min, s.max, s.mean, s.median, s.p90, s.p95, s.p99] {
            assert_eq!(v, 0.123);
        }
    }

    #[test]
    fn ten_samples() {
        let data: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let s = match Summary::from_durations(&data) {
            Some(s) => s,
            None => panic!("expected a summary"),
        };
        assert_eq!(s.count, 10);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 10.0);
        assert_eq!(s.mean, 5.5);
        assert_eq!(s.median, 5.5);
        assert_eq!(s.p90, 9.0);
        // 9.5 -> mean of 9th and 10th
        assert_eq!(s.p95, 9.5);
        assert_eq!(s.p99, 9.5);
    }

    #[test]
    fn percentile_low_index_selects_first() {
        let sorted = [1.0, 2.0, 3.0];
        assert_eq!(percentile(&sorted, 10.0), 1.0);
    }

    #[test]
    fn percentiles_are_monotonic() {
        let mut seed = 17u64;
        for len in 1..60 {
            let data: Vec<f64> = (0..len)
                .map(|_| {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    (seed >> 33) as f64 / 1_000_000.0
                })
                .collect();
            let s = match Summary::from_durations(&data) {
                Some(s) => s,
                None => panic!("expected a summary"),
            };
            assert!(s.min <= s.median && s.median <= s.max);
            assert!(s.p90 <= s.p95, "{s:?}");
            assert!(s.p95 <= s.p99, "{s:?}");
            assert!(s.p99 <= s.max, "{s:?}");
        }
    }
}

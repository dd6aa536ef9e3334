//! Derived resource metrics
//!
//! CPU utilisation is computed Docker-style from two consecutive samples:
//! the container's CPU-time delta over the host's CPU-time delta.

use crate::models::{ResourceSample, ResourceUsage};

/// CPU percentage between two samples.
///
/// Returns 0.0 when the host counter did not advance or the container counter
/// went backwards (restart), so the result is always finite.
pub fn cpu_percent(prev: &ResourceSample, next: &ResourceSample) -> f64 {
    let system_delta = i128::from(next.system_cpu_usage) - i128::from(prev.system_cpu_usage);
    let cpu_delta = i128::from(next.cpu_usage) - i128::from(prev.cpu_usage);

    if system_delta <= 0 || cpu_delta < 0 {
        return 0.0;
    }

    (cpu_delta * 100) as f64 / system_delta as f64
}

/// Memory usage as a percentage of the limit, `None` without a limit
pub fn mem_percent(sample: &ResourceSample) -> Option<f64> {
    if sample.mem_limit == 0 {
        return None;
    }
    Some(sample.mem_usage as f64 / sample.mem_limit as f64 * 100.0)
}

/// Fold a new sample into the previous usage.
///
/// Returns `None` if the sample repeats the stored timestamp; replays are
/// dropped without touching the stored usage.
pub fn advance(prev: Option<&ResourceUsage>, sample: ResourceSample) -> Option<ResourceUsage> {
    if let Some(prev) = prev {
        if prev.sample.timestamp == sample.timestamp {
            return None;
        }
    }

    let cpu_percent = prev.map(|p| cpu_percent(&p.sample, &sample));
    let mem_percent = mem_percent(&sample);

    Some(ResourceUsage {
        sample,
        cpu_percent,
        mem_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn sample(secs: i64, cpu: u64, system: u64) -> ResourceSample {
        ResourceSample {
            timestamp: DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap(),
            system_cpu_usage: system,
            cpu_usage: cpu,
            mem_limit: 1000,
            mem_usage: 250,
        }
    }

    #[test]
    fn test_cpu_percent() {
        let pct = cpu_percent(&sample(0, 100, 1000), &sample(1, 150, 1500));
        assert!((pct - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cpu_percent_zero_denominator() {
        let pct = cpu_percent(&sample(0, 100, 1000), &sample(1, 150, 1000));
        assert_eq!(pct, 0.0);
        assert!(pct.is_finite());
    }

    #[test]
    fn test_cpu_percent_counter_reset() {
        let pct = cpu_percent(&sample(0, 5000, 1000), &sample(1, 10, 2000));
        assert_eq!(pct, 0.0);
    }

    #[test]
    fn test_mem_percent() {
        assert_eq!(mem_percent(&sample(0, 0, 0)), Some(25.0));

        let mut unlimited = sample(0, 0, 0);
        unlimited.mem_limit = 0;
        assert_eq!(mem_percent(&unlimited), None);
    }

    #[test]
    fn test_advance_first_sample_has_no_cpu() {
        let usage = advance(None, sample(0, 100, 1000)).unwrap();
        assert_eq!(usage.cpu_percent, None);
        assert_eq!(usage.mem_percent, Some(25.0));
    }

    #[test]
    fn test_advance_skips_same_timestamp() {
        let first = advance(None, sample(0, 100, 1000)).unwrap();
        assert!(advance(Some(&first), sample(0, 900, 9000)).is_none());

        let second = advance(Some(&first), sample(1, 150, 1500)).unwrap();
        assert_eq!(second.cpu_percent, Some(10.0));
    }
}

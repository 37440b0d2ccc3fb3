//! Growth-rate computation and workload pattern classification.

use crate::window::SampleWindow;
use std::fmt;

/// How the growth rate was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    /// Fewer than two samples; no rate can be computed
    InsufficientData,
    /// The window started at zero pods and now has some
    Startup,
    /// The window started and ended at zero pods
    NoPods,
    /// Mean of per-step percentage changes across the window
    Calculated,
    /// Endpoint-to-endpoint percentage change
    Simple,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::InsufficientData => "insufficient_data",
            Trend::Startup => "startup",
            Trend::NoPods => "no_pods",
            Trend::Calculated => "calculated",
            Trend::Simple => "simple",
        };
        write!(f, "{}", s)
    }
}

/// Classified workload growth pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadPattern {
    Stable,
    Linear,
    Exponential,
}

impl fmt::Display for WorkloadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkloadPattern::Stable => "stable",
            WorkloadPattern::Linear => "linear",
            WorkloadPattern::Exponential => "exponential",
        };
        write!(f, "{}", s)
    }
}

/// Compute the window's growth rate as a percentage, with the trend that
/// produced it.
///
/// With three or more samples whose consecutive predecessors are all
/// non-zero, the rate is the arithmetic mean of per-step percentage changes;
/// otherwise it falls back to the endpoint change.
pub fn growth_rate(window: &SampleWindow) -> (f64, Trend) {
    let counts = window.counts();

    if counts.len() < 2 {
        return (0.0, Trend::InsufficientData);
    }

    let oldest = counts[0];
    let newest = counts[counts.len() - 1];

    if oldest == 0 {
        if newest > 0 {
            return (100.0, Trend::Startup);
        }
        return (0.0, Trend::NoPods);
    }

    if counts.len() >= 3 && counts[..counts.len() - 1].iter().all(|&c| c > 0) {
        let rates: Vec<f64> = counts
            .windows(2)
            .map(|pair| ((pair[1] as f64 - pair[0] as f64) / pair[0] as f64) * 100.0)
            .collect();
        let mean = rates.iter().sum::<f64>() / rates.len() as f64;
        return (mean, Trend::Calculated);
    }

    let change = ((newest as f64 - oldest as f64) / oldest as f64) * 100.0;
    (change, Trend::Simple)
}

/// Classify a growth rate against the stable/linear thresholds.
///
/// Boundaries are inclusive upward: a rate equal to a threshold lands in the
/// faster class.
pub fn classify(rate: f64, stable_threshold: f64, linear_threshold: f64) -> WorkloadPattern {
    let abs_rate = rate.abs();

    if abs_rate < stable_threshold {
        WorkloadPattern::Stable
    } else if abs_rate < linear_threshold {
        WorkloadPattern::Linear
    } else {
        WorkloadPattern::Exponential
    }
}

/// The placer best suited to a pattern: greedy for stable/linear growth,
/// refined for exponential growth.
pub fn scheduler_for<'a>(
    pattern: WorkloadPattern,
    greedy_name: &'a str,
    refine_name: &'a str,
) -> &'a str {
    match pattern {
        WorkloadPattern::Stable | WorkloadPattern::Linear => greedy_name,
        WorkloadPattern::Exponential => refine_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::GrowthSample;

    fn window_of(counts: &[u64]) -> SampleWindow {
        let mut window = SampleWindow::new(6);
        for &count in counts {
            window.push(GrowthSample::now(count));
        }
        window
    }

    #[test]
    fn test_single_sample_insufficient() {
        let (rate, trend) = growth_rate(&window_of(&[3]));
        assert_eq!(rate, 0.0);
        assert_eq!(trend, Trend::InsufficientData);
    }

    #[test]
    fn test_startup_from_zero() {
        let (rate, trend) = growth_rate(&window_of(&[0, 5]));
        assert_eq!(rate, 100.0);
        assert_eq!(trend, Trend::Startup);
    }

    #[test]
    fn test_no_pods() {
        let (rate, trend) = growth_rate(&window_of(&[0, 0]));
        assert_eq!(rate, 0.0);
        assert_eq!(trend, Trend::NoPods);
    }

    #[test]
    fn test_two_samples_simple() {
        let (rate, trend) = growth_rate(&window_of(&[4, 6]));
        assert_eq!(trend, Trend::Simple);
        assert!((rate - 50.0).abs() < 1e-9);
    }

    /// [2, 3, 4]: per-step changes are 50% and 33.33%; mean = 41.67%
    #[test]
    fn test_calculated_mean_of_steps() {
        let (rate, trend) = growth_rate(&window_of(&[2, 3, 4]));
        assert_eq!(trend, Trend::Calculated);
        assert!((rate - 41.666666666666664).abs() < 1e-9);
    }

    /// [5, 5, 5, 5, 10, 20]: steps [0, 0, 0, 100, 100]; mean = 40%
    #[test]
    fn test_calculated_burst() {
        let (rate, trend) = growth_rate(&window_of(&[5, 5, 5, 5, 10, 20]));
        assert_eq!(trend, Trend::Calculated);
        assert!((rate - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_window_rate_zero() {
        let (rate, trend) = growth_rate(&window_of(&[20, 20, 20, 20, 20, 20]));
        assert_eq!(trend, Trend::Calculated);
        assert_eq!(rate, 0.0);
    }

    /// A zero in the interior forces the endpoint fallback.
    #[test]
    fn test_interior_zero_falls_back_to_simple() {
        let (rate, trend) = growth_rate(&window_of(&[2, 0, 4]));
        assert_eq!(trend, Trend::Simple);
        assert!((rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(classify(9.999, 10.0, 30.0), WorkloadPattern::Stable);
        assert_eq!(classify(10.0, 10.0, 30.0), WorkloadPattern::Linear);
        assert_eq!(classify(29.999, 10.0, 30.0), WorkloadPattern::Linear);
        assert_eq!(classify(30.0, 10.0, 30.0), WorkloadPattern::Exponential);
    }

    #[test]
    fn test_classification_uses_magnitude() {
        assert_eq!(classify(-5.0, 10.0, 30.0), WorkloadPattern::Stable);
        assert_eq!(classify(-15.0, 10.0, 30.0), WorkloadPattern::Linear);
        assert_eq!(classify(-40.0, 10.0, 30.0), WorkloadPattern::Exponential);
    }

    #[test]
    fn test_scheduler_routing_rule() {
        assert_eq!(
            scheduler_for(WorkloadPattern::Stable, "greedy", "refine"),
            "greedy"
        );
        assert_eq!(
            scheduler_for(WorkloadPattern::Linear, "greedy", "refine"),
            "greedy"
        );
        assert_eq!(
            scheduler_for(WorkloadPattern::Exponential, "greedy", "refine"),
            "refine"
        );
    }
}

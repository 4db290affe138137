//! Relevancy thresholds for ROC sweeps.

use serde::{Deserialize, Serialize};

use crate::config::MatchingParams;
use crate::track::TrackSet;
use crate::{Error, Result};

/// Offset of the sentinel threshold above the largest relevancy, relative to its magnitude.
pub const SENTINEL_EPSILON: f64 = 1e-6;

/// Upper bound on the number of thresholds a stepped range may produce.
pub const MAX_RANGE_THRESHOLDS: usize = 100_000;

/// Distinct relevancy values, thinned to roughly `budget`, plus a sentinel.
///
/// When there are more than `budget` distinct values a value is kept only if
/// it is farther than `(max - min) / budget` from the last kept value. A
/// budget of 0 disables thinning. The sentinel lies just above the maximum,
/// so the last row of a sweep detects nothing.
pub fn generate_roc_thresholds<I>(relevancies: I, budget: usize) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut values: Vec<f64> = relevancies.into_iter().filter(|v| v.is_finite()).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();

    let (Some(&min), Some(&max)) = (values.first(), values.last()) else {
        return Vec::new();
    };

    let mut thresholds = if budget > 0 && values.len() > budget {
        let step = (max - min) / budget as f64;
        let mut kept = vec![min];
        let mut last = min;
        for &v in &values[1..] {
            if v - last > step {
                kept.push(v);
                last = v;
            }
        }
        kept
    } else {
        values
    };

    thresholds.push(max + SENTINEL_EPSILON * max.abs().max(1.0));
    thresholds
}

/// Explicit threshold override, `"min[:max[:step]]"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    pub min: f64,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

impl ThresholdRange {
    pub fn parse(spec: &str) -> Result<Self> {
        let parse = |s: &str| -> Result<f64> {
            s.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("threshold range '{}': {}", spec, e))
            })
        };

        let parts: Vec<&str> = spec.trim().split(':').collect();
        let range = match parts.as_slice() {
            [min] => Self {
                min: parse(min)?,
                max: None,
                step: None,
            },
            [min, max] => Self {
                min: parse(min)?,
                max: Some(parse(max)?),
                step: None,
            },
            [min, max, step] => Self {
                min: parse(min)?,
                max: Some(parse(max)?),
                step: Some(parse(step)?),
            },
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "threshold range '{}' must look like min[:max[:step]]",
                    spec
                )))
            }
        };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        for value in [Some(self.min), self.max, self.step].into_iter().flatten() {
            if !value.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "threshold range bound {} is not finite",
                    value
                )));
            }
        }
        if let Some(max) = self.max {
            if max < self.min {
                return Err(Error::InvalidConfig(format!(
                    "threshold range max {} is below min {}",
                    max, self.min
                )));
            }
        }
        if let Some(step) = self.step {
            if step <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "threshold range step {} must be positive",
                    step
                )));
            }
            let steps = (self.max.unwrap_or(self.min) - self.min) / step;
            if steps >= MAX_RANGE_THRESHOLDS as f64 {
                return Err(Error::InvalidConfig(format!(
                    "threshold range step {} yields more than {} thresholds",
                    step, MAX_RANGE_THRESHOLDS
                )));
            }
        }
        Ok(())
    }

    /// Thresholds covered by the range.
    ///
    /// Without a step, `n` evenly spaced values from min to max inclusive. A
    /// step yields at most [`MAX_RANGE_THRESHOLDS`] values.
    pub fn thresholds(&self, n: usize) -> Vec<f64> {
        let Some(max) = self.max else {
            return vec![self.min];
        };
        match self.step {
            Some(step) => {
                let count = ((max - self.min) / step + 1e-9).floor() + 1.0;
                let count = count.min(MAX_RANGE_THRESHOLDS as f64) as usize;
                (0..count).map(|k| self.min + k as f64 * step).collect()
            }
            None if n < 2 || max == self.min => {
                let mut v = vec![self.min];
                if max > self.min {
                    v.push(max);
                }
                v
            }
            None => {
                let step = (max - self.min) / (n - 1) as f64;
                (0..n).map(|k| self.min + k as f64 * step).collect()
            }
        }
    }
}

/// Thresholds for a sweep over `computed`: the explicit override if configured,
/// otherwise generated from the tracks' relevancies with `n_roc_points` as budget.
pub fn roc_thresholds(computed: TrackSet<'_>, params: &MatchingParams) -> Vec<f64> {
    match &params.roc_thresholds {
        Some(range) => range.thresholds(params.n_roc_points),
        None => generate_roc_thresholds(
            computed.iter().map(|(_, t)| t.relevancy),
            params.n_roc_points,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distinct_values_plus_sentinel() {
        let t = generate_roc_thresholds([0.9, 0.1, 0.9, 0.5], 10);
        assert_eq!(t.len(), 4);
        assert_eq!(&t[..3], &[0.1, 0.5, 0.9]);
        assert!(t[3] > 0.9);
    }

    #[test]
    fn test_thinning_respects_budget() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let t = generate_roc_thresholds(values, 10);
        assert!(t.len() <= 11);
        assert_relative_eq!(t[0], 0.0);
        assert!(*t.last().unwrap() > 0.999);
        for w in t.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn test_zero_budget_disables_thinning() {
        let values: Vec<f64> = (0..50).map(f64::from).collect();
        assert_eq!(generate_roc_thresholds(values, 0).len(), 51);
    }

    #[test]
    fn test_empty_relevancies() {
        assert!(generate_roc_thresholds(Vec::new(), 10).is_empty());
    }

    #[test]
    fn test_range_parse() {
        assert_eq!(
            ThresholdRange::parse("0.5").unwrap().thresholds(100),
            vec![0.5]
        );
        let r = ThresholdRange::parse("0:1").unwrap();
        assert_eq!(r.thresholds(5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        let r = ThresholdRange::parse("0:1:0.25").unwrap();
        assert_eq!(r.thresholds(100).len(), 5);
        assert!(ThresholdRange::parse("1:0").is_err());
        assert!(ThresholdRange::parse("0:1:0").is_err());
        assert!(ThresholdRange::parse("0:1:2:3").is_err());
        assert!(ThresholdRange::parse("low").is_err());
    }

    #[test]
    fn test_range_threshold_count_is_bounded() {
        assert!(matches!(
            ThresholdRange::parse("0:1e18:1e-9"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(ThresholdRange::parse("0:inf:1").is_err());
        assert!(ThresholdRange::parse("0:NaN").is_err());
        assert_eq!(
            ThresholdRange::parse("0:99999:1").unwrap().thresholds(0).len(),
            MAX_RANGE_THRESHOLDS
        );

        let unchecked = ThresholdRange {
            min: 0.0,
            max: Some(1e18),
            step: Some(1e-9),
        };
        assert_eq!(unchecked.thresholds(0).len(), MAX_RANGE_THRESHOLDS);
    }
}

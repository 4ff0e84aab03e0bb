//! Shot boundary detection module

use crate::feature::FeatureRecord;
use crate::signal::{diff_abs, mean_std, Smoothing};
use log::*;

/// Which threshold triggered a cut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CutRule {
    /// A single frame reached the high threshold.
    High,
    /// `tau` consecutive frames stayed above the low threshold.
    Low,
}

/// Detected shot boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Cut {
    /// Index of the record the cut fired at.
    pub frame: usize,
    pub t: f64,
    pub score: f64,
    pub rule: CutRule,
}

/// Two-threshold shot boundary detector.
///
/// The detector builds a change metric out of absolute derivatives of smoothed features,
/// `M = wE * |ΔE| + wS * |ΔS| + wD * |Δdiv|`. A cut fires when `M` reaches the high threshold,
/// or stays above the low threshold for `tau` frames in a row. After a cut, the next `guard`
/// frames are ignored.
///
/// Thresholds are absolute if both `l1` and `l2` are given, otherwise they are derived from the
/// metric as `mean + k * std`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ShotDetection {
    pub l1: Option<f64>,
    pub l2: Option<f64>,
    pub k1: f64,
    pub k2: f64,
    pub tau: usize,
    pub guard: usize,
    /// `(wE, wS, wD)` weights.
    pub weights: (f64, f64, f64),
    pub smoothing: Smoothing,
}

impl Default for ShotDetection {
    fn default() -> Self {
        Self {
            l1: None,
            l2: None,
            k1: 2.5,
            k2: 1.5,
            tau: 3,
            guard: 8,
            weights: (1.0, 0.6, 0.2),
            smoothing: Smoothing::ema(3),
        }
    }
}

impl ShotDetection {
    /// Compute the change metric of every record.
    pub fn metric(&self, records: &[FeatureRecord]) -> Vec<f64> {
        let delta = |f: fn(&FeatureRecord) -> f64| {
            let x = records.iter().map(f).collect::<Vec<_>>();
            diff_abs(&self.smoothing.apply(&x))
        };

        let (we, ws, wd) = self.weights;

        let de = delta(|r| r.e);
        let ds = delta(|r| r.s);
        let dd = delta(|r| r.div);

        de.iter()
            .zip(&ds)
            .zip(&dd)
            .map(|((e, s), d)| we * e + ws * s + wd * d)
            .collect()
    }

    /// Get the `(high, low)` thresholds for a metric.
    pub fn thresholds(&self, metric: &[f64]) -> (f64, f64) {
        match (self.l1, self.l2) {
            (Some(l1), Some(l2)) => (l1, l2),
            _ => {
                let (mean, std) = mean_std(metric);
                (mean + self.k1 * std, mean + self.k2 * std)
            }
        }
    }

    pub fn detect(&self, records: &[FeatureRecord]) -> Vec<Cut> {
        let metric = self.metric(records);
        let (l1, l2) = self.thresholds(&metric);

        debug!("Shot thresholds: high {} low {}", l1, l2);

        let mut cuts = vec![];
        let mut last_cut: Option<usize> = None;

        for (i, &m) in metric.iter().enumerate() {
            if matches!(last_cut, Some(last) if i - last <= self.guard) {
                continue;
            }

            let cut = if m >= l1 {
                Some((m, CutRule::High))
            } else if self.tau > 0 && i + 1 >= self.tau {
                let window = &metric[i + 1 - self.tau..=i];
                if window.iter().all(|&v| v >= l2) {
                    Some((window.iter().sum::<f64>() / window.len() as f64, CutRule::Low))
                } else {
                    None
                }
            } else {
                None
            };

            if let Some((score, rule)) = cut {
                trace!("Cut at {} ({:?}, {})", i, rule, score);
                cuts.push(Cut {
                    frame: i,
                    t: records[i].t,
                    score,
                    rule,
                });
                last_cut = Some(i);
            }
        }

        cuts
    }
}

//! # Feature signal helpers

use nalgebra as na;

/// Smoothing filter kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum SmoothingKind {
    /// Exponential moving average, seeded with the first sample.
    Ema,
    /// Centered simple moving average.
    Sma,
}

/// Smoothing filter applied to a feature signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Smoothing {
    pub kind: SmoothingKind,
    /// EMA span, or SMA window length. Values below 1 are treated as 1.
    pub window: usize,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self::ema(5)
    }
}

impl Smoothing {
    pub fn ema(span: usize) -> Self {
        Self {
            kind: SmoothingKind::Ema,
            window: span,
        }
    }

    pub fn sma(window: usize) -> Self {
        Self {
            kind: SmoothingKind::Sma,
            window,
        }
    }

    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        let window = self.window.max(1);

        match self.kind {
            SmoothingKind::Ema => ema(x, window),
            SmoothingKind::Sma => sma(x, window),
        }
    }
}

fn ema(x: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);

    x.iter()
        .scan(None, |prev: &mut Option<f64>, &v| {
            let y = prev.map_or(v, |p| (1.0 - alpha) * p + alpha * v);
            *prev = Some(y);
            Some(y)
        })
        .collect()
}

fn sma(x: &[f64], window: usize) -> Vec<f64> {
    // The window is centered with the extra sample of even windows falling behind `i`.
    let ahead = (window - 1) / 2;

    (0..x.len())
        .map(|i| {
            let end = (i + ahead + 1).min(x.len());
            let start = (i + ahead + 1).saturating_sub(window);
            let part = &x[start..end];
            part.iter().sum::<f64>() / part.len() as f64
        })
        .collect()
}

/// Standardize a signal with its population standard deviation.
///
/// `eps` keeps constant signals from dividing by zero.
pub fn zscore(x: &[f64], eps: f64) -> Vec<f64> {
    let (mean, std) = mean_std(x);
    x.iter().map(|v| (v - mean) / (std + eps)).collect()
}

/// Absolute first difference, with the first sample set to zero.
pub fn diff_abs(x: &[f64]) -> Vec<f64> {
    x.first()
        .map(|_| 0.0)
        .into_iter()
        .chain(x.windows(2).map(|w| (w[1] - w[0]).abs()))
        .collect()
}

/// Mean and population standard deviation of a signal.
pub fn mean_std(x: &[f64]) -> (f64, f64) {
    if x.is_empty() {
        return (0.0, 0.0);
    }

    let v = na::DVector::from_column_slice(x);
    let mean = v.mean();
    // Two-pass variance. The one-pass form can go negative on constant signals.
    let var = v.add_scalar(-mean).norm_squared() / x.len() as f64;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn assert_all_approx(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (a, b) in a.iter().zip(b) {
            assert_approx_eq!(*a, *b);
        }
    }

    #[test]
    fn ema_recurrence() {
        // span 3 gives alpha 0.5
        let y = Smoothing::ema(3).apply(&[4.0, 0.0, 2.0, 2.0]);
        assert_all_approx(&y, &[4.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn ema_span_one_is_identity() {
        let x = [1.0, -3.0, 7.5];
        assert_all_approx(&Smoothing::ema(1).apply(&x), &x);
        assert_all_approx(&Smoothing::ema(0).apply(&x), &x);
    }

    #[test]
    fn sma_odd_window() {
        let y = Smoothing::sma(3).apply(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_all_approx(&y, &[1.5, 2.0, 3.0, 4.0, 4.5]);
    }

    #[test]
    fn sma_even_window() {
        // Window of 4 covers [i - 2, i + 1].
        let y = Smoothing::sma(4).apply(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_all_approx(&y, &[1.5, 2.0, 2.5, 3.5, 4.0]);
    }

    #[test]
    fn sma_window_larger_than_signal() {
        let y = Smoothing::sma(9).apply(&[2.0, 4.0]);
        assert_all_approx(&y, &[3.0, 3.0]);
    }

    #[test]
    fn zscore_population() {
        let z = zscore(&[1.0, 2.0, 3.0, 4.0], 0.0);
        let std = 1.25f64.sqrt();
        assert_all_approx(&z, &[-1.5 / std, -0.5 / std, 0.5 / std, 1.5 / std]);
    }

    #[test]
    fn zscore_constant() {
        let z = zscore(&[3.0; 5], 1e-12);
        assert_all_approx(&z, &[0.0; 5]);
        assert!(zscore(&[], 1e-12).is_empty());
    }

    #[test]
    fn zscore_inexact_constant() {
        // 0.13 has no exact binary representation.
        let z = zscore(&[0.13; 7], 1e-12);
        assert_eq!(z.len(), 7);
        z.iter().for_each(|v| assert_approx_eq!(*v, 0.0, 1e-3));
    }

    #[test]
    fn constant_std_is_never_nan() {
        for k in 1..2000 {
            let v = k as f64 * 0.1 + 0.03;
            for n in [3, 5, 7, 10, 30] {
                let (mean, std) = mean_std(&vec![v; n]);
                assert!((0.0..1e-9).contains(&std), "std of {} x {} is {}", v, n, std);
                assert_approx_eq!(mean, v, 1e-9);
            }
        }
    }

    #[test]
    fn absolute_difference() {
        assert_all_approx(&diff_abs(&[1.0, 4.0, 2.0, 2.0]), &[0.0, 3.0, 2.0, 0.0]);
        assert_all_approx(&diff_abs(&[5.0]), &[0.0]);
        assert!(diff_abs(&[]).is_empty());
    }

    #[test]
    fn stats() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_approx_eq!(mean, 5.0);
        assert_approx_eq!(std, 2.0);
        assert_eq!(mean_std(&[]), (0.0, 0.0));
    }
}

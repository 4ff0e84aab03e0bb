//! # Actionness scoring
//!
//! Heuristic per-frame measure of how much is going on in the video:
//!
//! `A = wE * z(smooth(E)) + wS * z(smooth(S)) + wD * z(|Δ smooth(div)|)`
//!
//! where `z` standardizes a signal over the whole sequence.

use crate::feature::FeatureRecord;
use crate::signal::{diff_abs, zscore, Smoothing};

const ZSCORE_EPS: f64 = 1e-12;

/// Actionness parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ActionnessParams {
    /// Smoothing applied to every feature before scoring. `None` scores raw features.
    pub smoothing: Option<Smoothing>,
    /// `(wE, wS, wD)` weights.
    pub weights: (f64, f64, f64),
    /// Include the divergence derivative term.
    pub include_derivatives: bool,
}

impl Default for ActionnessParams {
    fn default() -> Self {
        Self {
            smoothing: Some(Smoothing::ema(5)),
            weights: (1.0, 1.0, 0.25),
            include_derivatives: true,
        }
    }
}

/// Compute the actionness of every record.
pub fn compute_actionness(records: &[FeatureRecord], params: &ActionnessParams) -> Vec<f64> {
    let smooth = |f: fn(&FeatureRecord) -> f64| {
        let x = records.iter().map(f).collect::<Vec<_>>();
        match &params.smoothing {
            Some(s) => s.apply(&x),
            None => x,
        }
    };

    let (we, ws, wd) = params.weights;

    let e = zscore(&smooth(|r| r.e), ZSCORE_EPS);
    let s = zscore(&smooth(|r| r.s), ZSCORE_EPS);

    let mut out = e
        .iter()
        .zip(&s)
        .map(|(e, s)| e * we + s * ws)
        .collect::<Vec<_>>();

    if params.include_derivatives {
        let ddiv = zscore(&diff_abs(&smooth(|r| r.div)), ZSCORE_EPS);
        out.iter_mut().zip(ddiv).for_each(|(a, d)| *a += d * wd);
    }

    out
}

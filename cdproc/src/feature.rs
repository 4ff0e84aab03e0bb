//! # Per-frame motion features

use crate::decoder::{DecodedFrame, StreamInfo};
use crate::motion::{MotionStats, Normalization};
use crate::time::FrameClock;

/// Motion signature of a single decoded frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct FeatureRecord {
    /// Timestamp in seconds.
    pub t: f64,
    /// Accumulated squared motion magnitude.
    #[cfg_attr(feature = "serde", serde(rename = "E"))]
    pub e: f64,
    /// Accumulated absolute motion magnitude.
    #[cfg_attr(feature = "serde", serde(rename = "S"))]
    pub s: f64,
    /// Directional divergence proxy.
    pub div: f64,
}

impl FeatureRecord {
    /// Record holding only a timestamp.
    pub fn at(t: f64) -> Self {
        Self {
            t,
            ..Default::default()
        }
    }
}

/// Turns decoded frames into feature records.
pub struct FeatureAggregator {
    clock: FrameClock,
    mode: Normalization,
}

impl FeatureAggregator {
    pub fn new(stream: &StreamInfo, mode: Normalization) -> Self {
        Self {
            clock: FrameClock::from_stream(stream),
            mode,
        }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Reduce a frame's motion vectors and resolve its timestamp.
    pub fn aggregate(&mut self, frame: &dyn DecodedFrame) -> FeatureRecord {
        let stats: MotionStats = frame.motion_vectors().collect();
        let (e, s, div) = stats.finish(self.mode);

        FeatureRecord {
            t: self.clock.resolve(frame.best_effort_timestamp()),
            e,
            s,
            div,
        }
    }

    /// Resolve only the timestamp of a frame, leaving motion at zero.
    ///
    /// Used for frames drained at the end of stream, whose motion is never inspected.
    pub fn timestamp_only(&mut self, frame: &dyn DecodedFrame) -> FeatureRecord {
        FeatureRecord::at(self.clock.resolve(frame.best_effort_timestamp()))
    }
}

/// Stable-sort records by timestamp, if they are not already in order.
///
/// Returns whether the records had to be reordered.
pub fn sort_by_time(records: &mut [FeatureRecord]) -> bool {
    if records.windows(2).all(|w| w[0].t <= w[1].t) {
        return false;
    }

    records.sort_by(|a, b| a.t.total_cmp(&b.t));
    true
}

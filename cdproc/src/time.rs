//! # Frame timestamps

use crate::decoder::{Rational, StreamInfo};

/// Frame rate assumed when the stream does not report one.
pub const DEFAULT_FRAMERATE: f64 = 30.0;

/// Resolves frame timestamps in seconds.
///
/// The clock counts every processed frame, in decode order, across both the decode and the flush
/// phases. Frames lacking a usable timestamp are placed at `index / framerate`.
#[derive(Clone, Debug)]
pub struct FrameClock {
    time_base: Option<f64>,
    framerate: f64,
    frame_index: u64,
}

impl FrameClock {
    pub fn new(time_base: Rational, avg_frame_rate: Rational, r_frame_rate: Rational) -> Self {
        let framerate = avg_frame_rate
            .positive()
            .or_else(|| r_frame_rate.positive())
            .unwrap_or(DEFAULT_FRAMERATE);

        Self {
            time_base: time_base.to_f64(),
            framerate,
            frame_index: 0,
        }
    }

    pub fn from_stream(stream: &StreamInfo) -> Self {
        Self::new(
            stream.time_base,
            stream.avg_frame_rate,
            stream.r_frame_rate,
        )
    }

    /// Framerate used for synthesized timestamps.
    pub fn framerate(&self) -> f64 {
        self.framerate
    }

    /// Number of frames resolved so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Resolve the timestamp of the next frame and advance the counter.
    pub fn resolve(&mut self, pts: Option<i64>) -> f64 {
        let idx = self.frame_index;
        self.frame_index += 1;

        match (pts, self.time_base) {
            (Some(pts), Some(time_base)) => pts as f64 * time_base,
            _ => idx as f64 / self.framerate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn pts_in_seconds() {
        let mut clock = FrameClock::new(
            Rational::new(1, 12800),
            Rational::new(25, 1),
            Rational::new(25, 1),
        );

        assert_approx_eq!(clock.resolve(Some(0)), 0.0);
        assert_approx_eq!(clock.resolve(Some(512)), 0.04);
        assert_approx_eq!(clock.resolve(Some(1024)), 0.08);
        assert_eq!(clock.frame_index(), 3);
    }

    #[test]
    fn nominal_rate_fallback() {
        let mut clock = FrameClock::new(
            Rational::new(1, 90000),
            Rational::new(0, 0),
            Rational::new(25, 1),
        );

        assert_approx_eq!(clock.framerate(), 25.0);

        for k in 0..50 {
            assert_approx_eq!(clock.resolve(None), k as f64 / 25.0);
        }
    }

    #[test]
    fn default_rate() {
        let clock = FrameClock::new(
            Rational::new(1, 1000),
            Rational::new(0, 1),
            Rational::new(0, 0),
        );
        assert_approx_eq!(clock.framerate(), DEFAULT_FRAMERATE);

        let clock = FrameClock::new(
            Rational::new(1, 1000),
            Rational::new(-30, 1),
            Rational::new(-1, 0),
        );
        assert_approx_eq!(clock.framerate(), DEFAULT_FRAMERATE);
    }

    #[test]
    fn average_rate_preferred() {
        let clock = FrameClock::new(
            Rational::new(1, 1000),
            Rational::new(30000, 1001),
            Rational::new(60, 1),
        );
        assert_approx_eq!(clock.framerate(), 30000.0 / 1001.0);
    }

    #[test]
    fn counter_advances_on_every_frame() {
        let mut clock = FrameClock::new(
            Rational::new(1, 10),
            Rational::new(10, 1),
            Rational::new(10, 1),
        );

        assert_approx_eq!(clock.resolve(Some(0)), 0.0);
        assert_approx_eq!(clock.resolve(Some(1)), 0.1);
        // The third frame synthesizes from its own index, not from the last pts.
        assert_approx_eq!(clock.resolve(None), 0.2);
        assert_approx_eq!(clock.resolve(None), 0.3);
    }

    #[test]
    fn invalid_time_base_synthesizes() {
        let mut clock = FrameClock::new(
            Rational::new(0, 0),
            Rational::new(20, 1),
            Rational::new(0, 0),
        );

        assert_approx_eq!(clock.resolve(Some(1234)), 0.0);
        assert_approx_eq!(clock.resolve(Some(5678)), 0.05);
    }
}

//! # Compressed-Domain Motion Processing
//!
//! This library turns codec-exported motion vectors into a per-frame motion signature. Every
//! decoded frame yields one [`FeatureRecord`](feature::FeatureRecord) holding a timestamp and
//! three scalars: accumulated squared motion (`E`), accumulated absolute motion (`S`) and a
//! directional divergence proxy (`div`).
//!
//! Decoding itself is delegated to a [`PacketDecoder`](decoder::PacketDecoder) backend. The
//! [`driver`] module runs the packet/frame state machine over any such backend, while the
//! [`signal`], [`actionness`] and [`detection`] modules post-process the produced sequence.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use cdproc::prelude::v1::*;
//! ```

pub mod actionness;
pub mod decoder;
pub mod detection;
pub mod driver;
pub mod error;
pub mod feature;
pub mod motion;
pub mod signal;
pub mod time;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            actionness::{compute_actionness, ActionnessParams},
            decoder::{DecodedFrame, PacketDecoder, PacketRead, Pull, Rational, StreamInfo},
            detection::{Cut, CutRule, ShotDetection},
            driver::{extract, ExtractOptions, FeatureStream},
            error::{Error, Result},
            feature::{sort_by_time, FeatureAggregator, FeatureRecord},
            motion::{MotionStats, MotionVector, Normalization, Reference},
            signal::{Smoothing, SmoothingKind},
            time::FrameClock,
        };
    }
}

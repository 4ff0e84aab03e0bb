//! # Decoder backends

use crate::error::Error;
use crate::motion::MotionVector;

/// Rational number, as used by containers for time bases and frame rates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Convert to a floating point value.
    ///
    /// Returns `None` if either term is zero, which containers use to mark unknown values.
    pub fn to_f64(self) -> Option<f64> {
        if self.num == 0 || self.den == 0 {
            None
        } else {
            Some(self.num as f64 / self.den as f64)
        }
    }

    /// Convert to a strictly positive floating point value.
    pub fn positive(self) -> Option<f64> {
        self.to_f64().filter(|v| *v > 0.0)
    }
}

/// Metadata of the selected video stream.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct StreamInfo {
    /// Index of the stream within its container.
    pub index: i32,
    pub codec_name: String,
    pub time_base: Rational,
    pub avg_frame_rate: Rational,
    pub r_frame_rate: Rational,
}

/// Frame borrowed from a decoder.
///
/// Implementations expose the frame storage only for the duration of a
/// [`PacketDecoder::receive_frame`] visit. Anything needed afterwards has to be copied out.
pub trait DecodedFrame {
    /// Decoder-estimated presentation timestamp, in stream time base units.
    ///
    /// Returns `None` if the decoder could not estimate one.
    fn best_effort_timestamp(&self) -> Option<i64>;

    /// Motion vectors attached to the frame.
    ///
    /// Frames without motion vector side data, or with a payload too small to hold a single
    /// vector, yield nothing.
    fn motion_vectors(&self) -> Box<dyn Iterator<Item = MotionVector> + '_>;
}

/// Outcome of reading the next packet from the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketRead {
    /// A packet of the selected stream is ready to be submitted.
    Selected,
    /// A packet of another stream was read and already released.
    Skipped,
    /// No more packets can be read, either because of the end of file or a read error.
    Exhausted,
}

/// Outcome of pulling a frame out of the decoder.
#[derive(Debug)]
pub enum Pull<T> {
    /// A frame was decoded and visited.
    Frame(T),
    /// The decoder needs more packets before it can output another frame.
    NeedsInput,
    /// The decoder has been fully drained.
    EndOfStream,
    /// Decoding failed.
    Failed(Error),
}

/// Packet based decoder with motion vector export enabled.
///
/// This is the seam between the feature pipeline and a native media framework. The decoder owns
/// a single packet buffer and a single frame buffer, both reused across iterations.
pub trait PacketDecoder {
    /// Get the selected video stream.
    fn stream_info(&self) -> &StreamInfo;

    /// Read the next packet from the container into the packet buffer.
    fn read_packet(&mut self) -> PacketRead;

    /// Submit the buffered packet to the decoder.
    ///
    /// The packet buffer is released whether or not the submission succeeds.
    fn send_packet(&mut self) -> Result<(), Error>;

    /// Signal the end of input, so that the decoder releases any buffered frames.
    fn send_eof(&mut self) -> Result<(), Error>;

    /// Pull the next decoded frame and pass it to `visit`.
    ///
    /// The frame is released before this function returns.
    fn receive_frame<T>(&mut self, visit: impl FnOnce(&dyn DecodedFrame) -> T) -> Pull<T>;
}

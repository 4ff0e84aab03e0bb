//! # Extraction errors

use thiserror::Error;

/// Failures raised while extracting motion features.
///
/// Everything up to and including [`Error::DecoderOpen`] happens during stream setup and aborts
/// the extraction. [`Error::PacketSubmit`] and [`Error::FrameReceive`] are raised mid-stream and
/// get absorbed by the driver, which keeps the records produced so far.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to open input {path} ({code})")]
    Open { path: String, code: i32 },
    #[error("unable to find stream info ({0})")]
    Probe(i32),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("no decoder available for codec {0}")]
    UnsupportedCodec(String),
    #[error("failed to copy codec parameters ({0})")]
    ContextInit(i32),
    #[error("failed to open decoder ({0})")]
    DecoderOpen(i32),
    #[error("failed to allocate {0}")]
    Alloc(&'static str),
    #[error("decoder rejected packet ({0})")]
    PacketSubmit(i32),
    #[error("failed to receive frame ({0})")]
    FrameReceive(i32),
}

impl Error {
    /// Whether the error can be absorbed by the decode loop.
    pub fn is_mid_stream(&self) -> bool {
        matches!(self, Self::PacketSubmit(_) | Self::FrameReceive(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

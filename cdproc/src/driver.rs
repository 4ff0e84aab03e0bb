//! # Decode driver
//!
//! Runs a [`PacketDecoder`] to exhaustion and yields one [`FeatureRecord`] per decoded frame.
//!
//! Decoding happens in two phases. While reading, every packet of the selected stream is
//! submitted and the decoder is drained until it asks for more input. Once the container runs
//! out of packets (or the decoder rejects one), the end of stream is signalled and the frames the
//! decoder still buffers are flushed out.
//!
//! Only setup errors are fatal, and those happen before a decoder is handed over. Errors raised
//! during decoding end the affected phase early, keeping every record produced so far.

use crate::decoder::{PacketDecoder, PacketRead, Pull};
use crate::feature::{FeatureAggregator, FeatureRecord};
use crate::motion::Normalization;
use log::*;

/// Extraction settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ExtractOptions {
    /// Normalize sums by the number of motion vectors in the frame.
    pub average: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { average: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Reading,
    DrainingDecoder,
    Flushing { eof_sent: bool },
    Done,
}

/// Iterator over the feature records of a decoder's stream.
pub struct FeatureStream<D> {
    decoder: D,
    aggregator: FeatureAggregator,
    state: State,
}

impl<D: PacketDecoder> FeatureStream<D> {
    pub fn new(decoder: D, options: ExtractOptions) -> Self {
        let aggregator =
            FeatureAggregator::new(decoder.stream_info(), Normalization::from(options.average));

        Self {
            decoder,
            aggregator,
            state: State::Reading,
        }
    }

    /// Whether the stream has been fully drained.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Number of records produced so far.
    pub fn frames(&self) -> u64 {
        self.aggregator.clock().frame_index()
    }

    /// Release the decoder.
    pub fn into_inner(self) -> D {
        self.decoder
    }

    fn read(&mut self) -> State {
        match self.decoder.read_packet() {
            PacketRead::Selected => match self.decoder.send_packet() {
                Ok(()) => State::DrainingDecoder,
                Err(e) => {
                    warn!("{}, flushing early", e);
                    State::Flushing { eof_sent: false }
                }
            },
            PacketRead::Skipped => State::Reading,
            PacketRead::Exhausted => {
                debug!("Container exhausted after {} frames", self.frames());
                State::Flushing { eof_sent: false }
            }
        }
    }

    fn drain(&mut self) -> (State, Option<FeatureRecord>) {
        let aggregator = &mut self.aggregator;

        match self.decoder.receive_frame(|f| aggregator.aggregate(f)) {
            Pull::Frame(rec) => (State::DrainingDecoder, Some(rec)),
            Pull::NeedsInput | Pull::EndOfStream => (State::Reading, None),
            Pull::Failed(e) => {
                warn!("{}, skipping to next packet", e);
                (State::Reading, None)
            }
        }
    }

    fn flush(&mut self) -> (State, Option<FeatureRecord>) {
        let aggregator = &mut self.aggregator;

        match self.decoder.receive_frame(|f| aggregator.timestamp_only(f)) {
            Pull::Frame(rec) => (State::Flushing { eof_sent: true }, Some(rec)),
            Pull::NeedsInput | Pull::EndOfStream => (State::Done, None),
            Pull::Failed(e) => {
                warn!("{} while flushing", e);
                (State::Done, None)
            }
        }
    }
}

impl<D: PacketDecoder> Iterator for FeatureStream<D> {
    type Item = FeatureRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (state, rec) = match self.state {
                State::Reading => (self.read(), None),
                State::DrainingDecoder => self.drain(),
                State::Flushing { eof_sent: false } => {
                    if let Err(e) = self.decoder.send_eof() {
                        debug!("{} while signalling end of stream", e);
                    }
                    (State::Flushing { eof_sent: true }, None)
                }
                State::Flushing { eof_sent: true } => self.flush(),
                State::Done => return None,
            };

            if state != self.state {
                trace!("{:?} -> {:?}", self.state, state);
                self.state = state;
            }

            if rec.is_some() {
                return rec;
            }
        }
    }
}

/// Extract feature records of every frame the decoder emits.
pub fn extract<D: PacketDecoder>(decoder: D, options: ExtractOptions) -> Vec<FeatureRecord> {
    FeatureStream::new(decoder, options).collect()
}

//! FFMPEG's AV motion feature extractor
//!
//! Decodes the best video stream of a container with motion vector export enabled, and feeds the
//! frames into [`cdproc`]'s feature pipeline.

use cdproc::prelude::v1::*;
use ffmpeg_sys_next::*;
use libc::c_int;
use log::*;
use std::ffi::{CStr, CString};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::{mem, ptr, slice};

/// Extract motion features of every frame in a video file.
///
/// # Arguments
///
/// * `path` - path to the media container.
/// * `average` - normalize per-frame sums by the number of motion vectors.
pub fn extract_features(path: impl AsRef<Path>, average: bool) -> Result<Vec<FeatureRecord>> {
    let decoder = AvDecoder::open(path)?;
    Ok(extract(decoder, ExtractOptions { average }))
}

/// Opened media container with its selected video stream.
pub struct AvSource {
    fmt_ctx: &'static mut AVFormatContext,
    path: CString,
    stream: StreamInfo,
}

impl Drop for AvSource {
    fn drop(&mut self) {
        // SAFETY: the reference will be dangling,
        // but after the drop nobody will read it.
        unsafe { avformat_close_input(&mut (self.fmt_ctx as *mut _)) };
    }
}

impl AvSource {
    /// Open a container and select its best video stream.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let display = path.as_ref().to_string_lossy().into_owned();

        let c_path = CString::new(display.as_bytes()).map_err(|_| Error::Open {
            path: display.clone(),
            code: AVERROR(libc::EINVAL),
        })?;

        let mut fmt_ctx = ptr::null_mut();

        // On failure the context gets freed by libavformat.
        match unsafe {
            avformat_open_input(
                &mut fmt_ctx,
                c_path.as_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        } {
            e if e < 0 => {
                return Err(Error::Open {
                    path: display,
                    code: e,
                })
            }
            _ => {}
        }

        let fmt_ctx = unsafe { fmt_ctx.as_mut() }.ok_or(Error::Alloc("format context"))?;

        let mut source = Self {
            fmt_ctx,
            path: c_path,
            stream: Default::default(),
        };

        match unsafe { avformat_find_stream_info(source.fmt_ctx(), ptr::null_mut()) } {
            e if e < 0 => return Err(Error::Probe(e)),
            _ => {}
        }

        let index = match unsafe {
            av_find_best_stream(
                source.fmt_ctx(),
                AVMediaType::AVMEDIA_TYPE_VIDEO,
                -1,
                -1,
                ptr::null_mut(),
                0,
            )
        } {
            e if e < 0 => {
                debug!("Failed to find a video stream ({})", e);
                return Err(Error::NoVideoStream);
            }
            i => i,
        };

        let stream = unsafe { (*source.fmt_ctx.streams.offset(index as _)).as_ref() }
            .ok_or(Error::NoVideoStream)?;
        let codecpar = unsafe { stream.codecpar.as_ref() }.ok_or(Error::NoVideoStream)?;

        source.stream = StreamInfo {
            index,
            codec_name: codec_name(codecpar.codec_id),
            time_base: rational(stream.time_base),
            avg_frame_rate: rational(stream.avg_frame_rate),
            r_frame_rate: rational(stream.r_frame_rate),
        };

        debug!("Selected stream: {:?}", source.stream);

        Ok(source)
    }

    pub fn stream_info(&self) -> &StreamInfo {
        &self.stream
    }

    /// Codec parameters of the selected stream.
    fn codec_parameters(&self) -> Option<&AVCodecParameters> {
        unsafe {
            (*self.fmt_ctx.streams.offset(self.stream.index as _))
                .as_ref()
                .and_then(|s| s.codecpar.as_ref())
        }
    }

    fn fmt_ctx(&mut self) -> &mut AVFormatContext {
        &mut *self.fmt_ctx
    }

    pub fn dump_format(&mut self) {
        let path = self.path.as_ptr();
        unsafe { av_dump_format(self.fmt_ctx(), 0, path, 0) };
    }
}

/// Decoding context configured to export motion vectors.
pub struct CodecContext(&'static mut AVCodecContext);

impl Drop for CodecContext {
    fn drop(&mut self) {
        // SAFETY: the reference will be dangling,
        // but after the drop nobody will read it.
        unsafe { avcodec_free_context(&mut (self.0 as *mut _)) };
    }
}

impl Deref for CodecContext {
    type Target = AVCodecContext;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for CodecContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl CodecContext {
    /// Open a decoder for the selected stream of `source`.
    pub fn open(source: &AvSource) -> Result<Self> {
        let codecpar = source.codec_parameters().ok_or(Error::NoVideoStream)?;

        let decoder: *const AVCodec = unsafe { avcodec_find_decoder(codecpar.codec_id) };

        if decoder.is_null() {
            return Err(Error::UnsupportedCodec(source.stream.codec_name.clone()));
        }

        let mut codec_ctx = unsafe { avcodec_alloc_context3(decoder).as_mut() }
            .map(Self)
            .ok_or(Error::Alloc("codec context"))?;

        match unsafe { avcodec_parameters_to_context(&mut *codec_ctx, codecpar) } {
            e if e < 0 => return Err(Error::ContextInit(e)),
            _ => {}
        }

        // Has to be set before opening, the decoder reads it only once.
        codec_ctx.flags2 |= AV_CODEC_FLAG2_EXPORT_MVS as c_int;

        match unsafe { avcodec_open2(&mut *codec_ctx, decoder, ptr::null_mut()) } {
            e if e < 0 => return Err(Error::DecoderOpen(e)),
            _ => {}
        }

        Ok(codec_ctx)
    }
}

struct AvPacket(&'static mut AVPacket);

impl Drop for AvPacket {
    fn drop(&mut self) {
        unsafe { av_packet_free(&mut (self.0 as *mut _)) };
    }
}

impl Deref for AvPacket {
    type Target = AVPacket;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for AvPacket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl AvPacket {
    fn try_new() -> Result<Self> {
        unsafe { av_packet_alloc().as_mut() }
            .map(Self)
            .ok_or(Error::Alloc("packet"))
    }

    fn unref(&mut self) {
        unsafe { av_packet_unref(&mut **self) };
    }
}

struct AvFrame(&'static mut AVFrame);

impl Drop for AvFrame {
    fn drop(&mut self) {
        unsafe { av_frame_free(&mut (self.0 as *mut _)) };
    }
}

impl AvFrame {
    fn try_new() -> Result<Self> {
        unsafe { av_frame_alloc().as_mut() }
            .map(Self)
            .ok_or(Error::Alloc("frame"))
    }
}

/// Decoded frame, unreferenced on drop.
struct RefFrame<'a> {
    frame: &'a mut AVFrame,
}

impl<'a> Drop for RefFrame<'a> {
    fn drop(&mut self) {
        unsafe { av_frame_unref(self.frame) };
    }
}

impl<'a> RefFrame<'a> {
    fn receive(codec_ctx: &mut AVCodecContext, frame: &'a mut AVFrame) -> Pull<Self> {
        match unsafe { avcodec_receive_frame(codec_ctx, frame) } {
            e if e == AVERROR(libc::EAGAIN) => Pull::NeedsInput,
            e if e == AVERROR_EOF => Pull::EndOfStream,
            e if e < 0 => Pull::Failed(Error::FrameReceive(e)),
            _ => Pull::Frame(Self { frame }),
        }
    }
}

impl<'a> Deref for RefFrame<'a> {
    type Target = AVFrame;

    fn deref(&self) -> &Self::Target {
        self.frame
    }
}

impl<'a> DecodedFrame for RefFrame<'a> {
    fn best_effort_timestamp(&self) -> Option<i64> {
        Some(self.frame.best_effort_timestamp).filter(|&ts| ts != AV_NOPTS_VALUE)
    }

    fn motion_vectors(&self) -> Box<dyn Iterator<Item = MotionVector> + '_> {
        let side_data = unsafe {
            av_frame_get_side_data(&**self, AVFrameSideDataType::AV_FRAME_DATA_MOTION_VECTORS)
                .as_ref()
        };

        let motion_vectors = side_data.map(side_data_motion_vectors).unwrap_or(&[]);

        trace!("Frame has {} MVs", motion_vectors.len());

        Box::new(motion_vectors.iter().map(motion_vector))
    }
}

fn motion_vector(mv: &AVMotionVector) -> MotionVector {
    MotionVector::new(mv.motion_x, mv.motion_y, Reference::from_source(mv.source))
}

/// Interpret a motion vector side data payload.
///
/// Null payloads, and payloads too small to hold a single vector, yield an empty slice. Trailing
/// bytes that do not form a whole vector are ignored.
pub fn side_data_motion_vectors(side_data: &AVFrameSideData) -> &[AVMotionVector] {
    let count = side_data.size as usize / mem::size_of::<AVMotionVector>();

    if side_data.data.is_null() || count == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(side_data.data as *const AVMotionVector, count) }
    }
}

/// FFmpeg backed [`PacketDecoder`].
///
/// Fields drop in declaration order, releasing the decoder session before the container.
pub struct AvDecoder {
    codec_ctx: CodecContext,
    packet: AvPacket,
    frame: AvFrame,
    source: AvSource,
}

impl AvDecoder {
    /// Open a media file for motion vector decoding.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let source = AvSource::open(path)?;
        let codec_ctx = CodecContext::open(&source)?;
        let packet = AvPacket::try_new()?;
        let frame = AvFrame::try_new()?;

        Ok(Self {
            codec_ctx,
            packet,
            frame,
            source,
        })
    }

    pub fn dump_format(&mut self) {
        self.source.dump_format()
    }
}

impl PacketDecoder for AvDecoder {
    fn stream_info(&self) -> &StreamInfo {
        self.source.stream_info()
    }

    fn read_packet(&mut self) -> PacketRead {
        match unsafe { av_read_frame(self.source.fmt_ctx(), &mut *self.packet) } {
            e if e == AVERROR_EOF => PacketRead::Exhausted,
            e if e < 0 => {
                warn!("Failed to read packet ({}), ending stream", e);
                PacketRead::Exhausted
            }
            _ => {
                trace!(
                    "Read packet: {} {}",
                    self.packet.stream_index,
                    self.packet.size
                );

                if self.packet.stream_index == self.source.stream_info().index {
                    PacketRead::Selected
                } else {
                    self.packet.unref();
                    PacketRead::Skipped
                }
            }
        }
    }

    fn send_packet(&mut self) -> Result<()> {
        let ret = unsafe { avcodec_send_packet(&mut *self.codec_ctx, &*self.packet) };
        self.packet.unref();

        match ret {
            e if e < 0 => Err(Error::PacketSubmit(e)),
            _ => Ok(()),
        }
    }

    fn send_eof(&mut self) -> Result<()> {
        match unsafe { avcodec_send_packet(&mut *self.codec_ctx, ptr::null()) } {
            e if e < 0 => Err(Error::PacketSubmit(e)),
            _ => Ok(()),
        }
    }

    fn receive_frame<T>(&mut self, visit: impl FnOnce(&dyn DecodedFrame) -> T) -> Pull<T> {
        match RefFrame::receive(&mut self.codec_ctx, self.frame.0) {
            Pull::Frame(frame) => Pull::Frame(visit(&frame)),
            Pull::NeedsInput => Pull::NeedsInput,
            Pull::EndOfStream => Pull::EndOfStream,
            Pull::Failed(e) => Pull::Failed(e),
        }
    }
}

fn rational(r: AVRational) -> Rational {
    Rational::new(r.num, r.den)
}

fn codec_name(id: AVCodecID) -> String {
    unsafe { CStr::from_ptr(avcodec_get_name(id)) }
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side_data(data: *mut u8, size: usize) -> AVFrameSideData {
        let mut side_data: AVFrameSideData = unsafe { mem::zeroed() };
        side_data.data = data;
        side_data.size = size as _;
        side_data
    }

    fn vector(source: i32, motion_x: i32, motion_y: i32) -> AVMotionVector {
        let mut mv: AVMotionVector = unsafe { mem::zeroed() };
        mv.source = source;
        mv.motion_x = motion_x;
        mv.motion_y = motion_y;
        mv.motion_scale = 1;
        mv
    }

    #[test]
    fn null_side_data() {
        let sd = side_data(ptr::null_mut(), 4096);
        assert!(side_data_motion_vectors(&sd).is_empty());
    }

    #[test]
    fn undersized_side_data() {
        let mut mvs = vec![vector(-1, 3, 4)];
        let size = mem::size_of::<AVMotionVector>() - 1;
        let sd = side_data(mvs.as_mut_ptr() as *mut u8, size);

        assert!(side_data_motion_vectors(&sd).is_empty());
    }

    #[test]
    fn whole_vectors_only() {
        let mut mvs = vec![vector(0, 3, 4), vector(-1, -1, 2), vector(1, 8, 8)];
        let size = mem::size_of::<AVMotionVector>() * 2 + 3;
        let sd = side_data(mvs.as_mut_ptr() as *mut u8, size);

        let parsed = side_data_motion_vectors(&sd);

        assert_eq!(parsed.len(), 2);
        assert_eq!((parsed[0].motion_x, parsed[0].motion_y), (3, 4));
        assert_eq!((parsed[1].motion_x, parsed[1].motion_y), (-1, 2));
    }

    #[test]
    fn side_data_into_features() {
        let mut mvs = vec![vector(0, 3, 4), vector(-1, -1, 2)];
        let size = mem::size_of::<AVMotionVector>() * mvs.len();
        let sd = side_data(mvs.as_mut_ptr() as *mut u8, size);

        let stats: MotionStats = side_data_motion_vectors(&sd).iter().map(motion_vector).collect();

        assert_eq!(stats.count, 2);
        assert_eq!(stats.finish(Normalization::Total), (30.0, 10.0, 4.0));
    }

    #[test]
    fn missing_file() {
        let path = std::env::temp_dir().join("cdproc-av-does-not-exist.mp4");

        assert!(matches!(
            AvDecoder::open(&path),
            Err(Error::Open { .. })
        ));
        assert!(matches!(
            extract_features(&path, true),
            Err(Error::Open { .. })
        ));
    }

    #[test]
    fn interior_nul_in_path() {
        assert!(matches!(
            AvSource::open("bad\0path.mp4"),
            Err(Error::Open { .. })
        ));
    }
}

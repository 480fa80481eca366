//! FFmpeg-based clip encoding
//!
//! Clips are re-encoded with the built-in MPEG-4 Part 2 encoder into an AVI
//! container (the XVID-compatible pairing every player understands).
//!
//! The flow:
//!   1. decoded frame (any pixel format) or RGB image → `frame::Video`
//!   2. swscale → YUV420P
//!   3. MPEG-4 encoder → packets, rescaled to the stream time base
//!   4. interleaved write, trailer on `finish`

use crate::video_reader::init_ffmpeg;
use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::{Path, PathBuf};

const ENCODER_NAME: &str = "mpeg4";

/// Writes consecutive frames into one playable clip file
pub struct ClipWriter {
    path: PathBuf,
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    scaler: Option<YuvScaler>,
    next_pts: i64,
    frames_written: usize,
}

struct YuvScaler {
    source: ffmpeg::format::Pixel,
    context: ffmpeg::software::scaling::Context,
}

impl ClipWriter {
    /// Creates the clip file and writes the container header.
    ///
    /// `rate` is the frame rate of the clip; frames are timestamped
    /// consecutively from zero.
    pub fn create(
        path: &Path,
        width: u32,
        height: u32,
        rate: ffmpeg::Rational,
        bit_rate: usize,
    ) -> Result<Self> {
        init_ffmpeg()?;

        if width == 0 || height == 0 {
            return Err(Error::InvalidFrame(format!("{width}x{height} clip")));
        }
        if rate.numerator() <= 0 || rate.denominator() <= 0 {
            return Err(Error::InvalidFrame(format!(
                "invalid frame rate {}/{}",
                rate.numerator(),
                rate.denominator()
            )));
        }

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or(Error::EncoderNotFound(ENCODER_NAME))?;

        let mut output = ffmpeg::format::output(&path)?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let encoder_time_base = rate.invert();

        let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        video.set_width(width);
        video.set_height(height);
        video.set_format(ffmpeg::format::Pixel::YUV420P);
        video.set_time_base(encoder_time_base);
        video.set_frame_rate(Some(rate));
        video.set_bit_rate(bit_rate);
        video.set_max_b_frames(0);
        if global_header {
            video.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = video.open_as(codec)?;

        let stream_index = {
            let mut stream = output.add_stream(codec)?;
            stream.set_parameters(&encoder);
            stream.set_time_base(encoder_time_base);
            stream.set_rate(rate);
            stream.set_avg_frame_rate(rate);
            stream.index()
        };

        output.write_header()?;

        Ok(Self {
            path: path.to_path_buf(),
            output,
            encoder,
            stream_index,
            encoder_time_base,
            width,
            height,
            scaler: None,
            next_pts: 0,
            frames_written: 0,
        })
    }

    /// Path of the clip being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames submitted so far
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Encodes a decoded frame; its pixel format is converted as needed
    pub fn write_frame(&mut self, frame: &ffmpeg::frame::Video) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(Error::InvalidFrame(format!(
                "frame is {}x{}, clip is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let source = frame.format();
        if self.scaler.as_ref().map_or(true, |s| s.source != source) {
            let context = ffmpeg::software::scaling::Context::get(
                source,
                self.width,
                self.height,
                ffmpeg::format::Pixel::YUV420P,
                self.width,
                self.height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some(YuvScaler { source, context });
        }

        let mut yuv_frame = ffmpeg::frame::Video::empty();
        if let Some(ref mut scaler) = self.scaler {
            scaler.context.run(frame, &mut yuv_frame)?;
        }
        yuv_frame.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder.send_frame(&yuv_frame)?;
        self.write_pending_packets()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Encodes an RGB image
    pub fn write_rgb(&mut self, image: &RgbImage) -> Result<()> {
        let mut rgb_frame =
            ffmpeg::frame::Video::new(ffmpeg::format::Pixel::RGB24, image.width(), image.height());

        // Copy pixels row by row, respecting the frame stride
        {
            let stride = rgb_frame.stride(0);
            let row_bytes = image.width() as usize * 3;
            let src = image.as_raw();
            let dst = rgb_frame.data_mut(0);
            for y in 0..image.height() as usize {
                let src_off = y * row_bytes;
                let dst_off = y * stride;
                dst[dst_off..dst_off + row_bytes].copy_from_slice(&src[src_off..src_off + row_bytes]);
            }
        }

        self.write_frame(&rgb_frame)
    }

    /// Flushes the encoder, writes the trailer and returns the frame count
    pub fn finish(mut self) -> Result<usize> {
        self.encoder.send_eof()?;
        self.write_pending_packets()?;
        self.output.write_trailer()?;
        Ok(self.frames_written)
    }

    fn write_pending_packets(&mut self) -> Result<()> {
        let stream_time_base = self
            .output
            .stream(self.stream_index)
            .ok_or(Error::NoVideoStream)?
            .time_base();

        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, stream_time_base);
            packet.write_interleaved(&mut self.output)?;
        }
        Ok(())
    }
}

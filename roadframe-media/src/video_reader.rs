//! Video reading and frame decoding using FFmpeg

use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static FFMPEG_INIT: OnceLock<std::result::Result<(), ffmpeg::Error>> = OnceLock::new();

/// Initialize FFmpeg once per process and quiet its console logging
pub(crate) fn init_ffmpeg() -> Result<()> {
    let result = FFMPEG_INIT.get_or_init(|| {
        ffmpeg::init()?;
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
        Ok(())
    });
    (*result).map_err(Error::from)
}

/// Summary of a video stream
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: i32,
    pub fps_den: i32,
    /// Frame count as reported by the container (may be an estimate)
    pub frame_count: u64,
    pub duration_ms: u64,
}

impl VideoInfo {
    /// Frame rate as a float
    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            return 0.0;
        }
        self.fps_num as f64 / self.fps_den as f64
    }
}

/// Pull-based decoder over the best video stream of a file.
///
/// Frames come out in decode (temporal) order until the source is exhausted.
pub struct VideoReader {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    video_stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    rate: ffmpeg::Rational,
    time_base: ffmpeg::Rational,
    frame_count: u64,
    duration_ms: u64,
    scaler: Option<RgbScaler>,
    eof_sent: bool,
}

struct RgbScaler {
    source: (ffmpeg::format::Pixel, u32, u32),
    context: ffmpeg::software::scaling::Context,
}

impl VideoReader {
    /// Opens a video file
    pub fn open(path: &Path) -> Result<Self> {
        init_ffmpeg()?;

        let input = ffmpeg::format::input(&path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let video_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(Error::NoVideoStream)?;

        let video_stream_index = video_stream.index();
        let time_base = video_stream.time_base();

        let mut rate = video_stream.avg_frame_rate();
        if rate.numerator() <= 0 || rate.denominator() <= 0 {
            rate = video_stream.rate();
        }

        let duration_ms = if video_stream.duration() > 0 {
            (video_stream.duration() as f64 * f64::from(time_base) * 1000.0) as u64
        } else {
            // Fallback to container duration
            (input.duration().max(0) as f64 / ffmpeg::ffi::AV_TIME_BASE as f64 * 1000.0) as u64
        };

        let frame_count = if video_stream.frames() > 0 {
            video_stream.frames() as u64
        } else if rate.denominator() > 0 {
            (duration_ms as f64 * f64::from(rate) / 1000.0).round() as u64
        } else {
            0
        };

        let context = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())?;
        let decoder = context.decoder().video()?;

        Ok(Self {
            path: path.to_path_buf(),
            input,
            video_stream_index,
            decoder,
            rate,
            time_base,
            frame_count,
            duration_ms,
            scaler: None,
            eof_sent: false,
        })
    }

    /// Gets the video width
    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    /// Gets the video height
    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    /// Gets the frame rate as a rational number
    pub fn frame_rate(&self) -> ffmpeg::Rational {
        self.rate
    }

    /// Gets the frame rate as a float (0.0 when the stream reports none)
    pub fn fps(&self) -> f64 {
        if self.rate.denominator() == 0 {
            return 0.0;
        }
        f64::from(self.rate)
    }

    /// Stream time base
    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// Total frame count reported by the container
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Gets the total duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Describes the opened stream
    pub fn info(&self) -> VideoInfo {
        VideoInfo {
            path: self.path.clone(),
            width: self.width(),
            height: self.height(),
            fps_num: self.rate.numerator(),
            fps_den: self.rate.denominator(),
            frame_count: self.frame_count,
            duration_ms: self.duration_ms,
        }
    }

    /// Decodes the next frame in the decoder's native pixel format.
    ///
    /// Returns `Ok(None)` once the source and the decoder are drained.
    pub fn next_frame(&mut self) -> Result<Option<ffmpeg::frame::Video>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return Ok(Some(decoded)),
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {}
                Err(e) => return Err(e.into()),
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Decodes the next frame and converts it to an RGB image
    pub fn next_rgb_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(decoded) = self.next_frame()? else {
            return Ok(None);
        };

        let source = (decoded.format(), decoded.width(), decoded.height());
        let rebuild = self.scaler.as_ref().map_or(true, |s| s.source != source);
        if rebuild {
            let context = ffmpeg::software::scaling::Context::get(
                source.0,
                source.1,
                source.2,
                ffmpeg::format::Pixel::RGB24,
                source.1,
                source.2,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some(RgbScaler { source, context });
        }

        let mut rgb_frame = ffmpeg::frame::Video::empty();
        if let Some(ref mut scaler) = self.scaler {
            scaler.context.run(&decoded, &mut rgb_frame)?;
        }
        rgb_frame_to_image(&rgb_frame).map(Some)
    }
}

/// Copies a packed RGB24 frame into an image buffer, dropping stride padding
fn rgb_frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let offset = y * stride;
        let row = data
            .get(offset..offset + row_bytes)
            .ok_or_else(|| Error::InvalidFrame(format!("row {y} out of bounds")))?;
        pixels.extend_from_slice(row);
    }

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| Error::InvalidFrame(format!("{width}x{height} buffer size mismatch")))
}

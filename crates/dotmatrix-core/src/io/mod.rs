pub mod ffmpeg;
pub mod image_io;
pub mod ser;
pub mod ser_writer;

use std::path::Path;

use crate::error::{DotMatrixError, Result};
use crate::frame::{Frame, PixelFormat, VideoStreamDescriptor};

use ffmpeg::{FfmpegSink, FfmpegSource};
use ser::SerSource;
use ser_writer::SerSink;

/// Sequential video-frame decoder.
pub trait FrameSource {
    /// Stream properties read when the source was opened.
    fn descriptor(&self) -> &VideoStreamDescriptor;

    /// Decode the next frame, or `None` at end of stream.
    ///
    /// Reading after `release` is an error.
    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Release the decoder. Calling it again is a no-op.
    fn release(&mut self) -> Result<()>;
}

/// Sequential video-frame encoder.
pub trait FrameSink {
    /// Pixel format the sink expects frames in.
    fn pixel_format(&self) -> PixelFormat;

    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and release the encoder. Calling it again is a no-op.
    fn release(&mut self) -> Result<()>;
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn pixel_format(&self) -> PixelFormat {
        (**self).pixel_format()
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        (**self).write(frame)
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

/// Geometry and rate an output sink is opened with.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

pub fn is_ser_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ser"))
}

/// Open a video file for decoding, picking the reader from the extension.
///
/// SER files carry no frame rate, so `ser_fps` is assumed for them.
pub fn open_source(path: &Path, ser_fps: f64) -> Result<Box<dyn FrameSource>> {
    if !path.exists() {
        return Err(DotMatrixError::Open(format!(
            "{} does not exist",
            path.display()
        )));
    }
    if is_ser_path(path) {
        let source = SerSource::open(path, ser_fps).map_err(|e| match e {
            DotMatrixError::Open(_) => e,
            other => DotMatrixError::Open(format!("{}: {other}", path.display())),
        })?;
        Ok(Box::new(source))
    } else {
        Ok(Box::new(FfmpegSource::open(path)?))
    }
}

/// Create the sink that writes the intermediate artifact at `path`.
pub fn open_sink(path: &Path, spec: &SinkSpec) -> Result<Box<dyn FrameSink>> {
    if is_ser_path(path) {
        Ok(Box::new(SerSink::create(path, spec)?))
    } else {
        Ok(Box::new(FfmpegSink::create(path, spec)?))
    }
}

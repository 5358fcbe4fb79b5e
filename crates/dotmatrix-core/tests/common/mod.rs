#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ndarray::{Array2, Array3};

use dotmatrix_core::error::{DotMatrixError, Result};
use dotmatrix_core::frame::{Frame, PixelFormat, VideoStreamDescriptor};
use dotmatrix_core::io::ser::{SER_COLOR_MONO, SER_HEADER_SIZE};
use dotmatrix_core::io::{FrameSink, FrameSource, SinkSpec};
use dotmatrix_core::pipeline::{PipelineStage, ProgressReporter, ProgressSnapshot};

// ---------------------------------------------------------------------------
// Synthetic frames
// ---------------------------------------------------------------------------

/// Single-channel frame filled with `value`.
pub fn uniform_gray(width: usize, height: usize, value: u8) -> Frame {
    Frame::from_gray(Array2::from_elem((height, width), value))
}

/// RGB frame where every pixel is `(r, g, b)`.
pub fn uniform_rgb(width: usize, height: usize, rgb: [u8; 3]) -> Frame {
    Frame::new(Array3::from_shape_fn((height, width, 3), |(_, _, c)| rgb[c]))
}

/// Gray frame whose `cell`x`cell` tiles take the values of `grid`, row-major.
pub fn cell_grid(grid: &[&[u8]], cell: usize) -> Frame {
    let rows = grid.len();
    let cols = grid[0].len();
    Frame::from_gray(Array2::from_shape_fn(
        (rows * cell, cols * cell),
        |(r, c)| grid[r / cell][c / cell],
    ))
}

/// Gray frame with a horizontal ramp plus a vertical ripple, so every cell
/// gets a different mean.
pub fn gradient_gray(width: usize, height: usize) -> Frame {
    Frame::from_gray(Array2::from_shape_fn((height, width), |(r, c)| {
        ((c * 255 / width.max(1)) as u32 + (r % 7) as u32 * 3).min(255) as u8
    }))
}

pub fn descriptor(width: u32, height: u32, fps: f64, frames: Option<u64>) -> VideoStreamDescriptor {
    VideoStreamDescriptor {
        width,
        height,
        input_fps: fps,
        total_frames: frames,
    }
}

// ---------------------------------------------------------------------------
// SER buffers
// ---------------------------------------------------------------------------

/// Build a SER header with configurable bit depth and color mode.
///
/// `color_id`: 0=MONO, 100=RGB, 101=BGR
pub fn build_ser_header_full(
    width: u32,
    height: u32,
    bit_depth: u32,
    num_frames: usize,
    color_id: i32,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID (4 bytes)
    buf.extend_from_slice(&0i32.to_le_bytes());
    // ColorID (4 bytes)
    buf.extend_from_slice(&color_id.to_le_bytes());
    // LittleEndian = 0 (little-endian per Siril convention)
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer, Instrument, Telescope (40 bytes each)
    let mut observer = [0u8; 40];
    observer[..4].copy_from_slice(b"Test");
    buf.extend_from_slice(&observer);
    buf.extend_from_slice(&[0u8; 40]);
    buf.extend_from_slice(&[0u8; 40]);
    // DateTime, DateTimeUTC (8 bytes each)
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// Complete mono 8-bit SER file with the given frame data.
pub fn build_ser_with_frames(width: u32, height: u32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = build_ser_header_full(width, height, 8, frames.len(), SER_COLOR_MONO);
    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

/// Write a SER buffer to a temp file with a `.ser` extension.
///
/// The file stays alive as long as the returned `NamedTempFile` is not dropped.
pub fn write_test_ser(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut f = tempfile::Builder::new()
        .suffix(".ser")
        .tempfile()
        .expect("create temp file");
    f.write_all(data).expect("write SER data");
    f.flush().expect("flush");
    f
}

// ---------------------------------------------------------------------------
// In-memory source and sink
// ---------------------------------------------------------------------------

/// Source that yields prepared frames and can fail after a given count.
pub struct MockSource {
    descriptor: VideoStreamDescriptor,
    frames: VecDeque<Frame>,
    fail_after: Option<usize>,
    reads: usize,
    pub releases: usize,
}

impl MockSource {
    pub fn new(descriptor: VideoStreamDescriptor, frames: Vec<Frame>) -> Self {
        Self {
            descriptor,
            frames: frames.into(),
            fail_after: None,
            reads: 0,
            releases: 0,
        }
    }

    /// `count` uniform gray frames matching the descriptor.
    pub fn uniform(descriptor: VideoStreamDescriptor, count: usize, value: u8) -> Self {
        let frame = uniform_gray(descriptor.width as usize, descriptor.height as usize, value);
        Self::new(descriptor, vec![frame; count])
    }

    /// Fail with a decode error on read number `n + 1`.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Number of `read_next` calls that returned a frame.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl FrameSource for MockSource {
    fn descriptor(&self) -> &VideoStreamDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.fail_after == Some(self.reads) {
            return Err(DotMatrixError::Decode(format!(
                "mock failure after {} frames",
                self.reads
            )));
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.reads += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) -> Result<()> {
        self.releases += 1;
        Ok(())
    }
}

/// What a `MockSink` saw, shared with the test after the sink is consumed.
#[derive(Default)]
pub struct SinkLog {
    pub spec: Option<SinkSpec>,
    pub frames: Vec<Frame>,
    pub releases: usize,
}

pub struct MockSink {
    format: PixelFormat,
    log: Arc<Mutex<SinkLog>>,
    fail_on_write: Option<usize>,
}

impl MockSink {
    pub fn open(spec: &SinkSpec, format: PixelFormat, log: &Arc<Mutex<SinkLog>>) -> Self {
        log.lock().unwrap().spec = Some(spec.clone());
        Self {
            format,
            log: Arc::clone(log),
            fail_on_write: None,
        }
    }

    /// Fail the write of frame number `n + 1`.
    pub fn failing_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }
}

impl FrameSink for MockSink {
    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if self.fail_on_write == Some(log.frames.len()) {
            return Err(DotMatrixError::Encode("mock write failure".into()));
        }
        log.frames.push(frame.clone());
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.log.lock().unwrap().releases += 1;
        Ok(())
    }
}

pub fn new_sink_log() -> Arc<Mutex<SinkLog>> {
    Arc::new(Mutex::new(SinkLog::default()))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingReporter {
    pub stages: Mutex<Vec<(PipelineStage, Option<u64>)>>,
    pub advanced: Mutex<Vec<u64>>,
    pub snapshots: Mutex<Vec<ProgressSnapshot>>,
    pub finished: Mutex<usize>,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<u64>) {
        self.stages.lock().unwrap().push((stage, total_items));
    }

    fn advance(&self, items_done: u64) {
        self.advanced.lock().unwrap().push(items_done);
    }

    fn snapshot(&self, snapshot: &ProgressSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn finish_stage(&self) {
        *self.finished.lock().unwrap() += 1;
    }
}

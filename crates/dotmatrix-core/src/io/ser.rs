use std::fs::File;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::Array3;

use crate::error::{DotMatrixError, Result};
use crate::frame::{Frame, FrameMetadata, PixelFormat, VideoStreamDescriptor};

use super::FrameSource;

pub const SER_HEADER_SIZE: usize = 178;
pub const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// Byte offset of the FrameCount field inside the header.
pub const SER_FRAME_COUNT_OFFSET: u64 = 38;

pub const SER_COLOR_MONO: i32 = 0;
pub const SER_COLOR_RGB: i32 = 100;
pub const SER_COLOR_BGR: i32 = 101;

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Header for 8-bit frames of the given format, with no frames yet.
    pub fn for_frames(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            color_id: match format {
                PixelFormat::Gray => SER_COLOR_MONO,
                PixelFormat::Rgb => SER_COLOR_RGB,
            },
            little_endian: true,
            width,
            height,
            pixel_depth: 8,
            frame_count: 0,
            observer: String::new(),
            instrument: "dotmatrix".into(),
            telescope: String::new(),
            date_time: 0,
            date_time_utc: 0,
        }
    }

    /// Bytes per pixel plane (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_pixel_plane(&self) -> usize {
        if self.pixel_depth <= 8 {
            1
        } else {
            2
        }
    }

    /// Number of planes per pixel (1 for mono/bayer, 3 for RGB/BGR).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            SER_COLOR_RGB | SER_COLOR_BGR => 3,
            _ => 1,
        }
    }

    /// Total bytes per frame.
    pub fn frame_byte_size(&self) -> Result<usize> {
        let bytes_per_pixel = self.bytes_per_pixel_plane() * self.planes_per_pixel();
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
            .ok_or(DotMatrixError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })
    }

    /// Pixel format frames decode to. Bayer data is treated as grayscale.
    pub fn pixel_format(&self) -> PixelFormat {
        if self.planes_per_pixel() == 3 {
            PixelFormat::Rgb
        } else {
            PixelFormat::Gray
        }
    }
}

/// Memory-mapped SER file reader.
pub struct SerReader {
    mmap: Mmap,
    pub header: SerHeader,
    frame_bytes: usize,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(DotMatrixError::InvalidSer(
                "File too small for SER header".into(),
            ));
        }

        if &mmap[0..14] != SER_MAGIC {
            return Err(DotMatrixError::InvalidSer(
                "Missing LUCAM-RECORDER magic".into(),
            ));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;
        let frame_bytes = header.frame_byte_size()?;

        let expected_data_size = frame_bytes
            .checked_mul(header.frame_count as usize)
            .and_then(|data| data.checked_add(SER_HEADER_SIZE))
            .ok_or_else(|| {
                DotMatrixError::InvalidSer(format!(
                    "Frame data size overflows: {} frames of {} bytes",
                    header.frame_count, frame_bytes
                ))
            })?;
        if mmap.len() < expected_data_size {
            return Err(DotMatrixError::InvalidSer(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected_data_size,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            header,
            frame_bytes,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Get the raw bytes for a single frame (zero-copy from mmap).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let count = self.frame_count();
        if index >= count {
            return Err(DotMatrixError::Decode(format!(
                "frame index {index} out of range (total: {count})"
            )));
        }
        let offset = SER_HEADER_SIZE + index * self.frame_bytes;
        Ok(&self.mmap[offset..offset + self.frame_bytes])
    }

    /// Read a single frame as 8-bit pixels. Deeper samples keep their top 8 bits.
    pub fn read_frame(&self, index: usize) -> Result<Frame> {
        let raw = self.frame_raw(index)?;
        let h = self.header.height as usize;
        let w = self.header.width as usize;
        let planes = self.header.planes_per_pixel();
        let bpp = self.header.bytes_per_pixel_plane();
        let shift = self.header.pixel_depth.saturating_sub(8);
        let bgr = self.header.color_id == SER_COLOR_BGR;

        let sample = |idx: usize| -> u8 {
            if bpp == 1 {
                raw[idx]
            } else {
                let pair = [raw[idx], raw[idx + 1]];
                let v = if self.header.little_endian {
                    u16::from_le_bytes(pair)
                } else {
                    u16::from_be_bytes(pair)
                };
                (v >> shift).min(255) as u8
            }
        };

        let data = Array3::from_shape_fn((h, w, planes), |(row, col, ch)| {
            let plane = if bgr { planes - 1 - ch } else { ch };
            sample(((row * w + col) * planes + plane) * bpp)
        });

        let mut frame = Frame::new(data);
        frame.metadata = FrameMetadata {
            frame_index: index as u64,
        };
        Ok(frame)
    }

    /// Iterator over all frames.
    pub fn frames(&self) -> impl Iterator<Item = Result<Frame>> + '_ {
        (0..self.frame_count()).map(move |i| self.read_frame(i))
    }
}

/// `FrameSource` over a SER file, read front to back.
pub struct SerSource {
    reader: Option<SerReader>,
    descriptor: VideoStreamDescriptor,
    next_index: usize,
}

impl SerSource {
    pub fn open(path: &Path, fps: f64) -> Result<Self> {
        let reader = SerReader::open(path)?;
        let descriptor = VideoStreamDescriptor {
            width: reader.header.width,
            height: reader.header.height,
            input_fps: fps,
            total_frames: Some(reader.frame_count() as u64),
        };
        Ok(Self {
            reader: Some(reader),
            descriptor,
            next_index: 0,
        })
    }
}

impl FrameSource for SerSource {
    fn descriptor(&self) -> &VideoStreamDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| DotMatrixError::Decode("SER source has been released".into()))?;
        if self.next_index >= reader.frame_count() {
            return Ok(None);
        }
        let frame = reader.read_frame(self.next_index)?;
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]); // skip magic

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()? as u32;
    let height = cursor.read_i32::<LittleEndian>()? as u32;
    let pixel_depth = cursor.read_i32::<LittleEndian>()? as u32;
    let frame_count = cursor.read_i32::<LittleEndian>()? as u32;

    let observer = read_fixed_string(&buf[42..82]);
    let instrument = read_fixed_string(&buf[82..122]);
    let telescope = read_fixed_string(&buf[122..162]);

    let mut cursor = std::io::Cursor::new(&buf[162..]);
    let date_time = cursor.read_u64::<LittleEndian>()?;
    let date_time_utc = cursor.read_u64::<LittleEndian>()?;

    if width == 0 || height == 0 {
        return Err(DotMatrixError::InvalidDimensions { width, height });
    }
    if pixel_depth == 0 || pixel_depth > 16 {
        return Err(DotMatrixError::InvalidSer(format!(
            "unsupported pixel depth {pixel_depth}"
        )));
    }

    // Siril convention: 0 means little-endian pixel data.
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width,
        height,
        pixel_depth,
        frame_count,
        observer,
        instrument,
        telescope,
        date_time,
        date_time_utc,
    })
}

fn read_fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

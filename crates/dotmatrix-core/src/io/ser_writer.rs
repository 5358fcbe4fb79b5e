use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{DotMatrixError, Result};
use crate::frame::{Frame, PixelFormat};
use crate::io::ser::{SerHeader, SER_FRAME_COUNT_OFFSET, SER_HEADER_SIZE, SER_MAGIC};

use super::{FrameSink, SinkSpec};

/// Writes a valid 8-bit SER file at the raw byte level.
///
/// The header's frame count is patched in by `finalize`, so the total does
/// not have to be known up front.
pub struct SerWriter {
    writer: BufWriter<File>,
    header: SerHeader,
    frames_written: u32,
}

impl SerWriter {
    /// Create a new SER file and write the header.
    pub fn create(path: &Path, header: &SerHeader) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, header)?;
        Ok(Self {
            writer,
            header: header.clone(),
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }

    /// Append one frame; its size and format must match the header.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.header.width as usize
            || frame.height() != self.header.height as usize
            || frame.format() != self.header.pixel_format()
        {
            return Err(DotMatrixError::Encode(format!(
                "frame {}x{} {} does not match SER stream {}x{} {}",
                frame.width(),
                frame.height(),
                frame.format(),
                self.header.width,
                self.header.height,
                self.header.pixel_format()
            )));
        }
        self.writer.write_all(&frame.raw_bytes())?;
        self.frames_written += 1;
        Ok(())
    }

    /// Patch the frame count, flush, and close the file.
    pub fn finalize(mut self) -> Result<()> {
        self.writer.seek(SeekFrom::Start(SER_FRAME_COUNT_OFFSET))?;
        self.writer
            .write_all(&(self.frames_written as i32).to_le_bytes())?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// `FrameSink` writing grayscale frames to a SER file.
pub struct SerSink {
    writer: Option<SerWriter>,
}

impl SerSink {
    pub fn create(path: &Path, spec: &SinkSpec) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let header = SerHeader::for_frames(spec.width, spec.height, PixelFormat::Gray);
        Ok(Self {
            writer: Some(SerWriter::create(path, &header)?),
        })
    }
}

impl FrameSink for SerSink {
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Gray
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| DotMatrixError::Encode("SER sink has been released".into()))?;
        if frame.format() == PixelFormat::Gray {
            writer.write_frame(frame)
        } else {
            writer.write_frame(&frame.to_format(PixelFormat::Gray))
        }
    }

    fn release(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            debug!(frames = writer.frames_written(), "Closing SER sink");
            writer.finalize()?;
        }
        Ok(())
    }
}

impl Drop for SerSink {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn write_header(w: &mut impl Write, header: &SerHeader) -> Result<()> {
    // Magic (14 bytes)
    w.write_all(SER_MAGIC)?;
    // LuID (4 bytes)
    w.write_all(&0i32.to_le_bytes())?;
    // ColorID (4 bytes)
    w.write_all(&header.color_id.to_le_bytes())?;
    // LittleEndian flag: 0 = little-endian (Siril convention)
    let le_flag: i32 = if header.little_endian { 0 } else { 1 };
    w.write_all(&le_flag.to_le_bytes())?;
    w.write_all(&(header.width as i32).to_le_bytes())?;
    w.write_all(&(header.height as i32).to_le_bytes())?;
    w.write_all(&(header.pixel_depth as i32).to_le_bytes())?;
    // FrameCount (offset 38)
    w.write_all(&(header.frame_count as i32).to_le_bytes())?;
    write_fixed_string(w, &header.observer, 40)?;
    write_fixed_string(w, &header.instrument, 40)?;
    write_fixed_string(w, &header.telescope, 40)?;
    w.write_all(&header.date_time.to_le_bytes())?;
    w.write_all(&header.date_time_utc.to_le_bytes())?;

    debug_assert_eq!(
        14 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 40 + 40 + 40 + 8 + 8,
        SER_HEADER_SIZE
    );
    Ok(())
}

fn write_fixed_string(w: &mut impl Write, s: &str, len: usize) -> Result<()> {
    let bytes = s.as_bytes();
    let to_write = bytes.len().min(len);
    w.write_all(&bytes[..to_write])?;
    w.write_all(&vec![0u8; len - to_write])?;
    Ok(())
}

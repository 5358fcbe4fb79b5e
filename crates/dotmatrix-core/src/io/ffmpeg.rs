use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{DotMatrixError, Result};
use crate::frame::{Frame, FrameMetadata, PixelFormat, VideoStreamDescriptor};

use super::{FrameSink, FrameSource, SinkSpec};

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize, Default)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Build a stream descriptor from `ffprobe -print_format json` output.
///
/// The first video stream wins. When the container does not report a frame
/// count, it is estimated from the duration.
pub fn parse_probe_output(json: &[u8]) -> Result<VideoStreamDescriptor> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| DotMatrixError::Open(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| DotMatrixError::Open("no video stream found".into()))?;

    let width = stream
        .width
        .ok_or_else(|| DotMatrixError::Open("missing video width from ffprobe".into()))?;
    let height = stream
        .height
        .ok_or_else(|| DotMatrixError::Open("missing video height from ffprobe".into()))?;
    let input_fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|r| parse_frame_rate(r))
        .ok_or_else(|| DotMatrixError::Open("missing video frame rate from ffprobe".into()))?;

    let duration = stream
        .duration
        .as_deref()
        .or_else(|| parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok());
    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .or_else(|| duration.map(|d| (d * input_fps).round() as u64));

    let descriptor = VideoStreamDescriptor {
        width,
        height,
        input_fps,
        total_frames,
    };
    descriptor.validate()?;
    Ok(descriptor)
}

/// Probe source video metadata through `ffprobe`.
pub fn probe_video(path: &Path) -> Result<VideoStreamDescriptor> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            DotMatrixError::Open(format!("failed to run ffprobe (is ffmpeg installed?): {e}"))
        })?;
    if !out.status.success() {
        return Err(DotMatrixError::Open(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_probe_output(&out.stdout)
}

/// Bytes of ffmpeg diagnostics kept for error messages.
const STDERR_TAIL_BYTES: usize = 16 * 1024;

/// Reads a child's stderr on its own thread so ffmpeg never stalls on a full
/// pipe. Only the last `STDERR_TAIL_BYTES` are kept.
struct StderrDrain {
    handle: Option<JoinHandle<String>>,
}

impl StderrDrain {
    fn spawn(child: &mut Child) -> Self {
        let handle = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut tail = Vec::new();
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            tail.extend_from_slice(&chunk[..n]);
                            if tail.len() > STDERR_TAIL_BYTES {
                                let excess = tail.len() - STDERR_TAIL_BYTES;
                                tail.drain(..excess);
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => {
                            tail.extend_from_slice(
                                format!("<failed to read ffmpeg stderr: {e}>").as_bytes(),
                            );
                            break;
                        }
                    }
                }
                String::from_utf8_lossy(&tail).trim().to_string()
            })
        });
        Self { handle }
    }

    /// Join the reader. Only call once the child has exited.
    fn collect(&mut self) -> String {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| "<ffmpeg stderr reader panicked>".to_string()),
            None => String::new(),
        }
    }
}

/// Wait for an ffmpeg child and collect the tail of its diagnostics.
fn wait_child(child: &mut Child, stderr: &mut StderrDrain) -> std::io::Result<(bool, String)> {
    let status = child.wait();
    let diagnostics = stderr.collect();
    Ok((status?.success(), diagnostics))
}

/// Decodes a video file to RGB frames through an `ffmpeg` subprocess.
pub struct FfmpegSource {
    path: PathBuf,
    descriptor: VideoStreamDescriptor,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: StderrDrain,
    frame_bytes: usize,
    next_index: u64,
    drained: bool,
    released: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        let descriptor = probe_video(path)?;
        let frame_bytes =
            descriptor.width as usize * descriptor.height as usize * PixelFormat::Rgb.channels();

        let mut child = Command::new("ffmpeg")
            // Frames must match the probed geometry, so no rotation metadata is applied.
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map", "0:v:0", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DotMatrixError::Open(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stderr = StderrDrain::spawn(&mut child);
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DotMatrixError::Open("failed to open ffmpeg stdout".into()))?;

        debug!(path = %path.display(), ?descriptor, "Opened ffmpeg decoder");
        Ok(Self {
            path: path.to_path_buf(),
            descriptor,
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            stderr,
            frame_bytes,
            next_index: 0,
            drained: false,
            released: false,
        })
    }

    /// The decoder hit end of stream; surface a decoder failure if there was one.
    fn check_exit(&mut self) -> Result<()> {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let (ok, stderr) = wait_child(&mut child, &mut self.stderr)?;
            if !ok {
                return Err(DotMatrixError::Decode(format!(
                    "ffmpeg failed while decoding '{}': {stderr}",
                    self.path.display()
                )));
            }
        }
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn descriptor(&self) -> &VideoStreamDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Err(DotMatrixError::Decode("ffmpeg source has been released".into()));
        }
        if self.drained {
            return Ok(None);
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(DotMatrixError::Decode("ffmpeg decoder output is closed".into()));
        };

        let mut buf = vec![0u8; self.frame_bytes];
        let mut filled = 0;
        while filled < buf.len() {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(DotMatrixError::Decode(format!(
                        "failed to read frame {} from ffmpeg: {e}",
                        self.next_index
                    )))
                }
            }
        }

        if filled == 0 {
            self.drained = true;
            self.check_exit()?;
            return Ok(None);
        }
        if filled < buf.len() {
            self.check_exit()?;
            return Err(DotMatrixError::Decode(format!(
                "truncated frame {}: got {filled} of {} bytes",
                self.next_index,
                buf.len()
            )));
        }

        let mut frame = Frame::from_raw(
            self.descriptor.width,
            self.descriptor.height,
            PixelFormat::Rgb,
            buf,
        )?;
        frame.metadata = FrameMetadata {
            frame_index: self.next_index,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
            }
            let waited = child.wait();
            self.stderr.collect();
            waited?;
            debug!(path = %self.path.display(), "Released ffmpeg decoder");
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release ffmpeg decoder: {e}");
        }
    }
}

/// Encodes RGB frames into a lossless FFV1 intermediate through `ffmpeg`.
pub struct FfmpegSink {
    spec: SinkSpec,
    path: PathBuf,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: StderrDrain,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn create(path: &Path, spec: &SinkSpec) -> Result<Self> {
        if spec.width == 0 || spec.height == 0 {
            return Err(DotMatrixError::InvalidDimensions {
                width: spec.width,
                height: spec.height,
            });
        }
        ensure_parent_dir(path)?;
        if !is_ffmpeg_on_path() {
            return Err(DotMatrixError::Encode(
                "ffmpeg is required for video output, but was not found on PATH".into(),
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", spec.width, spec.height),
                "-r",
                &spec.fps.to_string(),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "ffv1",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DotMatrixError::Encode(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stderr = StderrDrain::spawn(&mut child);
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DotMatrixError::Encode("failed to open ffmpeg stdin".into()))?;

        Ok(Self {
            spec: spec.clone(),
            path: path.to_path_buf(),
            child: Some(child),
            stdin: Some(BufWriter::new(stdin)),
            stderr,
            frames_written: 0,
        })
    }
}

impl FrameSink for FfmpegSink {
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Rgb
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.spec.width as usize || frame.height() != self.spec.height as usize
        {
            return Err(DotMatrixError::Encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.spec.width,
                self.spec.height
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(DotMatrixError::Encode("ffmpeg sink has been released".into()));
        };

        let rgb;
        let frame = if frame.format() == PixelFormat::Rgb {
            frame
        } else {
            rgb = frame.to_format(PixelFormat::Rgb);
            &rgb
        };
        stdin.write_all(&frame.raw_bytes()).map_err(|e| {
            DotMatrixError::Encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let (ok, stderr) = wait_child(&mut child, &mut self.stderr)?;
        debug!(
            path = %self.path.display(),
            frames = self.frames_written,
            "Released ffmpeg encoder"
        );
        if !ok {
            return Err(DotMatrixError::Encode(format!(
                "ffmpeg failed writing '{}': {stderr}",
                self.path.display()
            )));
        }
        flushed.map_err(|e| DotMatrixError::Encode(format!("failed to flush ffmpeg stdin: {e}")))
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release ffmpeg encoder: {e}");
        }
    }
}

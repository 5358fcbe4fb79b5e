use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::{DotMatrixError, Result};
use crate::io::is_ser_path;
use crate::pipeline::config::EncoderConfig;

/// Post-processing step that turns the raw sink output into the deliverable.
pub trait Finalizer: Send + Sync {
    /// Produce `output` from `intermediate`. The intermediate is left in place;
    /// the caller removes it once this succeeds.
    fn finalize(&self, intermediate: &Path, output: &Path) -> Result<()>;
}

/// Re-encodes with x264 into a progressive-download friendly MP4.
pub struct FfmpegFinalizer {
    pub encoder: EncoderConfig,
}

impl FfmpegFinalizer {
    pub fn new(encoder: EncoderConfig) -> Self {
        Self { encoder }
    }

    /// Full ffmpeg argument list for one conversion.
    pub fn args(&self, intermediate: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-i".into(),
            intermediate.into(),
            "-an".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.encoder.preset.clone().into(),
            "-crf".into(),
            self.encoder.crf.to_string().into(),
            // yuv420p needs even dimensions
            "-vf".into(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ];
        if self.encoder.faststart {
            args.push("-movflags".into());
            args.push("+faststart".into());
        }
        args.push("-y".into());
        args.push(output.into());
        args
    }
}

impl Finalizer for FfmpegFinalizer {
    fn finalize(&self, intermediate: &Path, output: &Path) -> Result<()> {
        info!(
            preset = %self.encoder.preset,
            crf = self.encoder.crf,
            "Converting to web-compatible format"
        );
        let out = Command::new("ffmpeg")
            .args(self.args(intermediate, output))
            .output()
            .map_err(|e| {
                DotMatrixError::Encode(format!(
                    "failed to run ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;
        if !out.status.success() {
            return Err(DotMatrixError::Encode(format!(
                "ffmpeg exited with status {} (intermediate kept at '{}'): {}",
                out.status,
                intermediate.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Moves the intermediate into place unchanged.
pub struct MoveFinalizer;

impl Finalizer for MoveFinalizer {
    fn finalize(&self, intermediate: &Path, output: &Path) -> Result<()> {
        if std::fs::rename(intermediate, output).is_err() {
            std::fs::copy(intermediate, output).map_err(|e| {
                DotMatrixError::Encode(format!(
                    "failed to move '{}' to '{}': {e}",
                    intermediate.display(),
                    output.display()
                ))
            })?;
        }
        Ok(())
    }
}

/// Where the sink writes before finalization: next to the output, so a
/// failed conversion leaves it somewhere obvious.
pub fn intermediate_path(output: &Path) -> PathBuf {
    let ext = if is_ser_path(output) { "ser" } else { "mkv" };
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    name.push(format!(".temp.{ext}"));
    output.with_file_name(name)
}

/// SER output needs no conversion; everything else goes through x264.
pub fn finalizer_for(output: &Path, encoder: &EncoderConfig) -> Box<dyn Finalizer> {
    if is_ser_path(output) {
        Box::new(MoveFinalizer)
    } else {
        Box::new(FfmpegFinalizer::new(encoder.clone()))
    }
}

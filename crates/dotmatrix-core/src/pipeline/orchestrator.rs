use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{DotMatrixError, Result};
use crate::finalize::{finalizer_for, intermediate_path};
use crate::io::ffmpeg::ensure_parent_dir;
use crate::io::{open_sink, open_source};

use super::config::PipelineConfig;
use super::stream::run_stream;
use super::types::{PipelineStage, ProgressReporter, RunSummary, StreamOptions};

/// Run the whole file-to-file conversion described by `config`.
///
/// Frames are streamed into an intermediate file next to the output, which
/// is then finalized into `config.output`. The intermediate is removed only
/// when finalization succeeds.
pub fn process_video(
    config: &PipelineConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    config.validate()?;
    info!(
        input = %config.input.display(),
        output = %config.output.display(),
        dot_size = config.effect.dot_size,
        spacing = config.effect.spacing,
        fill = %config.effect.fill,
        "Starting dot-matrix conversion"
    );

    let mut source = open_source(&config.input, config.sampling.ser_fps)?;
    let descriptor = source.descriptor().clone();
    info!(
        width = descriptor.width,
        height = descriptor.height,
        fps = descriptor.input_fps,
        total_frames = ?descriptor.total_frames,
        "Opened source"
    );

    ensure_parent_dir(&config.output)?;
    let intermediate = intermediate_path(&config.output);
    let options = StreamOptions::from(&config.sampling);

    let summary = run_stream(
        source.as_mut(),
        |spec| open_sink(&intermediate, spec),
        &config.effect,
        &options,
        reporter.as_ref(),
    )?;

    if summary.frames_written == 0 {
        return Err(DotMatrixError::Encode(format!(
            "no frames were written ({} decoded); intermediate kept at '{}'",
            summary.frames_seen,
            intermediate.display()
        )));
    }

    reporter.begin_stage(PipelineStage::Finalizing, None);
    finalizer_for(&config.output, &config.encoder).finalize(&intermediate, &config.output)?;
    reporter.finish_stage();

    if intermediate.exists() {
        if let Err(e) = std::fs::remove_file(&intermediate) {
            warn!(path = %intermediate.display(), error = %e, "Failed to remove intermediate file");
        }
    }

    info!(
        frames_written = summary.frames_written,
        frames_seen = summary.frames_seen,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Conversion complete"
    );
    Ok(summary)
}

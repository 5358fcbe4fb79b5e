use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{DotMatrixError, Result};
use crate::frame::{Frame, PixelFormat};
use crate::halftone::{render, EffectParams};
use crate::io::{FrameSink, FrameSource, SinkSpec};
use crate::scale::resize_frame;

use super::sampling::TemporalSampler;
use super::types::{
    OutputPlan, PipelineStage, ProgressReporter, ProgressSnapshot, RunSummary, StreamOptions,
};

struct LoopOutcome {
    frames_seen: u64,
    frames_written: u64,
    capped: bool,
}

/// Decode `source`, keep every `frame_interval`-th frame, stylize it and
/// write it to the sink built by `open_sink`.
///
/// The sink is opened once the output geometry is known. Source and sink
/// are released exactly once before this returns, whether the run succeeds
/// or fails.
pub fn run_stream<S, K, F>(
    source: &mut S,
    open_sink: F,
    params: &EffectParams,
    options: &StreamOptions,
    reporter: &dyn ProgressReporter,
) -> Result<RunSummary>
where
    S: FrameSource + ?Sized,
    K: FrameSink,
    F: FnOnce(&SinkSpec) -> Result<K>,
{
    let start = Instant::now();

    let plan = match OutputPlan::new(source.descriptor(), params, options) {
        Ok(plan) => plan,
        Err(e) => return Err(release_after_error(e, source, None::<&mut K>)),
    };
    info!(
        width = plan.width,
        height = plan.height,
        output_fps = plan.output_fps,
        frame_interval = plan.frame_interval,
        dot_size = plan.params.dot_size,
        spacing = plan.params.spacing,
        "Stream plan ready"
    );

    let mut sink = match open_sink(&plan.sink_spec()) {
        Ok(sink) => sink,
        Err(e) => return Err(release_after_error(e, source, None::<&mut K>)),
    };

    reporter.begin_stage(PipelineStage::Processing, source.descriptor().total_frames);
    let outcome = match drive(source, &mut sink, &plan, options, reporter, start) {
        Ok(outcome) => outcome,
        Err(e) => return Err(release_after_error(e, source, Some(&mut sink))),
    };

    // Sink first: closing it is what flushes the intermediate.
    let sink_released = sink.release();
    let source_released = source.release();
    sink_released?;
    source_released?;
    reporter.finish_stage();

    if outcome.capped {
        info!(
            frames_written = outcome.frames_written,
            "Reached output frame cap, stopped reading"
        );
    }

    Ok(RunSummary {
        frames_seen: outcome.frames_seen,
        frames_written: outcome.frames_written,
        width: plan.width,
        height: plan.height,
        output_fps: plan.output_fps,
        frame_interval: plan.frame_interval,
        elapsed: start.elapsed(),
        capped: outcome.capped,
    })
}

fn drive<S, K>(
    source: &mut S,
    sink: &mut K,
    plan: &OutputPlan,
    options: &StreamOptions,
    reporter: &dyn ProgressReporter,
    start: Instant,
) -> Result<LoopOutcome>
where
    S: FrameSource + ?Sized,
    K: FrameSink,
{
    let descriptor = source.descriptor().clone();
    let out_format = sink.pixel_format();
    let mut sampler = TemporalSampler::new(plan.frame_interval);
    let mut frames_written = 0u64;
    let mut capped = false;
    let mut last_snapshot = start;

    loop {
        if options
            .max_output_frames
            .is_some_and(|cap| frames_written >= cap)
        {
            capped = true;
            break;
        }

        let Some(frame) = source.read_next()? else {
            break;
        };
        if frame.width() != descriptor.width as usize
            || frame.height() != descriptor.height as usize
        {
            return Err(DotMatrixError::Decode(format!(
                "frame {} is {}x{}, stream is {}x{}",
                sampler.frames_seen() + 1,
                frame.width(),
                frame.height(),
                descriptor.width,
                descriptor.height
            )));
        }

        if sampler.admit() {
            let styled = stylize(&frame, plan, out_format)?;
            sink.write(&styled)?;
            frames_written += 1;
        }
        reporter.advance(sampler.frames_seen());

        if last_snapshot.elapsed() >= options.progress_interval {
            last_snapshot = Instant::now();
            let snapshot = ProgressSnapshot::measure(
                sampler.frames_seen(),
                frames_written,
                descriptor.total_frames,
                start.elapsed(),
            );
            debug!(
                frames_seen = snapshot.frames_seen,
                frames_written = snapshot.frames_written,
                fps = snapshot.throughput_fps,
                "Progress"
            );
            reporter.snapshot(&snapshot);
        }
    }

    Ok(LoopOutcome {
        frames_seen: sampler.frames_seen(),
        frames_written,
        capped,
    })
}

fn stylize(frame: &Frame, plan: &OutputPlan, format: PixelFormat) -> Result<Frame> {
    if plan.scale.is_active() {
        let resized = resize_frame(frame, plan.width, plan.height)?;
        Ok(render(&resized, &plan.params, format))
    } else {
        Ok(render(frame, &plan.params, format))
    }
}

/// Release whatever is open and hand back the error that ended the run.
/// Release failures at this point are only logged.
fn release_after_error<S, K>(
    err: DotMatrixError,
    source: &mut S,
    sink: Option<&mut K>,
) -> DotMatrixError
where
    S: FrameSource + ?Sized,
    K: FrameSink,
{
    if let Some(sink) = sink {
        if let Err(e) = sink.release() {
            warn!(error = %e, "Failed to release sink after error");
        }
    }
    if let Err(e) = source.release() {
        warn!(error = %e, "Failed to release source after error");
    }
    err
}

use std::time::Duration;

use crate::consts::{DEFAULT_OUTPUT_FPS, DEFAULT_SPATIAL_BUDGET, PROGRESS_INTERVAL};
use crate::error::{DotMatrixError, Result};
use crate::frame::VideoStreamDescriptor;
use crate::halftone::EffectParams;
use crate::io::SinkSpec;
use crate::scale::ScalePlan;

use super::config::SamplingConfig;
use super::sampling::frame_interval;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Processing,
    Finalizing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "Processing frames"),
            Self::Finalizing => write!(f, "Encoding output"),
        }
    }
}

/// Point-in-time view of a running stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSnapshot {
    /// Frames decoded so far, kept or not.
    pub frames_seen: u64,
    pub frames_written: u64,
    pub total_frames: Option<u64>,
    pub elapsed: Duration,
    /// Output frames produced per second of wall time.
    pub throughput_fps: f64,
    /// Share of the source decoded, when its length is known.
    pub percent: Option<f64>,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn measure(
        frames_seen: u64,
        frames_written: u64,
        total_frames: Option<u64>,
        elapsed: Duration,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let throughput_fps = if secs > 0.0 {
            frames_written as f64 / secs
        } else {
            0.0
        };
        let total = total_frames.filter(|&t| t > 0);
        let percent = total.map(|t| (frames_seen as f64 / t as f64 * 100.0).min(100.0));
        let eta = total.and_then(|t| {
            if frames_seen == 0 || secs <= 0.0 {
                return None;
            }
            let decode_rate = frames_seen as f64 / secs;
            let remaining = t.saturating_sub(frames_seen) as f64;
            Some(Duration::from_secs_f64(remaining / decode_rate))
        });
        Self {
            frames_seen,
            frames_written,
            total_frames,
            elapsed,
            throughput_fps,
            percent,
            eta,
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<u64>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: u64) {}

    /// Periodic throughput/ETA update, at most once per progress interval.
    fn snapshot(&self, _snapshot: &ProgressSnapshot) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter for callers that don't need feedback.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Knobs of one streaming run.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamOptions {
    pub output_fps: f64,
    pub spatial_budget: Option<u32>,
    pub max_output_frames: Option<u64>,
    pub progress_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            output_fps: DEFAULT_OUTPUT_FPS,
            spatial_budget: Some(DEFAULT_SPATIAL_BUDGET),
            max_output_frames: None,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

impl From<&SamplingConfig> for StreamOptions {
    fn from(sampling: &SamplingConfig) -> Self {
        Self {
            output_fps: sampling.output_fps,
            spatial_budget: sampling.spatial_budget,
            max_output_frames: sampling.max_output_frames,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

/// Everything derived once from the source before the first frame is read.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputPlan {
    pub width: u32,
    pub height: u32,
    pub output_fps: f64,
    /// Keep one decoded frame out of this many.
    pub frame_interval: u64,
    pub scale: ScalePlan,
    /// Effect parameters after rescaling to the output geometry.
    pub params: EffectParams,
}

impl OutputPlan {
    pub fn new(
        descriptor: &VideoStreamDescriptor,
        params: &EffectParams,
        options: &StreamOptions,
    ) -> Result<Self> {
        descriptor.validate()?;
        params.validate()?;
        if !options.output_fps.is_finite() || options.output_fps <= 0.0 {
            return Err(DotMatrixError::Config(format!(
                "output fps must be positive, got {}",
                options.output_fps
            )));
        }
        let scale = ScalePlan::compute(descriptor.width, descriptor.height, options.spatial_budget);
        Ok(Self {
            width: scale.width,
            height: scale.height,
            output_fps: options.output_fps,
            frame_interval: frame_interval(descriptor.input_fps, options.output_fps),
            params: scale.apply_to_params(params),
            scale,
        })
    }

    pub fn sink_spec(&self) -> SinkSpec {
        SinkSpec {
            width: self.width,
            height: self.height,
            fps: self.output_fps,
        }
    }
}

/// Outcome of a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub frames_seen: u64,
    pub frames_written: u64,
    pub width: u32,
    pub height: u32,
    pub output_fps: f64,
    pub frame_interval: u64,
    pub elapsed: Duration,
    /// The run stopped at `max_output_frames` before the source ended.
    pub capped: bool,
}

pub mod config;
pub mod orchestrator;
pub mod sampling;
pub mod stream;
pub mod types;

pub use config::{EncoderConfig, PipelineConfig, SamplingConfig};
pub use orchestrator::process_video;
pub use sampling::{frame_interval, TemporalSampler};
pub use stream::run_stream;
pub use types::{
    NoOpReporter, OutputPlan, PipelineStage, ProgressReporter, ProgressSnapshot, RunSummary,
    StreamOptions,
};

use std::time::Duration;

use dotmatrix_core::pipeline::{PipelineStage, ProgressReporter, ProgressSnapshot};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Drives a terminal progress bar from pipeline events.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn frame_style(total_known: bool) -> ProgressStyle {
    let template = if total_known {
        "{msg:18} [{bar:40.cyan/blue}] {pos}/{len} frames [{elapsed_precise}<{eta_precise}] {prefix}"
    } else {
        "{msg:18} {spinner} {pos} frames [{elapsed_precise}] {prefix}"
    };
    ProgressStyle::with_template(template)
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<u64>) {
        self.bar.reset();
        self.bar.set_prefix("");
        match (stage, total_items) {
            (PipelineStage::Processing, Some(total)) => {
                self.bar.set_length(total);
                self.bar.set_style(frame_style(true));
            }
            (PipelineStage::Processing, None) => self.bar.set_style(frame_style(false)),
            (PipelineStage::Finalizing, _) => {
                self.bar.set_style(
                    ProgressStyle::with_template("{msg:18} {spinner} [{elapsed_precise}]")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                self.bar.enable_steady_tick(Duration::from_millis(120));
            }
        }
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: u64) {
        self.bar.set_position(items_done);
    }

    fn snapshot(&self, snapshot: &ProgressSnapshot) {
        let mut parts = Vec::new();
        if let Some(percent) = snapshot.percent {
            parts.push(format!("{percent:.1}%"));
        }
        parts.push(format!("{:.1} fps", snapshot.throughput_fps));
        if let Some(eta) = snapshot.eta {
            parts.push(format!("ETA {}s", eta.as_secs()));
        }
        self.bar.set_prefix(parts.join(" | "));
    }

    fn finish_stage(&self) {
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }
}

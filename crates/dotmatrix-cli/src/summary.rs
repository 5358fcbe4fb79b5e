use std::path::Path;

use console::Style;
use dotmatrix_core::frame::VideoStreamDescriptor;
use dotmatrix_core::pipeline::{OutputPlan, PipelineConfig, RunSummary};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn print_title(s: &Styles, title: &str) {
    println!();
    println!("  {}", s.title.apply_to(title));
    println!(
        "  {}",
        s.title
            .apply_to("\u{2550}".repeat(title.chars().count()))
    );
    println!();
}

pub fn print_run_summary(config: &PipelineConfig) {
    let s = Styles::new();
    print_title(&s, "Dot-Matrix Conversion");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Effect"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Dot size"),
        s.value.apply_to(format!("{} px", config.effect.dot_size))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Spacing"),
        s.value.apply_to(format!("{} px", config.effect.spacing))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Fill"),
        s.method.apply_to(config.effect.fill)
    );
    println!();

    println!("  {}", s.header.apply_to("Sampling"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Output fps"),
        s.value.apply_to(config.sampling.output_fps)
    );
    match config.sampling.spatial_budget {
        Some(budget) => println!(
            "    {:<12}{}",
            s.label.apply_to("Budget"),
            s.value.apply_to(format!("{budget} px"))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Budget"),
            s.disabled.apply_to("full resolution")
        ),
    }
    match config.sampling.max_output_frames {
        Some(cap) => println!(
            "    {:<12}{}",
            s.label.apply_to("Frame cap"),
            s.value.apply_to(cap)
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Frame cap"),
            s.disabled.apply_to("none")
        ),
    }
    println!();

    println!("  {}", s.header.apply_to("Encoder"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Preset"),
        s.method.apply_to(&config.encoder.preset)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("CRF"),
        s.value.apply_to(config.encoder.crf)
    );
    println!();
}

pub fn print_run_result(summary: &RunSummary, output: &Path) {
    let s = Styles::new();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(format!(
            "{} written of {} decoded",
            summary.frames_written, summary.frames_seen
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Resolution"),
        s.value
            .apply_to(format!("{}x{} @ {} fps", summary.width, summary.height, summary.output_fps))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Elapsed"),
        s.value.apply_to(format!("{:.1}s", summary.elapsed.as_secs_f64()))
    );
    if summary.capped {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Note"),
            s.disabled.apply_to("stopped at the output frame cap")
        );
    }
    println!();
    println!(
        "  Output saved to {}",
        s.path.apply_to(output.display())
    );
}

pub fn print_stream_info(path: &Path, descriptor: &VideoStreamDescriptor, plan: &OutputPlan) {
    let s = Styles::new();
    print_title(&s, "Video Stream");

    println!(
        "  {:<14}{}",
        s.label.apply_to("File"),
        s.path.apply_to(path.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Dimensions"),
        s.value
            .apply_to(format!("{}x{}", descriptor.width, descriptor.height))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frame rate"),
        s.value.apply_to(format!("{:.3} fps", descriptor.input_fps))
    );
    match descriptor.total_frames {
        Some(total) => println!(
            "  {:<14}{}",
            s.label.apply_to("Frames"),
            s.value.apply_to(total)
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Frames"),
            s.disabled.apply_to("unknown")
        ),
    }
    println!();

    println!("  {}", s.header.apply_to("Output Plan"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Size"),
        s.value.apply_to(format!("{}x{}", plan.width, plan.height))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Rate"),
        s.value.apply_to(format!(
            "{} fps (every {} frame{})",
            plan.output_fps,
            plan.frame_interval,
            if plan.frame_interval == 1 { "" } else { "s" }
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Dots"),
        s.value.apply_to(format!(
            "{} px, spacing {} px",
            plan.params.dot_size, plan.params.spacing
        ))
    );
    if plan.scale.is_active() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Scale"),
            s.method.apply_to(format!("{:.3}", plan.scale.factor))
        );
    }
    if let Some(total) = descriptor.total_frames {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Est. frames"),
            s.value.apply_to(total / plan.frame_interval)
        );
    }
    println!();
}

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use dotmatrix_core::error::DotMatrixError;
use dotmatrix_core::finalize::intermediate_path;
use dotmatrix_core::halftone::EffectParams;
use dotmatrix_core::io::ser::SerReader;
use dotmatrix_core::pipeline::{process_video, NoOpReporter, PipelineConfig, PipelineStage};

use common::{build_ser_with_frames, RecordingReporter};

fn ser_config(dir: &TempDir, frames: &[Vec<u8>], side: u32) -> PipelineConfig {
    let input = dir.path().join("input.ser");
    std::fs::write(&input, build_ser_with_frames(side, side, frames)).unwrap();
    let mut config = PipelineConfig::new(input, dir.path().join("out").join("styled.ser"));
    config.effect = EffectParams::new(2, 0);
    config
}

#[test]
fn test_ser_to_ser_conversion() {
    let dir = TempDir::new().unwrap();
    let white = vec![255u8; 16];
    #[rustfmt::skip]
    let checker = vec![
          0,   0, 255, 255,
          0,   0, 255, 255,
        255, 255,   0,   0,
        255, 255,   0,   0,
    ];
    let config = ser_config(&dir, &[white, checker], 4);
    let reporter = Arc::new(RecordingReporter::default());

    let summary = process_video(&config, reporter.clone()).unwrap();

    assert_eq!(summary.frames_seen, 2);
    assert_eq!(summary.frames_written, 1);
    assert_eq!(summary.frame_interval, 2);
    assert!(!intermediate_path(&config.output).exists());

    let reader = SerReader::open(&config.output).unwrap();
    assert_eq!(reader.frame_count(), 1);
    let out = reader.read_frame(0).unwrap();
    assert_eq!(out.data[[1, 3, 0]], 255);
    assert_eq!(out.data[[3, 1, 0]], 255);
    assert_eq!(out.data[[0, 0, 0]], 0);
    assert_eq!(out.data[[3, 3, 0]], 0);

    let stages: Vec<PipelineStage> = reporter
        .stages
        .lock()
        .unwrap()
        .iter()
        .map(|(s, _)| *s)
        .collect();
    assert_eq!(
        stages,
        vec![PipelineStage::Processing, PipelineStage::Finalizing]
    );
}

#[test]
fn test_frame_cap_from_config() {
    let dir = TempDir::new().unwrap();
    let frames = vec![vec![128u8; 16]; 10];
    let mut config = ser_config(&dir, &frames, 4);
    config.sampling.ser_fps = 15.0;
    config.sampling.max_output_frames = Some(4);

    let summary = process_video(&config, Arc::new(NoOpReporter)).unwrap();

    assert!(summary.capped);
    assert_eq!(summary.frames_written, 4);
    assert_eq!(SerReader::open(&config.output).unwrap().frame_count(), 4);
}

#[test]
fn test_no_surviving_frames_keeps_intermediate() {
    let dir = TempDir::new().unwrap();
    // One frame at 30 fps with a stride of 2: nothing survives.
    let config = ser_config(&dir, &[vec![200u8; 16]], 4);

    let err = process_video(&config, Arc::new(NoOpReporter)).unwrap_err();

    assert!(matches!(err, DotMatrixError::Encode(_)));
    assert!(intermediate_path(&config.output).exists());
    assert!(!config.output.exists());
}

#[test]
fn test_missing_input_is_open_error() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::new(dir.path().join("nope.mp4"), dir.path().join("out.mp4"));

    let err = process_video(&config, Arc::new(NoOpReporter)).unwrap_err();
    assert!(matches!(err, DotMatrixError::Open(_)));
    assert!(!intermediate_path(&config.output).exists());
}

#[test]
fn test_invalid_config_rejected_before_opening() {
    let dir = TempDir::new().unwrap();
    let mut config = ser_config(&dir, &[vec![0u8; 16]], 4);
    config.effect.dot_size = 0;

    let err = process_video(&config, Arc::new(NoOpReporter)).unwrap_err();
    assert!(matches!(err, DotMatrixError::InvalidParams(_)));
}

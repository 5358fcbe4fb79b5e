mod common;

use tempfile::TempDir;

use dotmatrix_core::frame::PixelFormat;
use dotmatrix_core::io::image_io::{load_image, save_image, to_dynamic};

use common::{gradient_gray, uniform_rgb};

#[test]
fn test_png_round_trip_rgb() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("frame.png");
    let frame = uniform_rgb(12, 7, [10, 200, 30]);

    save_image(&frame, &path).unwrap();
    let loaded = load_image(&path).unwrap();

    assert_eq!(loaded.format(), PixelFormat::Rgb);
    assert_eq!(loaded.data, frame.data);
}

#[test]
fn test_gray_frame_loads_as_rgb() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gray.png");
    let frame = gradient_gray(16, 9);

    save_image(&frame, &path).unwrap();
    let loaded = load_image(&path).unwrap();

    assert_eq!(loaded.format(), PixelFormat::Rgb);
    assert_eq!((loaded.width(), loaded.height()), (16, 9));
    assert_eq!(loaded.data[[4, 8, 0]], frame.data[[4, 8, 0]]);
    assert_eq!(loaded.data[[4, 8, 2]], frame.data[[4, 8, 0]]);
}

#[test]
fn test_to_dynamic_keeps_color_type() {
    let gray = to_dynamic(&gradient_gray(4, 4)).unwrap();
    assert!(gray.as_luma8().is_some());
    let rgb = to_dynamic(&uniform_rgb(4, 4, [1, 2, 3])).unwrap();
    assert!(rgb.as_rgb8().is_some());
}

#[test]
fn test_load_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    assert!(load_image(&dir.path().join("nope.png")).is_err());
}

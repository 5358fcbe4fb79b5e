use std::time::Duration;

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;

/// Target output frame rate of the stylized video.
pub const DEFAULT_OUTPUT_FPS: f64 = 15.0;

/// Longer-edge pixel budget for spatial downsampling.
pub const DEFAULT_SPATIAL_BUDGET: u32 = 640;

/// Default cell edge length in pixels.
pub const DEFAULT_DOT_SIZE: u32 = 10;

/// Default gap between cells in pixels.
pub const DEFAULT_SPACING: u32 = 2;

/// Frame cap used by the network service (~30 seconds at 15 fps).
pub const SERVICE_MAX_OUTPUT_FRAMES: u64 = 450;

/// SER files carry no frame rate; this one is assumed unless configured.
pub const DEFAULT_SER_FPS: f64 = 30.0;

/// Minimum wall-clock time between two progress snapshots.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// x264 speed/quality preset used by the finalizer.
pub const DEFAULT_ENCODER_PRESET: &str = "medium";

/// x264 constant rate factor used by the finalizer (18-28 is sensible, lower is better).
pub const DEFAULT_ENCODER_CRF: u32 = 23;

/// Bounding box for the still-image mode.
pub const DEFAULT_IMAGE_MAX_WIDTH: u32 = 800;
pub const DEFAULT_IMAGE_MAX_HEIGHT: u32 = 600;

/// Number of channels in a color frame (R, G, B).
pub const COLOR_CHANNEL_COUNT: usize = 3;

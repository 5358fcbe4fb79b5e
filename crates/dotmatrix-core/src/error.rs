use thiserror::Error;

#[derive(Error, Debug)]
pub enum DotMatrixError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not open video source: {0}")]
    Open(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Failed to encode output: {0}")]
    Encode(String),

    #[error("Failed to download source: {0}")]
    Download(String),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid effect parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, DotMatrixError>;

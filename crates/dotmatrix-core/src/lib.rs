pub mod consts;
pub mod error;
pub mod finalize;
pub mod frame;
pub mod halftone;
pub mod io;
pub mod pipeline;
pub mod scale;

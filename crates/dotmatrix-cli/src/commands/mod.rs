pub mod config;
pub mod image;
pub mod info;
pub mod run;
pub mod serve;

pub mod attributes;
pub mod basin;
pub mod config;
pub mod convert;
pub mod driver;
pub mod error;
pub mod merger;
pub mod output;
pub mod reducer;
pub mod unusable;
pub mod variables;

pub use camels_nh_reader::{ReaderError, SourceSeries, TIME_COLUMN};

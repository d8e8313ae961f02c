pub mod archive;
pub mod engine;
pub mod series_file;

pub use archive::ArchiveConfig;
pub use engine::{ArchiveInfo, CreateConfig, SeriesEngine, SeriesInfo};

pub mod error;
pub mod layout;
pub mod slug;
pub mod timestamp;

pub use error::{Error, Result};
pub use layout::{AggregationType, ArchiveMeta, Header, SeriesType, TIMEZONE_FIELD_LEN, VALUE_SIZE};
pub use slug::Slug;

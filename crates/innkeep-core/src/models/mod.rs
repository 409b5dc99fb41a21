pub mod content;
pub mod dedup;
pub mod media;

pub use content::{ContentRow, ContentTable, FieldShape, FieldValue, UrlField};
pub use dedup::{CanonicalChoice, DedupReport, DuplicateGroup, GroupOutcome, GroupState};
pub use media::{MediaAsset, MediaType};

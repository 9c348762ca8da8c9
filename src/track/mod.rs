//! Durable Operation Tracking
//!
//! Asynchronous operations (uploads, deletions) are recorded as one JSON
//! document per file hash in a dedicated directory, so their progress survives
//! restarts.

pub mod record;
pub mod store;
pub mod sweeper;

pub use record::{SegmentRecord, TrackOperation, TrackRecord};
pub use store::TrackFileStore;
pub use sweeper::TrackSweeper;

//! In-memory item storage for the Piscola server.
//!
//! - [`ItemStore`]: the store contract used by the service layer
//! - [`IndexedStore`]: hash map plus time-ordered index behind one lock
//! - [`TimeIndex`]: the ordered `time -> [id]` secondary index

pub mod engine;
pub mod engines;
pub mod time_index;

pub use engine::*;
pub use engines::IndexedStore;
pub use time_index::TimeIndex;

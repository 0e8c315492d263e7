//! Concrete [`ItemStore`](super::ItemStore) implementations.

pub mod indexed;

pub use indexed::IndexedStore;

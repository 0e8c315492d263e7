//! Piscola server: indexed in-memory item store, operation pipeline, and
//! HTTP transport.

pub mod network;
pub mod service;
pub mod storage;

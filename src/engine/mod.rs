//! Core engine — the fetch → aggregate → detect → notify loop.

pub mod aggregator;
pub mod detector;
pub mod tracker;
pub mod coordinator;

// src/lib.rs

//! Transit schedule sync library.
//!
//! Mirrors a transit authority's public schedule data into discussion
//! platform topics, diffing each run's download against the previously
//! published snapshot to drive idempotent, incremental publishing.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

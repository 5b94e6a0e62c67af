//! Integration tests for Driftnet
//!
//! These tests wire the real registry, cache pipeline, object stores and
//! reaper together and check the contracts between them.

#[path = "integration/cache_pipeline.rs"]
mod cache_pipeline;
#[path = "integration/reaper_cycle.rs"]
mod reaper_cycle;
#[path = "integration/registry_resolution.rs"]
mod registry_resolution;

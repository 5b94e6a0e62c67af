//! End-to-end tests for Driftnet
//!
//! These tests run complete link-to-media workflows through the media
//! service with scripted platform responses.

mod instagram_workflow;
mod long_tail_workflow;

//! studiokit-core — Tolerance grading, container ordering and scenario engine.
//!
//! This crate holds the numeric-answer tolerance rules, the reorderable
//! container tree behind the course-authoring page, video grading, and the
//! scenario engine that exercises all of them from TOML scenario sets.

pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod scenario;
pub mod tolerance;
pub mod tree;
pub mod video;

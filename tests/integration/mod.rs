//! Integration test suite for seam.
//!
//! These tests exercise the full gap-analysis cycle from detection
//! through candidate generation to reviewed insertion, including partial
//! generation failure and abandonment.
//!
//! # Test Categories
//!
//! - `analysis_e2e`: detection scenarios and analysis-time properties
//! - `commit_e2e`: insertion, atomicity, and idempotence properties
//!
//! # CI Compatibility
//!
//! All external collaborators are scripted mocks; no network or model
//! calls are made, making the suite safe for CI.


mod analysis_e2e;
mod commit_e2e;

//! Consolidated test modules.
//!
//! End-to-end tests that drive the Lambda store against a mocked control plane.

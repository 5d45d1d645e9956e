//! Style Enforcement Tests
//!
//! Validates that the workspace follows the conventions clippy cannot check.
//!
//! # Test Organization
//!
//! - `naming_conventions` - Banned function prefixes, generic module names and
//!   `# Errors` documentation format
//! - `dead_code_enforcement` - Prevents #[allow(dead_code)] in production code
//!
//! These tests scan the entire workspace and will fail if violations are found.

#[path = "style/naming_conventions.rs"]
mod naming_conventions;

#[path = "style/dead_code_enforcement.rs"]
mod dead_code_enforcement;

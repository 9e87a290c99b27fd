//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Sorting primitives
//! - Logging utilities

pub mod math;
pub mod sort;
pub mod logging;

//! # Image Service Module
//!
//! ## Sub-modules:
//! - `upload`: stores an uploaded image, optionally points a section at it,
//!   and publishes the result.

pub mod upload;

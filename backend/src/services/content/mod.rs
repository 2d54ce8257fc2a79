//! # Content Service Module
//!
//! Text and list edits of the published page.
//!
//! ## Sub-modules:
//! - `update`: patches one section of the document and publishes the result.

pub mod update;

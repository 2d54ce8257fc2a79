//! The published page and its assets: locating fields, patching the document
//! and storing uploads, all under one repository lock.

pub mod error;
pub mod images;
pub mod locators;
pub mod markup;
pub mod patcher;
pub mod store;

//! Wire types shared between the content server and its admin clients.

pub mod model;
pub mod requests;
pub mod responses;

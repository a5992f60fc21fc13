//! HTTP Routes

pub mod predict;
pub mod token;

//! Utils Module - Helper Functions & Shared Utilities

pub mod constants;
pub mod decoder;

pub use constants::*;
pub use decoder::*;

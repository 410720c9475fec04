//! Core definitions (error type, result alias and verification macros), relied upon by all
//! shardsplit-* crates.

pub mod error;
pub mod macros;
pub mod result;

pub use result::Result;

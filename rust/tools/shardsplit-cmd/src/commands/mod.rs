//! Command implementations for shardsplit-cmd

pub mod route;
pub mod split;

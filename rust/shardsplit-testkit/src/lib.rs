//! Test utilities for the shardsplit workspace.
//!
//! - [`corpus`]: building in-memory segments and on-disk corpora from id lists, and
//!   reading shards back.
//! - [`data_gen`]: deterministic synthetic documents.

pub mod corpus;
pub mod data_gen;

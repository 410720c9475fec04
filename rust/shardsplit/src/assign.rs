//! Shard assignment: `md5(id) mod num_shards`.
//!
//! The digest is read as an unsigned 128-bit big-endian integer, so the result matches
//! any implementation that computes `BigInteger(md5hex(id), 16) mod n`. This is the
//! contract query-time routing relies on; it must not change.

use md5::{Digest, Md5};
use shardsplit_common::{Result, error::Error, verify_arg};

/// Maps document identifiers to shard numbers for a fixed shard count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardAssigner {
    num_shards: u32,
}

impl ShardAssigner {
    pub fn new(num_shards: u32) -> Result<ShardAssigner> {
        verify_arg!(num_shards, num_shards >= 2);
        Ok(ShardAssigner { num_shards })
    }

    pub fn num_shards(&self) -> u32 {
        self.num_shards
    }

    /// Returns the shard of `id`, in `0..num_shards`.
    pub fn assign(&self, id: &str) -> Result<u32> {
        if id.is_empty() {
            return Err(Error::invalid_arg("id", "document identifier is empty"));
        }
        Ok(shard_for_id(id, self.num_shards))
    }
}

/// The MD5 digest of the UTF-8 bytes of `id`, as a big-endian unsigned integer.
pub fn id_digest(id: &str) -> u128 {
    let digest = Md5::digest(id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    u128::from_be_bytes(bytes)
}

/// Routing helper: the shard `id` lands in when split into `num_shards` shards.
///
/// # Panics
///
/// If `num_shards` is zero.
pub fn shard_for_id(id: &str, num_shards: u32) -> u32 {
    assert!(num_shards != 0, "num_shards must be positive");
    (id_digest(id) % num_shards as u128) as u32
}

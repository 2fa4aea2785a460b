//! Content identifiers.
//!
//! Keys are plain [`Cid`]s. Blocks created by this crate are CIDv1 with the
//! `raw` codec and a BLAKE3 multihash, but any valid CID can be looked up.

use crate::error::{ErrorKind, Result};
use cid::multihash::Multihash;
use exn::ResultExt;

pub use cid::Cid;

/// Multicodec code for raw binary blocks.
pub const RAW: u64 = 0x55;
/// Multihash code for BLAKE3 (256-bit digests).
pub const BLAKE3: u64 = 0x1e;
/// Backing files are referenced in chunks of this many bytes.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Compute the key of a block of data.
///
/// # Examples
///
/// ```
/// use stash_store::{RAW, block_cid};
///
/// let key = block_cid(b"hello").unwrap();
/// assert_eq!(key.codec(), RAW);
/// assert_eq!(key, block_cid(b"hello").unwrap());
/// assert_ne!(key, block_cid(b"world").unwrap());
/// ```
pub fn block_cid(data: &[u8]) -> Result<Cid> {
    let digest = blake3::hash(data);
    let hash = Multihash::<64>::wrap(BLAKE3, digest.as_bytes())
        .or_raise(|| ErrorKind::InvalidKey(format!("blake3 digest {digest}")))?;
    Ok(Cid::new_v1(RAW, hash))
}

/// Decode a textual key (any multibase CIDv1, or a base58 CIDv0).
pub fn parse_key(input: &str) -> std::result::Result<Cid, cid::Error> {
    Cid::try_from(input)
}

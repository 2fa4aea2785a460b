//! Object path resolution.
//!
//! An object path is either a bare key (`bafk...`) or a key inside the
//! `/stash/` namespace (`/stash/bafk...`). Sub-paths below a key are not
//! supported: blocks are flat.

use crate::error::{ErrorKind, Result};
use crate::key::{Cid, parse_key};
use exn::ResultExt;
use std::path::{Component, Path};

pub const PATH_NAMESPACE: &str = "stash";

/// Resolve an object path to the key it names.
///
/// # Examples
///
/// ```
/// use stash_store::{block_cid, resolve_path};
///
/// let key = block_cid(b"data").unwrap();
/// assert_eq!(resolve_path(&key.to_string()).unwrap(), key);
/// assert_eq!(resolve_path(&format!("/stash/{key}")).unwrap(), key);
/// assert_eq!(resolve_path(&format!("/stash/./{key}/")).unwrap(), key);
/// assert!(resolve_path(&format!("/stash/{key}/child")).is_err());
/// assert!(resolve_path("/stash/../etc/passwd").is_err());
/// assert!(resolve_path("").is_err());
/// ```
pub fn resolve(path: &str) -> Result<Cid> {
    let mut components = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(s) => match s.to_str() {
                Some(s) if !s.contains('\0') => components.push(s),
                _ => exn::bail!(ErrorKind::InvalidPath(path.to_string())),
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) | Component::ParentDir => exn::bail!(ErrorKind::InvalidPath(path.to_string())),
        }
    }
    let key = match components.as_slice() {
        [key] => key,
        [namespace, key] if *namespace == PATH_NAMESPACE => key,
        _ => exn::bail!(ErrorKind::InvalidPath(path.to_string())),
    };
    parse_key(key).or_raise(|| ErrorKind::InvalidPath(path.to_string()))
}

//! Small [`AsyncRead`](futures::io::AsyncRead) adapters shared by the other
//! crates.
//!
//! - [`MultiReader`] concatenates any number of boxed readers, back to back.
//! - [`ProgressReader`] reports every byte that passes through it to a
//!   [`Progress`] observer without ever holding data back.
//!
//! Both use [`futures::io`] traits (not Tokio) so they stay runtime agnostic;
//! wrap Tokio readers with `tokio_util::compat` first.

mod multi;
mod progress;

pub use crate::multi::{BoxAsyncRead, MultiReader};
pub use crate::progress::{Progress, ProgressReader};

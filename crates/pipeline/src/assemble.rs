use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use stash_asyncutils::MultiReader;
use stash_store::Fetched;
use std::future::Future;

/// Several objects joined into one readable payload.
pub struct Payload {
    /// Yields each object's bytes in turn, in the order they were requested.
    pub reader: MultiReader,
    /// Sum of the objects' declared sizes.
    pub length: u64,
}

/// Resolve each of `paths` with `lookup`, in order, and join the results.
///
/// Fails on the first path that can't be resolved; nothing is read from the
/// objects resolved before it, and they are dropped.
///
/// # Examples
///
/// ```no_run
/// use stash_pipeline::assemble;
/// use stash_store::StoreHandle;
/// # async fn example(store: StoreHandle) -> stash_pipeline::error::Result<()> {
///
/// let payload = assemble(["/stash/bafkr4i...", "bafkr4i..."], |path| {
///     let store = store.clone();
///     async move { store.fetch(&path).await }
/// })
/// .await?;
/// println!("{} bytes", payload.length);
/// # Ok(())
/// # }
/// ```
pub async fn assemble<I, F, Fut>(paths: I, mut lookup: F) -> Result<Payload>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = stash_store::error::Result<Fetched>>,
{
    let mut reader = MultiReader::default();
    let mut length: u64 = 0;
    for path in paths {
        let path = path.as_ref().to_string();
        let fetched = lookup(path.clone()).await.or_raise(|| ErrorKind::Lookup(path.clone()))?;
        tracing::debug!(path = %path, size = fetched.size, "Added reader");
        length = length
            .checked_add(fetched.size)
            .ok_or_else(|| exn::Exn::from(ErrorKind::Contract(format!("total size overflows at {path}"))))?;
        reader.push(fetched.reader);
    }
    Ok(Payload { reader, length })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::AsyncReadExt;
    use stash_store::backend::MockFilestore;
    use stash_store::{Filestore, block_cid};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> Arc<MockFilestore> {
        Arc::new(MockFilestore::with_files([
            ("/ten", b"0123456789".to_vec()),
            ("/twenty", b"abcdefghijklmnopqrst".to_vec()),
        ]))
    }

    fn path(data: &[u8]) -> String {
        format!("/stash/{}", block_cid(data).unwrap())
    }

    #[tokio::test]
    async fn test_concatenates_in_order() {
        let store = store();
        let paths = [path(b"0123456789"), path(b"abcdefghijklmnopqrst")];
        let mut payload = assemble(&paths, |p| {
            let store = Arc::clone(&store);
            async move { store.fetch(&p).await }
        })
        .await
        .unwrap();

        assert_eq!(payload.length, 30);
        let mut out = Vec::new();
        payload.reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"0123456789abcdefghijklmnopqrst");
    }

    #[tokio::test]
    async fn test_empty_paths() {
        let mut payload = assemble(Vec::<String>::new(), |_| async {
            Err(exn::Exn::from(stash_store::error::ErrorKind::NotFound("unused".to_string())))
        })
        .await
        .unwrap();
        assert_eq!(payload.length, 0);
        let mut out = Vec::new();
        payload.reader.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_fails_fast() {
        let store = store();
        let lookups = Arc::new(AtomicUsize::new(0));
        let missing = path(b"not stored");
        let paths = [path(b"0123456789"), missing.clone(), path(b"abcdefghijklmnopqrst")];
        let result = assemble(&paths, |p| {
            lookups.fetch_add(1, Ordering::SeqCst);
            let store = Arc::clone(&store);
            async move { store.fetch(&p).await }
        })
        .await;

        let Err(err) = result else {
            panic!("expected the missing path to fail");
        };
        assert!(matches!(&*err, ErrorKind::Lookup(p) if *p == missing));
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }
}

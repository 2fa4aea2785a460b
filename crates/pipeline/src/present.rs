use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use stash_asyncutils::{Progress, ProgressReader};

/// Payloads smaller than this are copied straight through; anything at least
/// this large gets a progress view.
pub const PROGRESS_BAR_MIN_SIZE: u64 = 8 * 1024 * 1024;

/// How a byte payload is going to be written out.
pub enum EmissionPlan<R, P> {
    /// Copy without any progress reporting.
    Direct(R),
    /// Copy through a reader that reports how far along it is.
    Progress(ProgressReader<R, P>),
}

/// Decide how to emit a payload of `length` bytes.
///
/// A length of zero means "unknown" and, like any length under
/// [`PROGRESS_BAR_MIN_SIZE`], is copied directly. `progress` is only called
/// when a progress view is actually wanted, with the payload's length.
pub fn present<R, P, F>(length: u64, reader: R, progress: F) -> EmissionPlan<R, P>
where
    P: Progress,
    F: FnOnce(u64) -> P,
{
    if length == 0 || length < PROGRESS_BAR_MIN_SIZE {
        EmissionPlan::Direct(reader)
    } else {
        EmissionPlan::Progress(ProgressReader::new(reader, progress(length), length))
    }
}

impl<R, P> EmissionPlan<R, P>
where
    R: AsyncRead + Unpin,
    P: Progress,
{
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(_))
    }

    /// Copy everything into `sink` and close it, returning how many bytes
    /// were copied.
    pub async fn copy_into<W>(self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let copied = match self {
            Self::Direct(reader) => futures::io::copy(reader, sink).await,
            Self::Progress(reader) => futures::io::copy(reader, sink).await,
        }
        .or_raise(|| ErrorKind::Emit)?;
        sink.close().await.or_raise(|| ErrorKind::Emit)?;
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Progress for &Log {
        fn start(&self, total: u64) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }

        fn advance(&self, _bytes: u64) {}

        fn finish(&self) {
            self.0.lock().unwrap().push("finish".to_string());
        }
    }

    const MIB: u64 = 1024 * 1024;

    #[rstest]
    #[case::unknown_length(0, true)]
    #[case::small(7 * MIB, true)]
    #[case::just_under(PROGRESS_BAR_MIN_SIZE - 1, true)]
    #[case::threshold(PROGRESS_BAR_MIN_SIZE, false)]
    #[case::large(9 * MIB, false)]
    fn test_decision(#[case] length: u64, #[case] direct: bool) {
        let log = Log::default();
        let plan = present(length, Cursor::new(Vec::new()), |_| &log);
        assert_eq!(plan.is_direct(), direct);
        // No observer is created unless it's going to be used.
        assert_eq!(log.0.lock().unwrap().is_empty(), direct);
    }

    #[tokio::test]
    async fn test_copy_with_progress_closes_sink() {
        let log = Log::default();
        let data = vec![1u8; 9 * MIB as usize];
        let plan = present(data.len() as u64, Cursor::new(data), |_| &log);
        let mut sink = Cursor::new(Vec::new());
        let copied = plan.copy_into(&mut sink).await.unwrap();

        assert_eq!(copied, 9 * MIB);
        assert_eq!(sink.into_inner().len() as u64, 9 * MIB);
        assert_eq!(*log.0.lock().unwrap(), vec![format!("start {}", 9 * MIB), "finish".to_string()]);
    }

    #[tokio::test]
    async fn test_direct_copy_of_unknown_length() {
        let log = Log::default();
        let plan = present(0, Cursor::new(b"hello".to_vec()), |_| &log);
        let mut sink = Cursor::new(Vec::new());
        assert_eq!(plan.copy_into(&mut sink).await.unwrap(), 5);
        assert_eq!(sink.into_inner(), b"hello");
    }
}

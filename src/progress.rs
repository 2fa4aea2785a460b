use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use stash_asyncutils::Progress;

const TEMPLATE: &str = "{bytes}/{total_bytes} [{wide_bar}] {percent}% {binary_bytes_per_sec} {eta}";

/// Byte-count progress bar drawn on stderr, so it never mixes with payload
/// bytes on stdout.
pub struct Bar(ProgressBar);

impl Bar {
    /// A bar for a payload of `length` bytes. When `visible` is `false` the
    /// bar still counts but never draws.
    pub fn for_payload(length: u64, visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(length), target);
        match ProgressStyle::with_template(TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("=> ")),
            Err(e) => tracing::debug!(error = %e, "Falling back to the default progress style"),
        }
        Self(bar)
    }
}

impl Progress for Bar {
    fn start(&self, total: u64) {
        self.0.set_length(total);
        self.0.set_position(0);
    }

    fn advance(&self, bytes: u64) {
        self.0.inc(bytes);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

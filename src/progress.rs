//! Progress tracking for copy-heavy passes

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Optional progress bar over the files a pass will touch
///
/// Draws to stderr so it never interleaves with the report on stdout. When
/// disabled the bar is hidden and every call is a no-op.
pub struct ProgressTracker {
    progress_bar: ProgressBar,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        let pb = ProgressBar::with_draw_target(
            Some(0),
            if enabled {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        Self { progress_bar: pb }
    }

    /// Reset the bar for a pass with `total` items
    pub fn start_pass(&self, label: &'static str, total: usize) {
        self.progress_bar.set_message(label);
        self.progress_bar.set_position(0);
        self.progress_bar.set_length(total as u64);
    }

    /// One item finished, successfully or not
    pub fn inc(&self) {
        self.progress_bar.inc(1);
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

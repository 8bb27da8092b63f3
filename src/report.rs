//! Line-oriented run report
//!
//! Each pass that has work prints its heading followed by one line per
//! affected path, before any of that work is performed. Passes with nothing to
//! do print nothing. This is user-facing output, separate from `tracing` logs.

use crate::error::Pass;
use crate::i18n::TranslationKey;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

/// Writes the human-readable report of a run
pub struct Reporter<W: Write> {
    out: W,
    numbered: bool,
}

impl Reporter<io::Stdout> {
    /// Report to standard output
    #[must_use]
    pub fn stdout(numbered: bool) -> Self {
        Self::new(io::stdout(), numbered)
    }
}

impl Reporter<io::Sink> {
    /// Discard the report (quiet mode)
    #[must_use]
    pub fn silent() -> Self {
        Self::new(io::sink(), false)
    }
}

impl<W: Write> Reporter<W> {
    /// Report to `out`, optionally prefixing each path with its 1-based index
    pub const fn new(out: W, numbered: bool) -> Self {
        Self { out, numbered }
    }

    /// Announce the roots of the run
    pub fn start(&mut self, source: &Path, destination: &Path) {
        self.line(&TranslationKey::ReportStart.text());
        self.line(&source.display().to_string());
        self.line(&TranslationKey::ReportTo.text());
        self.line(&destination.display().to_string());
    }

    /// List the paths a pass is about to act on; silent when there are none
    pub fn pass<'a, I>(&mut self, pass: Pass, paths: I)
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut paths = paths.into_iter().peekable();
        if paths.peek().is_none() {
            return;
        }
        let Some(heading) = heading(pass) else {
            return;
        };

        self.line(&heading.text());
        for (index, path) in paths.enumerate() {
            if self.numbered {
                self.line(&format!("{}. {}", index + 1, path.display()));
            } else {
                self.line(&path.display().to_string());
            }
        }
    }

    /// Note that nothing was changed
    pub fn dry_run_notice(&mut self) {
        self.line(&TranslationKey::ReportDryRun.text());
    }

    /// Final status line
    pub fn finish(&mut self, clean: bool) {
        let key = if clean {
            TranslationKey::StatusComplete
        } else {
            TranslationKey::StatusPartial
        };
        self.line(&key.text());
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            warn!("Failed to write report output: {}", e);
        }
    }
}

const fn heading(pass: Pass) -> Option<TranslationKey> {
    match pass {
        Pass::Remove => Some(TranslationKey::ReportRemoving),
        Pass::Add => Some(TranslationKey::ReportAdding),
        Pass::Update => Some(TranslationKey::ReportUpdating),
        Pass::Scan | Pass::Prune => None,
    }
}

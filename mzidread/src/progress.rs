//! The collaborators a parse reports to: progress with cooperative cancellation, and spectrum title lookup

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Receives progress updates and signals cancellation. Readers poll [`Self::is_cancelled`] once per record.
pub trait ProgressReporter {
    /// Set the total amount of work, in readers specific units (lines, spectra, or bytes)
    fn set_max(&mut self, max: usize);

    /// Report that some work was done
    fn increment(&mut self, amount: usize);

    /// Check if the parse should stop
    fn is_cancelled(&self) -> bool;
}

/// Ignore all progress, never cancel
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn set_max(&mut self, _max: usize) {}

    fn increment(&mut self, _amount: usize) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A shareable cancellation flag that also counts progress, cancel it from another thread to stop a parse
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
    done: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl CancellationFlag {
    /// Create a new flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// The work done so far and the total work, if known
    pub fn progress(&self) -> (usize, usize) {
        (
            self.done.load(Ordering::Relaxed),
            self.max.load(Ordering::Relaxed),
        )
    }
}

impl ProgressReporter for CancellationFlag {
    fn set_max(&mut self, max: usize) {
        self.max.store(max, Ordering::Relaxed);
    }

    fn increment(&mut self, amount: usize) {
        self.done.fetch_add(amount, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Looks up spectrum titles for formats that only record spectrum indices
pub trait SpectrumTitleResolver {
    /// The title of the spectrum with the given 0-based index in the given spectrum file
    fn title_for(&self, spectrum_file: &str, index: usize) -> Option<String>;
}

impl<F: Fn(&str, usize) -> Option<String>> SpectrumTitleResolver for F {
    fn title_for(&self, spectrum_file: &str, index: usize) -> Option<String> {
        self(spectrum_file, index)
    }
}

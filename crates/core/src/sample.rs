//! Host-side lazy feed of data points.
//!
//! A [`RawDataSample`] wraps whatever iterator the host has (a database
//! cursor, a vector, a generator) and counts how many points were actually
//! pulled from it. The count is shared through a [`VisitCounter`] so it can
//! still be read after the sample has been moved into an execution.
//!
//! Disposal runs the host's release hook exactly once. Dropping a sample
//! disposes it, so every exit path of an execution releases the feed.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::data_point::DataPoint;

type DisposeHook = Box<dyn FnOnce() + Send>;

pub struct RawDataSample {
    points: Box<dyn Iterator<Item = DataPoint> + Send>,
    visited: Arc<AtomicUsize>,
    disposed: Arc<AtomicBool>,
    on_dispose: Option<DisposeHook>,
}

impl RawDataSample {
    pub fn new<I>(points: I) -> Self
    where
        I: IntoIterator<Item = DataPoint>,
        I::IntoIter: Send + 'static,
    {
        Self {
            points: Box::new(points.into_iter()),
            visited: Arc::new(AtomicUsize::new(0)),
            disposed: Arc::new(AtomicBool::new(false)),
            on_dispose: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Register a hook that releases the underlying resource.
    pub fn on_dispose(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    /// Handle for reading the visit count from outside the execution.
    pub fn visit_counter(&self) -> VisitCounter {
        VisitCounter {
            visited: Arc::clone(&self.visited),
            disposed: Arc::clone(&self.disposed),
        }
    }

    pub fn visited(&self) -> usize {
        self.visited.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Release the feed. Later calls are no-ops and the sample yields nothing.
    pub fn dispose(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.points = Box::new(std::iter::empty());
        if let Some(hook) = self.on_dispose.take() {
            hook();
        }
    }
}

impl Iterator for RawDataSample {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        let point = self.points.next()?;
        self.visited.fetch_add(1, Ordering::SeqCst);
        Some(point)
    }
}

impl Drop for RawDataSample {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for RawDataSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDataSample")
            .field("visited", &self.visited())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Shared view of a sample's visit count and disposal state.
#[derive(Debug, Clone)]
pub struct VisitCounter {
    visited: Arc<AtomicUsize>,
    disposed: Arc<AtomicBool>,
}

impl VisitCounter {
    pub fn visited(&self) -> usize {
        self.visited.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_point::timestamp_from_parts;

    fn points(n: usize) -> Vec<DataPoint> {
        (0..n)
            .map(|i| DataPoint::new(timestamp_from_parts(i as i64 * 1000, 0).unwrap(), i as f64))
            .collect()
    }

    #[test]
    fn counts_only_pulled_points() {
        let mut sample = RawDataSample::new(points(10));
        let counter = sample.visit_counter();
        sample.next();
        sample.next();
        assert_eq!(counter.visited(), 2);
    }

    #[test]
    fn dispose_hook_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = Arc::clone(&calls);
        let mut sample = RawDataSample::new(points(3)).on_dispose(move || {
            hook_calls.fetch_add(1, Ordering::SeqCst);
        });
        sample.dispose();
        sample.dispose();
        assert!(sample.next().is_none());
        drop(sample);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_disposes() {
        let sample = RawDataSample::new(points(3));
        let counter = sample.visit_counter();
        drop(sample);
        assert!(counter.is_disposed());
    }
}

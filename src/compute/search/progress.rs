//! Progress reporting and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::schema::SearchProgress;

/// Shared cancellation flag, checked between evaluation chunks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether `cancel` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress callback. Returning `false` asks the run to stop.
pub type ProgressCallback<'a> = Box<dyn FnMut(&SearchProgress) -> bool + 'a>;

/// Delivers progress events and owns the run's cancellation token.
///
/// Events are delivered on the calling thread. A callback returning `false`
/// cancels the token; once cancelled, no further events are delivered.
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
    token: CancellationToken,
    delivered: usize,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(callback: impl FnMut(&SearchProgress) -> bool + 'a) -> Self {
        Self {
            callback: Some(Box::new(callback)),
            token: CancellationToken::new(),
            delivered: 0,
        }
    }

    /// Reporter that only tracks cancellation.
    pub fn silent() -> Self {
        Self {
            callback: None,
            token: CancellationToken::new(),
            delivered: 0,
        }
    }

    /// Share an externally owned token, e.g. one cancelled from another thread.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Token shared with the running search.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Events delivered so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Deliver an event. Returns `false` when the run should stop.
    pub fn report(&mut self, event: SearchProgress) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.delivered += 1;
        let keep_going = match self.callback.as_mut() {
            Some(callback) => callback(&event),
            None => true,
        };
        if !keep_going {
            log::info!(
                "Search cancelled by progress callback at {:?} {} {}",
                event.phase,
                event.unit,
                event.index
            );
            self.token.cancel();
        }
        keep_going
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SearchPhase;

    #[test]
    fn test_false_return_cancels() {
        let mut seen = 0;
        {
            let mut reporter = ProgressReporter::new(|_| {
                seen += 1;
                seen < 2
            });
            assert!(reporter.report(SearchProgress::new(SearchPhase::Init, 0, 0, "point")));
            assert!(!reporter.report(SearchProgress::new(SearchPhase::Evaluating, 5, 1, "point")));
            assert!(reporter.is_cancelled());
            assert!(!reporter.report(SearchProgress::new(SearchPhase::Evaluating, 9, 2, "point")));
            assert_eq!(reporter.delivered(), 2);
        }
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_external_token() {
        let token = CancellationToken::new();
        let mut reporter = ProgressReporter::silent().with_token(token.clone());
        assert!(reporter.report(SearchProgress::new(SearchPhase::Init, 0, 0, "point")));

        let remote = token.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();

        assert!(reporter.is_cancelled());
        assert!(!reporter.report(SearchProgress::new(SearchPhase::Init, 0, 0, "point")));
    }
}

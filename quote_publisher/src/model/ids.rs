//! Process-scoped identifier generation for orders, executions and quotes.
//!
//! Each kind has its own counter, starting at 0 and incremented before use, so
//! the first identifier of every kind is `"1"`. Counters are plain fields of
//! the owning instance. The publisher creates one [`SharedIds`] and hands
//! clones to every component that issues identifiers, so a kind never
//! repeats within a process. Nothing survives a restart.

use std::sync::{Arc, Mutex, MutexGuard};

/// Identifier families with independent counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// OrderID on execution reports.
    Order,
    /// ExecID on execution reports.
    Execution,
    /// QuoteID on quotes.
    Quote,
}

/// Strictly increasing decimal identifiers, one sequence per [`IdKind`].
#[derive(Debug, Default)]
pub struct IdGenerator {
    order: u64,
    execution: u64,
    quote: u64,
}

impl IdGenerator {
    /// Create a generator with every counter at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier of `kind`.
    pub fn next(&mut self, kind: IdKind) -> String {
        let counter = match kind {
            IdKind::Order => &mut self.order,
            IdKind::Execution => &mut self.execution,
            IdKind::Quote => &mut self.quote,
        };
        *counter += 1;
        counter.to_string()
    }
}

/// Handle to one [`IdGenerator`] shared across threads.
#[derive(Debug, Clone, Default)]
pub struct SharedIds(Arc<Mutex<IdGenerator>>);

impl SharedIds {
    /// Fresh generator behind a shared handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the generator, e.g. to take several identifiers at once.
    pub fn lock(&self) -> MutexGuard<'_, IdGenerator> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Next identifier of `kind`.
    pub fn next(&self, kind: IdKind) -> String {
        self.lock().next(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_and_strictly_increases() {
        let mut ids = IdGenerator::new();
        let issued: Vec<u64> = (0..100)
            .map(|_| ids.next(IdKind::Order).parse().unwrap())
            .collect();
        assert_eq!(issued[0], 1);
        assert!(issued.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn kinds_are_independent() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.next(IdKind::Order), "1");
        assert_eq!(ids.next(IdKind::Order), "2");
        assert_eq!(ids.next(IdKind::Execution), "1");
        assert_eq!(ids.next(IdKind::Quote), "1");
        assert_eq!(ids.next(IdKind::Order), "3");
    }

    #[test]
    fn clones_share_one_sequence() {
        let ids = SharedIds::new();
        let other = ids.clone();
        assert_eq!(ids.next(IdKind::Quote), "1");
        assert_eq!(other.next(IdKind::Quote), "2");
        assert_eq!(ids.next(IdKind::Quote), "3");
    }
}
